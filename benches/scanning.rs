use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;

use mboxfrm::charset::DisplayCharset;
use mboxfrm::parser::encoded_word;
use mboxfrm::parser::mbox::{MailboxImage, ScanOptions, Scanner};

fn synthetic_mailbox(messages: usize) -> Vec<u8> {
    let mut data = Vec::new();
    for i in 0..messages {
        data.extend_from_slice(
            format!(
                "From sender{i}@example.com Mon Jan 01 00:00:00 2024\n\
                 From: =?UTF-8?Q?Jos=C3=A9_{i}?= <sender{i}@example.com>\n\
                 Subject: =?UTF-8?B?Q2Fmw6kgY29uIGxlw7Fh?=\n\
                 \t=?UTF-8?Q?_y_churros?=\n\n\
                 {}\n",
                "Body line with From inside it.\n".repeat(40)
            )
            .as_bytes(),
        );
    }
    data
}

fn bench_scan(c: &mut Criterion) {
    let image = MailboxImage::from(synthetic_mailbox(1000));
    let options = ScanOptions::default();

    c.bench_function("scan_1000_messages", |b| {
        b.iter(|| {
            let mut out = Vec::with_capacity(64 * 1024);
            Scanner::new(&image, &options).scan(&mut out).unwrap();
            black_box(out)
        })
    });

    let last = ScanOptions {
        last_only: true,
        ..ScanOptions::default()
    };
    c.bench_function("scan_last_only", |b| {
        b.iter(|| {
            let mut out = Vec::new();
            Scanner::new(&image, &last).scan(&mut out).unwrap();
            black_box(out)
        })
    });
}

fn bench_decode(c: &mut Criterion) {
    let value = b"=?UTF-8?Q?Caf=C3=A9_con_le=C3=B1a?==?UTF-8?B?IHkgY2h1cnJvcw==?=";
    c.bench_function("decode_encoded_words", |b| {
        b.iter(|| encoded_word::decode(black_box(value), DisplayCharset::Latin9))
    });
}

criterion_group!(benches, bench_scan, bench_decode);
criterion_main!(benches);
