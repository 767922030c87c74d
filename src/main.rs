//! CLI entry point for `mboxfrm`.

use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{CommandFactory, Parser};

use mboxfrm::error::FrmError;
use mboxfrm::parser::mbox;

#[derive(Parser)]
#[command(
    name = "mboxfrm",
    version,
    disable_version_flag = true,
    about = "List the sender and subject of every message in an MBOX file"
)]
struct Cli {
    /// Mailbox files to scan (default: $MAIL)
    #[arg(value_name = "MAILBOX")]
    paths: Vec<PathBuf>,

    /// Show only the last message of each mailbox
    #[arg(short = '1', long = "last")]
    last_only: bool,

    /// Skip the first N messages of each mailbox
    #[arg(short, long = "skip", value_name = "N", default_value_t = 0)]
    skip: usize,

    /// Print version and exit
    #[arg(short = 'v', long = "version")]
    version: bool,

    /// Verbose logging (repeat for more: info, debug, trace)
    #[arg(long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Generate shell completions
    #[arg(long, value_enum, value_name = "SHELL", hide = true)]
    completions: Option<clap_complete::Shell>,

    /// Generate a man page
    #[arg(long, hide = true)]
    manpage: bool,
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    if cli.version {
        println!("mboxfrm {}", env!("CARGO_PKG_VERSION"));
        return Ok(ExitCode::SUCCESS);
    }
    if let Some(shell) = cli.completions {
        clap_complete::generate(shell, &mut Cli::command(), "mboxfrm", &mut std::io::stdout());
        return Ok(ExitCode::SUCCESS);
    }
    if cli.manpage {
        let mut buf = Vec::new();
        clap_mangen::Man::new(Cli::command()).render(&mut buf)?;
        std::io::stdout().write_all(&buf)?;
        return Ok(ExitCode::SUCCESS);
    }

    let config = mboxfrm::config::load_config();

    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level);

    let paths = if cli.paths.is_empty() {
        match default_mailbox(&config) {
            Some(path) => vec![path],
            None => {
                eprintln!("mboxfrm: {}", FrmError::NoMailbox);
                return Ok(ExitCode::FAILURE);
            }
        }
    } else {
        cli.paths
    };

    let mut options = config.scan_options();
    options.skip = cli.skip;
    options.last_only = cli.last_only;
    tracing::debug!(charset = ?options.charset, "Display charset");

    let stdout = std::io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    let status = mbox::scan_all(&paths, &options, &mut out, &mut |e: &FrmError| {
        eprintln!("mboxfrm: {e}");
    });
    out.flush()?;

    Ok(if status == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// `$MAIL`, falling back to the configured default mailbox.
fn default_mailbox(config: &mboxfrm::config::Config) -> Option<PathBuf> {
    std::env::var_os("MAIL")
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .or_else(|| config.general.default_mailbox.clone())
}

/// Set up tracing with stderr output.
fn setup_logging(level: &str) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .init();
}
