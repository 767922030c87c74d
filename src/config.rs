//! Application configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. `$MBOXFRM_CONFIG` (environment variable)
//! 2. `~/.config/mboxfrm/config.toml` (Linux/macOS)
//!    `%APPDATA%\mboxfrm\config.toml` (Windows)
//! 3. Built-in defaults

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::charset::DisplayCharset;
use crate::parser::mbox::{
    ScanOptions, DEFAULT_FROM_WIDTH, DEFAULT_RECYCLE_THRESHOLD, DEFAULT_SWEEP_CHUNK_SIZE,
};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General behavior settings.
    pub general: GeneralConfig,
    /// Output settings.
    pub display: DisplayConfig,
    /// Performance tuning.
    pub performance: PerformanceConfig,
}

/// General behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
    /// Mailbox used when no path is given and `$MAIL` is unset.
    pub default_mailbox: Option<PathBuf>,
}

/// Output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Minimum width of the sender column.
    pub from_width: usize,
    /// Terminal charset: "auto" (from the locale), "utf-8" or "latin9".
    pub charset: CharsetSetting,
}

/// Performance tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceConfig {
    /// Bytes scanned between two paging hints (default: 1048576 = 1 MB).
    pub recycle_threshold: usize,
    /// Chunk size of the backward search for `-1` (default: 65536 = 64 KB).
    pub sweep_chunk_size: usize,
    /// Memory-map mailboxes; when false they are read into memory.
    pub use_mmap: bool,
}

/// Configured terminal charset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CharsetSetting {
    #[default]
    #[serde(rename = "auto")]
    Auto,
    #[serde(rename = "utf-8", alias = "utf8")]
    Utf8,
    #[serde(rename = "latin9", alias = "iso-8859-15")]
    Latin9,
}

impl CharsetSetting {
    /// Resolve to a concrete charset, consulting the locale for `auto`.
    pub fn resolve(self) -> DisplayCharset {
        match self {
            Self::Auto => DisplayCharset::from_locale(),
            Self::Utf8 => DisplayCharset::Utf8,
            Self::Latin9 => DisplayCharset::Latin9,
        }
    }
}

// ── Default implementations ─────────────────────────────────────

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
            default_mailbox: None,
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            from_width: DEFAULT_FROM_WIDTH,
            charset: CharsetSetting::Auto,
        }
    }
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            recycle_threshold: DEFAULT_RECYCLE_THRESHOLD, // 1 MB
            sweep_chunk_size: DEFAULT_SWEEP_CHUNK_SIZE,   // 64 KB
            use_mmap: true,
        }
    }
}

impl Config {
    /// Scan options from this configuration; the per-run flags are left
    /// at their defaults for the caller to fill in.
    pub fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            charset: self.display.charset.resolve(),
            from_width: self.display.from_width,
            recycle_threshold: self.performance.recycle_threshold,
            sweep_chunk_size: self.performance.sweep_chunk_size,
            use_mmap: self.performance.use_mmap,
            ..ScanOptions::default()
        }
    }
}

// ── Load ────────────────────────────────────────────────────────

/// Load configuration, searching standard locations.
///
/// Returns the default configuration if no file is found or on parse error.
pub fn load_config() -> Config {
    if let Some(path) = config_file_path() {
        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(contents) => match toml::from_str::<Config>(&contents) {
                    Ok(cfg) => {
                        tracing::info!(path = %path.display(), "Loaded config");
                        return cfg;
                    }
                    Err(e) => {
                        tracing::warn!(
                            path = %path.display(),
                            error = %e,
                            "Failed to parse config, using defaults"
                        );
                    }
                },
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Failed to read config file, using defaults"
                    );
                }
            }
        }
    }
    Config::default()
}

/// Determine the config file path (checking env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(env_path) = std::env::var("MBOXFRM_CONFIG") {
        return Some(PathBuf::from(env_path));
    }

    dirs::config_dir().map(|d| d.join("mboxfrm").join("config.toml"))
}
