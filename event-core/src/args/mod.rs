//! Defines the standard command-line arguments for binaries hosting a messaging context.
//!
//! Command-line values override the layered `MessagingConfig` they are applied to.

use crate::config::MessagingConfig;
use crate::error::Result;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// Holds the standard parameters parsed from the command line.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct CommonArgs {
    /// Path to a messaging configuration file (toml, json or yaml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Application name announced to peers
    #[arg(short, long)]
    app_name: Option<String>,

    /// Log level used when RUST_LOG is not set
    #[arg(long)]
    log_level: Option<String>,

    /// How long to collect ping responses, in milliseconds
    #[arg(long, default_value_t = 500)]
    ping_timeout_ms: u64,
}

impl CommonArgs {
    /// Parses command-line arguments into a `CommonArgs` struct.
    ///
    /// `--help` and `--version` are handled by `clap`; invalid input exits the process.
    pub fn parse_args(args: Vec<String>) -> Self {
        CommonArgs::parse_from(args)
    }

    /// Loads the layered configuration and applies the command-line overrides.
    pub fn load_config(&self) -> Result<MessagingConfig> {
        let mut config = MessagingConfig::load(self.config.as_deref())?;
        if let Some(app_name) = &self.app_name {
            config = config.with_app_name(app_name.clone());
        }
        if let Some(level) = &self.log_level {
            config = config.with_log_level(level.clone());
        }
        Ok(config)
    }

    pub fn get_ping_timeout(&self) -> Duration {
        Duration::from_millis(self.ping_timeout_ms)
    }
}
