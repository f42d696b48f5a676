//! Logger bootstrap shared by binaries built on the event core.

use crate::error::Result;

/// Initialises `env_logger`, defaulting to `level` when `RUST_LOG` is unset.
///
/// # Returns
///
/// * `Err(EventError::Logger)` if a logger was already installed.
pub fn init(level: &str) -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).try_init()?;
    Ok(())
}
