//! Layered messaging configuration.
//!
//! Values come from built-in defaults, then an optional file, then `MESSAGING_*`
//! environment variables (e.g. `MESSAGING_APP_NAME`).

use crate::error::{EventError, Result};
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

const DEFAULT_DEDUP_MAX_LIFE: &str = "10 seconds";
const DEFAULT_LOG_LEVEL: &str = "info";

const MS_PER_SECOND: f64 = 1_000.0;
const MS_PER_MINUTE: f64 = 60.0 * MS_PER_SECOND;
const MS_PER_HOUR: f64 = 60.0 * MS_PER_MINUTE;
const MS_PER_DAY: f64 = 24.0 * MS_PER_HOUR;
const MS_PER_YEAR: f64 = 365.25 * MS_PER_DAY;

lazy_static! {
    /// Accepted unit spellings and their length in milliseconds.
    static ref TIME_UNITS: HashMap<&'static str, f64> = {
        let mut units = HashMap::new();
        for unit in ["ms", "msec", "millisecond", "milliseconds"] {
            units.insert(unit, 1.0);
        }
        for unit in ["s", "sec", "secs", "second", "seconds"] {
            units.insert(unit, MS_PER_SECOND);
        }
        for unit in ["m", "min", "mins", "minute", "minutes"] {
            units.insert(unit, MS_PER_MINUTE);
        }
        for unit in ["h", "hr", "hrs", "hour", "hours"] {
            units.insert(unit, MS_PER_HOUR);
        }
        for unit in ["d", "day", "days"] {
            units.insert(unit, MS_PER_DAY);
        }
        for unit in ["w", "wk", "week", "weeks"] {
            units.insert(unit, 7.0 * MS_PER_DAY);
        }
        for unit in ["y", "yr", "year", "years"] {
            units.insert(unit, MS_PER_YEAR);
        }
        units
    };
}

/// Settings for one messaging context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessagingConfig {
    /// Application name announced in the publisher info.
    #[serde(default)]
    app_name: Option<String>,

    /// Node identifier announced in the publisher info.
    #[serde(default)]
    node_id: Option<String>,

    /// How long a publication id is remembered for duplicate suppression.
    #[serde(default = "default_dedup_max_life")]
    dedup_max_life: String,

    #[serde(default = "default_log_level")]
    log_level: String,
}

fn default_dedup_max_life() -> String {
    DEFAULT_DEDUP_MAX_LIFE.to_string()
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

impl Default for MessagingConfig {
    fn default() -> Self {
        Self {
            app_name: None,
            node_id: None,
            dedup_max_life: default_dedup_max_life(),
            log_level: default_log_level(),
        }
    }
}

impl MessagingConfig {
    /// Loads the configuration from defaults, an optional file and the environment.
    ///
    /// # Arguments
    ///
    /// * `path` - Optional configuration file; its format follows the extension
    ///   (toml, json, yaml). A missing file is not an error.
    ///
    /// # Returns
    ///
    /// * `Ok(MessagingConfig)` on success.
    /// * `Err(EventError::Config)` if a source is malformed.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder()
            .set_default("dedup_max_life", DEFAULT_DEDUP_MAX_LIFE)?
            .set_default("log_level", DEFAULT_LOG_LEVEL)?;

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(false));
        }

        let settings = builder
            .add_source(config::Environment::with_prefix("MESSAGING"))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    pub fn with_app_name(mut self, app_name: impl Into<String>) -> Self {
        self.app_name = Some(app_name.into());
        self
    }

    pub fn with_node_id(mut self, node_id: impl Into<String>) -> Self {
        self.node_id = Some(node_id.into());
        self
    }

    pub fn with_dedup_max_life(mut self, expression: impl Into<String>) -> Self {
        self.dedup_max_life = expression.into();
        self
    }

    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    pub fn app_name(&self) -> Option<&str> {
        self.app_name.as_deref()
    }

    pub fn node_id(&self) -> Option<&str> {
        self.node_id.as_deref()
    }

    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    /// Returns the duplicate suppression window.
    ///
    /// # Returns
    ///
    /// * `Err(EventError::InvalidElapsed)` if the configured expression cannot be parsed.
    pub fn dedup_max_life(&self) -> Result<Duration> {
        parse_elapsed(&self.dedup_max_life)
    }
}

/// Parses an elapsed-time expression such as `"10 seconds"`, `"1.5 min"` or `"250"`.
///
/// A bare number is read as milliseconds. Units are case-insensitive.
///
/// # Returns
///
/// * `Ok(Duration)` on success.
/// * `Err(EventError::InvalidElapsed)` for unknown units, non-numeric or negative values,
///   or a duration too long to count in nanoseconds.
pub fn parse_elapsed(expression: &str) -> Result<Duration> {
    let invalid = || EventError::InvalidElapsed(expression.to_string());
    let trimmed = expression.trim();

    let split = trimmed
        .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '-' || c == '+'))
        .unwrap_or(trimmed.len());
    let (number, unit) = trimmed.split_at(split);

    let value: f64 = number.parse().map_err(|_| invalid())?;
    let unit = unit.trim().to_ascii_lowercase();
    let factor = if unit.is_empty() {
        1.0
    } else {
        *TIME_UNITS.get(unit.as_str()).ok_or_else(invalid)?
    };

    let nanos = (value * factor * 1_000_000.0).round();
    // `u64::MAX as f64` rounds up to 2^64, which is already out of range.
    if !nanos.is_finite() || nanos < 0.0 || nanos >= u64::MAX as f64 {
        return Err(invalid());
    }

    Ok(Duration::from_nanos(nanos as u64))
}
