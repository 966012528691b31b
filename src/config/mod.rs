//! Process-wide polling defaults.
//!
//! Polled assertions that do not set their own timeout or interval use the
//! values here. They are loaded once from the environment:
//!
//! | Variable | Default |
//! |---|---|
//! | `TESTKIT_POLL_EVENTUALLY_TIMEOUT` | `1s` |
//! | `TESTKIT_POLL_EVENTUALLY_POLLING_INTERVAL` | `10ms` |
//! | `TESTKIT_POLL_CONSISTENTLY_DURATION` | `100ms` |
//! | `TESTKIT_POLL_CONSISTENTLY_POLLING_INTERVAL` | `10ms` |
//!
//! Values take a unit suffix (`ns`, `us`, `ms`, `s`, `m`, `h`); a bare number
//! is seconds. Unparseable values are logged and ignored. The `set_default_*`
//! functions override the loaded values for the rest of the process.
//!
//! # Example
//!
//! ```rust
//! use testkit_poll::config::{parse_duration, Defaults};
//! use std::time::Duration;
//!
//! assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
//!
//! let defaults = Defaults::new().eventually_timeout(Duration::from_secs(5));
//! assert_eq!(defaults.eventually_timeout, Duration::from_secs(5));
//! assert_eq!(defaults.eventually_interval, Duration::from_millis(10));
//! ```

use std::sync::OnceLock;
use std::time::Duration;

use parking_lot::RwLock;
use thiserror::Error;
use tracing::warn;

/// Environment variable for the default `eventually` timeout.
pub const EVENTUALLY_TIMEOUT_VAR: &str = "TESTKIT_POLL_EVENTUALLY_TIMEOUT";
/// Environment variable for the default `eventually` polling interval.
pub const EVENTUALLY_INTERVAL_VAR: &str = "TESTKIT_POLL_EVENTUALLY_POLLING_INTERVAL";
/// Environment variable for the default `consistently` duration.
pub const CONSISTENTLY_DURATION_VAR: &str = "TESTKIT_POLL_CONSISTENTLY_DURATION";
/// Environment variable for the default `consistently` polling interval.
pub const CONSISTENTLY_INTERVAL_VAR: &str = "TESTKIT_POLL_CONSISTENTLY_POLLING_INTERVAL";

/// Errors from reading configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The text is not a duration.
    #[error("invalid duration {0:?}")]
    InvalidDuration(String),

    /// The duration is zero, which no polling policy accepts.
    #[error("duration must be greater than zero, got {0:?}")]
    ZeroDuration(String),
}

/// Default timing for polled assertions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Defaults {
    /// Timeout for `eventually`.
    pub eventually_timeout: Duration,
    /// Polling interval for `eventually`.
    pub eventually_interval: Duration,
    /// Observation window for `consistently`.
    pub consistently_duration: Duration,
    /// Polling interval for `consistently`.
    pub consistently_interval: Duration,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            eventually_timeout: Duration::from_secs(1),
            eventually_interval: Duration::from_millis(10),
            consistently_duration: Duration::from_millis(100),
            consistently_interval: Duration::from_millis(10),
        }
    }
}

impl Defaults {
    /// The built-in defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the `eventually` timeout.
    #[must_use]
    pub fn eventually_timeout(mut self, timeout: Duration) -> Self {
        self.eventually_timeout = timeout;
        self
    }

    /// Set the `eventually` polling interval.
    #[must_use]
    pub fn eventually_interval(mut self, interval: Duration) -> Self {
        self.eventually_interval = interval;
        self
    }

    /// Set the `consistently` duration.
    #[must_use]
    pub fn consistently_duration(mut self, duration: Duration) -> Self {
        self.consistently_duration = duration;
        self
    }

    /// Set the `consistently` polling interval.
    #[must_use]
    pub fn consistently_interval(mut self, interval: Duration) -> Self {
        self.consistently_interval = interval;
        self
    }

    /// Built-in defaults overridden by the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Built-in defaults overridden by whatever `lookup` returns per variable.
    #[must_use]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut defaults = Self::default();
        let fields: [(&str, &mut Duration); 4] = [
            (EVENTUALLY_TIMEOUT_VAR, &mut defaults.eventually_timeout),
            (EVENTUALLY_INTERVAL_VAR, &mut defaults.eventually_interval),
            (CONSISTENTLY_DURATION_VAR, &mut defaults.consistently_duration),
            (CONSISTENTLY_INTERVAL_VAR, &mut defaults.consistently_interval),
        ];
        for (name, field) in fields {
            let Some(raw) = lookup(name) else { continue };
            match parse_duration(&raw) {
                Ok(duration) => *field = duration,
                Err(err) => warn!(variable = name, error = %err, "ignoring polling default"),
            }
        }
        defaults
    }
}

/// Parse a duration such as `250ms`, `1.5s` or `2m`. A bare number is seconds.
///
/// # Errors
///
/// Returns [`ConfigError`] for malformed text or a zero duration.
pub fn parse_duration(text: &str) -> Result<Duration, ConfigError> {
    let trimmed = text.trim();
    let split = trimmed
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(trimmed.len());
    let (number, unit) = trimmed.split_at(split);
    let amount: f64 = number
        .parse()
        .map_err(|_| ConfigError::InvalidDuration(text.to_string()))?;
    let seconds_per_unit = match unit.trim() {
        "" | "s" => 1.0,
        "ns" => 1e-9,
        "us" | "µs" => 1e-6,
        "ms" => 1e-3,
        "m" => 60.0,
        "h" => 3600.0,
        _ => return Err(ConfigError::InvalidDuration(text.to_string())),
    };
    let duration = Duration::try_from_secs_f64(amount * seconds_per_unit)
        .map_err(|_| ConfigError::InvalidDuration(text.to_string()))?;
    if duration.is_zero() {
        return Err(ConfigError::ZeroDuration(text.to_string()));
    }
    Ok(duration)
}

fn store() -> &'static RwLock<Defaults> {
    static DEFAULTS: OnceLock<RwLock<Defaults>> = OnceLock::new();
    DEFAULTS.get_or_init(|| RwLock::new(Defaults::from_env()))
}

/// The current process-wide defaults.
#[must_use]
pub fn defaults() -> Defaults {
    *store().read()
}

/// Replace the process-wide defaults.
pub fn set_defaults(defaults: Defaults) {
    *store().write() = defaults;
}

/// Reload the process-wide defaults from the environment.
pub fn reset_defaults() {
    set_defaults(Defaults::from_env());
}

/// Set the default `eventually` timeout.
pub fn set_default_eventually_timeout(timeout: Duration) {
    store().write().eventually_timeout = timeout;
}

/// Set the default `eventually` polling interval.
pub fn set_default_eventually_polling_interval(interval: Duration) {
    store().write().eventually_interval = interval;
}

/// Set the default `consistently` duration.
pub fn set_default_consistently_duration(duration: Duration) {
    store().write().consistently_duration = duration;
}

/// Set the default `consistently` polling interval.
pub fn set_default_consistently_polling_interval(interval: Duration) {
    store().write().consistently_interval = interval;
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use serial_test::serial;
    use tracing_test::traced_test;

    use super::*;

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("1.5s").unwrap(), Duration::from_millis(1500));
        assert_eq!(parse_duration("1m").unwrap(), Duration::from_secs(60));
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
        assert_eq!(parse_duration(" 10us ").unwrap(), Duration::from_micros(10));
    }

    #[test]
    fn test_parse_duration_errors() {
        assert!(matches!(
            parse_duration("soon"),
            Err(ConfigError::InvalidDuration(_))
        ));
        assert!(matches!(
            parse_duration("5 fortnights"),
            Err(ConfigError::InvalidDuration(_))
        ));
        assert!(matches!(
            parse_duration("0ms"),
            Err(ConfigError::ZeroDuration(_))
        ));
    }

    #[test]
    fn test_builder() {
        let defaults = Defaults::new()
            .eventually_timeout(Duration::from_secs(2))
            .eventually_interval(Duration::from_millis(5))
            .consistently_duration(Duration::from_millis(50))
            .consistently_interval(Duration::from_millis(1));

        assert_eq!(defaults.eventually_timeout, Duration::from_secs(2));
        assert_eq!(defaults.eventually_interval, Duration::from_millis(5));
        assert_eq!(defaults.consistently_duration, Duration::from_millis(50));
        assert_eq!(defaults.consistently_interval, Duration::from_millis(1));
    }

    #[test]
    fn test_from_lookup() {
        let env: HashMap<&str, &str> = [
            (EVENTUALLY_TIMEOUT_VAR, "5s"),
            (CONSISTENTLY_INTERVAL_VAR, "20ms"),
        ]
        .into_iter()
        .collect();
        let defaults = Defaults::from_lookup(|name| env.get(name).map(ToString::to_string));

        assert_eq!(defaults.eventually_timeout, Duration::from_secs(5));
        assert_eq!(defaults.eventually_interval, Duration::from_millis(10));
        assert_eq!(defaults.consistently_interval, Duration::from_millis(20));
    }

    #[test]
    #[traced_test]
    fn test_bad_value_is_logged_and_ignored() {
        let defaults = Defaults::from_lookup(|name| {
            (name == EVENTUALLY_TIMEOUT_VAR).then(|| "whenever".to_string())
        });
        assert_eq!(defaults.eventually_timeout, Duration::from_secs(1));
        assert!(logs_contain("ignoring polling default"));
        assert!(logs_contain(EVENTUALLY_TIMEOUT_VAR));
    }

    #[test]
    #[serial]
    fn test_setters_update_process_defaults() {
        set_defaults(Defaults::new());
        set_default_eventually_timeout(Duration::from_secs(3));
        set_default_consistently_polling_interval(Duration::from_millis(2));

        let current = defaults();
        assert_eq!(current.eventually_timeout, Duration::from_secs(3));
        assert_eq!(current.consistently_interval, Duration::from_millis(2));

        set_defaults(Defaults::new());
        assert_eq!(defaults(), Defaults::new());
    }
}
