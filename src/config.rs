//! Runtime configuration, read from environment variables.
//!
//! | Variable                 | Default                       |
//! |--------------------------|-------------------------------|
//! | `DOCKER_HOST`            | `unix:///var/run/docker.sock` |
//! | `MEMORY_METRICS_PERIOD`  | `10` (seconds)                |
//! | `MEMORY_METRICS_TIMEOUT` | the period                    |
//! | `MEMORY_METRICS_DEDOT`   | `true`                        |

use std::time::Duration;

pub const HOST_VAR: &str = "DOCKER_HOST";
pub const PERIOD_VAR: &str = "MEMORY_METRICS_PERIOD";
pub const TIMEOUT_VAR: &str = "MEMORY_METRICS_TIMEOUT";
pub const DEDOT_VAR: &str = "MEMORY_METRICS_DEDOT";

pub const DEFAULT_HOST: &str = "unix:///var/run/docker.sock";
pub const DEFAULT_PERIOD: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("environment variable `{var}` must be a positive number of seconds, got `{value}`")]
    InvalidDuration { var: &'static str, value: String },
    #[error("environment variable `{var}` must be `true` or `false`, got `{value}`")]
    InvalidBool { var: &'static str, value: String },
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Docker daemon endpoint.
    pub host: String,
    /// Time between two collection cycles.
    pub period: Duration,
    /// Upper bound for fetching the stats of one cycle.
    pub timeout: Duration,
    /// Replace `.` in label and category names with `_`.
    pub dedot: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_owned(),
            period: DEFAULT_PERIOD,
            timeout: DEFAULT_PERIOD,
            dedot: true,
        }
    }
}

impl Config {
    /// Reads the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set to a value that cannot be parsed.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Reads the configuration through `lookup`, which maps a variable name to
    /// its value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let host = lookup(HOST_VAR)
            .map(|host| host.trim().to_owned())
            .filter(|host| !host.is_empty())
            .unwrap_or_else(|| DEFAULT_HOST.to_owned());
        let period = lookup(PERIOD_VAR)
            .map(|value| parse_seconds(PERIOD_VAR, value))
            .transpose()?
            .unwrap_or(DEFAULT_PERIOD);
        let timeout = lookup(TIMEOUT_VAR)
            .map(|value| parse_seconds(TIMEOUT_VAR, value))
            .transpose()?
            .unwrap_or(period);
        let dedot = lookup(DEDOT_VAR)
            .map(|value| parse_bool(DEDOT_VAR, value))
            .transpose()?
            .unwrap_or(true);

        Ok(Self {
            host,
            period,
            timeout,
            dedot,
        })
    }
}

fn parse_seconds(var: &'static str, value: String) -> Result<Duration> {
    let duration = value
        .trim()
        .parse::<f64>()
        .ok()
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok());
    match duration {
        // Values below one nanosecond round down to zero.
        Some(duration) if !duration.is_zero() => Ok(duration),
        _ => Err(Error::InvalidDuration { var, value }),
    }
}

fn parse_bool(var: &'static str, value: String) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(Error::InvalidBool { var, value }),
    }
}
