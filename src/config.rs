//! Configuration loading and constants.
//!
//! The probe works with no configuration at all: every setting has a
//! compiled-in default matching the container health-check contract. A TOML
//! file and command-line flags can override the target and logging settings.
//! `ProbeConfig` is the root configuration struct.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use const_format::formatcp;
use serde::Deserialize;

use crate::probe::Target;

// =============================================================================
// Probe Target
// =============================================================================

/// Host of the service being probed (the container itself)
pub const DEFAULT_HOST: &str = "localhost";

/// Port of the service being probed
pub const DEFAULT_PORT: u16 = 8080;

/// Health endpoint path
pub const DEFAULT_PATH: &str = "/health";

/// Full default probe URL
pub const DEFAULT_URL: &str = formatcp!("http://{}:{}{}", DEFAULT_HOST, DEFAULT_PORT, DEFAULT_PATH);

/// Request timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 5;

// =============================================================================
// Process Exit Codes
// =============================================================================

/// Exit code for a completed HTTP exchange
pub const EXIT_CODE_SUCCESS: u8 = 0;

/// Exit code for any failure (request build, transport, startup)
pub const EXIT_CODE_ERROR: u8 = 1;

// =============================================================================
// Logging
// =============================================================================

/// Standard output of PID 1, i.e. the container's primary output stream
pub const DEFAULT_LOG_OUTPUT: &str = "/proc/1/fd/1";

/// Default log filter when neither --log-level, HEALTHPROBE_LOG nor the config file set one
pub const DEFAULT_LOG_FILTER: &str = "healthprobe=info";

/// Environment variable for the log filter. RUST_LOG is left to the service
/// being checked, which shares the container environment.
pub const LOG_FILTER_ENV: &str = "HEALTHPROBE_LOG";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProbeConfig {
    /// Endpoint to probe
    #[serde(default)]
    pub target: TargetConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Probe target configuration
#[derive(Debug, Clone, Deserialize)]
pub struct TargetConfig {
    #[serde(default = "TargetConfig::default_url")]
    pub url: String,
    /// Request timeout in seconds, covering connect through response headers
    #[serde(default = "TargetConfig::default_timeout")]
    pub timeout_seconds: u64,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            url: Self::default_url(),
            timeout_seconds: Self::default_timeout(),
        }
    }
}

impl TargetConfig {
    fn default_url() -> String {
        DEFAULT_URL.to_string()
    }

    fn default_timeout() -> u64 {
        DEFAULT_TIMEOUT_SECS
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// Log line format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per line
    #[default]
    Json,
    /// Human-readable lines
    Text,
}

/// Where log lines are written
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum LogOutput {
    Stdout,
    Stderr,
    File(PathBuf),
}

impl Default for LogOutput {
    fn default() -> Self {
        LogOutput::from(DEFAULT_LOG_OUTPUT)
    }
}

impl From<&str> for LogOutput {
    fn from(value: &str) -> Self {
        match value {
            "stdout" | "-" => LogOutput::Stdout,
            "stderr" => LogOutput::Stderr,
            path => LogOutput::File(PathBuf::from(path)),
        }
    }
}

impl From<String> for LogOutput {
    fn from(value: String) -> Self {
        LogOutput::from(value.as_str())
    }
}

impl fmt::Display for LogOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogOutput::Stdout => write!(f, "stdout"),
            LogOutput::Stderr => write!(f, "stderr"),
            LogOutput::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingConfig {
    /// Log format: "json" (structured, default) or "text" (human-readable)
    #[serde(default)]
    pub format: LogFormat,
    /// "stdout", "stderr" or a file path (default: /proc/1/fd/1)
    #[serde(default)]
    pub output: LogOutput,
    /// Filter directive, used when neither --log-level nor HEALTHPROBE_LOG is set
    pub filter: Option<String>,
}

/// Values given on the command line, taking precedence over the config file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub url: Option<String>,
    pub timeout_seconds: Option<u64>,
    pub log_format: Option<LogFormat>,
    pub log_output: Option<String>,
}

impl ProbeConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        let config: ProbeConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` if given, otherwise start from the defaults, then
    /// apply command-line overrides.
    pub fn resolve(path: Option<&Path>, overrides: ConfigOverrides) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        config.apply(overrides);
        config.validate()?;
        Ok(config)
    }

    pub fn apply(&mut self, overrides: ConfigOverrides) {
        if let Some(url) = overrides.url {
            self.target.url = url;
        }
        if let Some(timeout_seconds) = overrides.timeout_seconds {
            self.target.timeout_seconds = timeout_seconds;
        }
        if let Some(format) = overrides.log_format {
            self.logging.format = format;
        }
        if let Some(output) = overrides.log_output {
            self.logging.output = LogOutput::from(output);
        }
    }

    // The URL is not checked here; the probe reports a malformed URL itself.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.target.timeout_seconds == 0 {
            return Err(ConfigError::Validation(
                "target.timeout_seconds must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn target(&self) -> Target {
        Target::new(self.target.url.clone(), self.target.timeout())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Configuration error: {0}")]
    Validation(String),
}
