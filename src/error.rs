//! Error types for the probe and for process startup.

use crate::config::ConfigError;
use crate::logging::LoggingError;

/// Why a probe failed. Both variants map to exit code 1.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("{0}")]
    RequestBuild(String),

    #[error("{}", error_chain(.0))]
    Transport(#[source] reqwest::Error),

    #[error("Failed to create HTTP client: {}", error_chain(.0))]
    Client(#[source] reqwest::Error),
}

impl ProbeError {
    /// Classify a client error by where it happened. Builder errors (bad URL,
    /// unsupported scheme) never reach the network.
    pub fn from_send(err: reqwest::Error) -> Self {
        if err.is_builder() {
            ProbeError::RequestBuild(err.to_string())
        } else {
            ProbeError::Transport(err)
        }
    }
}

/// Render an error with its sources, e.g. "error sending request for url
/// (...): client error (Connect): tcp connect error: Connection refused".
/// reqwest keeps the useful part (refused, timed out, DNS) in the sources.
pub fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.ends_with(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}

/// Startup failures, reported on stderr before the probe runs.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Logging(#[from] LoggingError),
}
