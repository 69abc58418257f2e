//! The probe: one HTTP HEAD request, one outcome.
//!
//! Any completed HTTP exchange counts as healthy, whatever the status code.
//! The probe answers "is the service reachable", not "is it happy"; only a
//! request that cannot be built or cannot complete is a failure.

use std::process::ExitCode;
use std::time::Duration;

use reqwest::{StatusCode, Url};

use crate::config::{EXIT_CODE_ERROR, EXIT_CODE_SUCCESS};
use crate::error::ProbeError;

/// Endpoint and timeout, fixed for the process lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    url: String,
    timeout: Duration,
}

impl Target {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            timeout,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// Result of a single probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The server answered, with any status
    Success(StatusCode),
    /// The request could not be constructed; nothing was sent
    RequestBuildError(String),
    /// The request was sent but no response arrived (refused, DNS, timeout)
    RequestError(String),
}

impl From<ProbeError> for Outcome {
    fn from(err: ProbeError) -> Self {
        match err {
            ProbeError::RequestBuild(message) => Outcome::RequestBuildError(message),
            err @ (ProbeError::Transport(_) | ProbeError::Client(_)) => {
                Outcome::RequestError(err.to_string())
            }
        }
    }
}

impl Outcome {
    pub fn is_healthy(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    /// Process exit code: 0 for any response, 1 otherwise.
    pub fn code(&self) -> u8 {
        if self.is_healthy() {
            EXIT_CODE_SUCCESS
        } else {
            EXIT_CODE_ERROR
        }
    }

    pub fn exit_code(&self) -> ExitCode {
        ExitCode::from(self.code())
    }

    /// Emit the single outcome line for this probe.
    pub fn log(&self, url: &str) {
        match self {
            Outcome::Success(status) => {
                tracing::info!(
                    url,
                    status = status.as_u16(),
                    "Health check {}: HTTP status code {}",
                    url,
                    status_line(*status)
                );
            }
            Outcome::RequestBuildError(message) => {
                tracing::error!(url, "error creating healthcheck request: {}", message);
            }
            Outcome::RequestError(message) => {
                tracing::error!(url, "Health check {}: Error {}", url, message);
            }
        }
    }
}

/// Status code and reason phrase, e.g. "200 OK". Codes without a registered
/// reason render as the bare number.
pub fn status_line(status: StatusCode) -> String {
    match status.canonical_reason() {
        Some(reason) => format!("{} {}", status.as_u16(), reason),
        None => status.as_u16().to_string(),
    }
}

/// Sends the HEAD request for one target.
pub struct Prober {
    client: reqwest::Client,
    target: Target,
}

impl Prober {
    /// Create a prober whose client enforces the target's timeout over the
    /// whole exchange, redirects included. Redirects are followed (up to 10);
    /// the final response decides the outcome.
    pub fn new(target: Target) -> Result<Self, ProbeError> {
        let client = reqwest::Client::builder()
            .timeout(target.timeout)
            .build()
            .map_err(ProbeError::Client)?;

        Ok(Self { client, target })
    }

    /// Build, send and interpret the request. Does not log.
    pub async fn probe(&self) -> Outcome {
        match self.send().await {
            Ok(status) => Outcome::Success(status),
            Err(e) => Outcome::from(e),
        }
    }

    async fn send(&self) -> Result<StatusCode, ProbeError> {
        let url = Url::parse(&self.target.url).map_err(|e| {
            ProbeError::RequestBuild(format!("parse {:?}: {}", self.target.url, e))
        })?;

        let request = self.client.head(url).build().map_err(ProbeError::from_send)?;
        let response = self
            .client
            .execute(request)
            .await
            .map_err(ProbeError::from_send)?;

        let status = response.status();
        // Release the connection; a HEAD response carries no body to read.
        drop(response);
        Ok(status)
    }
}

/// Probe `target` once and log the outcome.
///
/// The caller logs the "starting" line; this emits exactly one outcome line
/// at `info` (success) or `error` (failure), plus a `debug` line before the
/// attempt.
pub async fn run_healthcheck(target: &Target) -> Outcome {
    tracing::debug!(
        url = target.url(),
        timeout_ms = target.timeout().as_millis(),
        "Querying Endpoint {}",
        target.url()
    );

    let outcome = match Prober::new(target.clone()) {
        Ok(prober) => prober.probe().await,
        Err(e) => Outcome::from(e),
    };

    outcome.log(target.url());
    outcome
}
