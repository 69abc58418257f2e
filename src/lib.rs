//! healthprobe: a single-shot HTTP health check for container orchestrators.
//!
//! Sends one HEAD request to a configured endpoint, logs the outcome as
//! structured JSON and reports reachability through the process exit code.

pub mod app;
pub mod config;
pub mod error;
pub mod logging;
pub mod probe;

pub use config::{ConfigOverrides, ProbeConfig};
pub use error::{AppError, ProbeError};
pub use logging::{LogFilter, ProbeLogger};
pub use probe::{run_healthcheck, Outcome, Prober, Target};
