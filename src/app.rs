//! One invocation of the probe, logged through an explicit logger.

use crate::config::ProbeConfig;
use crate::logging::ProbeLogger;
use crate::probe::{run_healthcheck, Outcome};

/// Log the "starting" line, probe the configured target once and return the
/// outcome. All events go to `logger`.
pub async fn run(config: &ProbeConfig, logger: &ProbeLogger) -> Outcome {
    let target = config.target();

    logger
        .scope(async {
            tracing::info!(
                url = target.url(),
                "Starting Health Check to {}",
                target.url()
            );
            run_healthcheck(&target).await
        })
        .await
}
