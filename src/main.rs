//! healthprobe: container health-check probe.
//!
//! This is the process entry point. It parses arguments, resolves the
//! configuration, builds the logger, runs a single probe and exits with 0
//! when the endpoint answered or 1 on any failure.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use healthprobe::config::{
    ConfigOverrides, LogFormat, ProbeConfig, EXIT_CODE_ERROR, LOG_FILTER_ENV,
};
use healthprobe::logging::LogFilter;
use healthprobe::{app, AppError, ProbeLogger};

/// healthprobe: HTTP HEAD health check for container orchestrators
#[derive(Parser, Debug)]
#[command(name = "healthprobe", version, about)]
struct Args {
    /// Path to configuration file (optional; built-in defaults otherwise)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// URL to probe (default: http://localhost:8080/health)
    #[arg(short, long)]
    url: Option<String>,

    /// Request timeout in seconds (default: 5)
    #[arg(short, long)]
    timeout_seconds: Option<u64>,

    /// Log level filter (e.g., "healthprobe=debug"); overrides HEALTHPROBE_LOG
    #[arg(short, long)]
    log_level: Option<String>,

    /// Log format
    #[arg(long, value_enum)]
    log_format: Option<LogFormat>,

    /// Log destination: "stdout", "stderr" or a file path (default: /proc/1/fd/1)
    #[arg(short = 'o', long)]
    log_output: Option<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();

    match run(args).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("healthprobe: {}", e);
            ExitCode::from(EXIT_CODE_ERROR)
        }
    }
}

async fn run(args: Args) -> Result<ExitCode, AppError> {
    let overrides = ConfigOverrides {
        url: args.url,
        timeout_seconds: args.timeout_seconds,
        log_format: args.log_format,
        log_output: args.log_output,
    };
    let config = ProbeConfig::resolve(args.config.as_deref(), overrides)?;

    // Priority: CLI > env > config file > default
    let log_filter = LogFilter::resolve(
        args.log_level,
        std::env::var(LOG_FILTER_ENV).ok(),
        config.logging.filter.as_deref(),
    );
    let logger = ProbeLogger::new(&config.logging, &log_filter)?;

    let outcome = app::run(&config, &logger).await;
    Ok(outcome.exit_code())
}
