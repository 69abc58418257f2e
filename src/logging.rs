//! Logger for a single probe run.
//!
//! No global subscriber is installed. `ProbeLogger` owns a `tracing`
//! dispatcher built at startup and passed to whatever needs to log; code runs
//! inside its scope via [`ProbeLogger::in_scope`] or [`ProbeLogger::scope`].
//! The output handle is opened once and closed when the logger is dropped.

use std::fs::OpenOptions;
use std::future::Future;
use std::io;
use std::sync::Mutex;

use tracing::instrument::{WithDispatch, WithSubscriber};
use tracing::Dispatch;
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::EnvFilter;

use crate::config::{LogFormat, LogOutput, LoggingConfig, DEFAULT_LOG_FILTER};

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Invalid log filter '{filter}': {source}")]
    Filter {
        filter: String,
        #[source]
        source: ParseError,
    },
}

/// Filter directives and where they came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogFilter {
    /// Given with --log-level; invalid directives are a startup error.
    Explicit(String),
    /// From the environment, the config file or the default. Invalid
    /// directives are replaced by the default filter and reported as a warning.
    Inherited(String),
}

impl LogFilter {
    /// Pick the filter with priority: CLI > env > config file > default.
    pub fn resolve(cli: Option<String>, env: Option<String>, configured: Option<&str>) -> Self {
        match cli {
            Some(directives) => LogFilter::Explicit(directives),
            None => LogFilter::Inherited(
                env.or_else(|| configured.map(str::to_string))
                    .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string()),
            ),
        }
    }

    pub fn directives(&self) -> &str {
        match self {
            LogFilter::Explicit(directives) | LogFilter::Inherited(directives) => directives,
        }
    }

    /// Returns the filter, plus the parse error when inherited directives
    /// were rejected in favor of the default.
    fn parse(&self) -> Result<(EnvFilter, Option<ParseError>), LoggingError> {
        match self {
            LogFilter::Explicit(directives) => EnvFilter::try_new(directives)
                .map(|filter| (filter, None))
                .map_err(|source| LoggingError::Filter {
                    filter: directives.clone(),
                    source,
                }),
            LogFilter::Inherited(directives) => Ok(match EnvFilter::try_new(directives) {
                Ok(filter) => (filter, None),
                Err(e) => (EnvFilter::new(DEFAULT_LOG_FILTER), Some(e)),
            }),
        }
    }
}

#[derive(Clone)]
pub struct ProbeLogger {
    dispatch: Dispatch,
}

impl ProbeLogger {
    /// Build a logger writing to the configured output.
    ///
    /// A file output that cannot be opened (e.g. `/proc/1/fd/1` outside a
    /// container) falls back to stdout. Each fallback, for the output or for
    /// rejected inherited filter directives, is logged as one `warn` line
    /// before anything else.
    pub fn new(config: &LoggingConfig, filter: &LogFilter) -> Result<Self, LoggingError> {
        Self::build(config, filter, BoxMakeWriter::new(io::stdout))
    }

    fn build(
        config: &LoggingConfig,
        filter: &LogFilter,
        fallback: BoxMakeWriter,
    ) -> Result<Self, LoggingError> {
        let (env_filter, rejected) = filter.parse()?;
        let (writer, open_error) = match open_output(&config.output) {
            Ok(writer) => (writer, None),
            Err(e) => (fallback, Some(e)),
        };

        let logger = Self::assemble(config.format, env_filter, writer);
        logger.in_scope(|| {
            if let Some(e) = &open_error {
                tracing::warn!(
                    output = %config.output,
                    error = %e,
                    "Failed to open log output, logging to stdout"
                );
            }
            if let Some(e) = &rejected {
                tracing::warn!(
                    filter = filter.directives(),
                    error = %e,
                    "Invalid log filter, using {}",
                    DEFAULT_LOG_FILTER
                );
            }
        });
        Ok(logger)
    }

    /// Build a logger over any writer factory. Invalid directives are skipped.
    pub fn with_writer<W>(format: LogFormat, filter: &str, make_writer: W) -> Self
    where
        W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
    {
        Self::assemble(format, EnvFilter::new(filter), make_writer)
    }

    fn assemble<W>(format: LogFormat, env_filter: EnvFilter, make_writer: W) -> Self
    where
        W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
    {
        let registry = tracing_subscriber::registry().with(env_filter);

        let dispatch = match format {
            LogFormat::Json => Dispatch::new(
                registry.with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .flatten_event(true)
                        .with_current_span(false)
                        .with_span_list(false)
                        .with_writer(make_writer),
                ),
            ),
            LogFormat::Text => Dispatch::new(
                registry.with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(make_writer),
                ),
            ),
        };

        Self { dispatch }
    }

    /// Run `f` with this logger as the default dispatcher.
    pub fn in_scope<T>(&self, f: impl FnOnce() -> T) -> T {
        tracing::dispatcher::with_default(&self.dispatch, f)
    }

    /// Attach this logger to `future` for every poll.
    pub fn scope<F: Future>(&self, future: F) -> WithDispatch<F> {
        future.with_subscriber(self.dispatch.clone())
    }
}

fn open_output(output: &LogOutput) -> io::Result<BoxMakeWriter> {
    match output {
        LogOutput::Stdout => Ok(BoxMakeWriter::new(io::stdout)),
        LogOutput::Stderr => Ok(BoxMakeWriter::new(io::stderr)),
        LogOutput::File(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            Ok(BoxMakeWriter::new(Mutex::new(file)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct Buffer(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Buffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Buffer {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }

        fn make_writer(&self) -> BoxMakeWriter {
            let writer = self.clone();
            BoxMakeWriter::new(move || writer.clone())
        }
    }

    fn capture(format: LogFormat, filter: &str) -> (ProbeLogger, Buffer) {
        let buffer = Buffer::default();
        let logger = ProbeLogger::with_writer(format, filter, buffer.make_writer());
        (logger, buffer)
    }

    fn json_config(output: LogOutput) -> LoggingConfig {
        LoggingConfig {
            format: LogFormat::Json,
            output,
            filter: None,
        }
    }

    fn inherited(directives: &str) -> LogFilter {
        LogFilter::Inherited(directives.to_string())
    }

    #[test]
    fn test_json_line_has_level_and_message() {
        let (logger, buffer) = capture(LogFormat::Json, "info");
        logger.in_scope(|| tracing::info!(url = "http://x/health", "Starting Health Check to http://x/health"));

        let output = buffer.contents();
        let line = output.lines().next().unwrap();
        assert!(line.starts_with('{'));
        assert!(line.contains(r#""level":"INFO""#));
        assert!(line.contains(r#""message":"Starting Health Check to http://x/health""#));
        assert!(line.contains(r#""url":"http://x/health""#));
    }

    #[test]
    fn test_text_format_is_not_json() {
        let (logger, buffer) = capture(LogFormat::Text, "info");
        logger.in_scope(|| tracing::error!("Health check failed"));

        let output = buffer.contents();
        assert!(!output.starts_with('{'));
        assert!(output.contains("ERROR"));
        assert!(output.contains("Health check failed"));
    }

    #[test]
    fn test_filter_drops_lower_levels() {
        let (logger, buffer) = capture(LogFormat::Json, "warn");
        logger.in_scope(|| {
            tracing::info!("dropped");
            tracing::warn!("kept");
        });

        let output = buffer.contents();
        assert_eq!(output.lines().count(), 1);
        assert!(output.contains("kept"));
    }

    #[test]
    fn test_events_outside_scope_are_not_captured() {
        let (logger, buffer) = capture(LogFormat::Json, "info");
        tracing::info!("outside");
        logger.in_scope(|| tracing::info!("inside"));

        let output = buffer.contents();
        assert!(!output.contains("outside"));
        assert!(output.contains("inside"));
    }

    #[tokio::test]
    async fn test_scope_covers_future() {
        let (logger, buffer) = capture(LogFormat::Json, "info");
        logger
            .scope(async {
                tokio::task::yield_now().await;
                tracing::info!("after yield");
            })
            .await;

        assert!(buffer.contents().contains("after yield"));
    }

    #[test]
    fn test_filter_priority() {
        let cli = Some("cli=trace".to_string());
        let env = Some("env=debug".to_string());
        assert_eq!(
            LogFilter::resolve(cli, env.clone(), Some("file=warn")),
            LogFilter::Explicit("cli=trace".to_string())
        );
        assert_eq!(LogFilter::resolve(None, env, Some("file=warn")), inherited("env=debug"));
        assert_eq!(LogFilter::resolve(None, None, Some("file=warn")), inherited("file=warn"));
        assert_eq!(LogFilter::resolve(None, None, None), inherited(DEFAULT_LOG_FILTER));
    }

    #[test]
    fn test_invalid_explicit_filter_is_rejected() {
        let config = json_config(LogOutput::Stdout);
        let filter = LogFilter::Explicit("healthprobe=[".to_string());
        let result = ProbeLogger::new(&config, &filter);
        assert!(matches!(result, Err(LoggingError::Filter { .. })));
    }

    #[test]
    fn test_invalid_inherited_filter_falls_back_to_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("probe.log");
        let config = json_config(LogOutput::File(path.clone()));

        let logger = ProbeLogger::new(&config, &inherited("healthprobe=[")).unwrap();
        logger.in_scope(|| {
            tracing::debug!("below default");
            tracing::info!("at default");
        });
        drop(logger);

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2, "{}", contents);
        assert!(lines[0].contains(r#""level":"WARN""#));
        assert!(lines[0].contains(r#""filter":"healthprobe=[""#));
        assert!(lines[1].contains("at default"));
    }

    #[test]
    fn test_file_output_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("probe.log");
        let config = json_config(LogOutput::File(path.clone()));

        for _ in 0..2 {
            let logger = ProbeLogger::new(&config, &inherited("info")).unwrap();
            logger.in_scope(|| tracing::info!("written"));
        }

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 2);
    }

    #[test]
    fn test_unopenable_output_warns_on_fallback() {
        let config = json_config(LogOutput::from("/nonexistent-dir/healthprobe/probe.log"));
        let fallback = Buffer::default();

        let logger =
            ProbeLogger::build(&config, &inherited(DEFAULT_LOG_FILTER), fallback.make_writer())
                .unwrap();
        logger.in_scope(|| tracing::info!("after fallback"));

        let output = fallback.contents();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 2, "{}", output);
        assert!(lines[0].contains(r#""level":"WARN""#));
        assert!(lines[0].contains("Failed to open log output, logging to stdout"));
        assert!(lines[0].contains(r#""output":"/nonexistent-dir/healthprobe/probe.log""#));
        assert!(lines[1].contains("after fallback"));
    }
}
