use indexmap::IndexMap;
use std::time::Instant;
use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
    Layer,
};

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: Level,
    pub format: LogFormat,
    pub output: LogOutput,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

impl LogFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "compact" => Some(LogFormat::Compact),
            "pretty" => Some(LogFormat::Pretty),
            "json" => Some(LogFormat::Json),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogOutput {
    Stdout,
    Stderr,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            level: Level::INFO,
            format: LogFormat::Compact,
            output: LogOutput::Stderr,
        }
    }
}

impl LogConfig {
    /// Maps the CLI verbosity count to a level: 0 = warn, 1 = info, 2 = debug, 3+ = trace.
    pub fn from_verbosity(verbosity: u64) -> Self {
        let level = match verbosity {
            0 => Level::WARN,
            1 => Level::INFO,
            2 => Level::DEBUG,
            _ => Level::TRACE,
        };
        LogConfig {
            level,
            ..LogConfig::default()
        }
    }
}

/// Initialize the logging system
pub fn init_logging(config: LogConfig) -> anyhow::Result<()> {
    let env_filter = EnvFilter::from_default_env()
        .add_directive(config.level.into());

    let fmt_layer = match (config.format, config.output) {
        (LogFormat::Compact, LogOutput::Stdout) => fmt::layer()
            .compact()
            .with_span_events(FmtSpan::CLOSE)
            .boxed(),
        (LogFormat::Compact, LogOutput::Stderr) => fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
            .with_span_events(FmtSpan::CLOSE)
            .boxed(),
        (LogFormat::Pretty, LogOutput::Stdout) => fmt::layer()
            .pretty()
            .boxed(),
        (LogFormat::Pretty, LogOutput::Stderr) => fmt::layer()
            .pretty()
            .with_writer(std::io::stderr)
            .boxed(),
        (LogFormat::Json, LogOutput::Stdout) => fmt::layer()
            .json()
            .boxed(),
        (LogFormat::Json, LogOutput::Stderr) => fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}

/// Operation logger for tracking individual CLI operations
pub struct OperationLogger {
    operation_id: String,
    start_time: Instant,
    metadata: IndexMap<String, String>,
}

impl OperationLogger {
    pub fn new(operation_id: impl Into<String>) -> Self {
        let operation_id = operation_id.into();
        tracing::info!(operation_id = %operation_id, "Operation started");

        OperationLogger {
            operation_id,
            start_time: Instant::now(),
            metadata: IndexMap::new(),
        }
    }

    pub fn add_metadata(&mut self, key: impl Into<String>, value: impl ToString) {
        self.metadata.insert(key.into(), value.to_string());
    }

    pub fn metadata(&self) -> &IndexMap<String, String> {
        &self.metadata
    }

    pub fn log_progress(&self, message: impl AsRef<str>) {
        let elapsed = self.start_time.elapsed();
        tracing::info!(
            operation_id = %self.operation_id,
            elapsed_ms = elapsed.as_millis() as u64,
            message = %message.as_ref(),
            "Operation progress"
        );
    }

    pub fn log_error(&self, error: &dyn std::error::Error) {
        let elapsed = self.start_time.elapsed();
        tracing::error!(
            operation_id = %self.operation_id,
            elapsed_ms = elapsed.as_millis() as u64,
            error = %error,
            "Operation failed"
        );
    }

    pub fn complete(self) {
        let elapsed = self.start_time.elapsed();
        tracing::info!(
            operation_id = %self.operation_id,
            elapsed_ms = elapsed.as_millis() as u64,
            metadata = ?self.metadata,
            "Operation completed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_logger() {
        let mut logger = OperationLogger::new("test_op");
        logger.add_metadata("stages", 3);
        logger.add_metadata("mode", "2parts-faces");
        logger.log_progress("generator built");
        assert_eq!(logger.metadata()["stages"], "3");
        logger.complete();
    }

    #[test]
    fn test_operation_logger_error() {
        let mut logger = OperationLogger::new("failing_op");
        logger.add_metadata("mode", "3parts-cats");
        let err = crate::error::PuzzleGanError::InvalidInput("no such mode".to_string());
        logger.log_error(&err);
        assert_eq!(logger.metadata().len(), 1);
    }

    #[test]
    fn test_verbosity_levels() {
        assert_eq!(LogConfig::from_verbosity(0).level, Level::WARN);
        assert_eq!(LogConfig::from_verbosity(2).level, Level::DEBUG);
        assert_eq!(LogConfig::from_verbosity(9).level, Level::TRACE);
        assert_eq!(LogFormat::from_str("JSON"), Some(LogFormat::Json));
        assert_eq!(LogFormat::from_str("xml"), None);
    }
}
