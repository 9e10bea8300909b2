//! Logging configuration and initialization.

use std::env;
use std::io::IsTerminal;

use tracing_subscriber::fmt::format::{DefaultFields, Format, Full};
use tracing_subscriber::fmt::time::{ChronoLocal, ChronoUtc, FormatTime};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{fmt, EnvFilter, Layer};

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable format with colors when attached to a terminal
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
    /// JSON lines for log aggregation
    Json,
}

impl LogFormat {
    /// Parse format from string. Unknown values fall back to `Pretty`.
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => LogFormat::Json,
            "compact" => LogFormat::Compact,
            _ => LogFormat::Pretty,
        }
    }
}

/// Timestamp format for log entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimestampFormat {
    /// Local time with timezone (default)
    #[default]
    Local,
    /// UTC time (ISO 8601)
    Utc,
    /// No timestamps
    None,
}

impl TimestampFormat {
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "utc" => TimestampFormat::Utc,
            "none" | "off" => TimestampFormat::None,
            _ => TimestampFormat::Local,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Output format (pretty, compact, json)
    pub format: LogFormat,
    /// Timestamp format
    pub timestamps: TimestampFormat,
    /// Filter used when `RUST_LOG` is not set
    pub default_level: String,
    /// Include source file location
    pub include_location: bool,
    /// Include thread IDs
    pub include_thread_ids: bool,
    /// Include target (module path)
    pub include_target: bool,
    /// Include current span and span list (JSON only)
    pub include_spans: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Pretty,
            timestamps: TimestampFormat::Local,
            default_level: "info".to_string(),
            include_location: true,
            include_thread_ids: false,
            include_target: true,
            include_spans: false,
        }
    }
}

impl LogConfig {
    /// Create config from environment variables
    ///
    /// Reads `LOG_FORMAT`, `LOG_TIMESTAMPS`, `LOG_LEVEL` (fallback when
    /// `RUST_LOG` is not set), `LOG_LOCATION`, `LOG_THREAD_IDS` and
    /// `LOG_TARGET`.
    pub fn from_env() -> Self {
        let format = env::var("LOG_FORMAT")
            .map(|s| LogFormat::parse(&s))
            .unwrap_or_default();

        Self {
            format,
            timestamps: env::var("LOG_TIMESTAMPS")
                .map(|s| TimestampFormat::parse(&s))
                .unwrap_or_default(),
            default_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            include_location: env::var("LOG_LOCATION")
                .map(|s| s == "true" || s == "1")
                .unwrap_or(true),
            include_thread_ids: env::var("LOG_THREAD_IDS")
                .map(|s| s == "true" || s == "1")
                .unwrap_or(false),
            include_target: env::var("LOG_TARGET")
                .map(|s| s == "true" || s == "1")
                .unwrap_or(true),
            include_spans: format == LogFormat::Json,
        }
    }
}

/// Initialize the global subscriber.
///
/// # Errors
///
/// Fails if a global subscriber is already installed.
pub fn init_logging(config: LogConfig) -> Result<(), TryInitError> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.default_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(build_layer(&config))
        .try_init()
}

type BoxedLayer<S> = Box<dyn Layer<S> + Send + Sync>;

fn build_layer<S>(config: &LogConfig) -> BoxedLayer<S>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a> + 'static,
{
    let ansi = config.format != LogFormat::Json && std::io::stdout().is_terminal();

    let base = fmt::layer()
        .with_target(config.include_target)
        .with_thread_ids(config.include_thread_ids)
        .with_file(config.include_location)
        .with_line_number(config.include_location)
        .with_level(true)
        .with_ansi(ansi);

    match config.timestamps {
        TimestampFormat::Local => with_format(
            base.with_timer(ChronoLocal::new("%Y-%m-%d %H:%M:%S%.3f %z".to_string())),
            config,
        ),
        TimestampFormat::Utc => with_format(
            base.with_timer(ChronoUtc::new("%Y-%m-%dT%H:%M:%S%.3fZ".to_string())),
            config,
        ),
        TimestampFormat::None => with_format(base.without_time(), config),
    }
}

fn with_format<S, T>(
    layer: fmt::Layer<S, DefaultFields, Format<Full, T>>,
    config: &LogConfig,
) -> BoxedLayer<S>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a> + 'static,
    T: FormatTime + Send + Sync + 'static,
{
    match config.format {
        LogFormat::Pretty => Box::new(layer),
        LogFormat::Compact => Box::new(layer.compact()),
        LogFormat::Json => Box::new(
            layer
                .json()
                .with_current_span(config.include_spans)
                .with_span_list(config.include_spans),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_parse() {
        assert_eq!(LogFormat::parse("json"), LogFormat::Json);
        assert_eq!(LogFormat::parse("JSON"), LogFormat::Json);
        assert_eq!(LogFormat::parse("compact"), LogFormat::Compact);
        assert_eq!(LogFormat::parse("pretty"), LogFormat::Pretty);
        assert_eq!(LogFormat::parse("unknown"), LogFormat::Pretty);
    }

    #[test]
    fn test_timestamp_format_parse() {
        assert_eq!(TimestampFormat::parse("UTC"), TimestampFormat::Utc);
        assert_eq!(TimestampFormat::parse("local"), TimestampFormat::Local);
        assert_eq!(TimestampFormat::parse("off"), TimestampFormat::None);
    }

    #[test]
    fn test_default_config_is_pretty_with_locations() {
        let config = LogConfig::default();
        assert_eq!(config.format, LogFormat::Pretty);
        assert_eq!(config.default_level, "info");
        assert!(config.include_location);
        assert!(!config.include_spans);
    }
}
