//! Structured logging.
//!
//! # Responsibilities
//! - Build the process log sink from `APP_ENV` and `APP_LOG_LEVEL`
//! - Install it once, before any request handling starts
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - JSON format for production, human-readable format for `APP_ENV=dev`
//! - The sink is an explicit [`Dispatch`] value so tests can install a
//!   capturing writer thread-locally instead of touching the global default
//! - Request-scoped loggers are spans derived from this sink (see
//!   [`crate::http::RequestContext`])

use tracing::{Dispatch, Level};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;

/// Selects the runtime environment (`dev` switches to pretty output).
pub const APP_ENV: &str = "APP_ENV";

/// Minimum level to emit (`trace`, `debug`, `info`, `warn`, `error`).
pub const APP_LOG_LEVEL: &str = "APP_LOG_LEVEL";

/// Output encoding of the log sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable lines for local development.
    Pretty,
    /// One JSON object per line.
    Json,
}

/// Resolved logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    pub env: String,
    pub level: Level,
    pub format: LogFormat,
}

impl LogSettings {
    /// Read settings from the process environment.
    pub fn from_env() -> Self {
        Self::from_values(
            std::env::var(APP_ENV).ok(),
            std::env::var(APP_LOG_LEVEL).ok(),
        )
    }

    /// Resolve settings from raw values. Unknown or missing levels fall back to `info`.
    pub fn from_values(env: Option<String>, level: Option<String>) -> Self {
        let env = env.unwrap_or_default();
        let level = level
            .and_then(|l| l.trim().to_lowercase().parse::<Level>().ok())
            .unwrap_or(Level::INFO);
        let format = if env == "dev" {
            LogFormat::Pretty
        } else {
            LogFormat::Json
        };

        Self { env, level, format }
    }

    /// Build the log sink writing to `writer`.
    pub fn dispatch<W>(&self, writer: W) -> Dispatch
    where
        W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
    {
        let filter = LevelFilter::from_level(self.level);

        match self.format {
            LogFormat::Json => Dispatch::new(
                tracing_subscriber::registry().with(filter).with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .flatten_event(true)
                        .with_current_span(true)
                        .with_span_list(false)
                        .with_file(true)
                        .with_line_number(true)
                        .with_writer(writer),
                ),
            ),
            LogFormat::Pretty => Dispatch::new(
                tracing_subscriber::registry().with(filter).with(
                    tracing_subscriber::fmt::layer()
                        .with_file(true)
                        .with_line_number(true)
                        .with_writer(writer),
                ),
            ),
        }
    }

    /// Install the sink process-wide, writing to stderr.
    pub fn init(&self) -> Result<(), tracing::dispatcher::SetGlobalDefaultError> {
        tracing::dispatcher::set_global_default(self.dispatch(std::io::stderr))?;

        tracing::info!(env = %self.env, level = %self.level, "Logger initialized");
        Ok(())
    }
}

impl Default for LogSettings {
    fn default() -> Self {
        Self::from_values(None, None)
    }
}
