use std::env;

use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

/// Controls the log format.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Auto detect the best format.
    ///
    /// This chooses [`LogFormat::Pretty`] for TTY, otherwise
    /// [`LogFormat::Simplified`].
    Auto,

    /// Multi-line pretty printing with colors.
    Pretty,

    /// Single-line plain text output without colors.
    Simplified,

    /// Newline-delimited JSON records.
    Json,
}

/// Controls the logging system.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct LogConfig {
    /// The default log level directive, e.g. `"info"` or `"debug"`.
    ///
    /// The `RUST_LOG` environment variable, when set, overrides this field.
    pub level: String,

    /// Controls the log output format.
    ///
    /// Defaults to [`LogFormat::Auto`], which detects the best format based
    /// on the TTY.
    pub format: LogFormat,

    /// When set to `true`, backtraces are forced on.
    ///
    /// Otherwise, backtraces can be enabled by setting the `RUST_BACKTRACE`
    /// variable to `full`.
    pub enable_backtraces: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            format: LogFormat::Auto,
            enable_backtraces: false,
        }
    }
}

impl LogConfig {
    fn resolved_format(&self) -> LogFormat {
        match self.format {
            LogFormat::Auto if console::user_attended() => LogFormat::Pretty,
            LogFormat::Auto => LogFormat::Simplified,
            format => format,
        }
    }
}

fn build_filter(config: &LogConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        // Noisy dependencies stay at warn unless `RUST_LOG` raises them.
        EnvFilter::new(format!("{},sqlx=warn", config.level))
    })
}

/// Initializes the logging system.
///
/// Must be called exactly once, on the main thread, before any worker
/// threads are spawned.
pub fn init(config: &LogConfig) {
    if config.enable_backtraces {
        // Single-threaded at this point per the function contract.
        unsafe { env::set_var("RUST_BACKTRACE", "full") };
    }

    let subscriber = tracing_subscriber::registry().with(build_filter(config));

    match config.resolved_format() {
        LogFormat::Auto => unreachable!("auto resolves to a concrete format"),
        LogFormat::Pretty => subscriber
            .with(tracing_subscriber::fmt::layer().pretty())
            .init(),
        LogFormat::Simplified => subscriber
            .with(tracing_subscriber::fmt::layer().with_ansi(false))
            .init(),
        LogFormat::Json => subscriber
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .flatten_event(true)
                    .with_current_span(false),
            )
            .init(),
    }
}
