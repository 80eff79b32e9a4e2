//! Logging.

use serde::Deserialize;
use tracing::{level_filters::LevelFilter, Subscriber};
use tracing_subscriber::{
    layer::SubscriberExt as _, registry::LookupSpan, util::SubscriberInitExt as _, EnvFilter, Layer,
};

use crate::{ErrorContext as _, GenericError};

fn default_log_level() -> String {
    LevelFilter::INFO.to_string()
}

/// Logging configuration.
#[derive(Clone, Debug, Deserialize)]
pub struct LoggingConfiguration {
    /// Log filtering directives, in `EnvFilter` syntax.
    ///
    /// Defaults to `info`.
    #[serde(default = "default_log_level")]
    log_level: String,

    /// Whether to emit logs as JSON.
    ///
    /// Defaults to `false`, which emits human-readable logs.
    #[serde(default)]
    log_format_json: bool,
}

impl LoggingConfiguration {
    /// Sets the log filtering directives.
    pub fn with_log_level<L>(mut self, log_level: L) -> Self
    where
        L: Into<String>,
    {
        self.log_level = log_level.into();
        self
    }

    /// Sets whether to emit logs as JSON.
    pub fn with_json_format(mut self, enabled: bool) -> Self {
        self.log_format_json = enabled;
        self
    }
}

impl Default for LoggingConfiguration {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format_json: false,
        }
    }
}

/// Initializes the logging subsystem for `tracing`.
///
/// Logs are written to standard output, either as JSON or in a human-readable format.
///
/// # Errors
///
/// If the filtering directives are invalid, or if the logging subsystem was already initialized, an error will be
/// returned.
pub fn initialize_logging(config: &LoggingConfiguration) -> Result<(), GenericError> {
    let level_filter = EnvFilter::try_new(&config.log_level)
        .with_error_context(|| format!("Invalid log filtering directives '{}'.", config.log_level))?;

    if config.log_format_json {
        tracing_subscriber::registry()
            .with(json_layer().with_filter(level_filter))
            .try_init()
            .error_context("Logging already initialized.")?;
    } else {
        tracing_subscriber::registry()
            .with(pretty_layer().with_filter(level_filter))
            .try_init()
            .error_context("Logging already initialized.")?;
    }

    Ok(())
}

fn json_layer<S>() -> impl Layer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    tracing_subscriber::fmt::Layer::new()
        .json()
        .flatten_event(true)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
}

fn pretty_layer<S>() -> impl Layer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    tracing_subscriber::fmt::Layer::new().with_target(true)
}
