//! Structured logging setup.
//!
//! Installs a global `tracing` subscriber: an `EnvFilter` built from
//! [`LogConfig::level`] (`RUST_LOG` wins when set) and a `fmt` layer writing
//! JSON or pretty output to stderr. Stdout stays free for the CLI's output.

use anyhow::{anyhow, Result};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::config::{LogConfig, LogFormat};

/// Build the filter for `config`, falling back to `info` on a bad directive.
#[must_use]
pub fn env_filter(config: &LogConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.level.as_str()))
        .unwrap_or_else(|_| {
            eprintln!(
                "Warning: invalid log filter directive '{}', using 'info'",
                config.level
            );
            EnvFilter::new("info")
        })
}

/// Install the global subscriber.
///
/// # Errors
///
/// Fails if a global subscriber is already installed.
pub fn init_logging(config: &LogConfig) -> Result<()> {
    let fmt_layer = match config.format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_target(true)
            .with_writer(std::io::stderr)
            .boxed(),
        LogFormat::Pretty => tracing_subscriber::fmt::layer()
            .pretty()
            .with_target(true)
            .with_writer(std::io::stderr)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter(config))
        .with(fmt_layer)
        .try_init()
        .map_err(|e| anyhow!("failed to install tracing subscriber: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_is_an_error() {
        let config = LogConfig::default();
        // The first call may already have happened in another test.
        let _ = init_logging(&config);
        assert!(init_logging(&config).is_err());
    }
}
