//! # Node Logging
//!
//! What ends up in the log, by target:
//!
//! - `afan_node`: startup configuration, accepted and rejected submissions
//!   (with the hash or the refusal reason), expiry sweeps, shutdown.
//! - `afan_protocol`: engine diagnostics from [`TracingSink`], i.e. failed
//!   address recovery, skipped verification on trusted transactions,
//!   batch bypasses, and pool admission at `debug`.
//! - `tower_http`: one span per HTTP request.
//!
//! Output goes to stderr in either format, so the JSON that `keygen` and
//! `sign` print on stdout can be piped as-is. `RUST_LOG` replaces
//! [`DEFAULT_FILTER`] entirely when set.
//!
//! [`TracingSink`]: afan_protocol::transaction::TracingSink

use clap::ValueEnum;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Directives used when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "afan_node=info,afan_protocol=info,tower_http=debug";

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormat {
    /// Colored lines with file and line, for a terminal.
    #[default]
    Pretty,
    /// One JSON object per event, for log shippers.
    Json,
}

fn env_filter(default_directives: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives))
}

/// Installs the global subscriber. Fails if one is already installed.
pub fn init_logging(default_directives: &str, format: LogFormat) -> Result<(), TryInitError> {
    let filter = env_filter(default_directives);

    match format {
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_file(true)
                    .with_line_number(true),
            )
            .try_init()?,
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr).with_target(true))
            .try_init()?,
    }

    tracing::debug!(?format, "logging initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_parses_case_insensitively() {
        assert_eq!(LogFormat::from_str("json", true), Ok(LogFormat::Json));
        assert_eq!(LogFormat::from_str("PRETTY", true), Ok(LogFormat::Pretty));
        assert!(LogFormat::from_str("xml", true).is_err());
        assert_eq!(LogFormat::default(), LogFormat::Pretty);
    }

    #[test]
    fn default_filter_parses() {
        assert!(EnvFilter::try_new(DEFAULT_FILTER).is_ok());
        assert!(DEFAULT_FILTER.contains("afan_protocol="));
    }

    #[test]
    fn second_init_is_an_error() {
        // The first call may lose to another test's subscriber; either way
        // the global slot is taken afterwards.
        let _ = init_logging("off", LogFormat::Json);
        assert!(init_logging("off", LogFormat::Pretty).is_err());
    }
}
