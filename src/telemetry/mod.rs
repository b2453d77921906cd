//! Tracing setup and log hygiene.
//!
//! `init` installs the global subscriber once at startup. `redact` is applied
//! to every structured value that is logged or written to the audit trail.

mod redact;

pub use redact::{redact, MAX_DEPTH, MAX_STRING_CHARS};

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::LoggingConfig;

/// Installs the global tracing subscriber.
///
/// `RUST_LOG` overrides the configured level. Output is JSON lines when
/// `config.json` is set, compact text otherwise.
pub fn init(config: &LoggingConfig) -> Result<(), tracing_subscriber::util::TryInitError> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let (json, text) = if config.json {
        (Some(fmt::layer().json().with_current_span(false)), None)
    } else {
        (None, Some(fmt::layer().compact().with_target(true)))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(json)
        .with(text)
        .try_init()
}
