//! Structured logging setup.
//!
//! Mirrors the teacher binary's `init_logging`, minus the JSON-file
//! rotation (this crate has no `~/.clemini/logs` to write to): a single
//! `tracing_subscriber::fmt` layer on stderr, filtered by `RUST_LOG` (or
//! `info` if unset). Renderers own all human-readable output now; tracing
//! is reserved for the "logged at debug"/"logged at warn" conditions named
//! throughout the error-handling design — recoverable parse failures,
//! fallback paths, and coordinator recovery.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global tracing subscriber. Safe to call more than once;
/// only the first call takes effect.
pub fn init_logging() {
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .try_init();
}
