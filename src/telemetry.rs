//! Logging initialization.
//!
//! `x402-rs`'s facilitator binary layers OpenTelemetry OTLP export on top of `tracing`;
//! this crate is a library with no HTTP surface and no metrics backend of its own (per
//! its non-goals — the engine emits typed events, storage and export are external), so
//! it keeps only the `tracing-subscriber` half of that stack.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::util::SubscriberInitExt;

/// Installs a `tracing-subscriber` fmt layer filtered by `RUST_LOG` (defaulting to
/// `info` if unset). Call once, near the start of a binary embedding this crate; no-op
/// safe to call more than once within a single process only if callers guard it (the
/// global subscriber can only be set once).
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).finish().init();
}
