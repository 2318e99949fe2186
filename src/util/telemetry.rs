//! Telemetry helpers for structured logging.

/// Install a default env-filtered fmt subscriber unless one is already set.
///
/// The filter is read from `RUST_LOG`; without it only warnings and errors
/// from this crate are shown.
pub fn init_tracing() {
    if tracing::dispatcher::has_been_set() {
        return;
    }
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("pending_sync=warn"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
