use cachemesh_core::constants::CACHEMESH_LOG_VAR;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// Re-export tracing macros for convenience
pub use ::tracing::{debug, error, info, instrument, span, trace, warn, Level, Span};

/// Initialize the tracing system with an `info` default
///
/// The filter is taken from `CACHEMESH_LOG` first, then `RUST_LOG`. Output is a
/// compact, non-ANSI format on stderr so it stays readable in service logs.
pub fn init() -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    init_with_default("info")
}

/// Initialize the tracing system, falling back to `default_directive` when no
/// filter is configured in the environment
pub fn init_with_default(
    default_directive: &str,
) -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    let filter = EnvFilter::try_from_env(CACHEMESH_LOG_VAR)
        .or_else(|_| EnvFilter::try_from_default_env())
        .or_else(|_| EnvFilter::try_new(default_directive))?;

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .compact()
        .with_target(true)
        .with_thread_ids(false)
        .with_level(true);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}

/// Create a span for one topology reconciliation pass
pub fn reconcile_span(cache_name: &str, service_name: &str) -> Span {
    span!(
        Level::DEBUG,
        "reconcile",
        cache_name = %cache_name,
        service = %service_name
    )
}
