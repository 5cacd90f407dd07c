use eyre::{Result, WrapErr};
use tracing_subscriber::{EnvFilter, Registry, layer::SubscriberExt, util::SubscriberInitExt};

/// Build the filter for a configured level. `RUST_LOG` wins when set.
pub fn env_filter(level: &str) -> Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(level).wrap_err_with(|| format!("Invalid log level: {level}")),
    }
}

/// Initialize tracing with custom configuration.
///
/// Logs always go to stderr so that a document written to stdout stays
/// machine-readable.
pub fn init_tracing_with_config(level: &str, json_format: bool, include_spans: bool) -> Result<()> {
    let env_filter = env_filter(level)?;

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_file(true)
        .with_line_number(true);

    let installed = if json_format {
        Registry::default()
            .with(env_filter)
            .with(
                fmt_layer
                    .json()
                    .with_current_span(include_spans)
                    .with_span_list(include_spans),
            )
            .try_init()
    } else {
        Registry::default()
            .with(env_filter)
            .with(fmt_layer.with_ansi(true))
            .try_init()
    };
    installed.wrap_err("Failed to install tracing subscriber")?;

    tracing::debug!(level, json = json_format, spans = include_spans, "logging initialized");
    Ok(())
}

/// Shutdown tracing gracefully
pub fn shutdown_tracing() {
    // the fmt layer writes synchronously; nothing is buffered
    tracing::debug!("crconfig tracing shutdown complete");
}

/// Create the span covering one synthesis run
pub fn create_synthesis_span(cdn: &str, domain: &str) -> tracing::Span {
    tracing::info_span!(
        "synthesis",
        cdn = cdn,
        domain = domain,
        delivery_services = tracing::field::Empty,
    )
}

/// Create a span for one delivery-service decode
pub fn create_decode_span(xml_id: &str) -> tracing::Span {
    tracing::debug_span!("decode_delivery_service", xml_id = xml_id)
}
