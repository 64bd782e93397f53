//! OpenTelemetry tracing export
//!
//! Spans are exported over OTLP/gRPC to the collector named by
//! `OTEL_EXPORTER_OTLP_ENDPOINT`. The caller decides whether export is enabled
//! and composes the returned layer into its subscriber.

use opentelemetry::{global, KeyValue};
use opentelemetry_sdk::propagation::TraceContextPropagator;
use opentelemetry_sdk::trace::{self, Tracer};
use opentelemetry_sdk::{runtime, Resource};
use tracing::Subscriber;
use tracing_opentelemetry::OpenTelemetryLayer;
use tracing_subscriber::registry::LookupSpan;

pub const SERVICE_NAME: &str = "disaster-recovery-daemon";

/// Build the OTLP tracing layer for `_subscriber`.
///
/// Returns `None` when the exporter pipeline can not be installed; logging
/// keeps working without trace export in that case.
pub fn init_telemetry<S>(_subscriber: &S) -> Option<OpenTelemetryLayer<S, Tracer>>
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    global::set_text_map_propagator(TraceContextPropagator::new());

    let resource = Resource::new(vec![
        KeyValue::new("service.name", SERVICE_NAME),
        KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
    ]);

    let tracer = opentelemetry_otlp::new_pipeline()
        .tracing()
        .with_exporter(opentelemetry_otlp::new_exporter().tonic())
        .with_trace_config(trace::config().with_resource(resource))
        .install_batch(runtime::Tokio);

    match tracer {
        Ok(tracer) => Some(tracing_opentelemetry::layer().with_tracer(tracer)),
        Err(e) => {
            eprintln!("failed to install OTLP trace pipeline: {e}");
            None
        }
    }
}

/// Flush pending spans and stop the exporter
pub fn shutdown_telemetry() {
    global::shutdown_tracer_provider();
}
