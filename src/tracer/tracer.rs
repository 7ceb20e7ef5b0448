use opentelemetry::trace::TraceError;
use opentelemetry::KeyValue;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::trace::{Config, TracerProvider};
use opentelemetry_sdk::{runtime, Resource};
use opentelemetry_semantic_conventions::resource::SERVICE_NAME;

/// Name under which request spans are recorded.
pub const TRACER_NAME: &str = env!("CARGO_PKG_NAME");

pub fn init_tracer_provider(uri: &str, service_name: &str) -> Result<TracerProvider, TraceError> {
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(uri)
        .build()?;

    Ok(TracerProvider::builder()
        .with_batch_exporter(exporter, runtime::Tokio)
        .with_config(
            Config::default()
                .with_resource(Resource::new(vec![KeyValue::new(SERVICE_NAME, service_name.to_string())])),
        )
        .build())
}
