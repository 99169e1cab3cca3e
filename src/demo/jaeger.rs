//! Traces sent to Jaeger.

use opentelemetry::trace::{Span, Tracer};
use opentelemetry::KeyValue;

use crate::config::{MetricsExporter, TelemetryConfig, TraceExporter};
use crate::demo::{join, release, DemoError};
use crate::lifecycle::{Context, Signals};
use crate::observability::Telemetry;

pub const SERVICE_NAME: &str = "ExampleService";

pub fn signals() -> Signals {
    Signals::Interrupt
}

pub fn config() -> TelemetryConfig {
    let mut config = TelemetryConfig::default();
    config.service.name = SERVICE_NAME.to_string();
    config.tracing.exporter = TraceExporter::Jaeger;
    config.tracing.endpoint = "http://localhost:4317".to_string();
    config.metrics.exporter = MetricsExporter::None;
    config
}

pub async fn run(ctx: Context, config: TelemetryConfig) -> Result<(), DemoError> {
    let mut telemetry = Telemetry::init(&ctx, &config).await?;

    let tracer = telemetry.tracer(SERVICE_NAME);
    let mut span = tracer.start("main");
    span.set_attribute(KeyValue::new("exporter", "jaeger"));
    span.add_event("tracer ready", Vec::new());
    span.end();
    tracing::info!(endpoint = %config.tracing.endpoint, "Span sent to Jaeger");

    join(Ok(()), release(&mut telemetry, &config).await)
}
