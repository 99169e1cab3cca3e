//! Traces and metrics shipped to an OpenTelemetry Collector over OTLP/gRPC.

use std::time::Duration;

use opentelemetry::trace::{Span, TraceContextExt, Tracer};
use opentelemetry::KeyValue;

use crate::config::{MetricsExporter, TelemetryConfig, TraceExporter};
use crate::demo::{join, release, DemoError};
use crate::lifecycle::{Context, Signals};
use crate::observability::Telemetry;

pub const SERVICE_NAME: &str = "test-service";
pub const SCOPE: &str = "telemetry-demo/collector";

const ITERATIONS: usize = 10;
const INTERVAL: Duration = Duration::from_secs(1);

pub fn signals() -> Signals {
    Signals::Interrupt
}

pub fn config() -> TelemetryConfig {
    let mut config = TelemetryConfig::default();
    config.service.name = SERVICE_NAME.to_string();
    config.tracing.exporter = TraceExporter::Otlp;
    config.metrics.exporter = MetricsExporter::Otlp;
    config
}

fn common_attributes() -> Vec<KeyValue> {
    vec![
        KeyValue::new("attrA", "chocolate"),
        KeyValue::new("attrB", "raspberry"),
        KeyValue::new("attrC", "vanilla"),
    ]
}

pub async fn run(ctx: Context, config: TelemetryConfig) -> Result<(), DemoError> {
    tracing::info!(endpoint = %config.tracing.endpoint, "Waiting for connection...");
    let mut telemetry = Telemetry::init(&ctx, &config).await?;

    work(&ctx, &telemetry, ITERATIONS, INTERVAL).await;

    join(Ok(()), release(&mut telemetry, &config).await)
}

/// Run `iterations` sample spans under one parent, `interval` apart.
///
/// Returns how many iterations completed before `ctx` ended.
pub async fn work(ctx: &Context, telemetry: &Telemetry, iterations: usize, interval: Duration) -> usize {
    let tracer = telemetry.tracer(SCOPE);
    let run_count = telemetry
        .meter(SCOPE)
        .u64_counter("run")
        .with_description("The number of times the iteration ran")
        .build();
    let attributes = common_attributes();

    let parent = tracer
        .span_builder("CollectorExporter-Example")
        .with_attributes(attributes.clone())
        .start(&tracer);
    let parent_cx = opentelemetry::Context::current_with_span(parent);

    let mut completed = 0;
    for i in 0..iterations {
        let mut span = tracer.start_with_context(format!("Sample-{}", i), &parent_cx);
        run_count.add(1, &attributes);
        tracing::info!(iteration = i + 1, total = iterations, "Doing really hard work");

        let waited = ctx.run(tokio::time::sleep(interval)).await;
        span.end();
        if waited.is_err() {
            tracing::info!(completed, "Interrupted");
            break;
        }
        completed += 1;
    }

    parent_cx.span().end();
    tracing::info!("Done!");
    completed
}
