//! Counter, gauge and histogram exposed on a Prometheus scrape endpoint.

use std::collections::BTreeMap;
use std::sync::Arc;

use opentelemetry::KeyValue;

use crate::config::{MetricsExporter, TelemetryConfig, TraceExporter};
use crate::demo::{join, release, DemoError};
use crate::lifecycle::{Context, Signals};
use crate::observability::prometheus::{PrometheusExporter, SUBSYSTEM};
use crate::observability::{GaugeSampler, Telemetry, UniformSampler};

pub const SERVICE_NAME: &str = "prometheus-example";

const BAZ_BUCKETS: [f64; 7] = [64.0, 128.0, 256.0, 512.0, 1024.0, 2048.0, 4096.0];
const BAZ_SAMPLES: [f64; 4] = [136.0, 64.0, 701.0, 830.0];

// -10 plus up to 90.
const BAR_RANGE: std::ops::Range<f64> = -10.0..80.0;

pub fn signals() -> Signals {
    Signals::Interrupt
}

pub fn config() -> TelemetryConfig {
    let mut config = TelemetryConfig::default();
    config.service.name = SERVICE_NAME.to_string();
    config.tracing.exporter = TraceExporter::None;
    config.metrics.exporter = MetricsExporter::Prometheus;
    config.metrics.histogram_buckets = BTreeMap::from([("baz".to_string(), BAZ_BUCKETS.to_vec())]);
    config
}

/// The `bar` gauge, sampled on every scrape.
pub fn bar_sampler() -> UniformSampler {
    UniformSampler::new("bar", BAR_RANGE)
        .with_description("a fun little gauge")
        .with_attributes(vec![KeyValue::new("A", "B"), KeyValue::new("C", "D")])
}

/// Record `foo` and `baz` once.
pub fn record(exporter: &PrometheusExporter) {
    exporter.in_scope(|| {
        metrics::describe_counter!("foo", "a simple counter");
        metrics::counter!("foo", "A" => "B", "C" => "D").increment(5);

        metrics::describe_histogram!("baz", "a histogram with custom buckets and rename");
        let baz = metrics::histogram!("baz", "A" => "B", "C" => "D");
        for value in BAZ_SAMPLES {
            baz.record(value);
        }
    });
}

/// Serve metrics until `ctx` is cancelled.
pub async fn run(ctx: Context, config: TelemetryConfig) -> Result<(), DemoError> {
    let samplers: Vec<Arc<dyn GaugeSampler>> = vec![Arc::new(bar_sampler())];
    let mut telemetry = Telemetry::init_with_samplers(&ctx, &config, samplers).await?;

    let served = match telemetry.prometheus() {
        Some(exporter) => {
            record(exporter);
            tracing::info!(address = %exporter.local_addr(), "Serving metrics at /metrics");
            ctx.done().await;
            Ok(())
        }
        None => Err(DemoError::NotConfigured(SUBSYSTEM)),
    };

    join(served, release(&mut telemetry, &config).await)
}
