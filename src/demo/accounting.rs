//! Accounting service skeleton: JSON logs, detected resource, OTLP traces.
//!
//! Only the broker list is read; consuming from it is left to a queue client.

use crate::config::loader::require_env;
use crate::config::{LogFormat, MetricsExporter, TelemetryConfig, TraceExporter};
use crate::demo::{join, release, DemoError};
use crate::lifecycle::{Context, Signals};
use crate::observability::Telemetry;

pub const SERVICE_NAME: &str = "accounting";
pub const BROKERS_ENV: &str = "KAFKA_SERVICE_ADDR";

pub fn signals() -> Signals {
    Signals::InterruptOrTerminate
}

pub fn config() -> TelemetryConfig {
    let mut config = TelemetryConfig::default();
    config.service.name = SERVICE_NAME.to_string();
    config.service.detect_resources = true;
    config.tracing.exporter = TraceExporter::Otlp;
    config.metrics.exporter = MetricsExporter::None;
    config.logging.format = LogFormat::Json;
    config.logging.level = "telemetry_demo=debug".to_string();
    config
}

/// Split a comma-separated broker list.
pub fn brokers(addr: &str) -> Vec<String> {
    addr.split(',')
        .map(str::trim)
        .filter(|broker| !broker.is_empty())
        .map(str::to_string)
        .collect()
}

pub async fn run(ctx: Context, config: TelemetryConfig) -> Result<(), DemoError> {
    let brokers = brokers(&require_env(BROKERS_ENV)?);

    let mut telemetry = Telemetry::init(&ctx, &config).await?;
    tracing::info!(brokers = ?brokers, "Accounting service started");

    ctx.done().await;
    tracing::info!("Shutting down accounting service");

    join(Ok(()), release(&mut telemetry, &config).await)
}
