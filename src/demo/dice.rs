//! Dice roll HTTP service with stdout telemetry.

use tokio::net::TcpListener;

use crate::config::{MetricsExporter, TelemetryConfig, TraceExporter};
use crate::demo::{join, release, DemoError};
use crate::http::DiceServer;
use crate::lifecycle::{Context, Signals};
use crate::observability::Telemetry;

pub const SERVICE_NAME: &str = "dice";

pub fn signals() -> Signals {
    Signals::Interrupt
}

pub fn config() -> TelemetryConfig {
    let mut config = TelemetryConfig::default();
    config.service.name = SERVICE_NAME.to_string();
    config.service.version = Some("0.1.0".to_string());
    config.tracing.exporter = TraceExporter::Stdout;
    config.tracing.batch_timeout_ms = 1000;
    config.metrics.exporter = MetricsExporter::Stdout;
    config.metrics.export_interval_ms = 3000;
    config
}

/// Serve `/rolldice` until `ctx` is cancelled, then release telemetry.
pub async fn run(ctx: Context, config: TelemetryConfig) -> Result<(), DemoError> {
    let mut telemetry = Telemetry::init(&ctx, &config).await?;

    let served = serve(&ctx, &telemetry, &config).await;
    let released = release(&mut telemetry, &config).await;
    join(served, released)
}

async fn serve(ctx: &Context, telemetry: &Telemetry, config: &TelemetryConfig) -> Result<(), DemoError> {
    let listener = TcpListener::bind(&config.http.bind_address).await?;
    DiceServer::new(telemetry, &config.http)
        .run(listener, ctx.clone())
        .await?;
    Ok(())
}
