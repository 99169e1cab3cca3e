//! OpenTelemetry demo runner.
//!
//! ```text
//!   telemetry-demo <demo> [--config FILE] [--log-format pretty|json] [--log-level FILTER]
//!
//!        ┌──────────────┐    ┌─────────────┐    ┌──────────────────────────────┐
//!        │ config       │───▶│ logging     │───▶│ signals → Context            │
//!        │ file/default │    │ (tracing)   │    │                              │
//!        └──────────────┘    └─────────────┘    └──────────────┬───────────────┘
//!                                                              ▼
//!        ┌──────────────────────────────────────────────────────────────────────┐
//!        │ demo::run                                                            │
//!        │   Telemetry::init  (resource → tracer → meter → [prometheus])        │
//!        │   work / serve until the context ends                                │
//!        │   Telemetry::shutdown (registration order, all errors joined)        │
//!        └──────────────────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use telemetry_demo::config::loader::{finalize, load_config};
use telemetry_demo::config::{LogFormat, TelemetryConfig};
use telemetry_demo::demo::{self, DemoError};
use telemetry_demo::lifecycle::{notify_context, Context, Signals};
use telemetry_demo::observability::logging::init_logging;

#[derive(Debug, Parser)]
#[command(name = "telemetry-demo", version, about = "OpenTelemetry demo programs")]
struct Cli {
    #[command(subcommand)]
    demo: Demo,

    /// TOML config file replacing the demo's defaults.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[arg(long, global = true, value_enum)]
    log_format: Option<Format>,

    /// Log filter directive, used when RUST_LOG is unset.
    #[arg(long, global = true)]
    log_level: Option<String>,
}

#[derive(Debug, Clone, Copy, Subcommand)]
enum Demo {
    /// HTTP dice roller with stdout traces and metrics.
    Dice,
    /// Ten sample spans and a counter sent to a collector over OTLP.
    Collector,
    /// Counter, gauge and histogram on a Prometheus scrape endpoint.
    Prometheus,
    /// A span exported to Jaeger.
    Jaeger,
    /// JSON-logging service reading its broker list from the environment.
    Accounting,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Format {
    Pretty,
    Json,
}

impl From<Format> for LogFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Pretty => LogFormat::Pretty,
            Format::Json => LogFormat::Json,
        }
    }
}

impl Demo {
    fn config(self) -> TelemetryConfig {
        match self {
            Demo::Dice => demo::dice::config(),
            Demo::Collector => demo::collector::config(),
            Demo::Prometheus => demo::prometheus::config(),
            Demo::Jaeger => demo::jaeger::config(),
            Demo::Accounting => demo::accounting::config(),
        }
    }

    fn signals(self) -> Signals {
        match self {
            Demo::Dice => demo::dice::signals(),
            Demo::Collector => demo::collector::signals(),
            Demo::Prometheus => demo::prometheus::signals(),
            Demo::Jaeger => demo::jaeger::signals(),
            Demo::Accounting => demo::accounting::signals(),
        }
    }

    async fn run(self, ctx: Context, config: TelemetryConfig) -> Result<(), DemoError> {
        match self {
            Demo::Dice => demo::dice::run(ctx, config).await,
            Demo::Collector => demo::collector::run(ctx, config).await,
            Demo::Prometheus => demo::prometheus::run(ctx, config).await,
            Demo::Jaeger => demo::jaeger::run(ctx, config).await,
            Demo::Accounting => demo::accounting::run(ctx, config).await,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => finalize(cli.demo.config())?,
    };
    if let Some(format) = cli.log_format {
        config.logging.format = format.into();
    }
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }

    init_logging(&config.logging)?;

    tracing::info!(
        demo = ?cli.demo,
        service = %config.service.name,
        "telemetry-demo v{} starting",
        env!("CARGO_PKG_VERSION")
    );

    let (ctx, _signals) = notify_context(&Context::background(), cli.demo.signals());

    if let Err(err) = cli.demo.run(ctx, config).await {
        tracing::error!(error = %err, "Demo failed");
        return Err(err.into());
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
