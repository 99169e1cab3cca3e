//! Telemetry pipeline assembly.
//!
//! # Data Flow
//! ```text
//! TelemetryConfig
//!     → resource (process defaults + detection + service identity)
//!     → [grpc connection] → tracer provider → meter provider → [prometheus exporter]
//!     → Startup::finish (globals) or finish_local (tests)
//!     → Telemetry handle (tracers, meters, propagator, shutdown)
//! ```

use std::borrow::Cow;
use std::sync::Arc;

use opentelemetry::global;
use opentelemetry::metrics::{Meter, MeterProvider, ObservableGauge};
use opentelemetry::propagation::TextMapCompositePropagator;
use opentelemetry::trace::TracerProvider;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use opentelemetry_sdk::trace::{SdkTracer, SdkTracerProvider};
use opentelemetry_sdk::Resource;

use crate::config::{MetricsExporter, TelemetryConfig};
use crate::lifecycle::startup::build_resource;
use crate::lifecycle::{Context, LifecycleError, Shutdown, ShutdownErrors, Startup};
use crate::observability::connection;
use crate::observability::metrics::{self, observe_gauge};
use crate::observability::prometheus::{self, PrometheusExporter};
use crate::observability::propagation::composite_propagator;
use crate::observability::sampling::GaugeSampler;
use crate::observability::tracing;

/// Instrumentation scope for gauges registered at startup.
const SCOPE: &str = env!("CARGO_PKG_NAME");

/// Constructed telemetry subsystems.
///
/// Tracers and meters are handed out explicitly; process-wide installation
/// only happens when `install_globals` is set.
pub struct Telemetry {
    resource: Resource,
    tracer_provider: SdkTracerProvider,
    meter_provider: SdkMeterProvider,
    propagator: Arc<TextMapCompositePropagator>,
    prometheus: Option<PrometheusExporter>,
    histogram_buckets: std::collections::BTreeMap<String, Vec<f64>>,
    // Keeps sampler callbacks registered for the provider's lifetime.
    _gauges: Vec<ObservableGauge<f64>>,
    shutdown: Shutdown,
}

impl Telemetry {
    /// Construct every subsystem named in `config`.
    pub async fn init(ctx: &Context, config: &TelemetryConfig) -> Result<Self, LifecycleError> {
        Self::init_with_samplers(ctx, config, Vec::new()).await
    }

    /// Construct every subsystem and attach `samplers` as observable gauges.
    ///
    /// Either everything comes up or nothing is left running.
    pub async fn init_with_samplers(
        ctx: &Context,
        config: &TelemetryConfig,
        samplers: Vec<Arc<dyn GaugeSampler>>,
    ) -> Result<Self, LifecycleError> {
        let resource = build_resource(&config.service.identity(), config.service.detect_resources)?;
        let mut startup = Startup::new(resource.clone());

        startup.on_install(|| global::set_text_map_propagator(composite_propagator()));

        // Both OTLP exporters share one connection per collector.
        let mut channels = Vec::new();
        for endpoint in connection::otlp_endpoints(config) {
            let dialed = endpoint.clone();
            let channel = startup
                .register(ctx, connection::SUBSYSTEM, move |ctx, resource| {
                    connection::otlp_channel(ctx, resource, dialed)
                })
                .await?;
            channels.push((endpoint, channel));
        }
        let channel_to = |endpoint: &str| {
            channels
                .iter()
                .find(|(dialed, _)| dialed == endpoint)
                .map(|(_, channel)| channel.clone())
        };

        let tracing_config = config.tracing.clone();
        let tracing_channel = channel_to(&config.tracing.endpoint);
        let tracer_provider = startup
            .register(ctx, tracing::SUBSYSTEM, move |ctx, resource| {
                tracing::tracer_provider(ctx, resource, tracing_config, tracing_channel)
            })
            .await?;

        let metrics_config = config.metrics.clone();
        let metrics_channel = channel_to(&config.metrics.endpoint);
        let meter_provider = startup
            .register(ctx, metrics::SUBSYSTEM, move |ctx, resource| {
                metrics::meter_provider(ctx, resource, metrics_config, metrics_channel)
            })
            .await?;

        let prometheus = match config.metrics.exporter {
            MetricsExporter::Prometheus => {
                let metrics_config = config.metrics.clone();
                let scraped = samplers.clone();
                let exporter = startup
                    .register(ctx, prometheus::SUBSYSTEM, move |ctx, resource| {
                        prometheus::prometheus_exporter(ctx, resource, metrics_config, scraped)
                    })
                    .await?;
                Some(exporter)
            }
            _ => None,
        };

        let meter = meter_provider.meter(SCOPE);
        let gauges = samplers
            .into_iter()
            .map(|sampler| observe_gauge(&meter, sampler))
            .collect();

        let shutdown = if config.install_globals {
            startup.finish()
        } else {
            startup.finish_local()
        };

        ::tracing::info!(
            subsystems = ?shutdown.subsystems(),
            install_globals = config.install_globals,
            "Telemetry initialized"
        );

        Ok(Self {
            resource,
            tracer_provider,
            meter_provider,
            propagator: Arc::new(composite_propagator()),
            prometheus,
            histogram_buckets: config.metrics.histogram_buckets.clone(),
            _gauges: gauges,
            shutdown,
        })
    }

    pub fn resource(&self) -> &Resource {
        &self.resource
    }

    pub fn tracer(&self, name: impl Into<Cow<'static, str>>) -> SdkTracer {
        self.tracer_provider.tracer(name)
    }

    pub fn meter(&self, name: &'static str) -> Meter {
        self.meter_provider.meter(name)
    }

    pub fn tracer_provider(&self) -> &SdkTracerProvider {
        &self.tracer_provider
    }

    pub fn meter_provider(&self) -> &SdkMeterProvider {
        &self.meter_provider
    }

    pub fn propagator(&self) -> Arc<TextMapCompositePropagator> {
        self.propagator.clone()
    }

    /// Scrape endpoint, when the `prometheus` exporter is configured.
    pub fn prometheus(&self) -> Option<&PrometheusExporter> {
        self.prometheus.as_ref()
    }

    /// Configured bucket boundaries for `metric`, if any.
    pub fn histogram_buckets(&self, metric: &str) -> Option<&[f64]> {
        self.histogram_buckets.get(metric).map(Vec::as_slice)
    }

    /// Release every subsystem in construction order. Safe to call twice.
    pub async fn shutdown(&mut self, ctx: &Context) -> Result<(), ShutdownErrors> {
        self.shutdown.shutdown(ctx).await
    }
}

impl std::fmt::Debug for Telemetry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Telemetry")
            .field("subsystems", &self.shutdown.subsystems())
            .field("prometheus", &self.prometheus)
            .finish_non_exhaustive()
    }
}
