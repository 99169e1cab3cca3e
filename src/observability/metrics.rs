//! Meter provider construction.
//!
//! # Responsibilities
//! - Build the metric exporter selected in config (stdout, OTLP)
//! - Drive it with a periodic reader at the configured interval
//! - Attach pull-based gauges to a meter
//!
//! # Design Decisions
//! - In `prometheus` mode the provider has no reader; the scrape endpoint
//!   is served by [`super::prometheus`] through the `metrics` facade
//! - Histogram boundaries travel with the instrument, not a provider view

use std::sync::Arc;
use std::time::Duration;

use opentelemetry::global;
use opentelemetry::metrics::{Meter, ObservableGauge};
use opentelemetry_otlp::{WithExportConfig, WithTonicConfig};
use opentelemetry_sdk::metrics::{PeriodicReader, SdkMeterProvider};
use opentelemetry_sdk::Resource;
use tonic::transport::Channel;

use crate::config::{MetricsConfig, MetricsExporter};
use crate::lifecycle::{BoxError, Component, Context, ShutdownFunc};
use crate::observability::sampling::GaugeSampler;

pub const SUBSYSTEM: &str = "meter provider";

/// Build a meter provider for `config`.
///
/// `otlp` exports go over `channel` when one is given, typically the same
/// connection the tracer provider uses.
pub async fn meter_provider(
    _ctx: Context,
    resource: Resource,
    config: MetricsConfig,
    channel: Option<Channel>,
) -> Result<Component<SdkMeterProvider>, BoxError> {
    let builder = SdkMeterProvider::builder().with_resource(resource);
    let interval = Duration::from_millis(config.export_interval_ms);

    let provider = match config.exporter {
        MetricsExporter::None | MetricsExporter::Prometheus => builder.build(),
        MetricsExporter::Stdout => {
            let reader = PeriodicReader::builder(opentelemetry_stdout::MetricExporter::default())
                .with_interval(interval)
                .build();
            builder.with_reader(reader).build()
        }
        MetricsExporter::Otlp => {
            let otlp = opentelemetry_otlp::MetricExporter::builder().with_tonic();
            let exporter = match channel {
                Some(channel) => otlp.with_channel(channel).build()?,
                None => otlp.with_endpoint(config.endpoint.clone()).build()?,
            };
            let reader = PeriodicReader::builder(exporter).with_interval(interval).build();
            builder.with_reader(reader).build()
        }
    };

    tracing::info!(
        exporter = ?config.exporter,
        interval_ms = config.export_interval_ms,
        "Meter provider ready"
    );

    Ok(into_component(provider))
}

/// Release flushes and stops the reader; installation makes the provider global.
pub fn into_component(provider: SdkMeterProvider) -> Component<SdkMeterProvider> {
    let releasing = provider.clone();
    let installing = provider.clone();
    Component::new(
        provider,
        ShutdownFunc::blocking(SUBSYSTEM, move || releasing.shutdown().map_err(Into::into)),
    )
    .on_install(move || global::set_meter_provider(installing))
}

/// Register `sampler` as an observable gauge on `meter`.
///
/// The sampler is polled on every collection cycle.
pub fn observe_gauge(meter: &Meter, sampler: Arc<dyn GaugeSampler>) -> ObservableGauge<f64> {
    let name = sampler.name().to_string();
    let description = sampler.description().to_string();

    meter
        .f64_observable_gauge(name)
        .with_description(description)
        .with_callback(move |observer| {
            for reading in sampler.sample() {
                observer.observe(reading.value, &reading.attributes);
            }
        })
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::sampling::Observation;
    use opentelemetry::metrics::MeterProvider;
    use opentelemetry::KeyValue;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSampler(AtomicUsize);

    impl GaugeSampler for CountingSampler {
        fn name(&self) -> &str {
            "polls"
        }

        fn sample(&self) -> Vec<Observation> {
            let n = self.0.fetch_add(1, Ordering::SeqCst);
            vec![Observation::new(n as f64, vec![KeyValue::new("A", "B")])]
        }
    }

    #[tokio::test]
    async fn test_gauge_sampler_polled_on_collect() {
        let config = MetricsConfig {
            exporter: MetricsExporter::Stdout,
            ..Default::default()
        };
        let component = meter_provider(Context::background(), Resource::builder_empty().build(), config, None)
            .await
            .unwrap();
        let provider = component.value().clone();

        let sampler = Arc::new(CountingSampler(AtomicUsize::new(0)));
        let _gauge = observe_gauge(&provider.meter("test"), sampler.clone());

        provider.force_flush().unwrap();
        assert!(sampler.0.load(Ordering::SeqCst) >= 1);

        let (_, release, _) = component.into_parts();
        release.call(&Context::background()).await.unwrap();
    }

    #[tokio::test]
    async fn test_prometheus_mode_has_no_reader() {
        let config = MetricsConfig {
            exporter: MetricsExporter::Prometheus,
            ..Default::default()
        };
        let component = meter_provider(Context::background(), Resource::builder_empty().build(), config, None)
            .await
            .unwrap();

        let counter = component.value().meter("test").u64_counter("dice.rolls").build();
        counter.add(1, &[]);

        let (_, release, install) = component.into_parts();
        assert!(install.is_some());
        release.call(&Context::background()).await.unwrap();
    }
}
