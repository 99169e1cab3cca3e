//! Tracer provider construction.
//!
//! # Responsibilities
//! - Build the span exporter selected in config (stdout, OTLP, Jaeger)
//! - Wrap it in a batch span processor with the configured delay
//! - Hand back the provider, its release, and its global installation
//!
//! # Design Decisions
//! - Jaeger is reached through its native OTLP/gRPC receiver
//! - OTLP exports reuse a channel from [`super::connection`] when given one
//! - The provider is returned to the caller; installing it globally is deferred

use std::time::Duration;

use opentelemetry::global;
use opentelemetry_otlp::{WithExportConfig, WithTonicConfig};
use opentelemetry_sdk::trace::{
    BatchConfigBuilder, BatchSpanProcessor, Sampler, SdkTracerProvider, SpanExporter,
};
use opentelemetry_sdk::Resource;
use tonic::transport::Channel;

use crate::config::{TraceExporter, TracingConfig};
use crate::lifecycle::{BoxError, Component, Context, ShutdownFunc};

pub const SUBSYSTEM: &str = "tracer provider";

/// Sampler for a configured ratio.
pub fn sampler(ratio: f64) -> Sampler {
    if ratio >= 1.0 {
        Sampler::AlwaysOn
    } else if ratio <= 0.0 {
        Sampler::AlwaysOff
    } else {
        Sampler::ParentBased(Box::new(Sampler::TraceIdRatioBased(ratio)))
    }
}

/// Build a tracer provider for `config`.
pub async fn tracer_provider(
    _ctx: Context,
    resource: Resource,
    config: TracingConfig,
    channel: Option<Channel>,
) -> Result<Component<SdkTracerProvider>, BoxError> {
    let builder = SdkTracerProvider::builder()
        .with_resource(resource)
        .with_sampler(sampler(config.sampling_ratio));

    let provider = match config.exporter {
        TraceExporter::None => builder.build(),
        TraceExporter::Stdout => builder
            .with_span_processor(batch(opentelemetry_stdout::SpanExporter::default(), &config))
            .build(),
        TraceExporter::Otlp | TraceExporter::Jaeger => {
            let otlp = opentelemetry_otlp::SpanExporter::builder()
                .with_tonic()
                .with_timeout(Duration::from_secs(config.export_timeout_secs));
            let exporter = match channel {
                Some(channel) => otlp.with_channel(channel).build()?,
                None => otlp.with_endpoint(config.endpoint.clone()).build()?,
            };
            builder.with_span_processor(batch(exporter, &config)).build()
        }
    };

    tracing::info!(
        exporter = ?config.exporter,
        endpoint = %config.endpoint,
        sampling_ratio = config.sampling_ratio,
        "Tracer provider ready"
    );

    Ok(into_component(provider))
}

fn batch<E>(exporter: E, config: &TracingConfig) -> BatchSpanProcessor
where
    E: SpanExporter + 'static,
{
    BatchSpanProcessor::builder(exporter)
        .with_batch_config(
            BatchConfigBuilder::default()
                .with_scheduled_delay(Duration::from_millis(config.batch_timeout_ms))
                .build(),
        )
        .build()
}

/// Release flushes pending spans; installation makes the provider global.
pub fn into_component(provider: SdkTracerProvider) -> Component<SdkTracerProvider> {
    let releasing = provider.clone();
    let installing = provider.clone();
    Component::new(
        provider,
        ShutdownFunc::blocking(SUBSYSTEM, move || releasing.shutdown().map_err(Into::into)),
    )
    .on_install(move || {
        global::set_tracer_provider(installing);
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use opentelemetry::trace::{Span, Tracer, TracerProvider};

    #[test]
    fn test_sampler_for_ratio() {
        assert!(matches!(sampler(1.0), Sampler::AlwaysOn));
        assert!(matches!(sampler(0.0), Sampler::AlwaysOff));
        assert!(matches!(sampler(0.25), Sampler::ParentBased(_)));
    }

    #[tokio::test]
    async fn test_otlp_exporter_uses_given_channel() {
        let config = TracingConfig {
            exporter: TraceExporter::Otlp,
            ..Default::default()
        };
        let channel = tonic::transport::Endpoint::from_static("http://127.0.0.1:1").connect_lazy();
        let component = tracer_provider(Context::background(), Resource::builder_empty().build(), config, Some(channel))
            .await
            .unwrap();

        let (_, release, _) = component.into_parts();
        // Nothing was exported, so shutdown never dials the collector.
        release.call(&Context::background()).await.unwrap();
    }

    #[tokio::test]
    async fn test_provider_without_exporter_releases_once() {
        let config = TracingConfig {
            exporter: TraceExporter::None,
            ..Default::default()
        };
        let component = tracer_provider(Context::background(), Resource::builder_empty().build(), config, None)
            .await
            .unwrap();

        let tracer = component.value().tracer("test");
        let mut span = tracer.start("unit");
        assert!(span.span_context().is_valid());
        span.end();

        let (_, release, install) = component.into_parts();
        assert!(install.is_some());
        let mut shutdown = crate::lifecycle::Shutdown::new();
        shutdown.push(release);
        assert!(shutdown.shutdown(&Context::background()).await.is_ok());
        assert!(shutdown.shutdown(&Context::background()).await.is_ok());
    }
}
