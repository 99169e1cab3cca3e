//! Shared gRPC connection to an OTLP collector.
//!
//! # Design Decisions
//! - One lazily connected channel per distinct collector endpoint, handed
//!   to both the span and the metric exporter
//! - Registered before the providers so it outlives their final flush

use opentelemetry_sdk::Resource;
use tonic::transport::{Channel, Endpoint};

use crate::config::{MetricsExporter, TelemetryConfig, TraceExporter};
use crate::lifecycle::{BoxError, Component, Context, ShutdownFunc};

pub const SUBSYSTEM: &str = "grpc connection";

/// Collector endpoints `config` exports to over OTLP/gRPC, without repeats.
pub fn otlp_endpoints(config: &TelemetryConfig) -> Vec<String> {
    let mut endpoints = Vec::new();
    if matches!(config.tracing.exporter, TraceExporter::Otlp | TraceExporter::Jaeger) {
        endpoints.push(config.tracing.endpoint.clone());
    }
    if config.metrics.exporter == MetricsExporter::Otlp && !endpoints.contains(&config.metrics.endpoint) {
        endpoints.push(config.metrics.endpoint.clone());
    }
    endpoints
}

/// Open a channel to `endpoint`.
///
/// The channel connects on first use, so an unreachable collector does not
/// fail construction; exports report it instead.
pub async fn otlp_channel(_ctx: Context, _resource: Resource, endpoint: String) -> Result<Component<Channel>, BoxError> {
    let channel = Endpoint::from_shared(endpoint.clone())?.connect_lazy();
    tracing::info!(endpoint = %endpoint, "gRPC connection prepared");

    // Exporters hold their own clones; the connection closes with the last one.
    let held = channel.clone();
    let release = ShutdownFunc::new(SUBSYSTEM, move |_| async move {
        drop(held);
        Ok(())
    });
    Ok(Component::new(channel, release))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_endpoint_listed_once() {
        let mut config = TelemetryConfig::default();
        config.tracing.exporter = TraceExporter::Otlp;
        config.metrics.exporter = MetricsExporter::Otlp;
        assert_eq!(otlp_endpoints(&config), vec!["http://localhost:4317".to_string()]);

        config.metrics.endpoint = "http://collector:4317".to_string();
        assert_eq!(otlp_endpoints(&config).len(), 2);

        config.tracing.exporter = TraceExporter::Stdout;
        config.metrics.exporter = MetricsExporter::Prometheus;
        assert!(otlp_endpoints(&config).is_empty());
    }

    #[tokio::test]
    async fn test_channel_built_without_collector() {
        let component = otlp_channel(
            Context::background(),
            Resource::builder_empty().build(),
            "http://127.0.0.1:1".to_string(),
        )
        .await
        .unwrap();

        let (_, release, install) = component.into_parts();
        assert!(install.is_none());
        release.call(&Context::background()).await.unwrap();
    }

    #[tokio::test]
    async fn test_invalid_endpoint_fails() {
        let result = otlp_channel(
            Context::background(),
            Resource::builder_empty().build(),
            "not a uri".to_string(),
        )
        .await;
        assert!(result.is_err());
    }
}
