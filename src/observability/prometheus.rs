//! Prometheus scrape endpoint.
//!
//! # Responsibilities
//! - Build a `metrics` recorder with the configured histogram buckets
//! - Bind and serve `GET /metrics` during construction
//! - Poll gauge samplers at scrape time
//! - Stop the server gracefully on release
//!
//! # Design Decisions
//! - A bind failure is a construction failure, not a background log line
//! - Instruments are recorded through the `metrics` facade; the recorder is
//!   usable as a scoped local recorder until it is installed globally

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{extract::State, http::header, response::IntoResponse, routing::get, Router};
use metrics::{Counter, Gauge, Histogram, Key, KeyName, Label, Metadata, Recorder, SharedString, Unit};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle, PrometheusRecorder};
use opentelemetry_sdk::Resource;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::config::MetricsConfig;
use crate::lifecycle::{BoxError, Component, Context, ContextError, ShutdownFunc};
use crate::observability::sampling::GaugeSampler;

pub const SUBSYSTEM: &str = "prometheus exporter";

const CONTENT_TYPE: &str = "text/plain; version=0.0.4";

/// Recorder shared between the scrape handler, local scopes and the
/// global installation.
#[derive(Clone)]
pub struct SharedRecorder(Arc<PrometheusRecorder>);

impl Recorder for SharedRecorder {
    fn describe_counter(&self, key: KeyName, unit: Option<Unit>, description: SharedString) {
        self.0.describe_counter(key, unit, description)
    }

    fn describe_gauge(&self, key: KeyName, unit: Option<Unit>, description: SharedString) {
        self.0.describe_gauge(key, unit, description)
    }

    fn describe_histogram(&self, key: KeyName, unit: Option<Unit>, description: SharedString) {
        self.0.describe_histogram(key, unit, description)
    }

    fn register_counter(&self, key: &Key, metadata: &Metadata<'_>) -> Counter {
        self.0.register_counter(key, metadata)
    }

    fn register_gauge(&self, key: &Key, metadata: &Metadata<'_>) -> Gauge {
        self.0.register_gauge(key, metadata)
    }

    fn register_histogram(&self, key: &Key, metadata: &Metadata<'_>) -> Histogram {
        self.0.register_histogram(key, metadata)
    }
}

/// Handle to a running scrape endpoint.
#[derive(Clone)]
pub struct PrometheusExporter {
    recorder: SharedRecorder,
    handle: PrometheusHandle,
    samplers: Arc<Vec<Arc<dyn GaugeSampler>>>,
    local_addr: SocketAddr,
}

impl PrometheusExporter {
    /// Address the scrape endpoint is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Poll every sampler and render the exposition text.
    pub fn render(&self) -> String {
        metrics::with_local_recorder(&self.recorder, || {
            for sampler in self.samplers.iter() {
                record_samples(sampler.as_ref());
            }
        });
        self.handle.run_upkeep();
        self.handle.render()
    }

    /// Run `f` with this exporter as the `metrics` recorder, whether or not
    /// it has been installed globally.
    pub fn in_scope<T>(&self, f: impl FnOnce() -> T) -> T {
        metrics::with_local_recorder(&self.recorder, f)
    }
}

impl std::fmt::Debug for PrometheusExporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrometheusExporter")
            .field("local_addr", &self.local_addr)
            .field("samplers", &self.samplers.len())
            .finish_non_exhaustive()
    }
}

fn record_samples(sampler: &dyn GaugeSampler) {
    let name = sampler.name().to_string();
    if !sampler.description().is_empty() {
        metrics::describe_gauge!(name.clone(), sampler.description().to_string());
    }
    for reading in sampler.sample() {
        let labels: Vec<Label> = reading
            .attributes
            .iter()
            .map(|kv| Label::new(kv.key.as_str().to_string(), kv.value.as_str().into_owned()))
            .collect();
        metrics::gauge!(name.clone(), labels).set(reading.value);
    }
}

fn recorder(config: &MetricsConfig, resource: &Resource) -> Result<PrometheusRecorder, BoxError> {
    let mut builder = PrometheusBuilder::new();
    for (metric, buckets) in &config.histogram_buckets {
        builder = builder.set_buckets_for_metric(Matcher::Full(metric.clone()), buckets)?;
    }

    let service = opentelemetry::Key::from_static_str(opentelemetry_semantic_conventions::resource::SERVICE_NAME);
    if let Some(name) = resource.get(&service) {
        builder = builder.add_global_label("service_name", name.as_str().into_owned());
    }

    Ok(builder.build_recorder())
}

async fn scrape(State(exporter): State<PrometheusExporter>) -> impl IntoResponse {
    ([(header::CONTENT_TYPE, CONTENT_TYPE)], exporter.render())
}

/// Bind the scrape endpoint and start serving it.
pub async fn prometheus_exporter(
    _ctx: Context,
    resource: Resource,
    config: MetricsConfig,
    samplers: Vec<Arc<dyn GaugeSampler>>,
) -> Result<Component<PrometheusExporter>, BoxError> {
    let recorder = SharedRecorder(Arc::new(recorder(&config, &resource)?));
    let handle = recorder.0.handle();

    let listener = TcpListener::bind(&config.prometheus_address).await?;
    let local_addr = listener.local_addr()?;

    let exporter = PrometheusExporter {
        recorder,
        handle,
        samplers: Arc::new(samplers),
        local_addr,
    };

    let app = Router::new()
        .route("/metrics", get(scrape))
        .with_state(exporter.clone());

    let stop = CancellationToken::new();
    let stopped = stop.clone().cancelled_owned();
    let server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(stopped)
            .await
    });

    tracing::info!(address = %local_addr, "Serving metrics at /metrics");

    let release = ShutdownFunc::new(SUBSYSTEM, move |ctx: Context| async move {
        stop.cancel();
        let mut server = server;
        tokio::select! {
            joined = &mut server => joined??,
            _ = ctx.done() => {
                // Out of time to drain; drop the listener now.
                server.abort();
                return Err(ctx.err().unwrap_or(ContextError::Cancelled).into());
            }
        }
        Ok(())
    });

    let installing = exporter.recorder.clone();
    Ok(Component::new(exporter, release).on_install(move || {
        if metrics::set_global_recorder(installing).is_err() {
            tracing::warn!("A global metrics recorder is already installed");
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::sampling::UniformSampler;
    use opentelemetry::KeyValue;
    use std::collections::BTreeMap;

    fn config() -> MetricsConfig {
        MetricsConfig {
            prometheus_address: "127.0.0.1:0".to_string(),
            histogram_buckets: BTreeMap::from([(
                "baz".to_string(),
                vec![64.0, 128.0, 256.0, 512.0, 1024.0, 2048.0, 4096.0],
            )]),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_render_includes_scoped_instruments_and_samples() {
        let sampler: Arc<dyn GaugeSampler> = Arc::new(
            UniformSampler::new("bar", -10.0..80.0).with_attributes(vec![KeyValue::new("A", "B")]),
        );
        let component = prometheus_exporter(
            Context::background(),
            Resource::builder_empty().build(),
            config(),
            vec![sampler],
        )
        .await
        .unwrap();
        let exporter = component.value().clone();

        exporter.in_scope(|| {
            metrics::counter!("foo").increment(5);
            metrics::histogram!("baz").record(136.0);
        });

        let text = exporter.render();
        assert!(text.contains("foo 5"));
        assert!(text.contains("baz_bucket{le=\"256\"} 1"));
        assert!(text.contains("bar{A=\"B\"}"));

        let (_, release, _) = component.into_parts();
        release.call(&Context::background()).await.unwrap();
    }

    #[tokio::test]
    async fn test_release_on_cancelled_context_closes_endpoint() {
        let component = prometheus_exporter(
            Context::background(),
            Resource::builder_empty().build(),
            config(),
            Vec::new(),
        )
        .await
        .unwrap();
        let addr = component.value().local_addr();
        let (_, release, _) = component.into_parts();

        let ctx = Context::background();
        ctx.cancel();
        let _ = release.call(&ctx).await;

        let mut closed = false;
        for _ in 0..100 {
            if tokio::net::TcpStream::connect(addr).await.is_err() {
                closed = true;
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        assert!(closed);
    }

    #[tokio::test]
    async fn test_bind_failure_is_construction_error() {
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let config = MetricsConfig {
            prometheus_address: taken.local_addr().unwrap().to_string(),
            ..Default::default()
        };

        let err = prometheus_exporter(Context::background(), Resource::builder_empty().build(), config, Vec::new())
            .await
            .unwrap_err();
        let io = err.downcast_ref::<std::io::Error>().unwrap();
        assert_eq!(io.kind(), std::io::ErrorKind::AddrInUse);
    }
}
