//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the dice handler
//! - Wire up middleware (request logging, timeouts, server spans)
//! - Bind server to listener
//! - Stop accepting and drain in-flight requests when the context ends

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware,
    routing::get,
    Router,
};
use opentelemetry::metrics::Counter;
use opentelemetry::trace::{Span, Tracer};
use opentelemetry::KeyValue;
use opentelemetry_sdk::trace::SdkTracer;
use rand::Rng;
use tokio::net::TcpListener;
use tower_http::{
    timeout::{RequestBodyTimeoutLayer, TimeoutLayer},
    trace::TraceLayer,
};

use crate::config::HttpConfig;
use crate::http::middleware::{request_context, trace_request, RequestTracing};
use crate::lifecycle::Context;
use crate::observability::Telemetry;

/// Instrumentation scope of the dice handler.
pub const SCOPE: &str = "telemetry-demo/dice";

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub tracer: Arc<SdkTracer>,
    pub rolls: Counter<u64>,
}

impl AppState {
    pub fn new(telemetry: &Telemetry) -> Self {
        let rolls = telemetry
            .meter(SCOPE)
            .u64_counter("dice.rolls")
            .with_description("The number of rolls by roll value")
            .with_unit("{roll}")
            .build();

        Self {
            tracer: Arc::new(telemetry.tracer(SCOPE)),
            rolls,
        }
    }
}

/// HTTP server for the dice demo.
pub struct DiceServer {
    router: Router,
}

impl DiceServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(telemetry: &Telemetry, config: &HttpConfig) -> Self {
        let state = AppState::new(telemetry);
        let request_tracing = RequestTracing {
            tracer: state.tracer.clone(),
            propagator: telemetry.propagator(),
        };

        Self {
            router: Self::build_router(config, state, request_tracing),
        }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &HttpConfig, state: AppState, request_tracing: RequestTracing) -> Router {
        let router = Router::new()
            .route("/rolldice", get(roll_dice))
            .route_layer(middleware::from_fn_with_state(request_tracing, trace_request))
            .with_state(state);

        with_timeouts(router, config).layer(TraceLayer::new_for_http())
    }

    /// Run the server until `ctx` is done, then drain in-flight requests.
    pub async fn run(self, listener: TcpListener, ctx: Context) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move { ctx.done().await })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Bound request reads by `read_timeout_secs` and responses by
/// `write_timeout_secs`; a slow response becomes `408 Request Timeout`.
fn with_timeouts(router: Router, config: &HttpConfig) -> Router {
    router
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(config.write_timeout_secs),
        ))
        .layer(RequestBodyTimeoutLayer::new(Duration::from_secs(config.read_timeout_secs)))
}

/// Roll a six-sided die.
async fn roll_dice(State(state): State<AppState>, req: Request<Body>) -> String {
    let parent = request_context(&req);
    let mut span = state.tracer.start_with_context("roll", &parent);

    let value: i64 = rand::thread_rng().gen_range(1..=6);
    let attributes = [KeyValue::new("roll.value", value)];
    span.set_attribute(attributes[0].clone());
    state.rolls.add(1, &attributes);
    span.end();

    tracing::debug!(value, "Rolled");
    value.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MetricsExporter, TelemetryConfig, TraceExporter};
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_rolldice_returns_die_face() {
        let mut config = TelemetryConfig {
            install_globals: false,
            ..Default::default()
        };
        config.tracing.exporter = TraceExporter::None;
        config.metrics.exporter = MetricsExporter::None;
        let ctx = Context::background();
        let mut telemetry = Telemetry::init(&ctx, &config).await.unwrap();

        let server = DiceServer::new(&telemetry, &config.http);
        let response = server
            .router
            .oneshot(Request::get("/rolldice").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), 64).await.unwrap();
        let value: u8 = std::str::from_utf8(&body).unwrap().parse().unwrap();
        assert!((1..=6).contains(&value));

        telemetry.shutdown(&ctx).await.unwrap();
    }

    #[tokio::test]
    async fn test_slow_response_times_out() {
        let config = HttpConfig {
            write_timeout_secs: 1,
            ..Default::default()
        };
        let slow = Router::new().route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                "late"
            }),
        );

        let response = with_timeouts(slow, &config)
            .oneshot(Request::get("/slow").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
    }
}
