//! Server span middleware.
//! Opens one span per request, parented on the caller's propagated context.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{MatchedPath, State},
    http::Request,
    middleware::Next,
    response::Response,
};
use opentelemetry::propagation::TextMapCompositePropagator;
use opentelemetry::trace::{SpanKind, Status, TraceContextExt, Tracer};
use opentelemetry::KeyValue;
use opentelemetry_sdk::trace::SdkTracer;

use crate::observability::propagation;

/// State for [`trace_request`].
#[derive(Clone)]
pub struct RequestTracing {
    pub tracer: Arc<SdkTracer>,
    pub propagator: Arc<TextMapCompositePropagator>,
}

/// Wrap the request in a server span named `<METHOD> <route>`.
///
/// The span's context is stored in the request extensions so handlers can
/// parent their own spans on it. Install with `route_layer` so the matched
/// route is known.
pub async fn trace_request(
    State(state): State<RequestTracing>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let parent = propagation::extract(state.propagator.as_ref(), req.headers());
    let method = req.method().to_string();
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());

    let span = state
        .tracer
        .span_builder(format!("{} {}", method, route))
        .with_kind(SpanKind::Server)
        .with_attributes(vec![
            KeyValue::new("http.route", route),
            KeyValue::new("http.request.method", method),
        ])
        .start_with_context(state.tracer.as_ref(), &parent);
    let cx = parent.with_span(span);

    req.extensions_mut().insert(cx.clone());
    let response = next.run(req).await;

    let status = response.status();
    let span = cx.span();
    span.set_attribute(KeyValue::new("http.response.status_code", i64::from(status.as_u16())));
    if status.is_server_error() {
        span.set_status(Status::error(status.to_string()));
    }
    span.end();

    response
}

/// Context stored by [`trace_request`], or the empty context outside it.
pub fn request_context(req: &Request<Body>) -> opentelemetry::Context {
    req.extensions()
        .get::<opentelemetry::Context>()
        .cloned()
        .unwrap_or_default()
}
