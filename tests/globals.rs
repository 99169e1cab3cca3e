//! Process-wide installation. Kept in its own test binary so no other test
//! shares the globals it sets.

use std::collections::HashMap;

use opentelemetry::global;
use opentelemetry::propagation::TextMapPropagator;
use opentelemetry::trace::{Span, TraceContextExt, Tracer};
use telemetry_demo::config::MetricsExporter;
use telemetry_demo::lifecycle::Context;
use telemetry_demo::observability::Telemetry;

mod common;

#[tokio::test]
async fn test_init_installs_tracer_propagator_and_recorder() {
    let before = global::tracer("before").start("noop");
    assert!(!before.span_context().is_valid());

    let mut config = common::local_config();
    config.install_globals = true;
    config.metrics.exporter = MetricsExporter::Prometheus;
    let ctx = Context::background();
    let mut telemetry = Telemetry::init(&ctx, &config).await.unwrap();

    let span = global::tracer("after").start("installed");
    assert!(span.span_context().is_valid());

    let cx = opentelemetry::Context::current_with_span(span);
    let mut headers: HashMap<String, String> = HashMap::new();
    global::get_text_map_propagator(|propagator| propagator.inject_context(&cx, &mut headers));
    assert!(headers.contains_key("traceparent"));
    cx.span().end();

    metrics::counter!("installed_total").increment(3);
    let text = telemetry.prometheus().unwrap().render();
    assert!(text.contains("installed_total"));

    telemetry.shutdown(&ctx).await.unwrap();
}
