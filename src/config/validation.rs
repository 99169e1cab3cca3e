//! Configuration validation.
//!
//! Serde handles syntax; this module checks value ranges, addresses and
//! endpoints. Every problem is reported, not just the first.

use std::net::SocketAddr;

use thiserror::Error;
use url::Url;

use crate::config::schema::{MetricsExporter, TelemetryConfig, TraceExporter};

/// A single semantic problem in a configuration.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("service.name must not be empty")]
    EmptyServiceName,

    #[error("{field} must be greater than zero")]
    NotPositive { field: &'static str },

    #[error("tracing.sampling_ratio must be within [0, 1], got {0}")]
    SamplingRatio(f64),

    #[error("{field} is not a valid endpoint URL: {value}")]
    Endpoint { field: &'static str, value: String },

    #[error("{field} is not a valid socket address: {value}")]
    Address { field: &'static str, value: String },

    #[error("histogram buckets for {metric} must be finite and strictly increasing")]
    Buckets { metric: String },
}

/// Validate a configuration, returning every error found.
pub fn validate_config(config: &TelemetryConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.service.name.trim().is_empty() {
        errors.push(ValidationError::EmptyServiceName);
    }

    let tracing = &config.tracing;
    if !(0.0..=1.0).contains(&tracing.sampling_ratio) {
        errors.push(ValidationError::SamplingRatio(tracing.sampling_ratio));
    }
    if tracing.batch_timeout_ms == 0 {
        errors.push(ValidationError::NotPositive { field: "tracing.batch_timeout_ms" });
    }
    if tracing.export_timeout_secs == 0 {
        errors.push(ValidationError::NotPositive { field: "tracing.export_timeout_secs" });
    }
    if matches!(tracing.exporter, TraceExporter::Otlp | TraceExporter::Jaeger) {
        check_endpoint("tracing.endpoint", &tracing.endpoint, &mut errors);
    }

    let metrics = &config.metrics;
    if metrics.export_interval_ms == 0 {
        errors.push(ValidationError::NotPositive { field: "metrics.export_interval_ms" });
    }
    match metrics.exporter {
        MetricsExporter::Otlp => check_endpoint("metrics.endpoint", &metrics.endpoint, &mut errors),
        MetricsExporter::Prometheus => check_address(
            "metrics.prometheus_address",
            &metrics.prometheus_address,
            &mut errors,
        ),
        MetricsExporter::None | MetricsExporter::Stdout => {}
    }
    for (metric, buckets) in &metrics.histogram_buckets {
        let increasing = buckets.windows(2).all(|w| w[0] < w[1]);
        if buckets.is_empty() || !increasing || buckets.iter().any(|b| !b.is_finite()) {
            errors.push(ValidationError::Buckets { metric: metric.clone() });
        }
    }

    check_address("http.bind_address", &config.http.bind_address, &mut errors);
    if config.http.read_timeout_secs == 0 {
        errors.push(ValidationError::NotPositive { field: "http.read_timeout_secs" });
    }
    if config.http.write_timeout_secs == 0 {
        errors.push(ValidationError::NotPositive { field: "http.write_timeout_secs" });
    }
    if config.shutdown.timeout_secs == 0 {
        errors.push(ValidationError::NotPositive { field: "shutdown.timeout_secs" });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_endpoint(field: &'static str, value: &str, errors: &mut Vec<ValidationError>) {
    let valid = Url::parse(value)
        .map(|url| matches!(url.scheme(), "http" | "https") && url.host().is_some())
        .unwrap_or(false);
    if !valid {
        errors.push(ValidationError::Endpoint {
            field,
            value: value.to_string(),
        });
    }
}

fn check_address(field: &'static str, value: &str, errors: &mut Vec<ValidationError>) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::Address {
            field,
            value: value.to_string(),
        });
    }
}
