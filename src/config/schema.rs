//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the demos.
//! All types derive Serde traits for deserialization from config files.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::observability::resource::ServiceIdentity;

/// Root configuration for a telemetry demo.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Service identity attached to the resource.
    pub service: ServiceConfig,

    /// Trace pipeline settings.
    pub tracing: TracingConfig,

    /// Metric pipeline settings.
    pub metrics: MetricsConfig,

    /// Log output settings.
    pub logging: LoggingConfig,

    /// HTTP server settings (dice demo).
    pub http: HttpConfig,

    /// Shutdown settings.
    pub shutdown: ShutdownConfig,

    /// Install providers as process-wide defaults once constructed.
    pub install_globals: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service: ServiceConfig::default(),
            tracing: TracingConfig::default(),
            metrics: MetricsConfig::default(),
            logging: LoggingConfig::default(),
            http: HttpConfig::default(),
            shutdown: ShutdownConfig::default(),
            install_globals: true,
        }
    }
}

/// Service identity.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Service name (`service.name`).
    pub name: String,

    /// Service version (`service.version`).
    pub version: Option<String>,

    /// Extra resource attributes.
    pub attributes: BTreeMap<String, String>,

    /// Add host/process attributes (os, arch, pid, executable).
    pub detect_resources: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "telemetry-demo".to_string(),
            version: Some(env!("CARGO_PKG_VERSION").to_string()),
            attributes: BTreeMap::new(),
            detect_resources: false,
        }
    }
}

impl ServiceConfig {
    pub fn identity(&self) -> ServiceIdentity {
        ServiceIdentity {
            name: self.name.clone(),
            version: self.version.clone(),
            attributes: self.attributes.clone(),
        }
    }
}

/// Span exporter selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TraceExporter {
    /// Spans are recorded but never exported.
    None,
    /// Print spans to stdout.
    #[default]
    Stdout,
    /// OTLP over gRPC.
    Otlp,
    /// Jaeger collector (native OTLP/gRPC receiver).
    Jaeger,
}

/// Trace pipeline configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TracingConfig {
    pub exporter: TraceExporter,

    /// Collector endpoint for `otlp` and `jaeger`.
    pub endpoint: String,

    /// Delay between batch exports in milliseconds.
    pub batch_timeout_ms: u64,

    /// Fraction of traces sampled (0.0 - 1.0).
    pub sampling_ratio: f64,

    /// Exporter request timeout in seconds.
    pub export_timeout_secs: u64,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            exporter: TraceExporter::Stdout,
            endpoint: "http://localhost:4317".to_string(),
            batch_timeout_ms: 5000,
            sampling_ratio: 1.0,
            export_timeout_secs: 10,
        }
    }
}

/// Metric exporter selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MetricsExporter {
    /// Measurements are aggregated but never exported.
    None,
    /// Periodically print metrics to stdout.
    #[default]
    Stdout,
    /// OTLP over gRPC.
    Otlp,
    /// Prometheus scrape endpoint.
    Prometheus,
}

/// Metric pipeline configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub exporter: MetricsExporter,

    /// Collector endpoint for `otlp`.
    pub endpoint: String,

    /// Interval between periodic exports in milliseconds.
    pub export_interval_ms: u64,

    /// Scrape endpoint bind address for `prometheus`.
    pub prometheus_address: String,

    /// Explicit histogram bucket boundaries, keyed by metric name.
    pub histogram_buckets: BTreeMap<String, Vec<f64>>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            exporter: MetricsExporter::Stdout,
            endpoint: "http://localhost:4317".to_string(),
            export_interval_ms: 60_000,
            prometheus_address: "0.0.0.0:8080".to_string(),
            histogram_buckets: BTreeMap::new(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset.
    pub level: String,

    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "telemetry_demo=info,tower_http=info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Time allowed to receive a request, in seconds.
    pub read_timeout_secs: u64,

    /// Time allowed to produce a response, in seconds.
    pub write_timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            read_timeout_secs: 1,
            write_timeout_secs: 10,
        }
    }
}

/// Shutdown configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ShutdownConfig {
    /// Deadline for releasing all telemetry subsystems, in seconds.
    pub timeout_secs: u64,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self { timeout_secs: 10 }
    }
}
