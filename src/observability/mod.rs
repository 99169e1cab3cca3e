//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! TelemetryConfig
//!     → resource.rs (service identity + process defaults)
//!     → connection.rs (gRPC channel shared by OTLP exporters)
//!     → tracing.rs (tracer provider, span exporter)
//!     → metrics.rs (meter provider, periodic reader)
//!     → prometheus.rs (scrape endpoint, optional)
//!     → pipeline.rs (Telemetry handle over the lifecycle coordinator)
//!
//! Alongside:
//!     → logging.rs (process log output via `tracing`)
//!     → propagation.rs (W3C trace context in HTTP headers)
//!     → sampling.rs (gauge values pulled at collection time)
//! ```
//!
//! # Design Decisions
//! - Every provider is a lifecycle component: value, release, installer
//! - Handlers receive tracers and meters by injection, never from globals
//! - Structured logging (JSON) for machine parsing

pub mod connection;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod prometheus;
pub mod propagation;
pub mod resource;
pub mod sampling;
pub mod tracing;

pub use pipeline::Telemetry;
pub use resource::{ResourceDescriptor, ServiceIdentity};
pub use sampling::{GaugeSampler, Observation, UniformSampler};
