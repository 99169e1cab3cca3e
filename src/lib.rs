//! OpenTelemetry demo programs built on a telemetry lifecycle coordinator.

pub mod config;
pub mod demo;
pub mod http;
pub mod lifecycle;
pub mod observability;

pub use config::schema::TelemetryConfig;
pub use lifecycle::{construct, Context, LifecycleError, Shutdown, ShutdownFunc};
pub use observability::Telemetry;
