//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML) or demo defaults
//!     → loader.rs (parse & deserialize, OTEL_* env overrides)
//!     → validation.rs (semantic checks)
//!     → TelemetryConfig (validated, immutable)
//!     → handed to the telemetry pipeline and the demo
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; providers are never replaced at runtime
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::HttpConfig;
pub use schema::LogFormat;
pub use schema::LoggingConfig;
pub use schema::MetricsConfig;
pub use schema::MetricsExporter;
pub use schema::ServiceConfig;
pub use schema::TelemetryConfig;
pub use schema::TraceExporter;
pub use schema::TracingConfig;
