//! Demonstration programs.
//!
//! Each demo exposes `config()` (its defaults) and `run(ctx, config)`. The
//! context is cancelled by the signals returned from `signals()`; telemetry
//! is always released with a fresh deadline so an interrupt still flushes.

pub mod accounting;
pub mod collector;
pub mod dice;
pub mod jaeger;
pub mod prometheus;

use std::time::Duration;

use thiserror::Error;

use crate::config::{ConfigError, TelemetryConfig};
use crate::lifecycle::{Context, LifecycleError, ShutdownErrors};
use crate::observability::Telemetry;

/// Error returned by a demo run.
#[derive(Debug, Error)]
pub enum DemoError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Shutdown(#[from] ShutdownErrors),

    #[error("{0} is not configured")]
    NotConfigured(&'static str),

    /// The demo failed and releasing telemetry failed too.
    #[error("{run}\n{shutdown}")]
    Joined {
        #[source]
        run: Box<DemoError>,
        shutdown: ShutdownErrors,
    },
}

impl DemoError {
    /// Shutdown failures carried by this error, if any.
    pub fn shutdown_errors(&self) -> Option<&ShutdownErrors> {
        match self {
            DemoError::Shutdown(errors) | DemoError::Joined { shutdown: errors, .. } => Some(errors),
            DemoError::Lifecycle(err) => err.shutdown_errors(),
            _ => None,
        }
    }
}

/// Combine a run outcome with the telemetry release outcome.
pub fn join(run: Result<(), DemoError>, released: Result<(), ShutdownErrors>) -> Result<(), DemoError> {
    match (run, released) {
        (Ok(()), Ok(())) => Ok(()),
        (Err(err), Ok(())) => Err(err),
        (Ok(()), Err(shutdown)) => Err(shutdown.into()),
        (Err(err), Err(shutdown)) => Err(DemoError::Joined {
            run: Box::new(err),
            shutdown,
        }),
    }
}

/// Release `telemetry` within the configured shutdown timeout.
pub async fn release(telemetry: &mut Telemetry, config: &TelemetryConfig) -> Result<(), ShutdownErrors> {
    let ctx = Context::background().with_timeout(Duration::from_secs(config.shutdown.timeout_secs));
    let result = telemetry.shutdown(&ctx).await;
    match &result {
        Ok(()) => tracing::info!("Telemetry shut down"),
        Err(errors) => tracing::error!(failed = ?errors.subsystems(), "Telemetry shutdown failed"),
    }
    result
}
