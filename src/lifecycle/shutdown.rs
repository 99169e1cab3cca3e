//! Shutdown coordination for telemetry subsystems.

use std::borrow::Cow;
use std::future::Future;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;

use crate::lifecycle::context::Context;
use crate::lifecycle::error::{BoxError, ShutdownErrors, SubsystemFailure};

type Release = Box<dyn FnOnce(Context) -> BoxFuture<'static, Result<(), BoxError>> + Send>;

/// Capability to release the resources of one subsystem.
///
/// Consumed when called, so a single subsystem can never be released twice.
pub struct ShutdownFunc {
    subsystem: Cow<'static, str>,
    release: Release,
}

impl ShutdownFunc {
    /// Wrap an async release operation.
    pub fn new<F, Fut>(subsystem: impl Into<Cow<'static, str>>, release: F) -> Self
    where
        F: FnOnce(Context) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        Self {
            subsystem: subsystem.into(),
            release: Box::new(move |ctx| release(ctx).boxed()),
        }
    }

    /// Wrap a blocking release operation (e.g. an SDK provider flush).
    ///
    /// Runs on the blocking pool; the context bounds how long the caller
    /// waits for it.
    pub fn blocking<F>(subsystem: impl Into<Cow<'static, str>>, release: F) -> Self
    where
        F: FnOnce() -> Result<(), BoxError> + Send + 'static,
    {
        Self::new(subsystem, move |_| async move {
            tokio::task::spawn_blocking(release).await?
        })
    }

    /// A release that has nothing to do.
    pub fn noop(subsystem: impl Into<Cow<'static, str>>) -> Self {
        Self::new(subsystem, |_| async { Ok(()) })
    }

    pub fn subsystem(&self) -> &str {
        &self.subsystem
    }

    /// Release the subsystem, bounded by `ctx`.
    ///
    /// The release always starts, even on a done context; `ctx` only limits
    /// how long the caller waits for it to finish.
    pub async fn call(self, ctx: &Context) -> Result<(), SubsystemFailure> {
        let Self { subsystem, release } = self;
        let result = match ctx.bound(release(ctx.clone())).await {
            Ok(result) => result,
            Err(err) => Err(Box::new(err) as BoxError),
        };
        result.map_err(|source| SubsystemFailure { subsystem, source })
    }
}

impl std::fmt::Debug for ShutdownFunc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShutdownFunc")
            .field("subsystem", &self.subsystem)
            .finish_non_exhaustive()
    }
}

/// Coordinator for graceful shutdown.
///
/// Holds one [`ShutdownFunc`] per constructed subsystem and releases them in
/// registration order. The first call to [`Shutdown::shutdown`] drains the
/// list; later calls do nothing and succeed.
#[derive(Debug, Default)]
pub struct Shutdown {
    funcs: Vec<ShutdownFunc>,
}

impl Shutdown {
    /// Create an empty shutdown coordinator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the release of one more subsystem.
    pub fn push(&mut self, func: ShutdownFunc) {
        self.funcs.push(func);
    }

    /// Number of subsystems still waiting to be released.
    pub fn pending(&self) -> usize {
        self.funcs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.funcs.is_empty()
    }

    /// Subsystem names in release order.
    pub fn subsystems(&self) -> Vec<&str> {
        self.funcs.iter().map(ShutdownFunc::subsystem).collect()
    }

    /// Release every registered subsystem.
    ///
    /// All subsystems are called even when an earlier one fails; every
    /// failure is returned in the joined error.
    pub async fn shutdown(&mut self, ctx: &Context) -> Result<(), ShutdownErrors> {
        let funcs = std::mem::take(&mut self.funcs);
        let mut errors = ShutdownErrors::default();

        for func in funcs {
            tracing::debug!(subsystem = func.subsystem(), "Shutting down subsystem");
            if let Err(failure) = func.call(ctx).await {
                errors.push(failure);
            }
        }

        errors.into_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    fn recording(name: &'static str, log: &Arc<Mutex<Vec<&'static str>>>, fail: bool) -> ShutdownFunc {
        let log = log.clone();
        ShutdownFunc::new(name, move |_| async move {
            log.lock().unwrap().push(name);
            if fail {
                Err(format!("{} broke", name).into())
            } else {
                Ok(())
            }
        })
    }

    #[tokio::test]
    async fn test_shutdown_runs_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut shutdown = Shutdown::new();
        shutdown.push(recording("a", &log, false));
        shutdown.push(recording("b", &log, false));
        shutdown.push(recording("c", &log, false));
        assert_eq!(shutdown.subsystems(), vec!["a", "b", "c"]);

        shutdown.shutdown(&Context::background()).await.unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["a", "b", "c"]);
        assert!(shutdown.is_empty());
    }

    #[tokio::test]
    async fn test_shutdown_is_idempotent() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut shutdown = Shutdown::new();
        shutdown.push(recording("a", &log, true));

        let ctx = Context::background();
        assert!(shutdown.shutdown(&ctx).await.is_err());
        assert!(shutdown.shutdown(&ctx).await.is_ok());
        assert_eq!(log.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failures_do_not_short_circuit() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut shutdown = Shutdown::new();
        shutdown.push(recording("a", &log, true));
        shutdown.push(recording("b", &log, false));
        shutdown.push(recording("c", &log, true));

        let errors = shutdown.shutdown(&Context::background()).await.unwrap_err();
        assert_eq!(errors.subsystems(), vec!["a", "c"]);
        assert_eq!(*log.lock().unwrap(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_blocking_release_is_bounded_by_deadline() {
        let func = ShutdownFunc::blocking("provider", || {
            std::thread::sleep(Duration::from_millis(500));
            Ok(())
        });

        let ctx = Context::background().with_timeout(Duration::from_millis(20));
        let failure = func.call(&ctx).await.unwrap_err();
        assert_eq!(failure.subsystem, "provider");
        assert!(failure.source.to_string().contains("deadline"));
    }

    #[tokio::test]
    async fn test_cancelled_context_still_invokes_release() {
        let ctx = Context::background();
        ctx.cancel();

        let log = Arc::new(Mutex::new(Vec::new()));
        recording("exporter", &log, false).call(&ctx).await.unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["exporter"]);

        let started = Arc::new(Mutex::new(false));
        let flag = started.clone();
        let stuck = ShutdownFunc::new("reader", move |_| async move {
            *flag.lock().unwrap() = true;
            std::future::pending::<()>().await;
            Ok(())
        });
        let failure = stuck.call(&ctx).await.unwrap_err();
        assert_eq!(failure.subsystem, "reader");
        assert!(failure.source.to_string().contains("canceled"));
        assert!(*started.lock().unwrap());
    }

    #[tokio::test]
    async fn test_shutdown_on_cancelled_context_reaches_every_func() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut shutdown = Shutdown::new();
        shutdown.push(recording("a", &log, false));
        shutdown.push(recording("b", &log, true));
        shutdown.push(recording("c", &log, false));

        let ctx = Context::background();
        ctx.cancel();
        let errors = shutdown.shutdown(&ctx).await.unwrap_err();
        assert_eq!(errors.subsystems(), vec!["b"]);
        assert_eq!(*log.lock().unwrap(), vec!["a", "b", "c"]);
    }
}
