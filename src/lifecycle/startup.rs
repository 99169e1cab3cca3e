//! Startup orchestration.
//!
//! Subsystems are constructed one at a time. Each one's [`ShutdownFunc`] is
//! registered as soon as it exists, so a later failure releases everything
//! built so far. Process-wide installation only happens once every
//! subsystem is up.

use std::borrow::Cow;
use std::future::Future;

use futures_util::future::BoxFuture;
use opentelemetry_sdk::Resource;

use crate::lifecycle::context::Context;
use crate::lifecycle::error::{BoxError, LifecycleError};
use crate::lifecycle::shutdown::{Shutdown, ShutdownFunc};
use crate::observability::resource::{ResourceDescriptor, ServiceIdentity};

/// Deferred process-wide registration (global provider, recorder, ...).
pub type Installer = Box<dyn FnOnce() + Send>;

/// A constructed subsystem: the handle the caller keeps, how to release
/// it, and optionally how to make it the process default.
pub struct Component<T> {
    value: T,
    shutdown: ShutdownFunc,
    install: Option<Installer>,
}

impl<T> Component<T> {
    pub fn new(value: T, shutdown: ShutdownFunc) -> Self {
        Self {
            value,
            shutdown,
            install: None,
        }
    }

    /// Run `install` once the whole startup has succeeded.
    pub fn on_install(mut self, install: impl FnOnce() + Send + 'static) -> Self {
        self.install = Some(Box::new(install));
        self
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn into_parts(self) -> (T, ShutdownFunc, Option<Installer>) {
        (self.value, self.shutdown, self.install)
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Component<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Component")
            .field("value", &self.value)
            .field("shutdown", &self.shutdown)
            .field("install", &self.install.is_some())
            .finish()
    }
}

/// Type-erased subsystem factory, for callers that assemble a list of
/// subsystems at runtime.
pub trait SubsystemFactory: Send {
    /// Name used in errors.
    fn name(&self) -> Cow<'static, str>;

    fn build(self: Box<Self>, ctx: Context, resource: Resource) -> BoxFuture<'static, Result<Component<()>, BoxError>>;
}

/// In-progress construction of a set of subsystems.
pub struct Startup {
    resource: Resource,
    shutdown: Shutdown,
    installers: Vec<Installer>,
}

impl Startup {
    pub fn new(resource: Resource) -> Self {
        Self {
            resource,
            shutdown: Shutdown::new(),
            installers: Vec::new(),
        }
    }

    /// Resource attached to every subsystem built by this startup.
    pub fn resource(&self) -> &Resource {
        &self.resource
    }

    /// Subsystems registered so far, in registration order.
    pub fn registered(&self) -> Vec<&str> {
        self.shutdown.subsystems()
    }

    /// Queue a process-wide installation that has nothing to release.
    pub fn on_install(&mut self, install: impl FnOnce() + Send + 'static) {
        self.installers.push(Box::new(install));
    }

    /// Construct one subsystem and register its release.
    ///
    /// On failure every previously registered subsystem is shut down with
    /// `ctx` and its errors are joined into the returned error.
    pub async fn register<T, F, Fut>(
        &mut self,
        ctx: &Context,
        subsystem: impl Into<Cow<'static, str>>,
        factory: F,
    ) -> Result<T, LifecycleError>
    where
        F: FnOnce(Context, Resource) -> Fut,
        Fut: Future<Output = Result<Component<T>, BoxError>>,
    {
        let subsystem = subsystem.into();
        let built = match ctx.run(factory(ctx.clone(), self.resource.clone())).await {
            Ok(built) => built,
            Err(err) => Err(Box::new(err) as BoxError),
        };

        match built {
            Ok(component) => {
                tracing::debug!(subsystem = %subsystem, "Subsystem constructed");
                self.shutdown.push(component.shutdown);
                if let Some(install) = component.install {
                    self.installers.push(install);
                }
                Ok(component.value)
            }
            Err(source) => Err(self.abort(ctx, subsystem, source).await),
        }
    }

    /// Construct a type-erased subsystem.
    pub async fn register_factory(
        &mut self,
        ctx: &Context,
        factory: Box<dyn SubsystemFactory>,
    ) -> Result<(), LifecycleError> {
        let name = factory.name();
        self.register(ctx, name, move |ctx, resource| factory.build(ctx, resource))
            .await
    }

    /// Give up: release everything registered so far and build the error
    /// describing why.
    pub async fn abort(
        &mut self,
        ctx: &Context,
        subsystem: impl Into<Cow<'static, str>>,
        source: BoxError,
    ) -> LifecycleError {
        self.installers.clear();
        let cleanup = self.shutdown.shutdown(ctx).await.err();
        LifecycleError::Construction {
            subsystem: subsystem.into(),
            source,
            cleanup,
        }
    }

    /// Install every subsystem as process default and hand back the
    /// combined shutdown.
    pub fn finish(self) -> Shutdown {
        for install in self.installers {
            install();
        }
        self.shutdown
    }

    /// Hand back the combined shutdown without touching process-wide state.
    pub fn finish_local(self) -> Shutdown {
        tracing::debug!(skipped = self.installers.len(), "Skipping global installation");
        self.shutdown
    }
}

/// Build `identity`'s resource, construct every subsystem in order, and
/// return the combined shutdown.
///
/// Either all subsystems come up and are installed, or none stay alive and
/// no process-wide state is touched.
pub async fn construct(
    ctx: &Context,
    identity: &ServiceIdentity,
    factories: Vec<Box<dyn SubsystemFactory>>,
) -> Result<Shutdown, LifecycleError> {
    let resource = build_resource(identity, false)?;

    let mut startup = Startup::new(resource);
    for factory in factories {
        startup.register_factory(ctx, factory).await?;
    }

    Ok(startup.finish())
}

/// Merge process defaults with `identity`, caller attributes winning.
pub(crate) fn build_resource(identity: &ServiceIdentity, detect: bool) -> Result<Resource, LifecycleError> {
    identity
        .validate()
        .map_err(|source| LifecycleError::Construction {
            subsystem: Cow::Borrowed("resource"),
            source: Box::new(source),
            cleanup: None,
        })?;

    let mut defaults = ResourceDescriptor::process_default();
    if detect {
        defaults = defaults.merge(&ResourceDescriptor::detect());
    }
    Ok(defaults.merge(&identity.descriptor()).to_resource())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_register_returns_value_and_defers_install() {
        let installs = Arc::new(AtomicUsize::new(0));
        let mut startup = Startup::new(Resource::builder_empty().build());

        let counter = installs.clone();
        let value = startup
            .register(&Context::background(), "tracer provider", |_, _| async move {
                Ok(Component::new(42, ShutdownFunc::noop("tracer provider"))
                    .on_install(move || {
                        counter.fetch_add(1, Ordering::SeqCst);
                    }))
            })
            .await
            .unwrap();

        assert_eq!(value, 42);
        assert_eq!(installs.load(Ordering::SeqCst), 0);
        assert_eq!(startup.registered(), vec!["tracer provider"]);

        let shutdown = startup.finish();
        assert_eq!(installs.load(Ordering::SeqCst), 1);
        assert_eq!(shutdown.pending(), 1);
    }

    #[tokio::test]
    async fn test_failed_register_releases_earlier_subsystems() {
        let released = Arc::new(AtomicUsize::new(0));
        let mut startup = Startup::new(Resource::builder_empty().build());
        let ctx = Context::background();

        let counter = released.clone();
        startup
            .register(&ctx, "first", |_, _| async move {
                Ok(Component::new(
                    (),
                    ShutdownFunc::new("first", move |_| async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    }),
                ))
            })
            .await
            .unwrap();

        let err = startup
            .register(&ctx, "second", |_, _| async { Err::<Component<()>, _>("boom".into()) })
            .await
            .unwrap_err();

        assert_eq!(err.subsystem(), Some("second"));
        assert!(err.shutdown_errors().is_none());
        assert_eq!(released.load(Ordering::SeqCst), 1);
        assert!(startup.registered().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_context_fails_construction() {
        let ctx = Context::background();
        ctx.cancel();
        let mut startup = Startup::new(Resource::builder_empty().build());

        let err = startup
            .register(&ctx, "meter provider", |_, _| async {
                Ok(Component::new((), ShutdownFunc::noop("meter provider")))
            })
            .await
            .unwrap_err();

        assert_eq!(err.subsystem(), Some("meter provider"));
        assert!(err.to_string().contains("context canceled"));
    }

    #[tokio::test]
    async fn test_cancel_during_registration_releases_earlier_subsystems() {
        let released = Arc::new(AtomicUsize::new(0));
        let mut startup = Startup::new(Resource::builder_empty().build());
        let ctx = Context::background();

        for name in ["tracer provider", "meter provider"] {
            let counter = released.clone();
            startup
                .register(&ctx, name, move |_, _| async move {
                    Ok(Component::new(
                        (),
                        ShutdownFunc::new(name, move |_| async move {
                            counter.fetch_add(1, Ordering::SeqCst);
                            Ok(())
                        }),
                    ))
                })
                .await
                .unwrap();
        }

        let err = startup
            .register(&ctx, "prometheus exporter", |ctx, _| async move {
                ctx.cancel();
                std::future::pending::<Result<Component<()>, BoxError>>().await
            })
            .await
            .unwrap_err();

        assert_eq!(err.subsystem(), Some("prometheus exporter"));
        assert!(err.to_string().contains("context canceled"));
        assert!(err.shutdown_errors().is_none());
        assert_eq!(released.load(Ordering::SeqCst), 2);
        assert!(startup.registered().is_empty());
    }

    #[test]
    fn test_invalid_identity_is_resource_failure() {
        let identity = ServiceIdentity::new("");
        let err = build_resource(&identity, false).unwrap_err();
        assert_eq!(err.subsystem(), Some("resource"));
    }
}
