//! Shared fixtures for lifecycle and server integration tests.

#![allow(dead_code)]

use std::borrow::Cow;
use std::io;
use std::sync::{Arc, Mutex};

use futures_util::future::BoxFuture;
use opentelemetry_sdk::Resource;
use tokio::net::TcpListener;

use telemetry_demo::config::{MetricsExporter, TelemetryConfig, TraceExporter};
use telemetry_demo::lifecycle::{BoxError, Component, Context, ShutdownFunc, SubsystemFactory};
use telemetry_demo::observability::ServiceIdentity;

/// Ordered record of factory calls: "build x", "install x", "shutdown x".
pub type CallLog = Arc<Mutex<Vec<String>>>;

pub fn call_log() -> CallLog {
    Arc::new(Mutex::new(Vec::new()))
}

/// Entries of `log` starting with `action`, reduced to subsystem names.
pub fn calls(log: &CallLog, action: &str) -> Vec<String> {
    let prefix = format!("{} ", action);
    log.lock()
        .unwrap()
        .iter()
        .filter_map(|entry| entry.strip_prefix(&prefix).map(str::to_string))
        .collect()
}

/// How a fake subsystem behaves.
#[derive(Debug, Clone, Copy)]
pub enum Behavior {
    Healthy,
    FailBuild(io::ErrorKind),
    FailShutdown,
    /// Never finishes building.
    Stall,
}

/// Factory that records every call it receives.
pub struct FakeFactory {
    name: &'static str,
    log: CallLog,
    behavior: Behavior,
}

pub fn factory(name: &'static str, log: &CallLog, behavior: Behavior) -> Box<dyn SubsystemFactory> {
    Box::new(FakeFactory {
        name,
        log: log.clone(),
        behavior,
    })
}

impl SubsystemFactory for FakeFactory {
    fn name(&self) -> Cow<'static, str> {
        Cow::Borrowed(self.name)
    }

    fn build(self: Box<Self>, _ctx: Context, _resource: Resource) -> BoxFuture<'static, Result<Component<()>, BoxError>> {
        Box::pin(async move {
            let FakeFactory { name, log, behavior } = *self;
            log.lock().unwrap().push(format!("build {}", name));

            let fail_shutdown = match behavior {
                Behavior::FailBuild(kind) => {
                    return Err(io::Error::new(kind, format!("{} unavailable", name)).into());
                }
                Behavior::Stall => std::future::pending().await,
                Behavior::FailShutdown => true,
                Behavior::Healthy => false,
            };

            let released = log.clone();
            let release = ShutdownFunc::new(name, move |_| async move {
                released.lock().unwrap().push(format!("shutdown {}", name));
                if fail_shutdown {
                    Err(format!("{} flush failed", name).into())
                } else {
                    Ok(())
                }
            });

            Ok(Component::new((), release).on_install(move || {
                log.lock().unwrap().push(format!("install {}", name));
            }))
        })
    }
}

pub fn identity() -> ServiceIdentity {
    ServiceIdentity::new("svc").with_version("1.0")
}

/// Config that exports nothing and leaves globals alone.
pub fn local_config() -> TelemetryConfig {
    let mut config = TelemetryConfig {
        install_globals: false,
        ..Default::default()
    };
    config.tracing.exporter = TraceExporter::None;
    config.metrics.exporter = MetricsExporter::None;
    config.metrics.prometheus_address = "127.0.0.1:0".to_string();
    config.http.bind_address = "127.0.0.1:0".to_string();
    config
}

pub async fn bind_local() -> TcpListener {
    TcpListener::bind("127.0.0.1:0").await.unwrap()
}
