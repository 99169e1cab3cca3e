//! OS signal handling.
//!
//! SIGINT (and SIGTERM where requested) cancel a derived [`Context`]; every
//! construct, serve and shutdown step observing that context winds down.

use tokio::task::JoinHandle;

use crate::lifecycle::context::Context;

/// Which signals end the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signals {
    /// Ctrl+C only.
    Interrupt,
    /// Ctrl+C or SIGTERM.
    InterruptOrTerminate,
}

/// Background listener that cancels its context on the first signal.
///
/// Dropping or stopping the listener stops watching for signals; the
/// context stays in whatever state it was.
#[derive(Debug)]
pub struct SignalListener {
    handle: JoinHandle<()>,
}

impl SignalListener {
    /// Stop receiving signal notifications as soon as possible.
    pub fn stop(&self) {
        self.handle.abort();
    }
}

impl Drop for SignalListener {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Derive a context from `parent` that is cancelled on the first signal.
pub fn notify_context(parent: &Context, signals: Signals) -> (Context, SignalListener) {
    let ctx = parent.child();
    let notified = ctx.clone();

    let handle = tokio::spawn(async move {
        tokio::select! {
            _ = wait_for(signals) => {
                tracing::info!("Shutdown signal received");
                notified.cancel();
            }
            _ = notified.done() => {}
        }
    });

    (ctx, SignalListener { handle })
}

async fn wait_for(signals: Signals) {
    match signals {
        Signals::Interrupt => interrupt().await,
        Signals::InterruptOrTerminate => {
            tokio::select! {
                _ = interrupt() => {}
                _ = terminate() => {}
            }
        }
    }
}

async fn interrupt() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
}

#[cfg(unix)]
async fn terminate() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut stream) => {
            stream.recv().await;
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to install SIGTERM handler");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminate() {
    std::future::pending::<()>().await;
}
