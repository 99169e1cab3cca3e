//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Merge resource → construct subsystem → register its ShutdownFunc → next
//!     any failure → release registered subsystems → joined error
//!     all succeeded → install process defaults → combined Shutdown
//!
//! Shutdown (shutdown.rs):
//!     release each subsystem in registration order → join errors → clear
//!
//! Signals (signals.rs):
//!     SIGINT/SIGTERM → cancel Context (context.rs)
//! ```
//!
//! # Design Decisions
//! - Ordered startup and ordered shutdown, both in registration order
//! - Shutdown never short-circuits and is idempotent
//! - The coordinator returns errors, callers decide what to log

pub mod context;
pub mod error;
pub mod shutdown;
pub mod signals;
pub mod startup;

pub use context::{Context, ContextError};
pub use error::{BoxError, LifecycleError, ShutdownErrors, SubsystemFailure};
pub use shutdown::{Shutdown, ShutdownFunc};
pub use signals::{notify_context, SignalListener, Signals};
pub use startup::{construct, Component, Installer, Startup, SubsystemFactory};
