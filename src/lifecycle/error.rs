//! Error types for subsystem construction and teardown.

use std::borrow::Cow;
use std::fmt;

use thiserror::Error;

/// Opaque error returned by a subsystem factory or shutdown call.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// One subsystem that failed to release its resources.
#[derive(Debug, Error)]
#[error("{subsystem}: {source}")]
pub struct SubsystemFailure {
    pub subsystem: Cow<'static, str>,
    #[source]
    pub source: BoxError,
}

/// Every failure collected by one shutdown pass, in registration order.
///
/// Nothing is dropped: a subsystem that failed appears here exactly once.
#[derive(Debug, Default)]
pub struct ShutdownErrors {
    failures: Vec<SubsystemFailure>,
}

impl ShutdownErrors {
    pub(crate) fn push(&mut self, failure: SubsystemFailure) {
        self.failures.push(failure);
    }

    pub(crate) fn into_result(self) -> Result<(), Self> {
        if self.failures.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }

    pub fn len(&self) -> usize {
        self.failures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SubsystemFailure> {
        self.failures.iter()
    }

    /// Names of the failed subsystems, in shutdown order.
    pub fn subsystems(&self) -> Vec<&str> {
        self.failures.iter().map(|f| f.subsystem.as_ref()).collect()
    }
}

impl fmt::Display for ShutdownErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, failure) in self.failures.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "failed to shut down {}", failure)?;
        }
        Ok(())
    }
}

impl std::error::Error for ShutdownErrors {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.failures
            .first()
            .map(|f| f as &(dyn std::error::Error + 'static))
    }
}

impl IntoIterator for ShutdownErrors {
    type Item = SubsystemFailure;
    type IntoIter = std::vec::IntoIter<SubsystemFailure>;

    fn into_iter(self) -> Self::IntoIter {
        self.failures.into_iter()
    }
}

/// Errors surfaced by the lifecycle coordinator.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// A subsystem failed to initialize. Subsystems registered before it
    /// were shut down; their failures, if any, are in `cleanup`.
    #[error("failed to construct {subsystem}: {source}{}", fmt_cleanup(.cleanup))]
    Construction {
        subsystem: Cow<'static, str>,
        #[source]
        source: BoxError,
        cleanup: Option<ShutdownErrors>,
    },

    /// One or more subsystems failed to shut down.
    #[error(transparent)]
    Shutdown(#[from] ShutdownErrors),
}

fn fmt_cleanup(cleanup: &Option<ShutdownErrors>) -> String {
    match cleanup {
        Some(errors) => format!("\n{}", errors),
        None => String::new(),
    }
}

impl LifecycleError {
    /// Name of the subsystem that failed to construct.
    pub fn subsystem(&self) -> Option<&str> {
        match self {
            Self::Construction { subsystem, .. } => Some(subsystem),
            Self::Shutdown(_) => None,
        }
    }

    /// Shutdown failures joined into this error.
    pub fn shutdown_errors(&self) -> Option<&ShutdownErrors> {
        match self {
            Self::Construction { cleanup, .. } => cleanup.as_ref(),
            Self::Shutdown(errors) => Some(errors),
        }
    }
}
