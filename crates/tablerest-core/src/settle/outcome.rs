//! Per-job settle results.

use serde::Serialize;
use std::fmt;

/// Outcome of one job: its value, or the reason it failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Settled<T, E> {
    Fulfilled { value: T },
    Rejected { reason: E },
}

impl<T, E> Settled<T, E> {
    pub fn is_fulfilled(&self) -> bool {
        matches!(self, Settled::Fulfilled { .. })
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, Settled::Rejected { .. })
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Settled::Fulfilled { value } => Some(value),
            Settled::Rejected { .. } => None,
        }
    }

    pub fn reason(&self) -> Option<&E> {
        match self {
            Settled::Fulfilled { .. } => None,
            Settled::Rejected { reason } => Some(reason),
        }
    }

    pub fn into_result(self) -> Result<T, E> {
        match self {
            Settled::Fulfilled { value } => Ok(value),
            Settled::Rejected { reason } => Err(reason),
        }
    }

    /// Convert the rejection reason, e.g. to a string for display.
    pub fn map_reason<F, R>(self, f: R) -> Settled<T, F>
    where
        R: FnOnce(E) -> F,
    {
        match self {
            Settled::Fulfilled { value } => Settled::Fulfilled { value },
            Settled::Rejected { reason } => Settled::Rejected { reason: f(reason) },
        }
    }
}

impl<T, E> From<Result<T, E>> for Settled<T, E> {
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => Settled::Fulfilled { value },
            Err(reason) => Settled::Rejected { reason },
        }
    }
}

/// Why a job was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobFailure<E> {
    /// The job returned an error.
    Failed(E),
    /// The job panicked; carries the panic message when it was a string.
    Panicked(String),
    /// The runtime cancelled the job task before it finished.
    Cancelled,
}

impl<E> JobFailure<E> {
    /// The job's own error, if it returned one.
    pub fn error(&self) -> Option<&E> {
        match self {
            JobFailure::Failed(e) => Some(e),
            JobFailure::Panicked(_) | JobFailure::Cancelled => None,
        }
    }

    pub(super) fn from_join_error(err: tokio::task::JoinError) -> Self {
        if err.is_cancelled() {
            return JobFailure::Cancelled;
        }
        let payload = err.into_panic();
        let msg = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        JobFailure::Panicked(msg)
    }
}

impl<E: fmt::Display> fmt::Display for JobFailure<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobFailure::Failed(e) => write!(f, "{}", e),
            JobFailure::Panicked(msg) => write!(f, "job panicked: {}", msg),
            JobFailure::Cancelled => write!(f, "job cancelled"),
        }
    }
}

impl<E> std::error::Error for JobFailure<E>
where
    E: std::error::Error + 'static,
{
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            JobFailure::Failed(e) => Some(e),
            JobFailure::Panicked(_) | JobFailure::Cancelled => None,
        }
    }
}
