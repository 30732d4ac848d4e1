//! Pool and batch errors.

use reachmap_core::AreaId;
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// The last diagnostic a failing worker reported before exiting, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerDiagnostic {
    /// Error message.
    pub message: String,

    /// Stack trace captured by the worker.
    pub stack: Option<String>,

    /// Additional structured details.
    pub details: Option<Value>,
}

impl WorkerDiagnostic {
    /// Diagnostic for a worker that died without reporting anything.
    pub fn unknown() -> Self {
        Self {
            message: "unknown worker failure".to_string(),
            stack: None,
            details: None,
        }
    }

    /// True when the worker never reported a diagnostic.
    pub fn is_unknown(&self) -> bool {
        self.message == "unknown worker failure"
    }
}

impl fmt::Display for WorkerDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Fatal batch errors raised by the worker pool.
///
/// Any of these fails the whole batch: partial results are discarded and
/// every other live worker is sent a termination signal.
#[derive(Debug, Error)]
pub enum PoolError {
    /// A worker exited non-zero.
    #[error("worker for area {area} exited with code {code} - {diagnostic}")]
    WorkerFailed {
        area: AreaId,
        code: i32,
        diagnostic: WorkerDiagnostic,
    },

    /// A worker was terminated by a signal before the batch failed.
    #[error("worker for area {area} was terminated by a signal")]
    WorkerKilled { area: AreaId },

    /// A worker exited cleanly without ever sending `done`.
    #[error("worker for area {area} exited without sending done")]
    MissingDone { area: AreaId },

    /// A worker exceeded the configured wall-clock timeout.
    #[error("worker for area {area} timed out after {timeout_secs}s")]
    TimedOut { area: AreaId, timeout_secs: u64 },

    /// The worker process could not be started.
    #[error("failed to spawn worker for area {area}: {source}")]
    Spawn {
        area: AreaId,
        #[source]
        source: std::io::Error,
    },

    /// An exit arrived for an area the pool never registered; the batch
    /// accounting can no longer be trusted.
    #[error("worker exit for unregistered area {area}")]
    Unregistered { area: AreaId },
}

impl PoolError {
    /// The exit code carried by this error, if the worker got far enough to
    /// produce one.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::WorkerFailed { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// The failing worker's diagnostic, if one was reported.
    pub fn diagnostic(&self) -> Option<&WorkerDiagnostic> {
        match self {
            Self::WorkerFailed { diagnostic, .. } => Some(diagnostic),
            _ => None,
        }
    }

    /// The area whose worker triggered the failure.
    pub fn area(&self) -> &AreaId {
        match self {
            Self::WorkerFailed { area, .. }
            | Self::WorkerKilled { area }
            | Self::MissingDone { area }
            | Self::TimedOut { area, .. }
            | Self::Spawn { area, .. }
            | Self::Unregistered { area } => area,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_diagnostic_message() {
        let err = PoolError::WorkerFailed {
            area: AreaId::new("aa-3"),
            code: 2,
            diagnostic: WorkerDiagnostic::unknown(),
        };
        assert_eq!(err.exit_code(), Some(2));
        assert!(err.to_string().contains("unknown worker failure"));
        assert!(err.to_string().contains("code 2"));
    }

    #[test]
    fn test_unregistered_exit_is_attributed() {
        let err = PoolError::Unregistered {
            area: AreaId::new("aa-9"),
        };
        assert_eq!(err.area().as_str(), "aa-9");
        assert_eq!(err.exit_code(), None);
        assert!(err.to_string().contains("unregistered area aa-9"));
    }
}
