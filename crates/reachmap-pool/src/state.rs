//! Batch and per-task bookkeeping, owned exclusively by the supervisor.

use crate::error::{PoolError, WorkerDiagnostic};
use reachmap_core::{AreaId, OriginRecord, TaskResult};
use std::collections::HashMap;

/// Mutable state for the whole batch.
///
/// Touched only from the supervising control flow; once the batch terminates
/// (success or fatal failure) it is frozen and drained.
pub(crate) struct BatchState {
    /// Areas that have not yet sent `done`.
    pending: usize,

    /// Completed results, keyed by area so completion order never matters.
    results: HashMap<AreaId, TaskResult>,

    /// The first fatal error, if any. Later failures are not collected.
    fatal: Option<PoolError>,
}

impl BatchState {
    pub(crate) fn new(total: usize) -> Self {
        Self {
            pending: total,
            results: HashMap::with_capacity(total),
            fatal: None,
        }
    }

    /// Decrement the pending count at `done`; returns the post-decrement
    /// count for the routing-area progress event.
    pub(crate) fn mark_done(&mut self) -> usize {
        self.pending = self.pending.saturating_sub(1);
        self.pending
    }

    /// Accept a completed result. Ignored after a fatal error.
    pub(crate) fn accept(&mut self, result: TaskResult) {
        if self.fatal.is_none() {
            self.results.insert(result.area_id.clone(), result);
        }
    }

    /// Record the first fatal error; later ones are dropped.
    pub(crate) fn record_fatal(&mut self, error: PoolError) {
        if self.fatal.is_none() {
            self.fatal = Some(error);
        }
    }

    pub(crate) fn is_failed(&self) -> bool {
        self.fatal.is_some()
    }

    pub(crate) fn take_fatal(&mut self) -> Option<PoolError> {
        self.fatal.take()
    }

    /// Drain results in the given dispatch order.
    pub(crate) fn into_ordered_results(
        mut self,
        order: &[AreaId],
    ) -> Result<Vec<TaskResult>, PoolError> {
        order
            .iter()
            .map(|id| {
                self.results
                    .remove(id)
                    .ok_or_else(|| PoolError::MissingDone { area: id.clone() })
            })
            .collect()
    }
}

/// Per-task bookkeeping between dispatch and exit.
///
/// A task's outcome is decided only at exit, never at `done`/`error` alone,
/// because a worker may still crash after announcing completion.
pub(crate) struct TaskState {
    /// Area name, kept for progress events.
    pub(crate) area_name: String,

    /// Records staged by a `done` message, awaiting a clean exit.
    pub(crate) staged: Option<Vec<OriginRecord>>,

    /// Pending diagnostic from an `error` message, promoted to a batch
    /// failure only if the worker exits non-zero.
    pub(crate) diagnostic: Option<WorkerDiagnostic>,

    /// Remaining work units, from `squarecount`/`square` progress messages.
    pub(crate) squares_remaining: Option<u64>,
}

impl TaskState {
    pub(crate) fn new(area_name: String) -> Self {
        Self {
            area_name,
            staged: None,
            diagnostic: None,
            squares_remaining: None,
        }
    }
}
