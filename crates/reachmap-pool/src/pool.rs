//! The worker pool supervisor.

use crate::error::{PoolError, WorkerDiagnostic};
use crate::state::{BatchState, TaskState};
use crate::worker::{self, ExitKind, Supervision, WorkerCommand};
use reachmap_core::{
    AnalysisTask, AreaId, NullOperationLog, OperationEvent, OperationLog, TaskResult,
};
use reachmap_proto::WorkerMessage;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Bounded-concurrency scheduler for per-area worker processes.
///
/// One supervising control flow owns all mutable batch state; workers only
/// talk back over the supervision channel. Dispatch order follows the input
/// sequence, completion order is unconstrained, and results are correlated
/// strictly by area identity.
pub struct WorkerPool {
    command: WorkerCommand,
    limit: usize,
    timeout: Option<Duration>,
    log: Arc<dyn OperationLog>,
}

impl WorkerPool {
    /// Create a pool with the concurrency limit defaulting to the available
    /// CPU parallelism.
    pub fn new(command: WorkerCommand) -> Self {
        let limit = std::thread::available_parallelism()
            .map(usize::from)
            .unwrap_or(1);
        Self {
            command,
            limit,
            timeout: None,
            log: Arc::new(NullOperationLog),
        }
    }

    /// Set the concurrency limit (clamped to at least one).
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit.max(1);
        self
    }

    /// Set a per-worker wall-clock timeout. Off by default; an expired
    /// worker is killed and fails the batch.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the operation log sink for progress events.
    pub fn with_log(mut self, log: Arc<dyn OperationLog>) -> Self {
        self.log = log;
        self
    }

    /// Run a batch to completion.
    ///
    /// On success, returns one `TaskResult` per input task in dispatch
    /// order. On fatal failure, every other live worker is sent a
    /// termination signal, already-computed results are discarded, and the
    /// first fatal error is returned.
    pub async fn run(&self, tasks: Vec<AnalysisTask>) -> Result<Vec<TaskResult>, PoolError> {
        info!(tasks = tasks.len(), limit = self.limit, "Routing started");
        self.emit(OperationEvent::routing_started(tasks.len())).await;

        let order: Vec<AreaId> = tasks.iter().map(|t| t.area.id.clone()).collect();
        let mut queue: VecDeque<AnalysisTask> = tasks.into();
        let mut batch = BatchState::new(queue.len());
        let mut running: HashMap<AreaId, TaskState> = HashMap::new();

        let (tx, mut rx) = mpsc::channel::<Supervision>(64);
        let kill_all = CancellationToken::new();

        let mut live = 0usize;
        while live < self.limit {
            match queue.pop_front() {
                Some(task) => {
                    self.dispatch(task, &tx, &kill_all, &mut running);
                    live += 1;
                }
                None => break,
            }
        }

        while live > 0 {
            let Some(event) = rx.recv().await else {
                break;
            };
            match event {
                Supervision::Message { area, msg } => {
                    if batch.is_failed() {
                        continue;
                    }
                    self.handle_message(&area, msg, &mut batch, &mut running)
                        .await;
                }
                Supervision::Exited { area, kind } => {
                    live -= 1;
                    if batch.is_failed() {
                        continue;
                    }
                    let Some(finished) = running.remove(&area) else {
                        warn!(area = %area, "Exit from an unregistered worker, terminating batch");
                        kill_all.cancel();
                        batch.record_fatal(PoolError::Unregistered { area });
                        break;
                    };
                    match self.settle(&area, kind, finished, &mut batch) {
                        Ok(()) => {
                            if let Some(task) = queue.pop_front() {
                                self.dispatch(task, &tx, &kill_all, &mut running);
                                live += 1;
                            }
                        }
                        Err(fatal) => {
                            warn!(area = %area, error = %fatal, "Fatal worker failure, terminating batch");
                            kill_all.cancel();
                            batch.record_fatal(fatal);
                            // Cancellation is best-effort; the batch error is
                            // raised without waiting for the kills to land.
                            break;
                        }
                    }
                }
            }
        }

        if let Some(fatal) = batch.take_fatal() {
            let diagnostic = fatal.diagnostic();
            self.emit(OperationEvent::failure(
                &fatal.to_string(),
                serde_json::json!({
                    "area": fatal.area().as_str(),
                    "exitCode": fatal.exit_code(),
                    "stack": diagnostic.and_then(|d| d.stack.clone()),
                    "details": diagnostic.and_then(|d| d.details.clone()),
                }),
            ))
            .await;
            return Err(fatal);
        }

        info!("Routing complete");
        self.emit(OperationEvent::routing_complete()).await;
        batch.into_ordered_results(&order)
    }

    fn dispatch(
        &self,
        task: AnalysisTask,
        tx: &mpsc::Sender<Supervision>,
        kill_all: &CancellationToken,
        running: &mut HashMap<AreaId, TaskState>,
    ) {
        debug!(area = %task.area.name, "Dispatching worker");
        running.insert(task.area.id.clone(), TaskState::new(task.area.name.clone()));
        worker::spawn_worker(&self.command, &task, tx.clone(), kill_all.clone(), self.timeout);
    }

    async fn handle_message(
        &self,
        area: &AreaId,
        msg: WorkerMessage,
        batch: &mut BatchState,
        running: &mut HashMap<AreaId, TaskState>,
    ) {
        let Some(task) = running.get_mut(area) else {
            warn!(area = %area, "Message from unknown worker ignored");
            return;
        };
        match msg {
            WorkerMessage::Status { data } => {
                info!(area = %task.area_name, status = %data, "Worker status");
            }
            WorkerMessage::Debug { data } => {
                debug!(area = %task.area_name, payload = %data, "Worker debug");
            }
            WorkerMessage::SquareCount { data } => {
                task.squares_remaining = Some(data);
                info!(area = %task.area_name, squares = data, "Total squares");
            }
            WorkerMessage::Square { data } => {
                let remaining = task
                    .squares_remaining
                    .map(|n| n.saturating_sub(1));
                task.squares_remaining = remaining;
                debug!(
                    area = %task.area_name,
                    square = %data,
                    remaining = remaining.unwrap_or_default(),
                    "Square processed"
                );
            }
            ref msg @ WorkerMessage::Error { .. } => {
                let diagnostic = worker::diagnostic_from_message(msg)
                    .unwrap_or_else(WorkerDiagnostic::unknown);
                warn!(area = %task.area_name, error = %diagnostic.message, "Worker reported an error");
                task.diagnostic = Some(diagnostic);
            }
            WorkerMessage::Done { data } => {
                if task.staged.is_some() {
                    // A second done must not decrement the pending count
                    // again or replace the staged records.
                    warn!(area = %task.area_name, "Duplicate done message ignored");
                    return;
                }
                let remaining = batch.mark_done();
                info!(
                    area = %task.area_name,
                    origins = data.len(),
                    remaining,
                    "Routing complete for area"
                );
                task.staged = Some(data);
                // Progress emission must never wedge the batch: log and move
                // on so the worker is still released on the failure path.
                self.emit(OperationEvent::routing_area_complete(
                    &task.area_name,
                    remaining,
                ))
                .await;
            }
        }
    }

    /// Decide a task's outcome from its exit. Only here does a task resolve
    /// or fail; `done`/`error` messages alone never decide anything.
    fn settle(
        &self,
        area: &AreaId,
        kind: ExitKind,
        task: TaskState,
        batch: &mut BatchState,
    ) -> Result<(), PoolError> {
        match kind {
            ExitKind::Code(0) => match task.staged {
                Some(records) => {
                    if let Some(diagnostic) = task.diagnostic {
                        // Exit code is authoritative: an error report
                        // followed by a clean exit counts as success.
                        warn!(
                            area = %task.area_name,
                            error = %diagnostic.message,
                            "Worker reported an error but exited cleanly; treating as success"
                        );
                    }
                    batch.accept(TaskResult::new(area.clone(), task.area_name, records));
                    Ok(())
                }
                None => Err(PoolError::MissingDone { area: area.clone() }),
            },
            ExitKind::Code(code) => Err(PoolError::WorkerFailed {
                area: area.clone(),
                code,
                diagnostic: task.diagnostic.unwrap_or_else(WorkerDiagnostic::unknown),
            }),
            ExitKind::Signalled => Err(PoolError::WorkerKilled { area: area.clone() }),
            ExitKind::TimedOut { timeout_secs } => Err(PoolError::TimedOut {
                area: area.clone(),
                timeout_secs,
            }),
            ExitKind::Failed(source) => Err(PoolError::Spawn {
                area: area.clone(),
                source,
            }),
        }
    }

    async fn emit(&self, event: OperationEvent) {
        if let Err(e) = self.log.append(event).await {
            warn!(error = %e, "Operation log emission failed");
        }
    }
}
