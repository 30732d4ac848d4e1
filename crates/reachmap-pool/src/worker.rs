//! Worker process lifecycle: spawn, feed, read, reap.

use crate::error::WorkerDiagnostic;
use reachmap_core::{AnalysisTask, AreaId};
use reachmap_proto::codec::{self, MessageReader};
use reachmap_proto::{TaskPayload, WorkerMessage};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// The worker executable and its fixed arguments.
///
/// The routing computation itself is a black box behind this command: the
/// pool delivers one task payload on the worker's stdin and reads protocol
/// messages off its stdout.
#[derive(Debug, Clone)]
pub struct WorkerCommand {
    program: String,
    args: Vec<String>,
}

impl WorkerCommand {
    /// Create a new command. The program can be a bare name for PATH lookup
    /// or a full path.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Append one argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

/// How a worker left the batch.
#[derive(Debug)]
pub(crate) enum ExitKind {
    /// Process exited with a code.
    Code(i32),

    /// Process was terminated by a signal (no exit code).
    Signalled,

    /// Process ran past the configured timeout and was killed.
    TimedOut { timeout_secs: u64 },

    /// Process could not be spawned or reaped.
    Failed(std::io::Error),
}

/// Everything the supervisor hears about its workers, over one channel so
/// per-worker message order is preserved and correlation is by area id only.
#[derive(Debug)]
pub(crate) enum Supervision {
    /// A protocol message from a live worker.
    Message { area: AreaId, msg: WorkerMessage },

    /// The authoritative terminal signal for one worker.
    Exited { area: AreaId, kind: ExitKind },
}

/// Spawn one worker for a task and drive it to completion on a background
/// task. All outcomes, including spawn failure, surface as `Supervision`
/// sends; the kill-all token is the only cancellation input.
pub(crate) fn spawn_worker(
    command: &WorkerCommand,
    task: &AnalysisTask,
    tx: mpsc::Sender<Supervision>,
    kill_all: CancellationToken,
    timeout: Option<Duration>,
) {
    let area = task.area.id.clone();
    let payload = TaskPayload::from(task);
    let mut cmd = command.command();

    tokio::spawn(async move {
        let kind = run_worker(&mut cmd, &area, payload, &tx, kill_all, timeout).await;
        let _ = tx.send(Supervision::Exited { area, kind }).await;
    });
}

async fn run_worker(
    cmd: &mut Command,
    area: &AreaId,
    payload: TaskPayload,
    tx: &mpsc::Sender<Supervision>,
    kill_all: CancellationToken,
    timeout: Option<Duration>,
) -> ExitKind {
    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => return ExitKind::Failed(e),
    };

    // Deliver the task payload once, then close stdin.
    if let Some(mut stdin) = child.stdin.take() {
        if let Err(e) = codec::write_payload(&mut stdin, &payload).await {
            // The exit status will tell the real story if the worker died.
            warn!(area = %area, error = %e, "Failed to deliver task payload");
        }
    }

    if let Some(stderr) = child.stderr.take() {
        let stderr_area = area.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if !line.trim().is_empty() {
                    warn!(area = %stderr_area, stderr = %line.trim(), "Worker stderr");
                }
            }
        });
    }

    let stdout = match child.stdout.take() {
        Some(stdout) => stdout,
        None => {
            let _ = child.kill().await;
            return ExitKind::Failed(std::io::Error::other("worker stdout not captured"));
        }
    };
    let mut reader = MessageReader::new(stdout);

    let deadline = async {
        match timeout {
            Some(d) => tokio::time::sleep(d).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = kill_all.cancelled() => {
                // Best-effort: no graceful shutdown, no confirmation awaited
                // by the supervisor.
                let _ = child.kill().await;
                let _ = child.wait().await;
                return ExitKind::Signalled;
            }
            _ = &mut deadline => {
                let _ = child.kill().await;
                let _ = child.wait().await;
                return ExitKind::TimedOut {
                    timeout_secs: timeout.map(|d| d.as_secs()).unwrap_or_default(),
                };
            }
            next = reader.next() => match next {
                Ok(Some(msg)) => {
                    if tx.send(Supervision::Message { area: area.clone(), msg }).await.is_err() {
                        // Supervisor is gone; the batch already terminated.
                        let _ = child.kill().await;
                        let _ = child.wait().await;
                        return ExitKind::Signalled;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    debug!(area = %area, error = %e, "Worker stdout closed with error");
                    break;
                }
            }
        }
    }

    match child.wait().await {
        Ok(status) => match status.code() {
            Some(code) => ExitKind::Code(code),
            None => ExitKind::Signalled,
        },
        Err(e) => ExitKind::Failed(e),
    }
}

/// Build a diagnostic from an `error` protocol message.
pub(crate) fn diagnostic_from_message(msg: &WorkerMessage) -> Option<WorkerDiagnostic> {
    match msg {
        WorkerMessage::Error {
            data,
            stack,
            details,
        } => Some(WorkerDiagnostic {
            message: data.clone(),
            stack: stack.clone(),
            details: details.clone(),
        }),
        _ => None,
    }
}
