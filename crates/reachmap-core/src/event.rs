//! Operation log events for tracking batch progress.
//!
//! The operation log is an append-only audit/progress sink owned by an
//! external collaborator; the core only emits events to it and never reads
//! them back.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

/// Coded event categories, mirroring the analysis pipeline stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OpCode {
    /// Batch routing lifecycle (start/end).
    Routing,
    /// One administrative area finished routing.
    RoutingArea,
    /// Result artifacts are being stored.
    Results,
    /// Result artifacts written.
    ResultsFiles,
    /// Operation finished successfully.
    Success,
    /// Operation failed.
    Error,
}

/// One operation log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationEvent {
    /// Event category.
    pub code: OpCode,

    /// When the event occurred.
    pub timestamp: DateTime<Utc>,

    /// Event-specific payload.
    pub data: Value,
}

impl OperationEvent {
    /// Create a new event with the current timestamp.
    pub fn new(code: OpCode, data: Value) -> Self {
        Self {
            code,
            timestamp: Utc::now(),
            data,
        }
    }

    /// Routing started for a batch of `count` areas.
    pub fn routing_started(count: usize) -> Self {
        Self::new(
            OpCode::Routing,
            json!({ "message": "Routing started", "count": count }),
        )
    }

    /// Routing finished for the whole batch.
    pub fn routing_complete() -> Self {
        Self::new(OpCode::Routing, json!({ "message": "Routing complete" }))
    }

    /// One area finished routing; `remaining` is the post-decrement count of
    /// still-pending areas.
    pub fn routing_area_complete(area_name: &str, remaining: usize) -> Self {
        Self::new(
            OpCode::RoutingArea,
            json!({
                "message": "Routing complete",
                "adminArea": area_name,
                "remaining": remaining,
            }),
        )
    }

    /// Result artifacts are being stored.
    pub fn storing_results() -> Self {
        Self::new(OpCode::Results, json!({ "message": "Storing results" }))
    }

    /// Result artifacts finished storing.
    pub fn results_stored() -> Self {
        Self::new(
            OpCode::Results,
            json!({ "message": "Storing results complete" }),
        )
    }

    /// All result files written.
    pub fn files_written() -> Self {
        Self::new(OpCode::ResultsFiles, json!({ "message": "Files written" }))
    }

    /// Operation completed successfully.
    pub fn success() -> Self {
        Self::new(OpCode::Success, json!({ "message": "Operation complete" }))
    }

    /// Operation failed; `details` carries whatever diagnostic is available.
    pub fn failure(message: &str, details: Value) -> Self {
        Self::new(OpCode::Error, json!({ "error": message, "details": details }))
    }
}

/// Error appending to an operation log sink.
#[derive(Debug, Error)]
#[error("operation log append failed: {0}")]
pub struct OpLogError(pub String);

/// Append-only progress/audit sink.
///
/// Emission failures must never be able to wedge the batch: callers log and
/// continue on the progress path, and guard the failure-recording path so a
/// secondary failure still terminates cleanly.
#[async_trait]
pub trait OperationLog: Send + Sync {
    /// Append one event to the sink.
    async fn append(&self, event: OperationEvent) -> Result<(), OpLogError>;
}

/// An operation log that discards everything.
#[derive(Debug, Default)]
pub struct NullOperationLog;

#[async_trait]
impl OperationLog for NullOperationLog {
    async fn append(&self, _event: OperationEvent) -> Result<(), OpLogError> {
        Ok(())
    }
}

/// An in-memory operation log, used to assert on emitted events in tests.
#[derive(Debug, Default)]
pub struct MemoryOperationLog {
    events: std::sync::Mutex<Vec<OperationEvent>>,
}

impl MemoryOperationLog {
    /// Create an empty in-memory log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything appended so far.
    pub fn events(&self) -> Vec<OperationEvent> {
        self.events.lock().expect("log poisoned").clone()
    }
}

#[async_trait]
impl OperationLog for MemoryOperationLog {
    async fn append(&self, event: OperationEvent) -> Result<(), OpLogError> {
        self.events.lock().expect("log poisoned").push(event);
        Ok(())
    }
}
