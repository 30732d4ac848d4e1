//! Bounded-concurrency worker pool for per-area routing tasks.
//!
//! The pool dispatches one isolated worker process per administrative area,
//! speaks the typed stdio protocol from `reachmap-proto` with each worker,
//! tracks per-task and overall progress, and enforces an all-or-nothing
//! failure policy: any worker exiting non-zero kills every other live worker
//! and fails the whole batch.

pub mod error;
pub mod pool;
mod state;
mod worker;

pub use error::{PoolError, WorkerDiagnostic};
pub use pool::WorkerPool;
pub use worker::WorkerCommand;
