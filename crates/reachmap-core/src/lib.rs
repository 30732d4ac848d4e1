//! Reachmap Core Domain Types
//!
//! This crate contains pure domain types with no dependencies on:
//! - Process spawning / IPC
//! - Storage
//! - Runtime specifics
//!
//! All types here represent the core business domain of Reachmap: origins,
//! points of interest, administrative areas, routing limits, per-area task
//! results, and the geospatial selection utilities that carve out the work
//! each task operates on.

pub mod error;
pub mod event;
pub mod ids;
pub mod model;
pub mod result;
pub mod spatial;

// Re-export commonly used types
pub use error::CoreError;
pub use event::{
    MemoryOperationLog, NullOperationLog, OpCode, OpLogError, OperationEvent, OperationLog,
};
pub use ids::{AreaId, OperationId, OriginId};
pub use model::{AdminArea, AnalysisTask, Origin, PoiSet, RoutingLimits};
pub use result::{OriginRecord, TaskResult};
