//! Core domain errors.

use crate::ids::AreaId;
use thiserror::Error;

/// Core domain errors for Reachmap.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The search buffer for an area grew past the plausible planet extent
    /// in all four directions. Non-retryable input error for that area.
    #[error("search buffer for area {0} exceeds world bounds")]
    WorldBufferOverflow(AreaId),

    /// An area has no usable boundary geometry.
    #[error("area {0} has an empty boundary")]
    EmptyBoundary(AreaId),

    /// Malformed input geometry.
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}
