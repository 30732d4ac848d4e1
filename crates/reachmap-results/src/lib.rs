//! Result aggregation and output encodings.
//!
//! `aggregate` merges per-area task results into a unified, addressable
//! view; the `tabular`, `structured`, and `geographic` modules are pure,
//! deterministic transformations of that view into CSV text, a nested JSON
//! document, and a GeoJSON feature collection.

pub mod aggregate;
pub mod geographic;
pub mod structured;
pub mod tabular;

pub use aggregate::{aggregate, UnifiedResults};
pub use geographic::to_geojson;
pub use structured::to_json;
pub use tabular::to_csv;

use thiserror::Error;

/// Output encoding errors.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// CSV writer error.
    #[error("csv encoding failed: {0}")]
    Csv(#[from] csv::Error),

    /// JSON encoding error.
    #[error("json encoding failed: {0}")]
    Json(#[from] serde_json::Error),

    /// The CSV buffer was not valid UTF-8.
    #[error("csv output was not utf-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}
