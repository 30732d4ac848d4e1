//! IPC wire protocol between the orchestrator and worker processes.
//!
//! This crate contains:
//! - The task payload delivered once on a worker's stdin at dispatch
//! - The tagged worker-to-orchestrator message union
//! - Converters between domain types and wire types
//! - The newline-delimited JSON codec used over child-process stdio

pub mod codec;
pub mod convert;

use reachmap_core::{AreaId, OriginId, OriginRecord, RoutingLimits};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// The administrative area as carried on the wire.
///
/// The boundary travels as a GeoJSON geometry so workers need not share the
/// orchestrator's in-memory representation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireArea {
    /// Area identifier.
    pub id: AreaId,

    /// Area name.
    pub name: String,

    /// Parent project reference, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,

    /// Polygon or MultiPolygon boundary.
    pub boundary: geojson::Geometry,
}

/// One origin as carried on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireOrigin {
    /// Origin identifier.
    pub id: OriginId,

    /// Origin name.
    pub name: String,

    /// Longitude.
    pub lon: f64,

    /// Latitude.
    pub lat: f64,

    /// Named indicator values (e.g. population).
    #[serde(default)]
    pub indicators: BTreeMap<String, f64>,
}

/// The complete task payload: one administrative area's boundary, the full
/// origin set, the full POI set, and the batch routing limits.
///
/// Sent exactly once, orchestrator to worker, as a single JSON line on the
/// worker's stdin at process start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskPayload {
    /// The area this task covers.
    pub area: WireArea,

    /// The full origin set.
    pub origins: Vec<WireOrigin>,

    /// POI coordinates (lon, lat) per category.
    pub pois: BTreeMap<String, Vec<[f64; 2]>>,

    /// Routing limits for the batch.
    pub limits: RoutingLimits,
}

/// Messages a worker sends to the orchestrator over its stdout.
///
/// Delivery order from a single worker is preserved; there is no ordering
/// guarantee between messages from different workers. None of these messages
/// is terminal on its own: the worker's exit code is the authoritative
/// terminal signal, observed independently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum WorkerMessage {
    /// Human-readable progress string; logged only.
    Status { data: String },

    /// Diagnostic payload; logged only.
    Debug { data: Value },

    /// The task subdivided its area into `data` work units; initializes the
    /// per-task remaining-work counter.
    SquareCount { data: u64 },

    /// One work unit finished; decrements the remaining-work counter.
    Square { data: String },

    /// A pending error diagnostic. Does not terminate anything by itself;
    /// it is only promoted to a batch failure if the worker exits non-zero.
    Error {
        /// Error message.
        data: String,
        /// Stack trace, if the worker captured one.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        stack: Option<String>,
        /// Additional structured details.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        details: Option<Value>,
    },

    /// Normal completion: the ordered per-origin records, possibly empty.
    Done { data: Vec<OriginRecord> },
}

#[cfg(test)]
mod tests {
    use super::*;
    use reachmap_core::OriginRecord;

    #[test]
    fn test_message_kinds_round_trip() {
        let messages = vec![
            WorkerMessage::Status {
                data: "routing grid built".into(),
            },
            WorkerMessage::Debug {
                data: serde_json::json!({ "osrm": "table", "rows": 12 }),
            },
            WorkerMessage::SquareCount { data: 16 },
            WorkerMessage::Square { data: "4/16".into() },
            WorkerMessage::Error {
                data: "table query failed".into(),
                stack: Some("at osrm.table".into()),
                details: None,
            },
            WorkerMessage::Done {
                data: vec![OriginRecord::new("o-1", "Town", 1.0, 2.0)],
            },
        ];
        for msg in messages {
            let json = serde_json::to_string(&msg).unwrap();
            let back: WorkerMessage = serde_json::from_str(&json).unwrap();
            assert_eq!(back, msg);
        }
    }

    #[test]
    fn test_tag_spelling_matches_protocol() {
        let json = serde_json::to_string(&WorkerMessage::SquareCount { data: 9 }).unwrap();
        assert!(json.contains("\"type\":\"squarecount\""));
        let json = serde_json::to_string(&WorkerMessage::Done { data: vec![] }).unwrap();
        assert!(json.contains("\"type\":\"done\""));
    }

    #[test]
    fn test_error_message_optional_fields() {
        let msg: WorkerMessage =
            serde_json::from_str(r#"{"type":"error","data":"boom"}"#).unwrap();
        assert_eq!(
            msg,
            WorkerMessage::Error {
                data: "boom".into(),
                stack: None,
                details: None,
            }
        );
    }

    #[test]
    fn test_empty_done_is_valid() {
        let msg: WorkerMessage = serde_json::from_str(r#"{"type":"done","data":[]}"#).unwrap();
        assert_eq!(msg, WorkerMessage::Done { data: vec![] });
    }
}
