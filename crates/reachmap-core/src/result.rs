//! Per-area task results.

use crate::ids::{AreaId, OriginId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One origin's computed travel times, as reported by a worker.
///
/// For each POI category the record holds either an ETA in seconds or
/// `None`, the explicit marker for an unreachable category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OriginRecord {
    /// Origin identifier.
    pub id: OriginId,

    /// Origin name.
    pub name: String,

    /// Longitude of the origin.
    pub lon: f64,

    /// Latitude of the origin.
    pub lat: f64,

    /// Population indicator carried through for weighting, if present.
    #[serde(default)]
    pub population: Option<f64>,

    /// ETA in seconds per POI category; `None` means unreachable.
    pub poi: BTreeMap<String, Option<f64>>,
}

impl OriginRecord {
    /// Create a record with no POI entries.
    pub fn new(id: impl Into<OriginId>, name: impl Into<String>, lon: f64, lat: f64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            lon,
            lat,
            population: None,
            poi: BTreeMap::new(),
        }
    }

    /// Builder method to set the population indicator.
    pub fn with_population(mut self, population: f64) -> Self {
        self.population = Some(population);
        self
    }

    /// Builder method to add one POI category ETA (`None` = unreachable).
    pub fn with_eta(mut self, category: impl Into<String>, eta_secs: Option<f64>) -> Self {
        self.poi.insert(category.into(), eta_secs);
        self
    }
}

/// The outcome of one administrative area's task.
///
/// A result with zero records is valid: the area simply contained no
/// origins. It is represented distinctly from a failed task everywhere.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    /// The area this result belongs to.
    pub area_id: AreaId,

    /// The area's name.
    pub area_name: String,

    /// Ordered per-origin records, possibly empty.
    pub records: Vec<OriginRecord>,
}

impl TaskResult {
    /// Build a result from a worker's `done` payload, rounding every ETA to
    /// the nearest second.
    pub fn new(
        area_id: impl Into<AreaId>,
        area_name: impl Into<String>,
        mut records: Vec<OriginRecord>,
    ) -> Self {
        for record in &mut records {
            for eta in record.poi.values_mut() {
                *eta = eta.map(f64::round);
            }
        }
        Self {
            area_id: area_id.into(),
            area_name: area_name.into(),
            records,
        }
    }

    /// True when the area contained no origins.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_etas_rounded_to_the_second() {
        let record = OriginRecord::new("o-1", "Town", 1.0, 2.0)
            .with_eta("hospital", Some(812.4))
            .with_eta("school", Some(99.5))
            .with_eta("bank", None);
        let result = TaskResult::new("aa-1", "District", vec![record]);

        let poi = &result.records[0].poi;
        assert_eq!(poi["hospital"], Some(812.0));
        assert_eq!(poi["school"], Some(100.0));
        assert_eq!(poi["bank"], None);
    }

    #[test]
    fn test_empty_result_is_valid() {
        let result = TaskResult::new("aa-2", "Empty", vec![]);
        assert!(result.is_empty());
    }

    #[test]
    fn test_record_round_trip() {
        let record = OriginRecord::new("o-9", "Spot", 3.25, -1.5)
            .with_population(1200.0)
            .with_eta("hospital", None);
        let json = serde_json::to_string(&record).unwrap();
        let back: OriginRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
        assert!(json.contains("\"hospital\":null"));
    }
}
