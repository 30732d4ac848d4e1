//! Merging per-area task results into one addressable dataset.

use reachmap_core::{OriginRecord, TaskResult};
use std::collections::BTreeSet;

/// The unified results of a completed batch.
///
/// Areas keep their dispatch order and each area keeps its per-origin record
/// order, so every output encoding iterates deterministically. The POI
/// category set is the union observed across all records: category coverage
/// may differ between areas and an empty first area must not blank out the
/// tabular schema.
#[derive(Debug, Clone, PartialEq)]
pub struct UnifiedResults {
    /// Per-area summaries in dispatch order, empty areas included.
    pub areas: Vec<TaskResult>,

    /// Sorted union of POI category names across all records.
    pub categories: Vec<String>,
}

impl UnifiedResults {
    /// Flat sequence of (area, record) pairs: dispatch order of areas,
    /// per-area record order within.
    pub fn flat(&self) -> impl Iterator<Item = (&TaskResult, &OriginRecord)> {
        self.areas
            .iter()
            .flat_map(|area| area.records.iter().map(move |record| (area, record)))
    }

    /// Total number of (area, origin) rows.
    pub fn row_count(&self) -> usize {
        self.areas.iter().map(|a| a.records.len()).sum()
    }

    /// True when no area produced any record.
    pub fn is_empty(&self) -> bool {
        self.row_count() == 0
    }
}

/// Build the unified view from completed task results.
pub fn aggregate(results: Vec<TaskResult>) -> UnifiedResults {
    let categories: BTreeSet<String> = results
        .iter()
        .flat_map(|r| &r.records)
        .flat_map(|record| record.poi.keys().cloned())
        .collect();

    UnifiedResults {
        areas: results,
        categories: categories.into_iter().collect(),
    }
}
