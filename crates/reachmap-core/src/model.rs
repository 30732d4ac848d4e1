//! Domain model: origins, points of interest, administrative areas, tasks.

use crate::ids::{AreaId, OriginId};
use geo::{MultiPolygon, Point};
use std::collections::BTreeMap;
use std::sync::Arc;

/// A point from which travel time is measured.
///
/// Origins carry auxiliary indicator values (e.g. population) keyed by
/// indicator name. They are immutable once loaded and shared read-only
/// across all tasks.
#[derive(Debug, Clone, PartialEq)]
pub struct Origin {
    /// Unique origin identifier.
    pub id: OriginId,

    /// Human-readable name.
    pub name: String,

    /// Geographic location (lon/lat).
    pub point: Point<f64>,

    /// Named indicator values, e.g. `population`.
    pub indicators: BTreeMap<String, f64>,
}

impl Origin {
    /// Create a new origin with no indicators.
    pub fn new(id: impl Into<OriginId>, name: impl Into<String>, lon: f64, lat: f64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            point: Point::new(lon, lat),
            indicators: BTreeMap::new(),
        }
    }

    /// Builder method to attach an indicator value.
    pub fn with_indicator(mut self, key: impl Into<String>, value: f64) -> Self {
        self.indicators.insert(key.into(), value);
        self
    }

    /// The origin's population indicator, if present.
    pub fn population(&self) -> Option<f64> {
        self.indicators.get("population").copied()
    }
}

/// The full set of points of interest, keyed by category name
/// (e.g. "hospital", "school"). Immutable, shared read-only across tasks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PoiSet(BTreeMap<String, Vec<Point<f64>>>);

impl PoiSet {
    /// Create an empty POI set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert (or replace) the points for a category.
    pub fn insert(&mut self, category: impl Into<String>, points: Vec<Point<f64>>) {
        self.0.insert(category.into(), points);
    }

    /// Category names in sorted order.
    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Points for a single category.
    pub fn points(&self, category: &str) -> Option<&[Point<f64>]> {
        self.0.get(category).map(Vec::as_slice)
    }

    /// Iterate over (category, points) pairs in sorted category order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Point<f64>])> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Number of categories.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when no categories are loaded.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A named polygonal region used as the unit of work partitioning.
#[derive(Debug, Clone, PartialEq)]
pub struct AdminArea {
    /// Unique area identifier.
    pub id: AreaId,

    /// Human-readable name.
    pub name: String,

    /// Polygon or multi-polygon boundary.
    pub boundary: MultiPolygon<f64>,

    /// Parent project reference, if any.
    pub project: Option<String>,
}

impl AdminArea {
    /// Create a new administrative area.
    pub fn new(
        id: impl Into<AreaId>,
        name: impl Into<String>,
        boundary: MultiPolygon<f64>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            boundary,
            project: None,
        }
    }

    /// Builder method to set the parent project reference.
    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self
    }
}

/// Routing limits applied to every worker in a batch.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RoutingLimits {
    /// Maximum travel time in seconds.
    pub max_time_secs: u32,

    /// Maximum travel speed in km/h.
    pub max_speed_kmh: f64,

    /// Routing grid resolution (work units per area side).
    pub grid_size: u32,
}

impl Default for RoutingLimits {
    fn default() -> Self {
        Self {
            max_time_secs: 1800,
            max_speed_kmh: 120.0,
            grid_size: 30,
        }
    }
}

/// One administrative area's complete routing computation.
///
/// Created once by the scheduler, consumed entirely by exactly one worker
/// process, never mutated after creation. The origin and POI sets are shared
/// read-only between tasks; each worker receives its own copy on the wire.
#[derive(Debug, Clone)]
pub struct AnalysisTask {
    /// The administrative area this task covers.
    pub area: AdminArea,

    /// The full origin set.
    pub origins: Arc<Vec<Origin>>,

    /// The full POI set.
    pub pois: Arc<PoiSet>,

    /// Routing limits for the batch.
    pub limits: RoutingLimits,
}

impl AnalysisTask {
    /// Create a new task for one administrative area.
    pub fn new(
        area: AdminArea,
        origins: Arc<Vec<Origin>>,
        pois: Arc<PoiSet>,
        limits: RoutingLimits,
    ) -> Self {
        Self {
            area,
            origins,
            pois,
            limits,
        }
    }
}
