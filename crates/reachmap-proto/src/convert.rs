//! Converters between domain types and wire types.

use crate::{TaskPayload, WireArea, WireOrigin};
use reachmap_core::AnalysisTask;
use std::collections::BTreeMap;

impl From<&AnalysisTask> for TaskPayload {
    fn from(task: &AnalysisTask) -> Self {
        let area = WireArea {
            id: task.area.id.clone(),
            name: task.area.name.clone(),
            project: task.area.project.clone(),
            boundary: geojson::Geometry::new(geojson::Value::from(&task.area.boundary)),
        };

        let origins = task
            .origins
            .iter()
            .map(|o| WireOrigin {
                id: o.id.clone(),
                name: o.name.clone(),
                lon: o.point.x(),
                lat: o.point.y(),
                indicators: o.indicators.clone(),
            })
            .collect();

        let pois: BTreeMap<String, Vec<[f64; 2]>> = task
            .pois
            .iter()
            .map(|(category, points)| {
                (
                    category.to_owned(),
                    points.iter().map(|p| [p.x(), p.y()]).collect(),
                )
            })
            .collect();

        Self {
            area,
            origins,
            pois,
            limits: task.limits,
        }
    }
}
