//! Geographic (GeoJSON) output encoding.

use crate::UnifiedResults;
use geojson::{Feature, FeatureCollection, Geometry, JsonObject, Value as GeoValue};
use serde_json::Value;

/// Encode the unified results as a GeoJSON feature collection.
///
/// One point feature per (area, origin) pair, merging the flat result list
/// across all areas. Feature properties carry the origin identity, the
/// population indicator, and one `eta-<category>` property per POI category
/// (null for unreachable or uncovered categories); the geometry is the
/// origin's point.
pub fn to_geojson(unified: &UnifiedResults) -> FeatureCollection {
    let features = unified
        .flat()
        .map(|(_, record)| {
            let mut properties = JsonObject::new();
            properties.insert("id".to_string(), Value::from(record.id.as_str()));
            properties.insert("name".to_string(), Value::from(record.name.clone()));
            properties.insert(
                "pop".to_string(),
                record.population.map(Value::from).unwrap_or(Value::Null),
            );
            for category in &unified.categories {
                let eta = record.poi.get(category).copied().flatten();
                properties.insert(
                    format!("eta-{category}"),
                    eta.map(Value::from).unwrap_or(Value::Null),
                );
            }

            Feature {
                bbox: None,
                geometry: Some(Geometry::new(GeoValue::Point(vec![record.lon, record.lat]))),
                id: None,
                properties: Some(properties),
                foreign_members: None,
            }
        })
        .collect();

    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}
