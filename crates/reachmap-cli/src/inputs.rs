//! GeoJSON input loading: origins, POI categories, administrative areas.

use anyhow::{bail, Context, Result};
use geo::{LineString, MultiPolygon, Point, Polygon};
use geojson::{FeatureCollection, GeoJson};
use reachmap_core::{AdminArea, Origin, PoiSet};
use std::collections::BTreeMap;
use std::path::Path;

fn read_collection(path: &Path) -> Result<FeatureCollection> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let geojson: GeoJson = text
        .parse()
        .with_context(|| format!("parsing {}", path.display()))?;
    match geojson {
        GeoJson::FeatureCollection(collection) => Ok(collection),
        _ => bail!("{} is not a FeatureCollection", path.display()),
    }
}

fn property_string(feature: &geojson::Feature, key: &str) -> Option<String> {
    let value = feature.properties.as_ref()?.get(key)?;
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn point_of(geometry: &geojson::Geometry) -> Result<Point<f64>> {
    match &geometry.value {
        geojson::Value::Point(coords) if coords.len() >= 2 => {
            Ok(Point::new(coords[0], coords[1]))
        }
        other => bail!("expected Point geometry, got {:?}", other.type_name()),
    }
}

fn ring_of(coords: &[Vec<f64>]) -> LineString<f64> {
    coords.iter().map(|c| (c[0], c[1])).collect()
}

fn polygon_of(rings: &[Vec<Vec<f64>>]) -> Result<Polygon<f64>> {
    let mut iter = rings.iter();
    let exterior = iter.next().context("polygon with no exterior ring")?;
    Ok(Polygon::new(ring_of(exterior), iter.map(|r| ring_of(r)).collect()))
}

fn boundary_of(geometry: &geojson::Geometry) -> Result<MultiPolygon<f64>> {
    match &geometry.value {
        geojson::Value::Polygon(rings) => Ok(MultiPolygon(vec![polygon_of(rings)?])),
        geojson::Value::MultiPolygon(polys) => Ok(MultiPolygon(
            polys
                .iter()
                .map(|rings| polygon_of(rings))
                .collect::<Result<Vec<_>>>()?,
        )),
        other => bail!(
            "expected Polygon or MultiPolygon geometry, got {:?}",
            other.type_name()
        ),
    }
}

/// Load the origin set: point features whose numeric properties become
/// indicator values (e.g. population).
pub fn load_origins(path: &Path) -> Result<Vec<Origin>> {
    let collection = read_collection(path)?;
    let mut origins = Vec::with_capacity(collection.features.len());
    for (index, feature) in collection.features.iter().enumerate() {
        let geometry = feature
            .geometry
            .as_ref()
            .with_context(|| format!("origin feature {index} has no geometry"))?;
        let point = point_of(geometry)?;
        let id = property_string(feature, "id")
            .with_context(|| format!("origin feature {index} has no id"))?;
        let name = property_string(feature, "name").unwrap_or_else(|| id.clone());

        let mut indicators = BTreeMap::new();
        if let Some(properties) = &feature.properties {
            for (key, value) in properties {
                if key == "id" || key == "name" {
                    continue;
                }
                if let Some(number) = value.as_f64() {
                    indicators.insert(key.clone(), number);
                }
            }
        }

        let mut origin = Origin::new(id, name, point.x(), point.y());
        origin.indicators = indicators;
        origins.push(origin);
    }
    Ok(origins)
}

/// Load one POI file per category into a single POI set.
pub fn load_pois(files: &[(String, std::path::PathBuf)]) -> Result<PoiSet> {
    let mut pois = PoiSet::new();
    for (category, path) in files {
        let collection = read_collection(path)?;
        let points = collection
            .features
            .iter()
            .filter_map(|f| f.geometry.as_ref())
            .map(point_of)
            .collect::<Result<Vec<_>>>()
            .with_context(|| format!("POI category {category}"))?;
        pois.insert(category.clone(), points);
    }
    Ok(pois)
}

/// Load the administrative areas: polygon or multi-polygon features with an
/// id and a name.
pub fn load_areas(path: &Path) -> Result<Vec<AdminArea>> {
    let collection = read_collection(path)?;
    let mut areas = Vec::with_capacity(collection.features.len());
    for (index, feature) in collection.features.iter().enumerate() {
        let geometry = feature
            .geometry
            .as_ref()
            .with_context(|| format!("area feature {index} has no geometry"))?;
        let boundary = boundary_of(geometry)
            .with_context(|| format!("area feature {index}"))?;
        let id = property_string(feature, "id")
            .with_context(|| format!("area feature {index} has no id"))?;
        let name = property_string(feature, "name").unwrap_or_else(|| id.clone());

        let mut area = AdminArea::new(id, name, boundary);
        if let Some(project) = property_string(feature, "project_id") {
            area = area.with_project(project);
        }
        areas.push(area);
    }
    Ok(areas)
}
