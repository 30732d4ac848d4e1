//! Geospatial selection utilities.
//!
//! Pure functions used to carve out the work each task operates on: compute
//! the travel-time-bounded search buffer around an area, detect degenerate
//! buffers that would silently cover the whole world, and filter point sets
//! spatially.

use crate::error::CoreError;
use crate::model::{AdminArea, Origin, PoiSet, RoutingLimits};
use geo::{coord, BoundingRect, Contains, Point, Polygon, Rect};

/// Kilometers covered by one degree of latitude.
const KM_PER_DEG_LAT: f64 = 110.574;

/// Kilometers covered by one degree of longitude at the equator.
const KM_PER_DEG_LON_EQ: f64 = 111.320;

/// Compute the search buffer around an administrative area.
///
/// The buffer distance is the ground covered at `max_speed_kmh` during
/// `max_time_secs`, applied outward from the area's boundary. The buffer is
/// rendered as the boundary's bounding envelope expanded by that distance
/// (longitude degrees scaled at the envelope's centre latitude); downstream
/// consumers only ever use it as a spatial filter.
///
/// Fails with [`CoreError::WorldBufferOverflow`] when the buffered bounding
/// box exceeds the plausible planet extent in all four directions
/// (west < -180, east > 180, south < -85, north > 85, all strict). Callers
/// must treat this as a non-retryable input error for that area.
pub fn search_buffer(area: &AdminArea, limits: &RoutingLimits) -> Result<Polygon<f64>, CoreError> {
    let distance_km = (limits.max_time_secs as f64 / 3600.0) * limits.max_speed_kmh;

    let rect = area
        .boundary
        .bounding_rect()
        .ok_or_else(|| CoreError::EmptyBoundary(area.id.clone()))?;

    let centre_lat = (rect.min().y + rect.max().y) / 2.0;
    let lat_degrees = distance_km / KM_PER_DEG_LAT;
    let cos_lat = centre_lat.to_radians().cos().abs();
    let lon_degrees = if cos_lat < 1e-12 {
        f64::INFINITY
    } else {
        distance_km / (KM_PER_DEG_LON_EQ * cos_lat)
    };

    let min = coord! {
        x: rect.min().x - lon_degrees,
        y: rect.min().y - lat_degrees,
    };
    let max = coord! {
        x: rect.max().x + lon_degrees,
        y: rect.max().y + lat_degrees,
    };

    if min.x < -180.0 && max.x > 180.0 && min.y < -85.0 && max.y > 85.0 {
        return Err(CoreError::WorldBufferOverflow(area.id.clone()));
    }

    Ok(Rect::new(min, max).to_polygon())
}

/// Select the origins that fall within an area's boundary.
///
/// An empty selection is a valid, non-error result.
pub fn origins_within<'a>(origins: &'a [Origin], area: &AdminArea) -> Vec<&'a Origin> {
    origins
        .iter()
        .filter(|o| area.boundary.contains(&o.point))
        .collect()
}

/// Select the points of interest inside a search buffer.
///
/// Every category of the input set is preserved; categories with no points
/// inside the buffer come back empty rather than missing.
pub fn pois_within_buffer(pois: &PoiSet, buffer: &Polygon<f64>) -> PoiSet {
    let mut selected = PoiSet::new();
    for (category, points) in pois.iter() {
        let inside: Vec<Point<f64>> = points
            .iter()
            .filter(|p| buffer.contains(*p))
            .copied()
            .collect();
        selected.insert(category, inside);
    }
    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::AreaId;
    use geo::{polygon, MultiPolygon};

    fn area(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> AdminArea {
        let boundary = MultiPolygon(vec![polygon![
            (x: min_x, y: min_y),
            (x: max_x, y: min_y),
            (x: max_x, y: max_y),
            (x: min_x, y: max_y),
        ]]);
        AdminArea::new("aa-test", "Test Area", boundary)
    }

    fn limits(max_time_secs: u32, max_speed_kmh: f64) -> RoutingLimits {
        RoutingLimits {
            max_time_secs,
            max_speed_kmh,
            grid_size: 30,
        }
    }

    #[test]
    fn buffer_distance_follows_time_and_speed() {
        // 3600s at 120km/h = 120km, a bit over one degree of latitude.
        let buffered = search_buffer(&area(10.0, 10.0, 11.0, 11.0), &limits(3600, 120.0)).unwrap();
        let rect = buffered.bounding_rect().unwrap();
        let lat_margin = 120.0 / KM_PER_DEG_LAT;
        assert!((rect.min().y - (10.0 - lat_margin)).abs() < 1e-9);
        assert!((rect.max().y - (11.0 + lat_margin)).abs() < 1e-9);
        // Longitude margin widens away from the equator.
        assert!(rect.max().x - 11.0 > lat_margin * KM_PER_DEG_LAT / KM_PER_DEG_LON_EQ - 1e-9);
    }

    #[test]
    fn world_sized_buffer_is_rejected() {
        let err = search_buffer(&area(-179.0, -84.0, 179.0, 84.0), &limits(3600, 120.0))
            .expect_err("expected overflow");
        assert!(matches!(err, CoreError::WorldBufferOverflow(ref id) if id == &AreaId::new("aa-test")));
    }

    #[test]
    fn threshold_values_do_not_raise() {
        // A zero-length buffer over an area whose bbox sits exactly on the
        // thresholds: all four comparisons are strict, so this passes.
        let buffered = search_buffer(&area(-180.0, -85.0, 180.0, 85.0), &limits(0, 120.0)).unwrap();
        let rect = buffered.bounding_rect().unwrap();
        assert_eq!(rect.min().x, -180.0);
        assert_eq!(rect.max().y, 85.0);
    }

    #[test]
    fn partial_overflow_is_not_degenerate() {
        // Only the eastern edge crosses the antimeridian.
        let buffered = search_buffer(&area(170.0, 0.0, 179.5, 1.0), &limits(3600, 120.0)).unwrap();
        let rect = buffered.bounding_rect().unwrap();
        assert!(rect.max().x > 180.0);
        assert!(rect.min().y > -85.0);
    }

    #[test]
    fn origins_within_filters_by_containment() {
        let a = area(0.0, 0.0, 10.0, 10.0);
        let origins = vec![
            Origin::new("in-1", "Inside", 5.0, 5.0),
            Origin::new("out-1", "Outside", 15.0, 5.0),
        ];
        let inside = origins_within(&origins, &a);
        assert_eq!(inside.len(), 1);
        assert_eq!(inside[0].id.as_str(), "in-1");
    }

    #[test]
    fn origins_within_empty_is_ok() {
        let a = area(0.0, 0.0, 1.0, 1.0);
        let origins = vec![Origin::new("far", "Far away", 50.0, 50.0)];
        assert!(origins_within(&origins, &a).is_empty());
    }

    #[test]
    fn pois_within_buffer_keeps_empty_categories() {
        let buffer = search_buffer(&area(0.0, 0.0, 1.0, 1.0), &limits(1800, 120.0)).unwrap();
        let mut pois = PoiSet::new();
        pois.insert("hospital", vec![Point::new(0.5, 0.5), Point::new(40.0, 40.0)]);
        pois.insert("school", vec![Point::new(-30.0, 12.0)]);

        let selected = pois_within_buffer(&pois, &buffer);
        assert_eq!(selected.points("hospital").unwrap().len(), 1);
        assert_eq!(selected.points("school").unwrap().len(), 0);
        assert_eq!(selected.len(), 2);
    }
}
