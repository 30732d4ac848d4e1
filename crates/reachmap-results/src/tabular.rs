//! Tabular (CSV) output encoding.

use crate::{EncodeError, UnifiedResults};

/// Sentinel emitted instead of an empty table when a batch produced no rows.
pub const NO_RESULTS_SENTINEL: &str = "The analysis didn't produce any results";

/// Encode the unified results as CSV text.
///
/// One row per (area, origin) pair: fixed identity columns followed by one
/// `eta-<category>` column per POI category in sorted order. ETAs are
/// already rounded to the second when results are accepted; unreachable
/// categories encode as an empty field. A batch with zero rows produces a
/// single explanatory sentinel line instead of an empty table.
pub fn to_csv(unified: &UnifiedResults) -> Result<String, EncodeError> {
    if unified.is_empty() {
        return Ok(format!("{NO_RESULTS_SENTINEL}\n"));
    }

    let mut writer = csv::Writer::from_writer(Vec::new());

    let mut header = vec![
        "admin_area".to_string(),
        "id".to_string(),
        "name".to_string(),
        "lon".to_string(),
        "lat".to_string(),
        "population".to_string(),
    ];
    header.extend(unified.categories.iter().map(|c| format!("eta-{c}")));
    writer.write_record(&header)?;

    for (area, record) in unified.flat() {
        let mut row = vec![
            area.area_name.clone(),
            record.id.to_string(),
            record.name.clone(),
            record.lon.to_string(),
            record.lat.to_string(),
            record
                .population
                .map(|p| p.to_string())
                .unwrap_or_default(),
        ];
        for category in &unified.categories {
            row.push(match record.poi.get(category) {
                Some(Some(eta)) => format!("{}", eta.round() as i64),
                _ => String::new(),
            });
        }
        writer.write_record(&row)?;
    }

    writer.flush().map_err(csv::Error::from)?;
    let bytes = writer
        .into_inner()
        .map_err(|e| EncodeError::Csv(csv::Error::from(e.into_error())))?;
    Ok(String::from_utf8(bytes)?)
}
