//! OSM infrastructure score reader.
//!
//! The infrastructure export is a JSON object with a `tracts` array, one
//! entry per tract. Every column of [`InfrastructureRecord`] is required;
//! a missing column fails deserialization with the column name.

use std::io::Read;

use equity_audit_tract_models::InfrastructureRecord;
use serde::Deserialize;

use crate::IngestError;

#[derive(Deserialize)]
struct InfrastructureExport {
    tracts: Vec<InfrastructureRecord>,
}

/// Reads infrastructure records from an OSM infrastructure export.
///
/// # Errors
///
/// Returns [`IngestError::Json`] if the document is malformed or any row
/// is missing a column, and [`IngestError::InvalidFeature`] if a density is
/// negative or a value is not finite.
pub fn read_infrastructure_json<R: Read>(reader: R) -> Result<Vec<InfrastructureRecord>, IngestError> {
    let export: InfrastructureExport = serde_json::from_reader(reader)?;

    for (index, record) in export.tracts.iter().enumerate() {
        let values = [
            record.osm_infrastructure_score,
            record.crossings_density,
            record.bike_infra_density,
            record.signals_density,
            record.speed_calming_density,
        ];
        if values.iter().any(|v| !v.is_finite()) {
            return Err(IngestError::InvalidFeature {
                index,
                message: format!("tract {} has a non-finite value", record.tract_id),
            });
        }
        if values[1..].iter().any(|v| *v < 0.0) {
            return Err(IngestError::InvalidFeature {
                index,
                message: format!("tract {} has a negative density", record.tract_id),
            });
        }
    }

    log::info!(
        "Parsed {} infrastructure records from JSON",
        export.tracts.len()
    );

    Ok(export.tracts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_tracts_array() {
        let doc = r#"{
            "tracts": [
                {
                    "tract_id": "005",
                    "osm_infrastructure_score": 0.82,
                    "crossings_density": 5.0,
                    "bike_infra_density": 3.0,
                    "signals_density": 3.5,
                    "speed_calming_density": 1.5
                }
            ]
        }"#;
        let records = read_infrastructure_json(doc.as_bytes()).unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].tract_id, "005");
        assert!((records[0].speed_calming_density - 1.5).abs() < f64::EPSILON);
    }

    #[test]
    fn fails_on_missing_density_column() {
        let doc = r#"{
            "tracts": [
                {
                    "tract_id": "005",
                    "osm_infrastructure_score": 0.82,
                    "crossings_density": 5.0,
                    "bike_infra_density": 3.0,
                    "signals_density": 3.5
                }
            ]
        }"#;
        let err = read_infrastructure_json(doc.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("speed_calming_density"), "{err}");
    }

    #[test]
    fn fails_on_negative_density() {
        let doc = r#"{
            "tracts": [
                {
                    "tract_id": "005",
                    "osm_infrastructure_score": 0.82,
                    "crossings_density": -1.0,
                    "bike_infra_density": 3.0,
                    "signals_density": 3.5,
                    "speed_calming_density": 1.5
                }
            ]
        }"#;
        let err = read_infrastructure_json(doc.as_bytes()).unwrap_err();
        assert!(matches!(err, IngestError::InvalidFeature { index: 0, .. }));
    }
}
