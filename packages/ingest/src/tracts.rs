//! Census tract `GeoJSON` reader.
//!
//! Expects a `FeatureCollection` whose features carry a `Polygon` or
//! `MultiPolygon` geometry and the demographic properties `tract_id` (or
//! `GEOID`), `total_population`, `median_income` and `pct_minority`.
//! Census APIs frequently serialize numbers as strings, so numeric
//! properties accept either form.

use std::io::Read;

use equity_audit_tract_models::CensusTract;
use geo::MultiPolygon;
use geojson::{Feature, GeoJson};

use crate::IngestError;

const TABLE: &str = "census tracts";

/// Reads census tracts from a `GeoJSON` `FeatureCollection`.
///
/// # Errors
///
/// * [`IngestError::GeoJson`] if the document is not valid `GeoJSON`
/// * [`IngestError::MissingColumn`] if a feature lacks a required property
/// * [`IngestError::InvalidFeature`] if the document is not a
///   `FeatureCollection`, or a feature has a missing, non-polygon or
///   out-of-range value
pub fn read_census_tracts_geojson<R: Read>(mut reader: R) -> Result<Vec<CensusTract>, IngestError> {
    let mut contents = String::new();
    reader.read_to_string(&mut contents)?;

    let GeoJson::FeatureCollection(collection) = contents.parse::<GeoJson>()? else {
        return Err(IngestError::InvalidFeature {
            index: 0,
            message: "expected a FeatureCollection".to_string(),
        });
    };

    let tracts = collection
        .features
        .into_iter()
        .enumerate()
        .map(|(index, feature)| parse_tract(index, feature))
        .collect::<Result<Vec<_>, _>>()?;

    log::info!("Parsed {} census tracts from GeoJSON", tracts.len());

    Ok(tracts)
}

fn parse_tract(index: usize, feature: Feature) -> Result<CensusTract, IngestError> {
    let tract_id = string_property(&feature, &["tract_id", "GEOID"])
        .ok_or_else(|| missing("tract_id"))?;
    let total_population = number_property(&feature, "total_population")?;
    let median_income = number_property(&feature, "median_income")?;
    let pct_minority = number_property(&feature, "pct_minority")?;

    let invalid = |message: String| IngestError::InvalidFeature { index, message };

    if total_population < 0.0 || total_population.fract() != 0.0 {
        return Err(invalid(format!(
            "tract {tract_id} has invalid total_population {total_population}"
        )));
    }
    if median_income <= 0.0 {
        return Err(invalid(format!(
            "tract {tract_id} has non-positive median_income {median_income}"
        )));
    }
    if !(0.0..=100.0).contains(&pct_minority) {
        return Err(invalid(format!(
            "tract {tract_id} has pct_minority {pct_minority} outside 0-100"
        )));
    }

    let geometry = feature
        .geometry
        .ok_or_else(|| invalid(format!("tract {tract_id} has no geometry")))?;
    let geometry = match geo::Geometry::<f64>::try_from(geometry)? {
        geo::Geometry::MultiPolygon(mp) => mp,
        geo::Geometry::Polygon(p) => MultiPolygon(vec![p]),
        _ => {
            return Err(invalid(format!(
                "tract {tract_id} geometry is not a Polygon or MultiPolygon"
            )));
        }
    };

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let total_population = total_population as u64;

    Ok(CensusTract {
        tract_id,
        geometry,
        total_population,
        median_income,
        pct_minority,
    })
}

fn string_property(feature: &Feature, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match feature.property(key)? {
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn number_property(feature: &Feature, key: &str) -> Result<f64, IngestError> {
    let value = match feature.property(key) {
        Some(serde_json::Value::Number(n)) => n.as_f64(),
        Some(serde_json::Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    value.filter(|v| v.is_finite()).ok_or_else(|| missing(key))
}

fn missing(column: &str) -> IngestError {
    IngestError::MissingColumn {
        table: TABLE,
        column: column.to_string(),
    }
}
