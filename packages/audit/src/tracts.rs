//! Validated tract and infrastructure snapshots shared by the auditors.

use std::collections::BTreeMap;

use equity_audit_spatial::TractGeometryIndex;
use equity_audit_tract_models::{CensusTract, IncomeQuintile, InfrastructureRecord};

use crate::AuditError;
use crate::quintile::income_quintiles;

/// Demographic attributes of a tract, detached from its geometry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TractProfile {
    /// Total population.
    pub total_population: u64,
    /// Median household income.
    pub median_income: f64,
    /// Percentage of minority residents.
    pub pct_minority: f64,
    /// Income quintile relative to the whole tract set.
    pub income_quintile: IncomeQuintile,
}

/// A census tract collection with unique ids, income quintiles and a
/// spatial index.
#[derive(Debug)]
pub struct TractTable {
    profiles: BTreeMap<String, TractProfile>,
    index: TractGeometryIndex,
}

impl TractTable {
    /// Validates the tract collection and builds its derived lookups.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::Validation`] if the collection is empty or a
    /// `tract_id` appears more than once.
    pub fn new(tracts: &[CensusTract]) -> Result<Self, AuditError> {
        if tracts.is_empty() {
            return Err(AuditError::validation("census tracts are required"));
        }

        let quintiles = income_quintiles(tracts);
        let mut profiles = BTreeMap::new();

        for tract in tracts {
            let profile = TractProfile {
                total_population: tract.total_population,
                median_income: tract.median_income,
                pct_minority: tract.pct_minority,
                income_quintile: quintiles[&tract.tract_id],
            };
            if profiles.insert(tract.tract_id.clone(), profile).is_some() {
                return Err(AuditError::validation(format!(
                    "duplicate census tract id '{}'",
                    tract.tract_id
                )));
            }
        }

        Ok(Self {
            profiles,
            index: TractGeometryIndex::build(tracts),
        })
    }

    /// Returns the profile of a tract.
    #[must_use]
    pub fn get(&self, tract_id: &str) -> Option<&TractProfile> {
        self.profiles.get(tract_id)
    }

    /// Returns the profile of a tract, failing if the id is unknown.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::Data`] if no tract has this id.
    pub fn require(&self, tract_id: &str) -> Result<&TractProfile, AuditError> {
        self.get(tract_id)
            .ok_or_else(|| AuditError::data(format!("unknown tract '{tract_id}'")))
    }

    /// Iterates over tract ids in ascending order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.profiles.keys().map(String::as_str)
    }

    /// Number of tracts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    /// Whether the table holds no tracts.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    /// Resolves a point to the id of the tract containing it.
    #[must_use]
    pub fn resolve(&self, lat: f64, lon: f64) -> Option<&str> {
        self.index.resolve(lat, lon)
    }
}

/// Infrastructure records keyed by tract id, validated against a
/// [`TractTable`].
#[derive(Debug, Clone)]
pub struct InfrastructureTable {
    records: BTreeMap<String, InfrastructureRecord>,
}

impl InfrastructureTable {
    /// Validates observed infrastructure data.
    ///
    /// Suppressed-demand and recommendation results must be backed by real
    /// infrastructure observations, so a missing or empty table is never
    /// replaced with synthetic values.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::Validation`] if the table is missing or empty,
    /// references a tract not in `tracts`, repeats a tract id, or carries
    /// non-finite scores or negative densities.
    pub fn require(
        tracts: &TractTable,
        infrastructure: Option<&[InfrastructureRecord]>,
    ) -> Result<Self, AuditError> {
        let infrastructure = infrastructure.filter(|rows| !rows.is_empty()).ok_or_else(|| {
            AuditError::validation(
                "infrastructure_df is required: audits must use observed OSM infrastructure data",
            )
        })?;

        let mut records = BTreeMap::new();

        for record in infrastructure {
            if tracts.get(&record.tract_id).is_none() {
                return Err(AuditError::validation(format!(
                    "infrastructure record references unknown tract '{}'",
                    record.tract_id
                )));
            }
            if !record.osm_infrastructure_score.is_finite() {
                return Err(AuditError::validation(format!(
                    "tract '{}' has a non-finite infrastructure score",
                    record.tract_id
                )));
            }
            let densities = [
                record.crossings_density,
                record.bike_infra_density,
                record.signals_density,
                record.speed_calming_density,
            ];
            if densities.iter().any(|d| !d.is_finite() || *d < 0.0) {
                return Err(AuditError::validation(format!(
                    "tract '{}' has an invalid infrastructure density",
                    record.tract_id
                )));
            }
            if records
                .insert(record.tract_id.clone(), record.clone())
                .is_some()
            {
                return Err(AuditError::validation(format!(
                    "duplicate infrastructure record for tract '{}'",
                    record.tract_id
                )));
            }
        }

        let missing = tracts.len() - records.len();
        if missing > 0 {
            log::warn!("{missing} census tracts have no infrastructure record");
        }

        Ok(Self { records })
    }

    /// Returns the record for a tract.
    #[must_use]
    pub fn get(&self, tract_id: &str) -> Option<&InfrastructureRecord> {
        self.records.get(tract_id)
    }

    /// Iterates over records in ascending tract id order.
    pub fn iter(&self) -> impl Iterator<Item = &InfrastructureRecord> {
        self.records.values()
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the table holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{sample_infrastructure, sample_tracts, tract_center};

    #[test]
    fn builds_profiles_and_index() {
        let table = TractTable::new(&sample_tracts()).unwrap();

        assert_eq!(table.len(), 5);
        assert_eq!(table.ids().collect::<Vec<_>>(), ["001", "002", "003", "004", "005"]);
        assert_eq!(table.require("004").unwrap().total_population, 4_600);

        let (lat, lon) = tract_center(3);
        assert_eq!(table.resolve(lat, lon), Some("003"));
    }

    #[test]
    fn rejects_duplicate_tract_ids() {
        let mut tracts = sample_tracts();
        tracts[1].tract_id = "001".to_string();
        let err = TractTable::new(&tracts).unwrap_err();
        assert!(matches!(err, AuditError::Validation { .. }));
    }

    #[test]
    fn rejects_empty_tract_set() {
        assert!(TractTable::new(&[]).is_err());
    }

    #[test]
    fn unknown_tract_is_data_error() {
        let table = TractTable::new(&sample_tracts()).unwrap();
        assert!(table.require("999").unwrap_err().is_data_error());
    }

    #[test]
    fn missing_infrastructure_is_validation_error() {
        let table = TractTable::new(&sample_tracts()).unwrap();

        for input in [None, Some(&[][..])] {
            let err = InfrastructureTable::require(&table, input).unwrap_err();
            assert!(matches!(err, AuditError::Validation { .. }));
            assert!(err.to_string().contains("infrastructure_df is required"));
        }
    }

    #[test]
    fn rejects_infrastructure_for_unknown_tract() {
        let table = TractTable::new(&sample_tracts()).unwrap();
        let mut rows = sample_infrastructure();
        rows[0].tract_id = "999".to_string();

        let err = InfrastructureTable::require(&table, Some(&rows)).unwrap_err();
        assert!(err.to_string().contains("999"));
    }

    #[test]
    fn rejects_negative_density() {
        let table = TractTable::new(&sample_tracts()).unwrap();
        let mut rows = sample_infrastructure();
        rows[2].signals_density = -0.1;

        assert!(InfrastructureTable::require(&table, Some(&rows)).is_err());
    }

    #[test]
    fn accepts_partial_coverage() {
        let table = TractTable::new(&sample_tracts()).unwrap();
        let rows = sample_infrastructure();

        let infra = InfrastructureTable::require(&table, Some(&rows[..3])).unwrap();
        assert_eq!(infra.len(), 3);
        assert!(infra.get("005").is_none());
    }
}
