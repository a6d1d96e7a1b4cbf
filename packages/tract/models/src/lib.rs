#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Census tract, infrastructure and crash record types.
//!
//! These are the read-only input snapshots shared by every auditor. Tracts
//! are keyed by `tract_id`; infrastructure rows and crash aggregates refer
//! back to a tract only through that key.

use chrono::NaiveDate;
use geo::MultiPolygon;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// A census tract with its boundary and demographic attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct CensusTract {
    /// Tract identifier (e.g. "37063000101"). Unique within a tract set.
    pub tract_id: String,
    /// Tract boundary in geographic (lon/lat) coordinates.
    pub geometry: MultiPolygon<f64>,
    /// Total population from ACS estimates.
    pub total_population: u64,
    /// Median household income in dollars.
    pub median_income: f64,
    /// Percentage of residents identifying as a minority (0-100).
    pub pct_minority: f64,
}

/// OSM-derived infrastructure metrics for one tract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InfrastructureRecord {
    /// Tract this row describes.
    pub tract_id: String,
    /// Normalized composite infrastructure score.
    pub osm_infrastructure_score: f64,
    /// Marked pedestrian crossings per unit road length.
    pub crossings_density: f64,
    /// Bike lanes and paths per unit road length.
    pub bike_infra_density: f64,
    /// Traffic signals per unit road length.
    pub signals_density: f64,
    /// Traffic calming features per unit road length.
    pub speed_calming_density: f64,
}

impl InfrastructureRecord {
    /// Returns the density value for a single category.
    #[must_use]
    pub const fn density(&self, category: InfrastructureCategory) -> f64 {
        match category {
            InfrastructureCategory::Crossings => self.crossings_density,
            InfrastructureCategory::Bike => self.bike_infra_density,
            InfrastructureCategory::Signals => self.signals_density,
            InfrastructureCategory::Calming => self.speed_calming_density,
        }
    }
}

/// A single crash event as read from a crash export.
#[derive(Debug, Clone, PartialEq)]
pub struct CrashRecord {
    /// Crash date, when the source provides a parseable one.
    pub date: Option<NaiveDate>,
    /// Calendar year of the crash.
    pub year: i32,
    /// WGS84 latitude.
    pub latitude: f64,
    /// WGS84 longitude.
    pub longitude: f64,
}

/// Infrastructure categories compared when looking for a tract's gap.
///
/// Declaration order is the tie-break precedence: when several categories
/// share the minimum density, the earliest one in [`Self::all`] wins.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum InfrastructureCategory {
    /// Pedestrian crossings
    Crossings,
    /// Bike infrastructure
    Bike,
    /// Traffic signals
    Signals,
    /// Speed calming
    Calming,
}

impl InfrastructureCategory {
    /// Returns all variants in tie-break precedence order.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Crossings, Self::Bike, Self::Signals, Self::Calming]
    }
}

/// Income quintile of a tract relative to all tracts in the dataset.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(into = "u8", try_from = "u8")]
pub enum IncomeQuintile {
    /// Bottom 20% of tracts by median income
    Q1 = 1,
    /// 20th-40th percentile
    Q2 = 2,
    /// 40th-60th percentile
    Q3 = 3,
    /// 60th-80th percentile
    Q4 = 4,
    /// Top 20% of tracts by median income
    Q5 = 5,
}

impl IncomeQuintile {
    /// Returns the numeric value of this quintile (1-5).
    #[must_use]
    pub const fn value(self) -> u8 {
        self as u8
    }

    /// Creates a quintile from a numeric value.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is not in the range 1-5.
    pub const fn from_value(value: u8) -> Result<Self, InvalidQuintileError> {
        match value {
            1 => Ok(Self::Q1),
            2 => Ok(Self::Q2),
            3 => Ok(Self::Q3),
            4 => Ok(Self::Q4),
            5 => Ok(Self::Q5),
            _ => Err(InvalidQuintileError { value }),
        }
    }

    /// Returns all quintiles from lowest to highest income.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Q1, Self::Q2, Self::Q3, Self::Q4, Self::Q5]
    }
}

impl From<IncomeQuintile> for u8 {
    fn from(quintile: IncomeQuintile) -> Self {
        quintile.value()
    }
}

impl TryFrom<u8> for IncomeQuintile {
    type Error = InvalidQuintileError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::from_value(value)
    }
}

/// Error returned when attempting to create an [`IncomeQuintile`] from an
/// invalid numeric value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidQuintileError {
    /// The invalid quintile value that was provided.
    pub value: u8,
}

impl std::fmt::Display for InvalidQuintileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid income quintile {}: expected 1-5", self.value)
    }
}

impl std::error::Error for InvalidQuintileError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quintile_round_trips_through_value() {
        for q in IncomeQuintile::all() {
            assert_eq!(IncomeQuintile::from_value(q.value()), Ok(*q));
        }
    }

    #[test]
    fn rejects_out_of_range_quintile() {
        assert_eq!(
            IncomeQuintile::from_value(0),
            Err(InvalidQuintileError { value: 0 })
        );
        assert!(IncomeQuintile::from_value(6).is_err());
    }

    #[test]
    fn category_precedence_is_crossings_bike_signals_calming() {
        assert_eq!(
            InfrastructureCategory::all(),
            &[
                InfrastructureCategory::Crossings,
                InfrastructureCategory::Bike,
                InfrastructureCategory::Signals,
                InfrastructureCategory::Calming,
            ]
        );
    }

    #[test]
    fn density_reads_matching_column() {
        let record = InfrastructureRecord {
            tract_id: "001".to_string(),
            osm_infrastructure_score: 0.4,
            crossings_density: 1.0,
            bike_infra_density: 2.0,
            signals_density: 3.0,
            speed_calming_density: 4.0,
        };
        assert!((record.density(InfrastructureCategory::Signals) - 3.0).abs() < f64::EPSILON);
        assert!((record.density(InfrastructureCategory::Calming) - 4.0).abs() < f64::EPSILON);
    }
}
