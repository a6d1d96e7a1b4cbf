#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Output types produced by the equity auditors.
//!
//! Every table is keyed by `tract_id` and is a plain snapshot: nothing here
//! refers back into the input tables other than by that key.

use equity_audit_tract_models::{IncomeQuintile, InfrastructureCategory};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Infrastructure project types that can be recommended for a tract.
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
pub enum ProjectType {
    /// Marked or raised pedestrian crosswalk
    Crosswalk,
    /// Protected or painted bike lane
    BikeLane,
    /// New or upgraded traffic signal
    TrafficSignal,
    /// Speed humps, chicanes and other calming treatments
    SpeedReduction,
}

impl ProjectType {
    /// Returns the project type that closes a gap in the given category.
    #[must_use]
    pub const fn for_gap(category: InfrastructureCategory) -> Self {
        match category {
            InfrastructureCategory::Crossings => Self::Crosswalk,
            InfrastructureCategory::Bike => Self::BikeLane,
            InfrastructureCategory::Signals => Self::TrafficSignal,
            InfrastructureCategory::Calming => Self::SpeedReduction,
        }
    }

    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Crosswalk,
            Self::BikeLane,
            Self::TrafficSignal,
            Self::SpeedReduction,
        ]
    }
}

/// Cost and expected safety impact of a project type.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProjectSpec {
    /// Cost in dollars.
    pub cost: u64,
    /// Expected fractional crash reduction (0-1).
    pub safety_impact: f64,
}

/// Crash count for one tract, either for a single year or across years.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrashAggregate {
    /// Tract the crashes were attributed to.
    pub tract_id: String,
    /// Calendar year, or `None` when aggregated across all analysis years.
    pub year: Option<i32>,
    /// Number of crashes.
    pub crash_count: u64,
    /// Income quintile of the tract.
    pub income_quintile: IncomeQuintile,
}

/// Predicted versus observed crashes for one tract in the held-out year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    /// Tract identifier.
    pub tract_id: String,
    /// Income quintile of the tract.
    pub income_quintile: IncomeQuintile,
    /// Model prediction, clamped to be non-negative.
    pub ai_predicted_crashes: f64,
    /// Observed crashes in the test year.
    pub actual_crashes: u64,
    /// `ai_predicted_crashes - actual_crashes`.
    pub prediction_error: f64,
    /// Absolute value of `prediction_error`.
    pub prediction_error_abs: f64,
    /// `prediction_error / actual_crashes * 100`, or 0 when nothing was
    /// observed.
    pub prediction_error_pct: f64,
}

/// Prediction error summarized over one income quintile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuintileBias {
    /// Income quintile.
    pub income_quintile: IncomeQuintile,
    /// Number of tracts in this quintile.
    pub tract_count: usize,
    /// Mean predicted crashes per tract.
    pub mean_predicted: f64,
    /// Mean observed crashes per tract.
    pub mean_actual: f64,
    /// Mean signed error. Negative means the model undercounts.
    pub mean_error: f64,
    /// Mean signed percentage error.
    pub mean_error_pct: f64,
}

/// Suppressed-demand estimate for one tract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuppressedDemandResult {
    /// Tract identifier.
    pub tract_id: String,
    /// Income quintile of the tract.
    pub income_quintile: IncomeQuintile,
    /// Observed OSM infrastructure score, copied verbatim from the input.
    pub infrastructure_score: f64,
    /// Infrastructure score min-max normalized across all tracts.
    pub normalized_infrastructure_score: f64,
    /// Share of potential active trips that are realized.
    pub demand_score: f64,
    /// Expected daily active trips given the tract population.
    pub potential_daily_trips: f64,
    /// Potential trips not realized because of inadequate infrastructure.
    pub suppressed_daily_trips: f64,
}

/// Suppressed demand summarized over one income quintile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuintileDemand {
    /// Income quintile.
    pub income_quintile: IncomeQuintile,
    /// Number of tracts in this quintile.
    pub tract_count: usize,
    /// Mean demand score.
    pub mean_demand_score: f64,
    /// Total suppressed daily trips.
    pub total_suppressed_daily_trips: f64,
}

/// A funded infrastructure project for one tract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InfrastructureRecommendation {
    /// Tract identifier.
    pub tract_id: String,
    /// Funding order among funded projects (1-based). Unfunded tracts are
    /// not ranked.
    pub priority_rank: usize,
    /// Income quintile of the tract.
    pub income_quintile: IncomeQuintile,
    /// Category with the least existing infrastructure.
    pub gap_category: InfrastructureCategory,
    /// Recommended project.
    pub project_type: ProjectType,
    /// Project cost in dollars.
    pub cost: u64,
    /// Expected fractional crash reduction.
    pub safety_impact: f64,
    /// Budget spent after admitting this project.
    pub cumulative_spend: u64,
}

/// Budget spent in one income quintile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuintileSpend {
    /// Income quintile.
    pub income_quintile: IncomeQuintile,
    /// Number of funded projects.
    pub project_count: usize,
    /// Total dollars allocated.
    pub total_spend: u64,
}
