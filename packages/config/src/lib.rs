#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Analysis configuration for the equity auditors.
//!
//! The default configuration is embedded at compile time from
//! `config/default.toml`. Alternate configurations are parsed from TOML and
//! go through the same [`AuditConfig::validate`] checks, so every auditor
//! receives an explicit, already-validated structure.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use equity_audit_models::{ProjectSpec, ProjectType};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Embedded default configuration.
const DEFAULT_TOML: &str = include_str!("../config/default.toml");

/// Errors that can occur while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// TOML parsing failed.
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// Reading the configuration file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A configuration value is out of range or inconsistent.
    #[error("Invalid configuration: {message}")]
    Invalid {
        /// Description of what went wrong.
        message: String,
    },
}

impl ConfigError {
    fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }
}

/// Top-level configuration consumed by every auditor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Years included in crash analysis. The maximum is the test year.
    pub analysis_years: Vec<i32>,
    /// Crash prediction model settings.
    pub crash_prediction: CrashPredictionConfig,
    /// Suppressed-demand constants.
    pub suppressed_demand: SuppressedDemandConfig,
    /// Project costs and the default budget.
    pub infrastructure: InfrastructureConfig,
}

/// Crash prediction model settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrashPredictionConfig {
    /// L2 penalty applied to the standardized feature weights.
    pub ridge_penalty: f64,
    /// Whether the OSM infrastructure score is used as a feature when
    /// infrastructure data is supplied.
    pub use_infrastructure_score: bool,
}

/// Suppressed-demand constants, each constrained to [0, 1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuppressedDemandConfig {
    /// Demand realized with the worst observed infrastructure.
    pub base_rate: f64,
    /// Additional demand realized per unit of normalized infrastructure
    /// quality.
    pub infrastructure_quality_correlation: f64,
    /// Share of residents making an active trip daily when unconstrained.
    pub active_trip_rate: f64,
}

/// Infrastructure project table and budget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InfrastructureConfig {
    /// Budget used when the caller does not supply one.
    pub default_budget: u64,
    /// Cost and safety impact per project type.
    pub project_types: BTreeMap<ProjectType, ProjectSpec>,
}

impl InfrastructureConfig {
    /// Returns the cost/impact entry for a project type.
    ///
    /// # Errors
    ///
    /// Returns an error if the project type has no configured entry.
    pub fn project(&self, project_type: ProjectType) -> Result<ProjectSpec, ConfigError> {
        self.project_types.get(&project_type).copied().ok_or_else(|| {
            ConfigError::invalid(format!("missing project type '{project_type}'"))
        })
    }
}

impl AuditConfig {
    /// Returns the embedded default configuration.
    ///
    /// # Panics
    ///
    /// Panics if the embedded TOML fails to parse or validate. Since it is
    /// a compile-time constant, a failure indicates a development error and
    /// is caught by the tests below.
    #[must_use]
    pub fn embedded() -> Self {
        Self::from_toml_str(DEFAULT_TOML)
            .unwrap_or_else(|e| panic!("Failed to load embedded default config: {e}"))
    }

    /// Parses and validates a configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is malformed or fails validation.
    pub fn from_toml_str(toml_str: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::de::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is malformed, or fails
    /// validation.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        log::info!("Loading audit configuration from {}", path.display());
        Self::from_toml_str(&contents)
    }

    /// Checks every range and consistency constraint.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first violated
    /// constraint.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let distinct = self.analysis_years.iter().collect::<BTreeSet<_>>();
        if distinct.len() < 2 {
            return Err(ConfigError::invalid(format!(
                "at least 2 distinct analysis years are required for a train/test split, got {}",
                distinct.len()
            )));
        }

        if !self.crash_prediction.ridge_penalty.is_finite()
            || self.crash_prediction.ridge_penalty < 0.0
        {
            return Err(ConfigError::invalid(
                "crash_prediction.ridge_penalty must be a finite value >= 0",
            ));
        }

        let demand = &self.suppressed_demand;
        for (name, value) in [
            ("base_rate", demand.base_rate),
            (
                "infrastructure_quality_correlation",
                demand.infrastructure_quality_correlation,
            ),
            ("active_trip_rate", demand.active_trip_rate),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::invalid(format!(
                    "suppressed_demand.{name} must be in [0, 1], got {value}"
                )));
            }
        }

        if self.infrastructure.default_budget == 0 {
            return Err(ConfigError::invalid(
                "infrastructure.default_budget must be positive",
            ));
        }

        for project_type in ProjectType::all() {
            let spec = self.infrastructure.project(*project_type)?;
            if spec.cost == 0 {
                return Err(ConfigError::invalid(format!(
                    "project type '{project_type}' must have a positive cost"
                )));
            }
            if !(0.0..=1.0).contains(&spec.safety_impact) {
                return Err(ConfigError::invalid(format!(
                    "project type '{project_type}' safety_impact must be in [0, 1], got {}",
                    spec.safety_impact
                )));
            }
        }

        Ok(())
    }

    /// Returns the held-out test year (the maximum analysis year).
    ///
    /// # Errors
    ///
    /// Returns an error if no analysis years are configured.
    pub fn test_year(&self) -> Result<i32, ConfigError> {
        self.analysis_years
            .iter()
            .copied()
            .max()
            .ok_or_else(|| ConfigError::invalid("no analysis years configured"))
    }

    /// Returns the training years: every distinct analysis year except the
    /// test year, in ascending order.
    ///
    /// # Errors
    ///
    /// Returns an error if fewer than 2 distinct years are configured.
    pub fn training_years(&self) -> Result<Vec<i32>, ConfigError> {
        let test_year = self.test_year()?;
        let years = self
            .analysis_years
            .iter()
            .copied()
            .filter(|year| *year != test_year)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect::<Vec<_>>();

        if years.is_empty() {
            return Err(ConfigError::invalid(
                "at least 2 distinct analysis years are required for a train/test split",
            ));
        }
        Ok(years)
    }
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self::embedded()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_config_is_valid() {
        let config = AuditConfig::embedded();
        assert!(config.validate().is_ok());
        assert_eq!(config.analysis_years, vec![2019, 2020, 2021, 2022, 2023]);
    }

    #[test]
    fn demand_constants_are_unit_interval() {
        let demand = AuditConfig::default().suppressed_demand;
        assert!((0.0..=1.0).contains(&demand.base_rate));
        assert!((0.0..=1.0).contains(&demand.infrastructure_quality_correlation));
    }

    #[test]
    fn every_project_type_is_configured() {
        let config = AuditConfig::default();
        assert!(config.infrastructure.default_budget > 0);
        for project_type in ProjectType::all() {
            let spec = config.infrastructure.project(*project_type).unwrap();
            assert!(spec.cost > 0);
            assert!((0.0..=1.0).contains(&spec.safety_impact));
        }
    }

    #[test]
    fn splits_test_year_from_training_years() {
        let mut config = AuditConfig::default();
        config.analysis_years = vec![2021, 2019, 2023, 2019];
        assert_eq!(config.test_year().unwrap(), 2023);
        assert_eq!(config.training_years().unwrap(), vec![2019, 2021]);
    }

    #[test]
    fn rejects_single_analysis_year() {
        let mut config = AuditConfig::default();
        config.analysis_years = vec![2023, 2023];
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
        assert!(config.training_years().is_err());
    }

    #[test]
    fn rejects_out_of_range_base_rate() {
        let mut config = AuditConfig::default();
        config.suppressed_demand.base_rate = 1.5;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("base_rate"));
    }

    #[test]
    fn rejects_missing_project_type() {
        let toml_str = DEFAULT_TOML.replace("[infrastructure.project_types.bike_lane]", "[unused]");
        let err = AuditConfig::from_toml_str(&toml_str).unwrap_err();
        assert!(err.to_string().contains("bike_lane"), "{err}");
    }

    #[test]
    fn rejects_zero_budget() {
        let toml_str = DEFAULT_TOML.replace("default_budget = 5000000", "default_budget = 0");
        assert!(AuditConfig::from_toml_str(&toml_str).is_err());
    }

    #[test]
    fn reports_malformed_toml() {
        let err = AuditConfig::from_toml_str("analysis_years = [").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
