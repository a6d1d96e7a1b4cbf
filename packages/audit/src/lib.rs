#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Transportation equity auditing engine.
//!
//! Three independent auditors run over the same census tract and
//! infrastructure snapshot:
//!
//! * [`crash_predictor::CrashPredictionAuditor`] trains a crash-count model
//!   on historical years and measures its error on the held-out year
//! * [`demand_analyzer::SuppressedDemandAnalyzer`] estimates how much
//!   active-transportation demand is suppressed by poor infrastructure
//! * [`infrastructure_auditor::InfrastructureRecommendationAuditor`] picks
//!   each tract's weakest infrastructure category and allocates a fixed
//!   budget across tracts
//!
//! Crash points are attributed to tracts by [`aggregator::CrashAggregator`]
//! using an exact point-in-polygon join. All inputs are in-memory,
//! read-only snapshots; every operation is synchronous and deterministic.

pub mod aggregator;
pub mod crash_predictor;
pub mod demand_analyzer;
pub mod infrastructure_auditor;
pub mod quintile;
mod regression;
pub mod tracts;

#[cfg(test)]
pub(crate) mod fixtures;

pub use aggregator::{CrashAggregateTable, CrashAggregator};
pub use crash_predictor::{CrashModel, CrashPredictionAuditor, TrainedAudit};
pub use demand_analyzer::{DemandAnalysis, SuppressedDemandAnalyzer};
pub use infrastructure_auditor::{InfrastructureAudit, InfrastructureRecommendationAuditor};
pub use tracts::{InfrastructureTable, TractTable};

use equity_audit_config::ConfigError;
use equity_audit_ingest::IngestError;
use thiserror::Error;

/// Errors that can occur during an audit run.
#[derive(Debug, Error)]
pub enum AuditError {
    /// A required input table is missing or inconsistent.
    #[error("Validation error: {message}")]
    Validation {
        /// Description of what went wrong.
        message: String,
    },

    /// The configuration cannot support the requested analysis.
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// The data cannot produce the required output.
    #[error("Data error: {message}")]
    Data {
        /// Description of what went wrong.
        message: String,
    },

    /// An input table could not be read.
    #[error("Data error: {0}")]
    Ingest(#[from] IngestError),
}

impl AuditError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub(crate) fn data(message: impl Into<String>) -> Self {
        Self::Data {
            message: message.into(),
        }
    }

    /// Whether this error stems from malformed or insufficient data.
    #[must_use]
    pub const fn is_data_error(&self) -> bool {
        matches!(self, Self::Data { .. } | Self::Ingest(_))
    }
}
