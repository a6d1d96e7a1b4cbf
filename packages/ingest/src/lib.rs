#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Readers for the audit's three input tables.
//!
//! Each reader converts an external format into the typed rows from
//! [`equity_audit_tract_models`] and validates column presence up front,
//! so malformed input fails with a named column instead of a late lookup
//! failure deep inside an auditor:
//!
//! * [`crashes::read_crash_csv`] for crash exports (`ArcGIS` column names
//!   and common aliases)
//! * [`tracts::read_census_tracts_geojson`] for tract boundaries with
//!   demographic properties
//! * [`infrastructure::read_infrastructure_json`] for OSM infrastructure
//!   scores

pub mod crashes;
pub mod infrastructure;
pub mod parsing;
pub mod tracts;

pub use crashes::{CrashCsv, read_crash_csv};
pub use infrastructure::read_infrastructure_json;
pub use tracts::read_census_tracts_geojson;

use thiserror::Error;

/// Errors that can occur while reading input tables.
#[derive(Debug, Error)]
pub enum IngestError {
    /// An I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV parsing failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON parsing or deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// `GeoJSON` parsing failed.
    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),

    /// A required column or property is absent.
    #[error("Missing required column '{column}' in {table}")]
    MissingColumn {
        /// Table being read.
        table: &'static str,
        /// Column that was expected.
        column: String,
    },

    /// A feature could not be converted into a tract.
    #[error("Invalid feature {index}: {message}")]
    InvalidFeature {
        /// Zero-based feature position in the collection.
        index: usize,
        /// Description of what went wrong.
        message: String,
    },
}
