#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the transportation equity auditors.
//!
//! Reads census tracts (`GeoJSON`), infrastructure metrics (JSON) and a crash
//! export (CSV), runs all three auditors and writes a single JSON document
//! to stdout. Logs go to stderr and are controlled by `RUST_LOG`.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use clap::Parser;
use equity_audit::crash_predictor::summarize_by_quintile;
use equity_audit::{
    CrashPredictionAuditor, DemandAnalysis, InfrastructureAudit,
    InfrastructureRecommendationAuditor, SuppressedDemandAnalyzer, TrainedAudit,
};
use equity_audit_config::AuditConfig;
use equity_audit_ingest::{read_census_tracts_geojson, read_infrastructure_json};
use equity_audit_models::QuintileBias;
use serde::Serialize;

#[derive(Parser)]
#[command(name = "equity-audit", about = "Transportation equity auditing engine")]
struct Cli {
    /// Census tract boundaries and demographics (`GeoJSON` `FeatureCollection`)
    #[arg(long)]
    tracts: PathBuf,
    /// OSM infrastructure metrics per tract (JSON)
    #[arg(long)]
    infrastructure: PathBuf,
    /// Crash export with date/year and latitude/longitude columns (CSV)
    #[arg(long)]
    crashes: PathBuf,
    /// Alternate audit configuration (TOML). Defaults to the embedded one.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Total infrastructure budget in dollars, overriding the configuration
    #[arg(long)]
    budget: Option<u64>,
}

#[derive(Serialize)]
struct CrashReport {
    test_year: i32,
    training_years: Vec<i32>,
    excluded_out_of_years: usize,
    excluded_unresolved: usize,
    malformed_rows: usize,
    #[serde(flatten)]
    audit: TrainedAudit,
    bias_by_quintile: Vec<QuintileBias>,
}

#[derive(Serialize)]
struct AuditReport {
    crash_prediction: CrashReport,
    suppressed_demand: DemandAnalysis,
    infrastructure: InfrastructureAudit,
}

fn open(path: &Path) -> Result<BufReader<File>, std::io::Error> {
    File::open(path).map(BufReader::new).map_err(|e| {
        std::io::Error::new(e.kind(), format!("{}: {e}", path.display()))
    })
}

fn run(cli: &Cli) -> Result<AuditReport, Box<dyn std::error::Error>> {
    let config = match &cli.config {
        Some(path) => AuditConfig::from_path(path)?,
        None => AuditConfig::embedded(),
    };

    let tracts = read_census_tracts_geojson(open(&cli.tracts)?)?;
    let infrastructure = read_infrastructure_json(open(&cli.infrastructure)?)?;
    log::info!(
        "Loaded {} census tracts and {} infrastructure records",
        tracts.len(),
        infrastructure.len()
    );

    let predictor =
        CrashPredictionAuditor::new(&tracts, &config)?.with_infrastructure(&infrastructure)?;
    let table = predictor.load_real_crash_data(open(&cli.crashes)?)?;
    let audit = predictor.train_ai_on_real_data(&table)?;
    let crash_prediction = CrashReport {
        test_year: predictor.test_year(),
        training_years: predictor.training_years().to_vec(),
        excluded_out_of_years: table.excluded_out_of_years,
        excluded_unresolved: table.excluded_unresolved,
        malformed_rows: table.malformed_rows,
        bias_by_quintile: summarize_by_quintile(&audit.predictions),
        audit,
    };

    let suppressed_demand =
        SuppressedDemandAnalyzer::new(&tracts, Some(&infrastructure), &config)?.run_analysis();

    let mut recommender =
        InfrastructureRecommendationAuditor::new(&tracts, Some(&infrastructure), &config)?;
    if let Some(budget) = cli.budget {
        recommender = recommender.with_budget(budget)?;
    }
    let infrastructure = recommender.run_audit()?;

    Ok(AuditReport {
        crash_prediction,
        suppressed_demand,
        infrastructure,
    })
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::formatted_builder()
        .parse_env("RUST_LOG")
        .init();
    let cli = Cli::parse();

    let report = run(&cli).inspect_err(|e| log::error!("Audit failed: {e}"))?;

    let mut out = BufWriter::new(std::io::stdout().lock());
    serde_json::to_writer_pretty(&mut out, &report)?;
    writeln!(out)?;
    out.flush()?;

    Ok(())
}
