//! Crash prediction auditor.
//!
//! Trains a crash-count model on every analysis year except the most recent
//! one, then measures how far its predictions land from the crashes actually
//! observed in that held-out year. The model is an explicit value returned
//! by [`CrashPredictionAuditor::train`]; evaluation is a pure function of the
//! model and the aggregate table, so a trained model can be re-evaluated
//! without retraining.

use std::collections::BTreeMap;
use std::io::Read;

use equity_audit_config::{AuditConfig, CrashPredictionConfig};
use equity_audit_ingest::read_crash_csv;
use equity_audit_models::{PredictionResult, QuintileBias};
use equity_audit_tract_models::{CensusTract, CrashRecord, IncomeQuintile, InfrastructureRecord};
use serde::{Deserialize, Serialize};

use crate::AuditError;
use crate::aggregator::{CrashAggregateTable, CrashAggregator};
use crate::regression::RidgeFit;
use crate::tracts::{InfrastructureTable, TractProfile, TractTable};

/// Tract-level features available to the crash model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrashFeature {
    /// Total tract population.
    TotalPopulation,
    /// Income quintile as a number 1-5.
    IncomeQuintile,
    /// OSM infrastructure score.
    InfrastructureScore,
}

/// A trained crash-count estimator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrashModel {
    features: Vec<CrashFeature>,
    fit: RidgeFit,
    training_years: Vec<i32>,
    training_rows: usize,
}

impl CrashModel {
    /// Features the model was trained on, in weight order.
    #[must_use]
    pub fn features(&self) -> &[CrashFeature] {
        &self.features
    }

    /// Years the model was trained on.
    #[must_use]
    pub fn training_years(&self) -> &[i32] {
        &self.training_years
    }

    /// Number of tract-year rows used for training.
    #[must_use]
    pub const fn training_rows(&self) -> usize {
        self.training_rows
    }

    /// Predicts the annual crash count for a tract.
    ///
    /// Negative raw outputs are clamped to zero.
    #[must_use]
    pub fn predict(&self, profile: &TractProfile, infrastructure_score: Option<f64>) -> f64 {
        let row = feature_row(&self.features, profile, infrastructure_score);
        let raw = self.fit.predict(&row);
        if raw.is_finite() { raw.max(0.0) } else { 0.0 }
    }
}

/// A trained model together with its held-out-year evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedAudit {
    /// The trained model, reusable with [`CrashPredictionAuditor::evaluate`].
    pub model: CrashModel,
    /// One row per tract present in the test-year data.
    pub predictions: Vec<PredictionResult>,
}

/// Audits crash prediction error across income groups.
#[derive(Debug)]
pub struct CrashPredictionAuditor {
    tracts: TractTable,
    infrastructure: Option<InfrastructureTable>,
    years: Vec<i32>,
    test_year: i32,
    training_years: Vec<i32>,
    config: CrashPredictionConfig,
}

impl CrashPredictionAuditor {
    /// Creates an auditor over a tract set.
    ///
    /// # Errors
    ///
    /// * [`AuditError::Config`] if the configuration is invalid, including
    ///   fewer than 2 distinct analysis years
    /// * [`AuditError::Validation`] if the tract set is empty or has
    ///   duplicate ids
    pub fn new(tracts: &[CensusTract], config: &AuditConfig) -> Result<Self, AuditError> {
        config.validate()?;
        let test_year = config.test_year()?;
        let training_years = config.training_years()?;

        let mut years = training_years.clone();
        years.push(test_year);

        log::info!(
            "Crash prediction: training on {training_years:?}, testing on {test_year}"
        );

        Ok(Self {
            tracts: TractTable::new(tracts)?,
            infrastructure: None,
            years,
            test_year,
            training_years,
            config: config.crash_prediction.clone(),
        })
    }

    /// Adds observed infrastructure scores as a model feature.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::Validation`] if the records fail validation
    /// against the tract set.
    pub fn with_infrastructure(
        mut self,
        infrastructure: &[InfrastructureRecord],
    ) -> Result<Self, AuditError> {
        self.infrastructure = Some(InfrastructureTable::require(
            &self.tracts,
            Some(infrastructure),
        )?);
        Ok(self)
    }

    /// All analysis years in ascending order.
    #[must_use]
    pub fn years(&self) -> &[i32] {
        &self.years
    }

    /// The held-out test year.
    #[must_use]
    pub const fn test_year(&self) -> i32 {
        self.test_year
    }

    /// The training years in ascending order.
    #[must_use]
    pub fn training_years(&self) -> &[i32] {
        &self.training_years
    }

    /// Reads a crash CSV export and aggregates it per tract and year.
    ///
    /// Every census tract gets a row for every analysis year, with zero
    /// crashes where none were observed.
    ///
    /// # Errors
    ///
    /// Returns a data error ([`AuditError::Ingest`]) if the source is
    /// unreadable or lacks required columns.
    pub fn load_real_crash_data<R: Read>(&self, source: R) -> Result<CrashAggregateTable, AuditError> {
        let parsed = read_crash_csv(source)?;
        let mut table = self.aggregate_records(&parsed.records);
        table.malformed_rows = parsed.malformed_rows;
        Ok(table)
    }

    /// Aggregates already-materialized crash records.
    #[must_use]
    pub fn aggregate_records(&self, records: &[CrashRecord]) -> CrashAggregateTable {
        let base_tracts: Vec<&str> = self.tracts.ids().collect();
        CrashAggregator::new(&self.tracts, &self.years).aggregate(records, &base_tracts)
    }

    /// Fits a crash model on the training-year rows of `table`.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::Data`] if the table has no training-year rows
    /// or references an unknown tract.
    pub fn train(&self, table: &CrashAggregateTable) -> Result<CrashModel, AuditError> {
        let features = self.active_features();

        let mut rows = Vec::new();
        let mut targets = Vec::new();
        for row in &table.rows {
            let Some(year) = row.year else { continue };
            if !self.training_years.contains(&year) {
                continue;
            }
            let profile = self.tracts.require(&row.tract_id)?;
            rows.push(feature_row(
                &features,
                profile,
                self.infrastructure_score(&row.tract_id),
            ));
            #[allow(clippy::cast_precision_loss)]
            let target = row.crash_count as f64;
            targets.push(target);
        }

        if rows.is_empty() {
            return Err(AuditError::data(format!(
                "no crash rows for training years {:?}",
                self.training_years
            )));
        }

        let fit = RidgeFit::fit(&rows, &targets, self.config.ridge_penalty)
            .ok_or_else(|| AuditError::data("crash model could not be fitted"))?;

        let model = CrashModel {
            features,
            fit,
            training_years: self.training_years.clone(),
            training_rows: rows.len(),
        };

        log::info!(
            "Trained crash model on {} tract-year rows with features {:?}",
            model.training_rows,
            model.features
        );

        Ok(model)
    }

    /// Predicts test-year crashes for every tract in the test-year data and
    /// compares them with the observed counts.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::Data`] if no crash in `table` was attributed to
    /// a tract in the test year.
    pub fn evaluate(
        &self,
        model: &CrashModel,
        table: &CrashAggregateTable,
    ) -> Result<Vec<PredictionResult>, AuditError> {
        if !table.observed_years.contains(&self.test_year) {
            return Err(AuditError::data(format!(
                "test year {} has zero matching tracts",
                self.test_year
            )));
        }

        let predictions = table
            .rows_for_year(self.test_year)
            .map(|row| {
                let profile = self.tracts.require(&row.tract_id)?;
                let predicted = model.predict(profile, self.infrastructure_score(&row.tract_id));
                Ok(prediction_result(
                    &row.tract_id,
                    profile.income_quintile,
                    predicted,
                    row.crash_count,
                ))
            })
            .collect::<Result<Vec<_>, AuditError>>()?;

        #[allow(clippy::cast_precision_loss)]
        let mae = predictions.iter().map(|p| p.prediction_error_abs).sum::<f64>()
            / predictions.len().max(1) as f64;
        log::info!(
            "Evaluated {} tracts for {}: mean absolute error {mae:.3}",
            predictions.len(),
            self.test_year
        );

        Ok(predictions)
    }

    /// Trains on the training years and evaluates on the test year.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::Data`] if training or evaluation cannot
    /// proceed; see [`Self::train`] and [`Self::evaluate`].
    pub fn train_ai_on_real_data(
        &self,
        table: &CrashAggregateTable,
    ) -> Result<TrainedAudit, AuditError> {
        let model = self.train(table)?;
        let predictions = self.evaluate(&model, table)?;
        Ok(TrainedAudit { model, predictions })
    }

    fn active_features(&self) -> Vec<CrashFeature> {
        let mut features = vec![CrashFeature::TotalPopulation, CrashFeature::IncomeQuintile];
        if self.config.use_infrastructure_score && self.infrastructure.is_some() {
            features.push(CrashFeature::InfrastructureScore);
        }
        features
    }

    fn infrastructure_score(&self, tract_id: &str) -> Option<f64> {
        self.infrastructure
            .as_ref()?
            .get(tract_id)
            .map(|record| record.osm_infrastructure_score)
    }
}

/// Summarizes prediction error per income quintile, lowest income first.
///
/// Quintiles with no tracts are omitted.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn summarize_by_quintile(predictions: &[PredictionResult]) -> Vec<QuintileBias> {
    let mut groups: BTreeMap<IncomeQuintile, Vec<&PredictionResult>> = BTreeMap::new();
    for prediction in predictions {
        groups
            .entry(prediction.income_quintile)
            .or_default()
            .push(prediction);
    }

    groups
        .into_iter()
        .map(|(income_quintile, rows)| {
            let n = rows.len() as f64;
            let mean = |f: fn(&PredictionResult) -> f64| rows.iter().map(|r| f(r)).sum::<f64>() / n;
            QuintileBias {
                income_quintile,
                tract_count: rows.len(),
                mean_predicted: mean(|r| r.ai_predicted_crashes),
                mean_actual: mean(|r| r.actual_crashes as f64),
                mean_error: mean(|r| r.prediction_error),
                mean_error_pct: mean(|r| r.prediction_error_pct),
            }
        })
        .collect()
}

#[allow(clippy::cast_precision_loss)]
fn feature_row(
    features: &[CrashFeature],
    profile: &TractProfile,
    infrastructure_score: Option<f64>,
) -> Vec<Option<f64>> {
    features
        .iter()
        .map(|feature| match feature {
            CrashFeature::TotalPopulation => Some(profile.total_population as f64),
            CrashFeature::IncomeQuintile => Some(f64::from(profile.income_quintile.value())),
            CrashFeature::InfrastructureScore => infrastructure_score,
        })
        .collect()
}

fn prediction_result(
    tract_id: &str,
    income_quintile: IncomeQuintile,
    predicted: f64,
    actual: u64,
) -> PredictionResult {
    #[allow(clippy::cast_precision_loss)]
    let actual_f = actual as f64;
    let error = predicted - actual_f;
    let error_pct = if actual == 0 {
        0.0
    } else {
        error / actual_f * 100.0
    };

    PredictionResult {
        tract_id: tract_id.to_string(),
        income_quintile,
        ai_predicted_crashes: predicted,
        actual_crashes: actual,
        prediction_error: error,
        prediction_error_abs: error.abs(),
        prediction_error_pct: error_pct,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{crash_at, sample_infrastructure, sample_tracts, tract_center};

    const SIX_ROWS: &str = "CrashDate,CrashYear,Latitude,Longitude\n\
                            2023-03-15,2023,0.5,0.5\n\
                            2023-06-20,2023,1.5,0.5\n\
                            2022-01-10,2022,0.5,0.5\n\
                            2021-08-05,2021,2.5,0.5\n\
                            2020-12-01,2020,3.5,0.5\n\
                            2019-04-22,2019,4.5,0.5\n";

    fn auditor() -> CrashPredictionAuditor {
        CrashPredictionAuditor::new(&sample_tracts(), &AuditConfig::default()).unwrap()
    }

    fn every_year_every_tract(auditor: &CrashPredictionAuditor) -> String {
        let mut csv = String::from("CrashDate,CrashYear,Latitude,Longitude\n");
        for year in auditor.years() {
            for n in 1..=5 {
                let (lat, lon) = tract_center(n);
                csv.push_str(&format!("{year}-06-15,{year},{lat},{lon}\n"));
            }
        }
        csv
    }

    #[test]
    fn initializes_with_configured_years() {
        let config = AuditConfig::default();
        let auditor = auditor();

        assert_eq!(auditor.years().len(), config.analysis_years.len());
        assert_eq!(auditor.test_year(), 2023);
        assert!(auditor.years().contains(&2023));
        assert_eq!(auditor.training_years(), &[2019, 2020, 2021, 2022]);
    }

    #[test]
    fn loads_real_crash_data_from_csv() {
        let auditor = auditor();
        let table = auditor.load_real_crash_data(SIX_ROWS.as_bytes()).unwrap();

        assert_eq!(table.rows.len(), 25);
        assert_eq!(table.count("001", 2023), Some(1));
        assert_eq!(table.count("002", 2023), Some(1));
        assert_eq!(table.count("005", 2019), Some(1));
        assert_eq!(table.count("003", 2023), Some(0));
        assert_eq!(table.total_crashes(), 6);
        assert!(table.rows.iter().all(|row| (1..=5).contains(&row.income_quintile.value())));
    }

    #[test]
    fn missing_columns_are_data_errors() {
        let auditor = auditor();
        let err = auditor
            .load_real_crash_data("CrashDate,CrashYear\n2023-01-01,2023\n".as_bytes())
            .unwrap_err();
        assert!(err.is_data_error(), "{err}");
    }

    #[test]
    fn trains_and_evaluates_on_six_rows() {
        let auditor = auditor();
        let table = auditor.load_real_crash_data(SIX_ROWS.as_bytes()).unwrap();

        let trained = auditor.train_ai_on_real_data(&table).unwrap();

        assert_eq!(trained.predictions.len(), 5);
        assert!(trained.predictions.iter().all(|p| p.ai_predicted_crashes >= 0.0));
        assert_eq!(trained.model.training_rows(), 20);

        // The model is reusable without retraining.
        let again = auditor.evaluate(&trained.model, &table).unwrap();
        assert_eq!(again, trained.predictions);
    }

    #[test]
    fn uniform_history_predicts_uniform_counts() {
        let auditor = auditor();
        let csv = every_year_every_tract(&auditor);
        let table = auditor.load_real_crash_data(csv.as_bytes()).unwrap();

        let trained = auditor.train_ai_on_real_data(&table).unwrap();

        for prediction in &trained.predictions {
            assert!((prediction.ai_predicted_crashes - 1.0).abs() < 1e-9);
            assert_eq!(prediction.actual_crashes, 1);
            assert!(prediction.prediction_error_abs < 1e-9);
        }
    }

    #[test]
    fn learns_that_larger_tracts_crash_more() {
        let auditor = auditor();
        let mut records = Vec::new();
        for year in auditor.years() {
            for n in 1..=5 {
                for _ in 0..(n * 2) {
                    records.push(crash_at(*year, tract_center(n)));
                }
            }
        }
        let table = auditor.aggregate_records(&records);

        let trained = auditor.train_ai_on_real_data(&table).unwrap();
        let by_tract: BTreeMap<_, _> = trained
            .predictions
            .iter()
            .map(|p| (p.tract_id.as_str(), p.ai_predicted_crashes))
            .collect();

        assert!(by_tract["005"] > by_tract["001"]);
        assert!(by_tract["003"] > by_tract["002"]);
    }

    #[test]
    fn rerunning_is_idempotent() {
        let auditor = auditor();
        let table = auditor.load_real_crash_data(SIX_ROWS.as_bytes()).unwrap();

        let first = auditor.train_ai_on_real_data(&table).unwrap();
        let second = auditor.train_ai_on_real_data(&table).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn fewer_than_two_years_is_config_error() {
        let mut config = AuditConfig::default();
        config.analysis_years = vec![2023];

        let err = CrashPredictionAuditor::new(&sample_tracts(), &config).unwrap_err();
        assert!(matches!(err, AuditError::Config(_)), "{err}");
    }

    #[test]
    fn test_year_without_crashes_is_data_error() {
        let auditor = auditor();
        let records = vec![
            crash_at(2021, tract_center(1)),
            crash_at(2022, tract_center(2)),
        ];
        let table = auditor.aggregate_records(&records);

        let err = auditor.train_ai_on_real_data(&table).unwrap_err();
        assert!(matches!(err, AuditError::Data { .. }), "{err}");
        assert!(err.to_string().contains("2023"));
    }

    #[test]
    fn empty_table_is_data_error() {
        let auditor = auditor();
        let err = auditor.train(&CrashAggregateTable::default()).unwrap_err();
        assert!(err.is_data_error());
    }

    #[test]
    fn zero_actual_has_zero_error_pct() {
        let result = prediction_result("001", IncomeQuintile::Q1, 2.5, 0);
        assert!((result.prediction_error - 2.5).abs() < f64::EPSILON);
        assert!(result.prediction_error_pct.abs() < f64::EPSILON);

        let result = prediction_result("001", IncomeQuintile::Q1, 3.0, 4);
        assert!((result.prediction_error_pct - -25.0).abs() < 1e-9);
        assert!((result.prediction_error_abs - 1.0).abs() < 1e-9);
    }

    #[test]
    fn clamps_negative_predictions_to_zero() {
        let model = CrashModel {
            features: vec![CrashFeature::TotalPopulation],
            fit: RidgeFit {
                means: vec![1_000.0],
                scales: vec![100.0],
                weights: vec![2.0],
                intercept: 1.0,
            },
            training_years: vec![2022],
            training_rows: 1,
        };
        let profile = TractProfile {
            total_population: 0,
            median_income: 30_000.0,
            pct_minority: 50.0,
            income_quintile: IncomeQuintile::Q1,
        };

        assert!(model.predict(&profile, None).abs() < f64::EPSILON);
    }

    #[test]
    fn uses_infrastructure_score_when_supplied() {
        let auditor = auditor().with_infrastructure(&sample_infrastructure()).unwrap();
        let table = auditor.load_real_crash_data(SIX_ROWS.as_bytes()).unwrap();

        let model = auditor.train(&table).unwrap();

        assert_eq!(
            model.features(),
            &[
                CrashFeature::TotalPopulation,
                CrashFeature::IncomeQuintile,
                CrashFeature::InfrastructureScore,
            ]
        );
    }

    #[test]
    fn summarizes_error_by_quintile() {
        let predictions = vec![
            prediction_result("001", IncomeQuintile::Q1, 1.0, 2),
            prediction_result("002", IncomeQuintile::Q1, 3.0, 2),
            prediction_result("005", IncomeQuintile::Q5, 4.0, 2),
        ];

        let summary = summarize_by_quintile(&predictions);

        assert_eq!(summary.len(), 2);
        assert_eq!(summary[0].income_quintile, IncomeQuintile::Q1);
        assert_eq!(summary[0].tract_count, 2);
        assert!(summary[0].mean_error.abs() < 1e-9);
        assert!((summary[1].mean_error_pct - 100.0).abs() < 1e-9);
        assert!((summary[1].mean_actual - 2.0).abs() < 1e-9);
    }
}
