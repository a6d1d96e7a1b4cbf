//! Suppressed active-transportation demand.
//!
//! `demand_score = base_rate + infrastructure_quality_correlation *
//! normalize(infrastructure_score)`, where `normalize` is a min-max scaling
//! over every tract in the run. Scores are only comparable between runs
//! over the same tract set.

use std::collections::BTreeMap;

use equity_audit_config::{AuditConfig, SuppressedDemandConfig};
use equity_audit_models::{QuintileDemand, SuppressedDemandResult};
use equity_audit_tract_models::{CensusTract, IncomeQuintile, InfrastructureRecord};
use serde::{Deserialize, Serialize};

use crate::AuditError;
use crate::tracts::{InfrastructureTable, TractTable};

/// Normalized score assigned to every tract when all scores are equal.
const DEGENERATE_NORMALIZED_SCORE: f64 = 0.5;

/// Output of [`SuppressedDemandAnalyzer::run_analysis`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemandAnalysis {
    /// One row per tract with infrastructure data, by tract id.
    pub demand_data: Vec<SuppressedDemandResult>,
    /// Per-quintile summary, lowest income first.
    pub by_quintile: Vec<QuintileDemand>,
}

/// Estimates suppressed demand from observed infrastructure quality.
#[derive(Debug)]
pub struct SuppressedDemandAnalyzer {
    tracts: TractTable,
    infrastructure: InfrastructureTable,
    config: SuppressedDemandConfig,
}

impl SuppressedDemandAnalyzer {
    /// Creates an analyzer.
    ///
    /// # Errors
    ///
    /// * [`AuditError::Validation`] if `infrastructure` is `None` or empty
    ///   ("infrastructure_df is required"), or fails validation against the
    ///   tracts
    /// * [`AuditError::Config`] if the configuration is invalid
    pub fn new(
        tracts: &[CensusTract],
        infrastructure: Option<&[InfrastructureRecord]>,
        config: &AuditConfig,
    ) -> Result<Self, AuditError> {
        let tracts = TractTable::new(tracts)?;
        let infrastructure = InfrastructureTable::require(&tracts, infrastructure)?;
        config.validate()?;

        Ok(Self {
            tracts,
            infrastructure,
            config: config.suppressed_demand.clone(),
        })
    }

    /// Computes demand scores for every tract with infrastructure data.
    ///
    /// `infrastructure_score` in the output is the input
    /// `osm_infrastructure_score`, unchanged.
    #[must_use]
    pub fn run_analysis(&self) -> DemandAnalysis {
        let (min, max) = self
            .infrastructure
            .iter()
            .map(|r| r.osm_infrastructure_score)
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                (lo.min(v), hi.max(v))
            });
        let range = max - min;

        let demand_data: Vec<SuppressedDemandResult> = self
            .infrastructure
            .iter()
            .filter_map(|record| {
                let profile = self.tracts.get(&record.tract_id)?;
                let normalized = if range > 0.0 {
                    (record.osm_infrastructure_score - min) / range
                } else {
                    DEGENERATE_NORMALIZED_SCORE
                };
                let demand_score = self.config.infrastructure_quality_correlation
                    .mul_add(normalized, self.config.base_rate);
                #[allow(clippy::cast_precision_loss)]
                let potential = profile.total_population as f64 * self.config.active_trip_rate;

                Some(SuppressedDemandResult {
                    tract_id: record.tract_id.clone(),
                    income_quintile: profile.income_quintile,
                    infrastructure_score: record.osm_infrastructure_score,
                    normalized_infrastructure_score: normalized,
                    demand_score,
                    potential_daily_trips: potential,
                    suppressed_daily_trips: potential * (1.0 - demand_score).max(0.0),
                })
            })
            .collect();

        let by_quintile = summarize(&demand_data);

        log::info!(
            "Suppressed demand: {} tracts, {:.0} suppressed daily trips",
            demand_data.len(),
            demand_data.iter().map(|r| r.suppressed_daily_trips).sum::<f64>()
        );

        DemandAnalysis {
            demand_data,
            by_quintile,
        }
    }
}

fn summarize(demand_data: &[SuppressedDemandResult]) -> Vec<QuintileDemand> {
    let mut groups: BTreeMap<IncomeQuintile, (usize, f64, f64)> = BTreeMap::new();
    for row in demand_data {
        let entry = groups.entry(row.income_quintile).or_default();
        entry.0 += 1;
        entry.1 += row.demand_score;
        entry.2 += row.suppressed_daily_trips;
    }

    groups
        .into_iter()
        .map(|(income_quintile, (count, score_sum, suppressed))| {
            #[allow(clippy::cast_precision_loss)]
            let mean_demand_score = score_sum / count as f64;
            QuintileDemand {
                income_quintile,
                tract_count: count,
                mean_demand_score,
                total_suppressed_daily_trips: suppressed,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{sample_infrastructure, sample_tracts};

    fn analyzer() -> SuppressedDemandAnalyzer {
        SuppressedDemandAnalyzer::new(
            &sample_tracts(),
            Some(&sample_infrastructure()),
            &AuditConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn requires_infrastructure_data() {
        let err = SuppressedDemandAnalyzer::new(&sample_tracts(), None, &AuditConfig::default())
            .unwrap_err();

        assert!(matches!(err, AuditError::Validation { .. }));
        assert!(err.to_string().contains("infrastructure_df is required"));
    }

    #[test]
    fn infrastructure_scores_come_from_input() {
        let input = sample_infrastructure();
        let expected: BTreeMap<_, _> = input
            .iter()
            .map(|r| (r.tract_id.as_str(), r.osm_infrastructure_score))
            .collect();

        let analysis = analyzer().run_analysis();

        assert_eq!(analysis.demand_data.len(), input.len());
        for row in &analysis.demand_data {
            assert!((row.infrastructure_score - expected[row.tract_id.as_str()]).abs() <= 1e-6);
        }
    }

    #[test]
    fn demand_scales_from_base_rate_to_full_correlation() {
        let config = AuditConfig::default().suppressed_demand;
        let analysis = analyzer().run_analysis();

        let worst = &analysis.demand_data[0];
        let best = &analysis.demand_data[4];
        assert_eq!(worst.tract_id, "001");
        assert!(worst.normalized_infrastructure_score.abs() < 1e-12);
        assert!((worst.demand_score - config.base_rate).abs() < 1e-12);
        assert!((best.normalized_infrastructure_score - 1.0).abs() < 1e-12);
        assert!(
            (best.demand_score - (config.base_rate + config.infrastructure_quality_correlation))
                .abs()
                < 1e-12
        );

        // 003 scores 0.45 on a 0.15..0.85 range.
        let mid = &analysis.demand_data[2];
        assert!((mid.normalized_infrastructure_score - 0.3 / 0.7).abs() < 1e-9);
    }

    #[test]
    fn suppressed_trips_shrink_with_better_infrastructure() {
        let config = AuditConfig::default().suppressed_demand;
        let analysis = analyzer().run_analysis();

        let worst = &analysis.demand_data[0];
        let expected_potential = 2_400.0 * config.active_trip_rate;
        assert!((worst.potential_daily_trips - expected_potential).abs() < 1e-9);
        assert!(
            (worst.suppressed_daily_trips - expected_potential * (1.0 - config.base_rate)).abs()
                < 1e-9
        );
        assert!(analysis.demand_data.iter().all(|r| r.suppressed_daily_trips >= 0.0));
    }

    #[test]
    fn equal_scores_normalize_to_midpoint() {
        let mut infrastructure = sample_infrastructure();
        for record in &mut infrastructure {
            record.osm_infrastructure_score = 0.4;
        }
        let analyzer = SuppressedDemandAnalyzer::new(
            &sample_tracts(),
            Some(&infrastructure),
            &AuditConfig::default(),
        )
        .unwrap();

        let analysis = analyzer.run_analysis();

        assert!(
            analysis
                .demand_data
                .iter()
                .all(|r| (r.normalized_infrastructure_score - 0.5).abs() < f64::EPSILON)
        );
    }

    #[test]
    fn summarizes_by_quintile() {
        let analysis = analyzer().run_analysis();

        assert_eq!(analysis.by_quintile.len(), 5);
        assert_eq!(analysis.by_quintile[0].income_quintile, IncomeQuintile::Q1);
        assert_eq!(analysis.by_quintile[0].tract_count, 1);
        assert!(
            (analysis.by_quintile[4].mean_demand_score - analysis.demand_data[4].demand_score)
                .abs()
                < 1e-12
        );
    }

    #[test]
    fn rerunning_is_idempotent() {
        let analyzer = analyzer();
        assert_eq!(analyzer.run_analysis(), analyzer.run_analysis());
    }
}
