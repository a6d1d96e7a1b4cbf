//! Infrastructure gap selection and budget allocation.
//!
//! Each tract's gap is the category with the least existing infrastructure
//! density. Ties resolve to the first category in
//! [`InfrastructureCategory::all`] (crossings, bike, signals, calming).
//! Candidates are then funded greedily in priority order: lowest income
//! quintile first, then lowest `osm_infrastructure_score`, then `tract_id`.
//! Allocation stops at the first candidate that no longer fits the
//! remaining budget.

use std::collections::BTreeMap;

use equity_audit_config::{AuditConfig, ConfigError, InfrastructureConfig};
use equity_audit_models::{InfrastructureRecommendation, ProjectType, QuintileSpend};
use equity_audit_tract_models::{
    CensusTract, IncomeQuintile, InfrastructureCategory, InfrastructureRecord,
};
use serde::{Deserialize, Serialize};

use crate::AuditError;
use crate::tracts::{InfrastructureTable, TractTable};

/// Output of [`InfrastructureRecommendationAuditor::run_audit`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InfrastructureAudit {
    /// Funded projects in priority order.
    pub recommendations: Vec<InfrastructureRecommendation>,
    /// Budget available to the run.
    pub total_budget: u64,
    /// Sum of the funded project costs.
    pub total_spent: u64,
    /// `total_budget - total_spent`.
    pub remaining_budget: u64,
    /// Tracts with infrastructure data that received no project, in
    /// priority order.
    pub unfunded_tracts: Vec<String>,
    /// Spend per income quintile, lowest income first.
    pub spend_by_quintile: Vec<QuintileSpend>,
}

struct Candidate<'a> {
    record: &'a InfrastructureRecord,
    income_quintile: IncomeQuintile,
    gap_category: InfrastructureCategory,
}

/// Recommends one project per tract and allocates a shared budget.
#[derive(Debug)]
pub struct InfrastructureRecommendationAuditor {
    tracts: TractTable,
    infrastructure: InfrastructureTable,
    config: InfrastructureConfig,
    total_budget: u64,
}

impl InfrastructureRecommendationAuditor {
    /// Creates an auditor using the configured default budget.
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
            total_budget: config.infrastructure.default_budget,
            config: config.infrastructure.clone(),
        })
    }

    /// Replaces the configured default budget.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::Config`] if `total_budget` is zero.
    pub fn with_budget(mut self, total_budget: u64) -> Result<Self, AuditError> {
        if total_budget == 0 {
            return Err(ConfigError::Invalid {
                message: "total_budget must be a positive integer".to_string(),
            }
            .into());
        }
        self.total_budget = total_budget;
        Ok(self)
    }

    /// Budget the next [`Self::run_audit`] allocates against.
    #[must_use]
    pub const fn total_budget(&self) -> u64 {
        self.total_budget
    }

    /// Returns the project type that closes the tract's largest
    /// infrastructure gap.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::Data`] if the tract is unknown or has no
    /// infrastructure record.
    pub fn select_project_type_for_gap(&self, tract_id: &str) -> Result<ProjectType, AuditError> {
        self.tracts.require(tract_id)?;
        let record = self.infrastructure.get(tract_id).ok_or_else(|| {
            AuditError::data(format!("tract '{tract_id}' has no infrastructure record"))
        })?;

        Ok(ProjectType::for_gap(gap_category(record)))
    }

    /// Selects a project for every tract with infrastructure data and funds
    /// them in priority order until the budget runs out.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::Config`] if a selected project type has no
    /// configured cost.
    pub fn run_audit(&self) -> Result<InfrastructureAudit, AuditError> {
        let candidates = self.prioritized_candidates();

        let mut recommendations = Vec::new();
        let mut unfunded_tracts = Vec::new();
        let mut spent = 0_u64;
        let mut exhausted = false;

        for candidate in candidates {
            let tract_id = &candidate.record.tract_id;
            let project_type = ProjectType::for_gap(candidate.gap_category);
            let project = self.config.project(project_type)?;

            if exhausted || project.cost > self.total_budget - spent {
                if !exhausted {
                    log::debug!(
                        "Budget cutoff at tract {tract_id}: {project_type} costs {}, {} remaining",
                        project.cost,
                        self.total_budget - spent
                    );
                }
                exhausted = true;
                unfunded_tracts.push(tract_id.clone());
                continue;
            }

            spent += project.cost;
            recommendations.push(InfrastructureRecommendation {
                tract_id: tract_id.clone(),
                priority_rank: recommendations.len() + 1,
                income_quintile: candidate.income_quintile,
                gap_category: candidate.gap_category,
                project_type,
                cost: project.cost,
                safety_impact: project.safety_impact,
                cumulative_spend: spent,
            });
        }

        log::info!(
            "Funded {} projects for {} of {} budget, {} tracts unfunded",
            recommendations.len(),
            spent,
            self.total_budget,
            unfunded_tracts.len()
        );

        Ok(InfrastructureAudit {
            spend_by_quintile: spend_by_quintile(&recommendations),
            recommendations,
            total_budget: self.total_budget,
            total_spent: spent,
            remaining_budget: self.total_budget - spent,
            unfunded_tracts,
        })
    }

    fn prioritized_candidates(&self) -> Vec<Candidate<'_>> {
        let mut candidates: Vec<Candidate<'_>> = self
            .infrastructure
            .iter()
            .filter_map(|record| {
                let profile = self.tracts.get(&record.tract_id)?;
                Some(Candidate {
                    record,
                    income_quintile: profile.income_quintile,
                    gap_category: gap_category(record),
                })
            })
            .collect();

        candidates.sort_by(|a, b| {
            a.income_quintile
                .cmp(&b.income_quintile)
                .then_with(|| {
                    a.record
                        .osm_infrastructure_score
                        .total_cmp(&b.record.osm_infrastructure_score)
                })
                .then_with(|| a.record.tract_id.cmp(&b.record.tract_id))
        });

        candidates
    }
}

/// Category with the minimum density; the earliest category wins ties.
fn gap_category(record: &InfrastructureRecord) -> InfrastructureCategory {
    let mut categories = InfrastructureCategory::all().iter().copied();
    let mut best = categories.next().unwrap_or(InfrastructureCategory::Crossings);

    for category in categories {
        if record.density(category) < record.density(best) {
            best = category;
        }
    }

    best
}

fn spend_by_quintile(recommendations: &[InfrastructureRecommendation]) -> Vec<QuintileSpend> {
    let mut groups: BTreeMap<IncomeQuintile, (usize, u64)> = BTreeMap::new();
    for rec in recommendations {
        let entry = groups.entry(rec.income_quintile).or_default();
        entry.0 += 1;
        entry.1 += rec.cost;
    }

    groups
        .into_iter()
        .map(|(income_quintile, (project_count, total_spend))| QuintileSpend {
            income_quintile,
            project_count,
            total_spend,
        })
        .collect()
}
