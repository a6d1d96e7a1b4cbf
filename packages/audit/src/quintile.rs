//! Income quintile assignment.

use std::collections::BTreeMap;

use equity_audit_tract_models::{CensusTract, IncomeQuintile};

/// Assigns each tract an income quintile relative to all given tracts.
///
/// Thresholds are the 20th/40th/60th/80th percentiles of `median_income`,
/// linearly interpolated between order statistics. A tract's quintile is
/// one plus the number of thresholds strictly below its income, so a tract
/// exactly at a threshold falls into the lower quintile.
///
/// Tracts at the maximum income are always Q5 unless every tract has the
/// same income. Top-coded incomes can tie at the maximum and pull the 80th
/// percentile onto it, which would otherwise leave Q5 empty.
#[must_use]
pub fn income_quintiles(tracts: &[CensusTract]) -> BTreeMap<String, IncomeQuintile> {
    let mut incomes: Vec<f64> = tracts.iter().map(|t| t.median_income).collect();
    incomes.sort_by(f64::total_cmp);

    let thresholds = [0.2, 0.4, 0.6, 0.8].map(|q| percentile(&incomes, q));
    let top = match (incomes.first(), incomes.last()) {
        (Some(min), Some(max)) if max > min => Some(*max),
        _ => None,
    };

    tracts
        .iter()
        .map(|tract| {
            if top.is_some_and(|max| tract.median_income >= max) {
                return (tract.tract_id.clone(), IncomeQuintile::Q5);
            }
            let below = thresholds
                .iter()
                .filter(|threshold| **threshold < tract.median_income)
                .count();
            #[allow(clippy::cast_possible_truncation)]
            let quintile = IncomeQuintile::from_value(below as u8 + 1).unwrap_or(IncomeQuintile::Q5);
            (tract.tract_id.clone(), quintile)
        })
        .collect()
}

/// Linear-interpolated percentile of an ascending slice.
fn percentile(sorted: &[f64], q: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        n => {
            #[allow(clippy::cast_precision_loss)]
            let position = q * (n - 1) as f64;
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let lower = position.floor() as usize;
            let upper = (lower + 1).min(n - 1);
            let fraction = position - position.floor();
            sorted[lower] + (sorted[upper] - sorted[lower]) * fraction
        }
    }
}
