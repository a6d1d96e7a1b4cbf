//! Ridge-regularized least squares on standardized features.
//!
//! Small and dense by construction: a handful of features over a few
//! hundred tract-year rows, so the normal equations are solved directly.

use serde::{Deserialize, Serialize};

const PIVOT_EPSILON: f64 = 1e-12;
const FALLBACK_PENALTY: f64 = 1e-6;

/// A fitted linear model over z-scored features.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RidgeFit {
    /// Per-feature mean used for centering.
    pub means: Vec<f64>,
    /// Per-feature standard deviation used for scaling (1 for constant
    /// features).
    pub scales: Vec<f64>,
    /// Weight per standardized feature.
    pub weights: Vec<f64>,
    /// Intercept (mean of the target).
    pub intercept: f64,
}

impl RidgeFit {
    /// Fits `y ~ X` with an unpenalized intercept.
    ///
    /// Missing feature values are imputed with the feature mean, which is a
    /// zero after standardization. Returns `None` if there are no rows.
    #[must_use]
    pub fn fit(rows: &[Vec<Option<f64>>], targets: &[f64], penalty: f64) -> Option<Self> {
        let n = rows.len();
        if n == 0 || n != targets.len() {
            return None;
        }
        let p = rows[0].len();

        let (means, scales) = standardization(rows, p);
        let z: Vec<Vec<f64>> = rows
            .iter()
            .map(|row| standardize(row, &means, &scales))
            .collect();

        #[allow(clippy::cast_precision_loss)]
        let intercept = targets.iter().sum::<f64>() / n as f64;

        let mut gram = vec![vec![0.0; p]; p];
        let mut rhs = vec![0.0; p];
        for (zi, yi) in z.iter().zip(targets) {
            let centered = yi - intercept;
            for j in 0..p {
                rhs[j] += zi[j] * centered;
                for k in 0..p {
                    gram[j][k] += zi[j] * zi[k];
                }
            }
        }

        let weights = solve_with_penalty(&gram, &rhs, penalty).or_else(|| {
            log::debug!("Normal equations singular, retrying with penalty {FALLBACK_PENALTY}");
            solve_with_penalty(&gram, &rhs, penalty + FALLBACK_PENALTY)
        })?;

        Some(Self {
            means,
            scales,
            weights,
            intercept,
        })
    }

    /// Raw (unclamped) prediction for one feature row.
    #[must_use]
    pub fn predict(&self, row: &[Option<f64>]) -> f64 {
        standardize(row, &self.means, &self.scales)
            .iter()
            .zip(&self.weights)
            .map(|(z, w)| z * w)
            .sum::<f64>()
            + self.intercept
    }
}

fn standardization(rows: &[Vec<Option<f64>>], p: usize) -> (Vec<f64>, Vec<f64>) {
    let mut means = vec![0.0; p];
    let mut scales = vec![1.0; p];

    for j in 0..p {
        let values: Vec<f64> = rows.iter().filter_map(|row| row[j]).collect();
        if values.is_empty() {
            continue;
        }
        #[allow(clippy::cast_precision_loss)]
        let count = values.len() as f64;
        let mean = values.iter().sum::<f64>() / count;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / count;
        means[j] = mean;
        if variance.sqrt() > PIVOT_EPSILON {
            scales[j] = variance.sqrt();
        }
    }

    (means, scales)
}

fn standardize(row: &[Option<f64>], means: &[f64], scales: &[f64]) -> Vec<f64> {
    row.iter()
        .zip(means.iter().zip(scales))
        .map(|(value, (mean, scale))| value.map_or(0.0, |v| (v - mean) / scale))
        .collect()
}

fn solve_with_penalty(gram: &[Vec<f64>], rhs: &[f64], penalty: f64) -> Option<Vec<f64>> {
    let mut a = gram.to_vec();
    for (j, row) in a.iter_mut().enumerate() {
        row[j] += penalty;
    }
    solve(a, rhs.to_vec())
}

/// Solves `a x = b` by Gaussian elimination with partial pivoting.
fn solve(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Option<Vec<f64>> {
    let n = b.len();

    for col in 0..n {
        let pivot = (col..n).max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))?;
        if a[pivot][col].abs() < PIVOT_EPSILON {
            return None;
        }
        a.swap(col, pivot);
        b.swap(col, pivot);

        let pivot_row = a[col].clone();
        let pivot_rhs = b[col];

        for row in (col + 1)..n {
            let factor = a[row][col] / pivot_row[col];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[row][k] -= factor * pivot_row[k];
            }
            b[row] -= factor * pivot_rhs;
        }
    }

    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = ((row + 1)..n).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }

    x.iter().all(|v| v.is_finite()).then_some(x)
}
