//! Ordinary least squares over the transformed feature matrix.
//!
//! The design matrix is augmented with a leading column of ones for the
//! intercept and solved through SVD. Singular values below a cutoff relative to
//! the largest one are treated as zero, so a peer sample with fewer rows than
//! parameters still yields the minimum-norm solution instead of failing.

use nalgebra::{DMatrix, DVector};
use serde::Serialize;

use crate::error::RegressionError;
use crate::features::{FeatureVector, FEATURE_COUNT};
use crate::peers::MIN_TRAINING_ROWS;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinearModel {
    pub weights: [f64; FEATURE_COUNT],
    pub intercept: f64,
    /// Column means of the training features, not of the target.
    pub means: [f64; FEATURE_COUNT],
    pub training_rows: usize,
}

impl LinearModel {
    pub fn fit(x: &[FeatureVector], y: &[f64]) -> Result<Self, RegressionError> {
        let n = x.len().min(y.len());
        if n < MIN_TRAINING_ROWS {
            return Err(RegressionError::TooFewRows {
                required: MIN_TRAINING_ROWS,
                got: n,
            });
        }
        if x.iter().any(|f| !f.is_finite()) || y.iter().any(|v| !v.is_finite()) {
            return Err(RegressionError::Degenerate("non-finite training value"));
        }

        let cols = FEATURE_COUNT + 1;
        let design = DMatrix::from_row_iterator(
            n,
            cols,
            x.iter()
                .take(n)
                .flat_map(|f| std::iter::once(1.0).chain(f.values().iter().copied())),
        );
        let target = DVector::from_iterator(n, y.iter().take(n).copied());

        let beta = solve_least_squares(design, &target)?;
        let mut coefficients = beta.iter().copied();
        let intercept = coefficients
            .next()
            .ok_or(RegressionError::Degenerate("empty solution"))?;
        let mut weights = [0.0; FEATURE_COUNT];
        for (slot, w) in weights.iter_mut().zip(coefficients) {
            *slot = w;
        }

        Ok(Self {
            weights,
            intercept,
            means: column_means(x.get(..n).unwrap_or(x)),
            training_rows: n,
        })
    }

    /// Stand-in for a failed fit: zero weights and a NaN intercept, so the
    /// prediction is non-finite and the fixed-floor guardrail takes over.
    pub fn degenerate(x: &[FeatureVector]) -> Self {
        Self {
            weights: [0.0; FEATURE_COUNT],
            intercept: f64::NAN,
            means: column_means(x),
            training_rows: x.len(),
        }
    }

    pub fn predict(&self, features: &FeatureVector) -> f64 {
        self.intercept
            + self
                .weights
                .iter()
                .zip(features.values())
                .map(|(w, v)| w * v)
                .sum::<f64>()
    }
}

pub fn column_means(x: &[FeatureVector]) -> [f64; FEATURE_COUNT] {
    let mut sums = [0.0; FEATURE_COUNT];
    if x.is_empty() {
        return sums;
    }
    for row in x {
        for (sum, v) in sums.iter_mut().zip(row.values()) {
            *sum += v;
        }
    }
    let n = x.len() as f64;
    sums.map(|s| s / n)
}

fn solve_least_squares(
    design: DMatrix<f64>,
    target: &DVector<f64>,
) -> Result<DVector<f64>, RegressionError> {
    let dims = design.nrows().max(design.ncols()) as f64;
    let svd = design.svd(true, true);
    let largest = svd.singular_values.iter().copied().fold(0.0_f64, f64::max);
    if !largest.is_finite() || largest == 0.0 {
        return Err(RegressionError::Degenerate("zero design matrix"));
    }
    let cutoff = largest * dims * f64::EPSILON;
    let beta = svd
        .solve(target, cutoff)
        .map_err(RegressionError::Degenerate)?;
    if beta.iter().all(|v| v.is_finite()) {
        Ok(beta)
    } else {
        Err(RegressionError::Degenerate("non-finite coefficients"))
    }
}
