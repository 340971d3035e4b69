//! Vector-valued statistics with covariance tracking.

use super::{check_weight, StatisticsAccumulator};
use crate::distributions::ChiSquareDistribution;
use crate::matrix::Matrix;
use ql_core::{ensure, Real, Result};

/// Per-dimension accumulators plus a running weighted outer-product sum.
#[derive(Debug, Clone)]
pub struct SequenceStatistics<S: StatisticsAccumulator> {
    stats: Vec<S>,
    quadratic_sum: Matrix,
}

/// Result of a Gaussian likelihood-ratio covariance test.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LikelihoodRatioTest {
    /// `N (tr(Σ⁻¹S) - ln det(Σ⁻¹S) - d)`.
    pub statistic: Real,
    /// `d (d + 1) / 2`.
    pub degrees_of_freedom: Real,
    /// Probability of a statistic at least this large under the null.
    pub p_value: Real,
}

impl<S: StatisticsAccumulator> SequenceStatistics<S> {
    /// Accumulator for sequences of length `dimension`.
    pub fn new(dimension: usize) -> Result<Self> {
        ensure!(dimension > 0, "sequence dimension must be positive");
        Ok(Self {
            stats: vec![S::default(); dimension],
            quadratic_sum: Matrix::zeros(dimension, dimension),
        })
    }

    /// Sequence length.
    pub fn size(&self) -> usize {
        self.stats.len()
    }

    /// Add one sequence.
    pub fn add(&mut self, values: &[Real], weight: Real) -> Result<()> {
        ensure!(
            values.len() == self.size(),
            "sample size mismatch: {} required, {} provided",
            self.size(),
            values.len()
        );
        check_weight(weight)?;
        for (s, &x) in self.stats.iter_mut().zip(values) {
            s.add(x, weight)?;
        }
        let n = self.size();
        for i in 0..n {
            let wi = weight * values[i];
            for j in 0..n {
                self.quadratic_sum[(i, j)] += wi * values[j];
            }
        }
        Ok(())
    }

    /// Number of sequences added.
    pub fn samples(&self) -> usize {
        self.stats[0].samples()
    }

    /// Sum of weights.
    pub fn weight_sum(&self) -> Real {
        self.stats[0].weight_sum()
    }

    /// Accumulator of dimension `i`.
    pub fn component(&self, i: usize) -> Option<&S> {
        self.stats.get(i)
    }

    fn per_dimension<F>(&self, f: F) -> Result<Vec<Real>>
    where
        F: Fn(&S) -> Result<Real>,
    {
        self.stats.iter().map(f).collect()
    }

    /// Per-dimension means.
    pub fn mean(&self) -> Result<Vec<Real>> {
        self.per_dimension(S::mean)
    }

    /// Per-dimension unbiased variances.
    pub fn variance(&self) -> Result<Vec<Real>> {
        self.per_dimension(S::variance)
    }

    /// Per-dimension standard deviations.
    pub fn standard_deviation(&self) -> Result<Vec<Real>> {
        self.per_dimension(S::standard_deviation)
    }

    /// Per-dimension standard errors.
    pub fn error_estimate(&self) -> Result<Vec<Real>> {
        self.per_dimension(S::error_estimate)
    }

    /// Unbiased covariance, `(Σwxxᵀ/W − m mᵀ) · N/(N−1)`.
    pub fn covariance(&self) -> Result<Matrix> {
        let n = self.samples();
        ensure!(n > 1, "sample number must be greater than one, got {n}");
        let w = self.weight_sum();
        let m = self.mean()?;
        let d = self.size();
        let scale = n as Real / (n as Real - 1.0);
        Ok(Matrix::from_fn(d, d, |i, j| {
            (self.quadratic_sum[(i, j)] / w - m[i] * m[j]) * scale
        }))
    }

    /// Correlation matrix.  A zero-variance dimension correlates 1 with
    /// itself and with other zero-variance dimensions, 0 otherwise.
    pub fn correlation(&self) -> Result<Matrix> {
        let cov = self.covariance()?;
        let d = self.size();
        let sd: Vec<Real> = (0..d).map(|i| cov[(i, i)].max(0.0).sqrt()).collect();
        Ok(Matrix::from_fn(d, d, |i, j| {
            if i == j {
                1.0
            } else if sd[i] == 0.0 && sd[j] == 0.0 {
                1.0
            } else if sd[i] == 0.0 || sd[j] == 0.0 {
                0.0
            } else {
                cov[(i, j)] / (sd[i] * sd[j])
            }
        }))
    }

    /// Likelihood-ratio test of the sample covariance against `expected`.
    pub fn likelihood_ratio_test(&self, expected: &Matrix) -> Result<LikelihoodRatioTest> {
        let d = self.size();
        ensure!(
            expected.rows() == d && expected.cols() == d,
            "expected covariance must be {d}x{d}"
        );
        let s = self.covariance()?;
        let m = &expected.inverse()? * &s;
        let det = m.determinant()?;
        ensure!(det > 0.0, "sample covariance is singular relative to the expected one");
        let n = self.samples() as Real;
        let statistic = n * (m.trace() - det.ln() - d as Real);
        let dof = (d * (d + 1)) as Real / 2.0;
        let p_value = ChiSquareDistribution::new(dof)?.survival(statistic);
        Ok(LikelihoodRatioTest {
            statistic,
            degrees_of_freedom: dof,
            p_value,
        })
    }

    /// Return to the empty state, keeping the dimension.
    pub fn reset(&mut self) {
        let d = self.size();
        self.stats.iter_mut().for_each(S::reset);
        self.quadratic_sum = Matrix::zeros(d, d);
    }

    /// Absorb another accumulator of the same dimension.
    pub fn merge(&mut self, other: &Self) -> Result<()> {
        ensure!(other.size() == self.size(), "dimension mismatch in merge");
        for (a, b) in self.stats.iter_mut().zip(other.stats.iter()) {
            a.merge(b);
        }
        self.quadratic_sum = &self.quadratic_sum + &other.quadratic_sum;
        Ok(())
    }
}
