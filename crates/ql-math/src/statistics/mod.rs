//! Statistics accumulators.
//!
//! [`IncrementalStatistics`] keeps O(1) running moments and is the default
//! Monte Carlo accumulator; [`GeneralStatistics`] stores every sample and
//! adds percentiles and the risk measures.  [`SequenceStatistics`] lifts
//! any accumulator to vector samples and tracks the covariance;
//! [`ConvergenceStatistics`] records the running mean at doubling sample
//! counts.
//!
//! All accumulators reject non-positive or non-finite weights, and every
//! derived query fails with a precondition error on an empty sample set.

mod convergence;
mod general;
mod incremental;
mod risk;
mod sequence;

pub use convergence::ConvergenceStatistics;
pub use general::GeneralStatistics;
pub use incremental::IncrementalStatistics;
pub use sequence::{LikelihoodRatioTest, SequenceStatistics};

use ql_core::{ensure, Real, Result};

/// The accumulator seam used by Monte Carlo drivers.
///
/// Accumulators are associative: merging two accumulators gives the same
/// moments as adding both sample sets to one.
pub trait StatisticsAccumulator: Clone + Default + Send + Sync + std::fmt::Debug {
    /// Add a sample with the given weight.
    fn add(&mut self, value: Real, weight: Real) -> Result<()>;

    /// Number of samples added.
    fn samples(&self) -> usize;

    /// Sum of the weights.
    fn weight_sum(&self) -> Real;

    /// Weighted mean.
    fn mean(&self) -> Result<Real>;

    /// Unbiased weighted variance.
    fn variance(&self) -> Result<Real>;

    /// Square root of [`variance`](Self::variance).
    fn standard_deviation(&self) -> Result<Real> {
        Ok(self.variance()?.sqrt())
    }

    /// Standard error of the mean, `sqrt(variance / N)`.
    fn error_estimate(&self) -> Result<Real> {
        let n = self.samples();
        Ok((self.variance()? / n as Real).sqrt())
    }

    /// Return to the empty state.
    fn reset(&mut self) {
        *self = Self::default();
    }

    /// Absorb the samples of `other`.
    fn merge(&mut self, other: &Self);
}

pub(crate) fn check_weight(weight: Real) -> Result<()> {
    ensure!(
        weight.is_finite() && weight > 0.0,
        "sample weight must be positive and finite, got {weight}"
    );
    Ok(())
}

// moment corrections shared by the scalar accumulators; `n` is the sample
// count and the central moments are weight-normalised
pub(crate) fn unbiased_variance(n: usize, m2: Real) -> Result<Real> {
    ensure!(n > 1, "sample number must be greater than one, got {n}");
    let n = n as Real;
    Ok(m2 * n / (n - 1.0))
}

pub(crate) fn skewness(n: usize, m2: Real, m3: Real) -> Result<Real> {
    ensure!(n > 2, "sample number must be greater than two, got {n}");
    let sigma = unbiased_variance(n, m2)?.sqrt();
    let n = n as Real;
    Ok(m3 / sigma.powi(3) * (n / (n - 1.0)) * (n / (n - 2.0)))
}

pub(crate) fn kurtosis(n: usize, m2: Real, m4: Real) -> Result<Real> {
    ensure!(n > 3, "sample number must be greater than three, got {n}");
    let var = unbiased_variance(n, m2)?;
    let n = n as Real;
    let c1 = (n / (n - 1.0)) * (n / (n - 2.0)) * ((n + 1.0) / (n - 3.0));
    let c2 = 3.0 * (n - 1.0) * (n - 1.0) / ((n - 2.0) * (n - 3.0));
    Ok(c1 * m4 / (var * var) - c2)
}
