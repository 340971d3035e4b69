//! Running weighted moments, combined with the pairwise update formulas of
//! Pébay (2008) so that adding a sample and merging two accumulators use
//! the same arithmetic.

use super::{check_weight, kurtosis, skewness, unbiased_variance, StatisticsAccumulator};
use ql_core::{ensure, Real, Result};

/// O(1) accumulator of weighted moments up to the fourth, extrema and
/// downside (negative sample) dispersion.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IncrementalStatistics {
    n: usize,
    w: Real,
    mean: Real,
    // weighted central sums Σw(x-m)^k
    m2: Real,
    m3: Real,
    m4: Real,
    min: Real,
    max: Real,
    down_n: usize,
    down_w: Real,
    down_x2: Real,
}

impl Default for IncrementalStatistics {
    fn default() -> Self {
        Self {
            n: 0,
            w: 0.0,
            mean: 0.0,
            m2: 0.0,
            m3: 0.0,
            m4: 0.0,
            min: Real::INFINITY,
            max: Real::NEG_INFINITY,
            down_n: 0,
            down_w: 0.0,
            down_x2: 0.0,
        }
    }
}

impl IncrementalStatistics {
    /// Empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add every value with unit weight.
    pub fn add_all(&mut self, values: &[Real]) -> Result<()> {
        values.iter().try_for_each(|&x| self.add(x, 1.0))
    }

    fn combine(&mut self, n: usize, w: Real, mean: Real, m2: Real, m3: Real, m4: Real) {
        if n == 0 {
            return;
        }
        if self.n == 0 {
            self.n = n;
            self.w = w;
            self.mean = mean;
            self.m2 = m2;
            self.m3 = m3;
            self.m4 = m4;
            return;
        }
        let (wa, wb) = (self.w, w);
        let wt = wa + wb;
        let d = mean - self.mean;
        let d2 = d * d;
        let new_m4 = self.m4
            + m4
            + d2 * d2 * wa * wb * (wa * wa - wa * wb + wb * wb) / (wt * wt * wt)
            + 6.0 * d2 * (wa * wa * m2 + wb * wb * self.m2) / (wt * wt)
            + 4.0 * d * (wa * m3 - wb * self.m3) / wt;
        let new_m3 = self.m3
            + m3
            + d2 * d * wa * wb * (wa - wb) / (wt * wt)
            + 3.0 * d * (wa * m2 - wb * self.m2) / wt;
        self.m2 += m2 + d2 * wa * wb / wt;
        self.m3 = new_m3;
        self.m4 = new_m4;
        self.mean += d * wb / wt;
        self.w = wt;
        self.n += n;
    }

    fn require_samples(&self) -> Result<()> {
        ensure!(self.n > 0 && self.w > 0.0, "empty sample set");
        Ok(())
    }

    /// Skewness (N > 2).
    pub fn skewness(&self) -> Result<Real> {
        self.require_samples()?;
        skewness(self.n, self.m2 / self.w, self.m3 / self.w)
    }

    /// Excess kurtosis (N > 3).
    pub fn kurtosis(&self) -> Result<Real> {
        self.require_samples()?;
        kurtosis(self.n, self.m2 / self.w, self.m4 / self.w)
    }

    /// Smallest sample.
    pub fn min(&self) -> Result<Real> {
        self.require_samples()?;
        Ok(self.min)
    }

    /// Largest sample.
    pub fn max(&self) -> Result<Real> {
        self.require_samples()?;
        Ok(self.max)
    }

    /// Unbiased variance of the negative samples around zero.
    pub fn downside_variance(&self) -> Result<Real> {
        ensure!(self.down_n > 1, "fewer than two negative samples");
        let n = self.down_n as Real;
        Ok(self.down_x2 / self.down_w * n / (n - 1.0))
    }

    /// Square root of [`downside_variance`](Self::downside_variance).
    pub fn downside_deviation(&self) -> Result<Real> {
        Ok(self.downside_variance()?.sqrt())
    }
}

impl StatisticsAccumulator for IncrementalStatistics {
    fn add(&mut self, value: Real, weight: Real) -> Result<()> {
        check_weight(weight)?;
        ensure!(value.is_finite(), "non-finite sample {value}");
        self.combine(1, weight, value, 0.0, 0.0, 0.0);
        self.min = self.min.min(value);
        self.max = self.max.max(value);
        if value < 0.0 {
            self.down_n += 1;
            self.down_w += weight;
            self.down_x2 += weight * value * value;
        }
        Ok(())
    }

    fn samples(&self) -> usize {
        self.n
    }

    fn weight_sum(&self) -> Real {
        self.w
    }

    fn mean(&self) -> Result<Real> {
        self.require_samples()?;
        Ok(self.mean)
    }

    fn variance(&self) -> Result<Real> {
        self.require_samples()?;
        unbiased_variance(self.n, self.m2 / self.w)
    }

    fn merge(&mut self, other: &Self) {
        self.combine(other.n, other.w, other.mean, other.m2, other.m3, other.m4);
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
        self.down_n += other.down_n;
        self.down_w += other.down_w;
        self.down_x2 += other.down_x2;
    }
}
