//! Sample-storing statistics with percentiles.

use super::{check_weight, kurtosis, skewness, unbiased_variance, StatisticsAccumulator};
use ql_core::{ensure, Real, Result};

/// Stores every `(value, weight)` pair; supports order statistics.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GeneralStatistics {
    samples: Vec<(Real, Real)>,
    sorted: bool,
}

impl GeneralStatistics {
    /// Empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve capacity for `n` additional samples.
    pub fn reserve(&mut self, n: usize) {
        self.samples.reserve(n);
    }

    /// Add every value with unit weight.
    pub fn add_all(&mut self, values: &[Real]) -> Result<()> {
        values.iter().try_for_each(|&x| self.add(x, 1.0))
    }

    /// Stored samples.
    pub fn data(&self) -> &[(Real, Real)] {
        &self.samples
    }

    /// Sort the stored samples by value.
    pub fn sort(&mut self) {
        if !self.sorted {
            self.samples.sort_by(|a, b| a.0.total_cmp(&b.0));
            self.sorted = true;
        }
    }

    fn sorted_view(&self) -> std::borrow::Cow<'_, [(Real, Real)]> {
        if self.sorted {
            std::borrow::Cow::Borrowed(&self.samples)
        } else {
            let mut v = self.samples.clone();
            v.sort_by(|a, b| a.0.total_cmp(&b.0));
            std::borrow::Cow::Owned(v)
        }
    }

    fn require_samples(&self) -> Result<()> {
        ensure!(!self.samples.is_empty(), "empty sample set");
        Ok(())
    }

    /// Weighted expectation of `f` over the samples accepted by `filter`,
    /// together with the number of accepted samples.
    pub fn expectation_value<F, P>(&self, f: F, filter: P) -> Result<(Real, usize)>
    where
        F: Fn(Real) -> Real,
        P: Fn(Real) -> bool,
    {
        let mut num = 0.0;
        let mut den = 0.0;
        let mut n = 0;
        for &(x, w) in self.samples.iter().filter(|(x, _)| filter(*x)) {
            num += w * f(x);
            den += w;
            n += 1;
        }
        ensure!(n > 0, "no samples satisfy the filter");
        Ok((num / den, n))
    }

    fn central_moment(&self, k: i32) -> Result<Real> {
        let m = self.mean()?;
        Ok(self.expectation_value(|x| (x - m).powi(k), |_| true)?.0)
    }

    /// Skewness (N > 2).
    pub fn skewness(&self) -> Result<Real> {
        skewness(self.samples(), self.central_moment(2)?, self.central_moment(3)?)
    }

    /// Excess kurtosis (N > 3).
    pub fn kurtosis(&self) -> Result<Real> {
        kurtosis(self.samples(), self.central_moment(2)?, self.central_moment(4)?)
    }

    /// Smallest sample.
    pub fn min(&self) -> Result<Real> {
        self.require_samples()?;
        Ok(self.samples.iter().map(|s| s.0).fold(Real::INFINITY, Real::min))
    }

    /// Largest sample.
    pub fn max(&self) -> Result<Real> {
        self.require_samples()?;
        Ok(self.samples.iter().map(|s| s.0).fold(Real::NEG_INFINITY, Real::max))
    }

    // `p · W` less a few ulps of `W`, so that `1 - 0.95` still lands on
    // the fifth of a hundred unit-weight samples
    fn percentile_target(&self, p: Real) -> Real {
        let total = self.weight_sum();
        p * total - 64.0 * Real::EPSILON * total
    }

    /// Smallest sample whose cumulative weight reaches `p · W`, for
    /// `p ∈ (0, 1]`.
    pub fn percentile(&self, p: Real) -> Result<Real> {
        ensure!(p > 0.0 && p <= 1.0, "percentile ({p}) must be in (0, 1]");
        self.require_samples()?;
        let data = self.sorted_view();
        let target = self.percentile_target(p);
        let mut cum = 0.0;
        for &(x, w) in data.iter() {
            cum += w;
            if cum >= target {
                return Ok(x);
            }
        }
        Ok(data[data.len() - 1].0)
    }

    /// Largest sample whose cumulative weight from the top reaches `p · W`.
    pub fn top_percentile(&self, p: Real) -> Result<Real> {
        ensure!(p > 0.0 && p <= 1.0, "percentile ({p}) must be in (0, 1]");
        self.require_samples()?;
        let data = self.sorted_view();
        let target = self.percentile_target(p);
        let mut cum = 0.0;
        for &(x, w) in data.iter().rev() {
            cum += w;
            if cum >= target {
                return Ok(x);
            }
        }
        Ok(data[0].0)
    }
}

impl StatisticsAccumulator for GeneralStatistics {
    fn add(&mut self, value: Real, weight: Real) -> Result<()> {
        check_weight(weight)?;
        ensure!(value.is_finite(), "non-finite sample {value}");
        if let Some(&(last, _)) = self.samples.last() {
            self.sorted &= value >= last;
        } else {
            self.sorted = true;
        }
        self.samples.push((value, weight));
        Ok(())
    }

    fn samples(&self) -> usize {
        self.samples.len()
    }

    fn weight_sum(&self) -> Real {
        self.samples.iter().map(|s| s.1).sum()
    }

    fn mean(&self) -> Result<Real> {
        self.require_samples()?;
        Ok(self.expectation_value(|x| x, |_| true)?.0)
    }

    fn variance(&self) -> Result<Real> {
        unbiased_variance(self.samples(), self.central_moment(2)?)
    }

    fn merge(&mut self, other: &Self) {
        if other.samples.is_empty() {
            return;
        }
        let keeps_order = match (self.samples.last(), other.samples.first()) {
            (Some(a), Some(b)) => self.sorted && other.sorted && b.0 >= a.0,
            (None, _) => other.sorted,
            _ => self.sorted,
        };
        self.samples.extend_from_slice(&other.samples);
        self.sorted = keeps_order;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statistics::IncrementalStatistics;
    use approx::assert_abs_diff_eq;

    #[test]
    fn moments_agree_with_incremental() {
        let data = [2.0, -1.5, 0.3, 7.2, 4.4, 4.4, -0.1];
        let mut g = GeneralStatistics::new();
        let mut i = IncrementalStatistics::new();
        for (k, &x) in data.iter().enumerate() {
            let w = 1.0 + k as Real * 0.25;
            g.add(x, w).unwrap();
            i.add(x, w).unwrap();
        }
        assert_abs_diff_eq!(g.mean().unwrap(), i.mean().unwrap(), epsilon = 1e-12);
        assert_abs_diff_eq!(g.variance().unwrap(), i.variance().unwrap(), epsilon = 1e-11);
        assert_abs_diff_eq!(g.skewness().unwrap(), i.skewness().unwrap(), epsilon = 1e-10);
        assert_abs_diff_eq!(g.kurtosis().unwrap(), i.kurtosis().unwrap(), epsilon = 1e-10);
    }

    #[test]
    fn percentiles() {
        let mut g = GeneralStatistics::new();
        g.add_all(&[5.0, 1.0, 4.0, 2.0, 3.0]).unwrap();
        assert_eq!(g.percentile(0.2).unwrap(), 1.0);
        assert_eq!(g.percentile(0.5).unwrap(), 3.0);
        assert_eq!(g.percentile(1.0).unwrap(), 5.0);
        assert_eq!(g.top_percentile(0.2).unwrap(), 5.0);
        assert!(g.percentile(0.0).is_err());
        assert!(g.percentile(1.1).is_err());
    }

    #[test]
    fn rounded_levels_hit_the_exact_rank() {
        let mut g = GeneralStatistics::new();
        g.add_all(&(1..=100).map(|i| i as Real).collect::<Vec<_>>()).unwrap();
        // 1 - 0.95 is slightly above 0.05 in binary
        assert_eq!(g.percentile(1.0 - 0.95).unwrap(), 5.0);
        assert_eq!(g.top_percentile(1.0 - 0.95).unwrap(), 96.0);
        assert_eq!(g.percentile(0.3).unwrap(), 30.0);
    }

    #[test]
    fn filtered_expectation() {
        let mut g = GeneralStatistics::new();
        g.add_all(&[-2.0, -1.0, 1.0, 2.0]).unwrap();
        let (e, n) = g.expectation_value(|x| x, |x| x < 0.0).unwrap();
        assert_eq!(n, 2);
        assert_abs_diff_eq!(e, -1.5);
        assert!(g.expectation_value(|x| x, |x| x > 10.0).is_err());
    }

    #[test]
    fn merge_and_sort() {
        let mut a = GeneralStatistics::new();
        a.add_all(&[1.0, 2.0]).unwrap();
        let mut b = GeneralStatistics::new();
        b.add_all(&[0.5]).unwrap();
        a.merge(&b);
        assert_eq!(a.samples(), 3);
        assert_eq!(a.percentile(0.3).unwrap(), 0.5);
        a.sort();
        assert_eq!(a.data()[0].0, 0.5);
    }
}
