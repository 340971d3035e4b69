//! Running-mean convergence table.

use super::StatisticsAccumulator;
use ql_core::{Real, Result};

/// Wraps an accumulator and records `(samples, mean)` whenever the sample
/// count reaches a power of two.
#[derive(Debug, Clone, Default)]
pub struct ConvergenceStatistics<S: StatisticsAccumulator> {
    inner: S,
    table: Vec<(usize, Real)>,
    next_checkpoint: usize,
}

impl<S: StatisticsAccumulator> ConvergenceStatistics<S> {
    /// Empty accumulator.
    pub fn new() -> Self {
        Self {
            inner: S::default(),
            table: Vec::new(),
            next_checkpoint: 1,
        }
    }

    /// Recorded `(samples, mean)` pairs.
    pub fn convergence_table(&self) -> &[(usize, Real)] {
        &self.table
    }

    /// The wrapped accumulator.
    pub fn inner(&self) -> &S {
        &self.inner
    }
}

impl<S: StatisticsAccumulator> StatisticsAccumulator for ConvergenceStatistics<S> {
    fn add(&mut self, value: Real, weight: Real) -> Result<()> {
        self.inner.add(value, weight)?;
        if self.next_checkpoint == 0 {
            self.next_checkpoint = 1;
        }
        if self.inner.samples() == self.next_checkpoint {
            self.table.push((self.next_checkpoint, self.inner.mean()?));
            self.next_checkpoint *= 2;
        }
        Ok(())
    }

    fn samples(&self) -> usize {
        self.inner.samples()
    }

    fn weight_sum(&self) -> Real {
        self.inner.weight_sum()
    }

    fn mean(&self) -> Result<Real> {
        self.inner.mean()
    }

    fn variance(&self) -> Result<Real> {
        self.inner.variance()
    }

    fn reset(&mut self) {
        *self = Self::new();
    }

    fn merge(&mut self, other: &Self) {
        self.inner.merge(&other.inner);
        while self.next_checkpoint != 0 && self.next_checkpoint <= self.inner.samples() {
            self.next_checkpoint *= 2;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statistics::IncrementalStatistics;

    #[test]
    fn records_at_powers_of_two() {
        let mut c = ConvergenceStatistics::<IncrementalStatistics>::new();
        for i in 1..=10 {
            c.add(i as Real, 1.0).unwrap();
        }
        let samples: Vec<usize> = c.convergence_table().iter().map(|e| e.0).collect();
        assert_eq!(samples, vec![1, 2, 4, 8]);
        assert_eq!(c.convergence_table()[2].1, 2.5);
        c.reset();
        assert!(c.convergence_table().is_empty());
    }
}
