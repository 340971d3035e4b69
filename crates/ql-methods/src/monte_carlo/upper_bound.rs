//! Andersen-Broadie duality upper bound for a calibrated exercise policy.
//!
//! # Overview
//!
//! For any martingale `M` with `M_0 = 0` the option value is bounded by
//! `E[max_i (h_i - M_i)]`, where `h_i` is the discounted exercise value.
//! The martingale is built from the lower-bound policy itself:
//! `M_i = M_{i-1} + L_i - E_{i-1}[L_i]`, with `L_i` the discounted value
//! of following the policy from date `i` on.  Conditional expectations
//! come from inner simulations started on the outer path, so the cost
//! grows as outer samples × steps × inner samples.
//!
//! The inner/outer sample counts are tunables of [`UpperBoundSettings`].

use crate::monte_carlo::longstaff_schwartz::{EarlyExercisePathPricer, LongstaffSchwartzPathPricer};
use crate::monte_carlo::path::Path;
use crate::monte_carlo::path_generator::{PathGenerator, PathSource};
use crate::time_grid::TimeGrid;
use ql_core::{ensure, errors::Result, BigNatural, Real, Size};
use ql_math::random_numbers::{derived_seed, InverseCumulativeNormalRng, PseudoRandomSequence};
use ql_math::statistics::{IncrementalStatistics, StatisticsAccumulator};
use ql_processes::StochasticProcess1D;
use std::sync::Arc;
use tracing::debug;

/// Sample counts and seed of the dual estimator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct UpperBoundSettings {
    /// Outer paths.
    pub outer_samples: Size,
    /// Inner paths per outer path and date.
    pub inner_samples: Size,
    /// Master seed; outer and inner paths use streams derived from it.
    /// Engines replace 0 with a stream derived from their pricing seed.
    pub seed: BigNatural,
}

impl Default for UpperBoundSettings {
    fn default() -> Self {
        Self {
            outer_samples: 256,
            inner_samples: 64,
            seed: 0,
        }
    }
}

/// Result of [`UpperBoundEngine::calculate`].
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct UpperBoundResult {
    /// Dual upper bound.
    pub upper_bound: Real,
    /// Standard error of the upper bound.
    pub error_estimate: Real,
    /// Upper bound minus the given lower bound.
    pub duality_gap: Real,
}

/// Nested-simulation upper bound for a single-asset policy.
pub struct UpperBoundEngine<'a, E> {
    process: Arc<dyn StochasticProcess1D>,
    policy: &'a LongstaffSchwartzPathPricer<Path, E>,
    grid: Arc<TimeGrid>,
    settings: UpperBoundSettings,
}

impl<'a, E> UpperBoundEngine<'a, E>
where
    E: EarlyExercisePathPricer<Path>,
{
    /// Bound the value of `policy`, simulated on `grid`.
    pub fn new(
        process: Arc<dyn StochasticProcess1D>,
        policy: &'a LongstaffSchwartzPathPricer<Path, E>,
        grid: Arc<TimeGrid>,
        settings: UpperBoundSettings,
    ) -> Result<Self> {
        ensure!(settings.outer_samples > 1, "at least two outer samples required");
        ensure!(settings.inner_samples > 0, "no inner samples requested");
        ensure!(
            policy.discounts().len() == grid.len(),
            "policy calibrated on {} dates, grid has {}",
            policy.discounts().len(),
            grid.len()
        );
        Ok(Self {
            process,
            policy,
            grid,
            settings,
        })
    }

    /// Run the outer simulation; `lower_bound` is the policy value used
    /// for the duality gap.
    pub fn calculate(&self, lower_bound: Real) -> Result<UpperBoundResult> {
        let steps = self.grid.steps();
        let rsg = PseudoRandomSequence::new(steps, derived_seed(self.settings.seed, 0))?;
        let mut outer = PathGenerator::new(Arc::clone(&self.process), Arc::clone(&self.grid), rsg, false)?;
        let mut inner_rng = InverseCumulativeNormalRng::new(derived_seed(self.settings.seed, 1));

        let mut stats = IncrementalStatistics::new();
        for _ in 0..self.settings.outer_samples {
            let path = outer.next()?.value.clone();
            let sample = self.dual_sample(&path, &mut inner_rng)?;
            stats.add(sample, 1.0)?;
        }

        let upper_bound = stats.mean()?;
        let result = UpperBoundResult {
            upper_bound,
            error_estimate: stats.error_estimate()?,
            duality_gap: upper_bound - lower_bound,
        };
        debug!(
            outer = self.settings.outer_samples,
            inner = self.settings.inner_samples,
            upper_bound = result.upper_bound,
            gap = result.duality_gap,
            "dual upper bound done"
        );
        Ok(result)
    }

    fn dual_sample(&self, path: &Path, rng: &mut InverseCumulativeNormalRng) -> Result<Real> {
        let discounts = self.policy.discounts();
        let exerciser = self.policy.exerciser();
        let len = path.len();

        let mut martingale = 0.0;
        let mut continuation_prev = self.continuation(path, 0, rng)?;
        let mut best = Real::NEG_INFINITY;
        for i in 1..len {
            let h = exerciser.exercise_value(path, i) * discounts[i];
            let continuation = if i < len - 1 {
                self.continuation(path, i, rng)?
            } else {
                0.0
            };
            let value = if self.policy.exercises_at(path, i) { h } else { continuation };
            martingale += value - continuation_prev;
            best = best.max(h - martingale);
            continuation_prev = continuation;
        }
        Ok(best.max(0.0))
    }

    /// Inner estimate of the discounted policy value from date `i + 1`
    /// given the state of `path` at date `i`.
    fn continuation(&self, path: &Path, i: usize, rng: &mut InverseCumulativeNormalRng) -> Result<Real> {
        let len = path.len();
        let mut inner = path.clone();
        let mut total = 0.0;
        for _ in 0..self.settings.inner_samples {
            for j in i..len - 1 {
                let t = self.grid[j];
                inner[j + 1] = self
                    .process
                    .evolve_1d(t, inner[j], self.grid.dt_at(j), rng.next_real())?;
            }
            total += self.policy.policy_value(&inner, i + 1);
        }
        Ok(total / self.settings.inner_samples as Real)
    }
}

impl<E> std::fmt::Debug for UpperBoundEngine<'_, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpperBoundEngine")
            .field("steps", &self.grid.steps())
            .field("settings", &self.settings)
            .finish()
    }
}
