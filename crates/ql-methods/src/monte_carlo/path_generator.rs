//! Path generators.
//!
//! Generators are pull-based: each call to [`PathSource::next`] draws a
//! fresh Gaussian vector from the sequence generator and evolves the
//! process over the time grid, overwriting an internal buffer.
//! [`PathSource::antithetic`] reuses the last draw with flipped sign, so an
//! antithetic pair is always `next()` immediately followed by
//! `antithetic()`.

use crate::monte_carlo::path::{MultiPath, Path, SamplePath};
use crate::monte_carlo::sample::Sample;
use crate::time_grid::TimeGrid;
use ql_core::{ensure, errors::Result, Real};
use ql_math::random_numbers::{BrownianBridge, RandomSequenceGenerator};
use ql_math::Array;
use ql_processes::{StochasticProcess, StochasticProcess1D};
use std::sync::Arc;

/// The generator seam of the Monte Carlo model.
pub trait PathSource: Send {
    /// Path type produced.
    type Path: SamplePath;

    /// Draw a new path.
    fn next(&mut self) -> Result<&Sample<Self::Path>>;

    /// The mirror image of the last path drawn by [`next`](Self::next).
    fn antithetic(&mut self) -> Result<&Sample<Self::Path>>;

    /// `false` for low-discrepancy sequences, whose sample variance is not
    /// a valid error estimate.
    fn allows_error_estimate(&self) -> bool;

    /// The grid paths are sampled on.
    fn time_grid(&self) -> &Arc<TimeGrid>;
}

// ─── one-dimensional ──────────────────────────────────────────────────────────

/// Generates paths of a one-dimensional process.
#[derive(Debug)]
pub struct PathGenerator<R> {
    process: Arc<dyn StochasticProcess1D>,
    generator: R,
    time_grid: Arc<TimeGrid>,
    bridge: Option<BrownianBridge>,
    next: Sample<Path>,
    draws: Vec<Real>,
}

impl<R: RandomSequenceGenerator> PathGenerator<R> {
    /// Create a generator; the sequence dimension must equal the number of
    /// time steps.
    pub fn new(
        process: Arc<dyn StochasticProcess1D>,
        time_grid: Arc<TimeGrid>,
        generator: R,
        brownian_bridge: bool,
    ) -> Result<Self> {
        let steps = time_grid.steps();
        ensure!(steps > 0, "empty time grid");
        ensure!(
            generator.dimension() == steps,
            "sequence generator dimensionality ({}) != time steps ({steps})",
            generator.dimension()
        );
        let bridge = if brownian_bridge {
            Some(BrownianBridge::with_times(&time_grid.times()[1..])?)
        } else {
            None
        };
        Ok(Self {
            process,
            generator,
            next: Sample::new(Path::new(Arc::clone(&time_grid)), 1.0),
            time_grid,
            bridge,
            draws: vec![0.0; steps],
        })
    }

    /// The simulated process.
    pub fn process(&self) -> &Arc<dyn StochasticProcess1D> {
        &self.process
    }

    fn generate(&mut self, antithetic: bool) -> Result<&Sample<Path>> {
        let sequence = if antithetic {
            self.generator.last_sequence()
        } else {
            self.generator.next_sequence()
        };
        match &self.bridge {
            Some(bridge) => bridge.transform(sequence, &mut self.draws)?,
            None => self.draws.copy_from_slice(sequence),
        }

        let sign = if antithetic { -1.0 } else { 1.0 };
        let grid = &self.time_grid;
        let values = self.next.value.values_mut();
        values[0] = self.process.x0();
        for i in 1..values.len() {
            values[i] = self.process.evolve_1d(
                grid[i - 1],
                values[i - 1],
                grid.dt_at(i - 1),
                sign * self.draws[i - 1],
            )?;
        }
        self.next.weight = 1.0;
        Ok(&self.next)
    }
}

impl<R: RandomSequenceGenerator> PathSource for PathGenerator<R> {
    type Path = Path;

    fn next(&mut self) -> Result<&Sample<Path>> {
        self.generate(false)
    }

    fn antithetic(&mut self) -> Result<&Sample<Path>> {
        self.generate(true)
    }

    fn allows_error_estimate(&self) -> bool {
        self.generator.allows_error_estimate()
    }

    fn time_grid(&self) -> &Arc<TimeGrid> {
        &self.time_grid
    }
}

// ─── multi-dimensional ────────────────────────────────────────────────────────

/// Generates correlated paths of a multi-dimensional process.
///
/// Draws are laid out step-major (`factors` numbers per step).  With the
/// Brownian bridge enabled each factor instead owns a contiguous block of
/// `steps` draws which the bridge turns into that factor's increments.
#[derive(Debug)]
pub struct MultiPathGenerator<R> {
    process: Arc<dyn StochasticProcess>,
    generator: R,
    time_grid: Arc<TimeGrid>,
    bridge: Option<BrownianBridge>,
    next: Sample<MultiPath>,
    draws: Vec<Real>,
}

impl<R: RandomSequenceGenerator> MultiPathGenerator<R> {
    /// Create a generator; the sequence dimension must equal
    /// `factors × steps`.
    pub fn new(
        process: Arc<dyn StochasticProcess>,
        time_grid: Arc<TimeGrid>,
        generator: R,
        brownian_bridge: bool,
    ) -> Result<Self> {
        let steps = time_grid.steps();
        ensure!(steps > 0, "empty time grid");
        let factors = process.factors();
        ensure!(
            generator.dimension() == factors * steps,
            "dimension ({}) is not equal to ({factors} * {steps}) the number of factors times the number of time steps",
            generator.dimension()
        );
        let bridge = if brownian_bridge {
            Some(BrownianBridge::with_times(&time_grid.times()[1..])?)
        } else {
            None
        };
        let path = MultiPath::new(process.size(), Arc::clone(&time_grid))?;
        Ok(Self {
            process,
            generator,
            next: Sample::new(path, 1.0),
            time_grid,
            bridge,
            draws: vec![0.0; factors * steps],
        })
    }

    fn generate(&mut self, antithetic: bool) -> Result<&Sample<MultiPath>> {
        let factors = self.process.factors();
        let steps = self.time_grid.steps();
        let sequence = if antithetic {
            self.generator.last_sequence()
        } else {
            self.generator.next_sequence()
        };
        match &self.bridge {
            Some(bridge) => {
                // factor-major blocks → step-major increments
                let mut block = vec![0.0; steps];
                for j in 0..factors {
                    bridge.transform(&sequence[j * steps..(j + 1) * steps], &mut block)?;
                    for (i, &z) in block.iter().enumerate() {
                        self.draws[i * factors + j] = z;
                    }
                }
            }
            None => self.draws.copy_from_slice(sequence),
        }

        let sign = if antithetic { -1.0 } else { 1.0 };
        let mut x = self.process.initial_values();
        let path = &mut self.next.value;
        for (j, &xj) in x.iter().enumerate() {
            path[j][0] = xj;
        }
        for i in 1..=steps {
            let offset = (i - 1) * factors;
            let dw = Array::from_fn(factors, |k| sign * self.draws[offset + k]);
            x = self.process.evolve(
                self.time_grid[i - 1],
                &x,
                self.time_grid.dt_at(i - 1),
                &dw,
            )?;
            for (j, &xj) in x.iter().enumerate() {
                path[j][i] = xj;
            }
        }
        self.next.weight = 1.0;
        Ok(&self.next)
    }
}

impl<R: RandomSequenceGenerator> PathSource for MultiPathGenerator<R> {
    type Path = MultiPath;

    fn next(&mut self) -> Result<&Sample<MultiPath>> {
        self.generate(false)
    }

    fn antithetic(&mut self) -> Result<&Sample<MultiPath>> {
        self.generate(true)
    }

    fn allows_error_estimate(&self) -> bool {
        self.generator.allows_error_estimate()
    }

    fn time_grid(&self) -> &Arc<TimeGrid> {
        &self.time_grid
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ql_math::random_numbers::PseudoRandomSequence;
    use ql_math::statistics::{IncrementalStatistics, StatisticsAccumulator};
    use ql_processes::{GeneralizedBlackScholesProcess, HestonProcess};
    use ql_termstructures::{BlackConstantVol, FlatForward};

    fn bs_process() -> Arc<dyn StochasticProcess1D> {
        Arc::new(
            GeneralizedBlackScholesProcess::new(
                100.0,
                Arc::new(FlatForward::new(0.05)),
                Arc::new(FlatForward::new(0.0)),
                Arc::new(BlackConstantVol::new(0.2).unwrap()),
            )
            .unwrap(),
        )
    }

    #[test]
    fn dimension_mismatch_is_rejected() {
        let grid = Arc::new(TimeGrid::new(1.0, 10).unwrap());
        let rsg = PseudoRandomSequence::new(5, 1).unwrap();
        assert!(PathGenerator::new(bs_process(), grid, rsg, false).is_err());
    }

    #[test]
    fn antithetic_path_mirrors_the_draw() {
        let grid = Arc::new(TimeGrid::new(1.0, 1).unwrap());
        let rsg = PseudoRandomSequence::new(1, 42).unwrap();
        let mut gen = PathGenerator::new(bs_process(), grid, rsg, false).unwrap();
        let up = gen.next().unwrap().value.back();
        let down = gen.antithetic().unwrap().value.back();
        // ln S_T = ln S_0 + μ ± σ z: the log-midpoint is the drifted spot
        let mid = (0.5 * (up.ln() + down.ln())).exp();
        assert_abs_diff_eq!(mid, 100.0 * (0.05 - 0.02_f64).exp(), epsilon = 1e-10);
    }

    #[test]
    fn bridge_preserves_terminal_law() {
        let grid = Arc::new(TimeGrid::new(1.0, 16).unwrap());
        let rsg = PseudoRandomSequence::new(16, 7).unwrap();
        let mut gen = PathGenerator::new(bs_process(), grid, rsg, true).unwrap();
        let mut stats = IncrementalStatistics::new();
        for _ in 0..20_000 {
            let s = gen.next().unwrap().value.back();
            stats.add(s.ln(), 1.0).unwrap();
        }
        let mean = stats.mean().unwrap();
        let sd = stats.standard_deviation().unwrap();
        assert!(
            (mean - (100.0_f64.ln() + 0.03)).abs() < 0.01,
            "bridged log-terminal mean = {mean:.4}"
        );
        assert!((sd - 0.2).abs() < 0.005, "bridged log-terminal sd = {sd:.4}");
    }

    #[test]
    fn heston_multi_paths_start_at_initial_values() {
        let process: Arc<dyn StochasticProcess> = Arc::new(
            HestonProcess::new(
                Arc::new(FlatForward::new(0.03)),
                Arc::new(FlatForward::new(0.0)),
                100.0,
                0.04,
                1.5,
                0.04,
                0.3,
                -0.7,
            )
            .unwrap(),
        );
        let grid = Arc::new(TimeGrid::new(1.0, 12).unwrap());
        let rsg = PseudoRandomSequence::new(24, 3).unwrap();
        let mut gen = MultiPathGenerator::new(Arc::clone(&process), grid, rsg, true).unwrap();
        let mp = &gen.next().unwrap().value;
        assert_eq!(mp.asset_number(), 2);
        assert_eq!(mp[0].front(), 100.0);
        assert_eq!(mp[1].front(), 0.04);
        assert!(mp[0].iter().all(|&s| s > 0.0));
        assert!(mp[1].iter().all(|&v| v >= 0.0));
    }
}
