//! The Monte Carlo model: draw a path, price it, accumulate.

use crate::monte_carlo::path_generator::PathSource;
use crate::monte_carlo::path_pricer::PathPricer;
use ql_core::{errors::Result, Real, Size};
use ql_math::statistics::StatisticsAccumulator;

/// A control variate: a second pricer whose expectation is known exactly.
pub struct ControlVariate<P> {
    pricer: Box<dyn PathPricer<P>>,
    value: Real,
}

impl<P> ControlVariate<P> {
    /// Combine a control pricer with its analytic value.
    pub fn new(pricer: Box<dyn PathPricer<P>>, value: Real) -> Self {
        Self { pricer, value }
    }

    /// The analytic value of the control.
    pub fn value(&self) -> Real {
        self.value
    }

    fn adjust(&self, price: Real, path: &P) -> Result<Real> {
        Ok(price + self.value - self.pricer.value(path)?)
    }
}

impl<P> std::fmt::Debug for ControlVariate<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControlVariate")
            .field("value", &self.value)
            .finish_non_exhaustive()
    }
}

/// Combines a path generator, a path pricer and a statistics accumulator.
///
/// With antithetic variates each sample is the average of a path and its
/// mirror image, so the accumulator sees one sample per pair.  With a
/// control variate every path value `v` becomes `v - c + E[c]`.
#[derive(Debug)]
pub struct MonteCarloModel<G: PathSource, P, S> {
    path_generator: G,
    path_pricer: P,
    accumulator: S,
    antithetic: bool,
    control_variate: Option<ControlVariate<G::Path>>,
}

impl<G, P, S> MonteCarloModel<G, P, S>
where
    G: PathSource,
    P: PathPricer<G::Path>,
    S: StatisticsAccumulator,
{
    /// Create a model with an empty accumulator.
    pub fn new(path_generator: G, path_pricer: P, antithetic: bool) -> Self {
        Self::with_accumulator(path_generator, path_pricer, S::default(), antithetic)
    }

    /// Create a model continuing from an existing accumulator.
    pub fn with_accumulator(path_generator: G, path_pricer: P, accumulator: S, antithetic: bool) -> Self {
        Self {
            path_generator,
            path_pricer,
            accumulator,
            antithetic,
            control_variate: None,
        }
    }

    /// Attach a control variate.
    pub fn with_control_variate(mut self, control_variate: ControlVariate<G::Path>) -> Self {
        self.control_variate = Some(control_variate);
        self
    }

    /// Draw, price and accumulate `samples` samples.
    pub fn add_samples(&mut self, samples: Size) -> Result<()> {
        for _ in 0..samples {
            let path = self.path_generator.next()?;
            let weight = path.weight;
            let mut price = self.path_pricer.value(&path.value)?;
            if let Some(cv) = &self.control_variate {
                price = cv.adjust(price, &path.value)?;
            }

            if self.antithetic {
                let path = self.path_generator.antithetic()?;
                let mut price2 = self.path_pricer.value(&path.value)?;
                if let Some(cv) = &self.control_variate {
                    price2 = cv.adjust(price2, &path.value)?;
                }
                self.accumulator.add(0.5 * (price + price2), weight)?;
            } else {
                self.accumulator.add(price, weight)?;
            }
        }
        Ok(())
    }

    /// The accumulated statistics.
    pub fn sample_accumulator(&self) -> &S {
        &self.accumulator
    }

    /// Consume the model and keep the statistics.
    pub fn into_accumulator(self) -> S {
        self.accumulator
    }

    /// `true` if antithetic variates are used.
    pub fn is_antithetic(&self) -> bool {
        self.antithetic
    }

    /// The path generator.
    pub fn path_generator(&self) -> &G {
        &self.path_generator
    }

    /// The path pricer.
    pub fn path_pricer(&self) -> &P {
        &self.path_pricer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monte_carlo::path::Path;
    use crate::monte_carlo::path_generator::PathGenerator;
    use crate::time_grid::TimeGrid;
    use approx::assert_abs_diff_eq;
    use ql_math::random_numbers::PseudoRandomSequence;
    use ql_math::statistics::IncrementalStatistics;
    use ql_processes::{GeneralizedBlackScholesProcess, StochasticProcess1D};
    use ql_termstructures::{BlackConstantVol, FlatForward};
    use std::sync::Arc;

    /// Prices a path by its terminal value.
    struct Terminal;

    impl PathPricer<Path> for Terminal {
        fn value(&self, path: &Path) -> Result<Real> {
            Ok(path.back())
        }
    }

    fn generator(seed: u64) -> PathGenerator<PseudoRandomSequence> {
        let process: Arc<dyn StochasticProcess1D> = Arc::new(
            GeneralizedBlackScholesProcess::new(
                100.0,
                Arc::new(FlatForward::new(0.0)),
                Arc::new(FlatForward::new(0.0)),
                Arc::new(BlackConstantVol::new(0.0).unwrap()),
            )
            .unwrap(),
        );
        let grid = Arc::new(TimeGrid::new(1.0, 1).unwrap());
        PathGenerator::new(process, grid, PseudoRandomSequence::new(1, seed).unwrap(), false).unwrap()
    }

    #[test]
    fn deterministic_process_has_exact_mean() {
        let mut model: MonteCarloModel<_, _, IncrementalStatistics> =
            MonteCarloModel::new(generator(1), Terminal, true);
        model.add_samples(10).unwrap();
        assert_eq!(model.sample_accumulator().samples(), 10);
        assert_abs_diff_eq!(model.sample_accumulator().mean().unwrap(), 100.0, epsilon = 1e-12);
    }

    #[test]
    fn control_variate_with_identical_pricer_removes_all_noise() {
        let mut model: MonteCarloModel<_, _, IncrementalStatistics> =
            MonteCarloModel::new(generator(5), Terminal, false)
                .with_control_variate(ControlVariate::new(Box::new(Terminal), 42.0));
        model.add_samples(5).unwrap();
        assert_abs_diff_eq!(model.sample_accumulator().mean().unwrap(), 42.0, epsilon = 1e-12);
        assert_abs_diff_eq!(model.sample_accumulator().variance().unwrap(), 0.0, epsilon = 1e-12);
    }

    /// Log of the terminal value, linear in the Gaussian draw.
    struct LogTerminal;

    impl PathPricer<Path> for LogTerminal {
        fn value(&self, path: &Path) -> Result<Real> {
            Ok(path.back().ln())
        }
    }

    #[test]
    fn antithetic_pairs_average_to_the_midpoint() {
        let process: Arc<dyn StochasticProcess1D> = Arc::new(
            GeneralizedBlackScholesProcess::new(
                100.0,
                Arc::new(FlatForward::new(0.03)),
                Arc::new(FlatForward::new(0.0)),
                Arc::new(BlackConstantVol::new(0.3).unwrap()),
            )
            .unwrap(),
        );
        let grid = Arc::new(TimeGrid::new(1.0, 1).unwrap());
        let generator = PathGenerator::new(process, grid, PseudoRandomSequence::new(1, 9).unwrap(), false).unwrap();
        let mut model: MonteCarloModel<_, _, IncrementalStatistics> = MonteCarloModel::new(generator, LogTerminal, true);
        model.add_samples(3).unwrap();
        let stats = model.sample_accumulator();
        assert_abs_diff_eq!(stats.mean().unwrap(), 100.0_f64.ln() + 0.03 - 0.045, epsilon = 1e-12);
        assert_abs_diff_eq!(stats.variance().unwrap(), 0.0, epsilon = 1e-12);
    }
}
