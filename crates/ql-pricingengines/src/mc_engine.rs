//! Shared plumbing of the Monte Carlo engines.
//!
//! Every MC engine is generic over a [`SequencePolicy`] (pseudo-random or
//! Sobol) and is configured by an [`McEngineSettings`] value assembled by
//! its `Make*` builder.  The builders share their fluent setters through
//! the `mc_builder_methods!` macro.

use crate::context::PricingContext;
use ql_core::{ensure, errors::Result, BigNatural, DiscountFactor, Real, Size, Time};
use ql_instruments::PricingResults;
use ql_math::random_numbers::{LowDiscrepancySequence, PseudoRandomSequence, RandomSequenceGenerator};
use ql_math::statistics::IncrementalStatistics;
use ql_methods::monte_carlo::{
    McConfig, McSimulation, MonteCarloModel, MultiPath, Path, PathGenerator, PathPricer, PathSource,
};
use ql_methods::{StepsSpec, TimeGrid};
use ql_processes::StochasticProcess1D;
use std::sync::Arc;
use tracing::debug;

/// How an engine obtains its Gaussian sequence generator.
pub trait SequencePolicy: RandomSequenceGenerator + std::fmt::Debug + Sized + 'static {
    /// `true` when sample statistics give a meaningful error estimate.
    const ALLOWS_ERROR_ESTIMATE: bool;

    /// A generator of `dimension`-dimensional Gaussian sequences.
    fn make(dimension: Size, seed: BigNatural) -> Result<Self>;
}

impl SequencePolicy for PseudoRandomSequence {
    const ALLOWS_ERROR_ESTIMATE: bool = true;

    fn make(dimension: Size, seed: BigNatural) -> Result<Self> {
        PseudoRandomSequence::new(dimension, seed)
    }
}

impl SequencePolicy for LowDiscrepancySequence {
    const ALLOWS_ERROR_ESTIMATE: bool = false;

    fn make(dimension: Size, seed: BigNatural) -> Result<Self> {
        LowDiscrepancySequence::new(dimension, seed)
    }
}

/// Settings shared by the Monte Carlo engines.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct McEngineSettings {
    /// Total number of time steps.
    pub steps: Option<Size>,
    /// Time steps per year.
    pub steps_per_year: Option<Size>,
    /// Build paths through a Brownian bridge.
    pub brownian_bridge: bool,
    /// Average each path with its mirror image.
    pub antithetic: bool,
    /// Use the engine's control variate, when it has one.
    pub control_variate: bool,
    /// Fixed number of samples.
    pub required_samples: Option<Size>,
    /// Target absolute error.
    pub tolerance: Option<Real>,
    /// Cap on the number of samples in tolerance mode.
    pub max_samples: Option<Size>,
    /// Generator seed; 0 picks the generator's default seed.
    pub seed: BigNatural,
}

impl McEngineSettings {
    /// Check the combination of settings.
    ///
    /// With `needs_steps` exactly one of `steps` and `steps_per_year` must
    /// be given; otherwise at most one.
    pub fn validate(&self, allows_error_estimate: bool, needs_steps: bool) -> Result<()> {
        if needs_steps || self.steps.is_some() || self.steps_per_year.is_some() {
            StepsSpec::from_options(self.steps, self.steps_per_year)?;
        }
        self.mc_config().validate()?;
        if self.tolerance.is_some() {
            ensure!(
                allows_error_estimate,
                "chosen random generator policy does not allow an error estimate"
            );
        }
        if let (Some(n), Some(max)) = (self.required_samples, self.max_samples) {
            ensure!(n <= max, "required samples {n} exceed the maximum {max}");
        }
        Ok(())
    }

    /// Fail when a control variate is requested from an engine without one.
    pub fn reject_control_variate(&self, engine: &str) -> Result<()> {
        ensure!(!self.control_variate, "{engine} has no control variate");
        Ok(())
    }

    /// The sampling targets.
    pub fn mc_config(&self) -> McConfig {
        McConfig {
            tolerance: self.tolerance,
            required_samples: self.required_samples,
            max_samples: self.max_samples,
        }
    }

    /// Grid over `mandatory` times.  Without a step setting only the
    /// mandatory times (and equal sub-steps of their shortest gap) are used.
    pub fn time_grid(&self, mandatory: &[Time]) -> Result<Arc<TimeGrid>> {
        let grid = if self.steps.is_none() && self.steps_per_year.is_none() {
            TimeGrid::with_mandatory_times(mandatory, 0)?
        } else {
            TimeGrid::from_steps_spec(mandatory, StepsSpec::from_options(self.steps, self.steps_per_year)?)?
        };
        Ok(Arc::new(grid))
    }
}

/// Fluent setters shared by the `Make*` builders.  The builder must hold
/// its configuration in a `settings: McEngineSettings` field.
macro_rules! mc_builder_methods {
    () => {
        /// Total number of time steps.
        pub fn with_steps(mut self, steps: ql_core::Size) -> Self {
            self.settings.steps = Some(steps);
            self
        }

        /// Time steps per year.
        pub fn with_steps_per_year(mut self, steps: ql_core::Size) -> Self {
            self.settings.steps_per_year = Some(steps);
            self
        }

        /// Generate paths through a Brownian bridge.
        pub fn with_brownian_bridge(mut self, flag: bool) -> Self {
            self.settings.brownian_bridge = flag;
            self
        }

        /// Use antithetic variates.
        pub fn with_antithetic_variate(mut self, flag: bool) -> Self {
            self.settings.antithetic = flag;
            self
        }

        /// Use the engine's control variate.
        pub fn with_control_variate(mut self, flag: bool) -> Self {
            self.settings.control_variate = flag;
            self
        }

        /// Fixed number of samples.
        pub fn with_samples(mut self, samples: ql_core::Size) -> Self {
            self.settings.required_samples = Some(samples);
            self
        }

        /// Target absolute error of the estimate.
        pub fn with_absolute_tolerance(mut self, tolerance: ql_core::Real) -> Self {
            self.settings.tolerance = Some(tolerance);
            self
        }

        /// Cap on the number of samples.
        pub fn with_max_samples(mut self, samples: ql_core::Size) -> Self {
            self.settings.max_samples = Some(samples);
            self
        }

        /// Generator seed.
        pub fn with_seed(mut self, seed: ql_core::BigNatural) -> Self {
            self.settings.seed = seed;
            self
        }
    };
}
pub(crate) use mc_builder_methods;

/// Paths of the Black-Scholes process of `context` on `grid`.
pub(crate) fn black_scholes_paths<R: SequencePolicy>(
    context: &PricingContext,
    grid: Arc<TimeGrid>,
    settings: &McEngineSettings,
) -> Result<PathGenerator<R>> {
    let process: Arc<dyn StochasticProcess1D> = Arc::new(context.black_scholes_process()?);
    let rsg = R::make(grid.steps(), settings.seed)?;
    PathGenerator::new(process, grid, rsg, settings.brownian_bridge)
}

/// Discounted terminal spot; its expectation is `S₀ D_q(T)` under any
/// risk-neutral dynamics of the spot.
#[derive(Debug, Clone, Copy)]
pub(crate) struct DiscountedTerminalSpot {
    pub(crate) discount: DiscountFactor,
}

impl PathPricer<Path> for DiscountedTerminalSpot {
    fn value(&self, path: &Path) -> Result<Real> {
        Ok(path.back() * self.discount)
    }
}

impl PathPricer<MultiPath> for DiscountedTerminalSpot {
    fn value(&self, path: &MultiPath) -> Result<Real> {
        Ok(path[0].back() * self.discount)
    }
}

/// Run `model` to the targets in `settings` and collect the standard
/// Monte Carlo results.
pub(crate) fn simulate<G, P>(
    model: MonteCarloModel<G, P, IncrementalStatistics>,
    settings: &McEngineSettings,
) -> Result<PricingResults>
where
    G: PathSource,
    P: PathPricer<G::Path>,
{
    run_simulation(model, settings).map(|(results, _)| results)
}

/// As [`simulate`], handing the model back for further diagnostics.
pub(crate) fn run_simulation<G, P>(
    model: MonteCarloModel<G, P, IncrementalStatistics>,
    settings: &McEngineSettings,
) -> Result<(PricingResults, MonteCarloModel<G, P, IncrementalStatistics>)>
where
    G: PathSource,
    P: PathPricer<G::Path>,
{
    let grid = Arc::clone(model.path_generator().time_grid());
    let mut simulation = McSimulation::new(model);
    let outcome = simulation.calculate(settings.tolerance, settings.required_samples, settings.max_samples)?;

    let mut results = PricingResults::from_value(outcome.value);
    results.error_estimate = outcome.error_estimate;
    results.insert("mcStatus", outcome.status.as_str());
    results.insert("samples", outcome.samples as Real);
    results.insert("TimeGrid", grid.times().to_vec());
    debug!(
        steps = grid.steps(),
        samples = outcome.samples,
        value = outcome.value,
        "Monte Carlo engine finished"
    );
    Ok((results, simulation.into_model()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> McEngineSettings {
        McEngineSettings {
            steps: Some(10),
            required_samples: Some(1000),
            ..McEngineSettings::default()
        }
    }

    #[test]
    fn steps_must_be_given_exactly_once() {
        assert!(settings().validate(true, true).is_ok());
        let both = McEngineSettings {
            steps_per_year: Some(12),
            ..settings()
        };
        assert!(both.validate(true, true).is_err());
        let neither = McEngineSettings {
            steps: None,
            ..settings()
        };
        assert!(neither.validate(true, true).is_err());
        assert!(neither.validate(true, false).is_ok());
    }

    #[test]
    fn samples_and_tolerance_are_exclusive() {
        let both = McEngineSettings {
            tolerance: Some(0.01),
            ..settings()
        };
        assert!(both.validate(true, true).is_err());
        let neither = McEngineSettings {
            required_samples: None,
            ..settings()
        };
        assert!(neither.validate(true, true).is_err());
    }

    #[test]
    fn tolerance_needs_pseudo_random_numbers() {
        let tol = McEngineSettings {
            required_samples: None,
            tolerance: Some(0.01),
            ..settings()
        };
        assert!(tol.validate(PseudoRandomSequence::ALLOWS_ERROR_ESTIMATE, true).is_ok());
        assert!(tol.validate(LowDiscrepancySequence::ALLOWS_ERROR_ESTIMATE, true).is_err());
    }

    #[test]
    fn grid_contains_mandatory_times() {
        let grid = settings().time_grid(&[0.25, 1.0]).unwrap();
        assert!(grid.index(0.25).is_ok());
        assert_eq!(grid.back(), 1.0);

        let bare = McEngineSettings::default().time_grid(&[0.25, 0.5, 0.75, 1.0]).unwrap();
        assert_eq!(bare.steps(), 4);
    }
}
