//! Least-squares Monte Carlo engine for American and Bermudan vanilla
//! options.
//!
//! A policy is calibrated on a dedicated set of paths (with its own seed)
//! and then applied to independent pricing paths, which gives a low-biased
//! estimate.  The matching European option, valued in closed form, can
//! serve as control variate, and the dual upper bound can be estimated by
//! nested simulation.

use crate::analytic_european_engine::AnalyticEuropeanEngine;
use crate::context::PricingContext;
use crate::mc_engine::{mc_builder_methods, run_simulation, McEngineSettings, SequencePolicy};
use ql_core::{ensure, errors::Result, BigNatural, DiscountFactor, Size};
use ql_instruments::{Exercise, ExerciseType, PricingEngine, PricingResults, VanillaOptionArguments};
use ql_math::random_numbers::{derived_seed, PseudoRandomSequence};
use ql_methods::monte_carlo::{
    calibration_seed, AmericanPathPricer, ControlVariate, EuropeanPathPricer, LongstaffSchwartzPathPricer,
    LsmBasisType, MonteCarloModel, PathGenerator, PathPricer, UpperBoundEngine, UpperBoundSettings,
    DEFAULT_CALIBRATION_SAMPLES,
};
use ql_processes::StochasticProcess1D;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::debug;

// Stream index of the dual estimator's master seed.
const UPPER_BOUND_STREAM: u64 = 2;

/// Regression settings of the Longstaff-Schwartz calibration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LsmSettings {
    /// Highest polynomial degree of the basis.
    pub polynomial_order: Size,
    /// Polynomial family.
    pub basis_type: LsmBasisType,
    /// Number of calibration paths.
    pub calibration_samples: Size,
    /// Antithetic calibration paths; defaults to the pricing setting.
    pub antithetic_calibration: Option<bool>,
    /// Calibration seed; defaults to a stream derived from the pricing seed.
    pub calibration_seed: Option<BigNatural>,
    /// Estimate the dual upper bound with these settings.
    pub upper_bound: Option<UpperBoundSettings>,
}

impl Default for LsmSettings {
    fn default() -> Self {
        Self {
            polynomial_order: 2,
            basis_type: LsmBasisType::Monomial,
            calibration_samples: DEFAULT_CALIBRATION_SAMPLES,
            antithetic_calibration: None,
            calibration_seed: None,
            upper_bound: None,
        }
    }
}

/// American/Bermudan engine.
///
/// Additional results: `exerciseProbability` (fraction of calibration
/// paths exercised before or at expiry) and, with an upper bound,
/// `upperBound`, `upperBoundErrorEstimate` and `dualityGap`.
#[derive(Debug, Clone)]
pub struct McAmericanEngine<R = PseudoRandomSequence> {
    settings: McEngineSettings,
    lsm: LsmSettings,
    _policy: PhantomData<fn() -> R>,
}

impl<R: SequencePolicy> McAmericanEngine<R> {
    /// Engine with validated settings.
    pub fn new(settings: McEngineSettings, lsm: LsmSettings) -> Result<Self> {
        settings.validate(R::ALLOWS_ERROR_ESTIMATE, true)?;
        ensure!(lsm.polynomial_order > 0, "polynomial order must be positive");
        ensure!(lsm.calibration_samples > 0, "no calibration samples requested");
        Ok(Self {
            settings,
            lsm,
            _policy: PhantomData,
        })
    }

    fn generator(
        &self,
        process: &Arc<dyn StochasticProcess1D>,
        grid: &Arc<ql_methods::TimeGrid>,
        seed: BigNatural,
    ) -> Result<PathGenerator<R>> {
        let rsg = R::make(grid.steps(), seed)?;
        PathGenerator::new(Arc::clone(process), Arc::clone(grid), rsg, self.settings.brownian_bridge)
    }

    // European counterpart on the same paths; None when its closed form
    // does not describe the simulated dynamics
    fn european_control(
        &self,
        args: &VanillaOptionArguments,
        context: &PricingContext,
        discount: DiscountFactor,
    ) -> Result<Option<ControlVariate<ql_methods::Path>>> {
        if context.local_vol().is_some() {
            debug!("local volatility present, European control variate disabled");
            return Ok(None);
        }
        let european = VanillaOptionArguments::new(args.payoff, Exercise::european(args.maturity())?)?;
        let value = AnalyticEuropeanEngine::new().calculate(&european, context)?.value;
        let pricer: Box<dyn PathPricer<ql_methods::Path>> = Box::new(EuropeanPathPricer::new(args.payoff, discount)?);
        Ok(Some(ControlVariate::new(pricer, value)))
    }
}

impl<R: SequencePolicy> PricingEngine<VanillaOptionArguments, PricingContext> for McAmericanEngine<R> {
    fn calculate(&self, args: &VanillaOptionArguments, context: &PricingContext) -> Result<PricingResults> {
        let args = context.rebase_vanilla(args)?;
        ensure!(
            args.exercise.exercise_type() != ExerciseType::European,
            "use a European engine for European exercise"
        );
        ensure!(args.dividends.is_empty(), "cash dividends are not supported");

        let grid = self.settings.time_grid(args.exercise.times())?;
        let process: Arc<dyn StochasticProcess1D> = Arc::new(context.black_scholes_process()?);
        let risk_free = context.risk_free();
        let discounts: Vec<DiscountFactor> = grid.times().iter().map(|&t| risk_free.discount(t)).collect();

        let exerciser = AmericanPathPricer::new(
            args.payoff,
            &args.exercise,
            &grid,
            self.lsm.polynomial_order,
            self.lsm.basis_type,
        )?;
        let seed = self.lsm.calibration_seed.unwrap_or_else(|| calibration_seed(self.settings.seed));
        let mut calibration_paths = self.generator(&process, &grid, seed)?;
        let policy = LongstaffSchwartzPathPricer::calibrate(
            exerciser,
            discounts,
            &mut calibration_paths,
            self.lsm.calibration_samples,
            self.lsm.antithetic_calibration.unwrap_or(self.settings.antithetic),
        )?;
        let exercise_probability = policy.exercise_probability();

        let generator = self.generator(&process, &grid, self.settings.seed)?;
        let mut model = MonteCarloModel::new(generator, policy, self.settings.antithetic);
        if self.settings.control_variate {
            let discount = risk_free.discount(args.maturity());
            if let Some(control) = self.european_control(&args, context, discount)? {
                model = model.with_control_variate(control);
            }
        }
        let (mut results, model) = run_simulation(model, &self.settings)?;
        results.insert("exerciseProbability", exercise_probability);

        if let Some(mut upper) = self.lsm.upper_bound {
            if upper.seed == 0 {
                upper.seed = derived_seed(self.settings.seed, UPPER_BOUND_STREAM);
            }
            let bound = UpperBoundEngine::new(process, model.path_pricer(), grid, upper)?.calculate(results.value)?;
            results.insert("upperBound", bound.upper_bound);
            results.insert("upperBoundErrorEstimate", bound.error_estimate);
            results.insert("dualityGap", bound.duality_gap);
        }
        Ok(results)
    }
}

/// Builder of [`McAmericanEngine`].
#[derive(Debug, Clone)]
pub struct MakeMcAmericanEngine<R = PseudoRandomSequence> {
    settings: McEngineSettings,
    lsm: LsmSettings,
    _policy: PhantomData<fn() -> R>,
}

impl MakeMcAmericanEngine {
    /// Builder drawing pseudo-random numbers.
    pub fn new() -> Self {
        Self::default()
    }
}

impl<R: SequencePolicy> Default for MakeMcAmericanEngine<R> {
    fn default() -> Self {
        Self {
            settings: McEngineSettings::default(),
            lsm: LsmSettings::default(),
            _policy: PhantomData,
        }
    }
}

impl<R: SequencePolicy> MakeMcAmericanEngine<R> {
    mc_builder_methods!();

    /// Polynomial degree of the regression basis.
    pub fn with_polynomial_order(mut self, order: Size) -> Self {
        self.lsm.polynomial_order = order;
        self
    }

    /// Polynomial family of the regression basis.
    pub fn with_basis_system(mut self, basis_type: LsmBasisType) -> Self {
        self.lsm.basis_type = basis_type;
        self
    }

    /// Number of calibration paths.
    pub fn with_calibration_samples(mut self, samples: Size) -> Self {
        self.lsm.calibration_samples = samples;
        self
    }

    /// Antithetic calibration paths.
    pub fn with_antithetic_variate_calibration(mut self, flag: bool) -> Self {
        self.lsm.antithetic_calibration = Some(flag);
        self
    }

    /// Seed of the calibration paths.
    pub fn with_seed_calibration(mut self, seed: BigNatural) -> Self {
        self.lsm.calibration_seed = Some(seed);
        self
    }

    /// Also estimate the dual upper bound.
    pub fn with_upper_bound(mut self, settings: UpperBoundSettings) -> Self {
        self.lsm.upper_bound = Some(settings);
        self
    }

    /// Validate the settings and create the engine.
    pub fn build(self) -> Result<McAmericanEngine<R>> {
        McAmericanEngine::new(self.settings, self.lsm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ql_core::Real;
    use ql_instruments::{OptionType, Payoff};
    use ql_termstructures::{BlackConstantVol, FlatForward};

    // Longstaff & Schwartz (2001), table 1: S=36, K=40, r=6%, σ=20%, T=1
    const AMERICAN: Real = 4.478;
    const EUROPEAN: Real = 3.844;

    fn context() -> PricingContext {
        PricingContext::builder()
            .spot(36.0)
            .risk_free(Arc::new(FlatForward::new(0.06)))
            .black_vol(Arc::new(BlackConstantVol::new(0.2).unwrap()))
            .build()
            .unwrap()
    }

    fn put(exercise: Exercise) -> VanillaOptionArguments {
        VanillaOptionArguments::new(Payoff::vanilla(OptionType::Put, 40.0), exercise).unwrap()
    }

    fn builder() -> MakeMcAmericanEngine {
        MakeMcAmericanEngine::new()
            .with_steps(50)
            .with_antithetic_variate(true)
            .with_samples(8192)
            .with_seed(42)
    }

    #[test]
    fn reproduces_the_longstaff_schwartz_put() {
        let res = builder()
            .build()
            .unwrap()
            .calculate(&put(Exercise::american(0.0, 1.0).unwrap()), &context())
            .unwrap();
        let error = res.error_estimate.unwrap();
        assert!(res.value > EUROPEAN + 0.4, "{}", res.value);
        assert!((res.value - AMERICAN).abs() < 0.06 + 3.0 * error, "{} ± {error}", res.value);
        let p = res.additional_real("exerciseProbability").unwrap();
        assert!(p > 0.0 && p <= 1.0);
    }

    #[test]
    fn european_control_variate_reduces_the_error() {
        let args = put(Exercise::american(0.0, 1.0).unwrap());
        let plain = builder().build().unwrap().calculate(&args, &context()).unwrap();
        let controlled = builder()
            .with_control_variate(true)
            .build()
            .unwrap()
            .calculate(&args, &context())
            .unwrap();
        assert!(controlled.error_estimate.unwrap() < plain.error_estimate.unwrap());
        assert!((controlled.value - plain.value).abs() < 0.1);
    }

    #[test]
    fn bermudan_lies_between_european_and_american() {
        let bermudan = put(Exercise::bermudan(vec![0.25, 0.5, 0.75, 1.0]).unwrap());
        let res = builder()
            .with_basis_system(LsmBasisType::Laguerre)
            .build()
            .unwrap()
            .calculate(&bermudan, &context())
            .unwrap();
        assert!(res.value > EUROPEAN && res.value < AMERICAN + 0.05, "{}", res.value);
    }

    #[test]
    fn upper_bound_brackets_the_policy_value() {
        let res = MakeMcAmericanEngine::new()
            .with_steps(10)
            .with_samples(4096)
            .with_seed(7)
            .with_upper_bound(UpperBoundSettings {
                outer_samples: 128,
                inner_samples: 32,
                seed: 99,
            })
            .build()
            .unwrap()
            .calculate(&put(Exercise::bermudan(vec![0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8, 0.9, 1.0]).unwrap()), &context())
            .unwrap();
        let upper = res.additional_real("upperBound").unwrap();
        let upper_error = res.additional_real("upperBoundErrorEstimate").unwrap();
        assert!(upper + 3.0 * upper_error > res.value, "{upper} vs {}", res.value);
        assert!(res.additional_real("dualityGap").is_some());
    }

    #[test]
    fn european_exercise_is_rejected() {
        let engine = builder().build().unwrap();
        assert!(engine.calculate(&put(Exercise::european(1.0).unwrap()), &context()).is_err());
    }
}
