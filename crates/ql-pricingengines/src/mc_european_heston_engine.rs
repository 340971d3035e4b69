//! Monte Carlo engine for European options under Heston dynamics.

use crate::analytic_heston_engine::HestonParameters;
use crate::context::PricingContext;
use crate::mc_engine::{mc_builder_methods, simulate, DiscountedTerminalSpot, McEngineSettings, SequencePolicy};
use ql_core::{ensure, errors::Result};
use ql_instruments::{ExerciseType, PricingEngine, PricingResults, VanillaOptionArguments};
use ql_math::random_numbers::PseudoRandomSequence;
use ql_methods::monte_carlo::{ControlVariate, EuropeanPathPricer, MonteCarloModel, MultiPathGenerator};
use ql_processes::{HestonDiscretization, StochasticProcess};
use std::marker::PhantomData;
use std::sync::Arc;

/// European option on a simulated Heston process.
///
/// Each step consumes two independent Gaussian draws; the correlation is
/// applied by the process.  The optional control variate is the
/// discounted terminal spot.
#[derive(Debug, Clone)]
pub struct McEuropeanHestonEngine<R = PseudoRandomSequence> {
    params: HestonParameters,
    discretization: HestonDiscretization,
    settings: McEngineSettings,
    _policy: PhantomData<fn() -> R>,
}

impl<R: SequencePolicy> McEuropeanHestonEngine<R> {
    /// Engine with validated parameters and settings.
    pub fn new(
        params: HestonParameters,
        discretization: HestonDiscretization,
        settings: McEngineSettings,
    ) -> Result<Self> {
        params.validate()?;
        settings.validate(R::ALLOWS_ERROR_ESTIMATE, true)?;
        Ok(Self {
            params,
            discretization,
            settings,
            _policy: PhantomData,
        })
    }
}

impl<R: SequencePolicy> PricingEngine<VanillaOptionArguments, PricingContext> for McEuropeanHestonEngine<R> {
    fn calculate(&self, args: &VanillaOptionArguments, context: &PricingContext) -> Result<PricingResults> {
        let args = context.rebase_vanilla(args)?;
        ensure!(
            args.exercise.exercise_type() == ExerciseType::European,
            "not a European option"
        );
        ensure!(args.dividends.is_empty(), "cash dividends are not supported");

        let maturity = args.maturity();
        let grid = self.settings.time_grid(&[maturity])?;
        let process: Arc<dyn StochasticProcess> =
            Arc::new(self.params.process(context)?.with_discretization(self.discretization));
        let rsg = R::make(process.factors() * grid.steps(), self.settings.seed)?;
        let generator = MultiPathGenerator::new(process, grid, rsg, self.settings.brownian_bridge)?;

        let discount = context.risk_free().discount(maturity);
        let pricer = EuropeanPathPricer::new(args.payoff, discount)?;
        let mut model = MonteCarloModel::new(generator, pricer, self.settings.antithetic);
        if self.settings.control_variate {
            let expected = context.spot()? * context.dividend().discount(maturity);
            model = model.with_control_variate(ControlVariate::new(
                Box::new(DiscountedTerminalSpot { discount }),
                expected,
            ));
        }
        simulate(model, &self.settings)
    }
}

/// Builder of [`McEuropeanHestonEngine`].
#[derive(Debug, Clone)]
pub struct MakeMcEuropeanHestonEngine<R = PseudoRandomSequence> {
    params: HestonParameters,
    discretization: HestonDiscretization,
    settings: McEngineSettings,
    _policy: PhantomData<fn() -> R>,
}

impl MakeMcEuropeanHestonEngine {
    /// Builder drawing pseudo-random numbers.
    pub fn new(params: HestonParameters) -> Self {
        Self::with_policy(params)
    }
}

impl<R: SequencePolicy> MakeMcEuropeanHestonEngine<R> {
    /// Builder drawing sequences from the policy `R`.
    pub fn with_policy(params: HestonParameters) -> Self {
        Self {
            params,
            discretization: HestonDiscretization::default(),
            settings: McEngineSettings::default(),
            _policy: PhantomData,
        }
    }

    mc_builder_methods!();

    /// Variance discretization of the process.
    pub fn with_discretization(mut self, discretization: HestonDiscretization) -> Self {
        self.discretization = discretization;
        self
    }

    /// Validate and create the engine.
    pub fn build(self) -> Result<McEuropeanHestonEngine<R>> {
        McEuropeanHestonEngine::new(self.params, self.discretization, self.settings)
    }
}
