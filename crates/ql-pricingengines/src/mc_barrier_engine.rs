//! Monte Carlo engine for single-barrier options.
//!
//! The barrier is monitored continuously: between grid points the
//! crossing probability of the Brownian bridge weights each path, so the
//! estimator stays unbiased with coarse grids.

use crate::context::PricingContext;
use crate::mc_engine::{mc_builder_methods, simulate, McEngineSettings, SequencePolicy};
use ql_core::{ensure, errors::Result, DiscountFactor};
use ql_instruments::{BarrierOptionArguments, ExerciseType, PricingEngine, PricingResults};
use ql_math::random_numbers::PseudoRandomSequence;
use ql_methods::monte_carlo::{BarrierPathPricer, MonteCarloModel, PathGenerator};
use ql_processes::StochasticProcess1D;
use std::marker::PhantomData;
use std::sync::Arc;

/// Barrier option engine; a step setting is required.
#[derive(Debug, Clone)]
pub struct McBarrierEngine<R = PseudoRandomSequence> {
    settings: McEngineSettings,
    _policy: PhantomData<fn() -> R>,
}

impl<R: SequencePolicy> McBarrierEngine<R> {
    /// Engine with validated settings.
    pub fn new(settings: McEngineSettings) -> Result<Self> {
        settings.validate(R::ALLOWS_ERROR_ESTIMATE, true)?;
        settings.reject_control_variate("the barrier engine")?;
        Ok(Self {
            settings,
            _policy: PhantomData,
        })
    }
}

impl<R: SequencePolicy> PricingEngine<BarrierOptionArguments, PricingContext> for McBarrierEngine<R> {
    fn calculate(&self, args: &BarrierOptionArguments, context: &PricingContext) -> Result<PricingResults> {
        let args = context.rebase_barrier(args)?;
        ensure!(
            args.exercise.exercise_type() == ExerciseType::European,
            "not a European option"
        );
        let spot = context.spot()?;
        ensure!(!args.barrier_type.is_triggered(spot, args.barrier), "barrier touched");

        let grid = self.settings.time_grid(&[args.exercise.last_time()])?;
        let process: Arc<dyn StochasticProcess1D> = Arc::new(context.black_scholes_process()?);
        let risk_free = context.risk_free();
        let discounts: Vec<DiscountFactor> = grid.times().iter().map(|&t| risk_free.discount(t)).collect();
        let pricer = BarrierPathPricer::new(&args, discounts, Arc::clone(&process))?;

        let rsg = R::make(grid.steps(), self.settings.seed)?;
        let generator = PathGenerator::new(process, grid, rsg, self.settings.brownian_bridge)?;
        simulate(MonteCarloModel::new(generator, pricer, self.settings.antithetic), &self.settings)
    }
}

/// Builder of [`McBarrierEngine`].
#[derive(Debug, Clone)]
pub struct MakeMcBarrierEngine<R = PseudoRandomSequence> {
    settings: McEngineSettings,
    _policy: PhantomData<fn() -> R>,
}

impl MakeMcBarrierEngine {
    /// Builder drawing pseudo-random numbers.
    pub fn new() -> Self {
        Self::default()
    }
}

impl<R: SequencePolicy> Default for MakeMcBarrierEngine<R> {
    fn default() -> Self {
        Self {
            settings: McEngineSettings::default(),
            _policy: PhantomData,
        }
    }
}

impl<R: SequencePolicy> MakeMcBarrierEngine<R> {
    mc_builder_methods!();

    /// Validate the settings and create the engine.
    pub fn build(self) -> Result<McBarrierEngine<R>> {
        McBarrierEngine::new(self.settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytic_barrier_engine::AnalyticBarrierEngine;
    use ql_core::Real;
    use ql_instruments::{BarrierType, Exercise, OptionType, Payoff};
    use ql_termstructures::{BlackConstantVol, FlatForward};

    fn context(spot: Real) -> PricingContext {
        PricingContext::builder()
            .spot(spot)
            .risk_free(Arc::new(FlatForward::new(0.08)))
            .dividend(Arc::new(FlatForward::new(0.04)))
            .black_vol(Arc::new(BlackConstantVol::new(0.25).unwrap()))
            .build()
            .unwrap()
    }

    fn barrier(barrier_type: BarrierType, level: Real, rebate: Real) -> BarrierOptionArguments {
        BarrierOptionArguments::new(
            Payoff::vanilla(OptionType::Call, 90.0),
            Exercise::european(0.5).unwrap(),
            barrier_type,
            level,
            rebate,
        )
        .unwrap()
    }

    fn engine() -> McBarrierEngine {
        MakeMcBarrierEngine::new()
            .with_steps(20)
            .with_antithetic_variate(true)
            .with_samples(20_000)
            .with_seed(5)
            .build()
            .unwrap()
    }

    #[test]
    fn continuous_monitoring_matches_the_closed_form() {
        let ctx = context(100.0);
        for (barrier_type, level, rebate) in [
            (BarrierType::DownOut, 95.0, 3.0),
            (BarrierType::DownIn, 95.0, 3.0),
            (BarrierType::UpOut, 105.0, 3.0),
        ] {
            let args = barrier(barrier_type, level, rebate);
            let analytic = AnalyticBarrierEngine::new().calculate(&args, &ctx).unwrap().value;
            let res = engine().calculate(&args, &ctx).unwrap();
            let error = res.error_estimate.unwrap();
            assert!(
                (res.value - analytic).abs() < 4.0 * error + 0.02,
                "{barrier_type:?}: {} vs {analytic} ± {error}",
                res.value
            );
        }
    }

    #[test]
    fn touched_barrier_is_rejected() {
        let args = barrier(BarrierType::DownOut, 95.0, 0.0);
        assert!(engine().calculate(&args, &context(94.0)).is_err());
    }

    #[test]
    fn steps_are_required() {
        assert!(MakeMcBarrierEngine::new().with_samples(1000).build().is_err());
    }
}
