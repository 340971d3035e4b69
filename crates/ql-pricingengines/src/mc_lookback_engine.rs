//! Monte Carlo engine for discretely monitored lookback options.

use crate::context::PricingContext;
use crate::mc_engine::{black_scholes_paths, mc_builder_methods, simulate, McEngineSettings, SequencePolicy};
use ql_core::errors::Result;
use ql_instruments::{LookbackOptionArguments, PricingEngine, PricingResults};
use ql_math::random_numbers::PseudoRandomSequence;
use ql_methods::monte_carlo::{LookbackPathPricer, MonteCarloModel};
use std::marker::PhantomData;

/// Lookback engine; the extremum is taken over the grid points, so the
/// step setting is the monitoring frequency.
#[derive(Debug, Clone)]
pub struct McLookbackEngine<R = PseudoRandomSequence> {
    settings: McEngineSettings,
    _policy: PhantomData<fn() -> R>,
}

impl<R: SequencePolicy> McLookbackEngine<R> {
    /// Engine with validated settings.
    pub fn new(settings: McEngineSettings) -> Result<Self> {
        settings.validate(R::ALLOWS_ERROR_ESTIMATE, true)?;
        settings.reject_control_variate("the lookback engine")?;
        Ok(Self {
            settings,
            _policy: PhantomData,
        })
    }
}

impl<R: SequencePolicy> PricingEngine<LookbackOptionArguments, PricingContext> for McLookbackEngine<R> {
    fn calculate(&self, args: &LookbackOptionArguments, context: &PricingContext) -> Result<PricingResults> {
        let args = context.rebase_lookback(args)?;
        let maturity = args.exercise.last_time();
        let grid = self.settings.time_grid(&[maturity])?;
        let generator = black_scholes_paths::<R>(context, grid, &self.settings)?;
        let pricer = LookbackPathPricer::new(&args, context.risk_free().discount(maturity))?;
        simulate(MonteCarloModel::new(generator, pricer, self.settings.antithetic), &self.settings)
    }
}

/// Builder of [`McLookbackEngine`].
#[derive(Debug, Clone)]
pub struct MakeMcLookbackEngine<R = PseudoRandomSequence> {
    settings: McEngineSettings,
    _policy: PhantomData<fn() -> R>,
}

impl MakeMcLookbackEngine {
    /// Builder drawing pseudo-random numbers.
    pub fn new() -> Self {
        Self::default()
    }
}

impl<R: SequencePolicy> Default for MakeMcLookbackEngine<R> {
    fn default() -> Self {
        Self {
            settings: McEngineSettings::default(),
            _policy: PhantomData,
        }
    }
}

impl<R: SequencePolicy> MakeMcLookbackEngine<R> {
    mc_builder_methods!();

    /// Validate the settings and create the engine.
    pub fn build(self) -> Result<McLookbackEngine<R>> {
        McLookbackEngine::new(self.settings)
    }
}
