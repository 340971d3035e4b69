//! Monte Carlo engine for discretely sampled geometric average-price
//! options.  Mostly useful to validate the closed form and the path
//! machinery on a payoff with a known price.

use crate::context::PricingContext;
use crate::mc_discrete_arithmetic_asian_engine::asian_grid_times;
use crate::mc_engine::{black_scholes_paths, mc_builder_methods, simulate, McEngineSettings, SequencePolicy};
use ql_core::{ensure, errors::Result};
use ql_instruments::{AsianOptionArguments, AverageType, PricingEngine, PricingResults};
use ql_math::random_numbers::PseudoRandomSequence;
use ql_methods::monte_carlo::{AveragePricePathPricer, MonteCarloModel};
use std::marker::PhantomData;
use std::sync::Arc;

/// Geometric average-price engine.
#[derive(Debug, Clone)]
pub struct McDiscreteGeometricAsianEngine<R = PseudoRandomSequence> {
    settings: McEngineSettings,
    _policy: PhantomData<fn() -> R>,
}

impl<R: SequencePolicy> McDiscreteGeometricAsianEngine<R> {
    /// Engine with validated settings.
    pub fn new(settings: McEngineSettings) -> Result<Self> {
        settings.validate(R::ALLOWS_ERROR_ESTIMATE, false)?;
        settings.reject_control_variate("the geometric Asian engine")?;
        Ok(Self {
            settings,
            _policy: PhantomData,
        })
    }
}

impl<R: SequencePolicy> PricingEngine<AsianOptionArguments, PricingContext> for McDiscreteGeometricAsianEngine<R> {
    fn calculate(&self, args: &AsianOptionArguments, context: &PricingContext) -> Result<PricingResults> {
        ensure!(
            args.average_type == AverageType::Geometric,
            "not a geometric average option"
        );
        let args = context.rebase_asian(args)?;
        let grid = self.settings.time_grid(&asian_grid_times(&args))?;
        let generator = black_scholes_paths::<R>(context, Arc::clone(&grid), &self.settings)?;
        let discount = context.risk_free().discount(args.exercise.last_time());
        let pricer = AveragePricePathPricer::new(&args, &grid, discount)?;
        simulate(MonteCarloModel::new(generator, pricer, self.settings.antithetic), &self.settings)
    }
}

/// Builder of [`McDiscreteGeometricAsianEngine`].
#[derive(Debug, Clone)]
pub struct MakeMcDiscreteGeometricAsianEngine<R = PseudoRandomSequence> {
    settings: McEngineSettings,
    _policy: PhantomData<fn() -> R>,
}

impl MakeMcDiscreteGeometricAsianEngine {
    /// Builder drawing pseudo-random numbers.
    pub fn new() -> Self {
        Self::default()
    }
}

impl<R: SequencePolicy> Default for MakeMcDiscreteGeometricAsianEngine<R> {
    fn default() -> Self {
        Self {
            settings: McEngineSettings {
                brownian_bridge: true,
                ..McEngineSettings::default()
            },
            _policy: PhantomData,
        }
    }
}

impl<R: SequencePolicy> MakeMcDiscreteGeometricAsianEngine<R> {
    mc_builder_methods!();

    /// Validate the settings and create the engine.
    pub fn build(self) -> Result<McDiscreteGeometricAsianEngine<R>> {
        McDiscreteGeometricAsianEngine::new(self.settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytic_discrete_geometric_asian_engine::AnalyticDiscreteGeometricAveragePriceAsianEngine;
    use ql_core::{Real, Time};
    use ql_instruments::{Exercise, OptionType, Payoff};
    use ql_termstructures::{BlackConstantVol, FlatForward};

    fn context() -> PricingContext {
        PricingContext::builder()
            .spot(100.0)
            .risk_free(Arc::new(FlatForward::new(0.06)))
            .dividend(Arc::new(FlatForward::new(0.03)))
            .black_vol(Arc::new(BlackConstantVol::new(0.2).unwrap()))
            .build()
            .unwrap()
    }

    #[test]
    fn agrees_with_the_closed_form() {
        let times: Vec<Time> = (1..=10).map(|i| 0.1 * i as Real).collect();
        let args = AsianOptionArguments::new(
            AverageType::Geometric,
            times,
            Payoff::vanilla(OptionType::Put, 100.0),
            Exercise::european(1.0).unwrap(),
        )
        .unwrap();
        let ctx = context();
        let analytic = AnalyticDiscreteGeometricAveragePriceAsianEngine::new()
            .calculate(&args, &ctx)
            .unwrap()
            .value;
        let res = MakeMcDiscreteGeometricAsianEngine::new()
            .with_antithetic_variate(true)
            .with_samples(8191)
            .with_seed(17)
            .build()
            .unwrap()
            .calculate(&args, &ctx)
            .unwrap();
        let error = res.error_estimate.unwrap();
        assert!((res.value - analytic).abs() < 4.0 * error, "{} vs {analytic} ± {error}", res.value);
    }

    #[test]
    fn control_variate_is_not_offered() {
        assert!(MakeMcDiscreteGeometricAsianEngine::new()
            .with_samples(100)
            .with_control_variate(true)
            .build()
            .is_err());
    }
}
