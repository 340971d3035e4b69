//! Monte Carlo engine for discretely sampled arithmetic average-price
//! options, with the geometric average as control variate.

use crate::analytic_discrete_geometric_asian_engine::AnalyticDiscreteGeometricAveragePriceAsianEngine;
use crate::context::PricingContext;
use crate::mc_engine::{black_scholes_paths, mc_builder_methods, simulate, McEngineSettings, SequencePolicy};
use ql_core::{ensure, errors::Result, Time};
use ql_instruments::{AsianOptionArguments, AverageType, PricingEngine, PricingResults};
use ql_math::random_numbers::PseudoRandomSequence;
use ql_methods::monte_carlo::{AveragePricePathPricer, ControlVariate, MonteCarloModel};
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::debug;

/// Mandatory simulation times of an average-price option: the fixings and
/// the payment date.
pub(crate) fn asian_grid_times(args: &AsianOptionArguments) -> Vec<Time> {
    let mut times = args.fixing_times.clone();
    times.push(args.exercise.last_time());
    times
}

/// Arithmetic average-price engine.
///
/// Without a step setting paths are sampled on the fixing times only.
/// The control variate is the same option on the geometric average,
/// valued in closed form; it is only available before the first fixing.
#[derive(Debug, Clone)]
pub struct McDiscreteArithmeticAsianEngine<R = PseudoRandomSequence> {
    settings: McEngineSettings,
    _policy: PhantomData<fn() -> R>,
}

impl<R: SequencePolicy> McDiscreteArithmeticAsianEngine<R> {
    /// Engine with validated settings.
    pub fn new(settings: McEngineSettings) -> Result<Self> {
        settings.validate(R::ALLOWS_ERROR_ESTIMATE, false)?;
        Ok(Self {
            settings,
            _policy: PhantomData,
        })
    }
}

impl<R: SequencePolicy> PricingEngine<AsianOptionArguments, PricingContext> for McDiscreteArithmeticAsianEngine<R> {
    fn calculate(&self, args: &AsianOptionArguments, context: &PricingContext) -> Result<PricingResults> {
        ensure!(
            args.average_type == AverageType::Arithmetic,
            "not an arithmetic average option"
        );
        let args = context.rebase_asian(args)?;
        let grid = self.settings.time_grid(&asian_grid_times(&args))?;
        let generator = black_scholes_paths::<R>(context, Arc::clone(&grid), &self.settings)?;

        let discount = context.risk_free().discount(args.exercise.last_time());
        let pricer = AveragePricePathPricer::new(&args, &grid, discount)?;
        let mut model = MonteCarloModel::new(generator, pricer, self.settings.antithetic);
        if self.settings.control_variate {
            if args.past_fixings == 0 {
                let control = AveragePricePathPricer::with_average_type(&args, AverageType::Geometric, &grid, discount)?;
                let (black, _) = AnalyticDiscreteGeometricAveragePriceAsianEngine::black_calculator(&args, context)?;
                model = model.with_control_variate(ControlVariate::new(Box::new(control), black.value()));
            } else {
                debug!(
                    past_fixings = args.past_fixings,
                    "seasoned average, geometric control variate disabled"
                );
            }
        }
        simulate(model, &self.settings)
    }
}

/// Builder of [`McDiscreteArithmeticAsianEngine`].
#[derive(Debug, Clone)]
pub struct MakeMcDiscreteArithmeticAsianEngine<R = PseudoRandomSequence> {
    settings: McEngineSettings,
    _policy: PhantomData<fn() -> R>,
}

impl MakeMcDiscreteArithmeticAsianEngine {
    /// Builder drawing pseudo-random numbers.
    pub fn new() -> Self {
        Self::default()
    }
}

impl<R: SequencePolicy> Default for MakeMcDiscreteArithmeticAsianEngine<R> {
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

impl<R: SequencePolicy> MakeMcDiscreteArithmeticAsianEngine<R> {
    mc_builder_methods!();

    /// Validate the settings and create the engine.
    pub fn build(self) -> Result<McDiscreteArithmeticAsianEngine<R>> {
        McDiscreteArithmeticAsianEngine::new(self.settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ql_core::Real;
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

    fn asian(average_type: AverageType) -> AsianOptionArguments {
        let times: Vec<Time> = (1..=12).map(|i| i as Real / 12.0).collect();
        AsianOptionArguments::new(
            average_type,
            times,
            Payoff::vanilla(OptionType::Call, 100.0),
            Exercise::european(1.0).unwrap(),
        )
        .unwrap()
    }

    fn engine(control_variate: bool) -> McDiscreteArithmeticAsianEngine {
        MakeMcDiscreteArithmeticAsianEngine::new()
            .with_samples(4095)
            .with_seed(42)
            .with_control_variate(control_variate)
            .build()
            .unwrap()
    }

    #[test]
    fn control_variate_shrinks_the_error_estimate() {
        let ctx = context();
        let plain = engine(false).calculate(&asian(AverageType::Arithmetic), &ctx).unwrap();
        let controlled = engine(true).calculate(&asian(AverageType::Arithmetic), &ctx).unwrap();
        let (e0, e1) = (plain.error_estimate.unwrap(), controlled.error_estimate.unwrap());
        assert!(e1 < 0.2 * e0, "{e1} vs {e0}");
        assert!((plain.value - controlled.value).abs() < 4.0 * e0);
    }

    #[test]
    fn arithmetic_average_dominates_the_geometric_one() {
        let ctx = context();
        let arithmetic = engine(true).calculate(&asian(AverageType::Arithmetic), &ctx).unwrap().value;
        let geometric = AnalyticDiscreteGeometricAveragePriceAsianEngine::new()
            .calculate(&asian(AverageType::Geometric), &ctx)
            .unwrap()
            .value;
        assert!(arithmetic > geometric);
        assert!(arithmetic - geometric < 0.5, "{arithmetic} vs {geometric}");
    }

    #[test]
    fn samples_on_the_fixing_grid() {
        let res = engine(false).calculate(&asian(AverageType::Arithmetic), &context()).unwrap();
        match res.additional("TimeGrid") {
            Some(ql_instruments::ResultValue::Vector(times)) => assert_eq!(times.len(), 13),
            other => panic!("unexpected grid {other:?}"),
        }
    }

    #[test]
    fn seasoned_options_run_without_control() {
        let args = AsianOptionArguments::with_past_fixings(
            AverageType::Arithmetic,
            3.0 * 105.0,
            3,
            vec![0.5, 0.75, 1.0],
            Payoff::vanilla(OptionType::Call, 100.0),
            Exercise::european(1.0).unwrap(),
        )
        .unwrap();
        let res = engine(true).calculate(&args, &context()).unwrap();
        assert!(res.value > 0.0);
    }

    #[test]
    fn geometric_instrument_is_rejected() {
        assert!(engine(false).calculate(&asian(AverageType::Geometric), &context()).is_err());
    }
}
