//! Monte Carlo engine for European options under Black-Scholes dynamics.

use crate::context::PricingContext;
use crate::mc_engine::{
    black_scholes_paths, mc_builder_methods, simulate, DiscountedTerminalSpot, McEngineSettings, SequencePolicy,
};
use ql_core::{ensure, errors::Result};
use ql_instruments::{ExerciseType, PricingEngine, PricingResults, VanillaOptionArguments};
use ql_math::random_numbers::PseudoRandomSequence;
use ql_methods::monte_carlo::{ControlVariate, EuropeanPathPricer, MonteCarloModel};
use std::marker::PhantomData;

/// European option priced by simulating the (local-volatility aware)
/// Black-Scholes process.  The control variate is the discounted terminal
/// spot.
#[derive(Debug, Clone)]
pub struct McEuropeanEngine<R = PseudoRandomSequence> {
    settings: McEngineSettings,
    _policy: PhantomData<fn() -> R>,
}

impl<R: SequencePolicy> McEuropeanEngine<R> {
    /// Engine with validated settings.
    pub fn new(settings: McEngineSettings) -> Result<Self> {
        settings.validate(R::ALLOWS_ERROR_ESTIMATE, true)?;
        Ok(Self {
            settings,
            _policy: PhantomData,
        })
    }

    /// The settings.
    pub fn settings(&self) -> &McEngineSettings {
        &self.settings
    }
}

impl<R: SequencePolicy> PricingEngine<VanillaOptionArguments, PricingContext> for McEuropeanEngine<R> {
    fn calculate(&self, args: &VanillaOptionArguments, context: &PricingContext) -> Result<PricingResults> {
        let args = context.rebase_vanilla(args)?;
        ensure!(
            args.exercise.exercise_type() == ExerciseType::European,
            "not a European option"
        );
        ensure!(args.dividends.is_empty(), "cash dividends are not supported");

        let maturity = args.maturity();
        let grid = self.settings.time_grid(&[maturity])?;
        let generator = black_scholes_paths::<R>(context, grid, &self.settings)?;

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

/// Builder of [`McEuropeanEngine`].
#[derive(Debug, Clone)]
pub struct MakeMcEuropeanEngine<R = PseudoRandomSequence> {
    settings: McEngineSettings,
    _policy: PhantomData<fn() -> R>,
}

impl MakeMcEuropeanEngine {
    /// Builder drawing pseudo-random numbers.
    pub fn new() -> Self {
        Self::default()
    }
}

impl<R: SequencePolicy> Default for MakeMcEuropeanEngine<R> {
    fn default() -> Self {
        Self {
            settings: McEngineSettings::default(),
            _policy: PhantomData,
        }
    }
}

impl<R: SequencePolicy> MakeMcEuropeanEngine<R> {
    mc_builder_methods!();

    /// Validate the settings and create the engine.
    pub fn build(self) -> Result<McEuropeanEngine<R>> {
        McEuropeanEngine::new(self.settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytic_european_engine::AnalyticEuropeanEngine;
    use ql_instruments::{Exercise, OptionType, Payoff};
    use ql_math::random_numbers::LowDiscrepancySequence;
    use ql_termstructures::{BlackConstantVol, FlatForward};
    use std::sync::Arc;

    fn context() -> PricingContext {
        PricingContext::builder()
            .spot(100.0)
            .risk_free(Arc::new(FlatForward::new(0.05)))
            .dividend(Arc::new(FlatForward::new(0.02)))
            .black_vol(Arc::new(BlackConstantVol::new(0.25).unwrap()))
            .build()
            .unwrap()
    }

    fn call() -> VanillaOptionArguments {
        VanillaOptionArguments::new(Payoff::vanilla(OptionType::Call, 105.0), Exercise::european(1.0).unwrap())
            .unwrap()
    }

    #[test]
    fn converges_to_the_analytic_value() {
        let ctx = context();
        let reference = AnalyticEuropeanEngine::new().calculate(&call(), &ctx).unwrap().value;
        let res = MakeMcEuropeanEngine::new()
            .with_steps(1)
            .with_antithetic_variate(true)
            .with_samples(20_000)
            .with_seed(42)
            .build()
            .unwrap()
            .calculate(&call(), &ctx)
            .unwrap();
        let error = res.error_estimate.unwrap();
        assert!((res.value - reference).abs() < 4.0 * error, "{} vs {reference} ± {error}", res.value);
        assert_eq!(res.additional_real("samples"), Some(20_000.0));
        assert!(matches!(res.additional("TimeGrid"), Some(ql_instruments::ResultValue::Vector(v)) if v.len() == 2));
    }

    #[test]
    fn control_variate_reduces_the_error() {
        let ctx = context();
        let plain = MakeMcEuropeanEngine::new()
            .with_steps(1)
            .with_samples(5000)
            .with_seed(7)
            .build()
            .unwrap()
            .calculate(&call(), &ctx)
            .unwrap();
        let controlled = MakeMcEuropeanEngine::new()
            .with_steps(1)
            .with_samples(5000)
            .with_seed(7)
            .with_control_variate(true)
            .build()
            .unwrap()
            .calculate(&call(), &ctx)
            .unwrap();
        assert!(controlled.error_estimate.unwrap() < plain.error_estimate.unwrap());
    }

    #[test]
    fn tolerance_mode_converges() {
        let res = MakeMcEuropeanEngine::new()
            .with_steps(1)
            .with_absolute_tolerance(0.05)
            .with_seed(3)
            .build()
            .unwrap()
            .calculate(&call(), &context())
            .unwrap();
        assert!(res.error_estimate.unwrap() <= 0.05);
        assert!(matches!(res.additional("mcStatus"), Some(ql_instruments::ResultValue::Text(s)) if s.as_str() == "Converged"));
    }

    #[test]
    fn sobol_sequences_reject_a_tolerance() {
        assert!(MakeMcEuropeanEngine::<LowDiscrepancySequence>::default()
            .with_steps(1)
            .with_absolute_tolerance(0.05)
            .build()
            .is_err());

        let res = MakeMcEuropeanEngine::<LowDiscrepancySequence>::default()
            .with_steps(1)
            .with_samples(4095)
            .build()
            .unwrap()
            .calculate(&call(), &context())
            .unwrap();
        let reference = AnalyticEuropeanEngine::new().calculate(&call(), &context()).unwrap().value;
        assert!(res.error_estimate.is_none());
        assert!((res.value - reference).abs() < 0.1, "{} vs {reference}", res.value);
    }

    #[test]
    fn step_settings_are_validated() {
        assert!(MakeMcEuropeanEngine::new().with_samples(100).build().is_err());
        assert!(MakeMcEuropeanEngine::new()
            .with_steps(10)
            .with_steps_per_year(10)
            .with_samples(100)
            .build()
            .is_err());
    }
}
