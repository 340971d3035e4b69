//! Analytic European option engine (Black-Scholes-Merton).
//!
//! Prices European options on any [`Payoff`](ql_instruments::Payoff) with
//! the [`BlackCalculator`].  Cash dividends are handled by the escrowed
//! model: the spot is reduced by the present value of the dividends paid
//! before maturity and the remainder follows the Black dynamics.

use crate::{black_calculator::BlackCalculator, context::PricingContext};
use ql_core::{ensure, errors::Result, Real};
use ql_instruments::{ExerciseType, PricingEngine, PricingResults, VanillaOptionArguments};

/// Analytic pricing engine for European options.
///
/// $$V = D_r(T)\,\big(F\alpha + X\beta\big),\qquad F = (S - PV_{div})\,\frac{D_q(T)}{D_r(T)}$$
///
/// Besides value, delta, gamma and theta the additional results carry
/// `vega`, `rho`, `dividendRho`, `deltaForward` and `itmCashProbability`.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnalyticEuropeanEngine;

impl AnalyticEuropeanEngine {
    /// Create the engine.
    pub fn new() -> Self {
        Self
    }
}

impl PricingEngine<VanillaOptionArguments, PricingContext> for AnalyticEuropeanEngine {
    fn calculate(&self, args: &VanillaOptionArguments, context: &PricingContext) -> Result<PricingResults> {
        let args = context.rebase_vanilla(args)?;
        ensure!(
            args.exercise.exercise_type() == ExerciseType::European,
            "not a European option"
        );
        let maturity = args.maturity();
        let risk_free = context.risk_free();

        let dividend_pv: Real = args
            .dividends
            .iter()
            .filter(|d| d.time <= maturity)
            .map(|d| d.amount * risk_free.discount(d.time))
            .sum();
        let spot = context.spot()? - dividend_pv;
        ensure!(spot > 0.0, "dividends exceed the spot: escrowed spot {spot}");

        let discount = risk_free.discount(maturity);
        let dividend_discount = context.dividend().discount(maturity);
        let forward = spot * dividend_discount / discount;
        let variance = context.black_vol().black_variance(maturity, args.payoff.strike());
        let black = BlackCalculator::new(&args.payoff, forward, variance.sqrt(), discount)?;

        let mut results = PricingResults::from_value(black.value());
        results.delta = Some(black.delta(spot)?);
        results.gamma = Some(black.gamma(spot)?);
        results.theta = Some(black.theta(spot, maturity)?);
        results.insert("vega", black.vega(maturity)?);
        results.insert("rho", black.rho(maturity)?);
        results.insert("dividendRho", black.dividend_rho(maturity)?);
        results.insert("deltaForward", black.delta_forward());
        results.insert("itmCashProbability", black.itm_cash_probability());
        Ok(results)
    }
}
