//! Analytic barrier option engine.
//!
//! Prices continuously monitored single-barrier European options on a
//! plain vanilla payoff with the Reiner-Rubinstein (1991) formulas, as
//! tabulated in Haug, "The Complete Guide to Option Pricing Formulas".

use crate::context::PricingContext;
use ql_core::{ensure, errors::Result, fail, Real, Time};
use ql_instruments::{BarrierOptionArguments, BarrierType, OptionType, Payoff, PricingEngine, PricingResults};
use ql_math::normal_cdf;

/// Analytic barrier option engine (Reiner-Rubinstein).
///
/// The rebate of a knock-out option is paid when the barrier is hit; the
/// rebate of a knock-in option is paid at expiry if the barrier was never
/// hit.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnalyticBarrierEngine;

impl AnalyticBarrierEngine {
    /// Create the engine.
    pub fn new() -> Self {
        Self
    }
}

// Barrier value from the A..F building blocks; `r`, `q` and `sigma` are
// the flat equivalents over `t`.
#[allow(clippy::too_many_arguments)]
fn reiner_rubinstein(
    option_type: OptionType,
    barrier_type: BarrierType,
    spot: Real,
    strike: Real,
    barrier: Real,
    rebate: Real,
    r: Real,
    q: Real,
    sigma: Real,
    t: Time,
) -> Real {
    let sigma2 = sigma * sigma;
    let sqrt_t = t.sqrt();
    let mu = (r - q - 0.5 * sigma2) / sigma2;
    let lambda = (mu * mu * sigma2 + 2.0 * r).sqrt() / sigma;
    let z = (barrier / spot).ln() / (sigma * sqrt_t) + lambda * sigma * sqrt_t;

    let phi = option_type.sign(); // +1 call, -1 put
    let eta = match barrier_type {
        BarrierType::DownIn | BarrierType::DownOut => 1.0,
        BarrierType::UpIn | BarrierType::UpOut => -1.0,
    };

    let x1 = (spot / strike).ln() / (sigma * sqrt_t) + (1.0 + mu) * sigma * sqrt_t;
    let x2 = (spot / barrier).ln() / (sigma * sqrt_t) + (1.0 + mu) * sigma * sqrt_t;
    let y1 =
        (barrier * barrier / (spot * strike)).ln() / (sigma * sqrt_t) + (1.0 + mu) * sigma * sqrt_t;
    let y2 = (barrier / spot).ln() / (sigma * sqrt_t) + (1.0 + mu) * sigma * sqrt_t;

    let df_r = (-r * t).exp();
    let df_q = (-q * t).exp();

    // Components A through F from Reiner-Rubinstein
    let a = phi * spot * df_q * normal_cdf(phi * x1)
        - phi * strike * df_r * normal_cdf(phi * x1 - phi * sigma * sqrt_t);

    let b = phi * spot * df_q * normal_cdf(phi * x2)
        - phi * strike * df_r * normal_cdf(phi * x2 - phi * sigma * sqrt_t);

    let c = phi * spot * df_q * (barrier / spot).powf(2.0 * (mu + 1.0)) * normal_cdf(eta * y1)
        - phi
            * strike
            * df_r
            * (barrier / spot).powf(2.0 * mu)
            * normal_cdf(eta * y1 - eta * sigma * sqrt_t);

    let d = phi * spot * df_q * (barrier / spot).powf(2.0 * (mu + 1.0)) * normal_cdf(eta * y2)
        - phi
            * strike
            * df_r
            * (barrier / spot).powf(2.0 * mu)
            * normal_cdf(eta * y2 - eta * sigma * sqrt_t);

    let e = rebate
        * df_r
        * (normal_cdf(eta * x2 - eta * sigma * sqrt_t)
            - (barrier / spot).powf(2.0 * mu) * normal_cdf(eta * y2 - eta * sigma * sqrt_t));

    let f = rebate
        * ((barrier / spot).powf(mu + lambda) * normal_cdf(eta * z)
            + (barrier / spot).powf(mu - lambda)
                * normal_cdf(eta * z - 2.0 * eta * lambda * sigma * sqrt_t));

    // Combine based on barrier type and option type
    match (barrier_type, option_type) {
        // Down-and-in
        (BarrierType::DownIn, OptionType::Call) if strike >= barrier => c + e,
        (BarrierType::DownIn, OptionType::Call) => a - b + d + e,
        (BarrierType::DownIn, OptionType::Put) if strike >= barrier => b - c + d + e,
        (BarrierType::DownIn, OptionType::Put) => a + e,

        // Up-and-in
        (BarrierType::UpIn, OptionType::Call) if strike >= barrier => a + e,
        (BarrierType::UpIn, OptionType::Call) => b - c + d + e,
        (BarrierType::UpIn, OptionType::Put) if strike >= barrier => a - b + d + e,
        (BarrierType::UpIn, OptionType::Put) => c + e,

        // Down-and-out (= vanilla - down-and-in)
        (BarrierType::DownOut, OptionType::Call) if strike >= barrier => a - c + f,
        (BarrierType::DownOut, OptionType::Call) => b - d + f,
        (BarrierType::DownOut, OptionType::Put) if strike >= barrier => a - b + c - d + f,
        (BarrierType::DownOut, OptionType::Put) => f,

        // Up-and-out
        (BarrierType::UpOut, OptionType::Call) if strike >= barrier => f,
        (BarrierType::UpOut, OptionType::Call) => a - b + c - d + f,
        (BarrierType::UpOut, OptionType::Put) if strike >= barrier => b - d + f,
        (BarrierType::UpOut, OptionType::Put) => a - c + f,
    }
}

impl PricingEngine<BarrierOptionArguments, PricingContext> for AnalyticBarrierEngine {
    fn calculate(&self, args: &BarrierOptionArguments, context: &PricingContext) -> Result<PricingResults> {
        let args = context.rebase_barrier(args)?;
        let Payoff::PlainVanilla { option_type, strike } = args.payoff else {
            fail!("non-plain payoff given: {}", args.payoff.name());
        };
        ensure!(strike > 0.0, "strike must be positive");
        let spot = context.spot()?;
        ensure!(spot > 0.0, "negative or null underlying given");
        ensure!(
            !args.barrier_type.is_triggered(spot, args.barrier),
            "barrier touched: spot {spot}, barrier {}",
            args.barrier
        );

        let t = args.exercise.last_time();
        let r = -context.risk_free().discount(t).ln() / t;
        let q = -context.dividend().discount(t).ln() / t;
        let sigma = context.black_vol().black_vol(t, strike);
        ensure!(sigma > 0.0, "positive volatility required, got {sigma}");

        Ok(PricingResults::from_value(reiner_rubinstein(
            option_type,
            args.barrier_type,
            spot,
            strike,
            args.barrier,
            args.rebate,
            r,
            q,
            sigma,
            t,
        )))
    }
}
