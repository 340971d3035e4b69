//! Closed form for discretely sampled geometric average-price options.
//!
//! Under Black-Scholes dynamics the log of the geometric average of the
//! fixings is Gaussian, so the option is a Black option on the "forward"
//! of the average.  With `m` past fixings (product `A`) and future fixings
//! `t_0 < … < t_{n−1}`, `N = m + n`:
//!
//! $$\mathbb{E}[\ln G] = \frac{\ln A}{N} + \frac1N\sum_j \ln F(t_j) - \frac{\sigma^2}{2N}\sum_j t_j,
//! \qquad \operatorname{Var}[\ln G] = \frac{\sigma^2}{N^2}\Big(\sum_j t_j + 2\sum_{j<k} t_j\Big)$$

use crate::{black_calculator::BlackCalculator, context::PricingContext};
use ql_core::{ensure, errors::Result, Real, Time};
use ql_instruments::{AsianOptionArguments, AverageType, PricingEngine, PricingResults};

/// Analytic engine for geometric average-price Asian options.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnalyticDiscreteGeometricAveragePriceAsianEngine;

impl AnalyticDiscreteGeometricAveragePriceAsianEngine {
    /// Create the engine.
    pub fn new() -> Self {
        Self
    }

    /// Black calculator on the forward of the geometric average of already
    /// rebased `args`, together with `∂F/∂S`.  An arithmetic instrument is
    /// averaged geometrically, which makes it the control of the
    /// arithmetic engine.
    pub(crate) fn black_calculator(
        args: &AsianOptionArguments,
        context: &PricingContext,
    ) -> Result<(BlackCalculator, Real)> {
        let spot = context.spot()?;
        let maturity = args.exercise.last_time();
        let (running_log, past) = match args.average_type {
            AverageType::Geometric => (args.running_accumulator.ln(), args.past_fixings),
            AverageType::Arithmetic => {
                ensure!(
                    args.past_fixings == 0,
                    "geometric value of a seasoned arithmetic average is undefined"
                );
                (0.0, 0)
            }
        };
        let times: &[Time] = &args.fixing_times;
        let n = times.len();
        let total = (past + n) as Real;

        let vol = context.black_vol().black_vol(maturity, args.payoff.strike());
        let time_sum: Time = times.iter().sum();
        // Σ_{j<k} t_j, each t_j paired with the n−1−j later fixings
        let cross: Time = times
            .iter()
            .enumerate()
            .map(|(j, &t)| t * (n - 1 - j) as Real)
            .sum();
        let variance = vol * vol / (total * total) * (time_sum + 2.0 * cross);

        let risk_free = context.risk_free();
        let dividend = context.dividend();
        let log_forwards: Real = times
            .iter()
            .map(|&t| (spot * dividend.discount(t) / risk_free.discount(t)).ln())
            .sum();
        let mean_log = running_log / total + log_forwards / total - 0.5 * vol * vol * time_sum / total;
        let forward = (mean_log + 0.5 * variance).exp();

        let black = BlackCalculator::new(&args.payoff, forward, variance.sqrt(), risk_free.discount(maturity))?;
        let weight = n as Real / total;
        Ok((black, forward * weight / spot))
    }
}

impl PricingEngine<AsianOptionArguments, PricingContext> for AnalyticDiscreteGeometricAveragePriceAsianEngine {
    fn calculate(&self, args: &AsianOptionArguments, context: &PricingContext) -> Result<PricingResults> {
        ensure!(
            args.average_type == AverageType::Geometric,
            "not a geometric average option"
        );
        let args = context.rebase_asian(args)?;
        let spot = context.spot()?;
        let (black, dforward_dspot) = Self::black_calculator(&args, context)?;

        let weight = args.fixing_times.len() as Real / (args.past_fixings + args.fixing_times.len()) as Real;
        let mut results = PricingResults::from_value(black.value());
        results.delta = Some(black.delta_forward() * dforward_dspot);
        results.gamma = Some(
            black.gamma_forward() * dforward_dspot * dforward_dspot
                + black.delta_forward() * black.forward() * weight * (weight - 1.0) / (spot * spot),
        );
        results.insert("forward", black.forward());
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytic_european_engine::AnalyticEuropeanEngine;
    use approx::assert_abs_diff_eq;
    use ql_instruments::{Exercise, OptionType, Payoff, VanillaOptionArguments};
    use ql_termstructures::{BlackConstantVol, FlatForward};
    use std::sync::Arc;

    fn context(spot: Real) -> PricingContext {
        PricingContext::builder()
            .spot(spot)
            .risk_free(Arc::new(FlatForward::new(0.06)))
            .dividend(Arc::new(FlatForward::new(0.03)))
            .black_vol(Arc::new(BlackConstantVol::new(0.2).unwrap()))
            .build()
            .unwrap()
    }

    fn asian(option_type: OptionType, times: Vec<Time>) -> AsianOptionArguments {
        let expiry = *times.last().unwrap();
        AsianOptionArguments::new(
            AverageType::Geometric,
            times,
            Payoff::vanilla(option_type, 100.0),
            Exercise::european(expiry).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn single_fixing_is_a_european_option() {
        let ctx = context(100.0);
        let engine = AnalyticDiscreteGeometricAveragePriceAsianEngine::new();
        let value = engine.calculate(&asian(OptionType::Call, vec![1.0]), &ctx).unwrap().value;
        let european = AnalyticEuropeanEngine::new()
            .calculate(
                &VanillaOptionArguments::new(Payoff::vanilla(OptionType::Call, 100.0), Exercise::european(1.0).unwrap())
                    .unwrap(),
                &ctx,
            )
            .unwrap()
            .value;
        assert_abs_diff_eq!(value, european, epsilon = 1e-10);
    }

    #[test]
    fn ten_fixing_put() {
        let times: Vec<Time> = (1..=10).map(|i| 0.1 * i as Real).collect();
        let res = AnalyticDiscreteGeometricAveragePriceAsianEngine::new()
            .calculate(&asian(OptionType::Put, times), &context(100.0))
            .unwrap();
        assert_abs_diff_eq!(res.value, 4.091190606, epsilon = 1e-6);
    }

    #[test]
    fn averaging_lowers_the_call_value() {
        let ctx = context(100.0);
        let engine = AnalyticDiscreteGeometricAveragePriceAsianEngine::new();
        let single = engine.calculate(&asian(OptionType::Call, vec![1.0]), &ctx).unwrap().value;
        let averaged = engine
            .calculate(&asian(OptionType::Call, vec![0.25, 0.5, 0.75, 1.0]), &ctx)
            .unwrap()
            .value;
        assert!(averaged < single);
    }

    #[test]
    fn delta_and_gamma_match_bumped_values() {
        let args = asian(OptionType::Call, vec![0.0, 0.5, 1.0]);
        let engine = AnalyticDiscreteGeometricAveragePriceAsianEngine::new();
        let h = 0.01;
        let res = engine.calculate(&args, &context(100.0)).unwrap();
        let up = engine.calculate(&args, &context(100.0 + h)).unwrap().value;
        let down = engine.calculate(&args, &context(100.0 - h)).unwrap().value;
        assert_abs_diff_eq!(res.delta.unwrap(), (up - down) / (2.0 * h), epsilon = 1e-6);
        assert_abs_diff_eq!(res.gamma.unwrap(), (up - 2.0 * res.value + down) / (h * h), epsilon = 1e-4);
    }

    #[test]
    fn seasoned_option_uses_the_running_product() {
        let ctx = context(100.0);
        let engine = AnalyticDiscreteGeometricAveragePriceAsianEngine::new();
        let fresh = asian(OptionType::Call, vec![0.5, 1.0]);
        let high = AsianOptionArguments::with_past_fixings(
            AverageType::Geometric,
            120.0 * 120.0,
            2,
            vec![0.5, 1.0],
            Payoff::vanilla(OptionType::Call, 100.0),
            Exercise::european(1.0).unwrap(),
        )
        .unwrap();
        let v_fresh = engine.calculate(&fresh, &ctx).unwrap().value;
        let v_high = engine.calculate(&high, &ctx).unwrap().value;
        assert!(v_high > v_fresh, "{v_high} vs {v_fresh}");

        // N = 4: ln G ~ N(m, v) with the two known fixings entering m only
        let vol2 = 0.04;
        let m = (120.0_f64 * 120.0).ln() / 4.0
            + [0.5, 1.0].iter().map(|&t: &Real| 100.0_f64.ln() + 0.03 * t).sum::<Real>() / 4.0
            - 0.5 * vol2 * 1.5 / 4.0;
        let v = vol2 / 16.0 * (1.5 + 2.0 * 0.5);
        let expected = BlackCalculator::new(
            &Payoff::vanilla(OptionType::Call, 100.0),
            (m + 0.5 * v).exp(),
            v.sqrt(),
            (-0.06_f64).exp(),
        )
        .unwrap()
        .value();
        assert_abs_diff_eq!(v_high, expected, epsilon = 1e-10);
        assert!(v_high > 10.0 && v_high < 10.2, "{v_high}");
    }

    #[test]
    fn arithmetic_average_is_rejected() {
        let args = AsianOptionArguments::new(
            AverageType::Arithmetic,
            vec![0.5, 1.0],
            Payoff::vanilla(OptionType::Call, 100.0),
            Exercise::european(1.0).unwrap(),
        )
        .unwrap();
        assert!(AnalyticDiscreteGeometricAveragePriceAsianEngine::new()
            .calculate(&args, &context(100.0))
            .is_err());
    }
}
