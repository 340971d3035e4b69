//! Market context passed explicitly to every engine.
//!
//! A [`PricingContext`] bundles the spot quote, the two yield curves and
//! the volatility surfaces.  Term structures are quoted from the
//! evaluation instant; instrument times are read on the same clock, so an
//! evaluation time `t₀ > 0` ages every instrument by `t₀` before pricing.

use ql_core::{ensure, errors::Result, fail, Real, Time};
use ql_instruments::{
    AsianOptionArguments, BarrierOptionArguments, Exercise, ExerciseType, LookbackOptionArguments,
    VanillaOptionArguments,
};
use ql_processes::GeneralizedBlackScholesProcess;
use ql_quotes::{Quote, SimpleQuote};
use ql_termstructures::{BlackVolTermStructure, LocalVolTermStructure, YieldTermStructure};
use std::sync::Arc;

/// Spot, curves and volatilities for one valuation.
#[derive(Debug, Clone)]
pub struct PricingContext {
    spot: Arc<SimpleQuote>,
    risk_free: Arc<dyn YieldTermStructure>,
    dividend: Arc<dyn YieldTermStructure>,
    black_vol: Arc<dyn BlackVolTermStructure>,
    local_vol: Option<Arc<dyn LocalVolTermStructure>>,
    evaluation_time: Time,
}

impl PricingContext {
    /// Start building a context.
    pub fn builder() -> PricingContextBuilder {
        PricingContextBuilder::default()
    }

    /// The spot quote; mutating it notifies registered caches.
    pub fn spot_quote(&self) -> &Arc<SimpleQuote> {
        &self.spot
    }

    /// Current spot value.
    pub fn spot(&self) -> Result<Real> {
        self.spot.try_value()
    }

    /// Risk-free curve.
    pub fn risk_free(&self) -> &Arc<dyn YieldTermStructure> {
        &self.risk_free
    }

    /// Dividend curve.
    pub fn dividend(&self) -> &Arc<dyn YieldTermStructure> {
        &self.dividend
    }

    /// Black volatility surface.
    pub fn black_vol(&self) -> &Arc<dyn BlackVolTermStructure> {
        &self.black_vol
    }

    /// Local volatility surface, if one was given.
    pub fn local_vol(&self) -> Option<&Arc<dyn LocalVolTermStructure>> {
        self.local_vol.as_ref()
    }

    /// The evaluation instant on the instrument clock.
    pub fn evaluation_time(&self) -> Time {
        self.evaluation_time
    }

    /// A copy of the context with a different spot quote.
    pub fn with_spot_quote(&self, spot: Arc<SimpleQuote>) -> Self {
        Self { spot, ..self.clone() }
    }

    /// Black-Scholes process at the current spot.  The local volatility
    /// surface is attached when present.
    pub fn black_scholes_process(&self) -> Result<GeneralizedBlackScholesProcess> {
        let process = GeneralizedBlackScholesProcess::new(
            self.spot()?,
            Arc::clone(&self.risk_free),
            Arc::clone(&self.dividend),
            Arc::clone(&self.black_vol),
        )?;
        Ok(match &self.local_vol {
            Some(lv) => process.with_local_vol(Arc::clone(lv)),
            None => process,
        })
    }

    /// Black-Scholes process ignoring any local volatility surface.
    pub fn black_process(&self) -> Result<GeneralizedBlackScholesProcess> {
        GeneralizedBlackScholesProcess::new(
            self.spot()?,
            Arc::clone(&self.risk_free),
            Arc::clone(&self.dividend),
            Arc::clone(&self.black_vol),
        )
    }

    /// Time from the evaluation instant to `t`.
    pub fn residual_time(&self, t: Time) -> Time {
        t - self.evaluation_time
    }

    /// Exercise schedule seen from the evaluation instant.  Past Bermudan
    /// dates are dropped; an American window already open starts now.
    pub fn rebase_exercise(&self, exercise: &Exercise) -> Result<Exercise> {
        let last = self.residual_time(exercise.last_time());
        ensure!(last > 0.0, "option expired at {} (evaluation time {})", exercise.last_time(), self.evaluation_time);
        if self.evaluation_time == 0.0 {
            return Ok(exercise.clone());
        }
        match exercise.exercise_type() {
            ExerciseType::European => Exercise::european(last),
            ExerciseType::American => {
                let earliest = self.residual_time(exercise.times()[0]).max(0.0);
                Exercise::american(earliest, last)
            }
            ExerciseType::Bermudan => {
                let times: Vec<Time> = exercise
                    .times()
                    .iter()
                    .map(|&t| self.residual_time(t))
                    .filter(|&t| t > 0.0)
                    .collect();
                Exercise::bermudan(times)
            }
        }
    }

    /// Vanilla arguments seen from the evaluation instant; paid dividends
    /// are dropped.
    pub fn rebase_vanilla(&self, args: &VanillaOptionArguments) -> Result<VanillaOptionArguments> {
        let rebased = VanillaOptionArguments::new(args.payoff, self.rebase_exercise(&args.exercise)?)?;
        let mut dividends = Vec::with_capacity(args.dividends.len());
        for d in &args.dividends {
            let t = self.residual_time(d.time);
            if t > 0.0 {
                dividends.push(ql_instruments::CashDividend::new(t, d.amount)?);
            }
        }
        Ok(rebased.with_dividends(dividends))
    }

    /// Barrier arguments seen from the evaluation instant.
    pub fn rebase_barrier(&self, args: &BarrierOptionArguments) -> Result<BarrierOptionArguments> {
        BarrierOptionArguments::new(
            args.payoff,
            self.rebase_exercise(&args.exercise)?,
            args.barrier_type,
            args.barrier,
            args.rebate,
        )
    }

    /// Asian arguments seen from the evaluation instant.  Fixings before
    /// the evaluation instant must already be in the running accumulator.
    pub fn rebase_asian(&self, args: &AsianOptionArguments) -> Result<AsianOptionArguments> {
        let times: Vec<Time> = args.fixing_times.iter().map(|&t| self.residual_time(t)).collect();
        if let Some(&first) = times.first() {
            if first < 0.0 {
                fail!("fixing at {} precedes the evaluation time {}", args.fixing_times[0], self.evaluation_time);
            }
        }
        AsianOptionArguments::with_past_fixings(
            args.average_type,
            args.running_accumulator,
            args.past_fixings,
            times,
            args.payoff,
            self.rebase_exercise(&args.exercise)?,
        )
    }

    /// Lookback arguments seen from the evaluation instant.
    pub fn rebase_lookback(&self, args: &LookbackOptionArguments) -> Result<LookbackOptionArguments> {
        let mut rebased = LookbackOptionArguments::new(args.kind, self.rebase_exercise(&args.exercise)?)?;
        rebased.running_extremum = args.running_extremum;
        Ok(rebased)
    }
}

/// Builder of [`PricingContext`].
#[derive(Debug, Default)]
pub struct PricingContextBuilder {
    spot: Option<Arc<SimpleQuote>>,
    risk_free: Option<Arc<dyn YieldTermStructure>>,
    dividend: Option<Arc<dyn YieldTermStructure>>,
    black_vol: Option<Arc<dyn BlackVolTermStructure>>,
    local_vol: Option<Arc<dyn LocalVolTermStructure>>,
    evaluation_time: Time,
}

impl PricingContextBuilder {
    /// Share an existing spot quote.
    pub fn spot_quote(mut self, spot: Arc<SimpleQuote>) -> Self {
        self.spot = Some(spot);
        self
    }

    /// Use a fresh quote holding `spot`.
    pub fn spot(self, spot: Real) -> Self {
        self.spot_quote(Arc::new(SimpleQuote::new(spot)))
    }

    /// Risk-free curve.
    pub fn risk_free(mut self, curve: Arc<dyn YieldTermStructure>) -> Self {
        self.risk_free = Some(curve);
        self
    }

    /// Dividend curve.
    pub fn dividend(mut self, curve: Arc<dyn YieldTermStructure>) -> Self {
        self.dividend = Some(curve);
        self
    }

    /// Black volatility surface.
    pub fn black_vol(mut self, vol: Arc<dyn BlackVolTermStructure>) -> Self {
        self.black_vol = Some(vol);
        self
    }

    /// Local volatility surface.
    pub fn local_vol(mut self, vol: Arc<dyn LocalVolTermStructure>) -> Self {
        self.local_vol = Some(vol);
        self
    }

    /// Evaluation instant on the instrument clock (default 0).
    pub fn evaluation_time(mut self, t: Time) -> Self {
        self.evaluation_time = t;
        self
    }

    /// Finish the context; spot, risk-free curve and Black volatility are
    /// required, the dividend curve defaults to zero yield.
    pub fn build(self) -> Result<PricingContext> {
        let Some(spot) = self.spot else {
            fail!("no spot quote given");
        };
        let Some(risk_free) = self.risk_free else {
            fail!("no risk-free curve given");
        };
        let Some(black_vol) = self.black_vol else {
            fail!("no Black volatility given");
        };
        ensure!(spot.is_valid(), "spot quote has no value");
        ensure!(
            self.evaluation_time >= 0.0 && self.evaluation_time.is_finite(),
            "invalid evaluation time {}",
            self.evaluation_time
        );
        let dividend = self
            .dividend
            .unwrap_or_else(|| Arc::new(ql_termstructures::FlatForward::new(0.0)));
        Ok(PricingContext {
            spot,
            risk_free,
            dividend,
            black_vol,
            local_vol: self.local_vol,
            evaluation_time: self.evaluation_time,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ql_instruments::{OptionType, Payoff};
    use ql_termstructures::{BlackConstantVol, FlatForward};

    fn context(evaluation_time: Time) -> PricingContext {
        PricingContext::builder()
            .spot(100.0)
            .risk_free(Arc::new(FlatForward::new(0.05)))
            .black_vol(Arc::new(BlackConstantVol::new(0.2).unwrap()))
            .evaluation_time(evaluation_time)
            .build()
            .unwrap()
    }

    #[test]
    fn missing_inputs_are_rejected() {
        assert!(PricingContext::builder().spot(100.0).build().is_err());
        assert!(PricingContext::builder()
            .risk_free(Arc::new(FlatForward::new(0.0)))
            .black_vol(Arc::new(BlackConstantVol::new(0.2).unwrap()))
            .build()
            .is_err());
    }

    #[test]
    fn dividend_curve_defaults_to_zero() {
        let ctx = context(0.0);
        assert_eq!(ctx.dividend().discount(3.0), 1.0);
        assert_eq!(ctx.spot().unwrap(), 100.0);
    }

    #[test]
    fn exercise_is_aged_by_the_evaluation_time() {
        let ctx = context(0.25);
        let american = ctx.rebase_exercise(&Exercise::american(0.0, 1.25).unwrap()).unwrap();
        assert_eq!(american.times(), &[0.0, 1.0]);
        let bermudan = ctx
            .rebase_exercise(&Exercise::bermudan(vec![0.2, 0.75, 1.25]).unwrap())
            .unwrap();
        assert_eq!(bermudan.times(), &[0.5, 1.0]);
        assert!(ctx.rebase_exercise(&Exercise::european(0.25).unwrap()).is_err());
    }

    #[test]
    fn paid_dividends_are_dropped() {
        let ctx = context(0.5);
        let args = VanillaOptionArguments::new(
            Payoff::vanilla(OptionType::Put, 100.0),
            Exercise::european(1.5).unwrap(),
        )
        .unwrap()
        .with_dividends(vec![
            ql_instruments::CashDividend::new(0.25, 1.0).unwrap(),
            ql_instruments::CashDividend::new(1.0, 2.0).unwrap(),
        ]);
        let rebased = ctx.rebase_vanilla(&args).unwrap();
        assert_eq!(rebased.dividends.len(), 1);
        assert_eq!(rebased.dividends[0].time, 0.5);
        assert_eq!(rebased.maturity(), 1.0);
    }
}
