//! `LocalVolSurface`: Dupire local volatility surface.
//!
//! Computes local volatilities from an implied (Black) volatility surface
//! using Dupire's formula expressed in total variance `w = σ²T` and
//! log-moneyness `y = ln(K/F)`:
//!
//! $$\sigma^2_\text{loc}(T, K) = \frac{\partial_T w}
//!     {1 - \frac{y}{w}\partial_y w
//!       + \frac14\left(-\frac14 - \frac{1}{w} + \frac{y^2}{w^2}\right)
//!              (\partial_y w)^2
//!       + \frac12 \partial^2_{y} w}$$
//!
//! The time derivative is taken along constant forward moneyness.

use std::sync::Arc;

use crate::black_vol_term_structure::BlackVolTermStructure;
use crate::local_vol_term_structure::LocalVolTermStructure;
use crate::yield_term_structure::YieldTermStructure;
use ql_core::{ensure, errors::Result, Real, Time, Volatility};
use ql_quotes::Quote;

/// A local volatility surface derived from a Black volatility surface via
/// Dupire's formula.
#[derive(Debug, Clone)]
pub struct LocalVolSurface {
    black_vol: Arc<dyn BlackVolTermStructure>,
    risk_free_rate: Arc<dyn YieldTermStructure>,
    dividend_yield: Arc<dyn YieldTermStructure>,
    underlying: Arc<dyn Quote>,
}

impl LocalVolSurface {
    /// Create a new surface; the spot is read from `underlying` on every call.
    pub fn new(
        black_vol: Arc<dyn BlackVolTermStructure>,
        risk_free_rate: Arc<dyn YieldTermStructure>,
        dividend_yield: Arc<dyn YieldTermStructure>,
        underlying: Arc<dyn Quote>,
    ) -> Self {
        Self {
            black_vol,
            risk_free_rate,
            dividend_yield,
            underlying,
        }
    }
}

impl LocalVolTermStructure for LocalVolSurface {
    fn local_vol(&self, t: Time, underlying_level: Real) -> Result<Volatility> {
        let dr = self.risk_free_rate.discount(t);
        let dq = self.dividend_yield.discount(t);
        let forward = self.underlying.try_value()? * dq / dr;

        let strike = underlying_level;
        ensure!(strike > 0.0, "non-positive underlying level {strike}");
        let y = (strike / forward).ln();
        let dy = if y.abs() > 0.001 { y * 0.0001 } else { 0.000001 };
        let strike_p = strike * dy.exp();
        let strike_m = strike / dy.exp();

        let bv = &*self.black_vol;
        let w = bv.black_variance(t, strike);
        let wp = bv.black_variance(t, strike_p);
        let wm = bv.black_variance(t, strike_m);
        let dwdy = (wp - wm) / (2.0 * dy);
        let d2wdy2 = (wp - 2.0 * w + wm) / (dy * dy);

        let dwdt = if t == 0.0 {
            let dt = 0.0001;
            let drpt = self.risk_free_rate.discount(t + dt);
            let dqpt = self.dividend_yield.discount(t + dt);
            let strike_pt = strike * dr * dqpt / (drpt * dq);
            (bv.black_variance(t + dt, strike_pt) - w) / dt
        } else {
            let dt = 0.0001_f64.min(0.5 * t);
            let drpt = self.risk_free_rate.discount(t + dt);
            let drmt = self.risk_free_rate.discount(t - dt);
            let dqpt = self.dividend_yield.discount(t + dt);
            let dqmt = self.dividend_yield.discount(t - dt);
            let strike_pt = strike * dr * dqpt / (drpt * dq);
            let strike_mt = strike * dr * dqmt / (drmt * dq);
            (bv.black_variance(t + dt, strike_pt) - bv.black_variance(t - dt, strike_mt))
                / (2.0 * dt)
        };

        let local_var = if dwdy == 0.0 && d2wdy2 == 0.0 {
            dwdt
        } else {
            let den1 = 1.0 - y / w * dwdy;
            let den2 = 0.25 * (-0.25 - 1.0 / w + y * y / (w * w)) * dwdy * dwdy;
            let den3 = 0.5 * d2wdy2;
            let den = den1 + den2 + den3;
            ensure!(
                den > 0.0,
                "negative denominator ({den}) in local vol at t = {t}, S = {strike}"
            );
            dwdt / den
        };
        ensure!(
            local_var >= 0.0,
            "negative local vol^2 ({local_var}) at t = {t}, S = {strike}"
        );
        Ok(local_var.sqrt())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::black_vol_term_structure::{BlackConstantVol, BlackVarianceCurve};
    use crate::flat_forward::FlatForward;
    use approx::assert_abs_diff_eq;
    use ql_quotes::SimpleQuote;

    fn surface(black_vol: Arc<dyn BlackVolTermStructure>) -> LocalVolSurface {
        LocalVolSurface::new(
            black_vol,
            Arc::new(FlatForward::new(0.05)),
            Arc::new(FlatForward::new(0.02)),
            Arc::new(SimpleQuote::new(100.0)),
        )
    }

    #[test]
    fn constant_black_vol_gives_constant_local_vol() {
        let lv = surface(Arc::new(BlackConstantVol::new(0.20).unwrap()));
        for (t, s) in [(1.0, 100.0), (2.0, 80.0), (0.5, 120.0), (0.0, 100.0)] {
            assert_abs_diff_eq!(lv.local_vol(t, s).unwrap(), 0.20, epsilon = 1e-6);
        }
    }

    #[test]
    fn term_structure_gives_forward_vol() {
        let lv = surface(Arc::new(BlackVarianceCurve::new(&[1.0, 2.0], &[0.2, 0.3]).unwrap()));
        // between pillars the local variance is the forward variance
        assert_abs_diff_eq!(
            lv.local_vol(1.5, 100.0).unwrap(),
            0.14_f64.sqrt(),
            epsilon = 1e-6
        );
    }

    #[test]
    fn unset_spot_is_an_error() {
        let lv = LocalVolSurface::new(
            Arc::new(BlackConstantVol::new(0.2).unwrap()),
            Arc::new(FlatForward::new(0.0)),
            Arc::new(FlatForward::new(0.0)),
            Arc::new(SimpleQuote::empty()),
        );
        assert!(lv.local_vol(1.0, 100.0).is_err());
    }
}
