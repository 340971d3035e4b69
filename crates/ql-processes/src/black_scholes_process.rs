//! Generalized Black-Scholes process.
//!
//! `d ln S = (r(t) − q(t) − σ²/2) dt + σ(t, S) dW`
//!
//! The state is the price `S`; increments are in log space and `apply`
//! exponentiates them.  Volatility comes from a local-vol surface when one
//! is attached, otherwise from the Black surface's forward variance (exact
//! for strike-independent term structures).

use crate::stochastic_process::StochasticProcess1D;
use ql_core::{ensure, errors::Result, Rate, Real, Time, Volatility};
use ql_termstructures::{BlackVolTermStructure, LocalVolTermStructure, YieldTermStructure};
use std::sync::Arc;

/// Horizon used to turn forward quantities into instantaneous ones.
const INSTANT: Time = 1.0e-4;

/// A generalized Black-Scholes stochastic process.
#[derive(Debug, Clone)]
pub struct GeneralizedBlackScholesProcess {
    x0: Real,
    risk_free_rate: Arc<dyn YieldTermStructure>,
    dividend_yield: Arc<dyn YieldTermStructure>,
    black_vol: Arc<dyn BlackVolTermStructure>,
    local_vol: Option<Arc<dyn LocalVolTermStructure>>,
}

impl GeneralizedBlackScholesProcess {
    /// Create a new process with a Black volatility surface.
    pub fn new(
        x0: Real,
        risk_free_rate: Arc<dyn YieldTermStructure>,
        dividend_yield: Arc<dyn YieldTermStructure>,
        black_vol: Arc<dyn BlackVolTermStructure>,
    ) -> Result<Self> {
        ensure!(x0 >= 0.0 && x0.is_finite(), "invalid spot {x0}");
        Ok(Self {
            x0,
            risk_free_rate,
            dividend_yield,
            black_vol,
            local_vol: None,
        })
    }

    /// Attach a local volatility surface used for path evolution and PDE
    /// coefficients.
    pub fn with_local_vol(mut self, local_vol: Arc<dyn LocalVolTermStructure>) -> Self {
        self.local_vol = Some(local_vol);
        self
    }

    /// The spot price.
    pub fn spot(&self) -> Real {
        self.x0
    }

    /// The risk-free rate term structure.
    pub fn risk_free_rate(&self) -> &Arc<dyn YieldTermStructure> {
        &self.risk_free_rate
    }

    /// The dividend yield term structure.
    pub fn dividend_yield(&self) -> &Arc<dyn YieldTermStructure> {
        &self.dividend_yield
    }

    /// The Black volatility surface.
    pub fn black_volatility(&self) -> &Arc<dyn BlackVolTermStructure> {
        &self.black_vol
    }

    /// The local volatility surface, if one is attached.
    pub fn local_volatility(&self) -> Option<&Arc<dyn LocalVolTermStructure>> {
        self.local_vol.as_ref()
    }

    /// Forward price `S e^{(r-q)t}` at time `t`.
    pub fn forward(&self, t: Time) -> Real {
        self.x0 * self.dividend_yield.discount(t) / self.risk_free_rate.discount(t)
    }

    /// Forward drift `r − q` over `[t0, t0 + dt]`.
    pub fn carry(&self, t0: Time, dt: Time) -> Rate {
        self.risk_free_rate.forward_rate(t0, t0 + dt) - self.dividend_yield.forward_rate(t0, t0 + dt)
    }

    /// Instantaneous local volatility at `(t, s)`.
    pub fn local_vol_at(&self, t: Time, s: Real) -> Result<Volatility> {
        match &self.local_vol {
            Some(lv) => lv.local_vol(t, s),
            None => self.black_vol.black_forward_vol(t, t + INSTANT, s),
        }
    }

    /// Log-variance accumulated over `[t0, t0 + dt]` starting from `s`.
    fn step_variance(&self, t0: Time, s: Real, dt: Time) -> Result<Real> {
        match &self.local_vol {
            Some(lv) => {
                let sigma = lv.local_vol(t0, s)?;
                Ok(sigma * sigma * dt)
            }
            None => Ok((self.black_vol.black_variance(t0 + dt, s)
                - self.black_vol.black_variance(t0, s))
            .max(0.0)),
        }
    }
}

impl StochasticProcess1D for GeneralizedBlackScholesProcess {
    fn x0(&self) -> Real {
        self.x0
    }

    fn drift_1d(&self, t: Time, x: Real) -> Result<Real> {
        let sigma = self.local_vol_at(t, x)?;
        Ok(self.carry(t, INSTANT) - 0.5 * sigma * sigma)
    }

    fn diffusion_1d(&self, t: Time, x: Real) -> Result<Real> {
        self.local_vol_at(t, x)
    }

    fn apply_1d(&self, x0: Real, dx: Real) -> Real {
        x0 * dx.exp()
    }

    /// The exact conditional mean `S e^{(r-q)Δt}`.
    fn expectation_1d(&self, t0: Time, x0: Real, dt: Time) -> Result<Real> {
        Ok(x0 * (self.carry(t0, dt) * dt).exp())
    }

    /// Standard deviation of the log increment.
    fn std_deviation_1d(&self, t0: Time, x0: Real, dt: Time) -> Result<Real> {
        Ok(self.step_variance(t0, x0, dt)?.sqrt())
    }

    fn evolve_1d(&self, t0: Time, x0: Real, dt: Time, dw: Real) -> Result<Real> {
        let var = self.step_variance(t0, x0, dt)?;
        let drift = self.carry(t0, dt) * dt - 0.5 * var;
        Ok(self.apply_1d(x0, drift + var.sqrt() * dw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stochastic_process::StochasticProcess;
    use approx::assert_abs_diff_eq;
    use ql_termstructures::{BlackConstantVol, BlackVarianceCurve, FlatForward, LocalConstantVol};

    fn make_bsm() -> GeneralizedBlackScholesProcess {
        GeneralizedBlackScholesProcess::new(
            100.0,
            Arc::new(FlatForward::new(0.05)),
            Arc::new(FlatForward::new(0.02)),
            Arc::new(BlackConstantVol::new(0.20).unwrap()),
        )
        .unwrap()
    }

    #[test]
    fn bsm_initial_values() {
        let p = make_bsm();
        assert_eq!(p.size(), 1);
        assert_abs_diff_eq!(p.initial_values()[0], 100.0, epsilon = 1e-15);
        assert_abs_diff_eq!(p.forward(1.0), 100.0 * 0.03_f64.exp(), epsilon = 1e-10);
    }

    #[test]
    fn bsm_log_drift_and_diffusion() {
        let p = make_bsm();
        // r - q - σ²/2 = 0.05 - 0.02 - 0.02
        assert_abs_diff_eq!(p.drift_1d(0.0, 100.0).unwrap(), 0.01, epsilon = 1e-10);
        assert_abs_diff_eq!(p.diffusion_1d(0.0, 100.0).unwrap(), 0.20, epsilon = 1e-10);
    }

    #[test]
    fn bsm_evolve_zero_noise() {
        let p = make_bsm();
        let x_new = p.evolve_1d(0.0, 100.0, 1.0, 0.0).unwrap();
        assert_abs_diff_eq!(x_new, 100.0 * 0.01_f64.exp(), epsilon = 1e-10);
    }

    #[test]
    fn bsm_expectation_is_forward() {
        let p = make_bsm();
        assert_abs_diff_eq!(
            p.expectation_1d(0.0, 100.0, 2.0).unwrap(),
            100.0 * 0.06_f64.exp(),
            epsilon = 1e-10
        );
        assert_abs_diff_eq!(p.std_deviation_1d(0.0, 100.0, 0.25).unwrap(), 0.1, epsilon = 1e-12);
    }

    #[test]
    fn term_structure_of_vol_uses_forward_variance() {
        let p = GeneralizedBlackScholesProcess::new(
            100.0,
            Arc::new(FlatForward::new(0.0)),
            Arc::new(FlatForward::new(0.0)),
            Arc::new(BlackVarianceCurve::new(&[1.0, 2.0], &[0.2, 0.3]).unwrap()),
        )
        .unwrap();
        // forward variance over [1, 2] is 0.18 - 0.04
        assert_abs_diff_eq!(p.variance_1d(1.0, 100.0, 1.0).unwrap(), 0.14, epsilon = 1e-12);
    }

    #[test]
    fn local_vol_overrides_black_vol() {
        let p = make_bsm().with_local_vol(Arc::new(LocalConstantVol::new(0.3).unwrap()));
        assert_abs_diff_eq!(p.diffusion_1d(0.5, 90.0).unwrap(), 0.3);
        assert_abs_diff_eq!(p.variance_1d(0.0, 100.0, 1.0).unwrap(), 0.09, epsilon = 1e-12);
    }

    #[test]
    fn negative_spot_is_rejected() {
        let r = GeneralizedBlackScholesProcess::new(
            -1.0,
            Arc::new(FlatForward::new(0.0)),
            Arc::new(FlatForward::new(0.0)),
            Arc::new(BlackConstantVol::new(0.2).unwrap()),
        );
        assert!(r.is_err());
    }

    proptest::proptest! {
        #[test]
        fn mirrored_steps_straddle_the_log_mean(x0 in 1.0..500.0_f64, dt in 0.01..2.0_f64, dw in -5.0..5.0_f64) {
            let p = make_bsm();
            let up = p.evolve_1d(0.0, x0, dt, dw).unwrap();
            let down = p.evolve_1d(0.0, x0, dt, -dw).unwrap();
            proptest::prop_assert!(up > 0.0 && down > 0.0);
            let mean = p.expectation_1d(0.0, x0, dt).unwrap();
            let var = p.variance_1d(0.0, x0, dt).unwrap();
            proptest::prop_assert!((up.ln() + down.ln() - (2.0 * mean.ln() - var)).abs() < 1e-10);
        }
    }
}
