//! Heston stochastic volatility process.
//!
//! ```text
//! dS = (r − q) S dt + √v S dW₁
//! dv = κ(θ − v) dt + σ √v dW₂
//! dW₁ dW₂ = ρ dt
//! ```
//!
//! State vector: `x = [S, v]`.  The spot increment is in log space.
//! Path evolution takes two *independent* normal draws; correlation is
//! applied inside [`HestonProcess::evolve`].

use crate::stochastic_process::StochasticProcess;
use ql_core::{ensure, errors::Result, Rate, Real, Time};
use ql_math::{normal_cdf, Array, Matrix};
use ql_termstructures::YieldTermStructure;
use std::sync::Arc;

/// Variance discretization used by [`HestonProcess::evolve`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum HestonDiscretization {
    /// Euler; the drift sees the raw variance, the diffusion its positive part.
    PartialTruncation,
    /// Euler; drift and diffusion both see the positive part.
    FullTruncation,
    /// Euler on `|v|`.
    Reflection,
    /// Andersen's quadratic-exponential scheme.
    QuadraticExponential,
    /// Quadratic-exponential with the martingale correction for the spot.
    #[default]
    QuadraticExponentialMartingale,
}

/// The Heston stochastic volatility process.
#[derive(Debug, Clone)]
pub struct HestonProcess {
    s0: Real,
    v0: Real,
    kappa: Real,
    theta: Real,
    sigma: Real,
    rho: Real,
    risk_free_rate: Arc<dyn YieldTermStructure>,
    dividend_yield: Arc<dyn YieldTermStructure>,
    discretization: HestonDiscretization,
}

impl HestonProcess {
    /// Create a new Heston process.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        risk_free_rate: Arc<dyn YieldTermStructure>,
        dividend_yield: Arc<dyn YieldTermStructure>,
        s0: Real,
        v0: Real,
        kappa: Real,
        theta: Real,
        sigma: Real,
        rho: Real,
    ) -> Result<Self> {
        ensure!(s0 > 0.0 && s0.is_finite(), "invalid spot {s0}");
        ensure!(
            (-1.0..=1.0).contains(&rho),
            "correlation must be in [-1, 1], got {rho}"
        );
        ensure!(v0 >= 0.0, "initial variance must be non-negative, got {v0}");
        ensure!(kappa > 0.0, "mean reversion speed must be positive, got {kappa}");
        ensure!(theta >= 0.0, "long-run variance must be non-negative, got {theta}");
        ensure!(sigma > 0.0, "vol-of-vol must be positive, got {sigma}");
        Ok(Self {
            s0,
            v0,
            kappa,
            theta,
            sigma,
            rho,
            risk_free_rate,
            dividend_yield,
            discretization: HestonDiscretization::default(),
        })
    }

    /// Select the variance discretization.
    pub fn with_discretization(mut self, discretization: HestonDiscretization) -> Self {
        self.discretization = discretization;
        self
    }

    /// Spot price.
    pub fn s0(&self) -> Real {
        self.s0
    }

    /// Initial variance.
    pub fn v0(&self) -> Real {
        self.v0
    }

    /// Mean-reversion speed.
    pub fn kappa(&self) -> Real {
        self.kappa
    }

    /// Long-run variance.
    pub fn theta(&self) -> Real {
        self.theta
    }

    /// Vol-of-vol.
    pub fn sigma(&self) -> Real {
        self.sigma
    }

    /// Correlation.
    pub fn rho(&self) -> Real {
        self.rho
    }

    /// The variance discretization.
    pub fn discretization(&self) -> HestonDiscretization {
        self.discretization
    }

    /// Risk-free rate.
    pub fn risk_free_rate(&self) -> &Arc<dyn YieldTermStructure> {
        &self.risk_free_rate
    }

    /// Dividend yield.
    pub fn dividend_yield(&self) -> &Arc<dyn YieldTermStructure> {
        &self.dividend_yield
    }

    /// `true` if `2κθ ≥ σ²` (the variance never reaches zero).
    pub fn feller_satisfied(&self) -> bool {
        2.0 * self.kappa * self.theta >= self.sigma * self.sigma
    }

    /// Mean and variance of `v(t + Δt)` given `v(t) = v`.
    pub fn variance_moments(&self, v: Real, dt: Time) -> (Real, Real) {
        let ex = (-self.kappa * dt).exp();
        let s2 = self.sigma * self.sigma;
        let mean = self.theta + (v - self.theta) * ex;
        let var = v * s2 * ex / self.kappa * (1.0 - ex)
            + self.theta * s2 / (2.0 * self.kappa) * (1.0 - ex) * (1.0 - ex);
        (mean, var)
    }

    fn carry(&self, t0: Time, dt: Time) -> Rate {
        self.risk_free_rate.forward_rate(t0, t0 + dt) - self.dividend_yield.forward_rate(t0, t0 + dt)
    }

    fn evolve_euler(&self, t0: Time, x0: &Array, dt: Time, dw: &Array) -> Array {
        let v = x0[1];
        let sdt = dt.sqrt();
        let (vol, drift_v) = match self.discretization {
            HestonDiscretization::PartialTruncation => (v.max(0.0).sqrt(), v),
            HestonDiscretization::FullTruncation => (v.max(0.0).sqrt(), v.max(0.0)),
            _ => (v.abs().sqrt(), v.abs()),
        };
        let mu = self.carry(t0, dt) - 0.5 * vol * vol;
        let nu = self.kappa * (self.theta - drift_v);
        let s = x0[0] * (mu * dt + vol * dw[0] * sdt).exp();
        let dz = self.rho * dw[0] + (1.0 - self.rho * self.rho).sqrt() * dw[1];
        let mut v_new = v + nu * dt + self.sigma * vol * sdt * dz;
        if self.discretization == HestonDiscretization::Reflection {
            v_new = v_new.abs();
        }
        Array::from_vec(vec![s, v_new])
    }

    fn evolve_qe(&self, t0: Time, x0: &Array, dt: Time, dw: &Array) -> Result<Array> {
        let martingale = self.discretization == HestonDiscretization::QuadraticExponentialMartingale;
        let v0 = x0[1].max(0.0);
        let (m, s2) = self.variance_moments(v0, dt);
        let psi = s2 / (m * m);

        let (g1, g2) = (0.5, 0.5);
        let (kappa, rho, sigma) = (self.kappa, self.rho, self.sigma);
        let mut k0 = -rho * kappa * self.theta * dt / sigma;
        let k1 = g1 * dt * (kappa * rho / sigma - 0.5) - rho / sigma;
        let k2 = g2 * dt * (kappa * rho / sigma - 0.5) + rho / sigma;
        let k3 = g1 * dt * (1.0 - rho * rho);
        let k4 = g2 * dt * (1.0 - rho * rho);
        let a_coef = k2 + 0.5 * k4;

        let v_new = if psi < 1.5 {
            let b2 = 2.0 / psi - 1.0 + (2.0 / psi * (2.0 / psi - 1.0)).sqrt();
            let b = b2.sqrt();
            let a = m / (1.0 + b2);
            if martingale {
                ensure!(
                    a_coef < 1.0 / (2.0 * a),
                    "illegal value for the martingale correction (dt = {dt})"
                );
                k0 = -a_coef * b2 * a / (1.0 - 2.0 * a_coef * a)
                    + 0.5 * (1.0 - 2.0 * a_coef * a).ln()
                    - (k1 + 0.5 * k3) * v0;
            }
            a * (b + dw[1]) * (b + dw[1])
        } else {
            let p = (psi - 1.0) / (psi + 1.0);
            let beta = (1.0 - p) / m;
            let u = normal_cdf(dw[1]);
            if martingale {
                ensure!(
                    beta > a_coef,
                    "illegal value for the martingale correction (dt = {dt})"
                );
                k0 = -(p + beta * (1.0 - p) / (beta - a_coef)).ln() - (k1 + 0.5 * k3) * v0;
            }
            if u <= p {
                0.0
            } else {
                ((1.0 - p) / (1.0 - u)).ln() / beta
            }
        };

        let mu = self.carry(t0, dt);
        let s = x0[0]
            * (mu * dt + k0 + k1 * v0 + k2 * v_new + (k3 * v0 + k4 * v_new).sqrt() * dw[0]).exp();
        Ok(Array::from_vec(vec![s, v_new]))
    }
}

impl StochasticProcess for HestonProcess {
    fn size(&self) -> usize {
        2
    }

    fn factors(&self) -> usize {
        2
    }

    fn initial_values(&self) -> Array {
        Array::from_vec(vec![self.s0, self.v0])
    }

    fn drift(&self, t: Time, x: &Array) -> Result<Array> {
        let v = x[1].max(0.0);
        Ok(Array::from_vec(vec![
            self.carry(t, 1.0e-4) - 0.5 * v,
            self.kappa * (self.theta - v),
        ]))
    }

    fn diffusion(&self, _t: Time, x: &Array) -> Result<Matrix> {
        let vol = x[1].max(0.0).sqrt();
        let sigma2 = self.sigma * vol;
        let sqrhov = (1.0 - self.rho * self.rho).sqrt();
        Ok(Matrix::from_row_slice(
            2,
            2,
            &[vol, 0.0, self.rho * sigma2, sqrhov * sigma2],
        ))
    }

    fn apply(&self, x0: &Array, dx: &Array) -> Array {
        Array::from_vec(vec![x0[0] * dx[0].exp(), x0[1] + dx[1]])
    }

    fn evolve(&self, t0: Time, x0: &Array, dt: Time, dw: &Array) -> Result<Array> {
        ensure!(dw.len() == 2, "Heston evolve needs 2 draws, got {}", dw.len());
        match self.discretization {
            HestonDiscretization::QuadraticExponential
            | HestonDiscretization::QuadraticExponentialMartingale => {
                self.evolve_qe(t0, x0, dt, dw)
            }
            _ => Ok(self.evolve_euler(t0, x0, dt, dw)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ql_termstructures::FlatForward;

    fn make_heston(d: HestonDiscretization) -> HestonProcess {
        HestonProcess::new(
            Arc::new(FlatForward::new(0.05)),
            Arc::new(FlatForward::new(0.02)),
            100.0,
            0.04,
            1.5,
            0.04,
            0.3,
            -0.7,
        )
        .unwrap()
        .with_discretization(d)
    }

    #[test]
    fn heston_size_and_initial_values() {
        let p = make_heston(HestonDiscretization::FullTruncation);
        assert_eq!(p.size(), 2);
        assert_eq!(p.factors(), 2);
        let iv = p.initial_values();
        assert_abs_diff_eq!(iv[0], 100.0);
        assert_abs_diff_eq!(iv[1], 0.04);
    }

    #[test]
    fn heston_diffusion_at_mean() {
        let p = make_heston(HestonDiscretization::FullTruncation);
        let m = p.diffusion(0.0, &Array::from_vec(vec![100.0, 0.04])).unwrap();
        assert_abs_diff_eq!(m[(0, 0)], 0.2, epsilon = 1e-12);
        assert_abs_diff_eq!(m[(0, 1)], 0.0);
        assert_abs_diff_eq!(m[(1, 0)], -0.042, epsilon = 1e-12);
        assert_abs_diff_eq!(m[(1, 1)], 0.06 * 0.51_f64.sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn variance_moments_at_long_run_level() {
        let p = make_heston(HestonDiscretization::QuadraticExponential);
        let (m, _) = p.variance_moments(0.04, 1.0);
        assert_abs_diff_eq!(m, 0.04, epsilon = 1e-15);
        let (m, v) = p.variance_moments(0.0, 0.0);
        assert_abs_diff_eq!(m, 0.0, epsilon = 1e-15);
        assert_abs_diff_eq!(v, 0.0, epsilon = 1e-15);
    }

    #[test]
    fn truncation_schemes_keep_variance_usable() {
        let x = Array::from_vec(vec![100.0, 0.001]);
        let dw = Array::from_vec(vec![-3.0, -3.0]);
        let dt = 1.0 / 252.0;
        let refl = make_heston(HestonDiscretization::Reflection)
            .evolve(0.0, &x, dt, &dw)
            .unwrap();
        assert!(refl[1] >= 0.0);
        for d in [
            HestonDiscretization::QuadraticExponential,
            HestonDiscretization::QuadraticExponentialMartingale,
        ] {
            let y = make_heston(d).evolve(0.0, &x, dt, &dw).unwrap();
            assert!(y[1] >= 0.0, "{d:?} produced {}", y[1]);
            assert!(y[0] > 0.0);
        }
    }

    #[test]
    fn qe_step_matches_variance_mean() {
        // E[a (b + Z)^2] = a (b^2 + 1) = m in the quadratic regime
        let p = make_heston(HestonDiscretization::QuadraticExponential);
        let dt = 0.1;
        let (m, _) = p.variance_moments(0.04, dt);
        let mut sum = 0.0;
        let n = 2000;
        for i in 0..n {
            let u = (i as Real + 0.5) / n as Real;
            let z = ql_math::normal_cdf_inverse(u);
            let y = p
                .evolve(0.0, &Array::from_vec(vec![100.0, 0.04]), dt, &Array::from_vec(vec![0.0, z]))
                .unwrap();
            sum += y[1];
        }
        assert_abs_diff_eq!(sum / n as Real, m, epsilon = 2e-4);
    }

    #[test]
    fn invalid_parameters_are_rejected() {
        let r = HestonProcess::new(
            Arc::new(FlatForward::new(0.05)),
            Arc::new(FlatForward::new(0.02)),
            100.0,
            0.04,
            1.5,
            0.04,
            0.3,
            -1.5,
        );
        assert!(r.is_err());
    }
}
