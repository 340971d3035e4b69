//! PDE generators assembled from derivative stencils.
//!
//! Each operator implements [`FdmLinearOpComposite`]: a sum of one
//! tridiagonal piece per direction plus an optional mixed term, which is
//! what the splitting schemes need.

use crate::finite_differences::meshers::FdmMesherComposite;
use crate::finite_differences::nine_point::NinePointLinearOp;
use crate::finite_differences::triple_band::TripleBandLinearOp;
use ql_core::{ensure, errors::Result, Real, Time};
use ql_math::Array;
use ql_processes::{GeneralizedBlackScholesProcess, HestonProcess};
use ql_termstructures::{BlackVolTermStructure, LocalVolTermStructure, YieldTermStructure};
use std::sync::Arc;

/// A linear operator `L = Σ_d L_d + L_mixed` on a grid, rebuilt for each
/// time interval by [`set_time`](Self::set_time).
pub trait FdmLinearOpComposite: std::fmt::Debug + Send + Sync {
    /// Number of directions with a splitting component.
    fn size(&self) -> usize;

    /// Freeze the coefficients for the interval `[t1, t2]`.
    fn set_time(&mut self, t1: Time, t2: Time) -> Result<()>;

    /// `L · r`.
    fn apply(&self, r: &Array) -> Array;

    /// Mixed-derivative part of `L · r`.
    fn apply_mixed(&self, r: &Array) -> Array;

    /// Component `L_direction · r`.
    fn apply_direction(&self, direction: usize, r: &Array) -> Array;

    /// Solve `(I - s·L_direction) x = r`.
    fn solve_splitting(&self, direction: usize, r: &Array, s: Real) -> Result<Array>;

    /// Approximate inverse of `I - s·L`, used to precondition iterative
    /// solves.
    fn preconditioner(&self, r: &Array, s: Real) -> Result<Array> {
        self.solve_splitting(0, r, s)
    }
}

fn forward_rates(r: &dyn YieldTermStructure, q: &dyn YieldTermStructure, t1: Time, t2: Time) -> (Real, Real) {
    (r.forward_rate(t1, t2), q.forward_rate(t1, t2))
}

// ─── Black-Scholes ────────────────────────────────────────────────────────────

/// Backward Black-Scholes generator in log-spot
/// `½σ²∂ₓₓ + (r - q - ½σ²)∂ₓ - r`.
///
/// With a local volatility surface the variance is evaluated per node at
/// the interval mid-point; otherwise the forward Black variance over the
/// interval at `strike` is used.
#[derive(Debug, Clone)]
pub struct FdmBlackScholesOp {
    mesher: Arc<FdmMesherComposite>,
    risk_free: Arc<dyn YieldTermStructure>,
    dividend: Arc<dyn YieldTermStructure>,
    black_vol: Arc<dyn BlackVolTermStructure>,
    local_vol: Option<Arc<dyn LocalVolTermStructure>>,
    strike: Real,
    x: Array,
    dx: TripleBandLinearOp,
    dxx: TripleBandLinearOp,
    map_t: TripleBandLinearOp,
}

impl FdmBlackScholesOp {
    /// Generator of `process` on the log-spot direction 0 of `mesher`.
    pub fn new(mesher: Arc<FdmMesherComposite>, process: &GeneralizedBlackScholesProcess, strike: Real) -> Self {
        Self {
            x: mesher.locations(0),
            dx: TripleBandLinearOp::first_derivative(0, Arc::clone(&mesher)),
            dxx: TripleBandLinearOp::second_derivative(0, Arc::clone(&mesher)),
            map_t: TripleBandLinearOp::new(0, Arc::clone(&mesher)),
            risk_free: Arc::clone(process.risk_free_rate()),
            dividend: Arc::clone(process.dividend_yield()),
            black_vol: Arc::clone(process.black_volatility()),
            local_vol: process.local_volatility().cloned(),
            strike,
            mesher,
        }
    }

    /// The grid.
    pub fn mesher(&self) -> &Arc<FdmMesherComposite> {
        &self.mesher
    }
}

impl FdmLinearOpComposite for FdmBlackScholesOp {
    fn size(&self) -> usize {
        1
    }

    fn set_time(&mut self, t1: Time, t2: Time) -> Result<()> {
        let (r, q) = forward_rates(self.risk_free.as_ref(), self.dividend.as_ref(), t1, t2);
        match &self.local_vol {
            Some(local_vol) => {
                let t_mid = 0.5 * (t1 + t2);
                let mut v = Array::zeros(self.x.len());
                for i in 0..self.x.len() {
                    let sigma = local_vol.local_vol(t_mid, self.x[i].exp())?;
                    v[i] = sigma * sigma;
                }
                let drift = v.map(|vi| r - q - 0.5 * vi);
                let diffusion = self.dxx.mult(&(&v * 0.5));
                self.map_t.axpyb(drift.as_slice(), &self.dx, &diffusion, &[-r]);
            }
            None => {
                let v = if t2 - t1 > 1e-12 {
                    (self.black_vol.black_variance(t2, self.strike) - self.black_vol.black_variance(t1, self.strike))
                        / (t2 - t1)
                } else {
                    let sigma = self.black_vol.black_vol(t1, self.strike);
                    sigma * sigma
                };
                ensure!(v >= 0.0 && v.is_finite(), "negative forward variance {v} on [{t1}, {t2}]");
                let diffusion = self.dxx.scale(0.5 * v);
                self.map_t.axpyb(&[r - q - 0.5 * v], &self.dx, &diffusion, &[-r]);
            }
        }
        Ok(())
    }

    fn apply(&self, r: &Array) -> Array {
        self.map_t.apply(r)
    }

    fn apply_mixed(&self, r: &Array) -> Array {
        Array::zeros(r.len())
    }

    fn apply_direction(&self, direction: usize, r: &Array) -> Array {
        if direction == 0 {
            self.map_t.apply(r)
        } else {
            Array::zeros(r.len())
        }
    }

    fn solve_splitting(&self, direction: usize, r: &Array, s: Real) -> Result<Array> {
        if direction == 0 {
            self.map_t.solve_splitting(r, -s, 1.0)
        } else {
            Ok(r.clone())
        }
    }
}

// ─── Heston ───────────────────────────────────────────────────────────────────

/// Backward Heston generator on log-spot (direction 0) × variance
/// (direction 1), including the `ρσv ∂ₓᵥ` cross term.
#[derive(Debug, Clone)]
pub struct FdmHestonOp {
    kappa: Real,
    theta: Real,
    sigma: Real,
    rho: Real,
    risk_free: Arc<dyn YieldTermStructure>,
    dividend: Arc<dyn YieldTermStructure>,
    variance: Array,
    dx: TripleBandLinearOp,
    dxx_v: TripleBandLinearOp,
    map_x: TripleBandLinearOp,
    dy_map: TripleBandLinearOp,
    map_y: TripleBandLinearOp,
    correlation: NinePointLinearOp,
}

impl FdmHestonOp {
    /// Generator of `process` on a two-dimensional `mesher`.
    pub fn new(mesher: Arc<FdmMesherComposite>, process: &HestonProcess) -> Result<Self> {
        ensure!(
            mesher.layout().directions() == 2,
            "Heston operator needs a two-dimensional grid"
        );
        let variance = mesher.locations(1);
        let dx = TripleBandLinearOp::first_derivative(0, Arc::clone(&mesher));
        let dxx_v = TripleBandLinearOp::second_derivative(0, Arc::clone(&mesher)).mult(&(&variance * 0.5));

        let (kappa, theta, sigma, rho) = (process.kappa(), process.theta(), process.sigma(), process.rho());
        let drift_v = variance.map(|v| kappa * (theta - v));
        let dy_map = TripleBandLinearOp::second_derivative(1, Arc::clone(&mesher))
            .mult(&(&variance * (0.5 * sigma * sigma)))
            .add(&TripleBandLinearOp::first_derivative(1, Arc::clone(&mesher)).mult(&drift_v));
        let correlation = NinePointLinearOp::second_order_mixed_derivative(0, 1, Arc::clone(&mesher))
            .mult(&(&variance * (rho * sigma)));

        Ok(Self {
            kappa,
            theta,
            sigma,
            rho,
            risk_free: Arc::clone(process.risk_free_rate()),
            dividend: Arc::clone(process.dividend_yield()),
            map_x: TripleBandLinearOp::new(0, Arc::clone(&mesher)),
            map_y: TripleBandLinearOp::new(1, Arc::clone(&mesher)),
            variance,
            dx,
            dxx_v,
            dy_map,
            correlation,
        })
    }

    /// `(κ, θ, σ, ρ)` of the generator.
    pub fn parameters(&self) -> (Real, Real, Real, Real) {
        (self.kappa, self.theta, self.sigma, self.rho)
    }
}

impl FdmLinearOpComposite for FdmHestonOp {
    fn size(&self) -> usize {
        2
    }

    fn set_time(&mut self, t1: Time, t2: Time) -> Result<()> {
        let (r, q) = forward_rates(self.risk_free.as_ref(), self.dividend.as_ref(), t1, t2);
        let drift = self.variance.map(|v| r - q - 0.5 * v);
        // the discounting term is shared between the two directions
        self.map_x.axpyb(drift.as_slice(), &self.dx, &self.dxx_v, &[-0.5 * r]);
        self.map_y.axpyb(&[], &self.dy_map, &self.dy_map, &[-0.5 * r]);
        Ok(())
    }

    fn apply(&self, r: &Array) -> Array {
        let mut out = self.map_x.apply(r);
        out += &self.map_y.apply(r);
        out += &self.correlation.apply(r);
        out
    }

    fn apply_mixed(&self, r: &Array) -> Array {
        self.correlation.apply(r)
    }

    fn apply_direction(&self, direction: usize, r: &Array) -> Array {
        match direction {
            0 => self.map_x.apply(r),
            1 => self.map_y.apply(r),
            _ => Array::zeros(r.len()),
        }
    }

    fn solve_splitting(&self, direction: usize, r: &Array, s: Real) -> Result<Array> {
        match direction {
            0 => self.map_x.solve_splitting(r, -s, 1.0),
            1 => self.map_y.solve_splitting(r, -s, 1.0),
            _ => Ok(r.clone()),
        }
    }
}

// ─── Fokker-Planck ────────────────────────────────────────────────────────────

/// Forward (Fokker-Planck) generator of the log-spot density under local
/// volatility: `∂ₓ[-(r - q - ½σ²) p] + ½∂ₓₓ[σ² p]`.
#[derive(Debug, Clone)]
pub struct FdmLocalVolFwdOp {
    spot: Real,
    risk_free: Arc<dyn YieldTermStructure>,
    dividend: Arc<dyn YieldTermStructure>,
    local_vol: Arc<dyn LocalVolTermStructure>,
    x: Array,
    dx: TripleBandLinearOp,
    dxx: TripleBandLinearOp,
    map_t: TripleBandLinearOp,
}

impl FdmLocalVolFwdOp {
    /// Generator on the log-spot direction 0 of `mesher`.
    pub fn new(
        mesher: Arc<FdmMesherComposite>,
        spot: Real,
        risk_free: Arc<dyn YieldTermStructure>,
        dividend: Arc<dyn YieldTermStructure>,
        local_vol: Arc<dyn LocalVolTermStructure>,
    ) -> Self {
        Self {
            spot,
            risk_free,
            dividend,
            local_vol,
            x: mesher.locations(0),
            dx: TripleBandLinearOp::first_derivative(0, Arc::clone(&mesher)),
            dxx: TripleBandLinearOp::second_derivative(0, Arc::clone(&mesher)),
            map_t: TripleBandLinearOp::new(0, mesher),
        }
    }

    /// Spot level at `t = 0`.
    pub fn spot(&self) -> Real {
        self.spot
    }
}

impl FdmLinearOpComposite for FdmLocalVolFwdOp {
    fn size(&self) -> usize {
        1
    }

    fn set_time(&mut self, t1: Time, t2: Time) -> Result<()> {
        let (r, q) = forward_rates(self.risk_free.as_ref(), self.dividend.as_ref(), t1, t2);
        let t_mid = 0.5 * (t1 + t2);
        let mut v = Array::zeros(self.x.len());
        for i in 0..self.x.len() {
            let sigma = self.local_vol.local_vol(t_mid, self.x[i].exp())?;
            v[i] = sigma * sigma;
        }
        let drift = v.map(|vi| -r + q + 0.5 * vi);
        let convection = self.dx.mult_r(&drift);
        let diffusion = self.dxx.mult_r(&(&v * 0.5));
        self.map_t.axpyb(&[1.0], &convection, &diffusion, &[]);
        Ok(())
    }

    fn apply(&self, r: &Array) -> Array {
        self.map_t.apply(r)
    }

    fn apply_mixed(&self, r: &Array) -> Array {
        Array::zeros(r.len())
    }

    fn apply_direction(&self, direction: usize, r: &Array) -> Array {
        if direction == 0 {
            self.map_t.apply(r)
        } else {
            Array::zeros(r.len())
        }
    }

    fn solve_splitting(&self, direction: usize, r: &Array, s: Real) -> Result<Array> {
        if direction == 0 {
            self.map_t.solve_splitting(r, -s, 1.0)
        } else {
            Ok(r.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::finite_differences::meshers::{Fdm1dMesher, Uniform1dMesher};
    use approx::assert_abs_diff_eq;
    use ql_termstructures::{BlackConstantVol, FlatForward, LocalConstantVol};

    fn log_mesher() -> Arc<FdmMesherComposite> {
        let m: Arc<dyn Fdm1dMesher> = Arc::new(Uniform1dMesher::new(3.0, 6.0, 101).unwrap());
        Arc::new(FdmMesherComposite::from_1d(m).unwrap())
    }

    #[test]
    fn black_scholes_generator_annihilates_the_forward() {
        // e^{x} grows at r - q under the generator: L S = (r - q) S - r S = -q S
        let process = GeneralizedBlackScholesProcess::new(
            100.0,
            Arc::new(FlatForward::new(0.05)),
            Arc::new(FlatForward::new(0.02)),
            Arc::new(BlackConstantVol::new(0.3).unwrap()),
        )
        .unwrap();
        let mesher = log_mesher();
        let mut op = FdmBlackScholesOp::new(Arc::clone(&mesher), &process, 100.0);
        op.set_time(0.0, 0.5).unwrap();
        let s = mesher.locations(0).map(Real::exp);
        let l = op.apply(&s);
        for i in 1..100 {
            assert_abs_diff_eq!(l[i] / s[i], -0.02, epsilon = 1e-3);
        }
    }

    #[test]
    fn local_vol_and_constant_vol_agree_for_flat_surfaces() {
        let process = GeneralizedBlackScholesProcess::new(
            100.0,
            Arc::new(FlatForward::new(0.03)),
            Arc::new(FlatForward::new(0.0)),
            Arc::new(BlackConstantVol::new(0.25).unwrap()),
        )
        .unwrap();
        let local = process.clone().with_local_vol(Arc::new(LocalConstantVol::new(0.25).unwrap()));
        let mesher = log_mesher();
        let mut a = FdmBlackScholesOp::new(Arc::clone(&mesher), &process, 100.0);
        let mut b = FdmBlackScholesOp::new(Arc::clone(&mesher), &local, 100.0);
        a.set_time(0.1, 0.2).unwrap();
        b.set_time(0.1, 0.2).unwrap();
        let f = mesher.locations(0).map(|x| (x - 4.6).max(0.0));
        let (fa, fb) = (a.apply(&f), b.apply(&f));
        for i in 0..101 {
            assert_abs_diff_eq!(fa[i], fb[i], epsilon = 1e-10);
        }
    }

    #[test]
    fn forward_operator_conserves_mass_in_the_interior() {
        let mesher = log_mesher();
        let mut op = FdmLocalVolFwdOp::new(
            Arc::clone(&mesher),
            100.0,
            Arc::new(FlatForward::new(0.05)),
            Arc::new(FlatForward::new(0.0)),
            Arc::new(LocalConstantVol::new(0.2).unwrap()),
        );
        op.set_time(0.0, 0.1).unwrap();
        let x = mesher.locations(0);
        let p = x.map(|v| (-(v - 4.6) * (v - 4.6) / 0.02).exp());
        let dp = op.apply(&p);
        // a density concentrated far from the edges loses no mass
        let total: Real = dp.iter().sum::<Real>() * 0.03;
        assert_abs_diff_eq!(total, 0.0, epsilon = 1e-8);
    }
}
