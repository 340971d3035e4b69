//! QD+ approximation of American options.
//!
//! The exercise boundary of the put is found pointwise by root finding on
//! the QD+ boundary equation at Chebyshev collocation times, interpolated
//! in `sqrt(τ)`, and the early-exercise premium is integrated against the
//! interpolated boundary.  Calls are priced by put-call symmetry
//! `C(S, K, r, q) = P(K, S, q, r)`.
//!
//! Reference: Li, M. (2009), "Analytical approximations for the critical
//! stock prices of American options: a performance comparison";
//! Andersen, Lake, Offengenden (2016), "High-performance American option
//! pricing".

use crate::{black_calculator::BlackCalculator, context::PricingContext};
use ql_core::{ensure, errors::Result, fail, fail_domain, MemoTable, Real, Size, Time};
use ql_instruments::{ExerciseType, OptionType, Payoff, PricingEngine, PricingResults, VanillaOptionArguments};
use ql_math::{
    comparison::close_to,
    integrals::{GaussLobattoIntegral, Integrator, TanhSinhIntegral},
    interpolations::{ChebyshevInterpolation, ChebyshevPointsType, Interpolation1D},
    normal_cdf, normal_pdf,
    solvers1d::Solver1D,
};
use std::cell::Cell;
use tracing::debug;

/// Root finder used on the boundary equation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SolverType {
    /// Newton-Raphson with the analytic first derivative.
    Newton,
    /// Brent on an expanded bracket.
    Brent,
    /// Ridder on an expanded bracket.
    Ridder,
    /// Halley iteration, Brent fallback.
    #[default]
    Halley,
    /// Super-Halley iteration, Brent fallback.
    SuperHalley,
}

impl SolverType {
    fn default_max_iterations(self) -> Size {
        match self {
            SolverType::Newton | SolverType::Brent | SolverType::Ridder => 100,
            SolverType::Halley | SolverType::SuperHalley => 10,
        }
    }
}

/// Quadrature of the early-exercise premium.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PremiumIntegration {
    /// Tanh-sinh with relative tolerance `eps`.
    #[default]
    TanhSinh,
    /// Adaptive Gauss-Lobatto with relative accuracy `0.1·eps`.
    GaussLobatto,
}

/// Settings of [`QdPlusAmericanEngine`].
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct QdPlusConfig {
    /// Number of Chebyshev collocation points.
    pub interpolation_points: Size,
    /// Boundary root finder.
    pub solver: SolverType,
    /// Accuracy of the root finder and of the premium quadrature.
    pub eps: Real,
    /// Iteration cap; `None` picks 100 for bracketing/Newton, 10 for Halley.
    pub max_iter: Option<Size>,
    /// Premium quadrature.
    pub integration: PremiumIntegration,
}

impl Default for QdPlusConfig {
    fn default() -> Self {
        Self {
            interpolation_points: 8,
            solver: SolverType::Halley,
            eps: 1e-6,
            max_iter: None,
            integration: PremiumIntegration::TanhSinh,
        }
    }
}

impl QdPlusConfig {
    /// Check the settings.
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.interpolation_points >= 2,
            "at least two interpolation points are required, {} given",
            self.interpolation_points
        );
        ensure!(self.eps > 0.0, "eps must be positive, got {}", self.eps);
        ensure!(self.max_iter != Some(0), "iteration cap must be positive");
        Ok(())
    }

    fn max_iterations(&self) -> Size {
        self.max_iter.unwrap_or_else(|| self.solver.default_max_iterations())
    }
}

/// Boundary level at expiry `x_max(K, r, q)` of an American put.
///
/// Fails for the double-boundary regime `r < 0`, `q < r`.
pub fn x_max(strike: Real, r: Real, q: Real) -> Result<Real> {
    if r > 0.0 && q > 0.0 {
        Ok(strike * (r / q).min(1.0))
    } else if r > 0.0 && q <= 0.0 {
        Ok(strike)
    } else if r == 0.0 && q < 0.0 {
        Ok(strike)
    } else if r == 0.0 && q >= 0.0 {
        Ok(0.0)
    } else if r < 0.0 && q >= 0.0 {
        Ok(0.0)
    } else if r < 0.0 && q < r {
        Ok(strike)
    } else if r < 0.0 && q >= r && q < 0.0 {
        Ok(0.0)
    } else {
        fail!("internal error in x_max: strike {strike}, r {r}, q {q}")
    }
}

// Black put quantities at one trial spot.
#[derive(Debug, Clone, Copy)]
struct BoundaryState {
    s: Real,
    dp: Real,
    dm: Real,
    phi_dp: Real,
    n_dp: Real,
    npv: Real,
    theta: Real,
    charm: Real,
}

/// The QD+ boundary equation `f(S) = 0` at time to maturity `tau`.
#[derive(Debug)]
struct QdPlusBoundaryEvaluator {
    tau: Time,
    k: Real,
    sigma: Real,
    v: Real,
    r: Real,
    q: Real,
    dr: Real,
    dq: Real,
    lambda: Real,
    alpha: Real,
    beta: Real,
    x_max: Real,
    x_min: Real,
    evaluations: Cell<Size>,
}

impl QdPlusBoundaryEvaluator {
    fn new(s: Real, k: Real, r: Real, q: Real, sigma: Real, tau: Time) -> Result<Self> {
        let sigma2 = sigma * sigma;
        let v = sigma * tau.sqrt();
        let dr = (-r * tau).exp();
        let dq = (-q * tau).exp();
        let ddr = if (r * tau).abs() > 1e-5 {
            r / (1.0 - dr)
        } else {
            1.0 / (tau * (1.0 - 0.5 * r * tau * (1.0 - r * tau / 3.0)))
        };
        let omega = 2.0 * (r - q) / sigma2;
        let root = ((omega - 1.0).powi(2) + 8.0 * ddr / sigma2).sqrt();
        let lambda = 0.5 * (-(omega - 1.0) - root);
        let lambda_prime = 2.0 * ddr * ddr / (sigma2 * root);
        let alpha = 2.0 * dr / (sigma2 * (2.0 * lambda + omega - 1.0));
        let beta = alpha * (ddr + lambda_prime / (2.0 * lambda + omega - 1.0)) - lambda;
        let x_max = x_max(k, r, q)?;
        let x_min = Real::EPSILON * 1e4 * (0.5 * (k + s)).min(x_max);
        Ok(Self {
            tau,
            k,
            sigma,
            v,
            r,
            q,
            dr,
            dq,
            lambda,
            alpha,
            beta,
            x_max,
            x_min,
            evaluations: Cell::new(0),
        })
    }

    fn state(&self, s: Real) -> BoundaryState {
        let s = s.max(Real::EPSILON);
        let dp = (s * self.dq / (self.k * self.dr)).ln() / self.v + 0.5 * self.v;
        let dm = dp - self.v;
        let phi_dp = normal_cdf(-dp);
        let phi_dm = normal_cdf(-dm);
        let n_dp = normal_pdf(dp);
        let npv = self.dr * self.k * phi_dm - s * self.dq * phi_dp;
        let theta = self.r * self.k * self.dr * phi_dm
            - self.q * s * self.dq * phi_dp
            - self.sigma * self.sigma * s / (2.0 * self.v) * self.dq * n_dp;
        let charm = -self.dq
            * (n_dp * ((self.r - self.q) / self.v - dm / (2.0 * self.tau)) + self.q * phi_dp);
        BoundaryState {
            s,
            dp,
            dm,
            phi_dp,
            n_dp,
            npv,
            theta,
            charm,
        }
    }

    fn value(&self, s: Real) -> Real {
        self.evaluations.set(self.evaluations.get() + 1);
        self.value_at(&self.state(s))
    }

    fn value_at(&self, st: &BoundaryState) -> Real {
        let intrinsic = self.k - st.s;
        if close_to(intrinsic, st.npv) {
            (1.0 - self.dq * st.phi_dp) * st.s + self.alpha * st.theta / self.dr
        } else {
            let c0 = -self.beta - self.lambda + self.alpha * st.theta / (self.dr * (intrinsic - st.npv));
            (1.0 - self.dq * st.phi_dp) * st.s + (self.lambda + c0) * (intrinsic - st.npv)
        }
    }

    fn derivative_at(&self, st: &BoundaryState) -> Real {
        1.0 - self.dq * st.phi_dp
            + self.dq / self.v * st.n_dp
            + self.beta * (1.0 - self.dq * st.phi_dp)
            + self.alpha / self.dr * st.charm
    }

    fn second_derivative_at(&self, st: &BoundaryState) -> Real {
        let gamma = st.n_dp * self.dq / (self.v * st.s);
        let colour = gamma
            * (self.q + (self.r - self.q) * st.dp / self.v + (1.0 - st.dp * st.dm) / (2.0 * self.tau));
        self.dq * (st.n_dp / (st.s * self.v) - st.n_dp * st.dp / (st.s * self.v * self.v))
            + self.beta * gamma
            + self.alpha / self.dr * colour
    }

    // (f, f', f'') with one counted evaluation
    fn all(&self, s: Real) -> (Real, Real, Real) {
        self.evaluations.set(self.evaluations.get() + 1);
        let st = self.state(s);
        (self.value_at(&st), self.derivative_at(&st), self.second_derivative_at(&st))
    }

    fn evaluations(&self) -> Size {
        self.evaluations.get()
    }
}

/// American option engine based on the QD+ boundary approximation.
#[derive(Debug, Clone, Copy, Default)]
pub struct QdPlusAmericanEngine {
    config: QdPlusConfig,
}

// Put value with the boundary it was integrated against.
struct PutValue {
    value: Real,
    boundary: Option<(Real, ChebyshevInterpolation)>,
}

impl QdPlusAmericanEngine {
    /// Engine with the given settings.
    pub fn new(config: QdPlusConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// The settings.
    pub fn config(&self) -> &QdPlusConfig {
        &self.config
    }

    /// Exercise boundary of the put at time to maturity `tau`, with the
    /// number of boundary-equation evaluations spent.
    #[allow(clippy::too_many_arguments)]
    pub fn put_exercise_boundary_at_tau(
        &self,
        s: Real,
        k: Real,
        r: Real,
        q: Real,
        vol: Real,
        _t: Time,
        tau: Time,
    ) -> Result<(Size, Real)> {
        self.boundary_at_tau(s, k, r, q, vol, tau, None)
    }

    // `guess` seeds the bracketed solvers, typically with the boundary at
    // a neighbouring collocation time.
    #[allow(clippy::too_many_arguments)]
    fn boundary_at_tau(
        &self,
        s: Real,
        k: Real,
        r: Real,
        q: Real,
        vol: Real,
        tau: Time,
        guess: Option<Real>,
    ) -> Result<(Size, Real)> {
        if tau < Real::EPSILON {
            return Ok((0, x_max(k, r, q)?));
        }
        let eval = QdPlusBoundaryEvaluator::new(s, k, r, q, vol, tau)?;
        let max_iter = self.config.max_iterations();
        let eps = self.config.eps;

        let x = match self.config.solver {
            SolverType::Brent | SolverType::Newton | SolverType::Ridder => {
                self.bracketed_solve(&eval, s, self.config.solver, max_iter, guess)?
            }
            SolverType::Halley | SolverType::SuperHalley => {
                let mut x = eval.x_max;
                let mut fx;
                let mut converged;
                loop {
                    let x_old = x;
                    let (f, f_prime, f_second) = eval.all(x);
                    fx = f;
                    let lf = fx * f_second / (f_prime * f_prime);
                    let step = if self.config.solver == SolverType::Halley {
                        1.0 / (1.0 - 0.5 * lf) * fx / f_prime
                    } else {
                        (1.0 + 0.5 * lf / (1.0 - lf)) * fx / f_prime
                    };
                    x = eval.x_min.max(x - step);
                    converged = (x - x_old).abs() < 0.5 * eps;
                    if converged || !x.is_finite() || eval.evaluations() >= max_iter {
                        break;
                    }
                }
                if !converged && !close_to(fx.abs(), 0.0) {
                    debug!(
                        tau,
                        evaluations = eval.evaluations(),
                        residual = fx,
                        "Halley iteration did not converge, falling back to Brent"
                    );
                    let guess = if x.is_finite() { Some(x) } else { guess };
                    self.bracketed_solve(&eval, s, SolverType::Brent, 10 * max_iter, guess)?
                } else {
                    x
                }
            }
        };
        Ok((eval.evaluations(), x))
    }

    fn bracketed_solve(
        &self,
        eval: &QdPlusBoundaryEvaluator,
        s: Real,
        solver: SolverType,
        max_iter: Size,
        guess: Option<Real>,
    ) -> Result<Real> {
        let x_min = eval.x_min;
        let fx_min = eval.value(x_min);
        let mut x_max = (0.5 * (eval.x_max + s)).max(eval.x_max);
        while eval.value(x_max) * fx_min > 0.0 && eval.evaluations() < max_iter {
            x_max *= 2.0;
        }
        let guess = guess.unwrap_or(0.5 * (x_max + s));
        let guess = if guess >= x_max {
            x_max * (1.0 - Real::EPSILON)
        } else if guess <= x_min {
            x_min * (1.0 + Real::EPSILON)
        } else {
            guess
        };
        let root = Solver1D::new(self.config.eps, max_iter)?;
        let f = |x: Real| eval.value(x);
        let found = match solver {
            SolverType::Newton => root.newton(
                |x: Real| {
                    eval.evaluations.set(eval.evaluations.get() + 1);
                    let st = eval.state(x);
                    (eval.value_at(&st), eval.derivative_at(&st))
                },
                guess,
                x_min,
                x_max,
            )?,
            SolverType::Ridder => root.ridder(f, x_min, x_max)?,
            _ => root.brent(f, x_min, x_max)?,
        };
        Ok(found.x)
    }

    /// Chebyshev interpolant of `ln(B(τ)/x_max)²` on `z ∈ [-1, 1]` with
    /// `τ = T(1+z)²/4`.
    pub fn put_exercise_boundary(
        &self,
        s: Real,
        k: Real,
        r: Real,
        q: Real,
        vol: Real,
        t: Time,
    ) -> Result<ChebyshevInterpolation> {
        let x_max = x_max(k, r, q)?;
        let n = self.config.interpolation_points;
        let mut solves: MemoTable<(Size, Real)> = MemoTable::with_slots(n);
        let mut node: usize = 0;
        let boundary = ChebyshevInterpolation::try_from_fn(
            n,
            |z| {
                let tau = 0.25 * t * (1.0 + z).powi(2);
                let guess = node.checked_sub(1).and_then(|prev| solves.get(prev)).map(|&(_, b)| b);
                let &(_, b) = solves.get_or_try_insert_with(node, || self.boundary_at_tau(s, k, r, q, vol, tau, guess))?;
                node += 1;
                Ok((b / x_max).ln().powi(2))
            },
            ChebyshevPointsType::SecondKind,
        )?;
        let evaluations: Size = (0..solves.len()).filter_map(|i| solves.get(i)).map(|&(e, _)| e).sum();
        debug!(nodes = solves.filled(), evaluations, "QD+ exercise boundary solved");
        Ok(boundary)
    }

    /// American put value with the degenerate inputs handled explicitly:
    /// zero strike, zero spot, no early exercise and zero volatility.
    pub fn calculate_put_with_edge_cases(&self, s: Real, k: Real, r: Real, q: Real, vol: Real, t: Time) -> Result<Real> {
        Ok(self.put_with_edge_cases(s, k, r, q, vol, t)?.value)
    }

    /// American put value from the QD+ boundary.
    ///
    /// Fails in the double-boundary regime `r < 0`, `q < r`.
    pub fn calculate_put(&self, s: Real, k: Real, r: Real, q: Real, vol: Real, t: Time) -> Result<Real> {
        Ok(self.put_from_boundary(s, k, r, q, vol, t)?.value)
    }

    fn put_with_edge_cases(&self, s: Real, k: Real, r: Real, q: Real, vol: Real, t: Time) -> Result<PutValue> {
        let plain = |value: Real| PutValue { value, boundary: None };
        if close_to(k, 0.0) {
            return Ok(plain(0.0));
        }
        if close_to(s, 0.0) {
            return Ok(plain(k.max(k * (-r * t).exp())));
        }
        if r <= 0.0 && r <= q {
            let black = BlackCalculator::new(
                &Payoff::vanilla(OptionType::Put, k),
                s * ((r - q) * t).exp(),
                vol * t.sqrt(),
                (-r * t).exp(),
            )?;
            return Ok(plain(black.value().max(0.0)));
        }
        if close_to(vol, 0.0) {
            let intrinsic = |t: Time| (k * (-r * t).exp() - s * (-q * t).exp()).max(0.0);
            let extremum = if close_to(r, q) {
                Real::MAX
            } else {
                (r * k / (q * s)).ln() / (r - q)
            };
            let value = if extremum > 0.0 && extremum < t {
                intrinsic(0.0).max(intrinsic(t)).max(intrinsic(extremum))
            } else {
                intrinsic(0.0).max(intrinsic(t))
            };
            return Ok(plain(value));
        }
        self.put_from_boundary(s, k, r, q, vol, t)
    }

    fn put_from_boundary(&self, s: Real, k: Real, r: Real, q: Real, vol: Real, t: Time) -> Result<PutValue> {
        if r < 0.0 && q < r {
            fail_domain!("double-boundary case q<r<0 for a put option is not supported");
        }
        let x_max = x_max(k, r, q)?;
        let boundary = self.put_exercise_boundary(s, k, r, q, vol, t)?;

        let integrand = |z: Real| -> Real {
            let tt = z * z;
            let qv = boundary.value(2.0 * ((t - tt).max(0.0) / t).sqrt() - 1.0);
            let b_t = x_max * (-qv.max(0.0).sqrt()).exp();
            let dr = (-r * tt).exp();
            let dq = (-q * tt).exp();
            let v = vol * tt.sqrt();
            if v >= Real::EPSILON {
                if b_t > Real::EPSILON {
                    let dp = (s * dq / (b_t * dr)).ln() / v + 0.5 * v;
                    2.0 * z * (r * k * dr * normal_cdf(-dp + v) - q * s * dq * normal_cdf(-dp))
                } else {
                    0.0
                }
            } else if close_to(s * dq, b_t * dr) {
                z * (r * k * dr - q * s * dq)
            } else if b_t * dr > s * dq {
                2.0 * z * (r * k * dr - q * s * dq)
            } else {
                0.0
            }
        };
        let eps = self.config.eps;
        let add_on = match self.config.integration {
            PremiumIntegration::TanhSinh => TanhSinhIntegral::new(eps, 12).integrate(integrand, 0.0, t.sqrt())?,
            PremiumIntegration::GaussLobatto => GaussLobattoIntegral::new(100_000, Real::MAX)
                .with_relative_accuracy(0.1 * eps)
                .integrate(integrand, 0.0, t.sqrt())?,
        };
        ensure!(add_on > -10.0 * eps, "negative early exercise value {add_on}");

        let european = BlackCalculator::new(
            &Payoff::vanilla(OptionType::Put, k),
            s * ((r - q) * t).exp(),
            vol * t.sqrt(),
            (-r * t).exp(),
        )?
        .value();
        Ok(PutValue {
            value: european.max(0.0) + add_on.max(0.0),
            boundary: Some((x_max, boundary)),
        })
    }
}

// Boundary levels at the collocation times, increasing in time to maturity.
fn boundary_nodes(x_max: Real, boundary: &ChebyshevInterpolation, t: Time) -> (Vec<Time>, Vec<Real>) {
    boundary
        .nodes()
        .iter()
        .zip(boundary.values())
        .map(|(&z, &y)| (0.25 * t * (1.0 + z).powi(2), x_max * (-y.max(0.0).sqrt()).exp()))
        .unzip()
}

impl PricingEngine<VanillaOptionArguments, PricingContext> for QdPlusAmericanEngine {
    fn calculate(&self, args: &VanillaOptionArguments, context: &PricingContext) -> Result<PricingResults> {
        let args = context.rebase_vanilla(args)?;
        ensure!(
            args.exercise.exercise_type() == ExerciseType::American,
            "not an American option"
        );
        ensure!(args.dividends.is_empty(), "cash dividends are not supported");
        let Payoff::PlainVanilla { option_type, strike } = args.payoff else {
            fail!("non-plain payoff given: {}", args.payoff.name());
        };

        let t = args.maturity();
        let spot = context.spot()?;
        ensure!(spot >= 0.0, "negative underlying given: {spot}");
        ensure!(strike >= 0.0, "strike must be non-negative: {strike}");
        let r = -context.risk_free().discount(t).ln() / t;
        let q = -context.dividend().discount(t).ln() / t;
        let vol = context.black_vol().black_vol(t, strike);
        ensure!(vol >= 0.0, "negative volatility given: {vol}");

        let put = match option_type {
            OptionType::Put => self.put_with_edge_cases(spot, strike, r, q, vol, t)?,
            OptionType::Call => self.put_with_edge_cases(strike, spot, q, r, vol, t)?,
        };

        let mut results = PricingResults::from_value(put.value);
        if let Some((x_max, boundary)) = &put.boundary {
            let (times, mut levels) = boundary_nodes(*x_max, boundary, t);
            if option_type == OptionType::Call {
                // symmetric put has spot K and strike S
                for b in &mut levels {
                    *b = spot * strike / *b;
                }
            }
            results.insert("exerciseBoundaryAtExpiry", levels[0]);
            results.insert("exerciseBoundaryTimes", times);
            results.insert("exerciseBoundary", levels);
        }
        Ok(results)
    }
}
