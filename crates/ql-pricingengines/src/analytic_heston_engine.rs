//! Semi-analytic Heston engine for European options.
//!
//! Prices plain vanilla options from the characteristic function of the
//! log-forward, written in Gatheral's "little trap" form so that the
//! complex logarithm stays on its principal branch.
//!
//! The call price is $C = D_r(T)\,(F P_1 - K P_2)$ with
//!
//! $$P_j = \frac12 + \frac1\pi \int_0^\infty
//!   \Re\left[\frac{e^{i\phi x}\,f_j(\phi)}{i\phi}\right] d\phi,
//!   \qquad x = \ln(F/K)$$
//!
//! and puts follow from parity.

use crate::context::PricingContext;
use num_complex::Complex64;
use ql_core::{ensure, errors::Result, fail, Real, Time};
use ql_instruments::{ExerciseType, OptionType, Payoff, PricingEngine, PricingResults, VanillaOptionArguments};
use ql_math::integrals::{GaussLobattoIntegral, Integrator};
use ql_processes::HestonProcess;
use std::f64::consts::PI;

/// Heston variance dynamics `dv = κ(θ − v)dt + σ√v dW₂`, `dW₁dW₂ = ρdt`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HestonParameters {
    /// Initial variance.
    pub v0: Real,
    /// Mean-reversion speed.
    pub kappa: Real,
    /// Long-run variance.
    pub theta: Real,
    /// Volatility of variance.
    pub sigma: Real,
    /// Spot/variance correlation.
    pub rho: Real,
}

impl HestonParameters {
    /// Check positivity and the correlation range.
    pub fn validate(&self) -> Result<()> {
        ensure!(self.v0 >= 0.0, "negative initial variance {}", self.v0);
        ensure!(self.kappa > 0.0, "mean-reversion speed must be positive, got {}", self.kappa);
        ensure!(self.theta >= 0.0, "negative long-run variance {}", self.theta);
        ensure!(self.sigma > 0.0, "volatility of variance must be positive, got {}", self.sigma);
        ensure!((-1.0..=1.0).contains(&self.rho), "correlation {} outside [-1, 1]", self.rho);
        Ok(())
    }

    /// Heston process on the curves and spot of `context`.
    pub fn process(&self, context: &PricingContext) -> Result<HestonProcess> {
        HestonProcess::new(
            std::sync::Arc::clone(context.risk_free()),
            std::sync::Arc::clone(context.dividend()),
            context.spot()?,
            self.v0,
            self.kappa,
            self.theta,
            self.sigma,
            self.rho,
        )
    }
}

/// Semi-analytic Heston engine.
#[derive(Debug, Clone, Copy)]
pub struct AnalyticHestonEngine {
    params: HestonParameters,
    absolute_accuracy: Real,
    max_evaluations: usize,
}

impl AnalyticHestonEngine {
    /// Engine for the given variance dynamics.
    pub fn new(params: HestonParameters) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            params,
            absolute_accuracy: 1e-10,
            max_evaluations: 100_000,
        })
    }

    /// Absolute accuracy of the probability integrals.
    pub fn with_accuracy(mut self, absolute_accuracy: Real) -> Self {
        self.absolute_accuracy = absolute_accuracy;
        self
    }

    /// The variance dynamics.
    pub fn parameters(&self) -> &HestonParameters {
        &self.params
    }

    // e^{iφx} f_j(φ) / (iφ), real part
    fn integrand(&self, j: usize, phi: Real, x: Real, t: Time) -> Real {
        let HestonParameters {
            v0,
            kappa,
            theta,
            sigma,
            rho,
        } = self.params;
        let phi = phi.max(1e-8);
        let i = Complex64::i();
        let (u, b) = if j == 1 { (0.5, kappa - rho * sigma) } else { (-0.5, kappa) };
        let sigma2 = sigma * sigma;

        let beta = Complex64::new(b, -rho * sigma * phi);
        let d = (beta * beta - sigma2 * (2.0 * u * i * phi - phi * phi)).sqrt();
        let g = (beta - d) / (beta + d);
        let e = (-d * t).exp();
        let big_d = (beta - d) / sigma2 * (1.0 - e) / (1.0 - g * e);
        let big_c = kappa * theta / sigma2 * ((beta - d) * t - 2.0 * ((1.0 - g * e) / (1.0 - g)).ln());
        let f = (big_c + big_d * v0 + i * phi * x).exp();
        (f / (i * phi)).re
    }

    fn probability(&self, j: usize, x: Real, t: Time) -> Result<Real> {
        let f = |phi: Real| self.integrand(j, phi, x, t);
        let mut upper = 32.0;
        while upper < 1e4 && f(upper).abs() > 1e-14 {
            upper *= 2.0;
        }
        let integral = GaussLobattoIntegral::new(self.max_evaluations, self.absolute_accuracy).integrate(f, 0.0, upper)?;
        Ok(0.5 + integral / PI)
    }

    /// Call and put prices for `strike` at `t` from forward and discount.
    pub fn prices(&self, forward: Real, strike: Real, discount: Real, t: Time) -> Result<(Real, Real)> {
        ensure!(t > 0.0, "maturity must be positive, got {t}");
        ensure!(strike > 0.0 && forward > 0.0, "positive forward and strike required");
        let x = (forward / strike).ln();
        let p1 = self.probability(1, x, t)?;
        let p2 = self.probability(2, x, t)?;
        let call = (discount * (forward * p1 - strike * p2)).max(0.0);
        let put = (call - discount * (forward - strike)).max(0.0);
        Ok((call, put))
    }
}

impl PricingEngine<VanillaOptionArguments, PricingContext> for AnalyticHestonEngine {
    fn calculate(&self, args: &VanillaOptionArguments, context: &PricingContext) -> Result<PricingResults> {
        let args = context.rebase_vanilla(args)?;
        ensure!(
            args.exercise.exercise_type() == ExerciseType::European,
            "not a European option"
        );
        ensure!(args.dividends.is_empty(), "cash dividends are not supported");
        let Payoff::PlainVanilla { option_type, strike } = args.payoff else {
            fail!("non-plain payoff given: {}", args.payoff.name());
        };
        let t = args.maturity();
        let discount = context.risk_free().discount(t);
        let forward = context.spot()? * context.dividend().discount(t) / discount;
        let (call, put) = self.prices(forward, strike, discount, t)?;
        Ok(PricingResults::from_value(match option_type {
            OptionType::Call => call,
            OptionType::Put => put,
        }))
    }
}
