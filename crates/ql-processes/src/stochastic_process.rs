//! `StochasticProcess`: base traits for stochastic processes.
//!
//! A stochastic process `dX = μ(t,X) dt + σ(t,X) dW` is described by its
//! drift (`μ`), diffusion (`σ`), and an apply method that combines a state
//! with an increment.  The default discretization is Euler; processes with
//! exact transition laws override `expectation`, `std_deviation` and
//! `evolve`.
//!
//! Evaluation returns a `Result` because the volatility lookups behind a
//! process (e.g. a Dupire surface) can fail for arbitrageable inputs.

use ql_core::{errors::Result, Real, Time};
use ql_math::{Array, Matrix};

/// A general multi-dimensional stochastic process.
pub trait StochasticProcess: std::fmt::Debug + Send + Sync {
    /// Number of dimensions.
    fn size(&self) -> usize;

    /// Number of independent Brownian motions driving the process.
    fn factors(&self) -> usize {
        self.size()
    }

    /// Initial value(s) of the process.
    fn initial_values(&self) -> Array;

    /// Drift vector `μ(t, x)`.
    fn drift(&self, t: Time, x: &Array) -> Result<Array>;

    /// Diffusion matrix `σ(t, x)`, dimensioned `size() × factors()`.
    fn diffusion(&self, t: Time, x: &Array) -> Result<Matrix>;

    /// Expectation `E[x(t+Δt) | x(t)]`; Euler by default.
    fn expectation(&self, t0: Time, x0: &Array, dt: Time) -> Result<Array> {
        Ok(self.apply(x0, &(&self.drift(t0, x0)? * dt)))
    }

    /// Standard deviation `σ(t,x) · √Δt`, a `size() × factors()` matrix.
    fn std_deviation(&self, t0: Time, x0: &Array, dt: Time) -> Result<Matrix> {
        Ok(&self.diffusion(t0, x0)? * dt.sqrt())
    }

    /// Covariance `σσᵀ Δt` of the increment over `Δt`.
    fn covariance(&self, t0: Time, x0: &Array, dt: Time) -> Result<Matrix> {
        let sigma = self.diffusion(t0, x0)?;
        Ok(&(&sigma * &sigma.transpose()) * dt)
    }

    /// Advance the state over `Δt` given independent standard normal draws
    /// `dw` (length `factors()`).
    fn evolve(&self, t0: Time, x0: &Array, dt: Time, dw: &Array) -> Result<Array> {
        let e = self.expectation(t0, x0, dt)?;
        let s = self.std_deviation(t0, x0, dt)?;
        Ok(self.apply(&e, &s.mul_vec(dw)))
    }

    /// Combine a state with an increment.
    fn apply(&self, x0: &Array, dx: &Array) -> Array {
        x0 + dx
    }
}

/// A 1-dimensional stochastic process `dX = μ(t,X) dt + σ(t,X) dW`.
pub trait StochasticProcess1D: StochasticProcess {
    /// Initial value of the process.
    fn x0(&self) -> Real;

    /// 1D drift `μ(t, x)`.
    fn drift_1d(&self, t: Time, x: Real) -> Result<Real>;

    /// 1D diffusion `σ(t, x)`.
    fn diffusion_1d(&self, t: Time, x: Real) -> Result<Real>;

    /// Combine a state with an increment.
    fn apply_1d(&self, x0: Real, dx: Real) -> Real {
        x0 + dx
    }

    /// Expected value `E[x(t+Δt) | x(t) = x]`.
    fn expectation_1d(&self, t0: Time, x0: Real, dt: Time) -> Result<Real> {
        Ok(self.apply_1d(x0, self.drift_1d(t0, x0)? * dt))
    }

    /// Standard deviation `σ(t,x) · √Δt`.
    fn std_deviation_1d(&self, t0: Time, x0: Real, dt: Time) -> Result<Real> {
        Ok(self.diffusion_1d(t0, x0)? * dt.sqrt())
    }

    /// Variance of the increment over `Δt`.
    fn variance_1d(&self, t0: Time, x0: Real, dt: Time) -> Result<Real> {
        let s = self.std_deviation_1d(t0, x0, dt)?;
        Ok(s * s)
    }

    /// Advance the state over `Δt` given a standard normal draw `dw`.
    fn evolve_1d(&self, t0: Time, x0: Real, dt: Time, dw: Real) -> Result<Real> {
        let e = self.expectation_1d(t0, x0, dt)?;
        Ok(self.apply_1d(e, self.std_deviation_1d(t0, x0, dt)? * dw))
    }
}

/// Any 1D process is also a multi-dimensional process of size 1.
impl<T: StochasticProcess1D> StochasticProcess for T {
    fn size(&self) -> usize {
        1
    }

    fn factors(&self) -> usize {
        1
    }

    fn initial_values(&self) -> Array {
        Array::from_vec(vec![self.x0()])
    }

    fn drift(&self, t: Time, x: &Array) -> Result<Array> {
        Ok(Array::from_vec(vec![self.drift_1d(t, x[0])?]))
    }

    fn diffusion(&self, t: Time, x: &Array) -> Result<Matrix> {
        Ok(Matrix::from_row_slice(1, 1, &[self.diffusion_1d(t, x[0])?]))
    }

    fn expectation(&self, t0: Time, x0: &Array, dt: Time) -> Result<Array> {
        Ok(Array::from_vec(vec![self.expectation_1d(t0, x0[0], dt)?]))
    }

    fn std_deviation(&self, t0: Time, x0: &Array, dt: Time) -> Result<Matrix> {
        Ok(Matrix::from_row_slice(
            1,
            1,
            &[self.std_deviation_1d(t0, x0[0], dt)?],
        ))
    }

    fn evolve(&self, t0: Time, x0: &Array, dt: Time, dw: &Array) -> Result<Array> {
        Ok(Array::from_vec(vec![self.evolve_1d(t0, x0[0], dt, dw[0])?]))
    }

    fn apply(&self, x0: &Array, dx: &Array) -> Array {
        Array::from_vec(vec![self.apply_1d(x0[0], dx[0])])
    }
}
