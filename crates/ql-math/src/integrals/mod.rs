//! Numerical integration.
//!
//! All integrators implement [`Integrator`].  Adaptive rules carry an
//! absolute accuracy and an evaluation cap; exceeding the cap is a
//! [`ql_core::Error::Runtime`].

mod discrete;
mod gauss_kronrod;
mod gauss_lobatto;
mod tanh_sinh;

pub use discrete::{discrete_simpson, discrete_trapezoid, DiscreteSimpsonIntegrator};
pub use gauss_kronrod::GaussKronrodAdaptive;
pub use gauss_lobatto::GaussLobattoIntegral;
pub use tanh_sinh::TanhSinhIntegral;

use ql_core::{fail, Real, Result};

/// A numerical integrator over a finite interval.
pub trait Integrator {
    /// Integrate `f` on `[a, b]`.
    fn integrate<F: Fn(Real) -> Real>(&self, f: F, a: Real, b: Real) -> Result<Real>;
}

/// Composite Simpson rule with successive interval halving.
#[derive(Debug, Clone)]
pub struct SimpsonIntegral {
    accuracy: Real,
    max_evaluations: usize,
}

impl SimpsonIntegral {
    /// Create a Simpson integrator.
    pub fn new(accuracy: Real, max_evaluations: usize) -> Self {
        Self {
            accuracy,
            max_evaluations,
        }
    }
}

impl Integrator for SimpsonIntegral {
    fn integrate<F: Fn(Real) -> Real>(&self, f: F, a: Real, b: Real) -> Result<Real> {
        if a == b {
            return Ok(0.0);
        }
        // trapezoid refinement, Simpson = (4 T_2n - T_n) / 3
        let mut n = 1usize;
        let mut h = b - a;
        let mut trap = 0.5 * h * (f(a) + f(b));
        let mut evals = 2usize;
        let mut simpson = trap;
        loop {
            let mid: Real = (0..n).map(|i| f(a + (i as Real + 0.5) * h)).sum();
            evals += n;
            let next_trap = 0.5 * (trap + h * mid);
            let next = (4.0 * next_trap - trap) / 3.0;
            if n > 1 && (next - simpson).abs() <= self.accuracy {
                return Ok(next);
            }
            if evals >= self.max_evaluations {
                fail!(
                    "Simpson: max evaluations ({}) exceeded",
                    self.max_evaluations
                );
            }
            simpson = next;
            trap = next_trap;
            n *= 2;
            h *= 0.5;
        }
    }
}

/// Composite trapezoid rule with successive interval halving.
#[derive(Debug, Clone)]
pub struct TrapezoidIntegral {
    accuracy: Real,
    max_evaluations: usize,
}

impl TrapezoidIntegral {
    /// Create a trapezoid integrator.
    pub fn new(accuracy: Real, max_evaluations: usize) -> Self {
        Self {
            accuracy,
            max_evaluations,
        }
    }
}

impl Integrator for TrapezoidIntegral {
    fn integrate<F: Fn(Real) -> Real>(&self, f: F, a: Real, b: Real) -> Result<Real> {
        if a == b {
            return Ok(0.0);
        }
        let mut n = 1usize;
        let mut h = b - a;
        let mut trap = 0.5 * h * (f(a) + f(b));
        let mut evals = 2usize;
        loop {
            let mid: Real = (0..n).map(|i| f(a + (i as Real + 0.5) * h)).sum();
            evals += n;
            let next = 0.5 * (trap + h * mid);
            if n > 1 && (next - trap).abs() <= self.accuracy {
                return Ok(next);
            }
            if evals >= self.max_evaluations {
                fail!(
                    "Trapezoid: max evaluations ({}) exceeded",
                    self.max_evaluations
                );
            }
            trap = next;
            n *= 2;
            h *= 0.5;
        }
    }
}
