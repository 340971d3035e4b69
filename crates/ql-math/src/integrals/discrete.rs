//! Quadrature on tabulated data.
//!
//! These rules integrate values already sampled on a (possibly
//! non-uniform) grid, e.g. a density on a finite-difference mesh.

use super::Integrator;
use ql_core::{ensure, Real, Result};

/// Trapezoid rule over samples `f` at abscissae `x`.
pub fn discrete_trapezoid(x: &[Real], f: &[Real]) -> Result<Real> {
    ensure!(
        x.len() == f.len(),
        "abscissa/ordinate length mismatch: {} vs {}",
        x.len(),
        f.len()
    );
    Ok(x
        .windows(2)
        .zip(f.windows(2))
        .map(|(xs, fs)| 0.5 * (xs[1] - xs[0]) * (fs[0] + fs[1]))
        .sum())
}

/// Simpson rule for non-uniform abscissae, pairing intervals and closing
/// an odd trailing interval with the trapezoid rule.
pub fn discrete_simpson(x: &[Real], f: &[Real]) -> Result<Real> {
    ensure!(
        x.len() == f.len(),
        "abscissa/ordinate length mismatch: {} vs {}",
        x.len(),
        f.len()
    );
    let n = x.len();
    let mut sum = 0.0;
    let mut j = 0;
    while j + 2 < n {
        let dxj = x[j + 1] - x[j];
        let dxj1 = x[j + 2] - x[j + 1];
        let alpha = -dxj1 * (2.0 * x[j] - 3.0 * x[j + 1] + x[j + 2]);
        let dd = x[j + 2] - x[j];
        let k = dd / (6.0 * dxj1 * dxj);
        let beta = dd * dd;
        let gamma = dxj * (x[j] - 3.0 * x[j + 1] + 2.0 * x[j + 2]);
        sum += k * alpha * f[j] + k * beta * f[j + 1] + k * gamma * f[j + 2];
        j += 2;
    }
    if n >= 2 && n % 2 == 0 {
        sum += 0.5 * (x[n - 1] - x[n - 2]) * (f[n - 1] + f[n - 2]);
    }
    Ok(sum)
}

/// Integrates a function by sampling it on `evaluations` uniform points
/// and applying [`discrete_simpson`].
#[derive(Debug, Clone, Copy)]
pub struct DiscreteSimpsonIntegrator {
    evaluations: usize,
}

impl DiscreteSimpsonIntegrator {
    /// Create an integrator using `evaluations` sample points (at least 2).
    pub fn new(evaluations: usize) -> Result<Self> {
        ensure!(evaluations >= 2, "at least two evaluation points are required");
        Ok(Self { evaluations })
    }
}

impl Integrator for DiscreteSimpsonIntegrator {
    fn integrate<F: Fn(Real) -> Real>(&self, f: F, a: Real, b: Real) -> Result<Real> {
        let n = self.evaluations;
        let dx = (b - a) / (n - 1) as Real;
        let x: Vec<Real> = (0..n).map(|i| a + i as Real * dx).collect();
        let fx: Vec<Real> = x.iter().map(|&v| f(v)).collect();
        discrete_simpson(&x, &fx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn simpson_is_exact_for_quadratics_on_uneven_grid() {
        let x = [0.0, 0.1, 0.35, 0.5, 0.9];
        let f: Vec<Real> = x.iter().map(|&v| v * v - v).collect();
        let exact = 0.9_f64.powi(3) / 3.0 - 0.9 * 0.9 / 2.0;
        assert_abs_diff_eq!(discrete_simpson(&x, &f).unwrap(), exact, epsilon = 1e-12);
    }

    #[test]
    fn trapezoid_on_linear_data() {
        let x = [0.0, 1.0, 3.0];
        let f = [0.0, 1.0, 3.0];
        assert_abs_diff_eq!(discrete_trapezoid(&x, &f).unwrap(), 4.5, epsilon = 1e-14);
        assert!(discrete_trapezoid(&x, &f[..2]).is_err());
    }

    #[test]
    fn uniform_integrator() {
        let v = DiscreteSimpsonIntegrator::new(101)
            .unwrap()
            .integrate(|x: Real| x.exp(), 0.0, 1.0)
            .unwrap();
        assert_abs_diff_eq!(v, 1.0_f64.exp() - 1.0, epsilon = 1e-8);
    }
}
