//! Regression basis systems for Longstaff-Schwartz.
//!
//! Orthogonal families are built from their monic three-term recurrence
//! `p_{n+1}(x) = (x - α_n) p_n(x) - β_n p_{n-1}(x)` and evaluated weighted
//! by the square root of the family's weight function, which keeps the
//! regression design matrix well scaled.

use ql_core::Real;
use ql_math::linear_least_squares::BasisFunction;
use ql_math::Array;
use std::f64::consts::FRAC_PI_2;

/// Polynomial family of a basis system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LsmBasisType {
    /// `x^n`.
    #[default]
    Monomial,
    /// Laguerre polynomials, weight `e^{-x}`.
    Laguerre,
    /// Hermite polynomials, weight `e^{-x²}`.
    Hermite,
    /// Hyperbolic polynomials, weight `1/cosh x`.
    Hyperbolic,
    /// Legendre polynomials, unit weight.
    Legendre,
    /// Chebyshev polynomials of the first kind, weight `(1-x²)^{-1/2}`.
    Chebyshev,
    /// Chebyshev polynomials of the second kind, weight `(1-x²)^{1/2}`.
    Chebyshev2nd,
}

impl LsmBasisType {
    fn alpha(self, n: usize) -> Real {
        match self {
            LsmBasisType::Laguerre => 2.0 * n as Real + 1.0,
            _ => 0.0,
        }
    }

    fn beta(self, n: usize) -> Real {
        let n_r = n as Real;
        match self {
            LsmBasisType::Monomial => 0.0,
            LsmBasisType::Laguerre => n_r * n_r,
            LsmBasisType::Hermite => 0.5 * n_r,
            LsmBasisType::Hyperbolic => {
                if n == 0 {
                    std::f64::consts::PI
                } else {
                    FRAC_PI_2 * FRAC_PI_2 * n_r * n_r
                }
            }
            LsmBasisType::Legendre => {
                if n == 0 {
                    2.0
                } else {
                    n_r * n_r / (4.0 * n_r * n_r - 1.0)
                }
            }
            LsmBasisType::Chebyshev => match n {
                0 => std::f64::consts::PI,
                1 => 0.5,
                _ => 0.25,
            },
            LsmBasisType::Chebyshev2nd => {
                if n == 0 {
                    FRAC_PI_2
                } else {
                    0.25
                }
            }
        }
    }

    fn sqrt_weight(self, x: Real) -> Real {
        match self {
            LsmBasisType::Monomial | LsmBasisType::Legendre => 1.0,
            LsmBasisType::Laguerre => (-0.5 * x).exp(),
            LsmBasisType::Hermite => (-0.5 * x * x).exp(),
            LsmBasisType::Hyperbolic => (1.0 / x.cosh()).sqrt(),
            LsmBasisType::Chebyshev => (1.0 - x * x).powf(-0.25),
            LsmBasisType::Chebyshev2nd => (1.0 - x * x).powf(0.25),
        }
    }

    /// Monic polynomial of degree `n` at `x`, unweighted.
    pub fn polynomial(self, n: usize, x: Real) -> Real {
        if self == LsmBasisType::Monomial {
            return x.powi(n as i32);
        }
        let mut p_prev = 0.0;
        let mut p = 1.0;
        for k in 0..n {
            let next = (x - self.alpha(k)) * p - self.beta(k) * p_prev;
            p_prev = p;
            p = next;
        }
        p
    }

    /// Basis function of degree `n` at `x`, weighted.
    pub fn weighted_value(self, n: usize, x: Real) -> Real {
        self.sqrt_weight(x) * self.polynomial(n, x)
    }
}

/// The `order + 1` one-dimensional basis functions of degrees `0..=order`.
pub fn path_basis_system(order: usize, basis_type: LsmBasisType) -> Vec<BasisFunction<Real>> {
    (0..=order)
        .map(|n| -> BasisFunction<Real> { Box::new(move |x: &Real| basis_type.weighted_value(n, *x)) })
        .collect()
}

/// All products `Π_j f_{k_j}(x_j)` over the `dim` state components with
/// total degree `Σ k_j ≤ order`, starting with the constant.
pub fn multi_path_basis_system(
    dim: usize,
    order: usize,
    basis_type: LsmBasisType,
) -> Vec<BasisFunction<Array>> {
    let mut degrees = Vec::new();
    let mut current = vec![0usize; dim];
    collect_degrees(0, order, &mut current, &mut degrees);
    degrees.sort_by_key(|d| d.iter().sum::<usize>());

    degrees
        .into_iter()
        .map(|d| -> BasisFunction<Array> {
            Box::new(move |x: &Array| {
                d.iter()
                    .enumerate()
                    .filter(|&(_, &k)| k > 0)
                    .map(|(j, &k)| basis_type.weighted_value(k, x[j]))
                    .product::<Real>()
            })
        })
        .collect()
}

fn collect_degrees(j: usize, budget: usize, current: &mut Vec<usize>, out: &mut Vec<Vec<usize>>) {
    if j == current.len() {
        out.push(current.clone());
        return;
    }
    for k in 0..=budget {
        current[j] = k;
        collect_degrees(j + 1, budget - k, current, out);
    }
    current[j] = 0;
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn monic_recurrences() {
        // Legendre P2 monic: x² - 1/3
        assert_abs_diff_eq!(LsmBasisType::Legendre.polynomial(2, 0.5), 0.25 - 1.0 / 3.0, epsilon = 1e-14);
        // Hermite monic H2: x² - 1/2
        assert_abs_diff_eq!(LsmBasisType::Hermite.polynomial(2, 1.0), 0.5, epsilon = 1e-14);
        // Laguerre monic L1: x - 1, L2: x² - 4x + 2
        assert_abs_diff_eq!(LsmBasisType::Laguerre.polynomial(1, 3.0), 2.0, epsilon = 1e-14);
        assert_abs_diff_eq!(LsmBasisType::Laguerre.polynomial(2, 3.0), -1.0, epsilon = 1e-14);
        // Chebyshev monic T2/2: x² - 1/2
        assert_abs_diff_eq!(LsmBasisType::Chebyshev.polynomial(2, 0.5), -0.25, epsilon = 1e-14);
        // Chebyshev 2nd monic U2/4: x² - 1/4
        assert_abs_diff_eq!(LsmBasisType::Chebyshev2nd.polynomial(2, 0.5), 0.0, epsilon = 1e-14);
    }

    #[test]
    fn weighted_laguerre() {
        let v = LsmBasisType::Laguerre.weighted_value(1, 2.0);
        assert_abs_diff_eq!(v, (-1.0_f64).exp() * 1.0, epsilon = 1e-14);
    }

    #[test]
    fn path_basis_size() {
        let basis = path_basis_system(3, LsmBasisType::Monomial);
        assert_eq!(basis.len(), 4);
        assert_abs_diff_eq!(basis[3](&2.0), 8.0);
    }

    #[test]
    fn multi_path_basis_counts_monomials() {
        // C(dim + order, order) terms
        let basis = multi_path_basis_system(2, 2, LsmBasisType::Monomial);
        assert_eq!(basis.len(), 6);
        let x = Array::from_vec(vec![2.0, 3.0]);
        assert_abs_diff_eq!(basis[0](&x), 1.0);
        let values: Vec<Real> = basis.iter().map(|f| f(&x)).collect();
        for expected in [2.0, 3.0, 4.0, 6.0, 9.0] {
            assert!(values.iter().any(|&v| (v - expected).abs() < 1e-12), "missing {expected}");
        }
        assert_eq!(multi_path_basis_system(3, 3, LsmBasisType::Hermite).len(), 20);
    }
}
