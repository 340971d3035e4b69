//! Matrix decompositions used by correlated path generation and
//! statistics: Cholesky, symmetric square root, SVD.

use crate::array::Array;
use crate::matrix::Matrix;
use nalgebra::DMatrix;
use ql_core::{ensure, fail, Real, Result};

/// Lower-triangular Cholesky factor `L` with `L Lᵀ = m`.
///
/// With `flexible = true` a positive semi-definite input is accepted and
/// columns that would need the square root of a non-positive pivot are
/// zeroed.
pub fn cholesky_decomposition(m: &Matrix, flexible: bool) -> Result<Matrix> {
    ensure!(m.is_square(), "cholesky: matrix is not square");
    let n = m.rows();
    let mut l = Matrix::zeros(n, n);
    for i in 0..n {
        for j in i..n {
            let mut sum = m[(i, j)];
            for k in 0..i {
                sum -= l[(i, k)] * l[(j, k)];
            }
            if i == j {
                if sum <= 0.0 {
                    if !flexible || sum < -1e-12 * m[(i, i)].abs().max(1.0) {
                        fail!("cholesky: matrix is not positive definite");
                    }
                    l[(i, i)] = 0.0;
                } else {
                    l[(i, i)] = sum.sqrt();
                }
            } else if l[(i, i)] == 0.0 {
                l[(j, i)] = 0.0;
            } else {
                l[(j, i)] = sum / l[(i, i)];
            }
        }
    }
    Ok(l)
}

/// Symmetric square root via the spectral decomposition, with negative
/// eigenvalues floored at zero.
pub fn pseudo_sqrt(m: &Matrix) -> Result<Matrix> {
    ensure!(m.is_square(), "pseudo_sqrt: matrix is not square");
    let n = m.rows();
    for i in 0..n {
        for j in 0..i {
            ensure!(
                (m[(i, j)] - m[(j, i)]).abs() <= 1e-10 * (1.0 + m[(i, j)].abs()),
                "pseudo_sqrt: matrix is not symmetric"
            );
        }
    }
    let eig = m.inner().clone().symmetric_eigen();
    let sqrt_vals = eig.eigenvalues.map(|v| v.max(0.0).sqrt());
    let v = &eig.eigenvectors;
    Ok(Matrix::from(
        v * DMatrix::from_diagonal(&sqrt_vals) * v.transpose(),
    ))
}

/// Thin singular value decomposition `m = U diag(s) Vᵀ`.
#[derive(Debug, Clone)]
pub struct Svd {
    /// Left singular vectors (`rows × k`).
    pub u: Matrix,
    /// Singular values, descending.
    pub singular_values: Array,
    /// Transposed right singular vectors (`k × cols`).
    pub v_t: Matrix,
}

impl Svd {
    /// Decompose `m`.
    pub fn new(m: &Matrix) -> Result<Self> {
        let mut svd = m.inner().clone().svd(true, true);
        svd.sort_by_singular_values();
        let (Some(u), Some(v_t)) = (svd.u, svd.v_t) else {
            fail!("svd: decomposition did not produce singular vectors");
        };
        Ok(Self {
            u: Matrix::from(u),
            singular_values: Array::from(svd.singular_values),
            v_t: Matrix::from(v_t),
        })
    }

    /// Solve the least-squares problem `min |m x - b|` dropping singular
    /// values below `threshold · s_max`.
    pub fn solve(&self, b: &Array, threshold: Real) -> Array {
        let s = &self.singular_values;
        let cutoff = threshold * s.first().unwrap_or(0.0);
        let k = s.len();
        let mut out = Array::zeros(self.v_t.cols());
        for i in 0..k {
            if s[i] > cutoff && s[i] > 0.0 {
                let ub: Real = (0..self.u.rows()).map(|r| self.u[(r, i)] * b[r]).sum();
                let w = ub / s[i];
                for c in 0..out.len() {
                    out[c] += w * self.v_t[(i, c)];
                }
            }
        }
        out
    }

    /// Number of singular values above `threshold · s_max`.
    pub fn rank(&self, threshold: Real) -> usize {
        let cutoff = threshold * self.singular_values.first().unwrap_or(0.0);
        self.singular_values.iter().filter(|&&s| s > cutoff).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn reconstruct(l: &Matrix) -> Matrix {
        l * &l.transpose()
    }

    #[test]
    fn cholesky_of_correlation() {
        let m = Matrix::from_row_slice(2, 2, &[1.0, 0.5, 0.5, 1.0]);
        let l = cholesky_decomposition(&m, false).unwrap();
        assert_abs_diff_eq!(l[(1, 0)], 0.5, epsilon = 1e-14);
        assert_abs_diff_eq!(l[(1, 1)], 0.75_f64.sqrt(), epsilon = 1e-14);
        assert_eq!(l[(0, 1)], 0.0);
    }

    #[test]
    fn cholesky_rejects_indefinite_unless_flexible() {
        let singular = Matrix::from_row_slice(2, 2, &[1.0, 1.0, 1.0, 1.0]);
        assert!(cholesky_decomposition(&singular, false).is_err());
        let l = cholesky_decomposition(&singular, true).unwrap();
        let back = reconstruct(&l);
        assert_abs_diff_eq!(back[(1, 1)], 1.0, epsilon = 1e-12);
        let bad = Matrix::from_row_slice(2, 2, &[1.0, 2.0, 2.0, 1.0]);
        assert!(cholesky_decomposition(&bad, true).is_err());
    }

    #[test]
    fn pseudo_sqrt_squares_back() {
        let m = Matrix::from_row_slice(3, 3, &[1.0, 0.3, 0.2, 0.3, 1.0, 0.1, 0.2, 0.1, 1.0]);
        let r = pseudo_sqrt(&m).unwrap();
        let back = &r * &r;
        for i in 0..3 {
            for j in 0..3 {
                assert_abs_diff_eq!(back[(i, j)], m[(i, j)], epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn svd_solves_overdetermined_system() {
        // y = 1 + 2x sampled exactly
        let a = Matrix::from_row_slice(4, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0, 1.0, 3.0]);
        let b = Array::from_slice(&[1.0, 3.0, 5.0, 7.0]);
        let svd = Svd::new(&a).unwrap();
        let x = svd.solve(&b, 1e-12);
        assert_abs_diff_eq!(x[0], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(x[1], 2.0, epsilon = 1e-12);
        assert_eq!(svd.rank(1e-12), 2);
    }
}
