//! `Matrix`: a two-dimensional matrix of reals.
//!
//! A newtype over `nalgebra::DMatrix<f64>` indexed by `(row, col)`.

use crate::array::Array;
use nalgebra::DMatrix;
use ql_core::{Real, Result};
use std::ops::{Add, Index, IndexMut, Mul, Sub};

/// A dynamically-sized 2D matrix of `Real` values.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix(DMatrix<Real>);

impl Matrix {
    /// Create a zero-filled `rows × cols` matrix.
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self(DMatrix::zeros(rows, cols))
    }

    /// Create an identity matrix of size `n × n`.
    pub fn identity(n: usize) -> Self {
        Self(DMatrix::identity(n, n))
    }

    /// Create from row-major data.
    pub fn from_row_slice(rows: usize, cols: usize, data: &[Real]) -> Self {
        Self(DMatrix::from_row_slice(rows, cols, data))
    }

    /// Create a matrix whose `(i, j)` entry is `f(i, j)`.
    pub fn from_fn<F: FnMut(usize, usize) -> Real>(rows: usize, cols: usize, f: F) -> Self {
        Self(DMatrix::from_fn(rows, cols, f))
    }

    /// Build from a list of rows; all rows must share a length.
    pub fn from_rows(rows: &[Vec<Real>]) -> Result<Self> {
        let n = rows.len();
        let m = rows.first().map_or(0, Vec::len);
        ql_core::ensure!(
            rows.iter().all(|r| r.len() == m),
            "ragged rows in matrix construction"
        );
        Ok(Self::from_fn(n, m, |i, j| rows[i][j]))
    }

    /// Number of rows.
    pub fn rows(&self) -> usize {
        self.0.nrows()
    }

    /// Number of columns.
    pub fn cols(&self) -> usize {
        self.0.ncols()
    }

    /// Return `true` if the matrix is square.
    pub fn is_square(&self) -> bool {
        self.0.nrows() == self.0.ncols()
    }

    /// Transposed copy.
    pub fn transpose(&self) -> Self {
        Self(self.0.transpose())
    }

    /// Determinant (square matrices only).
    pub fn determinant(&self) -> Result<Real> {
        ql_core::ensure!(self.is_square(), "determinant of a non-square matrix");
        Ok(self.0.determinant())
    }

    /// Inverse, or an error if the matrix is singular.
    pub fn inverse(&self) -> Result<Self> {
        ql_core::ensure!(self.is_square(), "inverse of a non-square matrix");
        match self.0.clone().try_inverse() {
            Some(inv) => Ok(Self(inv)),
            None => ql_core::fail!("matrix is singular"),
        }
    }

    /// Sum of the diagonal.
    pub fn trace(&self) -> Real {
        self.0.trace()
    }

    /// Copy of the `i`-th row.
    pub fn row(&self, i: usize) -> Array {
        Array::from_fn(self.cols(), |j| self.0[(i, j)])
    }

    /// Matrix-vector product.
    pub fn mul_vec(&self, v: &Array) -> Array {
        Array::from(&self.0 * v.inner())
    }

    /// Borrow the inner `DMatrix`.
    pub fn inner(&self) -> &DMatrix<Real> {
        &self.0
    }
}

impl From<DMatrix<Real>> for Matrix {
    fn from(m: DMatrix<Real>) -> Self {
        Self(m)
    }
}

impl Index<(usize, usize)> for Matrix {
    type Output = Real;
    fn index(&self, idx: (usize, usize)) -> &Real {
        &self.0[idx]
    }
}

impl IndexMut<(usize, usize)> for Matrix {
    fn index_mut(&mut self, idx: (usize, usize)) -> &mut Real {
        &mut self.0[idx]
    }
}

impl Add for &Matrix {
    type Output = Matrix;
    fn add(self, rhs: &Matrix) -> Matrix {
        Matrix(&self.0 + &rhs.0)
    }
}

impl Sub for &Matrix {
    type Output = Matrix;
    fn sub(self, rhs: &Matrix) -> Matrix {
        Matrix(&self.0 - &rhs.0)
    }
}

impl Mul for &Matrix {
    type Output = Matrix;
    fn mul(self, rhs: &Matrix) -> Matrix {
        Matrix(&self.0 * &rhs.0)
    }
}

impl Mul<Real> for &Matrix {
    type Output = Matrix;
    fn mul(self, rhs: Real) -> Matrix {
        Matrix(&self.0 * rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn inverse_round_trip() {
        let m = Matrix::from_row_slice(2, 2, &[4.0, 7.0, 2.0, 6.0]);
        let inv = m.inverse().unwrap();
        let id = &m * &inv;
        assert_abs_diff_eq!(id[(0, 0)], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(id[(0, 1)], 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(m.determinant().unwrap(), 10.0, epsilon = 1e-12);
    }

    #[test]
    fn singular_and_ragged_inputs_fail() {
        let m = Matrix::from_row_slice(2, 2, &[1.0, 2.0, 2.0, 4.0]);
        assert!(m.inverse().is_err());
        assert!(Matrix::from_rows(&[vec![1.0], vec![1.0, 2.0]]).is_err());
        assert!(Matrix::zeros(2, 3).determinant().is_err());
    }

    #[test]
    fn matrix_vector_product() {
        let m = Matrix::from_rows(&[vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
        let v = m.mul_vec(&Array::from_slice(&[1.0, 1.0]));
        assert_eq!(v.to_vec(), vec![3.0, 7.0]);
        assert_eq!(m.row(1).to_vec(), vec![3.0, 4.0]);
    }
}
