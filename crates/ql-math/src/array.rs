//! `Array`: a one-dimensional vector of reals.
//!
//! A newtype over `nalgebra::DVector<f64>`.  Besides the usual vector
//! algebra it offers the element-wise products and in-place updates that
//! the finite-difference operators apply on every time step.

use nalgebra::DVector;
use ql_core::Real;
use std::ops::{Add, AddAssign, Div, Index, IndexMut, Mul, MulAssign, Neg, Sub, SubAssign};

/// A dynamically-sized 1D vector of `Real` values.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Array(DVector<Real>);

impl Array {
    /// Create a zero-filled array of length `n`.
    pub fn zeros(n: usize) -> Self {
        Self(DVector::zeros(n))
    }

    /// Create an array filled with `value`.
    pub fn from_element(n: usize, value: Real) -> Self {
        Self(DVector::from_element(n, value))
    }

    /// Create an array whose `i`-th element is `f(i)`.
    pub fn from_fn<F: FnMut(usize) -> Real>(n: usize, mut f: F) -> Self {
        Self(DVector::from_fn(n, |i, _| f(i)))
    }

    /// Create an array from a slice.
    pub fn from_slice(data: &[Real]) -> Self {
        Self(DVector::from_column_slice(data))
    }

    /// Create an array from a `Vec`.
    pub fn from_vec(data: Vec<Real>) -> Self {
        Self(DVector::from_vec(data))
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Return `true` if empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Return the elements as a slice.
    pub fn as_slice(&self) -> &[Real] {
        self.0.as_slice()
    }

    /// Return the elements as a mutable slice.
    pub fn as_mut_slice(&mut self) -> &mut [Real] {
        self.0.as_mut_slice()
    }

    /// Copy into a `Vec`.
    pub fn to_vec(&self) -> Vec<Real> {
        self.0.as_slice().to_vec()
    }

    /// Borrow the inner `DVector`.
    pub fn inner(&self) -> &DVector<Real> {
        &self.0
    }

    /// First element, if any.
    pub fn first(&self) -> Option<Real> {
        self.as_slice().first().copied()
    }

    /// Last element, if any.
    pub fn last(&self) -> Option<Real> {
        self.as_slice().last().copied()
    }

    /// Dot product with another array.
    pub fn dot(&self, other: &Array) -> Real {
        self.0.dot(&other.0)
    }

    /// Euclidean (L2) norm.
    pub fn norm(&self) -> Real {
        self.0.norm()
    }

    /// Sum of all elements.
    pub fn sum(&self) -> Real {
        self.0.sum()
    }

    /// Minimum element.
    pub fn min(&self) -> Real {
        self.0.min()
    }

    /// Maximum element.
    pub fn max(&self) -> Real {
        self.0.max()
    }

    /// Apply a function element-wise, returning a new array.
    pub fn map<F: Fn(Real) -> Real>(&self, f: F) -> Self {
        Self(self.0.map(f))
    }

    /// Element-wise product.
    pub fn component_mul(&self, other: &Array) -> Self {
        Self(self.0.component_mul(&other.0))
    }

    /// `self += a * x`.
    pub fn axpy(&mut self, a: Real, x: &Array) {
        self.0.axpy(a, &x.0, 1.0);
    }

    /// Iterator over elements.
    pub fn iter(&self) -> impl Iterator<Item = &Real> {
        self.0.iter()
    }

    /// Mutable iterator over elements.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Real> {
        self.0.iter_mut()
    }

    /// `true` if every element is finite.
    pub fn is_finite(&self) -> bool {
        self.0.iter().all(|x| x.is_finite())
    }
}

// ── From / Into conversions ───────────────────────────────────────────────────

impl From<DVector<Real>> for Array {
    fn from(v: DVector<Real>) -> Self {
        Self(v)
    }
}

impl From<Vec<Real>> for Array {
    fn from(v: Vec<Real>) -> Self {
        Self::from_vec(v)
    }
}

impl From<&[Real]> for Array {
    fn from(s: &[Real]) -> Self {
        Self::from_slice(s)
    }
}

impl FromIterator<Real> for Array {
    fn from_iter<I: IntoIterator<Item = Real>>(iter: I) -> Self {
        Self::from_vec(iter.into_iter().collect())
    }
}

// ── Index ─────────────────────────────────────────────────────────────────────

impl Index<usize> for Array {
    type Output = Real;
    fn index(&self, i: usize) -> &Real {
        &self.0[i]
    }
}

impl IndexMut<usize> for Array {
    fn index_mut(&mut self, i: usize) -> &mut Real {
        &mut self.0[i]
    }
}

// ── Arithmetic ────────────────────────────────────────────────────────────────

impl Add for &Array {
    type Output = Array;
    fn add(self, rhs: &Array) -> Array {
        Array(&self.0 + &rhs.0)
    }
}

impl Add for Array {
    type Output = Array;
    fn add(self, rhs: Array) -> Array {
        Array(self.0 + rhs.0)
    }
}

impl Sub for &Array {
    type Output = Array;
    fn sub(self, rhs: &Array) -> Array {
        Array(&self.0 - &rhs.0)
    }
}

impl Sub for Array {
    type Output = Array;
    fn sub(self, rhs: Array) -> Array {
        Array(self.0 - rhs.0)
    }
}

impl Mul<Real> for &Array {
    type Output = Array;
    fn mul(self, rhs: Real) -> Array {
        Array(&self.0 * rhs)
    }
}

impl Mul<Real> for Array {
    type Output = Array;
    fn mul(self, rhs: Real) -> Array {
        Array(self.0 * rhs)
    }
}

impl Mul<&Array> for Real {
    type Output = Array;
    fn mul(self, rhs: &Array) -> Array {
        Array(&rhs.0 * self)
    }
}

impl Div<Real> for &Array {
    type Output = Array;
    fn div(self, rhs: Real) -> Array {
        Array(&self.0 / rhs)
    }
}

impl Div<Real> for Array {
    type Output = Array;
    fn div(self, rhs: Real) -> Array {
        Array(self.0 / rhs)
    }
}

impl Neg for &Array {
    type Output = Array;
    fn neg(self) -> Array {
        Array(-&self.0)
    }
}

impl AddAssign<&Array> for Array {
    fn add_assign(&mut self, rhs: &Array) {
        self.0 += &rhs.0;
    }
}

impl SubAssign<&Array> for Array {
    fn sub_assign(&mut self, rhs: &Array) {
        self.0 -= &rhs.0;
    }
}

impl MulAssign<Real> for Array {
    fn mul_assign(&mut self, rhs: Real) {
        self.0 *= rhs;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn construction() {
        let a = Array::from_fn(4, |i| i as Real * 0.5);
        assert_eq!(a.len(), 4);
        assert_eq!(a.last(), Some(1.5));
        assert_eq!(Array::zeros(0).first(), None);
        let b: Array = vec![1.0, 2.0].into_iter().collect();
        assert_eq!(b[1], 2.0);
    }

    #[test]
    fn vector_algebra() {
        let a = Array::from_slice(&[1.0, 2.0, 3.0]);
        let b = Array::from_slice(&[4.0, 5.0, 6.0]);
        assert_abs_diff_eq!(a.dot(&b), 32.0);
        assert_eq!((&a + &b)[2], 9.0);
        assert_eq!((&b - &a)[0], 3.0);
        assert_eq!(a.component_mul(&b).to_vec(), vec![4.0, 10.0, 18.0]);

        let mut c = a.clone();
        c.axpy(2.0, &b);
        assert_eq!(c.to_vec(), vec![9.0, 12.0, 15.0]);
        c *= 0.5;
        c -= &a;
        assert_eq!(c.to_vec(), vec![3.5, 4.0, 4.5]);
    }

    #[test]
    fn finiteness() {
        let mut a = Array::from_element(3, 1.0);
        assert!(a.is_finite());
        a[1] = Real::NAN;
        assert!(!a.is_finite());
    }
}
