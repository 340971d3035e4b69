//! Weighted Monte Carlo samples.

use ql_core::Real;

/// A value drawn by a generator together with its weight.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample<T> {
    /// The drawn value.
    pub value: T,
    /// Its weight; plain pseudo-random draws carry weight one.
    pub weight: Real,
}

impl<T> Sample<T> {
    /// Create a sample.
    pub fn new(value: T, weight: Real) -> Self {
        Self { value, weight }
    }
}
