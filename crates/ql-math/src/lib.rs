//! # ql-math
//!
//! Numerical building blocks for the pricing engines: array/matrix
//! newtypes over `nalgebra`, decompositions and least squares,
//! distributions (via `statrs`), root finders, quadrature, interpolation,
//! random and quasi-random sequences, and statistics accumulators.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

// ── Modules ───────────────────────────────────────────────────────────────────

/// One-dimensional real vectors.
pub mod array;

/// Floating-point comparison utilities.
pub mod comparison;

/// Probability distributions.
pub mod distributions;

/// Numerical integration.
pub mod integrals;

/// 1D interpolation schemes.
pub mod interpolations;

/// General linear least-squares regression.
pub mod linear_least_squares;

/// Two-dimensional real matrices.
pub mod matrix;

/// Matrix decompositions.
pub mod matrix_utilities;

/// Random and low-discrepancy sequence generators.
pub mod random_numbers;

/// 1D root-finding solvers.
pub mod solvers1d;

/// Statistics accumulators.
pub mod statistics;

// ── Convenience re-exports ────────────────────────────────────────────────────

pub use array::Array;
pub use comparison::{close, close_enough};
pub use distributions::{normal_cdf, normal_cdf_inverse, normal_pdf};
pub use matrix::Matrix;
