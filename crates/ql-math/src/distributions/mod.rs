//! Probability distributions.
//!
//! The normal distribution is implemented directly; chi-square and gamma
//! delegate to the `statrs` crate.

pub mod chi_square;
pub mod gamma;
pub mod normal;

pub use chi_square::ChiSquareDistribution;
pub use gamma::GammaDistribution;
pub use normal::{normal_cdf, normal_cdf_inverse, normal_pdf, GaussianDistribution};
