//! The path pricer seam.

use crate::monte_carlo::path::Path;
use ql_core::{errors::Result, Real};

/// Maps one simulated path to a discounted cash amount.
///
/// Pricers hold only data fixed at construction (payoff, discount factors,
/// fixing indices) and may be shared between threads.
pub trait PathPricer<P = Path>: Send + Sync {
    /// Discounted value of the path.
    fn value(&self, path: &P) -> Result<Real>;
}

impl<P> PathPricer<P> for Box<dyn PathPricer<P>> {
    fn value(&self, path: &P) -> Result<Real> {
        (**self).value(path)
    }
}
