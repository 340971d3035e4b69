use crate::monte_carlo::path::{MultiPath, Path};
use crate::monte_carlo::path_pricer::PathPricer;
use ql_core::{ensure, errors::Result, DiscountFactor, Real};
use ql_instruments::Payoff;

/// Discounted payoff of the terminal value.
///
/// On a [`MultiPath`] the first asset is the underlying (the Heston
/// variance sits in the second slot).
#[derive(Debug, Clone, Copy)]
pub struct EuropeanPathPricer {
    payoff: Payoff,
    discount: DiscountFactor,
}

impl EuropeanPathPricer {
    /// Create a pricer.
    pub fn new(payoff: Payoff, discount: DiscountFactor) -> Result<Self> {
        payoff.validate()?;
        ensure!(discount > 0.0, "discount must be positive, got {discount}");
        Ok(Self { payoff, discount })
    }
}

impl PathPricer<Path> for EuropeanPathPricer {
    fn value(&self, path: &Path) -> Result<Real> {
        ensure!(!path.is_empty(), "the path cannot be empty");
        Ok(self.payoff.value(path.back()) * self.discount)
    }
}

impl PathPricer<MultiPath> for EuropeanPathPricer {
    fn value(&self, path: &MultiPath) -> Result<Real> {
        Ok(self.payoff.value(path[0].back()) * self.discount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time_grid::TimeGrid;
    use approx::assert_abs_diff_eq;
    use ql_instruments::OptionType;
    use std::sync::Arc;

    #[test]
    fn discounted_terminal_payoff() {
        let grid = Arc::new(TimeGrid::new(1.0, 2).unwrap());
        let path = Path::with_values(grid, vec![100.0, 90.0, 120.0]).unwrap();
        let pricer = EuropeanPathPricer::new(Payoff::vanilla(OptionType::Call, 100.0), 0.9).unwrap();
        assert_abs_diff_eq!(pricer.value(&path).unwrap(), 18.0, epsilon = 1e-12);
        assert!(EuropeanPathPricer::new(Payoff::vanilla(OptionType::Call, 100.0), 0.0).is_err());
    }
}
