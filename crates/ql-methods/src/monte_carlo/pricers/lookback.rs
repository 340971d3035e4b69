use crate::monte_carlo::path::Path;
use crate::monte_carlo::path_pricer::PathPricer;
use ql_core::{ensure, errors::Result, DiscountFactor, Real};
use ql_instruments::{LookbackKind, LookbackOptionArguments, OptionType};

/// Discretely monitored lookback option.
#[derive(Debug, Clone, Copy)]
pub struct LookbackPathPricer {
    kind: LookbackKind,
    running_extremum: Option<Real>,
    discount: DiscountFactor,
}

impl LookbackPathPricer {
    /// Create a pricer.
    pub fn new(args: &LookbackOptionArguments, discount: DiscountFactor) -> Result<Self> {
        ensure!(discount > 0.0, "discount must be positive, got {discount}");
        Ok(Self {
            kind: args.kind,
            running_extremum: args.running_extremum,
            discount,
        })
    }

    fn maximum(&self, path: &Path) -> Real {
        let m = path.iter().copied().fold(Real::NEG_INFINITY, Real::max);
        self.running_extremum.map_or(m, |r| m.max(r))
    }

    fn minimum(&self, path: &Path) -> Real {
        let m = path.iter().copied().fold(Real::INFINITY, Real::min);
        self.running_extremum.map_or(m, |r| m.min(r))
    }
}

impl PathPricer<Path> for LookbackPathPricer {
    fn value(&self, path: &Path) -> Result<Real> {
        ensure!(!path.is_empty(), "the path cannot be empty");
        let payoff = match self.kind {
            LookbackKind::FixedStrike(payoff) => match payoff.option_type() {
                OptionType::Call => payoff.value(self.maximum(path)),
                OptionType::Put => payoff.value(self.minimum(path)),
            },
            LookbackKind::FloatingStrike(OptionType::Call) => path.back() - self.minimum(path),
            LookbackKind::FloatingStrike(OptionType::Put) => self.maximum(path) - path.back(),
        };
        Ok(payoff * self.discount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time_grid::TimeGrid;
    use approx::assert_abs_diff_eq;
    use ql_instruments::{Exercise, Payoff};
    use std::sync::Arc;

    #[test]
    fn floating_and_fixed_strikes() {
        let grid = Arc::new(TimeGrid::new(1.0, 3).unwrap());
        let path = Path::with_values(grid, vec![100.0, 80.0, 125.0, 110.0]).unwrap();
        let ex = Exercise::european(1.0).unwrap();

        let call = LookbackOptionArguments::new(LookbackKind::FloatingStrike(OptionType::Call), ex.clone()).unwrap();
        let put = LookbackOptionArguments::new(LookbackKind::FloatingStrike(OptionType::Put), ex.clone()).unwrap();
        assert_abs_diff_eq!(LookbackPathPricer::new(&call, 1.0).unwrap().value(&path).unwrap(), 30.0);
        assert_abs_diff_eq!(LookbackPathPricer::new(&put, 1.0).unwrap().value(&path).unwrap(), 15.0);

        let fixed = LookbackOptionArguments::new(
            LookbackKind::FixedStrike(Payoff::vanilla(OptionType::Call, 100.0)),
            ex,
        )
        .unwrap()
        .with_running_extremum(140.0);
        assert_abs_diff_eq!(LookbackPathPricer::new(&fixed, 0.5).unwrap().value(&path).unwrap(), 20.0);
    }
}
