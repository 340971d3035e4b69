use crate::monte_carlo::path::Path;
use crate::monte_carlo::path_pricer::PathPricer;
use crate::time_grid::TimeGrid;
use ql_core::{ensure, errors::Result, DiscountFactor, Real, Size};
use ql_instruments::{AsianOptionArguments, AverageType, Payoff};

/// Discretely sampled average-price option.
///
/// The average covers the past fixings (folded into the running
/// accumulator) plus the path values at the future fixing times.  The
/// geometric variant is the usual control variate of the arithmetic one.
#[derive(Debug, Clone)]
pub struct AveragePricePathPricer {
    average_type: AverageType,
    payoff: Payoff,
    discount: DiscountFactor,
    running_accumulator: Real,
    past_fixings: Size,
    fixing_indices: Vec<usize>,
}

impl AveragePricePathPricer {
    /// Pricer for `args` on paths sampled on `grid`; every fixing time must
    /// be a grid point.
    pub fn new(args: &AsianOptionArguments, grid: &TimeGrid, discount: DiscountFactor) -> Result<Self> {
        Self::with_average_type(args, args.average_type, grid, discount)
    }

    /// As [`new`](Self::new) but averaging with `average_type` regardless
    /// of the instrument's own convention.
    pub fn with_average_type(
        args: &AsianOptionArguments,
        average_type: AverageType,
        grid: &TimeGrid,
        discount: DiscountFactor,
    ) -> Result<Self> {
        ensure!(discount > 0.0, "discount must be positive, got {discount}");
        let fixing_indices = args
            .fixing_times
            .iter()
            .map(|&t| grid.index(t))
            .collect::<Result<Vec<_>>>()?;
        // accumulators are only interchangeable in the neutral state
        let running_accumulator = if average_type == args.average_type {
            args.running_accumulator
        } else {
            ensure!(
                args.past_fixings == 0,
                "cannot switch averaging convention with past fixings"
            );
            match average_type {
                AverageType::Arithmetic => 0.0,
                AverageType::Geometric => 1.0,
            }
        };
        Ok(Self {
            average_type,
            payoff: args.payoff,
            discount,
            running_accumulator,
            past_fixings: args.past_fixings,
            fixing_indices,
        })
    }

    /// The average over past and simulated fixings.
    pub fn average(&self, path: &Path) -> Real {
        let fixings = (self.past_fixings + self.fixing_indices.len()) as Real;
        match self.average_type {
            AverageType::Arithmetic => {
                let sum: Real = self.fixing_indices.iter().map(|&i| path[i]).sum();
                (self.running_accumulator + sum) / fixings
            }
            AverageType::Geometric => {
                let log_sum: Real = self.fixing_indices.iter().map(|&i| path[i].ln()).sum();
                ((self.running_accumulator.ln() + log_sum) / fixings).exp()
            }
        }
    }
}

impl PathPricer<Path> for AveragePricePathPricer {
    fn value(&self, path: &Path) -> Result<Real> {
        Ok(self.payoff.value(self.average(path)) * self.discount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ql_instruments::{Exercise, OptionType};
    use std::sync::Arc;

    fn args(average_type: AverageType) -> AsianOptionArguments {
        AsianOptionArguments::new(
            average_type,
            vec![0.5, 1.0],
            Payoff::vanilla(OptionType::Call, 100.0),
            Exercise::european(1.0).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn averages_only_fixing_points() {
        let grid = Arc::new(TimeGrid::new(1.0, 4).unwrap());
        let path = Path::with_values(Arc::clone(&grid), vec![100.0, 1.0e6, 110.0, 1.0e6, 130.0]).unwrap();
        let arith = AveragePricePathPricer::new(&args(AverageType::Arithmetic), &grid, 1.0).unwrap();
        assert_abs_diff_eq!(arith.value(&path).unwrap(), 20.0, epsilon = 1e-12);
        let geo = AveragePricePathPricer::new(&args(AverageType::Geometric), &grid, 1.0).unwrap();
        assert_abs_diff_eq!(geo.average(&path), (110.0_f64 * 130.0).sqrt(), epsilon = 1e-9);
        assert!(geo.average(&path) <= arith.average(&path));
    }

    #[test]
    fn fixings_off_the_grid_are_rejected() {
        let grid = TimeGrid::new(1.0, 3).unwrap();
        assert!(AveragePricePathPricer::new(&args(AverageType::Arithmetic), &grid, 1.0).is_err());
    }
}
