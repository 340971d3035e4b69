use crate::monte_carlo::path::Path;
use crate::monte_carlo::path_pricer::PathPricer;
use ql_core::{ensure, errors::Result, DiscountFactor, Real};
use ql_instruments::{BarrierOptionArguments, BarrierType, Payoff};
use ql_processes::StochasticProcess1D;
use std::sync::Arc;

/// Single-barrier option on a discretely simulated path.
///
/// Between two grid points the log-price is treated as a Brownian bridge,
/// so the probability of touching the barrier inside step `i` is
/// `exp(-2 ln(S_i/B) ln(S_{i+1}/B) / (σ² Δt))`.  The pricer returns the
/// expectation conditional on the sampled points: the payoff is weighted
/// by the survival probability, and a knock-out rebate is paid at the end
/// of the step in which the hit occurs.
#[derive(Debug, Clone)]
pub struct BarrierPathPricer {
    barrier_type: BarrierType,
    barrier: Real,
    rebate: Real,
    payoff: Payoff,
    discounts: Vec<DiscountFactor>,
    process: Arc<dyn StochasticProcess1D>,
}

impl BarrierPathPricer {
    /// `discounts[i]` discounts from grid time `i` to today.
    pub fn new(
        args: &BarrierOptionArguments,
        discounts: Vec<DiscountFactor>,
        process: Arc<dyn StochasticProcess1D>,
    ) -> Result<Self> {
        ensure!(!discounts.is_empty(), "no discount factors given");
        ensure!(
            discounts.iter().all(|&d| d > 0.0),
            "discount factors must be positive"
        );
        Ok(Self {
            barrier_type: args.barrier_type,
            barrier: args.barrier,
            rebate: args.rebate,
            payoff: args.payoff,
            discounts,
            process,
        })
    }

    fn hit_probability(&self, t: Real, dt: Real, s0: Real, s1: Real) -> Result<Real> {
        if self.barrier_type.is_triggered(s0, self.barrier)
            || self.barrier_type.is_triggered(s1, self.barrier)
        {
            return Ok(1.0);
        }
        let vol = self.process.diffusion_1d(t, s0)?;
        let variance = vol * vol * dt;
        if variance <= 0.0 {
            return Ok(0.0);
        }
        let x0 = (s0 / self.barrier).ln();
        let x1 = (s1 / self.barrier).ln();
        Ok((-2.0 * x0 * x1 / variance).exp())
    }
}

impl PathPricer<Path> for BarrierPathPricer {
    fn value(&self, path: &Path) -> Result<Real> {
        let n = path.len();
        ensure!(n > 1, "the path must have at least one step");
        ensure!(
            self.discounts.len() == n,
            "{} discount factors for a path of {n} points",
            self.discounts.len()
        );

        let mut survival = 1.0;
        let mut rebate_at_hit = 0.0;
        for i in 0..n - 1 {
            let dt = path.time(i + 1) - path.time(i);
            let p = self.hit_probability(path.time(i), dt, path[i], path[i + 1])?;
            rebate_at_hit += survival * p * self.discounts[i + 1];
            survival *= 1.0 - p;
        }

        let maturity_discount = self.discounts[n - 1];
        let vanilla = self.payoff.value(path.back()) * maturity_discount;
        Ok(if self.barrier_type.is_knock_in() {
            vanilla * (1.0 - survival) + self.rebate * survival * maturity_discount
        } else {
            vanilla * survival + self.rebate * rebate_at_hit
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time_grid::TimeGrid;
    use approx::assert_abs_diff_eq;
    use ql_instruments::{Exercise, OptionType};
    use ql_processes::GeneralizedBlackScholesProcess;
    use ql_termstructures::{BlackConstantVol, FlatForward};

    fn pricer(barrier_type: BarrierType, rebate: Real) -> BarrierPathPricer {
        let process = GeneralizedBlackScholesProcess::new(
            100.0,
            Arc::new(FlatForward::new(0.0)),
            Arc::new(FlatForward::new(0.0)),
            Arc::new(BlackConstantVol::new(0.2).unwrap()),
        )
        .unwrap();
        let args = BarrierOptionArguments::new(
            Payoff::vanilla(OptionType::Call, 100.0),
            Exercise::european(1.0).unwrap(),
            barrier_type,
            90.0,
            rebate,
        )
        .unwrap();
        BarrierPathPricer::new(&args, vec![1.0; 3], Arc::new(process)).unwrap()
    }

    #[test]
    fn in_plus_out_is_vanilla() {
        let grid = Arc::new(TimeGrid::new(1.0, 2).unwrap());
        let path = Path::with_values(grid, vec![100.0, 92.0, 115.0]).unwrap();
        let out = pricer(BarrierType::DownOut, 0.0).value(&path).unwrap();
        let knock_in = pricer(BarrierType::DownIn, 0.0).value(&path).unwrap();
        assert_abs_diff_eq!(out + knock_in, 15.0, epsilon = 1e-12);
        assert!(knock_in > 0.0 && out < 15.0);
    }

    #[test]
    fn crossed_barrier_knocks_out() {
        let grid = Arc::new(TimeGrid::new(1.0, 2).unwrap());
        let path = Path::with_values(grid, vec![100.0, 85.0, 120.0]).unwrap();
        let out = pricer(BarrierType::DownOut, 3.0).value(&path).unwrap();
        // the hit inside the first step is certain: only the rebate is left
        assert_abs_diff_eq!(out, 3.0, epsilon = 1e-12);
    }
}
