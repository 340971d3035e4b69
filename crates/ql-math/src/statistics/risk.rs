//! Risk measures over stored samples.

use super::{GeneralStatistics, StatisticsAccumulator};
use ql_core::{ensure, Real, Result};

fn check_tail(p: Real) -> Result<()> {
    ensure!(
        (0.9..1.0).contains(&p),
        "percentile ({p}) out of range [0.9, 1.0)"
    );
    Ok(())
}

impl GeneralStatistics {
    /// Value at risk at confidence `p ∈ [0.9, 1)`, reported as a
    /// non-negative loss.
    pub fn value_at_risk(&self, p: Real) -> Result<Real> {
        check_tail(p)?;
        Ok(-(self.percentile(1.0 - p)?.min(0.0)))
    }

    /// Mean loss beyond the value at risk.
    pub fn expected_shortfall(&self, p: Real) -> Result<Real> {
        let var = self.value_at_risk(p)?;
        let (tail, _) = self.expectation_value(|x| x, |x| x < -var)?;
        Ok(-(tail.min(0.0)))
    }

    /// Upper percentile gain at confidence `p ∈ [0.9, 1)`.
    pub fn potential_upside(&self, p: Real) -> Result<Real> {
        check_tail(p)?;
        Ok(self.percentile(p)?.max(0.0))
    }

    /// Weight fraction of samples below `target`.
    pub fn shortfall(&self, target: Real) -> Result<Real> {
        Ok(self
            .expectation_value(|x| if x < target { 1.0 } else { 0.0 }, |_| true)?
            .0)
    }

    /// Expected shortfall below `target`, `E[max(target - x, 0)]`.
    pub fn average_shortfall(&self, target: Real) -> Result<Real> {
        Ok(self
            .expectation_value(|x| (target - x).max(0.0), |_| true)?
            .0)
    }

    /// Unbiased second moment of the samples below `target` around it.
    pub fn regret(&self, target: Real) -> Result<Real> {
        let (x, n) = self.expectation_value(|x| (x - target).powi(2), |x| x < target)?;
        ensure!(n > 1, "fewer than two samples below target {target}");
        let n = n as Real;
        Ok(x * n / (n - 1.0))
    }

    /// [`regret`](Self::regret) around the mean.
    pub fn semi_variance(&self) -> Result<Real> {
        self.regret(self.mean()?)
    }

    /// [`regret`](Self::regret) around zero.
    pub fn downside_variance(&self) -> Result<Real> {
        self.regret(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn pnl() -> GeneralStatistics {
        let mut g = GeneralStatistics::new();
        // -10, -9, ..., 89
        g.add_all(&(0..100).map(|i| i as Real - 10.0).collect::<Vec<_>>())
            .unwrap();
        g
    }

    #[test]
    fn var_and_expected_shortfall() {
        let g = pnl();
        // 5% percentile is the 5th smallest value
        assert_eq!(g.value_at_risk(0.95).unwrap(), 6.0);
        // mean of -10..-7
        assert_abs_diff_eq!(g.expected_shortfall(0.95).unwrap(), 8.5);
        assert!(g.value_at_risk(0.5).is_err());
        assert!(g.value_at_risk(1.0).is_err());
    }

    #[test]
    fn shortfall_family() {
        let g = pnl();
        assert_abs_diff_eq!(g.shortfall(0.0).unwrap(), 0.1);
        // Σ_{k=1..10} k / 100
        assert_abs_diff_eq!(g.average_shortfall(0.0).unwrap(), 0.55, epsilon = 1e-14);
        assert_eq!(g.potential_upside(0.9).unwrap(), 79.0);
        // Σ k² /10 * 10/9 for k = 1..10
        assert_abs_diff_eq!(g.downside_variance().unwrap(), 385.0 / 9.0, epsilon = 1e-12);
    }
}
