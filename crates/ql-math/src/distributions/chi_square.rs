//! Chi-square distribution.
//!
//! Wraps the `statrs` crate's chi-squared implementation.

use ql_core::{ensure, Real, Result};
use statrs::distribution::{ChiSquared, Continuous, ContinuousCDF};

/// Chi-square distribution with `df` degrees of freedom.
#[derive(Debug, Clone)]
pub struct ChiSquareDistribution {
    dist: ChiSquared,
    df: Real,
}

impl ChiSquareDistribution {
    /// Create a chi-square distribution with the given degrees of freedom.
    pub fn new(df: Real) -> Result<Self> {
        ensure!(df > 0.0, "degrees of freedom must be positive, got {df}");
        let dist = ChiSquared::new(df)
            .map_err(|e| ql_core::Error::InvalidArgument(e.to_string()))?;
        Ok(Self { dist, df })
    }

    /// Degrees of freedom.
    pub fn df(&self) -> Real {
        self.df
    }

    /// Probability density function.
    pub fn pdf(&self, x: Real) -> Real {
        if x < 0.0 {
            return 0.0;
        }
        self.dist.pdf(x)
    }

    /// Cumulative distribution function P(X ≤ x).
    pub fn cdf(&self, x: Real) -> Real {
        if x <= 0.0 {
            return 0.0;
        }
        self.dist.cdf(x)
    }

    /// Upper tail P(X > x), the p-value of a test statistic `x`.
    pub fn survival(&self, x: Real) -> Real {
        if x <= 0.0 {
            return 1.0;
        }
        self.dist.sf(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn two_degrees_of_freedom_is_exponential() {
        let d = ChiSquareDistribution::new(2.0).unwrap();
        assert_abs_diff_eq!(d.cdf(0.0), 0.0);
        let x: Real = 4.0;
        assert_abs_diff_eq!(d.cdf(x), 1.0 - (-x / 2.0).exp(), epsilon = 1e-12);
        assert_abs_diff_eq!(d.survival(x), (-x / 2.0).exp(), epsilon = 1e-12);
    }

    #[test]
    fn rejects_non_positive_df() {
        assert!(ChiSquareDistribution::new(0.0).is_err());
    }
}
