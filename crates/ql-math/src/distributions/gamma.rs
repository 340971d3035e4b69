//! Gamma distribution.
//!
//! Wraps the `statrs` crate's gamma implementation.  Used to moment-match
//! the square-root (CIR) transition law when building variance grids.

use ql_core::{ensure, Real, Result};
use statrs::distribution::{ContinuousCDF, Gamma};

/// Gamma distribution with shape `a` and rate `b` (scale = 1/b).
#[derive(Debug, Clone)]
pub struct GammaDistribution {
    dist: Gamma,
    shape: Real,
    rate: Real,
}

impl GammaDistribution {
    /// Create a gamma distribution with given shape and rate.
    pub fn new(shape: Real, rate: Real) -> Result<Self> {
        ensure!(
            shape > 0.0 && rate > 0.0,
            "shape and rate must be positive, got {shape} and {rate}"
        );
        let dist = Gamma::new(shape, rate)
            .map_err(|e| ql_core::Error::InvalidArgument(e.to_string()))?;
        Ok(Self { dist, shape, rate })
    }

    /// Gamma distribution with the given mean and variance.
    pub fn from_moments(mean: Real, variance: Real) -> Result<Self> {
        ensure!(
            mean > 0.0 && variance > 0.0,
            "mean and variance must be positive, got {mean} and {variance}"
        );
        Self::new(mean * mean / variance, mean / variance)
    }

    /// Shape parameter.
    pub fn shape(&self) -> Real {
        self.shape
    }

    /// Rate parameter.
    pub fn rate(&self) -> Real {
        self.rate
    }

    /// Cumulative distribution function P(X ≤ x).
    pub fn cdf(&self, x: Real) -> Real {
        if x <= 0.0 {
            return 0.0;
        }
        self.dist.cdf(x)
    }

    /// Quantile function.
    pub fn inverse_cdf(&self, p: Real) -> Real {
        self.dist.inverse_cdf(p.clamp(0.0, 1.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn moment_matching() {
        let g = GammaDistribution::from_moments(0.04, 0.0004).unwrap();
        assert_abs_diff_eq!(g.shape() / g.rate(), 0.04, epsilon = 1e-14);
        assert_abs_diff_eq!(g.shape() / (g.rate() * g.rate()), 0.0004, epsilon = 1e-14);
        let median = g.inverse_cdf(0.5);
        assert_abs_diff_eq!(g.cdf(median), 0.5, epsilon = 1e-8);
    }
}
