//! Normal (Gaussian) distribution.

use ql_core::Real;
use statrs::function::erf::erfc;
use std::f64::consts::{FRAC_1_SQRT_2, PI};

/// The standard normal probability density function.
///
/// `φ(x) = exp(-x²/2) / √(2π)`
#[inline]
pub fn normal_pdf(x: Real) -> Real {
    (-0.5 * x * x).exp() / (2.0 * PI).sqrt()
}

/// The standard normal cumulative distribution function Φ(x).
///
/// Evaluated through the complementary error function of `statrs`.  The
/// absolute error is of order 1e-11 in the centre; the tails keep their
/// relative accuracy since no `1 - x` cancellation takes place.
#[inline]
pub fn normal_cdf(x: Real) -> Real {
    0.5 * erfc(-x * FRAC_1_SQRT_2)
}

/// The inverse standard normal CDF (probit function).
///
/// Acklam's rational approximation followed by one Halley refinement step.
/// Returns `-∞` for `p <= 0` and `+∞` for `p >= 1`.
pub fn normal_cdf_inverse(p: Real) -> Real {
    if p <= 0.0 {
        return Real::NEG_INFINITY;
    }
    if p >= 1.0 {
        return Real::INFINITY;
    }
    let x = acklam_inverse(p);
    let e = normal_cdf(x) - p;
    let u = e * (2.0 * PI).sqrt() * (0.5 * x * x).exp();
    x - u / (1.0 + 0.5 * x * u)
}

/// Acklam's rational approximation, |error| < 1.15e-9.
fn acklam_inverse(p: Real) -> Real {
    const A: [f64; 6] = [
        -3.969_683_028_665_376e+01,
        2.209_460_984_245_205e+02,
        -2.759_285_104_469_687e+02,
        1.383_577_518_672_69e2,
        -3.066_479_806_614_716e+01,
        2.506_628_277_459_239e+00,
    ];
    const B: [f64; 5] = [
        -5.447_609_879_822_406e+01,
        1.615_858_368_580_409e+02,
        -1.556_989_798_598_866e+02,
        6.680_131_188_771_972e+01,
        -1.328_068_155_288_572e+01,
    ];
    const C: [f64; 6] = [
        -7.784_894_002_430_293e-03,
        -3.223_964_580_411_365e-01,
        -2.400_758_277_161_838e+00,
        -2.549_732_539_343_734e+00,
        4.374_664_141_464_968e+00,
        2.938_163_982_698_783e+00,
    ];
    const D: [f64; 4] = [
        7.784_695_709_041_462e-03,
        3.224_671_290_700_398e-01,
        2.445_134_137_142_996e+00,
        3.754_408_661_907_416e+00,
    ];

    const P_LOW: f64 = 0.02425;
    const P_HIGH: f64 = 1.0 - P_LOW;

    if p < P_LOW {
        let q = (-2.0 * p.ln()).sqrt();
        (((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    } else if p <= P_HIGH {
        let q = p - 0.5;
        let r = q * q;
        (((((A[0] * r + A[1]) * r + A[2]) * r + A[3]) * r + A[4]) * r + A[5]) * q
            / (((((B[0] * r + B[1]) * r + B[2]) * r + B[3]) * r + B[4]) * r + 1.0)
    } else {
        let q = (-2.0 * (1.0 - p).ln()).sqrt();
        -(((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    }
}

/// Normal distribution with given mean and standard deviation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GaussianDistribution {
    mean: Real,
    sigma: Real,
}

impl GaussianDistribution {
    /// Create a distribution; `sigma` must be positive.
    pub fn new(mean: Real, sigma: Real) -> ql_core::Result<Self> {
        ql_core::ensure!(sigma > 0.0, "sigma must be positive, got {sigma}");
        Ok(Self { mean, sigma })
    }

    /// Density at `x`.
    pub fn pdf(&self, x: Real) -> Real {
        normal_pdf((x - self.mean) / self.sigma) / self.sigma
    }

    /// P(X ≤ x).
    pub fn cdf(&self, x: Real) -> Real {
        normal_cdf((x - self.mean) / self.sigma)
    }

    /// Quantile function.
    pub fn inverse_cdf(&self, p: Real) -> Real {
        self.mean + self.sigma * normal_cdf_inverse(p)
    }
}
