//! One-dimensional meshers and their composition into a grid.

use crate::finite_differences::layout::FdmLinearOpLayout;
use ql_core::{ensure, errors::Result, Real, Size, Time};
use ql_instruments::CashDividend;
use ql_math::distributions::GammaDistribution;
use ql_math::{normal_cdf_inverse, Array};
use ql_processes::{GeneralizedBlackScholesProcess, HestonProcess};
use std::sync::Arc;

/// Strictly increasing grid locations along one direction.
pub trait Fdm1dMesher: std::fmt::Debug + Send + Sync {
    /// Grid locations.
    fn locations(&self) -> &[Real];

    /// Number of points.
    fn size(&self) -> usize {
        self.locations().len()
    }

    /// Distance to the next point; `None` at the upper edge.
    fn dplus(&self, i: usize) -> Option<Real> {
        let loc = self.locations();
        (i + 1 < loc.len()).then(|| loc[i + 1] - loc[i])
    }

    /// Distance to the previous point; `None` at the lower edge.
    fn dminus(&self, i: usize) -> Option<Real> {
        let loc = self.locations();
        (i > 0).then(|| loc[i] - loc[i - 1])
    }
}

macro_rules! locations_mesher {
    ($name:ident) => {
        impl Fdm1dMesher for $name {
            fn locations(&self) -> &[Real] {
                &self.locations
            }
        }
    };
}

/// Equally spaced points on `[start, end]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Uniform1dMesher {
    locations: Vec<Real>,
}

impl Uniform1dMesher {
    /// `size` points from `start` to `end` inclusive.
    pub fn new(start: Real, end: Real, size: Size) -> Result<Self> {
        ensure!(end > start, "end ({end}) must be larger than start ({start})");
        ensure!(size >= 2, "a mesher needs at least two points");
        let dx = (end - start) / (size - 1) as Real;
        let mut locations: Vec<Real> = (0..size).map(|i| start + i as Real * dx).collect();
        locations[size - 1] = end;
        Ok(Self { locations })
    }
}

locations_mesher!(Uniform1dMesher);

/// Mesher over user-given locations.
#[derive(Debug, Clone, PartialEq)]
pub struct Predefined1dMesher {
    locations: Vec<Real>,
}

impl Predefined1dMesher {
    /// Wrap strictly increasing `locations`.
    pub fn new(locations: Vec<Real>) -> Result<Self> {
        ensure!(locations.len() >= 2, "a mesher needs at least two points");
        ensure!(
            locations.windows(2).all(|w| w[1] > w[0]),
            "mesher locations must be strictly increasing"
        );
        Ok(Self { locations })
    }

    /// A degenerate mesher with `size` copies of `x`, used for point
    /// masses; it does not support difference operators.
    pub fn point_mass(x: Real, size: Size) -> Self {
        Self {
            locations: vec![x; size],
        }
    }
}

locations_mesher!(Predefined1dMesher);

/// Points on `[start, end]` concentrated around a critical point.
///
/// With concentration `(c, density)` the points follow
/// `x(u) = c + d·sinh(c₁(1-u) + c₂u)` with `d = density·(end-start)`.
/// Smaller densities pack more points close to `c`.
#[derive(Debug, Clone, PartialEq)]
pub struct Concentrating1dMesher {
    locations: Vec<Real>,
}

impl Concentrating1dMesher {
    /// Build the mesher.  With `require_cp` the point nearest to `c` is
    /// moved onto `c` so the critical point is a grid point.
    pub fn new(
        start: Real,
        end: Real,
        size: Size,
        concentration: Option<(Real, Real)>,
        require_cp: bool,
    ) -> Result<Self> {
        ensure!(end > start, "end ({end}) must be larger than start ({start})");
        ensure!(size >= 2, "a mesher needs at least two points");

        let Some((c, density)) = concentration else {
            let uniform = Uniform1dMesher::new(start, end, size)?;
            return Ok(Self {
                locations: uniform.locations,
            });
        };
        ensure!(
            (start..=end).contains(&c),
            "concentration point {c} must lie in [{start}, {end}]"
        );
        ensure!(density > 0.0, "concentration density must be positive, got {density}");

        let d = density * (end - start);
        let c1 = ((start - c) / d).asinh();
        let c2 = ((end - c) / d).asinh();
        let dx = 1.0 / (size - 1) as Real;
        let mut locations = Vec::with_capacity(size);
        locations.push(start);
        for i in 1..size - 1 {
            let u = i as Real * dx;
            locations.push(c + d * (c1 * (1.0 - u) + c2 * u).sinh());
        }
        locations.push(end);

        if require_cp && size > 2 {
            let nearest = (1..size - 1)
                .min_by(|&a, &b| (locations[a] - c).abs().total_cmp(&(locations[b] - c).abs()));
            if let Some(i) = nearest {
                if locations[i - 1] < c && c < locations[i + 1] {
                    locations[i] = c;
                }
            }
        }
        ensure!(
            locations.windows(2).all(|w| w[1] > w[0]),
            "concentrating mesher produced non-increasing locations"
        );
        Ok(Self { locations })
    }
}

locations_mesher!(Concentrating1dMesher);

/// Settings of [`FdmBlackScholesMesher`].
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FdmBlackScholesMesherParams {
    /// Probability mass cut off in each tail.
    pub eps: Real,
    /// Widening factor on the quantile bounds.
    pub scale_factor: Real,
    /// Fixed lower bound in log-spot.
    pub x_min: Option<Real>,
    /// Fixed upper bound in log-spot.
    pub x_max: Option<Real>,
    /// Concentration `(spot level, density)`.
    pub concentration: Option<(Real, Real)>,
}

impl Default for FdmBlackScholesMesherParams {
    fn default() -> Self {
        Self {
            eps: 1e-4,
            scale_factor: 1.5,
            x_min: None,
            x_max: None,
            concentration: None,
        }
    }
}

/// Log-spot mesher for Black-Scholes problems.
///
/// The bounds are the `eps` quantiles of the terminal log-spot around
/// the lowest and highest forward seen until maturity, cash dividends
/// included.
#[derive(Debug, Clone, PartialEq)]
pub struct FdmBlackScholesMesher {
    locations: Vec<Real>,
}

impl FdmBlackScholesMesher {
    /// Build for `process` up to `maturity`; `strike` picks the volatility.
    pub fn new(
        size: Size,
        process: &GeneralizedBlackScholesProcess,
        maturity: Time,
        strike: Real,
        dividends: &[CashDividend],
        params: &FdmBlackScholesMesherParams,
    ) -> Result<Self> {
        ensure!(maturity > 0.0, "maturity must be positive, got {maturity}");
        ensure!(
            params.eps > 0.0 && params.eps < 0.5,
            "tail probability must be in (0, 0.5), got {}",
            params.eps
        );
        let r = process.risk_free_rate();
        let q = process.dividend_yield();

        let mut steps: Vec<(Time, Real)> = dividends
            .iter()
            .filter(|d| d.time > 0.0 && d.time <= maturity)
            .map(|d| (d.time, d.amount))
            .collect();
        let intermediate = ((24.0 * maturity) as usize).max(2);
        steps.extend((1..=intermediate).map(|i| (i as Time * maturity / intermediate as Time, 0.0)));
        steps.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut fwd = process.spot();
        let (mut lo, mut hi) = (fwd, fwd);
        let mut last = 0.0;
        for (t, amount) in steps {
            fwd *= r.discount(last) / r.discount(t) * q.discount(t) / q.discount(last);
            lo = lo.min(fwd);
            hi = hi.max(fwd);
            fwd -= amount;
            lo = lo.min(fwd);
            hi = hi.max(fwd);
            last = t;
        }
        ensure!(lo > 0.0, "dividends exceed the forward: minimum forward {lo}");

        let norm_inv_eps = normal_cdf_inverse(1.0 - params.eps);
        let sigma_sqrt_t = process.black_volatility().black_vol(maturity, strike) * maturity.sqrt();
        let width = sigma_sqrt_t * norm_inv_eps * params.scale_factor;
        let x_min = params.x_min.unwrap_or(lo.ln() - width);
        let x_max = params.x_max.unwrap_or(hi.ln() + width);

        let locations = match params.concentration {
            Some((level, density)) if level > 0.0 && (x_min..=x_max).contains(&level.ln()) => {
                Concentrating1dMesher::new(x_min, x_max, size, Some((level.ln(), density)), false)?.locations
            }
            _ => Uniform1dMesher::new(x_min, x_max, size)?.locations,
        };
        Ok(Self { locations })
    }
}

locations_mesher!(FdmBlackScholesMesher);

/// Variance mesher for the Heston model.
///
/// The CIR transition law of the variance is moment-matched by a gamma
/// distribution at several times up to maturity; grid points sit at
/// equally spaced quantiles and are averaged over those times.  The
/// lowest point is zero.
#[derive(Debug, Clone, PartialEq)]
pub struct FdmHestonVarianceMesher {
    locations: Vec<Real>,
    vol_at_v0: Real,
}

impl FdmHestonVarianceMesher {
    /// Default number of averaging times.
    pub const T_AVG_STEPS: Size = 10;

    /// Build with `size` points for `process` up to `maturity`.
    pub fn new(size: Size, process: &HestonProcess, maturity: Time, epsilon: Real) -> Result<Self> {
        ensure!(size >= 3, "variance mesher needs at least three points");
        ensure!(maturity > 0.0, "maturity must be positive, got {maturity}");
        ensure!(epsilon > 0.0 && epsilon < 0.5, "epsilon must be in (0, 0.5), got {epsilon}");

        let locations = match Self::quantile_grid(size, process, maturity, epsilon) {
            Ok(locations) => locations,
            Err(_) => Self::fallback_grid(size, process),
        };
        Ok(Self {
            locations,
            vol_at_v0: process.v0().max(0.0).sqrt(),
        })
    }

    fn quantile_grid(size: Size, process: &HestonProcess, maturity: Time, epsilon: Real) -> Result<Vec<Real>> {
        let v0 = process.v0();
        let mut sum = vec![0.0; size];
        let steps = Self::T_AVG_STEPS;
        for l in 1..=steps {
            let t = maturity * l as Real / steps as Real;
            let (mean, var) = process.variance_moments(v0, t);
            let law = GammaDistribution::from_moments(mean, var)?;
            let q_max = v0.max(law.inverse_cdf(1.0 - epsilon));
            let min_step = q_max / (50 * size) as Real;

            let mut v_prev = 0.0;
            for (i, s) in sum.iter_mut().enumerate().skip(1) {
                let p = (1.0 - epsilon) * i as Real / (size - 1) as Real;
                let v = if i == size - 1 { q_max } else { law.inverse_cdf(p) };
                let v = v.max(v_prev + min_step);
                *s += v;
                v_prev = v;
            }
        }
        let locations: Vec<Real> = sum.into_iter().map(|s| s / steps as Real).collect();
        ensure!(
            locations.windows(2).all(|w| w[1] > w[0]) && locations.iter().all(|v| v.is_finite()),
            "degenerate variance quantiles"
        );
        Ok(locations)
    }

    fn fallback_grid(size: Size, process: &HestonProcess) -> Vec<Real> {
        let vol = process.sigma() * (process.theta() / (2.0 * process.kappa())).sqrt();
        let upper = (process.v0() + 4.0 * vol).max(process.theta() + 4.0 * vol);
        let lower = (process.v0() - 4.0 * vol).min(process.theta() - 4.0 * vol).max(0.0);
        let upper = upper.max(lower + 1e-4);
        (0..size)
            .map(|i| lower + i as Real * (upper - lower) / (size - 1) as Real)
            .collect()
    }

    /// `sqrt(v0)`, the spot volatility of the process.
    pub fn vol_at_v0(&self) -> Real {
        self.vol_at_v0
    }
}

locations_mesher!(FdmHestonVarianceMesher);

/// Tensor product of one-dimensional meshers.
#[derive(Debug, Clone)]
pub struct FdmMesherComposite {
    layout: FdmLinearOpLayout,
    meshers: Vec<Arc<dyn Fdm1dMesher>>,
}

impl FdmMesherComposite {
    /// Combine `meshers`, the first one running fastest in memory.
    pub fn new(meshers: Vec<Arc<dyn Fdm1dMesher>>) -> Result<Self> {
        let layout = FdmLinearOpLayout::new(meshers.iter().map(|m| m.size()).collect())?;
        Ok(Self { layout, meshers })
    }

    /// Single-direction grid.
    pub fn from_1d(mesher: Arc<dyn Fdm1dMesher>) -> Result<Self> {
        Self::new(vec![mesher])
    }

    /// Grid layout.
    pub fn layout(&self) -> &FdmLinearOpLayout {
        &self.layout
    }

    /// Mesher of `direction`.
    pub fn mesher(&self, direction: usize) -> &Arc<dyn Fdm1dMesher> {
        &self.meshers[direction]
    }

    /// Location of grid point `index` along `direction`.
    pub fn location(&self, index: usize, direction: usize) -> Real {
        self.meshers[direction].locations()[self.layout.coordinate(index, direction)]
    }

    /// Location along `direction` of every grid point.
    pub fn locations(&self, direction: usize) -> Array {
        Array::from_fn(self.layout.size(), |i| self.location(i, direction))
    }

    /// Forward spacing at `index` along `direction`.
    pub fn dplus(&self, index: usize, direction: usize) -> Option<Real> {
        self.meshers[direction].dplus(self.layout.coordinate(index, direction))
    }

    /// Backward spacing at `index` along `direction`.
    pub fn dminus(&self, index: usize, direction: usize) -> Option<Real> {
        self.meshers[direction].dminus(self.layout.coordinate(index, direction))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use proptest::prelude::*;
    use ql_termstructures::{BlackConstantVol, FlatForward};

    #[test]
    fn uniform_spacing() {
        let m = Uniform1dMesher::new(0.0, 1.0, 5).unwrap();
        assert_eq!(m.size(), 5);
        assert_abs_diff_eq!(m.dplus(1).unwrap(), 0.25, epsilon = 1e-15);
        assert!(m.dminus(0).is_none());
        assert!(m.dplus(4).is_none());
    }

    #[test]
    fn concentration_packs_points_and_hits_cp() {
        let m = Concentrating1dMesher::new(0.0, 10.0, 41, Some((3.3, 0.05)), true).unwrap();
        let loc = m.locations();
        assert!(loc.iter().any(|&x| (x - 3.3).abs() < 1e-14));
        let i = loc.iter().position(|&x| (x - 3.3).abs() < 1e-14).unwrap();
        let near = loc[i + 1] - loc[i];
        let far = loc[40] - loc[39];
        assert!(near < far, "spacing near cp {near} vs far {far}");
    }

    #[test]
    fn black_scholes_mesher_covers_spot() {
        let process = GeneralizedBlackScholesProcess::new(
            100.0,
            Arc::new(FlatForward::new(0.05)),
            Arc::new(FlatForward::new(0.02)),
            Arc::new(BlackConstantVol::new(0.3).unwrap()),
        )
        .unwrap();
        let m = FdmBlackScholesMesher::new(
            100,
            &process,
            1.0,
            100.0,
            &[],
            &FdmBlackScholesMesherParams::default(),
        )
        .unwrap();
        let loc = m.locations();
        assert!(loc[0] < 100f64.ln() && loc[99] > 100f64.ln());
        // ±1.5 · 3.72σ√T around the forwards
        assert!(loc[99] - loc[0] > 3.0);
    }

    #[test]
    fn heston_variance_mesher_starts_at_zero() {
        let process = HestonProcess::new(
            Arc::new(FlatForward::new(0.05)),
            Arc::new(FlatForward::new(0.0)),
            100.0,
            0.04,
            1.5,
            0.04,
            0.3,
            -0.7,
        )
        .unwrap();
        let m = FdmHestonVarianceMesher::new(25, &process, 1.0, 1e-4).unwrap();
        assert_eq!(m.locations()[0], 0.0);
        assert!(m.locations()[24] > 0.04);
        assert_abs_diff_eq!(m.vol_at_v0(), 0.2, epsilon = 1e-15);
    }

    #[test]
    fn composite_locations() {
        let x: Arc<dyn Fdm1dMesher> = Arc::new(Uniform1dMesher::new(0.0, 2.0, 3).unwrap());
        let y: Arc<dyn Fdm1dMesher> = Arc::new(Uniform1dMesher::new(10.0, 11.0, 2).unwrap());
        let m = FdmMesherComposite::new(vec![x, y]).unwrap();
        assert_eq!(m.layout().size(), 6);
        assert_eq!(m.locations(0).to_vec(), vec![0.0, 1.0, 2.0, 0.0, 1.0, 2.0]);
        assert_eq!(m.locations(1).to_vec(), vec![10.0, 10.0, 10.0, 11.0, 11.0, 11.0]);
    }

    proptest! {
        #[test]
        fn concentrating_mesher_is_monotone(
            c in 0.1f64..9.9,
            density in 0.01f64..2.0,
            size in 5usize..80,
            require in any::<bool>(),
        ) {
            let m = Concentrating1dMesher::new(0.0, 10.0, size, Some((c, density)), require).unwrap();
            prop_assert!(m.locations().windows(2).all(|w| w[1] > w[0]));
            prop_assert_eq!(m.locations()[0], 0.0);
            prop_assert_eq!(m.locations()[size - 1], 10.0);
        }
    }
}
