//! Risk-neutral density of the log-spot under local volatility.
//!
//! The density is propagated forward with the Fokker-Planck operator on a
//! log-spot grid, starting from the Gaussian short-time density.  After
//! every step the mass is renormalised to one with the discrete Simpson
//! rule.  When the density at the outer 4% of the grid exceeds the
//! tolerance, the grid is widened, the density re-splined onto it and the
//! operator rebuilt; the affected step indices are recorded.

use crate::finite_differences::meshers::{Concentrating1dMesher, Fdm1dMesher, FdmMesherComposite, Predefined1dMesher};
use crate::finite_differences::operators::FdmLocalVolFwdOp;
use crate::finite_differences::schemes::{DouglasScheme, FdmScheme};
use crate::time_grid::TimeGrid;
use ql_core::{ensure, errors::Error, errors::Result, fail, Real, Size, Time};
use ql_math::integrals::{discrete_simpson, GaussLobattoIntegral, Integrator};
use ql_math::interpolations::{CubicNaturalSpline, Interpolation1D};
use ql_math::solvers1d::Solver1D;
use ql_math::{normal_cdf_inverse, normal_pdf, Array};
use ql_termstructures::{LocalVolTermStructure, YieldTermStructure};
use std::cell::RefCell;
use std::sync::Arc;
use tracing::debug;

/// Grid and tolerance settings of [`LocalVolRndCalculator`].
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LocalVolRndSettings {
    /// Points of the log-spot grid; must exceed 10.
    pub x_grid: Size,
    /// Time steps when the calculator builds its own grid.
    pub t_grid: Size,
    /// Concentration density of the initial grid around the forward.
    pub x0_density: Real,
    /// Probability tolerance for leakage, integration and inversion.
    pub eps: Real,
    /// Evaluation cap of the quadrature and root search.
    pub max_iter: Size,
    /// Length of the initial Gaussian step; half the first grid step when
    /// `None`.
    pub gaussian_step_size: Option<Time>,
}

impl Default for LocalVolRndSettings {
    fn default() -> Self {
        Self {
            x_grid: 101,
            t_grid: 51,
            x0_density: 0.1,
            eps: 1e-6,
            max_iter: 10_000,
            gaussian_step_size: None,
        }
    }
}

/// Density, distribution and quantiles of `ln S_t`.
#[derive(Debug)]
pub struct LocalVolRndCalculator {
    spot: Real,
    vol0: Real,
    risk_free: Arc<dyn YieldTermStructure>,
    dividend: Arc<dyn YieldTermStructure>,
    time_grid: Arc<TimeGrid>,
    settings: LocalVolRndSettings,
    meshers: Vec<Arc<dyn Fdm1dMesher>>,
    densities: Vec<Array>,
    splines: Vec<CubicNaturalSpline>,
    rescale_time_steps: Vec<Size>,
}

impl LocalVolRndCalculator {
    /// Calculator on a uniform grid of `settings.t_grid` steps up to `end`.
    pub fn new(
        spot: Real,
        risk_free: Arc<dyn YieldTermStructure>,
        dividend: Arc<dyn YieldTermStructure>,
        local_vol: Arc<dyn LocalVolTermStructure>,
        end: Time,
        settings: LocalVolRndSettings,
    ) -> Result<Self> {
        let grid = Arc::new(TimeGrid::new(end, settings.t_grid)?);
        Self::with_time_grid(spot, risk_free, dividend, local_vol, grid, settings)
    }

    /// Calculator on a given time grid starting at zero.
    pub fn with_time_grid(
        spot: Real,
        risk_free: Arc<dyn YieldTermStructure>,
        dividend: Arc<dyn YieldTermStructure>,
        local_vol: Arc<dyn LocalVolTermStructure>,
        time_grid: Arc<TimeGrid>,
        settings: LocalVolRndSettings,
    ) -> Result<Self> {
        ensure!(spot > 0.0 && spot.is_finite(), "invalid spot {spot}");
        ensure!(
            settings.x_grid > 10,
            "x grid is too small: {} points, more than 10 are needed",
            settings.x_grid
        );
        ensure!(time_grid.len() >= 2 && time_grid[0] == 0.0, "time grid must start at zero and have a step");
        ensure!(settings.eps > 0.0 && settings.eps < 0.5, "invalid probability tolerance {}", settings.eps);
        let vol0 = local_vol.local_vol(0.0, spot)?;
        ensure!(vol0 > 0.0 && vol0.is_finite(), "invalid local volatility {vol0} at the spot");

        let mut calc = Self {
            spot,
            vol0,
            risk_free,
            dividend,
            time_grid,
            settings,
            meshers: Vec::new(),
            densities: Vec::new(),
            splines: Vec::new(),
            rescale_time_steps: Vec::new(),
        };
        calc.propagate(local_vol)?;
        Ok(calc)
    }

    fn forward_log(&self, t: Time) -> Real {
        (self.spot * self.dividend.discount(t) / self.risk_free.discount(t)).ln()
    }

    fn fwd_op(&self, mesher: &Arc<dyn Fdm1dMesher>, local_vol: &Arc<dyn LocalVolTermStructure>) -> Result<FdmLocalVolFwdOp> {
        Ok(FdmLocalVolFwdOp::new(
            Arc::new(FdmMesherComposite::from_1d(Arc::clone(mesher))?),
            self.spot,
            Arc::clone(&self.risk_free),
            Arc::clone(&self.dividend),
            Arc::clone(local_vol),
        ))
    }

    fn propagate(&mut self, local_vol: Arc<dyn LocalVolTermStructure>) -> Result<()> {
        let eps = self.settings.eps;
        let n = self.settings.x_grid;
        let s_t = self.time_grid[1];
        let mut t = match self.settings.gaussian_step_size {
            Some(step) if step > 0.0 => s_t.min(step),
            _ => 0.5 * s_t,
        };

        let std_dev = self.vol0 * t.sqrt();
        let mut xm = -0.5 * std_dev * std_dev + self.forward_log(t);
        let norm_inv_eps = normal_cdf_inverse(1.0 - eps);
        let std_dev_first_step = self.vol0 * s_t.sqrt();
        let mut lower = xm - norm_inv_eps * std_dev_first_step;
        let mut upper = xm + norm_inv_eps * std_dev_first_step;

        let mut mesher: Arc<dyn Fdm1dMesher> = Arc::new(Concentrating1dMesher::new(
            lower,
            upper,
            n,
            Some((xm, self.settings.x0_density)),
            true,
        )?);
        let mut x = Array::from_slice(mesher.locations());
        let mut p = x.map(|xi| normal_pdf((xi - xm) / std_dev) / std_dev);
        p = rescale(&x, &p)?;

        let b = ((n as Real * 0.04) as Size).max(1);
        let mut op = self.fwd_op(&mesher, &local_vol)?;
        let mut scheme = DouglasScheme::new(0.5);

        for i in 1..self.time_grid.len() {
            let dt = self.time_grid[i] - t;

            let edge = |range: &[Real]| range.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
            let max_left = edge(&p.as_slice()[..b]);
            let max_right = edge(&p.as_slice()[n - b..]);

            if max_left.max(max_right) > eps {
                self.rescale_time_steps.push(i);
                let (old_lower, old_upper) = (lower, upper);

                xm = discrete_simpson(x.as_slice(), x.component_mul(&p).as_slice())?;
                let mut vols = Array::zeros(n);
                for j in 0..n {
                    vols[j] = local_vol.local_vol(t + dt, x[j].exp())?;
                }
                let vm = discrete_simpson(x.as_slice(), vols.as_slice())? / (x[n - 1] - x[0]);
                let scaling = vm * (0.5 * self.time_grid.back()).sqrt();
                if max_left > eps {
                    lower -= scaling * (old_upper - old_lower);
                }
                if max_right > eps {
                    upper += scaling * (old_upper - old_lower);
                }
                debug!(step = i, lower, upper, mean = xm, "density leaks, widening the grid");

                mesher = Arc::new(Concentrating1dMesher::new(lower, upper, n, Some((xm, 0.1)), false)?);
                let spline = CubicNaturalSpline::new(x.as_slice(), p.as_slice())?;
                let xn = Array::from_slice(mesher.locations());
                let pn = xn.map(|v| if v >= old_lower && v <= old_upper { spline.value(v) } else { 0.0 });
                p = rescale(&xn, &pn)?;
                x = xn;
                op = self.fwd_op(&mesher, &local_vol)?;
            }

            scheme.set_step(dt);
            t += dt;
            if dt > Real::EPSILON {
                scheme.step(&mut op, &[], &mut p, t)?;
                p = rescale(&x, &p)?;
            }

            self.splines.push(CubicNaturalSpline::new(x.as_slice(), p.as_slice())?);
            self.meshers.push(Arc::clone(&mesher));
            self.densities.push(p.clone());
        }
        debug!(
            steps = self.time_grid.steps(),
            rescales = self.rescale_time_steps.len(),
            "local vol density propagated"
        );
        Ok(())
    }

    fn probability_interpolation(&self, idx: usize, x: Real) -> Real {
        let spline = &self.splines[idx];
        if spline.is_in_range(x) {
            spline.value(x)
        } else {
            0.0
        }
    }

    fn gaussian(&self, x: Real, t: Time) -> Real {
        let std_dev = self.vol0 * t.sqrt();
        let xm = -0.5 * std_dev * std_dev + self.forward_log(t);
        normal_pdf((x - xm) / std_dev) / std_dev
    }

    fn check_time(&self, t: Time) -> Result<()> {
        ensure!(t > 0.0, "positive time expected, got {t}");
        ensure!(
            t <= self.time_grid.back() * (1.0 + 1e-12),
            "time {t} exceeds the density time grid ending at {}",
            self.time_grid.back()
        );
        Ok(())
    }

    // density at a time already checked by `check_time`
    fn density(&self, x: Real, t: Time) -> Real {
        let t1 = self.time_grid[1];
        let t_min = t1.min(1.0 / 365.0);
        if t <= t_min {
            self.gaussian(x, t)
        } else if t <= t1 {
            let dt = t1 - t_min;
            self.gaussian(x, t_min) * (t1 - t) / dt + self.probability_interpolation(0, x) * (t - t_min) / dt
        } else {
            let times = self.time_grid.times();
            let lb = times.partition_point(|&s| s < t).min(times.len() - 1);
            let idx = lb - 1;
            let dt = times[lb] - times[lb - 1];
            self.probability_interpolation(idx - 1, x) * (times[lb] - t) / dt
                + self.probability_interpolation(idx, x) * (t - times[lb - 1]) / dt
        }
    }

    /// Density of `ln S_t` at `x`.
    pub fn pdf(&self, x: Real, t: Time) -> Result<Real> {
        self.check_time(t)?;
        Ok(self.density(x, t))
    }

    /// `P(ln S_t ≤ x)`.
    pub fn cdf(&self, x: Real, t: Time) -> Result<Real> {
        self.check_time(t)?;
        let tc = self.time_grid.closest_time(t);
        let idx = if tc > t {
            self.time_grid.index(tc)? - 1
        } else {
            (self.meshers.len() - 1).min(self.time_grid.index(tc)?)
        };
        let locations = self.meshers[idx].locations();
        let (mut xl, mut xr) = (locations[0], locations[locations.len() - 1]);
        if x < xl {
            return Ok(0.0);
        } else if x > xr {
            return Ok(1.0);
        }

        let eps = self.settings.eps;
        let integrator = GaussLobattoIntegral::new(self.settings.max_iter, 0.1 * eps);
        let mut addition = 0.1 * (xr - xl);
        let mut widenings = 0;
        if x > 0.5 * (xr + xl) {
            while self.density(xr, t) > 0.01 * eps && widenings < self.settings.max_iter {
                addition *= 1.1;
                xr += addition;
                widenings += 1;
            }
            Ok(1.0 - integrator.integrate(|s| self.density(s, t), x, xr)?)
        } else {
            while self.density(xl, t) > 0.01 * eps && widenings < self.settings.max_iter {
                addition *= 1.1;
                xl -= addition;
                widenings += 1;
            }
            integrator.integrate(|s| self.density(s, t), xl, x)
        }
    }

    /// Quantile `x` with `cdf(x, t) = p`.
    pub fn invcdf(&self, p: Real, t: Time) -> Result<Real> {
        ensure!(p > 0.0 && p < 1.0, "probability must be in (0, 1), got {p}");
        self.check_time(t)?;
        let close = self.time_grid.closest_time(t);
        let (guess, step) = if close == 0.0 {
            let loc = self.meshers[0].locations();
            (self.spot.ln(), 0.02 * (loc[loc.len() - 1] - loc[0]))
        } else {
            let idx = self.time_grid.index(close)? - 1;
            let x = Array::from_slice(self.meshers[idx].locations());
            let step = 0.005 * (x[x.len() - 1] - x[0]);
            let mean = discrete_simpson(x.as_slice(), x.component_mul(&self.densities[idx]).as_slice())?;
            (mean, step)
        };
        self.inverse_cdf(p, t, guess, step)
    }

    fn inverse_cdf(&self, p: Real, t: Time, guess: Real, step: Real) -> Result<Real> {
        let max_evaluations = self.settings.max_iter;
        let (mut lower, mut upper) = (guess, guess);
        let mut evaluations = max_evaluations;
        if self.cdf(guess, t)? < p {
            loop {
                upper += step;
                if self.cdf(upper, t)? >= p || evaluations == 0 {
                    break;
                }
                evaluations -= 1;
            }
        } else {
            loop {
                lower -= step;
                if self.cdf(lower, t)? <= p || evaluations == 0 {
                    break;
                }
                evaluations -= 1;
            }
        }
        if evaluations == 0 {
            fail!("could not bracket the {p} quantile at t = {t}");
        }

        let failure: RefCell<Option<Error>> = RefCell::new(None);
        let solver = Solver1D::new(0.1 * self.settings.eps, max_evaluations)?;
        let root = solver.brent(
            |x| match self.cdf(x, t) {
                Ok(c) => c - p,
                Err(e) => {
                    failure.borrow_mut().get_or_insert(e);
                    Real::NAN
                }
            },
            lower,
            upper,
        );
        if let Some(e) = failure.into_inner() {
            return Err(e);
        }
        Ok(root?.x)
    }

    /// Log-spot grid used for the density at grid time `t`; a point mass
    /// at `ln S_0` for `t = 0`.
    pub fn mesher(&self, t: Time) -> Result<Arc<dyn Fdm1dMesher>> {
        let idx = self.time_grid.index(t)?;
        if idx > 0 {
            Ok(Arc::clone(&self.meshers[idx - 1]))
        } else {
            Ok(Arc::new(Predefined1dMesher::point_mass(self.spot.ln(), self.settings.x_grid)))
        }
    }

    /// Time steps at which the grid was widened.
    pub fn rescale_time_steps(&self) -> &[Size] {
        &self.rescale_time_steps
    }

    /// The time grid.
    pub fn time_grid(&self) -> &Arc<TimeGrid> {
        &self.time_grid
    }
}

fn rescale(x: &Array, p: &Array) -> Result<Array> {
    let mass = discrete_simpson(x.as_slice(), p.as_slice())?;
    ensure!(mass > 0.0 && mass.is_finite(), "density lost all probability mass");
    Ok(p / mass)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ql_math::normal_cdf;
    use ql_termstructures::{FlatForward, LocalConstantVol};

    fn flat_calculator(vol: Real, end: Time, t_grid: Size) -> LocalVolRndCalculator {
        LocalVolRndCalculator::new(
            100.0,
            Arc::new(FlatForward::new(0.05)),
            Arc::new(FlatForward::new(0.02)),
            Arc::new(LocalConstantVol::new(vol).unwrap()),
            end,
            LocalVolRndSettings {
                t_grid,
                ..Default::default()
            },
        )
        .unwrap()
    }

    /// A skew rising for low spots.
    #[derive(Debug)]
    struct SkewedLocalVol;

    impl LocalVolTermStructure for SkewedLocalVol {
        fn local_vol(&self, t: Time, s: Real) -> Result<Real> {
            Ok(0.2 + 0.1 * (-s / 100.0).exp() + 0.02 * t)
        }
    }

    #[test]
    fn density_integrates_to_one_on_every_grid() {
        let calc = LocalVolRndCalculator::new(
            100.0,
            Arc::new(FlatForward::new(0.03)),
            Arc::new(FlatForward::new(0.0)),
            Arc::new(SkewedLocalVol),
            2.0,
            LocalVolRndSettings {
                t_grid: 40,
                ..Default::default()
            },
        )
        .unwrap();
        assert!(!calc.rescale_time_steps().is_empty());
        for i in [1, 5, 20, 40] {
            let t = calc.time_grid()[i];
            let x = calc.mesher(t).unwrap().locations().to_vec();
            let p: Vec<Real> = x.iter().map(|&xi| calc.pdf(xi, t).unwrap()).collect();
            let mass = discrete_simpson(&x, &p).unwrap();
            assert_abs_diff_eq!(mass, 1.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn constant_vol_density_is_lognormal() {
        let calc = flat_calculator(0.25, 1.0, 50);
        let t = 1.0;
        let mean = 100f64.ln() + (0.05 - 0.02 - 0.5 * 0.0625) * t;
        let sd = 0.25;
        for z in [-1.5, -0.5, 0.0, 0.8] {
            let x = mean + z * sd;
            assert_abs_diff_eq!(calc.cdf(x, t).unwrap(), normal_cdf(z), epsilon = 2e-3);
            assert_abs_diff_eq!(calc.pdf(x, t).unwrap(), normal_pdf(z) / sd, epsilon = 1e-2);
        }
        let q = calc.invcdf(0.3, t).unwrap();
        assert_abs_diff_eq!(q, mean + normal_cdf_inverse(0.3) * sd, epsilon = 1e-2);
    }

    #[test]
    fn short_times_use_the_gaussian_density() {
        let calc = flat_calculator(0.2, 1.0, 10);
        let t: Real = 0.5 / 365.0;
        let sd = 0.2 * t.sqrt();
        let xm = -0.5 * sd * sd + (100.0 * (-0.02 * t).exp() / (-0.05 * t).exp()).ln();
        assert_abs_diff_eq!(calc.pdf(xm, t).unwrap(), normal_pdf(0.0) / sd, epsilon = 1e-8);
        assert_eq!(calc.mesher(0.0).unwrap().locations()[0], 100f64.ln());
    }

    #[test]
    fn invalid_requests() {
        let calc = flat_calculator(0.2, 1.0, 10);
        assert!(calc.pdf(0.0, 0.0).is_err());
        assert!(calc.pdf(0.0, 1.5).is_err());
        assert!(calc.invcdf(1.0, 0.5).is_err());
        let small = LocalVolRndCalculator::new(
            100.0,
            Arc::new(FlatForward::new(0.0)),
            Arc::new(FlatForward::new(0.0)),
            Arc::new(LocalConstantVol::new(0.2).unwrap()),
            1.0,
            LocalVolRndSettings {
                x_grid: 10,
                ..Default::default()
            },
        );
        assert!(small.is_err());
    }
}
