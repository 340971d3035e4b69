//! `BlackVolTermStructure`: Black-volatility term structures.
//!
//! Provides the `BlackVolTermStructure` trait and concrete implementations:
//! * `BlackConstantVol`: a flat Black volatility surface.
//! * `BlackVarianceCurve`: strike-independent vols, linear in total variance.

use ql_core::{ensure, errors::Result, Real, Time, Volatility};
use ql_math::interpolations::{Interpolation1D, LinearInterpolation};

/// A Black-volatility term structure.
///
/// Implementors must override **at least one** of
/// [`black_vol`](BlackVolTermStructure::black_vol) and
/// [`black_variance`](BlackVolTermStructure::black_variance).
pub trait BlackVolTermStructure: std::fmt::Debug + Send + Sync {
    /// Black volatility for time `t` and strike `strike`.
    fn black_vol(&self, t: Time, strike: Real) -> Volatility {
        if t <= 0.0 {
            return self.black_vol(1.0e-5, strike);
        }
        (self.black_variance(t, strike) / t).sqrt()
    }

    /// Black variance `σ²·t` for time `t` and strike `strike`.
    fn black_variance(&self, t: Time, strike: Real) -> Real {
        let vol = self.black_vol(t, strike);
        vol * vol * t
    }

    /// Forward volatility between `t1` and `t2`.
    fn black_forward_vol(&self, t1: Time, t2: Time, strike: Real) -> Result<Volatility> {
        ensure!(t2 >= t1, "t2 ({t2}) < t1 ({t1})");
        if t2 == t1 {
            return Ok(self.black_vol(t1, strike));
        }
        let var = self.black_variance(t2, strike) - self.black_variance(t1, strike);
        ensure!(var >= 0.0, "negative forward variance between {t1} and {t2}");
        Ok((var / (t2 - t1)).sqrt())
    }
}

/// A flat (constant) Black volatility surface.
///
/// `σ(t, K) = constant` for all `t > 0` and all strikes `K`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlackConstantVol {
    volatility: Volatility,
}

impl BlackConstantVol {
    /// Create a constant Black vol surface.
    pub fn new(volatility: Volatility) -> Result<Self> {
        ensure!(
            volatility >= 0.0 && volatility.is_finite(),
            "invalid volatility {volatility}"
        );
        Ok(Self { volatility })
    }

    /// The constant volatility value.
    pub fn volatility(&self) -> Volatility {
        self.volatility
    }
}

impl BlackVolTermStructure for BlackConstantVol {
    fn black_vol(&self, _t: Time, _strike: Real) -> Volatility {
        self.volatility
    }

    fn black_variance(&self, t: Time, _strike: Real) -> Real {
        self.volatility * self.volatility * t
    }
}

/// Strike-independent Black vols at given times, interpolated linearly in
/// total variance (flat vol before the first and after the last pillar).
#[derive(Debug, Clone)]
pub struct BlackVarianceCurve {
    variances: LinearInterpolation,
    last_time: Time,
    last_vol: Volatility,
}

impl BlackVarianceCurve {
    /// Build from strictly increasing positive times and their Black vols.
    pub fn new(times: &[Time], vols: &[Volatility]) -> Result<Self> {
        ensure!(
            times.len() == vols.len() && !times.is_empty(),
            "mismatched or empty vol pillars"
        );
        ensure!(times[0] > 0.0, "first pillar time must be positive");
        ensure!(
            vols.iter().all(|v| *v >= 0.0 && v.is_finite()),
            "negative or non-finite volatility"
        );
        let mut xs = Vec::with_capacity(times.len() + 1);
        let mut ys = Vec::with_capacity(times.len() + 1);
        xs.push(0.0);
        ys.push(0.0);
        for (&t, &v) in times.iter().zip(vols) {
            let var = v * v * t;
            ensure!(
                var >= ys[ys.len() - 1],
                "variance must be non-decreasing (t = {t})"
            );
            xs.push(t);
            ys.push(var);
        }
        Ok(Self {
            variances: LinearInterpolation::new(&xs, &ys)?,
            last_time: times[times.len() - 1],
            last_vol: vols[vols.len() - 1],
        })
    }
}

impl BlackVolTermStructure for BlackVarianceCurve {
    fn black_variance(&self, t: Time, _strike: Real) -> Real {
        if t <= self.last_time {
            self.variances.value(t.max(0.0))
        } else {
            self.last_vol * self.last_vol * t
        }
    }
}
