//! Conditions applied to the solution at stopping times.
//!
//! The backward solver stops at every time a condition asks for and calls
//! [`StepCondition::apply_to`] after each step.

use crate::finite_differences::meshers::FdmMesherComposite;
use ql_core::{ensure, errors::Result, Real, Time};
use ql_instruments::{BarrierType, CashDividend, Exercise, ExerciseType, Payoff};
use ql_math::interpolations::{CubicNaturalSpline, Interpolation1D};
use ql_math::{comparison::close_to, Array};
use std::sync::Arc;

/// Modifies the solution in place at time `t`.
pub trait StepCondition: std::fmt::Debug + Send + Sync {
    /// Apply the condition to `a` at time `t`.
    fn apply_to(&self, a: &mut Array, t: Time) -> Result<()>;
}

/// Payoff of `exp(x)` at each grid point, `x` the log-spot along
/// `direction`.
pub fn log_inner_values(mesher: &FdmMesherComposite, payoff: &Payoff, direction: usize) -> Array {
    Array::from_fn(mesher.layout().size(), |i| payoff.value(mesher.location(i, direction).exp()))
}

/// `a ← max(a, exercise value)` at every step.
#[derive(Debug, Clone)]
pub struct FdmAmericanStepCondition {
    exercise_values: Array,
}

impl FdmAmericanStepCondition {
    /// Condition with the given exercise value per grid point.
    pub fn new(exercise_values: Array) -> Self {
        Self { exercise_values }
    }
}

impl StepCondition for FdmAmericanStepCondition {
    fn apply_to(&self, a: &mut Array, _t: Time) -> Result<()> {
        for (v, &ev) in a.iter_mut().zip(self.exercise_values.iter()) {
            *v = v.max(ev);
        }
        Ok(())
    }
}

/// `a ← max(a, exercise value)` at the exercise times only.
#[derive(Debug, Clone)]
pub struct FdmBermudanStepCondition {
    exercise_times: Vec<Time>,
    exercise_values: Array,
}

impl FdmBermudanStepCondition {
    /// Condition exercising at `exercise_times`.
    pub fn new(exercise_times: Vec<Time>, exercise_values: Array) -> Self {
        Self {
            exercise_times,
            exercise_values,
        }
    }

    /// Exercise times.
    pub fn exercise_times(&self) -> &[Time] {
        &self.exercise_times
    }
}

impl StepCondition for FdmBermudanStepCondition {
    fn apply_to(&self, a: &mut Array, t: Time) -> Result<()> {
        if self.exercise_times.iter().any(|&e| close_to(e, t)) {
            for (v, &ev) in a.iter_mut().zip(self.exercise_values.iter()) {
                *v = v.max(ev);
            }
        }
        Ok(())
    }
}

/// Cash dividends on a log-spot direction.
///
/// Across a dividend of size `D` paid at `t_D` the value before the payment
/// is `V(S) = V(S - D)` after it; the shifted values come from a cubic
/// spline along each grid line, clamped to the grid.
#[derive(Debug, Clone)]
pub struct FdmDividendHandler {
    dividends: Vec<CashDividend>,
    mesher: Arc<FdmMesherComposite>,
    direction: usize,
    x: Vec<Real>,
}

impl FdmDividendHandler {
    /// Handler for `dividends` on the log-spot `direction`.
    pub fn new(dividends: Vec<CashDividend>, mesher: Arc<FdmMesherComposite>, direction: usize) -> Self {
        let x = mesher.mesher(direction).locations().to_vec();
        Self {
            dividends,
            mesher,
            direction,
            x,
        }
    }

    /// Payment times.
    pub fn dividend_times(&self) -> Vec<Time> {
        self.dividends.iter().map(|d| d.time).collect()
    }
}

impl StepCondition for FdmDividendHandler {
    fn apply_to(&self, a: &mut Array, t: Time) -> Result<()> {
        let Some(dividend) = self.dividends.iter().find(|d| close_to(d.time, t)) else {
            return Ok(());
        };
        let layout = self.mesher.layout();
        let n = self.x.len();
        let (x_min, x_max) = (self.x[0], self.x[n - 1]);
        let shifted: Vec<Real> = self
            .x
            .iter()
            .map(|&x| {
                let spot = x.exp() - dividend.amount;
                if spot > 0.0 {
                    spot.ln().clamp(x_min, x_max)
                } else {
                    x_min
                }
            })
            .collect();

        let stride = layout.spacing()[self.direction];
        let copy = a.clone();
        let mut line = vec![0.0; n];
        // every line start has coordinate 0 along `direction`
        for start in (0..layout.size()).filter(|&i| layout.coordinate(i, self.direction) == 0) {
            for (j, v) in line.iter_mut().enumerate() {
                *v = copy[start + j * stride];
            }
            let spline = CubicNaturalSpline::new(&self.x, &line)?;
            for (j, &xs) in shifted.iter().enumerate() {
                a[start + j * stride] = spline.value(xs);
            }
        }
        Ok(())
    }
}

/// Knock-out projection: grid points beyond the barrier receive the
/// rebate after every step (discretely monitored barrier at every
/// time step).
#[derive(Debug, Clone)]
pub struct FdmBarrierProjection {
    knocked_out: Vec<usize>,
    rebate: Real,
}

impl FdmBarrierProjection {
    /// Projection for a knock-out `barrier_type` at `barrier` on the
    /// log-spot `direction`.
    pub fn new(
        mesher: &FdmMesherComposite,
        barrier_type: BarrierType,
        barrier: Real,
        rebate: Real,
        direction: usize,
    ) -> Result<Self> {
        ensure!(!barrier_type.is_knock_in(), "barrier projection needs a knock-out barrier");
        let knocked_out = (0..mesher.layout().size())
            .filter(|&i| barrier_type.is_triggered(mesher.location(i, direction).exp(), barrier))
            .collect();
        Ok(Self { knocked_out, rebate })
    }
}

impl StepCondition for FdmBarrierProjection {
    fn apply_to(&self, a: &mut Array, _t: Time) -> Result<()> {
        for &i in &self.knocked_out {
            a[i] = self.rebate;
        }
        Ok(())
    }
}

/// Ordered collection of conditions plus the stopping times they need.
#[derive(Debug, Clone, Default)]
pub struct FdmStepConditionComposite {
    stopping_times: Vec<Time>,
    conditions: Vec<Arc<dyn StepCondition>>,
}

impl FdmStepConditionComposite {
    /// Composite from per-condition stopping times.
    pub fn new(stopping_times: Vec<Vec<Time>>, conditions: Vec<Arc<dyn StepCondition>>) -> Self {
        let mut times: Vec<Time> = stopping_times.into_iter().flatten().collect();
        times.sort_by(|a, b| a.total_cmp(b));
        times.dedup_by(|a, b| close_to(*a, *b));
        Self {
            stopping_times: times,
            conditions,
        }
    }

    /// Conditions of a vanilla option on a log-spot `direction`:
    /// dividends, then early exercise.
    pub fn vanilla(
        dividends: &[CashDividend],
        exercise: &Exercise,
        mesher: &Arc<FdmMesherComposite>,
        payoff: &Payoff,
        direction: usize,
    ) -> Self {
        let maturity = exercise.last_time();
        let mut times = Vec::new();
        let mut conditions: Vec<Arc<dyn StepCondition>> = Vec::new();

        let paid: Vec<CashDividend> = dividends
            .iter()
            .copied()
            .filter(|d| d.time > 0.0 && d.time <= maturity)
            .collect();
        if !paid.is_empty() {
            let handler = FdmDividendHandler::new(paid, Arc::clone(mesher), direction);
            times.push(handler.dividend_times());
            conditions.push(Arc::new(handler));
        }

        match exercise.exercise_type() {
            ExerciseType::European => {}
            ExerciseType::American => {
                let values = log_inner_values(mesher, payoff, direction);
                times.push(Vec::new());
                conditions.push(Arc::new(FdmAmericanStepCondition::new(values)));
            }
            ExerciseType::Bermudan => {
                let values = log_inner_values(mesher, payoff, direction);
                let exercise_times = exercise.times().to_vec();
                times.push(exercise_times.clone());
                conditions.push(Arc::new(FdmBermudanStepCondition::new(exercise_times, values)));
            }
        }
        Self::new(times, conditions)
    }

    /// Add a condition with its stopping times.
    pub fn push(&mut self, condition: Arc<dyn StepCondition>, stopping_times: &[Time]) {
        let mut times = std::mem::take(&mut self.stopping_times);
        times.extend_from_slice(stopping_times);
        times.sort_by(|a, b| a.total_cmp(b));
        times.dedup_by(|a, b| close_to(*a, *b));
        self.stopping_times = times;
        self.conditions.push(condition);
    }

    /// Sorted, deduplicated stopping times.
    pub fn stopping_times(&self) -> &[Time] {
        &self.stopping_times
    }

    /// `true` if there are no conditions.
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }
}

impl StepCondition for FdmStepConditionComposite {
    fn apply_to(&self, a: &mut Array, t: Time) -> Result<()> {
        for condition in &self.conditions {
            condition.apply_to(a, t)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::finite_differences::meshers::{Fdm1dMesher, Uniform1dMesher};
    use approx::assert_abs_diff_eq;
    use ql_instruments::OptionType;

    fn mesher() -> Arc<FdmMesherComposite> {
        let m: Arc<dyn Fdm1dMesher> = Arc::new(Uniform1dMesher::new(80f64.ln(), 120f64.ln(), 41).unwrap());
        Arc::new(FdmMesherComposite::from_1d(m).unwrap())
    }

    #[test]
    fn american_condition_floors_at_intrinsic() {
        let mesher = mesher();
        let payoff = Payoff::vanilla(OptionType::Put, 100.0);
        let cond = FdmAmericanStepCondition::new(log_inner_values(&mesher, &payoff, 0));
        let mut a = Array::zeros(41);
        cond.apply_to(&mut a, 0.3).unwrap();
        assert_abs_diff_eq!(a[0], 20.0, epsilon = 1e-9);
        assert_eq!(a[40], 0.0);
    }

    #[test]
    fn bermudan_condition_only_at_exercise_dates() {
        let mesher = mesher();
        let payoff = Payoff::vanilla(OptionType::Put, 100.0);
        let cond = FdmBermudanStepCondition::new(vec![0.5], log_inner_values(&mesher, &payoff, 0));
        let mut a = Array::zeros(41);
        cond.apply_to(&mut a, 0.25).unwrap();
        assert_eq!(a[0], 0.0);
        cond.apply_to(&mut a, 0.5).unwrap();
        assert!(a[0] > 19.9);
    }

    #[test]
    fn dividend_shifts_a_linear_payoff() {
        let mesher = mesher();
        let handler = FdmDividendHandler::new(vec![CashDividend::new(0.5, 2.0).unwrap()], Arc::clone(&mesher), 0);
        let spots = mesher.locations(0).map(Real::exp);
        let mut a = spots.clone();
        handler.apply_to(&mut a, 0.5).unwrap();
        for i in 10..41 {
            assert_abs_diff_eq!(a[i], spots[i] - 2.0, epsilon = 1e-3);
        }
        let mut untouched = spots.clone();
        handler.apply_to(&mut untouched, 0.4).unwrap();
        assert_eq!(untouched, spots);
    }

    #[test]
    fn composite_merges_stopping_times() {
        let mesher = mesher();
        let payoff = Payoff::vanilla(OptionType::Call, 100.0);
        let exercise = Exercise::bermudan(vec![0.25, 0.5, 1.0]).unwrap();
        let dividends = [CashDividend::new(0.5, 1.0).unwrap(), CashDividend::new(2.0, 1.0).unwrap()];
        let composite = FdmStepConditionComposite::vanilla(&dividends, &exercise, &mesher, &payoff, 0);
        assert_eq!(composite.stopping_times(), &[0.25, 0.5, 1.0]);
    }

    #[test]
    fn knock_out_projection() {
        let mesher = mesher();
        let proj = FdmBarrierProjection::new(&mesher, BarrierType::DownOut, 90.0, 1.5, 0).unwrap();
        let mut a = Array::from_element(41, 10.0);
        proj.apply_to(&mut a, 0.1).unwrap();
        assert_eq!(a[0], 1.5);
        assert_eq!(a[40], 10.0);
        assert!(FdmBarrierProjection::new(&mesher, BarrierType::UpIn, 110.0, 0.0, 0).is_err());
    }
}
