//! Backward time marching and solution interpolation.

use crate::finite_differences::boundary::FdmDirichletBoundary;
use crate::finite_differences::meshers::FdmMesherComposite;
use crate::finite_differences::operators::FdmLinearOpComposite;
use crate::finite_differences::schemes::{FdmScheme, FdmSchemeDesc, ImplicitEulerScheme};
use crate::finite_differences::step_conditions::{FdmStepConditionComposite, StepCondition};
use ql_core::{ensure, errors::Result, Real, Size, Time};
use ql_math::interpolations::{CubicNaturalSpline, Interpolation1D};
use ql_math::{comparison::close_to, Array};
use std::sync::Arc;
use tracing::{debug, trace};

/// Rolls a solution back in time under an operator, boundary conditions
/// and step conditions.
///
/// The first step from the start and the first step after every
/// stopping time are replaced by `damping_steps` implicit Euler sub-steps
/// to smooth payoff kinks, dividend shifts and exercise projections.
#[derive(Debug)]
pub struct FdmBackwardSolver {
    op: Box<dyn FdmLinearOpComposite>,
    bcs: Vec<FdmDirichletBoundary>,
    condition: FdmStepConditionComposite,
    scheme: FdmSchemeDesc,
}

impl FdmBackwardSolver {
    /// Solver with the given pieces.
    pub fn new(
        op: Box<dyn FdmLinearOpComposite>,
        bcs: Vec<FdmDirichletBoundary>,
        condition: FdmStepConditionComposite,
        scheme: FdmSchemeDesc,
    ) -> Self {
        Self {
            op,
            bcs,
            condition,
            scheme,
        }
    }

    /// Step conditions.
    pub fn condition(&self) -> &FdmStepConditionComposite {
        &self.condition
    }

    /// Roll `a` back from `from` to `to` in `steps` regular steps.
    pub fn rollback(&mut self, a: &mut Array, from: Time, to: Time, steps: Size, damping_steps: Size) -> Result<()> {
        ensure!(from > to, "rollback needs from > to, got {from} <= {to}");
        ensure!(steps > 0, "at least one time step is required");

        let mut scheme = self.scheme.build();
        let mut damping = ImplicitEulerScheme::new();
        let dt = (from - to) / steps as Real;
        let mut stops: Vec<Time> = self
            .condition
            .stopping_times()
            .iter()
            .copied()
            .filter(|&s| s < from && s > to && !close_to(s, from) && !close_to(s, to))
            .collect();
        stops.sort_by(|a, b| b.total_cmp(a));
        let mut stops = stops.into_iter().peekable();

        if self.condition.stopping_times().iter().any(|&s| close_to(s, from)) {
            self.condition.apply_to(a, from)?;
        }

        let mut damp = damping_steps > 0;
        let mut t = from;
        for i in 0..steps {
            let next = if i + 1 == steps { to } else { from - (i + 1) as Real * dt };
            let mut now = t;
            while let Some(&stop) = stops.peek() {
                if stop <= next || close_to(stop, next) {
                    break;
                }
                self.advance(&mut *scheme, &mut damping, &mut damp, damping_steps, a, now, stop)?;
                self.condition.apply_to(a, stop)?;
                damp = damping_steps > 0;
                now = stop;
                stops.next();
            }
            self.advance(&mut *scheme, &mut damping, &mut damp, damping_steps, a, now, next)?;
            self.condition.apply_to(a, next)?;
            if self.condition.stopping_times().iter().any(|&s| close_to(s, next)) {
                damp = damping_steps > 0;
            }
            t = next;
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn advance(
        &mut self,
        scheme: &mut dyn FdmScheme,
        damping: &mut ImplicitEulerScheme,
        damp: &mut bool,
        damping_steps: Size,
        a: &mut Array,
        from: Time,
        to: Time,
    ) -> Result<()> {
        if *damp {
            debug!(from, to, damping_steps, "implicit Euler damping");
            let sub = (from - to) / damping_steps as Real;
            damping.set_step(sub);
            let mut t = from;
            for _ in 0..damping_steps {
                damping.step(self.op.as_mut(), &self.bcs, a, t)?;
                t -= sub;
            }
            *damp = false;
        } else {
            trace!(from, to, "scheme step");
            scheme.set_step(from - to);
            scheme.step(self.op.as_mut(), &self.bcs, a, from)?;
        }
        Ok(())
    }
}

/// Everything a solver needs apart from the operator.
#[derive(Debug, Clone)]
pub struct FdmSolverDesc {
    /// Grid.
    pub mesher: Arc<FdmMesherComposite>,
    /// Dirichlet boundaries.
    pub bcs: Vec<FdmDirichletBoundary>,
    /// Step conditions and their stopping times.
    pub condition: FdmStepConditionComposite,
    /// Values at maturity on the grid.
    pub terminal_values: Array,
    /// Time to maturity.
    pub maturity: Time,
    /// Number of regular time steps.
    pub time_steps: Size,
    /// Number of damping sub-steps.
    pub damping_steps: Size,
}

impl FdmSolverDesc {
    fn validate(&self) -> Result<()> {
        ensure!(self.maturity > 0.0, "maturity must be positive, got {}", self.maturity);
        ensure!(self.time_steps > 0, "at least one time step is required");
        ensure!(
            self.terminal_values.len() == self.mesher.layout().size(),
            "terminal values do not match the grid size"
        );
        Ok(())
    }
}

/// Roll the terminal values back to the theta time and then to zero.
fn solve_with_theta(
    desc: FdmSolverDesc,
    scheme: FdmSchemeDesc,
    op: Box<dyn FdmLinearOpComposite>,
) -> Result<(Array, Array, Time)> {
    desc.validate()?;
    let theta_time = 0.99 * (1.0 / 365.0_f64).min(desc.maturity);
    let mut solver = FdmBackwardSolver::new(op, desc.bcs, desc.condition, scheme);
    let mut a = desc.terminal_values;
    solver.rollback(&mut a, desc.maturity, theta_time, desc.time_steps, desc.damping_steps)?;
    let at_theta = a.clone();
    solver.rollback(&mut a, theta_time, 0.0, 1, 0)?;
    Ok((a, at_theta, theta_time))
}

/// Solution of a one-dimensional problem at `t = 0`, interpolated with
/// natural cubic splines.
#[derive(Debug, Clone)]
pub struct Fdm1DimSolver {
    values: CubicNaturalSpline,
    theta_values: CubicNaturalSpline,
    theta_time: Time,
    raw: Array,
}

impl Fdm1DimSolver {
    /// Solve the problem described by `desc` under `op`.
    pub fn solve(desc: FdmSolverDesc, scheme: FdmSchemeDesc, op: Box<dyn FdmLinearOpComposite>) -> Result<Self> {
        ensure!(desc.mesher.layout().directions() == 1, "one-dimensional grid expected");
        let x = desc.mesher.mesher(0).locations().to_vec();
        let (a, at_theta, theta_time) = solve_with_theta(desc, scheme, op)?;
        Ok(Self {
            values: CubicNaturalSpline::new(&x, a.as_slice())?,
            theta_values: CubicNaturalSpline::new(&x, at_theta.as_slice())?,
            theta_time,
            raw: a,
        })
    }

    /// Value at grid coordinate `x`.
    pub fn interpolate_at(&self, x: Real) -> Real {
        self.values.value(x)
    }

    /// `∂V/∂x` at `x`.
    pub fn derivative_x(&self, x: Real) -> Real {
        self.values.derivative(x)
    }

    /// `∂²V/∂x²` at `x`.
    pub fn derivative_xx(&self, x: Real) -> Real {
        self.values.second_derivative(x)
    }

    /// `∂V/∂t` at `x`, from the solution one small step before `t = 0`.
    pub fn theta_at(&self, x: Real) -> Real {
        (self.theta_values.value(x) - self.values.value(x)) / self.theta_time
    }

    /// Solution values on the grid.
    pub fn grid_values(&self) -> &Array {
        &self.raw
    }
}

/// Solution of a two-dimensional problem at `t = 0`, interpolated with
/// tensor-product natural cubic splines.
#[derive(Debug, Clone)]
pub struct Fdm2DimSolver {
    x: Vec<Real>,
    y: Vec<Real>,
    values: Vec<Vec<Real>>,
    theta_values: Vec<Vec<Real>>,
    theta_time: Time,
}

impl Fdm2DimSolver {
    /// Solve the problem described by `desc` under `op`.
    pub fn solve(desc: FdmSolverDesc, scheme: FdmSchemeDesc, op: Box<dyn FdmLinearOpComposite>) -> Result<Self> {
        ensure!(desc.mesher.layout().directions() == 2, "two-dimensional grid expected");
        let x = desc.mesher.mesher(0).locations().to_vec();
        let y = desc.mesher.mesher(1).locations().to_vec();
        let (a, at_theta, theta_time) = solve_with_theta(desc, scheme, op)?;
        let rows = |v: &Array| -> Vec<Vec<Real>> { v.as_slice().chunks(x.len()).map(<[Real]>::to_vec).collect() };
        Ok(Self {
            values: rows(&a),
            theta_values: rows(&at_theta),
            x,
            y,
            theta_time,
        })
    }

    fn along_y(&self, column: Vec<Real>, y: Real) -> Result<Real> {
        Ok(CubicNaturalSpline::new(&self.y, &column)?.value(y))
    }

    fn eval<F>(&self, grid: &[Vec<Real>], x: Real, y: Real, f: F) -> Result<Real>
    where
        F: Fn(&CubicNaturalSpline, Real) -> Real,
    {
        let column = grid
            .iter()
            .map(|row| CubicNaturalSpline::new(&self.x, row).map(|s| f(&s, x)))
            .collect::<Result<Vec<_>>>()?;
        self.along_y(column, y)
    }

    /// Value at `(x, y)`.
    pub fn interpolate_at(&self, x: Real, y: Real) -> Result<Real> {
        self.eval(&self.values, x, y, |s, x| s.value(x))
    }

    /// `∂V/∂x` at `(x, y)`.
    pub fn derivative_x(&self, x: Real, y: Real) -> Result<Real> {
        self.eval(&self.values, x, y, |s, x| s.derivative(x))
    }

    /// `∂²V/∂x²` at `(x, y)`.
    pub fn derivative_xx(&self, x: Real, y: Real) -> Result<Real> {
        self.eval(&self.values, x, y, |s, x| s.second_derivative(x))
    }

    /// `∂V/∂y` at `(x, y)`.
    pub fn derivative_y(&self, x: Real, y: Real) -> Result<Real> {
        let column = self
            .values
            .iter()
            .map(|row| CubicNaturalSpline::new(&self.x, row).map(|s| s.value(x)))
            .collect::<Result<Vec<_>>>()?;
        Ok(CubicNaturalSpline::new(&self.y, &column)?.derivative(y))
    }

    /// `∂V/∂t` at `(x, y)`.
    pub fn theta_at(&self, x: Real, y: Real) -> Result<Real> {
        let before = self.eval(&self.theta_values, x, y, |s, x| s.value(x))?;
        Ok((before - self.interpolate_at(x, y)?) / self.theta_time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::finite_differences::meshers::{
        Fdm1dMesher, FdmBlackScholesMesher, FdmBlackScholesMesherParams, FdmHestonVarianceMesher,
    };
    use crate::finite_differences::operators::{FdmBlackScholesOp, FdmHestonOp};
    use crate::finite_differences::step_conditions::log_inner_values;
    use approx::assert_abs_diff_eq;
    use ql_instruments::{Exercise, OptionType, Payoff};
    use ql_processes::{GeneralizedBlackScholesProcess, HestonProcess};
    use ql_termstructures::{BlackConstantVol, FlatForward};

    fn process() -> GeneralizedBlackScholesProcess {
        GeneralizedBlackScholesProcess::new(
            100.0,
            Arc::new(FlatForward::new(0.05)),
            Arc::new(FlatForward::new(0.0)),
            Arc::new(BlackConstantVol::new(0.2).unwrap()),
        )
        .unwrap()
    }

    fn solve_bs(payoff: Payoff, exercise: Exercise, scheme: FdmSchemeDesc) -> Fdm1DimSolver {
        let process = process();
        let mesher_1d: Arc<dyn Fdm1dMesher> = Arc::new(
            FdmBlackScholesMesher::new(
                200,
                &process,
                exercise.last_time(),
                payoff.strike(),
                &[],
                &FdmBlackScholesMesherParams {
                    concentration: Some((payoff.strike(), 0.1)),
                    ..Default::default()
                },
            )
            .unwrap(),
        );
        let mesher = Arc::new(FdmMesherComposite::from_1d(mesher_1d).unwrap());
        let condition = FdmStepConditionComposite::vanilla(&[], &exercise, &mesher, &payoff, 0);
        let desc = FdmSolverDesc {
            terminal_values: log_inner_values(&mesher, &payoff, 0),
            mesher: Arc::clone(&mesher),
            bcs: Vec::new(),
            condition,
            maturity: exercise.last_time(),
            time_steps: 100,
            damping_steps: 0,
        };
        let op = FdmBlackScholesOp::new(mesher, &process, payoff.strike());
        Fdm1DimSolver::solve(desc, scheme, Box::new(op)).unwrap()
    }

    #[test]
    fn european_call_matches_black_scholes() {
        let solver = solve_bs(
            Payoff::vanilla(OptionType::Call, 100.0),
            Exercise::european(1.0).unwrap(),
            FdmSchemeDesc::douglas(),
        );
        let x = 100f64.ln();
        assert_abs_diff_eq!(solver.interpolate_at(x), 10.4506, epsilon = 2e-2);
        // delta = V_x / S
        assert_abs_diff_eq!(solver.derivative_x(x) / 100.0, 0.6368, epsilon = 2e-3);
        let gamma = (solver.derivative_xx(x) - solver.derivative_x(x)) / (100.0 * 100.0);
        assert_abs_diff_eq!(gamma, 0.01876, epsilon = 5e-4);
        assert!(solver.theta_at(x) < 0.0);
    }

    #[test]
    fn american_put_exceeds_european_put() {
        let european = solve_bs(
            Payoff::vanilla(OptionType::Put, 100.0),
            Exercise::european(1.0).unwrap(),
            FdmSchemeDesc::crank_nicolson(),
        );
        let american = solve_bs(
            Payoff::vanilla(OptionType::Put, 100.0),
            Exercise::american(0.0, 1.0).unwrap(),
            FdmSchemeDesc::crank_nicolson(),
        );
        let x = 100f64.ln();
        assert_abs_diff_eq!(european.interpolate_at(x), 5.5735, epsilon = 2e-2);
        // reference binomial value 6.090
        assert_abs_diff_eq!(american.interpolate_at(x), 6.09, epsilon = 3e-2);
    }

    #[test]
    fn damping_is_applied_before_the_scheme() {
        let process = process();
        let mesher_1d: Arc<dyn Fdm1dMesher> = Arc::new(
            FdmBlackScholesMesher::new(100, &process, 1.0, 100.0, &[], &FdmBlackScholesMesherParams::default())
                .unwrap(),
        );
        let mesher = Arc::new(FdmMesherComposite::from_1d(mesher_1d).unwrap());
        let payoff = Payoff::cash_or_nothing(OptionType::Call, 100.0, 1.0);
        let desc = |damping_steps| FdmSolverDesc {
            terminal_values: log_inner_values(&mesher, &payoff, 0),
            mesher: Arc::clone(&mesher),
            bcs: Vec::new(),
            condition: FdmStepConditionComposite::default(),
            maturity: 1.0,
            time_steps: 50,
            damping_steps,
        };
        let op = || Box::new(FdmBlackScholesOp::new(Arc::clone(&mesher), &process, 100.0));
        let damped = Fdm1DimSolver::solve(desc(4), FdmSchemeDesc::crank_nicolson(), op()).unwrap();
        // e^{-r} N(d2) with d2 = 0.15
        assert_abs_diff_eq!(damped.interpolate_at(100f64.ln()), 0.5323, epsilon = 5e-3);
    }

    #[test]
    fn heston_degenerates_to_black_scholes() {
        // small vol-of-vol with v0 = theta is close to Black-Scholes at sqrt(v0)
        let heston = HestonProcess::new(
            Arc::new(FlatForward::new(0.05)),
            Arc::new(FlatForward::new(0.0)),
            100.0,
            0.04,
            1.0,
            0.04,
            0.01,
            0.0,
        )
        .unwrap();
        let bs = process();
        let x: Arc<dyn Fdm1dMesher> = Arc::new(
            FdmBlackScholesMesher::new(100, &bs, 1.0, 100.0, &[], &FdmBlackScholesMesherParams::default()).unwrap(),
        );
        let v: Arc<dyn Fdm1dMesher> = Arc::new(FdmHestonVarianceMesher::new(9, &heston, 1.0, 1e-4).unwrap());
        let mesher = Arc::new(FdmMesherComposite::new(vec![x, v]).unwrap());
        let payoff = Payoff::vanilla(OptionType::Call, 100.0);
        let desc = FdmSolverDesc {
            terminal_values: log_inner_values(&mesher, &payoff, 0),
            mesher: Arc::clone(&mesher),
            bcs: Vec::new(),
            condition: FdmStepConditionComposite::default(),
            maturity: 1.0,
            time_steps: 50,
            damping_steps: 0,
        };
        let op = FdmHestonOp::new(Arc::clone(&mesher), &heston).unwrap();
        let solver = Fdm2DimSolver::solve(desc, FdmSchemeDesc::hundsdorfer(), Box::new(op)).unwrap();
        let value = solver.interpolate_at(100f64.ln(), 0.04).unwrap();
        assert_abs_diff_eq!(value, 10.4506, epsilon = 5e-2);
    }

    #[test]
    fn invalid_descriptions_are_rejected() {
        let process = process();
        let m: Arc<dyn Fdm1dMesher> = Arc::new(
            FdmBlackScholesMesher::new(50, &process, 1.0, 100.0, &[], &FdmBlackScholesMesherParams::default()).unwrap(),
        );
        let mesher = Arc::new(FdmMesherComposite::from_1d(m).unwrap());
        let desc = FdmSolverDesc {
            terminal_values: Array::zeros(3),
            mesher: Arc::clone(&mesher),
            bcs: Vec::new(),
            condition: FdmStepConditionComposite::default(),
            maturity: 1.0,
            time_steps: 10,
            damping_steps: 0,
        };
        let op = FdmBlackScholesOp::new(mesher, &process, 100.0);
        assert!(Fdm1DimSolver::solve(desc, FdmSchemeDesc::douglas(), Box::new(op)).is_err());
    }
}
