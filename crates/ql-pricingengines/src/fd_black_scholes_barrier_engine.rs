//! Finite-difference Black-Scholes engine for single-barrier options.
//!
//! Knock-out options are solved on a log-spot grid ending at the barrier,
//! where a Dirichlet condition pays the rebate.  Knock-in options follow
//! from in-out parity: the vanilla minus the knock-out without rebate,
//! plus the value of receiving the rebate at expiry if the barrier is
//! never hit.

use crate::context::PricingContext;
use crate::fd_black_scholes_vanilla_engine::{spot_results, FdBlackScholesSettings};
use ql_core::{ensure, errors::Result, Real};
use ql_instruments::{BarrierOptionArguments, BarrierType, ExerciseType, Payoff, PricingEngine, PricingResults};
use ql_math::Array;
use ql_methods::finite_differences::{
    log_inner_values, BoundarySide, Fdm1DimSolver, FdmBarrierProjection, FdmBlackScholesMesher,
    FdmBlackScholesMesherParams, FdmBlackScholesOp, FdmDirichletBoundary, FdmMesherComposite, FdmSolverDesc,
    FdmStepConditionComposite,
};
use ql_processes::GeneralizedBlackScholesProcess;
use std::sync::Arc;
use tracing::debug;

/// Finite-difference engine for European single-barrier options.
#[derive(Debug, Clone)]
pub struct FdBlackScholesBarrierEngine {
    settings: FdBlackScholesSettings,
}

enum Terminal {
    Payoff,
    Constant(Real),
}

impl FdBlackScholesBarrierEngine {
    /// Engine with validated settings.
    pub fn new(settings: FdBlackScholesSettings) -> Result<Self> {
        settings.validate()?;
        Ok(Self { settings })
    }

    /// The grid settings.
    pub fn settings(&self) -> &FdBlackScholesSettings {
        &self.settings
    }

    fn solve(
        &self,
        process: &GeneralizedBlackScholesProcess,
        args: &BarrierOptionArguments,
        knock_out: Option<(BarrierType, Real)>,
        terminal: Terminal,
    ) -> Result<Fdm1DimSolver> {
        let maturity = args.exercise.last_time();
        let strike = args.payoff.strike();
        let mut params = FdmBlackScholesMesherParams {
            concentration: Some((strike, 0.1)),
            ..FdmBlackScholesMesherParams::default()
        };
        if knock_out.is_some() {
            if args.barrier_type.is_down() {
                params.x_min = Some(args.barrier.ln());
            } else {
                params.x_max = Some(args.barrier.ln());
            }
        }
        let x_mesher = FdmBlackScholesMesher::new(self.settings.x_grid, process, maturity, strike, &[], &params)?;
        let mesher = Arc::new(FdmMesherComposite::from_1d(Arc::new(x_mesher))?);

        let mut condition = FdmStepConditionComposite::default();
        let mut bcs = Vec::new();
        if let Some((barrier_type, rebate)) = knock_out {
            let side = if barrier_type.is_down() { BoundarySide::Lower } else { BoundarySide::Upper };
            bcs.push(FdmDirichletBoundary::new(&mesher, rebate, 0, side));
            let projection = FdmBarrierProjection::new(&mesher, barrier_type, args.barrier, rebate, 0)?;
            condition.push(Arc::new(projection), &[]);
        }
        let terminal_values = match terminal {
            Terminal::Payoff => log_inner_values(&mesher, &args.payoff, 0),
            Terminal::Constant(c) => Array::from_element(mesher.layout().size(), c),
        };

        let desc = FdmSolverDesc {
            mesher: Arc::clone(&mesher),
            bcs,
            condition,
            terminal_values,
            maturity,
            time_steps: self.settings.t_grid,
            damping_steps: self.settings.damping_steps,
        };
        let op = FdmBlackScholesOp::new(Arc::clone(&mesher), process, strike);
        Fdm1DimSolver::solve(desc, self.settings.scheme, Box::new(op))
    }
}

fn knock_out_of(barrier_type: BarrierType) -> BarrierType {
    match barrier_type {
        BarrierType::DownIn => BarrierType::DownOut,
        BarrierType::UpIn => BarrierType::UpOut,
        other => other,
    }
}

impl PricingEngine<BarrierOptionArguments, PricingContext> for FdBlackScholesBarrierEngine {
    fn calculate(&self, args: &BarrierOptionArguments, context: &PricingContext) -> Result<PricingResults> {
        let args = context.rebase_barrier(args)?;
        ensure!(
            args.exercise.exercise_type() == ExerciseType::European,
            "not a European option"
        );
        ensure!(
            matches!(args.payoff, Payoff::PlainVanilla { .. }),
            "{} payoff not supported by the barrier engine",
            args.payoff.name()
        );
        let process = self.settings.process(context)?;
        let spot = process.spot();
        ensure!(!args.barrier_type.is_triggered(spot, args.barrier), "barrier touched");

        let results = if args.barrier_type.is_knock_in() {
            let out_type = knock_out_of(args.barrier_type);
            let vanilla = spot_results(&self.solve(&process, &args, None, Terminal::Payoff)?, spot);
            let out = spot_results(&self.solve(&process, &args, Some((out_type, 0.0)), Terminal::Payoff)?, spot);
            let mut results = combine(&vanilla, &out, -1.0);
            if args.rebate != 0.0 {
                let untouched = self.solve(&process, &args, Some((out_type, 0.0)), Terminal::Constant(args.rebate))?;
                results = combine(&results, &spot_results(&untouched, spot), 1.0);
            }
            results
        } else {
            let solver = self.solve(&process, &args, Some((args.barrier_type, args.rebate)), Terminal::Payoff)?;
            spot_results(&solver, spot)
        };
        debug!(
            barrier_type = ?args.barrier_type,
            barrier = args.barrier,
            value = results.value,
            "barrier grid solved"
        );
        Ok(results)
    }
}

fn combine(a: &PricingResults, b: &PricingResults, weight: Real) -> PricingResults {
    let add = |x: Option<Real>, y: Option<Real>| Some(x? + weight * y?);
    let mut results = PricingResults::from_value(a.value + weight * b.value);
    results.delta = add(a.delta, b.delta);
    results.gamma = add(a.gamma, b.gamma);
    results.theta = add(a.theta, b.theta);
    results
}
