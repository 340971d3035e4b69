//! Finite-difference problems assembled by hand from meshers, operators,
//! step conditions and solvers.

use approx::assert_abs_diff_eq;
use ql_core::{Real, Time};
use ql_instruments::{Exercise, OptionType, Payoff};
use ql_methods::finite_differences::{
    log_inner_values, Fdm1DimSolver, Fdm1dMesher, FdmBlackScholesMesher, FdmBlackScholesMesherParams, FdmBlackScholesOp,
    FdmMesherComposite, FdmSchemeDesc, FdmSolverDesc, FdmStepConditionComposite, LocalVolRndCalculator,
    LocalVolRndSettings,
};
use ql_processes::GeneralizedBlackScholesProcess;
use ql_termstructures::{BlackConstantVol, FlatForward, LocalConstantVol};
use std::sync::Arc;

const SPOT: Real = 100.0;
const STRIKE: Real = 100.0;
const MATURITY: Time = 1.0;
// r = 5%, q = 0, vol = 20%
const EUROPEAN_CALL: Real = 10.450_583_572_185_565;

fn process() -> GeneralizedBlackScholesProcess {
    GeneralizedBlackScholesProcess::new(
        SPOT,
        Arc::new(FlatForward::new(0.05)),
        Arc::new(FlatForward::new(0.0)),
        Arc::new(BlackConstantVol::new(0.2).unwrap()),
    )
    .unwrap()
}

fn solve(exercise: &Exercise, scheme: FdmSchemeDesc, x_grid: usize, t_grid: usize) -> Real {
    let process = process();
    let params = FdmBlackScholesMesherParams {
        concentration: Some((STRIKE, 0.1)),
        ..Default::default()
    };
    let x_mesher = FdmBlackScholesMesher::new(x_grid, &process, MATURITY, STRIKE, &[], &params).unwrap();
    let mesher = Arc::new(FdmMesherComposite::from_1d(Arc::new(x_mesher)).unwrap());
    let payoff = Payoff::vanilla(OptionType::Call, STRIKE);
    let desc = FdmSolverDesc {
        mesher: Arc::clone(&mesher),
        bcs: Vec::new(),
        condition: FdmStepConditionComposite::vanilla(&[], exercise, &mesher, &payoff, 0),
        terminal_values: log_inner_values(&mesher, &payoff, 0),
        maturity: MATURITY,
        time_steps: t_grid,
        damping_steps: 0,
    };
    let op = FdmBlackScholesOp::new(Arc::clone(&mesher), &process, STRIKE);
    Fdm1DimSolver::solve(desc, scheme, Box::new(op))
        .unwrap()
        .interpolate_at(SPOT.ln())
}

#[test]
fn every_scheme_prices_the_european_call() {
    let european = Exercise::european(MATURITY).unwrap();
    for scheme in [
        FdmSchemeDesc::douglas(),
        FdmSchemeDesc::crank_nicolson(),
        FdmSchemeDesc::implicit_euler(),
        FdmSchemeDesc::craig_sneyd(),
        FdmSchemeDesc::hundsdorfer(),
    ] {
        let value = solve(&european, scheme, 200, 200);
        assert_abs_diff_eq!(value, EUROPEAN_CALL, epsilon = 3e-2);
    }
}

#[test]
fn refining_the_grid_reduces_the_error() {
    let european = Exercise::european(MATURITY).unwrap();
    let coarse = (solve(&european, FdmSchemeDesc::douglas(), 50, 50) - EUROPEAN_CALL).abs();
    let fine = (solve(&european, FdmSchemeDesc::douglas(), 400, 400) - EUROPEAN_CALL).abs();
    assert!(fine < coarse, "fine {fine} vs coarse {coarse}");
}

#[test]
fn bermudan_at_maturity_only_is_european() {
    let bermudan = Exercise::bermudan(vec![MATURITY]).unwrap();
    let value = solve(&bermudan, FdmSchemeDesc::douglas(), 200, 200);
    let european = solve(&Exercise::european(MATURITY).unwrap(), FdmSchemeDesc::douglas(), 200, 200);
    assert_abs_diff_eq!(value, european, epsilon = 1e-6);
}

#[test]
fn forward_density_matches_the_lognormal_law() {
    let (r, q, vol, t) = (0.05, 0.02, 0.25, 1.0);
    let calculator = LocalVolRndCalculator::new(
        SPOT,
        Arc::new(FlatForward::new(r)),
        Arc::new(FlatForward::new(q)),
        Arc::new(LocalConstantVol::new(vol).unwrap()),
        t,
        LocalVolRndSettings::default(),
    )
    .unwrap();

    let mean = SPOT.ln() + (r - q - 0.5 * vol * vol) * t;
    let std_dev = vol * t.sqrt();
    assert_abs_diff_eq!(calculator.cdf(mean, t).unwrap(), 0.5, epsilon = 1e-2);
    assert_abs_diff_eq!(calculator.cdf(mean + std_dev, t).unwrap(), 0.841_344_746, epsilon = 1e-2);

    let quantile = calculator.invcdf(0.25, t).unwrap();
    assert_abs_diff_eq!(calculator.cdf(quantile, t).unwrap(), 0.25, epsilon = 1e-4);

    let mesher = calculator.mesher(t).unwrap();
    let locations = mesher.locations();
    assert!(locations.windows(2).all(|w| w[0] < w[1]));
    assert!(locations[0] < mean - 3.0 * std_dev && locations[locations.len() - 1] > mean + 3.0 * std_dev);
}
