//! Integration tests of the Monte Carlo framework: generators, models,
//! the convergence driver and parallel batches working together.

use ql_core::{errors::Result, BigNatural, Real};
use ql_instruments::{OptionType, Payoff};
use ql_math::random_numbers::{LowDiscrepancySequence, PseudoRandomSequence};
use ql_math::statistics::{IncrementalStatistics, StatisticsAccumulator};
use ql_methods::monte_carlo::{
    simulate_parallel, EuropeanPathPricer, McSimulation, McStatus, MonteCarloModel, Path, PathGenerator, PathPricer,
};
use ql_methods::TimeGrid;
use ql_processes::{GeneralizedBlackScholesProcess, StochasticProcess1D};
use ql_termstructures::{BlackConstantVol, FlatForward};
use std::sync::Arc;

const SPOT: Real = 100.0;
const RATE: Real = 0.05;

/// Route `tracing` events to the test harness; `RUST_LOG=debug` shows them.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn process() -> Arc<dyn StochasticProcess1D> {
    Arc::new(
        GeneralizedBlackScholesProcess::new(
            SPOT,
            Arc::new(FlatForward::new(RATE)),
            Arc::new(FlatForward::new(0.0)),
            Arc::new(BlackConstantVol::new(0.2).unwrap()),
        )
        .unwrap(),
    )
}

#[derive(Debug)]
struct TerminalSpot;

impl PathPricer<Path> for TerminalSpot {
    fn value(&self, path: &Path) -> Result<Real> {
        Ok(path.back())
    }
}

fn european_model(seed: BigNatural) -> Result<MonteCarloModel<PathGenerator<PseudoRandomSequence>, EuropeanPathPricer, IncrementalStatistics>> {
    let grid = Arc::new(TimeGrid::new(1.0, 4)?);
    let generator = PathGenerator::new(process(), grid, PseudoRandomSequence::new(4, seed)?, false)?;
    let pricer = EuropeanPathPricer::new(Payoff::vanilla(OptionType::Call, 100.0), (-RATE).exp())?;
    Ok(MonteCarloModel::new(generator, pricer, true))
}

#[test]
fn tolerance_mode_converges_below_the_target() {
    init_tracing();
    let mut simulation = McSimulation::new(european_model(42).unwrap());
    let outcome = simulation.calculate(Some(0.05), None, None).unwrap();
    assert_eq!(outcome.status, McStatus::Converged);
    assert!(outcome.error_estimate.unwrap() <= 0.05);
    assert!(outcome.samples >= 1023);
    // Black-Scholes value 10.4506
    assert!((outcome.value - 10.4506).abs() < 4.0 * 0.05);
}

#[test]
fn sample_cap_is_a_hard_stop() {
    let mut simulation = McSimulation::new(european_model(42).unwrap());
    let outcome = simulation.calculate(Some(1e-4), None, Some(4096)).unwrap();
    assert_eq!(outcome.status, McStatus::Exhausted);
    assert!(outcome.samples <= 4096);
    assert!(outcome.value > 9.0 && outcome.value < 12.0);
}

#[test]
fn same_seed_same_estimate() {
    let run = |seed| {
        McSimulation::new(european_model(seed).unwrap())
            .calculate(None, Some(2048), None)
            .unwrap()
            .value
    };
    assert_eq!(run(7), run(7));
    assert_ne!(run(7), run(8));
}

#[test]
fn brownian_bridge_keeps_the_terminal_law() {
    let grid = Arc::new(TimeGrid::new(1.0, 16).unwrap());
    let forward = SPOT * RATE.exp();
    for bridge in [false, true] {
        let rsg = PseudoRandomSequence::new(16, 11).unwrap();
        let generator = PathGenerator::new(process(), Arc::clone(&grid), rsg, bridge).unwrap();
        let outcome = McSimulation::new(MonteCarloModel::<_, _, IncrementalStatistics>::new(generator, TerminalSpot, false))
            .calculate(None, Some(20_000), None)
            .unwrap();
        let error = outcome.error_estimate.unwrap();
        assert!((outcome.value - forward).abs() < 4.0 * error, "bridge {bridge}: {} vs {forward}", outcome.value);
    }
}

#[test]
fn sobol_paths_refuse_a_tolerance() {
    let grid = Arc::new(TimeGrid::new(1.0, 4).unwrap());
    let rsg = LowDiscrepancySequence::new(4, 0).unwrap();
    let generator = PathGenerator::new(process(), grid, rsg, true).unwrap();
    let pricer = EuropeanPathPricer::new(Payoff::vanilla(OptionType::Call, 100.0), (-RATE).exp()).unwrap();
    let mut simulation = McSimulation::new(MonteCarloModel::<_, _, IncrementalStatistics>::new(generator, pricer, false));
    assert!(simulation.calculate(Some(0.01), None, None).is_err());
    let outcome = simulation.calculate(None, Some(4096), None).unwrap();
    assert!((outcome.value - 10.4506).abs() < 0.1, "{}", outcome.value);
}

#[test]
fn parallel_batches_do_not_depend_on_the_thread_count() {
    init_tracing();
    let run = |threads| {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .unwrap()
            .install(|| simulate_parallel(2024, 8, 512, european_model).unwrap())
    };
    let single: IncrementalStatistics = run(1);
    let pooled: IncrementalStatistics = run(4);
    assert_eq!(single.samples(), 8 * 512);
    assert_eq!(single.samples(), pooled.samples());
    assert_eq!(single.mean().unwrap(), pooled.mean().unwrap());
    assert_eq!(single.variance().unwrap(), pooled.variance().unwrap());
}
