use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ql_core::{errors::Result, BigNatural};
use ql_instruments::{OptionType, Payoff};
use ql_math::random_numbers::{LowDiscrepancySequence, PseudoRandomSequence, RandomSequenceGenerator};
use ql_math::statistics::IncrementalStatistics;
use ql_methods::monte_carlo::{simulate_parallel, EuropeanPathPricer, MonteCarloModel, PathGenerator, PathSource};
use ql_methods::TimeGrid;
use ql_processes::{GeneralizedBlackScholesProcess, StochasticProcess1D};
use ql_termstructures::{BlackConstantVol, FlatForward};
use std::sync::Arc;

fn process() -> Arc<dyn StochasticProcess1D> {
    Arc::new(
        GeneralizedBlackScholesProcess::new(
            100.0,
            Arc::new(FlatForward::new(0.05)),
            Arc::new(FlatForward::new(0.0)),
            Arc::new(BlackConstantVol::new(0.2).unwrap()),
        )
        .unwrap(),
    )
}

fn generator<R: RandomSequenceGenerator>(rsg: R, steps: usize, bridge: bool) -> PathGenerator<R> {
    let grid = Arc::new(TimeGrid::new(1.0, steps).unwrap());
    PathGenerator::new(process(), grid, rsg, bridge).unwrap()
}

fn bench_paths(c: &mut Criterion) {
    let mut pseudo = generator(PseudoRandomSequence::new(64, 42).unwrap(), 64, false);
    c.bench_function("path 64 steps pseudo", |b| b.iter(|| pseudo.next().unwrap().value.back()));

    let mut bridged = generator(LowDiscrepancySequence::new(64, 0).unwrap(), 64, true);
    c.bench_function("path 64 steps sobol bridge", |b| b.iter(|| bridged.next().unwrap().value.back()));
}

fn bench_parallel(c: &mut Criterion) {
    let factory = |seed: BigNatural| -> Result<_> {
        let generator = generator(PseudoRandomSequence::new(1, seed)?, 1, false);
        let pricer = EuropeanPathPricer::new(Payoff::vanilla(OptionType::Call, 100.0), (-0.05_f64).exp())?;
        Ok(MonteCarloModel::<_, _, IncrementalStatistics>::new(generator, pricer, true))
    };
    let mut group = c.benchmark_group("european 64k samples");
    group.sample_size(20);
    group.bench_function("one batch", |b| {
        b.iter(|| simulate_parallel(black_box(7), 1, 65_536, factory).unwrap())
    });
    group.bench_function("16 batches", |b| {
        b.iter(|| simulate_parallel(black_box(7), 16, 4_096, factory).unwrap())
    });
    group.finish();
}

criterion_group!(benches, bench_paths, bench_parallel);
criterion_main!(benches);
