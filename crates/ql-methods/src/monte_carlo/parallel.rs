//! Deterministic parallel sampling on a `rayon` pool.
//!
//! Each batch builds its own model from a seed derived from the master
//! seed and the batch index, runs it, and hands back its accumulator.  The
//! accumulators are merged in batch order, so the result does not depend
//! on the number of worker threads.

use crate::monte_carlo::model::MonteCarloModel;
use crate::monte_carlo::path_generator::PathSource;
use crate::monte_carlo::path_pricer::PathPricer;
use ql_core::{ensure, errors::Result, BigNatural, Size};
use ql_math::random_numbers::derived_seed;
use ql_math::statistics::StatisticsAccumulator;
use rayon::prelude::*;
use tracing::debug;

/// Run `batches` independent batches of `samples_per_batch` samples each
/// and merge their statistics.
///
/// `factory` receives the seed of one batch and returns a fresh model.
pub fn simulate_parallel<G, P, S, F>(
    master_seed: BigNatural,
    batches: Size,
    samples_per_batch: Size,
    factory: F,
) -> Result<S>
where
    G: PathSource,
    P: PathPricer<G::Path>,
    S: StatisticsAccumulator,
    F: Fn(BigNatural) -> Result<MonteCarloModel<G, P, S>> + Send + Sync,
{
    ensure!(batches > 0, "no batches requested");
    ensure!(samples_per_batch > 0, "no samples per batch requested");

    let partial: Vec<S> = (0..batches)
        .into_par_iter()
        .map(|batch| {
            let mut model = factory(derived_seed(master_seed, batch as u64))?;
            model.add_samples(samples_per_batch)?;
            Ok(model.into_accumulator())
        })
        .collect::<Result<Vec<S>>>()?;

    let mut merged = S::default();
    for stats in &partial {
        merged.merge(stats);
    }
    debug!(batches, samples = merged.samples(), "parallel batches merged");
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monte_carlo::path_generator::PathGenerator;
    use crate::monte_carlo::pricers::EuropeanPathPricer;
    use crate::time_grid::TimeGrid;
    use ql_instruments::{OptionType, Payoff};
    use ql_math::random_numbers::PseudoRandomSequence;
    use ql_math::statistics::IncrementalStatistics;
    use ql_processes::{GeneralizedBlackScholesProcess, StochasticProcess1D};
    use ql_termstructures::{BlackConstantVol, FlatForward};
    use std::sync::Arc;

    type Model = MonteCarloModel<PathGenerator<PseudoRandomSequence>, EuropeanPathPricer, IncrementalStatistics>;

    fn factory(seed: BigNatural) -> Result<Model> {
        let process: Arc<dyn StochasticProcess1D> = Arc::new(GeneralizedBlackScholesProcess::new(
            100.0,
            Arc::new(FlatForward::new(0.05)),
            Arc::new(FlatForward::new(0.0)),
            Arc::new(BlackConstantVol::new(0.2)?),
        )?);
        let grid = Arc::new(TimeGrid::new(1.0, 1)?);
        let generator = PathGenerator::new(process, grid, PseudoRandomSequence::new(1, seed)?, false)?;
        let pricer = EuropeanPathPricer::new(Payoff::vanilla(OptionType::Call, 100.0), (-0.05_f64).exp())?;
        Ok(MonteCarloModel::new(generator, pricer, true))
    }

    #[test]
    fn thread_count_does_not_change_the_result() {
        let serial = rayon::ThreadPoolBuilder::new()
            .num_threads(1)
            .build()
            .unwrap()
            .install(|| simulate_parallel(42, 8, 500, factory))
            .unwrap();
        let parallel = rayon::ThreadPoolBuilder::new()
            .num_threads(4)
            .build()
            .unwrap()
            .install(|| simulate_parallel(42, 8, 500, factory))
            .unwrap();
        assert_eq!(serial.samples(), 4000);
        assert_eq!(serial.mean().unwrap(), parallel.mean().unwrap());
        let err = serial.error_estimate().unwrap();
        assert!(
            (serial.mean().unwrap() - 10.4506).abs() < 4.0 * err,
            "parallel MC call = {:.3} ± {err:.3}",
            serial.mean().unwrap()
        );
    }

    #[test]
    fn empty_requests_are_rejected() {
        assert!(simulate_parallel(1, 0, 10, factory).is_err());
        assert!(simulate_parallel(1, 2, 0, factory).is_err());
    }
}
