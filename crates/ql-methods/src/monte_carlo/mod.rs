//! Monte Carlo simulation framework.
//!
//! # Overview
//!
//! * [`Path`] / [`MultiPath`]: realisations of a process on a [`TimeGrid`](crate::TimeGrid)
//! * [`PathGenerator`] / [`MultiPathGenerator`]: draw paths from a random
//!   sequence generator, optionally through a Brownian bridge
//! * [`PathPricer`]: maps one path to a discounted value; one
//!   implementation per instrument family in [`pricers`]
//! * [`MonteCarloModel`]: generator + pricer + accumulator, with
//!   antithetic and control variates
//! * [`McSimulation`]: runs a model to a sample count or a tolerance
//! * [`LongstaffSchwartzPathPricer`]: regression-based early exercise,
//!   with [`UpperBoundEngine`] for the dual bound
//! * [`simulate_parallel`]: seeded batches on a `rayon` pool

pub mod american_path_pricer;
pub mod longstaff_schwartz;
pub mod lsm_basis;
pub mod model;
pub mod parallel;
pub mod path;
pub mod path_generator;
pub mod path_pricer;
pub mod pricers;
pub mod sample;
pub mod simulation;
pub mod upper_bound;

pub use american_path_pricer::AmericanPathPricer;
pub use longstaff_schwartz::{
    calibration_seed, EarlyExercisePathPricer, LongstaffSchwartzPathPricer, DEFAULT_CALIBRATION_SAMPLES,
};
pub use lsm_basis::{multi_path_basis_system, path_basis_system, LsmBasisType};
pub use model::{ControlVariate, MonteCarloModel};
pub use parallel::simulate_parallel;
pub use path::{MultiPath, Path, SamplePath};
pub use path_generator::{MultiPathGenerator, PathGenerator, PathSource};
pub use path_pricer::PathPricer;
pub use pricers::{AveragePricePathPricer, BarrierPathPricer, EuropeanPathPricer, LookbackPathPricer};
pub use sample::Sample;
pub use simulation::{McConfig, McOutcome, McSimulation, McStatus, MIN_SAMPLES};
pub use upper_bound::{UpperBoundEngine, UpperBoundResult, UpperBoundSettings};
