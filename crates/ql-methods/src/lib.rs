//! # ql-methods
//!
//! Numerical methods: time grids, the Monte Carlo simulation framework
//! and the finite-difference PDE framework.
//!
//! # Modules
//!
//! * [`time_grid`]: grids with mandatory times shared by both methods
//! * [`monte_carlo`]: path generation, path pricing, simulation control,
//!   Longstaff-Schwartz regression
//! * [`finite_differences`]: meshers, operators, schemes, step conditions
//!   and solvers

#![warn(missing_docs)]
#![forbid(unsafe_code)]

// ── Modules ───────────────────────────────────────────────────────────────────

/// Time grids with mandatory times.
pub mod time_grid;

/// Monte Carlo simulation: path generation, pricing, statistics.
pub mod monte_carlo;

/// Finite difference methods: meshers, operators, schemes and solvers.
pub mod finite_differences;

// ── Convenience re-exports ────────────────────────────────────────────────────

pub use finite_differences::{
    Fdm1DimSolver, Fdm2DimSolver, FdmBackwardSolver, FdmLinearOpComposite, FdmMesherComposite, FdmSchemeDesc,
    FdmSolverDesc, FdmStepConditionComposite, LocalVolRndCalculator,
};
pub use monte_carlo::{
    EuropeanPathPricer, LongstaffSchwartzPathPricer, McConfig, McSimulation, MonteCarloModel, Path, PathGenerator,
    PathPricer,
};
pub use time_grid::{StepsSpec, TimeGrid};
