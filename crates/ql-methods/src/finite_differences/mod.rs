//! Finite-difference framework for option pricing PDEs.
//!
//! # Overview
//!
//! * [`FdmLinearOpLayout`]: flat indexing of a multi-dimensional grid
//! * [`Fdm1dMesher`] implementations and [`FdmMesherComposite`]: the
//!   spatial grid, concentrated around strikes, barriers or the spot
//! * [`TripleBandLinearOp`] / [`NinePointLinearOp`]: derivative stencils
//! * [`FdmLinearOpComposite`]: the PDE generator, split by direction
//!   ([`FdmBlackScholesOp`], [`FdmHestonOp`], [`FdmLocalVolFwdOp`])
//! * [`FdmScheme`] implementations selected by [`FdmSchemeDesc`]
//! * [`StepCondition`] implementations: early exercise, dividends and
//!   barrier projection, merged by [`FdmStepConditionComposite`]
//! * [`FdmBackwardSolver`]: rolls values back in time with damping steps;
//!   [`Fdm1DimSolver`] / [`Fdm2DimSolver`] interpolate the result
//! * [`LocalVolRndCalculator`]: forward risk-neutral density under local
//!   volatility

pub mod boundary;
pub mod layout;
pub mod local_vol_rnd;
pub mod meshers;
pub mod nine_point;
pub mod operators;
pub mod schemes;
pub mod solvers;
pub mod step_conditions;
pub mod triple_band;

pub use boundary::{BoundarySide, FdmDirichletBoundary};
pub use layout::FdmLinearOpLayout;
pub use local_vol_rnd::{LocalVolRndCalculator, LocalVolRndSettings};
pub use meshers::{
    Concentrating1dMesher, Fdm1dMesher, FdmBlackScholesMesher, FdmBlackScholesMesherParams, FdmHestonVarianceMesher,
    FdmMesherComposite, Predefined1dMesher, Uniform1dMesher,
};
pub use nine_point::NinePointLinearOp;
pub use operators::{FdmBlackScholesOp, FdmHestonOp, FdmLinearOpComposite, FdmLocalVolFwdOp};
pub use schemes::{
    bicgstab, CraigSneydScheme, CrankNicolsonScheme, DouglasScheme, ExplicitEulerScheme, FdmScheme, FdmSchemeDesc,
    FdmSchemeType, HundsdorferScheme, ImplicitEulerScheme,
};
pub use solvers::{Fdm1DimSolver, Fdm2DimSolver, FdmBackwardSolver, FdmSolverDesc};
pub use step_conditions::{
    log_inner_values, FdmAmericanStepCondition, FdmBarrierProjection, FdmBermudanStepCondition, FdmDividendHandler,
    FdmStepConditionComposite, StepCondition,
};
pub use triple_band::TripleBandLinearOp;
