//! # ql-pricingengines
//!
//! Pricing engines for equity options: closed forms, Monte Carlo,
//! finite differences and the QD+ American approximation.  Every engine
//! implements [`PricingEngine`](ql_instruments::PricingEngine) against an
//! explicit [`PricingContext`].
//!
//! ## Engines
//!
//! - [`AnalyticEuropeanEngine`]: Black-Scholes-Merton through the [`BlackCalculator`]
//! - [`AnalyticHestonEngine`]: semi-analytic Heston
//! - [`AnalyticBarrierEngine`]: Reiner-Rubinstein single barriers
//! - [`AnalyticDiscreteGeometricAveragePriceAsianEngine`]: discrete geometric averages
//! - [`QdPlusAmericanEngine`]: American options from the QD+ exercise boundary
//! - Monte Carlo, configured by `Make*` builders: [`McEuropeanEngine`],
//!   [`McEuropeanHestonEngine`], [`McDiscreteArithmeticAsianEngine`],
//!   [`McDiscreteGeometricAsianEngine`], [`McBarrierEngine`],
//!   [`McLookbackEngine`] and the Longstaff-Schwartz [`McAmericanEngine`]
//! - Finite differences: [`FdBlackScholesVanillaEngine`],
//!   [`FdBlackScholesBarrierEngine`] and [`FdHestonVanillaEngine`]
//!
//! Monte Carlo engines are generic over a [`SequencePolicy`]; the default
//! draws pseudo-random numbers, `LowDiscrepancySequence` selects Sobol
//! points.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod analytic_barrier_engine;
pub mod analytic_discrete_geometric_asian_engine;
pub mod analytic_european_engine;
pub mod analytic_heston_engine;
pub mod black_calculator;
pub mod context;
pub mod fd_black_scholes_barrier_engine;
pub mod fd_black_scholes_vanilla_engine;
pub mod fd_heston_vanilla_engine;
pub mod mc_american_engine;
pub mod mc_barrier_engine;
pub mod mc_discrete_arithmetic_asian_engine;
pub mod mc_discrete_geometric_asian_engine;
pub mod mc_engine;
pub mod mc_european_engine;
pub mod mc_european_heston_engine;
pub mod mc_lookback_engine;
pub mod qd_plus_american_engine;

pub use analytic_barrier_engine::AnalyticBarrierEngine;
pub use analytic_discrete_geometric_asian_engine::AnalyticDiscreteGeometricAveragePriceAsianEngine;
pub use analytic_european_engine::AnalyticEuropeanEngine;
pub use analytic_heston_engine::{AnalyticHestonEngine, HestonParameters};
pub use black_calculator::BlackCalculator;
pub use context::{PricingContext, PricingContextBuilder};
pub use fd_black_scholes_barrier_engine::FdBlackScholesBarrierEngine;
pub use fd_black_scholes_vanilla_engine::{
    FdBlackScholesSettings, FdBlackScholesVanillaEngine, MakeFdBlackScholesVanillaEngine,
};
pub use fd_heston_vanilla_engine::{FdHestonSettings, FdHestonVanillaEngine, MakeFdHestonVanillaEngine};
pub use mc_american_engine::{LsmSettings, MakeMcAmericanEngine, McAmericanEngine};
pub use mc_barrier_engine::{MakeMcBarrierEngine, McBarrierEngine};
pub use mc_discrete_arithmetic_asian_engine::{MakeMcDiscreteArithmeticAsianEngine, McDiscreteArithmeticAsianEngine};
pub use mc_discrete_geometric_asian_engine::{MakeMcDiscreteGeometricAsianEngine, McDiscreteGeometricAsianEngine};
pub use mc_engine::{McEngineSettings, SequencePolicy};
pub use mc_european_engine::{MakeMcEuropeanEngine, McEuropeanEngine};
pub use mc_european_heston_engine::{MakeMcEuropeanHestonEngine, McEuropeanHestonEngine};
pub use mc_lookback_engine::{MakeMcLookbackEngine, McLookbackEngine};
pub use qd_plus_american_engine::{x_max, PremiumIntegration, QdPlusAmericanEngine, QdPlusConfig, SolverType};
