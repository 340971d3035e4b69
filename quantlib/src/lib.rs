//! # quantlib
//!
//! Umbrella crate re-exporting the pricing workspace: Monte Carlo and
//! finite-difference frameworks, the QD+ American engine and the analytic
//! references they are checked against.
//!
//! Application code should depend on this crate rather than the
//! individual `ql-*` crates.
//!
//! ## Quick start
//!
//! ```rust
//! use quantlib::instruments::{Exercise, OptionType, Payoff, PricingEngine, VanillaOptionArguments};
//! use quantlib::pricingengines::{AnalyticEuropeanEngine, PricingContext};
//! use quantlib::termstructures::{BlackConstantVol, FlatForward};
//! use std::sync::Arc;
//!
//! # fn main() -> quantlib::core::Result<()> {
//! let context = PricingContext::builder()
//!     .spot(100.0)
//!     .risk_free(Arc::new(FlatForward::new(0.05)))
//!     .black_vol(Arc::new(BlackConstantVol::new(0.2)?))
//!     .build()?;
//! let call = VanillaOptionArguments::new(Payoff::vanilla(OptionType::Call, 100.0), Exercise::european(1.0)?)?;
//! let results = AnalyticEuropeanEngine::new().calculate(&call, &context)?;
//! assert!((results.value - 10.4506).abs() < 1e-4);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

/// Core types, aliases, errors, observers and cache keys.
pub use ql_core as core;

/// Linear algebra, distributions, solvers, integrals, interpolation,
/// random numbers and statistics.
pub use ql_math as math;

/// Observable market quotes.
pub use ql_quotes as quotes;

/// Yield curves, Black and local volatility.
pub use ql_termstructures as termstructures;

/// Stochastic processes.
pub use ql_processes as processes;

/// Payoffs, exercises and option arguments.
pub use ql_instruments as instruments;

/// Time grids, Monte Carlo and finite-difference frameworks.
pub use ql_methods as methods;

/// Pricing engines.
pub use ql_pricingengines as pricingengines;
