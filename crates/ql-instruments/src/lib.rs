//! # ql-instruments
//!
//! Option payoffs, exercise schedules and the argument structs handed to
//! pricing engines, together with the engine contract and its result set.
//! All times are year fractions from the valuation instant.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod dividend;
pub mod exercise;
pub mod instrument;
pub mod option;
pub mod payoff;

pub use dividend::CashDividend;
pub use exercise::{Exercise, ExerciseType};
pub use instrument::{PricingEngine, PricingResults, ResultValue};
pub use option::{
    AsianOptionArguments, AverageType, BarrierOptionArguments, BarrierType, LookbackKind,
    LookbackOptionArguments, VanillaOptionArguments,
};
pub use payoff::{OptionType, Payoff};
