//! # ql-processes
//!
//! Stochastic processes consumed by the Monte Carlo path generators and the
//! finite-difference mesher builders: the generalized Black-Scholes process,
//! the Heston process and arrays of correlated one-dimensional processes.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod black_scholes_process;
pub mod heston_process;
pub mod stochastic_process;
pub mod stochastic_process_array;

pub use black_scholes_process::GeneralizedBlackScholesProcess;
pub use heston_process::{HestonDiscretization, HestonProcess};
pub use stochastic_process::{StochasticProcess, StochasticProcess1D};
pub use stochastic_process_array::StochasticProcessArray;
