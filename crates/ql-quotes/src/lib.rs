//! # ql-quotes
//!
//! Observable market quotes.  Mutating a [`SimpleQuote`] pushes a
//! notification to every registered observer (typically a solver cache).

#![warn(missing_docs)]
#![forbid(unsafe_code)]

/// `Quote` trait and the observable `SimpleQuote`.
pub mod quote;

pub use quote::{Quote, SimpleQuote};
