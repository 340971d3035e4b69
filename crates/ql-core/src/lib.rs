//! # ql-core
//!
//! Core types, traits, and error definitions shared by every crate of the
//! pricing workspace.
//!
//! This crate provides the foundational building blocks: type aliases, the
//! error taxonomy, the push-based Observer/Observable pattern, and the
//! explicit cache keys and memo tables used instead of hidden mutable state.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

// ── Public modules ───────────────────────────────────────────────────────────

/// Explicit cache keys, per-call memo tables and observer-invalidated caches.
pub mod cache;

/// Error types and the `ensure!` / `fail!` / `ensure_post!` / `fail_domain!`
/// macros.
pub mod errors;

/// Design patterns: observable.
pub mod patterns;

// ── Primitive type aliases ────────────────────────────────────────────────────

/// Floating-point type used throughout the library.
pub type Real = f64;

/// Alias used for array sizes / indices.
pub type Size = usize;

/// Large non-negative integer, used for generator seeds.
pub type BigNatural = u64;

/// A rate expressed as a decimal (e.g. 0.05 = 5 %).
pub type Rate = Real;

/// A discount factor in [0, 1].
pub type DiscountFactor = Real;

/// A price or value.
pub type Price = Real;

/// A volatility level expressed as a decimal.
pub type Volatility = Real;

/// A time measurement in years from the valuation instant.
pub type Time = Real;

// ── Re-exports for convenience ────────────────────────────────────────────────

pub use cache::{CacheKey, MemoTable, SolverCache};
pub use errors::{Error, Result};
pub use patterns::observable::{Observable, ObservableImpl, Observer};
