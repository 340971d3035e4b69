//! # ql-termstructures
//!
//! Yield curves and volatility surfaces.  Every term structure is indexed
//! by time measured in years from the valuation instant `t = 0`.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

// ── Modules ───────────────────────────────────────────────────────────────────

/// `YieldTermStructure`: discount factors and zero rates.
pub mod yield_term_structure;

/// `FlatForward`: constant forward-rate yield curve.
pub mod flat_forward;

/// `BlackVolTermStructure`, `BlackConstantVol` and `BlackVarianceCurve`.
pub mod black_vol_term_structure;

/// `LocalVolTermStructure` and `LocalConstantVol`.
pub mod local_vol_term_structure;

/// `LocalVolSurface`: Dupire local volatility from a Black vol surface.
pub mod local_vol_surface;

// ── Convenience re-exports ────────────────────────────────────────────────────

pub use black_vol_term_structure::{BlackConstantVol, BlackVarianceCurve, BlackVolTermStructure};
pub use flat_forward::FlatForward;
pub use local_vol_surface::LocalVolSurface;
pub use local_vol_term_structure::{LocalConstantVol, LocalVolTermStructure};
pub use yield_term_structure::YieldTermStructure;
