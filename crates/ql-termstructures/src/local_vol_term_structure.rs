//! `LocalVolTermStructure`: local-volatility term structures.

use ql_core::{ensure, errors::Result, Real, Time, Volatility};

/// A local-volatility surface `σ(t, S)`.
///
/// Evaluation can fail (e.g. negative local variance from an arbitrageable
/// Black surface), so `local_vol` returns a `Result`.
pub trait LocalVolTermStructure: std::fmt::Debug + Send + Sync {
    /// Local volatility at time `t` and underlying level `underlying`.
    fn local_vol(&self, t: Time, underlying: Real) -> Result<Volatility>;
}

/// A flat (constant) local volatility.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalConstantVol {
    volatility: Volatility,
}

impl LocalConstantVol {
    /// Create a constant local vol surface.
    pub fn new(volatility: Volatility) -> Result<Self> {
        ensure!(
            volatility >= 0.0 && volatility.is_finite(),
            "invalid volatility {volatility}"
        );
        Ok(Self { volatility })
    }

    /// The constant volatility value.
    pub fn volatility(&self) -> Volatility {
        self.volatility
    }
}

impl LocalVolTermStructure for LocalConstantVol {
    fn local_vol(&self, _t: Time, _underlying: Real) -> Result<Volatility> {
        Ok(self.volatility)
    }
}
