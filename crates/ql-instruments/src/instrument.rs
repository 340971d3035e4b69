//! Pricing-engine contract and result set.
//!
//! Engines are stateless with respect to market data: every call receives
//! the instrument arguments and an explicit context, and returns a fresh
//! [`PricingResults`].

use ql_core::{errors::Result, Real};
use std::collections::BTreeMap;
use std::fmt;

/// A named diagnostic value attached to a result set.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ResultValue {
    /// A scalar.
    Real(Real),
    /// A vector (e.g. a time grid).
    Vector(Vec<Real>),
    /// A label (e.g. a convergence status).
    Text(String),
}

impl From<Real> for ResultValue {
    fn from(x: Real) -> Self {
        ResultValue::Real(x)
    }
}

impl From<Vec<Real>> for ResultValue {
    fn from(v: Vec<Real>) -> Self {
        ResultValue::Vector(v)
    }
}

impl From<&str> for ResultValue {
    fn from(s: &str) -> Self {
        ResultValue::Text(s.to_string())
    }
}

impl From<String> for ResultValue {
    fn from(s: String) -> Self {
        ResultValue::Text(s)
    }
}

impl fmt::Display for ResultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResultValue::Real(x) => write!(f, "{x}"),
            ResultValue::Vector(v) => write!(f, "[{} values]", v.len()),
            ResultValue::Text(s) => write!(f, "{s}"),
        }
    }
}

/// Results of pricing an instrument.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PricingResults {
    /// Present value.
    pub value: Real,
    /// Statistical error estimate (Monte Carlo engines).
    pub error_estimate: Option<Real>,
    /// Sensitivity to the spot.
    pub delta: Option<Real>,
    /// Second-order sensitivity to the spot.
    pub gamma: Option<Real>,
    /// Sensitivity to the passage of time.
    pub theta: Option<Real>,
    /// Additional named diagnostics.
    pub additional_results: BTreeMap<String, ResultValue>,
}

impl PricingResults {
    /// Results holding just a value.
    pub fn from_value(value: Real) -> Self {
        Self {
            value,
            ..Self::default()
        }
    }

    /// Attach an error estimate.
    pub fn with_error_estimate(mut self, error: Real) -> Self {
        self.error_estimate = Some(error);
        self
    }

    /// Attach a named diagnostic.
    pub fn with_result(mut self, key: impl Into<String>, value: impl Into<ResultValue>) -> Self {
        self.additional_results.insert(key.into(), value.into());
        self
    }

    /// Insert a named diagnostic in place.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ResultValue>) {
        self.additional_results.insert(key.into(), value.into());
    }

    /// Look up a named diagnostic.
    pub fn additional(&self, key: &str) -> Option<&ResultValue> {
        self.additional_results.get(key)
    }

    /// Look up a scalar diagnostic.
    pub fn additional_real(&self, key: &str) -> Option<Real> {
        match self.additional_results.get(key) {
            Some(ResultValue::Real(x)) => Some(*x),
            _ => None,
        }
    }
}

/// A pricing engine for instruments described by `Args`, evaluated against
/// market context `Ctx`.
pub trait PricingEngine<Args, Ctx: ?Sized>: fmt::Debug + Send + Sync {
    /// Price the instrument described by `args`.
    fn calculate(&self, args: &Args, context: &Ctx) -> Result<PricingResults>;
}
