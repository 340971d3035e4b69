//! Discrete cash dividends.

use ql_core::{ensure, errors::Result, Real, Time};

/// A fixed cash amount paid by the underlying at time `time`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CashDividend {
    /// Payment time.
    pub time: Time,
    /// Cash amount.
    pub amount: Real,
}

impl CashDividend {
    /// Create a dividend; the time must be positive.
    pub fn new(time: Time, amount: Real) -> Result<Self> {
        ensure!(time > 0.0 && time.is_finite(), "invalid dividend time {time}");
        ensure!(amount.is_finite(), "invalid dividend amount {amount}");
        Ok(Self { time, amount })
    }
}
