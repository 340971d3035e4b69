//! `FlatForward`: a yield term structure with a constant forward rate.

use crate::yield_term_structure::YieldTermStructure;
use ql_core::{DiscountFactor, Rate, Time};

/// A flat (constant) continuously-compounded forward-rate curve.
///
/// `P(t) = exp(-r t)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlatForward {
    rate: Rate,
}

impl FlatForward {
    /// Create a flat curve from a continuously-compounded rate.
    pub fn new(rate: Rate) -> Self {
        Self { rate }
    }

    /// The continuously-compounded flat rate.
    pub fn rate(&self) -> Rate {
        self.rate
    }
}

impl YieldTermStructure for FlatForward {
    fn discount(&self, t: Time) -> DiscountFactor {
        (-self.rate * t).exp()
    }

    fn zero_rate(&self, _t: Time) -> Rate {
        self.rate
    }

    fn forward_rate(&self, _t1: Time, _t2: Time) -> Rate {
        self.rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn flat_discount() {
        let curve = FlatForward::new(0.05);
        assert_abs_diff_eq!(curve.discount(0.0), 1.0);
        assert_abs_diff_eq!(curve.discount(2.0), (-0.1_f64).exp(), epsilon = 1e-15);
        assert_abs_diff_eq!(curve.zero_rate(7.0), 0.05);
        assert_abs_diff_eq!(curve.forward_rate(1.0, 3.0), 0.05);
    }

    #[test]
    fn negative_rates_are_allowed() {
        let curve = FlatForward::new(-0.01);
        assert!(curve.discount(1.0) > 1.0);
    }
}
