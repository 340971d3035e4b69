//! `YieldTermStructure`: yield / interest-rate term structures.
//!
//! Any yield curve provides three related quantities:
//!
//! * **discount factor**: `P(0,t)`
//! * **zero rate**: the continuously-compounded zero rate for maturity *t*
//! * **forward rate**: the continuously-compounded forward rate between two
//!   times

use ql_core::{DiscountFactor, Rate, Time};

/// Step used to turn a degenerate forward interval into an instantaneous one.
const FORWARD_DT: Time = 1.0e-4;

/// A yield (interest-rate) term structure.
///
/// Implementors must override **at least one** of
/// [`discount`](YieldTermStructure::discount) and
/// [`zero_rate`](YieldTermStructure::zero_rate); each is defined in terms
/// of the other by default.
pub trait YieldTermStructure: std::fmt::Debug + Send + Sync {
    /// Discount factor for time `t`.
    fn discount(&self, t: Time) -> DiscountFactor {
        if t == 0.0 {
            return 1.0;
        }
        (-self.zero_rate(t) * t).exp()
    }

    /// Continuously-compounded zero rate for time `t`.
    fn zero_rate(&self, t: Time) -> Rate {
        let t = if t == 0.0 { FORWARD_DT } else { t };
        -self.discount(t).ln() / t
    }

    /// Continuously-compounded forward rate between `t1` and `t2`.
    ///
    /// When `t2 <= t1` the instantaneous forward rate at `t1` is returned.
    fn forward_rate(&self, t1: Time, t2: Time) -> Rate {
        let (t1, t2) = if t2 > t1 {
            (t1, t2)
        } else {
            let lo = (t1 - 0.5 * FORWARD_DT).max(0.0);
            (lo, lo + FORWARD_DT)
        };
        (self.discount(t1) / self.discount(t2)).ln() / (t2 - t1)
    }

    /// Latest time for which the curve can return values.
    fn max_time(&self) -> Time {
        Time::MAX
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[derive(Debug)]
    struct DiscountOnly;

    impl YieldTermStructure for DiscountOnly {
        fn discount(&self, t: Time) -> DiscountFactor {
            (-0.03 * t - 0.01 * t * t).exp()
        }
    }

    #[test]
    fn defaults_derive_from_discount() {
        let curve = DiscountOnly;
        assert_abs_diff_eq!(curve.zero_rate(2.0), 0.03 + 0.02, epsilon = 1e-12);
        // f(1,2) = (0.03 + 0.01*3)
        assert_abs_diff_eq!(curve.forward_rate(1.0, 2.0), 0.06, epsilon = 1e-12);
        // instantaneous f(1) = 0.03 + 0.02*1
        assert_abs_diff_eq!(curve.forward_rate(1.0, 1.0), 0.05, epsilon = 1e-8);
    }
}
