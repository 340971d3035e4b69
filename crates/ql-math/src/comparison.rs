//! Floating-point comparison helpers.

use ql_core::Real;

/// `true` if `a` and `b` agree to within `n` ulps relative to both
/// magnitudes, treating values near zero by absolute difference.
#[inline]
pub fn close(a: Real, b: Real, n: u32) -> bool {
    if a == b {
        return true;
    }
    let diff = (a - b).abs();
    let tol = n as Real * Real::EPSILON;
    if a == 0.0 || b == 0.0 {
        return diff < tol * tol;
    }
    diff <= tol * a.abs() && diff <= tol * b.abs()
}

/// Weaker form of [`close`]: one of the two relative bounds suffices.
#[inline]
pub fn close_enough(a: Real, b: Real, n: u32) -> bool {
    if a == b {
        return true;
    }
    let diff = (a - b).abs();
    let tol = n as Real * Real::EPSILON;
    if a == 0.0 || b == 0.0 {
        return diff < tol * tol;
    }
    diff <= tol * a.abs() || diff <= tol * b.abs()
}

/// `true` if `x` is within 42 ulps of zero or of `y`.
#[inline]
pub fn close_to(x: Real, y: Real) -> bool {
    close_enough(x, y, 42)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_bounds() {
        assert!(close(1.0, 1.0 + 4.0 * Real::EPSILON, 42));
        assert!(!close(1.0, 1.0 + 1e-9, 42));
        assert!(close_to(100.0, 100.0 + 1e-13));
    }

    #[test]
    fn zero_uses_absolute_difference() {
        assert!(close(0.0, 1e-30, 42));
        assert!(!close(0.0, 1e-10, 42));
    }
}
