//! One-dimensional interpolation.
//!
//! [`LinearInterpolation`], [`CubicNaturalSpline`] and
//! [`ChebyshevInterpolation`] implement [`Interpolation1D`].  Evaluation
//! outside `[x_min, x_max]` extrapolates from the boundary segment; callers
//! that must not extrapolate check [`Interpolation1D::is_in_range`].

mod chebyshev;
mod cubic;

pub use chebyshev::{chebyshev_nodes, ChebyshevInterpolation, ChebyshevPointsType};
pub use cubic::CubicNaturalSpline;

use ql_core::{ensure, Real, Result};

/// A 1D interpolating function built on a set of nodes.
pub trait Interpolation1D: std::fmt::Debug + Send + Sync {
    /// Value at `x`.
    fn value(&self, x: Real) -> Real;

    /// First derivative at `x`.
    fn derivative(&self, x: Real) -> Real;

    /// Second derivative at `x`.
    fn second_derivative(&self, x: Real) -> Real;

    /// Smallest node.
    fn x_min(&self) -> Real;

    /// Largest node.
    fn x_max(&self) -> Real;

    /// `true` if `x` lies within `[x_min, x_max]`.
    fn is_in_range(&self, x: Real) -> bool {
        x >= self.x_min() && x <= self.x_max()
    }
}

/// Index `i` of the segment `[xs[i], xs[i+1]]` containing `x`, clamped to
/// the first/last segment.
pub(crate) fn locate(xs: &[Real], x: Real) -> usize {
    let n = xs.len();
    if x <= xs[0] {
        return 0;
    }
    if x >= xs[n - 1] {
        return n - 2;
    }
    // partition_point gives the first node > x
    xs.partition_point(|&v| v <= x) - 1
}

pub(crate) fn check_nodes(xs: &[Real], ys: &[Real], min_points: usize) -> Result<()> {
    ensure!(
        xs.len() == ys.len(),
        "node/value length mismatch: {} vs {}",
        xs.len(),
        ys.len()
    );
    ensure!(
        xs.len() >= min_points,
        "at least {min_points} points are required, {} given",
        xs.len()
    );
    ensure!(
        xs.windows(2).all(|w| w[1] > w[0]),
        "interpolation nodes must be strictly increasing"
    );
    Ok(())
}

/// Piecewise-linear interpolation.
#[derive(Debug, Clone)]
pub struct LinearInterpolation {
    xs: Vec<Real>,
    ys: Vec<Real>,
}

impl LinearInterpolation {
    /// Build from strictly increasing `xs` and values `ys`.
    pub fn new(xs: &[Real], ys: &[Real]) -> Result<Self> {
        check_nodes(xs, ys, 2)?;
        Ok(Self {
            xs: xs.to_vec(),
            ys: ys.to_vec(),
        })
    }

    fn slope(&self, i: usize) -> Real {
        (self.ys[i + 1] - self.ys[i]) / (self.xs[i + 1] - self.xs[i])
    }
}

impl Interpolation1D for LinearInterpolation {
    fn value(&self, x: Real) -> Real {
        let i = locate(&self.xs, x);
        self.ys[i] + (x - self.xs[i]) * self.slope(i)
    }

    fn derivative(&self, x: Real) -> Real {
        self.slope(locate(&self.xs, x))
    }

    fn second_derivative(&self, _x: Real) -> Real {
        0.0
    }

    fn x_min(&self) -> Real {
        self.xs[0]
    }

    fn x_max(&self) -> Real {
        self.xs[self.xs.len() - 1]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn linear_interpolates_and_extrapolates() {
        let li = LinearInterpolation::new(&[0.0, 1.0, 3.0], &[0.0, 2.0, 3.0]).unwrap();
        assert_abs_diff_eq!(li.value(0.5), 1.0);
        assert_abs_diff_eq!(li.value(2.0), 2.5);
        assert_abs_diff_eq!(li.value(4.0), 3.5);
        assert_abs_diff_eq!(li.derivative(2.0), 0.5);
        assert!(!li.is_in_range(4.0));
    }

    #[test]
    fn rejects_unsorted_nodes() {
        assert!(LinearInterpolation::new(&[0.0, 0.0], &[1.0, 2.0]).is_err());
        assert!(LinearInterpolation::new(&[0.0], &[1.0]).is_err());
    }

    #[test]
    fn locate_on_nodes() {
        let xs = [0.0, 1.0, 2.0, 3.0];
        assert_eq!(locate(&xs, 1.0), 1);
        assert_eq!(locate(&xs, 2.5), 2);
        assert_eq!(locate(&xs, 3.0), 2);
        assert_eq!(locate(&xs, -1.0), 0);
    }
}
