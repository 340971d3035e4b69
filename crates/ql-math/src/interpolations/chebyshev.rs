//! Polynomial interpolation on Chebyshev nodes over `[-1, 1]`, evaluated
//! with the barycentric Lagrange formula.

use super::Interpolation1D;
use ql_core::{ensure, Real, Result};
use std::f64::consts::PI;

/// Which Chebyshev node set to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ChebyshevPointsType {
    /// Roots of `T_n`.
    FirstKind,
    /// Extrema of `T_{n-1}`, including both endpoints.
    SecondKind,
}

/// `n` Chebyshev nodes in increasing order.
pub fn chebyshev_nodes(n: usize, kind: ChebyshevPointsType) -> Vec<Real> {
    match kind {
        ChebyshevPointsType::FirstKind => (0..n)
            .map(|i| -((i as Real + 0.5) * PI / n as Real).cos())
            .collect(),
        ChebyshevPointsType::SecondKind => (0..n)
            .map(|i| -(i as Real * PI / (n - 1) as Real).cos())
            .collect(),
    }
}

// closed-form barycentric weights for Chebyshev nodes
fn weights(n: usize, kind: ChebyshevPointsType) -> Vec<Real> {
    match kind {
        ChebyshevPointsType::FirstKind => (0..n)
            .map(|i| {
                let s = if i % 2 == 0 { 1.0 } else { -1.0 };
                s * ((2 * i + 1) as Real * PI / (2 * n) as Real).sin()
            })
            .collect(),
        ChebyshevPointsType::SecondKind => (0..n)
            .map(|i| {
                let s = if i % 2 == 0 { 1.0 } else { -1.0 };
                if i == 0 || i == n - 1 {
                    0.5 * s
                } else {
                    s
                }
            })
            .collect(),
    }
}

/// Chebyshev interpolant with mutable node values.
#[derive(Debug, Clone)]
pub struct ChebyshevInterpolation {
    kind: ChebyshevPointsType,
    xs: Vec<Real>,
    ys: Vec<Real>,
    w: Vec<Real>,
}

impl ChebyshevInterpolation {
    /// Build from values at the `ys.len()` Chebyshev nodes of `kind`.
    pub fn new(ys: &[Real], kind: ChebyshevPointsType) -> Result<Self> {
        let n = ys.len();
        ensure!(n >= 2, "Chebyshev interpolation needs at least 2 nodes, {n} given");
        Ok(Self {
            kind,
            xs: chebyshev_nodes(n, kind),
            ys: ys.to_vec(),
            w: weights(n, kind),
        })
    }

    /// Sample `f` at `n` nodes; the first failure is returned.
    pub fn try_from_fn<F>(n: usize, mut f: F, kind: ChebyshevPointsType) -> Result<Self>
    where
        F: FnMut(Real) -> Result<Real>,
    {
        ensure!(n >= 2, "Chebyshev interpolation needs at least 2 nodes, {n} given");
        let xs = chebyshev_nodes(n, kind);
        let ys = xs.iter().map(|&x| f(x)).collect::<Result<Vec<_>>>()?;
        Ok(Self {
            kind,
            w: weights(n, kind),
            xs,
            ys,
        })
    }

    /// Replace the node values.
    pub fn update_y(&mut self, ys: &[Real]) -> Result<()> {
        ensure!(
            ys.len() == self.ys.len(),
            "expected {} node values, {} given",
            self.ys.len(),
            ys.len()
        );
        self.ys.copy_from_slice(ys);
        Ok(())
    }

    /// Node abscissae.
    pub fn nodes(&self) -> &[Real] {
        &self.xs
    }

    /// Node values.
    pub fn values(&self) -> &[Real] {
        &self.ys
    }

    /// Node family.
    pub fn kind(&self) -> ChebyshevPointsType {
        self.kind
    }

    // (Σ w_j y_j/(x-x_j), Σ w_j/(x-x_j)) or Err(index) when x hits a node
    fn sums(&self, x: Real) -> std::result::Result<(Real, Real), usize> {
        let mut num = 0.0;
        let mut den = 0.0;
        for (j, (&xj, &wj)) in self.xs.iter().zip(self.w.iter()).enumerate() {
            let d = x - xj;
            if d == 0.0 {
                return Err(j);
            }
            let t = wj / d;
            num += t * self.ys[j];
            den += t;
        }
        Ok((num, den))
    }
}

impl Interpolation1D for ChebyshevInterpolation {
    fn value(&self, x: Real) -> Real {
        match self.sums(x) {
            Ok((num, den)) => num / den,
            Err(j) => self.ys[j],
        }
    }

    fn derivative(&self, x: Real) -> Real {
        let h = 1e-6 * (1.0 + x.abs());
        (self.value(x + h) - self.value(x - h)) / (2.0 * h)
    }

    fn second_derivative(&self, x: Real) -> Real {
        let h = 1e-4 * (1.0 + x.abs());
        (self.value(x + h) - 2.0 * self.value(x) + self.value(x - h)) / (h * h)
    }

    fn x_min(&self) -> Real {
        -1.0
    }

    fn x_max(&self) -> Real {
        1.0
    }
}
