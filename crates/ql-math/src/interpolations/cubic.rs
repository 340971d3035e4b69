//! Natural cubic spline (zero second derivative at both ends).

use super::{check_nodes, locate, Interpolation1D};
use ql_core::{Real, Result};

/// C² cubic spline with natural boundary conditions.
///
/// Each segment is stored as `y_i + a_i dx + b_i dx² + c_i dx³`.
#[derive(Debug, Clone)]
pub struct CubicNaturalSpline {
    xs: Vec<Real>,
    ys: Vec<Real>,
    a: Vec<Real>,
    b: Vec<Real>,
    c: Vec<Real>,
}

impl CubicNaturalSpline {
    /// Build from strictly increasing `xs` and values `ys` (at least two
    /// nodes; two nodes degenerate to a straight line).
    pub fn new(xs: &[Real], ys: &[Real]) -> Result<Self> {
        check_nodes(xs, ys, 2)?;
        let n = xs.len();
        let h: Vec<Real> = xs.windows(2).map(|w| w[1] - w[0]).collect();
        let s: Vec<Real> = (0..n - 1).map(|i| (ys[i + 1] - ys[i]) / h[i]).collect();

        // tridiagonal system for the second derivatives m_1..m_{n-2}
        let mut m = vec![0.0; n];
        if n > 2 {
            let k = n - 2;
            let mut diag = vec![0.0; k];
            let mut rhs = vec![0.0; k];
            for j in 0..k {
                diag[j] = 2.0 * (h[j] + h[j + 1]);
                rhs[j] = 6.0 * (s[j + 1] - s[j]);
            }
            // Thomas algorithm; off-diagonals are h[j+1]
            for j in 1..k {
                let w = h[j] / diag[j - 1];
                diag[j] -= w * h[j];
                rhs[j] -= w * rhs[j - 1];
            }
            m[k] = rhs[k - 1] / diag[k - 1];
            for j in (0..k - 1).rev() {
                m[j + 1] = (rhs[j] - h[j + 1] * m[j + 2]) / diag[j];
            }
        }

        let mut a = Vec::with_capacity(n - 1);
        let mut b = Vec::with_capacity(n - 1);
        let mut c = Vec::with_capacity(n - 1);
        for i in 0..n - 1 {
            a.push(s[i] - h[i] * (2.0 * m[i] + m[i + 1]) / 6.0);
            b.push(0.5 * m[i]);
            c.push((m[i + 1] - m[i]) / (6.0 * h[i]));
        }
        Ok(Self {
            xs: xs.to_vec(),
            ys: ys.to_vec(),
            a,
            b,
            c,
        })
    }

    /// The interpolation nodes.
    pub fn nodes(&self) -> &[Real] {
        &self.xs
    }
}

impl Interpolation1D for CubicNaturalSpline {
    fn value(&self, x: Real) -> Real {
        let i = locate(&self.xs, x);
        let dx = x - self.xs[i];
        self.ys[i] + dx * (self.a[i] + dx * (self.b[i] + dx * self.c[i]))
    }

    fn derivative(&self, x: Real) -> Real {
        let i = locate(&self.xs, x);
        let dx = x - self.xs[i];
        self.a[i] + dx * (2.0 * self.b[i] + 3.0 * dx * self.c[i])
    }

    fn second_derivative(&self, x: Real) -> Real {
        let i = locate(&self.xs, x);
        let dx = x - self.xs[i];
        2.0 * self.b[i] + 6.0 * dx * self.c[i]
    }

    fn x_min(&self) -> Real {
        self.xs[0]
    }

    fn x_max(&self) -> Real {
        self.xs[self.xs.len() - 1]
    }
}
