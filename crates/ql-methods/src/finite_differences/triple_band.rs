//! Tridiagonal operators along one direction of a multi-dimensional grid.

use crate::finite_differences::meshers::FdmMesherComposite;
use ql_core::{ensure, errors::Result, fail, Real};
use ql_math::Array;
use std::sync::Arc;

/// A three-point stencil `lower·u[i-1] + diag·u[i] + upper·u[i+1]` along
/// `direction`, stored per grid point.
///
/// [`solve_splitting`](Self::solve_splitting) runs the Thomas algorithm
/// over all grid lines of the direction at once; the operator must not
/// couple the end of one line to the start of the next.
#[derive(Debug, Clone)]
pub struct TripleBandLinearOp {
    direction: usize,
    mesher: Arc<FdmMesherComposite>,
    i0: Arc<Vec<usize>>,
    i2: Arc<Vec<usize>>,
    reverse_index: Arc<Vec<usize>>,
    lower: Vec<Real>,
    diag: Vec<Real>,
    upper: Vec<Real>,
}

impl TripleBandLinearOp {
    /// The zero operator along `direction`.
    pub fn new(direction: usize, mesher: Arc<FdmMesherComposite>) -> Self {
        let layout = mesher.layout();
        let size = layout.size();

        // storage order with `direction` running fastest
        let mut new_dim = layout.dim().to_vec();
        new_dim.swap(0, direction);
        let mut new_spacing = Vec::with_capacity(new_dim.len());
        let mut stride = 1;
        for &d in &new_dim {
            new_spacing.push(stride);
            stride *= d;
        }
        new_spacing.swap(0, direction);

        let mut i0 = vec![0; size];
        let mut i2 = vec![0; size];
        let mut reverse_index = vec![0; size];
        for (i, coordinates) in layout.iter() {
            i0[i] = layout.neighbourhood(i, direction, -1);
            i2[i] = layout.neighbourhood(i, direction, 1);
            let new_index: usize = coordinates.iter().zip(&new_spacing).map(|(c, s)| c * s).sum();
            reverse_index[new_index] = i;
        }

        Self {
            direction,
            i0: Arc::new(i0),
            i2: Arc::new(i2),
            reverse_index: Arc::new(reverse_index),
            lower: vec![0.0; size],
            diag: vec![0.0; size],
            upper: vec![0.0; size],
            mesher,
        }
    }

    /// First derivative along `direction`: central differences inside,
    /// one-sided at the edges.
    pub fn first_derivative(direction: usize, mesher: Arc<FdmMesherComposite>) -> Self {
        let mut op = Self::new(direction, mesher);
        let mesher = Arc::clone(&op.mesher);
        for i in 0..op.size() {
            match (mesher.dminus(i, direction), mesher.dplus(i, direction)) {
                (None, Some(hp)) => {
                    op.upper[i] = 1.0 / hp;
                    op.diag[i] = -op.upper[i];
                }
                (Some(hm), None) => {
                    op.diag[i] = 1.0 / hm;
                    op.lower[i] = -op.diag[i];
                }
                (Some(hm), Some(hp)) => {
                    op.lower[i] = -hp / (hm * (hm + hp));
                    op.diag[i] = (hp - hm) / (hm * hp);
                    op.upper[i] = hm / (hp * (hm + hp));
                }
                (None, None) => {}
            }
        }
        op
    }

    /// Second derivative along `direction`; zero at the edges.
    pub fn second_derivative(direction: usize, mesher: Arc<FdmMesherComposite>) -> Self {
        let mut op = Self::new(direction, mesher);
        let mesher = Arc::clone(&op.mesher);
        for i in 0..op.size() {
            if let (Some(hm), Some(hp)) = (mesher.dminus(i, direction), mesher.dplus(i, direction)) {
                op.lower[i] = 2.0 / (hm * (hm + hp));
                op.diag[i] = -2.0 / (hm * hp);
                op.upper[i] = 2.0 / (hp * (hm + hp));
            }
        }
        op
    }

    /// Direction of the stencil.
    pub fn direction(&self) -> usize {
        self.direction
    }

    /// The grid.
    pub fn mesher(&self) -> &Arc<FdmMesherComposite> {
        &self.mesher
    }

    /// Number of grid points.
    pub fn size(&self) -> usize {
        self.diag.len()
    }

    /// Lower, diagonal and upper coefficients at grid point `i`.
    pub fn coefficients(&self, i: usize) -> (Real, Real, Real) {
        (self.lower[i], self.diag[i], self.upper[i])
    }

    fn empty_like(&self) -> Self {
        Self {
            direction: self.direction,
            mesher: Arc::clone(&self.mesher),
            i0: Arc::clone(&self.i0),
            i2: Arc::clone(&self.i2),
            reverse_index: Arc::clone(&self.reverse_index),
            lower: vec![0.0; self.size()],
            diag: vec![0.0; self.size()],
            upper: vec![0.0; self.size()],
        }
    }

    /// `self = y + a·x + b`, with `b` added to the diagonal.
    ///
    /// `a` and `b` hold one value per grid point, a single broadcast value,
    /// or nothing.
    pub fn axpyb(&mut self, a: &[Real], x: &TripleBandLinearOp, y: &TripleBandLinearOp, b: &[Real]) {
        let pick = |v: &[Real], i: usize| match v.len() {
            0 => 0.0,
            1 => v[0],
            _ => v[i],
        };
        for i in 0..self.size() {
            let s = pick(a, i);
            self.lower[i] = y.lower[i] + s * x.lower[i];
            self.diag[i] = y.diag[i] + s * x.diag[i] + pick(b, i);
            self.upper[i] = y.upper[i] + s * x.upper[i];
        }
    }

    /// Sum of two operators along the same direction.
    pub fn add(&self, m: &TripleBandLinearOp) -> Self {
        let mut out = self.empty_like();
        for i in 0..self.size() {
            out.lower[i] = self.lower[i] + m.lower[i];
            out.diag[i] = self.diag[i] + m.diag[i];
            out.upper[i] = self.upper[i] + m.upper[i];
        }
        out
    }

    /// `self + diag(u)`.
    pub fn add_diagonal(&self, u: &Array) -> Self {
        let mut out = self.clone();
        for i in 0..self.size() {
            out.diag[i] += u[i];
        }
        out
    }

    /// Row scaling `diag(u)·self`.
    pub fn mult(&self, u: &Array) -> Self {
        let mut out = self.empty_like();
        for i in 0..self.size() {
            out.lower[i] = self.lower[i] * u[i];
            out.diag[i] = self.diag[i] * u[i];
            out.upper[i] = self.upper[i] * u[i];
        }
        out
    }

    /// Row scaling by a constant.
    pub fn scale(&self, s: Real) -> Self {
        let mut out = self.clone();
        out.lower.iter_mut().for_each(|v| *v *= s);
        out.diag.iter_mut().for_each(|v| *v *= s);
        out.upper.iter_mut().for_each(|v| *v *= s);
        out
    }

    /// Column scaling `self·diag(u)`, i.e. the stencil applied to `u·f`.
    pub fn mult_r(&self, u: &Array) -> Self {
        let mut out = self.empty_like();
        for i in 0..self.size() {
            out.lower[i] = self.lower[i] * u[self.i0[i]];
            out.diag[i] = self.diag[i] * u[i];
            out.upper[i] = self.upper[i] * u[self.i2[i]];
        }
        out
    }

    /// `self · r`.
    pub fn apply(&self, r: &Array) -> Array {
        Array::from_fn(self.size(), |i| {
            r[self.i0[i]] * self.lower[i] + r[i] * self.diag[i] + r[self.i2[i]] * self.upper[i]
        })
    }

    /// Solve `(a·self + b·I) x = r` line by line.
    pub fn solve_splitting(&self, r: &Array, a: Real, b: Real) -> Result<Array> {
        let n = self.size();
        ensure!(r.len() == n, "inconsistent size of rhs: {} vs {n}", r.len());
        let rev = &self.reverse_index;
        let mut ret = Array::zeros(n);
        let mut tmp = vec![0.0; n];

        let mut rim1 = rev[0];
        let mut bet = a * self.diag[rim1] + b;
        if bet == 0.0 {
            fail!("division by zero in tridiagonal solve");
        }
        bet = 1.0 / bet;
        ret[rim1] = r[rim1] * bet;

        for j in 1..n {
            let ri = rev[j];
            tmp[j] = a * self.upper[rim1] * bet;
            bet = b + a * (self.diag[ri] - tmp[j] * self.lower[ri]);
            if bet == 0.0 {
                fail!("division by zero in tridiagonal solve");
            }
            bet = 1.0 / bet;
            ret[ri] = (r[ri] - a * self.lower[ri] * ret[rim1]) * bet;
            rim1 = ri;
        }
        for j in (0..n - 1).rev() {
            let v = tmp[j + 1] * ret[rev[j + 1]];
            ret[rev[j]] -= v;
        }
        Ok(ret)
    }
}
