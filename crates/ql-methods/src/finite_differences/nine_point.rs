//! Nine-point stencils coupling two directions.

use crate::finite_differences::meshers::FdmMesherComposite;
use ql_core::Real;
use ql_math::Array;
use std::sync::Arc;

// offsets (o1, o2) in row-major order over {-1, 0, 1}²
const OFFSETS: [(isize, isize); 9] = [
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, -1),
    (0, 0),
    (0, 1),
    (1, -1),
    (1, 0),
    (1, 1),
];

/// A 3×3 stencil over directions `d0` and `d1`.
#[derive(Debug, Clone)]
pub struct NinePointLinearOp {
    d0: usize,
    d1: usize,
    mesher: Arc<FdmMesherComposite>,
    indices: Arc<Vec<[usize; 9]>>,
    coefficients: Vec<[Real; 9]>,
}

impl NinePointLinearOp {
    /// The zero operator over `d0` and `d1`.
    pub fn new(d0: usize, d1: usize, mesher: Arc<FdmMesherComposite>) -> Self {
        let layout = mesher.layout();
        let indices = (0..layout.size())
            .map(|i| OFFSETS.map(|(o0, o1)| layout.neighbourhood2(i, d0, o0, d1, o1)))
            .collect::<Vec<_>>();
        Self {
            d0,
            d1,
            coefficients: vec![[0.0; 9]; layout.size()],
            indices: Arc::new(indices),
            mesher,
        }
    }

    /// Mixed second derivative `∂²/∂x_{d0}∂x_{d1}` as the product of the
    /// one-dimensional first-derivative stencils.
    pub fn second_order_mixed_derivative(d0: usize, d1: usize, mesher: Arc<FdmMesherComposite>) -> Self {
        let mut op = Self::new(d0, d1, mesher);
        for i in 0..op.coefficients.len() {
            let w0 = first_derivative_weights(&op.mesher, i, d0);
            let w1 = first_derivative_weights(&op.mesher, i, d1);
            for (k, c) in op.coefficients[i].iter_mut().enumerate() {
                *c = w0[k / 3] * w1[k % 3];
            }
        }
        op
    }

    /// The two coupled directions.
    pub fn directions(&self) -> (usize, usize) {
        (self.d0, self.d1)
    }

    /// `self · r`.
    pub fn apply(&self, r: &Array) -> Array {
        Array::from_fn(self.coefficients.len(), |i| {
            self.indices[i]
                .iter()
                .zip(&self.coefficients[i])
                .map(|(&j, &c)| c * r[j])
                .sum()
        })
    }

    /// Row scaling `diag(u)·self`.
    pub fn mult(&self, u: &Array) -> Self {
        let mut out = self.clone();
        for (i, row) in out.coefficients.iter_mut().enumerate() {
            row.iter_mut().for_each(|c| *c *= u[i]);
        }
        out
    }
}

fn first_derivative_weights(mesher: &FdmMesherComposite, i: usize, direction: usize) -> [Real; 3] {
    match (mesher.dminus(i, direction), mesher.dplus(i, direction)) {
        (None, Some(hp)) => [0.0, -1.0 / hp, 1.0 / hp],
        (Some(hm), None) => [-1.0 / hm, 1.0 / hm, 0.0],
        (Some(hm), Some(hp)) => [
            -hp / (hm * (hm + hp)),
            (hp - hm) / (hm * hp),
            hm / (hp * (hm + hp)),
        ],
        (None, None) => [0.0; 3],
    }
}
