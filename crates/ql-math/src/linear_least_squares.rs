//! General linear least-squares regression.
//!
//! Fits `y ≈ Σ_j β_j φ_j(x)` for arbitrary sample states `x` and a list of
//! basis functions, solving the design system by SVD.  Used by the
//! Longstaff-Schwartz regression to estimate continuation values.

use crate::array::Array;
use crate::matrix::Matrix;
use crate::matrix_utilities::Svd;
use ql_core::{ensure, errors::Error, Real, Result};
use tracing::trace;

/// Relative singular-value cutoff used when solving the design system.
const SVD_THRESHOLD: Real = 1e-12;

/// A basis function over sample states of type `S`.
pub type BasisFunction<S> = Box<dyn Fn(&S) -> Real + Send + Sync>;

/// Fitted regression.
#[derive(Debug, Clone)]
pub struct LinearLeastSquaresRegression {
    coefficients: Array,
    standard_errors: Array,
    residuals: Array,
    dim: usize,
}

impl LinearLeastSquaresRegression {
    /// Fit `y` against `basis` evaluated on the scalar observations `x`.
    pub fn new<F>(x: &[Real], y: &[Real], basis: &[F]) -> Result<Self>
    where
        F: Fn(Real) -> Real,
    {
        ensure!(x.len() == y.len(), "x and y must have the same length");
        let a = Matrix::from_fn(x.len(), basis.len(), |i, j| basis[j](x[i]));
        Self::from_design_matrix(&a, y)
    }

    /// Fit `y` against `basis` evaluated on arbitrary states.
    pub fn from_states<S>(states: &[S], y: &[Real], basis: &[BasisFunction<S>]) -> Result<Self> {
        ensure!(
            states.len() == y.len(),
            "states and observations must have the same length"
        );
        let a = Matrix::from_fn(states.len(), basis.len(), |i, j| basis[j](&states[i]));
        Self::from_design_matrix(&a, y)
    }

    /// Fit against a pre-built `n × m` design matrix.
    ///
    /// Fails with a precondition error when there are fewer observations
    /// than basis functions.  A rank-deficient design matrix (collinear
    /// basis functions) is solved through the truncated pseudo-inverse,
    /// which returns the minimum-norm coefficients.
    pub fn from_design_matrix(a: &Matrix, y: &[Real]) -> Result<Self> {
        let n = a.rows();
        let m = a.cols();
        if y.len() != n {
            return Err(Error::InvalidArgument(format!(
                "design matrix has {n} rows but {} observations were given",
                y.len()
            )));
        }
        ensure!(m > 0, "at least one basis function is required");
        ensure!(
            n >= m,
            "under-determined regression: {n} observations for {m} basis functions"
        );

        let svd = Svd::new(a)?;
        let rank = svd.rank(SVD_THRESHOLD);
        if rank < m {
            trace!(rank, basis = m, "rank-deficient design matrix, using the pseudo-inverse");
        }
        let yv = Array::from_slice(y);
        let coefficients = svd.solve(&yv, SVD_THRESHOLD);
        let residuals = &yv - &a.mul_vec(&coefficients);

        // se_j = sqrt(σ² Σ_k (V_jk / s_k)²) with σ² = RSS / (n - rank)
        let dof = (n - rank).max(1) as Real;
        let sigma2 = residuals.dot(&residuals) / dof;
        let s = &svd.singular_values;
        let standard_errors = Array::from_fn(m, |j| {
            let var: Real = (0..rank)
                .map(|k| (svd.v_t[(k, j)] / s[k]).powi(2))
                .sum();
            (sigma2 * var).sqrt()
        });

        Ok(Self {
            coefficients,
            standard_errors,
            residuals,
            dim: m,
        })
    }

    /// Fitted coefficients, one per basis function.
    pub fn coefficients(&self) -> &Array {
        &self.coefficients
    }

    /// Standard errors of the coefficients.
    pub fn standard_errors(&self) -> &Array {
        &self.standard_errors
    }

    /// Residuals `y - A β`.
    pub fn residuals(&self) -> &Array {
        &self.residuals
    }

    /// Number of basis functions.
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Evaluate the fitted function at a state.
    pub fn evaluate<S>(&self, state: &S, basis: &[BasisFunction<S>]) -> Real {
        basis
            .iter()
            .zip(self.coefficients.iter())
            .map(|(f, b)| b * f(state))
            .sum()
    }
}
