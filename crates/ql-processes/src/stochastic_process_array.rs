//! Array of correlated one-dimensional processes.

use crate::stochastic_process::{StochasticProcess, StochasticProcess1D};
use ql_core::{ensure, errors::Result, Time};
use ql_math::{matrix_utilities::cholesky_decomposition, Array, Matrix};
use std::sync::Arc;

/// `n` one-dimensional processes driven by correlated Brownian motions.
///
/// The correlation is applied through its (flexible) Cholesky factor `L`:
/// the `i`-th process receives `(L dw)_i`.
#[derive(Debug, Clone)]
pub struct StochasticProcessArray {
    processes: Vec<Arc<dyn StochasticProcess1D>>,
    sqrt_correlation: Matrix,
}

impl StochasticProcessArray {
    /// Create from processes and their correlation matrix.
    pub fn new(processes: Vec<Arc<dyn StochasticProcess1D>>, correlation: &Matrix) -> Result<Self> {
        let n = processes.len();
        ensure!(n > 0, "no processes given");
        ensure!(
            correlation.rows() == n && correlation.cols() == n,
            "correlation matrix is {}x{}, expected {n}x{n}",
            correlation.rows(),
            correlation.cols()
        );
        for i in 0..n {
            ensure!(
                (correlation[(i, i)] - 1.0).abs() < 1e-12,
                "correlation diagonal element {i} is {}",
                correlation[(i, i)]
            );
            for j in 0..i {
                ensure!(
                    (correlation[(i, j)] - correlation[(j, i)]).abs() < 1e-12,
                    "correlation matrix is not symmetric at ({i}, {j})"
                );
            }
        }
        let sqrt_correlation = cholesky_decomposition(correlation, true)?;
        Ok(Self {
            processes,
            sqrt_correlation,
        })
    }

    /// The `i`-th process.
    pub fn process(&self, i: usize) -> &Arc<dyn StochasticProcess1D> {
        &self.processes[i]
    }

    /// The correlation matrix `L Lᵀ`.
    pub fn correlation(&self) -> Matrix {
        &self.sqrt_correlation * &self.sqrt_correlation.transpose()
    }

    fn check_state(&self, x: &Array) -> Result<()> {
        ensure!(
            x.len() == self.processes.len(),
            "state has {} components, expected {}",
            x.len(),
            self.processes.len()
        );
        Ok(())
    }

    fn scale_rows(&self, scales: &[f64]) -> Matrix {
        let n = self.processes.len();
        Matrix::from_fn(n, n, |i, j| scales[i] * self.sqrt_correlation[(i, j)])
    }
}

impl StochasticProcess for StochasticProcessArray {
    fn size(&self) -> usize {
        self.processes.len()
    }

    fn initial_values(&self) -> Array {
        self.processes.iter().map(|p| p.x0()).collect()
    }

    fn drift(&self, t: Time, x: &Array) -> Result<Array> {
        self.check_state(x)?;
        self.processes
            .iter()
            .enumerate()
            .map(|(i, p)| p.drift_1d(t, x[i]))
            .collect::<Result<Vec<_>>>()
            .map(Array::from_vec)
    }

    fn diffusion(&self, t: Time, x: &Array) -> Result<Matrix> {
        self.check_state(x)?;
        let sigmas = self
            .processes
            .iter()
            .enumerate()
            .map(|(i, p)| p.diffusion_1d(t, x[i]))
            .collect::<Result<Vec<_>>>()?;
        Ok(self.scale_rows(&sigmas))
    }

    fn expectation(&self, t0: Time, x0: &Array, dt: Time) -> Result<Array> {
        self.check_state(x0)?;
        self.processes
            .iter()
            .enumerate()
            .map(|(i, p)| p.expectation_1d(t0, x0[i], dt))
            .collect::<Result<Vec<_>>>()
            .map(Array::from_vec)
    }

    fn std_deviation(&self, t0: Time, x0: &Array, dt: Time) -> Result<Matrix> {
        self.check_state(x0)?;
        let sds = self
            .processes
            .iter()
            .enumerate()
            .map(|(i, p)| p.std_deviation_1d(t0, x0[i], dt))
            .collect::<Result<Vec<_>>>()?;
        Ok(self.scale_rows(&sds))
    }

    fn evolve(&self, t0: Time, x0: &Array, dt: Time, dw: &Array) -> Result<Array> {
        self.check_state(x0)?;
        ensure!(dw.len() == self.processes.len(), "wrong number of draws: {}", dw.len());
        let dz = self.sqrt_correlation.mul_vec(dw);
        self.processes
            .iter()
            .enumerate()
            .map(|(i, p)| p.evolve_1d(t0, x0[i], dt, dz[i]))
            .collect::<Result<Vec<_>>>()
            .map(Array::from_vec)
    }

    fn apply(&self, x0: &Array, dx: &Array) -> Array {
        self.processes
            .iter()
            .enumerate()
            .map(|(i, p)| p.apply_1d(x0[i], dx[i]))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GeneralizedBlackScholesProcess;
    use approx::assert_abs_diff_eq;
    use ql_termstructures::{BlackConstantVol, FlatForward};

    fn gbm(s0: f64, vol: f64) -> Arc<dyn StochasticProcess1D> {
        Arc::new(
            GeneralizedBlackScholesProcess::new(
                s0,
                Arc::new(FlatForward::new(0.0)),
                Arc::new(FlatForward::new(0.0)),
                Arc::new(BlackConstantVol::new(vol).unwrap()),
            )
            .unwrap(),
        )
    }

    fn array(rho: f64) -> StochasticProcessArray {
        let corr = Matrix::from_row_slice(2, 2, &[1.0, rho, rho, 1.0]);
        StochasticProcessArray::new(vec![gbm(100.0, 0.2), gbm(50.0, 0.3)], &corr).unwrap()
    }

    #[test]
    fn correlation_round_trips() {
        let a = array(0.6);
        let c = a.correlation();
        assert_abs_diff_eq!(c[(0, 1)], 0.6, epsilon = 1e-12);
        assert_abs_diff_eq!(c[(1, 1)], 1.0, epsilon = 1e-12);
        assert_eq!(a.size(), 2);
        assert_abs_diff_eq!(a.initial_values()[1], 50.0);
    }

    #[test]
    fn covariance_includes_correlation() {
        let a = array(0.5);
        let cov = a.covariance(0.0, &a.initial_values(), 1.0).unwrap();
        assert_abs_diff_eq!(cov[(0, 0)], 0.04, epsilon = 1e-10);
        assert_abs_diff_eq!(cov[(0, 1)], 0.5 * 0.2 * 0.3, epsilon = 1e-10);
    }

    #[test]
    fn perfectly_correlated_processes_move_together() {
        let a = array(1.0);
        let x = a
            .evolve(0.0, &a.initial_values(), 1.0, &Array::from_vec(vec![1.0, -5.0]))
            .unwrap();
        // both receive dz = 1
        assert_abs_diff_eq!(x[0], 100.0 * (0.2 - 0.02_f64).exp(), epsilon = 1e-8);
        assert_abs_diff_eq!(x[1], 50.0 * (0.3 - 0.045_f64).exp(), epsilon = 1e-8);
    }

    #[test]
    fn rejects_bad_correlation() {
        let corr = Matrix::from_row_slice(2, 2, &[1.0, 0.3, 0.2, 1.0]);
        assert!(StochasticProcessArray::new(vec![gbm(1.0, 0.1), gbm(1.0, 0.1)], &corr).is_err());
    }
}
