//! Longstaff-Schwartz least-squares Monte Carlo.
//!
//! # Overview
//!
//! Calibration simulates a separate set of paths and walks the exercise
//! dates backwards.  At each date the discounted cash flows of the paths
//! that are in the money are regressed on a basis of the current state;
//! the fitted function estimates the continuation value, and a path is
//! exercised where the immediate payoff beats it.  The fitted coefficients
//! then define a fixed exercise policy that [`LongstaffSchwartzPathPricer`]
//! applies to independent pricing paths, which gives a low-biased
//! estimator of the option value.
//!
//! * [`EarlyExercisePathPricer`]: exercise value, regression state and
//!   basis for one product
//! * [`LongstaffSchwartzPathPricer`]: the calibrated policy

use crate::monte_carlo::path::SamplePath;
use crate::monte_carlo::path_generator::PathSource;
use crate::monte_carlo::path_pricer::PathPricer;
use ql_core::{ensure, errors::Result, DiscountFactor, Real, Size};
use ql_math::linear_least_squares::{BasisFunction, LinearLeastSquaresRegression};
use ql_math::random_numbers::{derived_seed, effective_seed};
use ql_math::Array;
use std::marker::PhantomData;
use tracing::{debug, trace};

/// Default number of calibration paths.
pub const DEFAULT_CALIBRATION_SAMPLES: Size = 2048;

/// Seed offset separating calibration from pricing paths.
pub const CALIBRATION_SEED_OFFSET: u64 = 1_768_237_423;

/// Calibration seed derived from the pricing seed.
///
/// Zero is resolved to the generators' default seed first, so the
/// calibration paths never replay the pricing paths.
pub fn calibration_seed(seed: u64) -> u64 {
    match effective_seed(seed).wrapping_add(CALIBRATION_SEED_OFFSET) {
        0 => derived_seed(seed, CALIBRATION_SEED_OFFSET),
        s => s,
    }
}

/// Product-specific part of a Longstaff-Schwartz pricer.
pub trait EarlyExercisePathPricer<P>: Send + Sync {
    /// Regression state type.
    type State;

    /// Undiscounted exercise value at grid index `t`; zero where exercise
    /// is not allowed.
    fn exercise_value(&self, path: &P, t: usize) -> Real;

    /// Regression state at grid index `t`.
    fn state(&self, path: &P, t: usize) -> Self::State;

    /// Regression basis.
    fn basis_system(&self) -> &[BasisFunction<Self::State>];

    /// `false` for grid points where the holder cannot exercise.
    fn is_exercise_index(&self, _t: usize) -> bool {
        true
    }
}

/// A calibrated early-exercise policy.
#[derive(Debug)]
pub struct LongstaffSchwartzPathPricer<P, E> {
    exerciser: E,
    discounts: Vec<DiscountFactor>,
    coefficients: Vec<Option<Array>>,
    exercise_probability: Real,
    _path: PhantomData<fn(&P)>,
}

impl<P, E> LongstaffSchwartzPathPricer<P, E>
where
    P: SamplePath,
    E: EarlyExercisePathPricer<P>,
{
    /// Calibrate the policy on `samples` paths drawn from `generator`
    /// (twice as many with `antithetic`).
    ///
    /// `discounts[i]` discounts from grid time `i` to today.  A date where
    /// fewer in-the-money paths remain than basis functions is an error.
    pub fn calibrate<G>(
        exerciser: E,
        discounts: Vec<DiscountFactor>,
        generator: &mut G,
        samples: Size,
        antithetic: bool,
    ) -> Result<Self>
    where
        G: PathSource<Path = P>,
    {
        ensure!(samples > 0, "no calibration samples requested");
        let mut paths: Vec<P> = Vec::with_capacity(if antithetic { 2 * samples } else { samples });
        for _ in 0..samples {
            paths.push(generator.next()?.value.clone());
            if antithetic {
                paths.push(generator.antithetic()?.value.clone());
            }
        }
        Self::calibrate_on_paths(exerciser, discounts, &paths)
    }

    /// Calibrate on a given set of paths.
    pub fn calibrate_on_paths(exerciser: E, discounts: Vec<DiscountFactor>, paths: &[P]) -> Result<Self> {
        ensure!(!paths.is_empty(), "no calibration paths given");
        let len = paths[0].path_length();
        ensure!(len > 1, "calibration paths need at least one step");
        ensure!(
            discounts.len() == len,
            "{} discount factors for paths of {len} points",
            discounts.len()
        );
        let basis = exerciser.basis_system();
        let dim = basis.len();
        ensure!(dim > 0, "empty regression basis");

        let mut prices: Vec<Real> = paths.iter().map(|p| exerciser.exercise_value(p, len - 1)).collect();
        let mut coefficients: Vec<Option<Array>> = vec![None; len];

        for i in (1..len - 1).rev() {
            let df = discounts[i + 1] / discounts[i];
            prices.iter_mut().for_each(|p| *p *= df);
            if !exerciser.is_exercise_index(i) {
                continue;
            }

            let exercise: Vec<Real> = paths.iter().map(|p| exerciser.exercise_value(p, i)).collect();
            let itm: Vec<usize> = (0..paths.len()).filter(|&j| exercise[j] > 0.0).collect();
            if itm.is_empty() {
                trace!(index = i, "no path in the money, skipping regression");
                continue;
            }
            ensure!(
                itm.len() >= dim,
                "under-determined regression at exercise index {i}: {} in-the-money paths for {dim} basis functions",
                itm.len()
            );

            let states: Vec<E::State> = itm.iter().map(|&j| exerciser.state(&paths[j], i)).collect();
            let y: Vec<Real> = itm.iter().map(|&j| prices[j]).collect();
            let regression = LinearLeastSquaresRegression::from_states(&states, &y, basis)?;
            let coeff = regression.coefficients().clone();

            let mut exercised = 0usize;
            for (&j, state) in itm.iter().zip(states.iter()) {
                if continuation(&coeff, basis, state) < exercise[j] {
                    prices[j] = exercise[j];
                    exercised += 1;
                }
            }
            trace!(index = i, itm = itm.len(), exercised, "regression at exercise date");
            coefficients[i] = Some(coeff);
        }

        let mut pricer = Self {
            exerciser,
            discounts,
            coefficients,
            exercise_probability: 0.0,
            _path: PhantomData,
        };
        let exercised = paths.iter().filter(|p| pricer.exercise_index(p, 1).is_some()).count();
        pricer.exercise_probability = exercised as Real / paths.len() as Real;
        debug!(
            paths = paths.len(),
            dates = pricer.coefficients.iter().filter(|c| c.is_some()).count(),
            exercise_probability = pricer.exercise_probability,
            "Longstaff-Schwartz calibration done"
        );
        Ok(pricer)
    }

    /// First grid index at or after `from` where the policy exercises,
    /// with the exercise value there.
    pub fn exercise_index(&self, path: &P, from: usize) -> Option<(usize, Real)> {
        let len = self.discounts.len();
        let basis = self.exerciser.basis_system();
        for i in from.max(1)..len - 1 {
            if let Some(coeff) = &self.coefficients[i] {
                let exercise = self.exerciser.exercise_value(path, i);
                if exercise > 0.0 {
                    let state = self.exerciser.state(path, i);
                    if continuation(coeff, basis, &state) < exercise {
                        return Some((i, exercise));
                    }
                }
            }
        }
        let last = self.exerciser.exercise_value(path, len - 1);
        (last > 0.0).then_some((len - 1, last))
    }

    /// `true` if the policy exercises at index `i` on `path`.
    pub fn exercises_at(&self, path: &P, i: usize) -> bool {
        let len = self.discounts.len();
        let exercise = self.exerciser.exercise_value(path, i);
        if exercise <= 0.0 || i == 0 {
            return false;
        }
        if i == len - 1 {
            return true;
        }
        match &self.coefficients[i] {
            Some(coeff) => {
                let state = self.exerciser.state(path, i);
                continuation(coeff, self.exerciser.basis_system(), &state) < exercise
            }
            None => false,
        }
    }

    /// Value today of following the policy with exercise allowed from
    /// index `from` on.
    pub fn policy_value(&self, path: &P, from: usize) -> Real {
        self.exercise_index(path, from)
            .map_or(0.0, |(i, exercise)| exercise * self.discounts[i])
    }

    /// Fraction of calibration paths exercised under the fitted policy.
    pub fn exercise_probability(&self) -> Real {
        self.exercise_probability
    }

    /// Fitted coefficients per grid index (`None` where no regression ran).
    pub fn coefficients(&self) -> &[Option<Array>] {
        &self.coefficients
    }

    /// Discount factors per grid index.
    pub fn discounts(&self) -> &[DiscountFactor] {
        &self.discounts
    }

    /// The product-specific pricer.
    pub fn exerciser(&self) -> &E {
        &self.exerciser
    }
}

fn continuation<S>(coeff: &Array, basis: &[BasisFunction<S>], state: &S) -> Real {
    basis.iter().zip(coeff.iter()).map(|(f, c)| c * f(state)).sum()
}

impl<P, E> PathPricer<P> for LongstaffSchwartzPathPricer<P, E>
where
    P: SamplePath,
    E: EarlyExercisePathPricer<P>,
{
    fn value(&self, path: &P) -> Result<Real> {
        Ok(self.policy_value(path, 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monte_carlo::lsm_basis::{path_basis_system, LsmBasisType};
    use crate::monte_carlo::path::Path;
    use crate::time_grid::TimeGrid;
    use std::sync::Arc;

    /// Put on the path value with a plain monomial basis.
    struct Put {
        strike: Real,
        basis: Vec<BasisFunction<Real>>,
    }

    impl std::fmt::Debug for Put {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("Put")
                .field("strike", &self.strike)
                .field("basis", &self.basis.len())
                .finish()
        }
    }

    impl EarlyExercisePathPricer<Path> for Put {
        type State = Real;

        fn exercise_value(&self, path: &Path, t: usize) -> Real {
            (self.strike - path[t]).max(0.0)
        }

        fn state(&self, path: &Path, t: usize) -> Real {
            path[t]
        }

        fn basis_system(&self) -> &[BasisFunction<Real>] {
            &self.basis
        }
    }

    fn put(order: usize) -> Put {
        Put {
            strike: 1.1,
            basis: path_basis_system(order, LsmBasisType::Monomial),
        }
    }

    // the eight-path example of the original Longstaff-Schwartz paper
    fn paper_paths() -> Vec<Path> {
        let grid = Arc::new(TimeGrid::new(3.0, 3).unwrap());
        let data = [
            [1.00, 1.09, 1.08, 1.34],
            [1.00, 1.16, 1.26, 1.54],
            [1.00, 1.22, 1.07, 1.03],
            [1.00, 0.93, 0.97, 0.92],
            [1.00, 1.11, 1.56, 1.52],
            [1.00, 0.76, 0.77, 0.90],
            [1.00, 0.92, 0.84, 1.01],
            [1.00, 0.88, 1.22, 1.34],
        ];
        data.iter()
            .map(|v| Path::with_values(Arc::clone(&grid), v.to_vec()).unwrap())
            .collect()
    }

    fn discounts() -> Vec<Real> {
        (0..4).map(|i| (-0.06 * i as Real).exp()).collect()
    }

    #[test]
    fn paper_example_policy() {
        let paths = paper_paths();
        let lsm = LongstaffSchwartzPathPricer::calibrate_on_paths(put(2), discounts(), &paths).unwrap();
        let mean: Real = paths.iter().map(|p| lsm.value(p).unwrap()).sum::<Real>() / 8.0;
        // 0.1144 in the paper
        assert!((mean - 0.1144).abs() < 2e-3, "LSM paper value = {mean:.4}");
        // path 4 (index 3) is exercised at t = 1
        assert_eq!(lsm.exercise_index(&paths[3], 1).map(|e| e.0), Some(1));
        assert!(lsm.exercise_probability() > 0.0 && lsm.exercise_probability() <= 1.0);
    }

    #[test]
    fn too_few_in_the_money_paths_fail_loudly() {
        let paths = paper_paths();
        // six basis functions, five paths in the money at t = 2
        let err = LongstaffSchwartzPathPricer::calibrate_on_paths(put(5), discounts(), &paths).unwrap_err();
        assert!(err.to_string().contains("under-determined"), "{err}");
    }

    #[test]
    fn calibration_seed_offset() {
        assert_eq!(calibration_seed(42), 42 + CALIBRATION_SEED_OFFSET);
        assert_ne!(calibration_seed(0), 0);
        assert_ne!(effective_seed(calibration_seed(0)), effective_seed(0));
    }

    #[test]
    fn default_seed_calibrates_on_fresh_draws() {
        use ql_math::random_numbers::{PseudoRandomSequence, RandomSequenceGenerator};
        let mut pricing = PseudoRandomSequence::new(50, 0).unwrap();
        let mut calibration = PseudoRandomSequence::new(50, calibration_seed(0)).unwrap();
        let shared = (0..2048)
            .filter(|_| pricing.next_sequence().to_vec() == calibration.next_sequence())
            .count();
        assert_eq!(shared, 0);
    }
}
