//! Early-exercise path pricer for single-asset vanilla options.

use crate::monte_carlo::longstaff_schwartz::EarlyExercisePathPricer;
use crate::monte_carlo::lsm_basis::{path_basis_system, LsmBasisType};
use crate::monte_carlo::path::Path;
use crate::time_grid::TimeGrid;
use ql_core::{ensure, errors::Result, Real};
use ql_instruments::{Exercise, ExerciseType, Payoff};
use ql_math::linear_least_squares::BasisFunction;

/// Exercise value and regression state of an American or Bermudan
/// vanilla option on a [`Path`].
///
/// The state is the spot scaled by the strike.  The basis is the chosen
/// polynomial family plus the payoff itself.
pub struct AmericanPathPricer {
    payoff: Payoff,
    scaling: Real,
    exercisable: Vec<bool>,
    basis: Vec<BasisFunction<Real>>,
}

impl AmericanPathPricer {
    /// Build for `exercise` on `grid`.  American exercise allows every grid
    /// point from the earliest exercise time on; Bermudan exercise allows
    /// the grid points of its exercise times.
    pub fn new(
        payoff: Payoff,
        exercise: &Exercise,
        grid: &TimeGrid,
        polynomial_order: usize,
        basis_type: LsmBasisType,
    ) -> Result<Self> {
        payoff.validate()?;
        let strike = payoff.strike();
        ensure!(strike > 0.0, "strike must be positive for the LSM state scaling, got {strike}");

        let exercisable = match exercise.exercise_type() {
            ExerciseType::American => {
                let earliest = exercise.times().first().copied().unwrap_or(0.0);
                grid.times().iter().map(|&t| t >= earliest - 1e-12).collect()
            }
            _ => {
                let mut mask = vec![false; grid.len()];
                for &t in exercise.times() {
                    mask[grid.index(t)?] = true;
                }
                mask
            }
        };

        let scaling = 1.0 / strike;
        let mut basis = path_basis_system(polynomial_order, basis_type);
        basis.push(Box::new(move |x: &Real| payoff.value(*x / scaling)));

        Ok(Self {
            payoff,
            scaling,
            exercisable,
            basis,
        })
    }

    /// The payoff.
    pub fn payoff(&self) -> &Payoff {
        &self.payoff
    }
}

impl std::fmt::Debug for AmericanPathPricer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AmericanPathPricer")
            .field("payoff", &self.payoff)
            .field("scaling", &self.scaling)
            .field("basis_size", &self.basis.len())
            .finish()
    }
}

impl EarlyExercisePathPricer<Path> for AmericanPathPricer {
    type State = Real;

    fn exercise_value(&self, path: &Path, t: usize) -> Real {
        if self.exercisable.get(t).copied().unwrap_or(false) {
            self.payoff.value(path[t])
        } else {
            0.0
        }
    }

    fn state(&self, path: &Path, t: usize) -> Real {
        path[t] * self.scaling
    }

    fn basis_system(&self) -> &[BasisFunction<Real>] {
        &self.basis
    }

    fn is_exercise_index(&self, t: usize) -> bool {
        self.exercisable.get(t).copied().unwrap_or(false)
    }
}
