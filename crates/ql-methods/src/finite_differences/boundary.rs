//! Dirichlet boundary conditions.

use crate::finite_differences::meshers::FdmMesherComposite;
use ql_core::Real;
use ql_math::Array;

/// Edge of a direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BoundarySide {
    /// First grid point.
    Lower,
    /// Last grid point.
    Upper,
}

/// Fixes the solution to `value` on one edge of one direction.
#[derive(Debug, Clone)]
pub struct FdmDirichletBoundary {
    indices: Vec<usize>,
    value: Real,
    side: BoundarySide,
    direction: usize,
}

impl FdmDirichletBoundary {
    /// Boundary on `side` of `direction` of `mesher`.
    pub fn new(mesher: &FdmMesherComposite, value: Real, direction: usize, side: BoundarySide) -> Self {
        let layout = mesher.layout();
        let edge = match side {
            BoundarySide::Lower => 0,
            BoundarySide::Upper => layout.dim()[direction] - 1,
        };
        let indices = (0..layout.size())
            .filter(|&i| layout.coordinate(i, direction) == edge)
            .collect();
        Self {
            indices,
            value,
            side,
            direction,
        }
    }

    /// Boundary value.
    pub fn value(&self) -> Real {
        self.value
    }

    /// Side of the direction.
    pub fn side(&self) -> BoundarySide {
        self.side
    }

    /// Direction the boundary sits on.
    pub fn direction(&self) -> usize {
        self.direction
    }

    /// Enforce the boundary after an explicit operator application.
    pub fn apply_after_applying(&self, a: &mut Array) {
        for &i in &self.indices {
            a[i] = self.value;
        }
    }

    /// Enforce the boundary after an implicit solve.
    pub fn apply_after_solving(&self, a: &mut Array) {
        self.apply_after_applying(a);
    }
}

/// Applies every boundary of a set after an explicit step.
pub(crate) fn after_applying(bcs: &[FdmDirichletBoundary], a: &mut Array) {
    bcs.iter().for_each(|bc| bc.apply_after_applying(a));
}

/// Applies every boundary of a set after an implicit step.
pub(crate) fn after_solving(bcs: &[FdmDirichletBoundary], a: &mut Array) {
    bcs.iter().for_each(|bc| bc.apply_after_solving(a));
}
