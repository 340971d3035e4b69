//! Memory layout of multi-dimensional finite-difference grids.
//!
//! Grid points are stored in a flat vector with the first direction
//! running fastest.  Neighbours beyond the grid edge are reflected back
//! inside, so every stencil index stays valid.

use ql_core::{ensure, errors::Result};

/// Dimensions, strides and total size of a grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FdmLinearOpLayout {
    dim: Vec<usize>,
    spacing: Vec<usize>,
    size: usize,
}

impl FdmLinearOpLayout {
    /// Layout for grid dimensions `dim`; every dimension needs at least
    /// two points.
    pub fn new(dim: Vec<usize>) -> Result<Self> {
        ensure!(!dim.is_empty(), "layout needs at least one dimension");
        ensure!(
            dim.iter().all(|&d| d >= 2),
            "every layout dimension needs at least two points, got {dim:?}"
        );
        let mut spacing = Vec::with_capacity(dim.len());
        let mut stride = 1;
        for &d in &dim {
            spacing.push(stride);
            stride *= d;
        }
        Ok(Self {
            dim,
            spacing,
            size: stride,
        })
    }

    /// Number of points per direction.
    pub fn dim(&self) -> &[usize] {
        &self.dim
    }

    /// Stride of each direction in the flat vector.
    pub fn spacing(&self) -> &[usize] {
        &self.spacing
    }

    /// Total number of grid points.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of directions.
    pub fn directions(&self) -> usize {
        self.dim.len()
    }

    /// Flat index of `coordinates`.
    pub fn index(&self, coordinates: &[usize]) -> usize {
        coordinates.iter().zip(&self.spacing).map(|(c, s)| c * s).sum()
    }

    /// Coordinates of flat index `index`.
    pub fn coordinates(&self, index: usize) -> Vec<usize> {
        let mut rest = index;
        self.dim
            .iter()
            .map(|&d| {
                let c = rest % d;
                rest /= d;
                c
            })
            .collect()
    }

    /// Coordinate of `index` along `direction`.
    pub fn coordinate(&self, index: usize, direction: usize) -> usize {
        (index / self.spacing[direction]) % self.dim[direction]
    }

    /// Flat index of the point `offset` steps away from `index` along
    /// `direction`, reflected at the grid edges.
    pub fn neighbourhood(&self, index: usize, direction: usize, offset: isize) -> usize {
        let c = self.coordinate(index, direction);
        let moved = self.reflect(c, direction, offset);
        index - c * self.spacing[direction] + moved * self.spacing[direction]
    }

    /// Neighbour along two directions at once.
    pub fn neighbourhood2(
        &self,
        index: usize,
        d1: usize,
        offset1: isize,
        d2: usize,
        offset2: isize,
    ) -> usize {
        let first = self.neighbourhood(index, d1, offset1);
        self.neighbourhood(first, d2, offset2)
    }

    fn reflect(&self, c: usize, direction: usize, offset: isize) -> usize {
        let last = self.dim[direction] as isize - 1;
        let mut moved = c as isize + offset;
        if moved < 0 {
            moved = -moved;
        } else if moved > last {
            moved = 2 * last - moved;
        }
        moved as usize
    }

    /// Iterate over `(index, coordinates)` in storage order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, Vec<usize>)> + '_ {
        (0..self.size).map(move |i| (i, self.coordinates(i)))
    }

    /// `true` if `index` lies on the lower or upper edge of `direction`.
    pub fn is_boundary(&self, index: usize, direction: usize) -> bool {
        let c = self.coordinate(index, direction);
        c == 0 || c == self.dim[direction] - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_and_coordinates_round_trip() {
        let layout = FdmLinearOpLayout::new(vec![4, 3]).unwrap();
        assert_eq!(layout.size(), 12);
        assert_eq!(layout.spacing(), &[1, 4]);
        assert_eq!(layout.index(&[2, 1]), 6);
        assert_eq!(layout.coordinates(6), vec![2, 1]);
        assert_eq!(layout.coordinate(6, 1), 1);
    }

    #[test]
    fn neighbours_reflect_at_edges() {
        let layout = FdmLinearOpLayout::new(vec![4, 3]).unwrap();
        // (0,1) - 1 in x reflects to (1,1)
        assert_eq!(layout.neighbourhood(4, 0, -1), 5);
        // (3,1) + 1 in x reflects to (2,1)
        assert_eq!(layout.neighbourhood(7, 0, 1), 6);
        // (1,0) + 1 in y
        assert_eq!(layout.neighbourhood(1, 1, 1), 5);
        assert_eq!(layout.neighbourhood2(5, 0, 1, 1, 1), 10);
    }

    #[test]
    fn degenerate_dimensions_are_rejected() {
        assert!(FdmLinearOpLayout::new(vec![]).is_err());
        assert!(FdmLinearOpLayout::new(vec![5, 1]).is_err());
    }
}
