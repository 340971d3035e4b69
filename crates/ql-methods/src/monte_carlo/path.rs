//! Single- and multi-asset sample paths.

use crate::time_grid::TimeGrid;
use ql_core::{ensure, errors::Result, Real, Time};
use std::ops::{Index, IndexMut};
use std::sync::Arc;

/// Common surface of [`Path`] and [`MultiPath`] used by path-type generic
/// code (the Longstaff-Schwartz pricer, the simulation driver).
pub trait SamplePath: Clone + std::fmt::Debug + Send + Sync {
    /// Number of grid points covered by the path (steps + 1).
    fn path_length(&self) -> usize;

    /// The time grid the path is sampled on.
    fn time_grid(&self) -> &TimeGrid;
}

// ─── Path ─────────────────────────────────────────────────────────────────────

/// One realisation of a one-dimensional process on a [`TimeGrid`].
///
/// `values[0]` is the initial value at `t = 0`.
#[derive(Debug, Clone, PartialEq)]
pub struct Path {
    time_grid: Arc<TimeGrid>,
    values: Vec<Real>,
}

impl Path {
    /// A zero-filled path on `time_grid`.
    pub fn new(time_grid: Arc<TimeGrid>) -> Self {
        let values = vec![0.0; time_grid.len()];
        Self { time_grid, values }
    }

    /// A path with the given values, one per grid point.
    pub fn with_values(time_grid: Arc<TimeGrid>, values: Vec<Real>) -> Result<Self> {
        ensure!(
            values.len() == time_grid.len(),
            "different dimensions: {} values for {} grid points",
            values.len(),
            time_grid.len()
        );
        Ok(Self { time_grid, values })
    }

    /// Number of points.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// `true` if the path holds no points.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Initial value.
    pub fn front(&self) -> Real {
        self.values[0]
    }

    /// Final value.
    pub fn back(&self) -> Real {
        self.values[self.values.len() - 1]
    }

    /// Time of point `i`.
    pub fn time(&self, i: usize) -> Time {
        self.time_grid[i]
    }

    /// The shared time grid.
    pub fn grid(&self) -> &Arc<TimeGrid> {
        &self.time_grid
    }

    /// All values.
    pub fn values(&self) -> &[Real] {
        &self.values
    }

    /// Mutable access to the values.
    pub fn values_mut(&mut self) -> &mut [Real] {
        &mut self.values
    }

    /// Iterator over the values.
    pub fn iter(&self) -> std::slice::Iter<'_, Real> {
        self.values.iter()
    }
}

impl Index<usize> for Path {
    type Output = Real;

    fn index(&self, i: usize) -> &Real {
        &self.values[i]
    }
}

impl IndexMut<usize> for Path {
    fn index_mut(&mut self, i: usize) -> &mut Real {
        &mut self.values[i]
    }
}

impl SamplePath for Path {
    fn path_length(&self) -> usize {
        self.values.len()
    }

    fn time_grid(&self) -> &TimeGrid {
        &self.time_grid
    }
}

// ─── MultiPath ────────────────────────────────────────────────────────────────

/// Correlated paths of several assets on a common grid.
#[derive(Debug, Clone, PartialEq)]
pub struct MultiPath {
    paths: Vec<Path>,
}

impl MultiPath {
    /// `asset_number` zero-filled paths on `time_grid`.
    pub fn new(asset_number: usize, time_grid: Arc<TimeGrid>) -> Result<Self> {
        ensure!(asset_number > 0, "number of assets must be positive");
        let paths = (0..asset_number)
            .map(|_| Path::new(Arc::clone(&time_grid)))
            .collect();
        Ok(Self { paths })
    }

    /// Build from per-asset paths sharing one grid.
    pub fn from_paths(paths: Vec<Path>) -> Result<Self> {
        ensure!(!paths.is_empty(), "number of assets must be positive");
        let n = paths[0].len();
        ensure!(
            paths.iter().all(|p| p.len() == n),
            "asset paths must have the same length"
        );
        Ok(Self { paths })
    }

    /// Number of assets.
    pub fn asset_number(&self) -> usize {
        self.paths.len()
    }

    /// Number of points per asset path.
    pub fn path_size(&self) -> usize {
        self.paths[0].len()
    }

    /// The per-asset paths.
    pub fn paths(&self) -> &[Path] {
        &self.paths
    }

    /// State vector of all assets at point `i`.
    pub fn state(&self, i: usize) -> Vec<Real> {
        self.paths.iter().map(|p| p[i]).collect()
    }
}

impl Index<usize> for MultiPath {
    type Output = Path;

    fn index(&self, j: usize) -> &Path {
        &self.paths[j]
    }
}

impl IndexMut<usize> for MultiPath {
    fn index_mut(&mut self, j: usize) -> &mut Path {
        &mut self.paths[j]
    }
}

impl SamplePath for MultiPath {
    fn path_length(&self) -> usize {
        self.path_size()
    }

    fn time_grid(&self) -> &TimeGrid {
        self.paths[0].time_grid()
    }
}
