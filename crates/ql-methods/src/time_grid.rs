//! Time grids for path generation and PDE time stepping.
//!
//! A [`TimeGrid`] always starts at `t = 0`, is strictly increasing, and
//! contains every mandatory time (fixings, exercise times, dividends)
//! handed to its constructor.  Intervals between mandatory times are cut
//! into equal sub-steps no longer than the requested maximum step.

use ql_core::{ensure, errors::Result, fail, Error, Size, Time};
use ql_math::comparison::close_to;

/// Step configuration: a total step count or a density per year.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StepsSpec {
    /// Total number of steps over the grid.
    Steps(Size),
    /// Number of steps per year of the last mandatory time.
    StepsPerYear(Size),
}

impl StepsSpec {
    /// Build from the two optional engine settings; exactly one must be set.
    pub fn from_options(steps: Option<Size>, steps_per_year: Option<Size>) -> Result<Self> {
        ensure!(
            steps.is_none() || steps_per_year.is_none(),
            "number of steps overspecified"
        );
        match (steps, steps_per_year) {
            (Some(n), _) => {
                ensure!(n > 0, "number of steps must be positive");
                Ok(Self::Steps(n))
            }
            (None, Some(n)) => {
                ensure!(n > 0, "number of steps per year must be positive");
                Ok(Self::StepsPerYear(n))
            }
            (None, None) => Err(Error::Precondition("number of steps not given".into())),
        }
    }

    /// Total steps for a grid ending at `end`.
    pub fn total_steps(self, end: Time) -> Size {
        match self {
            Self::Steps(n) => n,
            Self::StepsPerYear(n) => ((n as f64 * end) as Size).max(1),
        }
    }
}

/// A strictly increasing grid of times starting at zero.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeGrid {
    times: Vec<Time>,
    dt: Vec<Time>,
    mandatory_times: Vec<Time>,
}

impl TimeGrid {
    /// Regularly spaced grid `0, end/steps, …, end`.
    pub fn new(end: Time, steps: Size) -> Result<Self> {
        ensure!(end > 0.0 && end.is_finite(), "negative or null time grid end {end}");
        ensure!(steps > 0, "time grid needs at least one step");
        let dt = end / steps as Time;
        let times: Vec<Time> = (0..=steps).map(|i| dt * i as Time).collect();
        Ok(Self {
            dt: vec![dt; steps],
            times,
            mandatory_times: vec![end],
        })
    }

    /// Grid containing all `times` with `steps` as the step budget over the
    /// last mandatory time.  With `steps == 0` the shortest gap between
    /// mandatory times sets the step length.
    pub fn with_mandatory_times(times: &[Time], steps: Size) -> Result<Self> {
        ensure!(!times.is_empty(), "empty time sequence");
        ensure!(
            times.iter().all(|t| t.is_finite()),
            "non-finite mandatory time"
        );
        let mut mandatory = times.to_vec();
        mandatory.sort_by(|a, b| a.total_cmp(b));
        ensure!(mandatory[0] >= 0.0, "negative times not allowed");
        mandatory.dedup_by(|b, a| close_to(*a, *b));

        let last = mandatory[mandatory.len() - 1];
        ensure!(last > 0.0, "time grid must extend beyond zero");

        let dt_max = if steps == 0 {
            let mut gaps: Vec<Time> = Vec::with_capacity(mandatory.len());
            gaps.push(mandatory[0]);
            gaps.extend(mandatory.windows(2).map(|w| w[1] - w[0]));
            if gaps[0] == 0.0 {
                gaps.remove(0);
            }
            gaps.into_iter().fold(Time::INFINITY, Time::min)
        } else {
            last / steps as Time
        };

        let mut grid = vec![0.0];
        let mut period_begin = 0.0;
        for &period_end in &mandatory {
            if period_end != 0.0 {
                let n = (((period_end - period_begin) / dt_max + 0.5) as Size).max(1);
                let dt = (period_end - period_begin) / n as Time;
                grid.extend((1..=n).map(|i| period_begin + i as Time * dt));
            }
            period_begin = period_end;
        }

        let dt = grid.windows(2).map(|w| w[1] - w[0]).collect();
        Ok(Self {
            times: grid,
            dt,
            mandatory_times: mandatory,
        })
    }

    /// Grid over `times` with the step count resolved from `spec`.
    pub fn from_steps_spec(times: &[Time], spec: StepsSpec) -> Result<Self> {
        let end = times.iter().copied().fold(0.0, Time::max);
        Self::with_mandatory_times(times, spec.total_steps(end))
    }

    /// Grid points.
    pub fn times(&self) -> &[Time] {
        &self.times
    }

    /// Step lengths, one per interval.
    pub fn dt(&self) -> &[Time] {
        &self.dt
    }

    /// Length of step `i`, between `times[i]` and `times[i+1]`.
    pub fn dt_at(&self, i: usize) -> Time {
        self.dt[i]
    }

    /// The mandatory times, sorted and deduplicated.
    pub fn mandatory_times(&self) -> &[Time] {
        &self.mandatory_times
    }

    /// Number of grid points (steps + 1).
    pub fn len(&self) -> usize {
        self.times.len()
    }

    /// Always false: a grid holds at least the origin.
    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Number of steps.
    pub fn steps(&self) -> usize {
        self.dt.len()
    }

    /// Last grid time.
    pub fn back(&self) -> Time {
        self.times[self.times.len() - 1]
    }

    /// Index of the grid point equal to `t`; errors if `t` is not on the
    /// grid.
    pub fn index(&self, t: Time) -> Result<usize> {
        let i = self.closest_index(t);
        if close_to(t, self.times[i]) {
            return Ok(i);
        }
        let front = self.times[0];
        let back = self.back();
        if t < front {
            fail!("using inadequate time grid: all nodes are later than the required time t = {t} (earliest node is t1 = {front})")
        } else if t > back {
            fail!("using inadequate time grid: all nodes are earlier than the required time t = {t} (latest node is t1 = {back})")
        } else {
            let (j, k) = if t > self.times[i] { (i, i + 1) } else { (i - 1, i) };
            fail!(
                "using inadequate time grid: the nodes closest to the required time t = {t} are t1 = {} and t2 = {}",
                self.times[j],
                self.times[k]
            )
        }
    }

    /// Index of the grid point nearest to `t` (the earlier one on ties).
    pub fn closest_index(&self, t: Time) -> usize {
        let pos = self.times.partition_point(|&x| x < t);
        if pos == 0 {
            0
        } else if pos == self.times.len() {
            self.times.len() - 1
        } else {
            let dt1 = self.times[pos] - t;
            let dt2 = t - self.times[pos - 1];
            if dt1 < dt2 {
                pos
            } else {
                pos - 1
            }
        }
    }

    /// Grid time nearest to `t`.
    pub fn closest_time(&self, t: Time) -> Time {
        self.times[self.closest_index(t)]
    }
}

impl std::ops::Index<usize> for TimeGrid {
    type Output = Time;

    fn index(&self, i: usize) -> &Time {
        &self.times[i]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use proptest::prelude::*;

    #[test]
    fn regular_grid() {
        let g = TimeGrid::new(1.0, 4).unwrap();
        assert_eq!(g.len(), 5);
        assert_abs_diff_eq!(g[2], 0.5);
        assert_abs_diff_eq!(g.dt_at(3), 0.25);
        assert_eq!(g.index(0.75).unwrap(), 3);
    }

    #[test]
    fn mandatory_times_are_hit_and_deduplicated() {
        let g = TimeGrid::with_mandatory_times(&[1.0, 0.25, 0.25, 0.6], 10).unwrap();
        assert_eq!(g.mandatory_times(), &[0.25, 0.6, 1.0]);
        for &t in g.mandatory_times() {
            assert!(g.index(t).is_ok(), "mandatory time {t} missing from grid");
        }
        assert_abs_diff_eq!(g[0], 0.0);
        assert_abs_diff_eq!(g.back(), 1.0);
    }

    #[test]
    fn zero_steps_use_shortest_gap() {
        let g = TimeGrid::with_mandatory_times(&[0.5, 1.0, 2.0], 0).unwrap();
        // shortest gap 0.5 → four steps
        assert_eq!(g.steps(), 4);
    }

    #[test]
    fn index_off_grid_is_an_error() {
        let g = TimeGrid::new(1.0, 2).unwrap();
        assert!(g.index(0.3).is_err());
        assert!(g.index(1.5).is_err());
        assert_eq!(g.closest_index(0.3), 1);
        assert_abs_diff_eq!(g.closest_time(0.1), 0.0);
    }

    #[test]
    fn steps_spec_is_exclusive() {
        assert!(StepsSpec::from_options(Some(10), Some(10)).is_err());
        assert!(StepsSpec::from_options(None, None).is_err());
        let spec = StepsSpec::from_options(None, Some(12)).unwrap();
        let g = TimeGrid::from_steps_spec(&[0.5], spec).unwrap();
        assert_eq!(g.steps(), 6);
    }

    proptest! {
        #[test]
        fn grid_is_strictly_increasing_from_zero(
            times in proptest::collection::vec(0.01f64..5.0, 1..8),
            steps in 0usize..40,
        ) {
            let g = TimeGrid::with_mandatory_times(&times, steps).unwrap();
            prop_assert_eq!(g[0], 0.0);
            prop_assert!(g.times().windows(2).all(|w| w[1] > w[0]));
            for &t in &times {
                prop_assert!(g.index(t).is_ok());
            }
        }
    }
}
