//! Option exercise schedules.
//!
//! An `Exercise` defines *when* an option can be exercised, as times from
//! the valuation instant.

use ql_core::{ensure, errors::Result, Time};
use std::fmt;

/// Type of exercise right.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ExerciseType {
    /// Can only be exercised at expiry.
    European,
    /// Can be exercised at any time up to expiry.
    American,
    /// Can be exercised at specific times.
    Bermudan,
}

/// Exercise schedule of an option.
///
/// - European: a single time (the expiry).
/// - American: two times (earliest, latest).
/// - Bermudan: one or more strictly increasing times.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Exercise {
    exercise_type: ExerciseType,
    times: Vec<Time>,
}

impl Exercise {
    /// European exercise at `expiry`.
    pub fn european(expiry: Time) -> Result<Self> {
        ensure!(expiry > 0.0 && expiry.is_finite(), "invalid expiry {expiry}");
        Ok(Self {
            exercise_type: ExerciseType::European,
            times: vec![expiry],
        })
    }

    /// American exercise between `earliest` and `latest`.
    pub fn american(earliest: Time, latest: Time) -> Result<Self> {
        ensure!(earliest >= 0.0, "negative earliest exercise time {earliest}");
        ensure!(
            latest > earliest && latest.is_finite(),
            "latest exercise time {latest} must be after {earliest}"
        );
        Ok(Self {
            exercise_type: ExerciseType::American,
            times: vec![earliest, latest],
        })
    }

    /// Bermudan exercise at the given times (sorted and deduplicated).
    pub fn bermudan(mut times: Vec<Time>) -> Result<Self> {
        ensure!(!times.is_empty(), "no exercise times given");
        ensure!(
            times.iter().all(|t| *t > 0.0 && t.is_finite()),
            "exercise times must be positive"
        );
        times.sort_by(|a, b| a.total_cmp(b));
        times.dedup();
        Ok(Self {
            exercise_type: ExerciseType::Bermudan,
            times,
        })
    }

    /// The type of exercise.
    pub fn exercise_type(&self) -> ExerciseType {
        self.exercise_type
    }

    /// All exercise times.
    pub fn times(&self) -> &[Time] {
        &self.times
    }

    /// The last possible exercise time.
    pub fn last_time(&self) -> Time {
        self.times[self.times.len() - 1]
    }
}

impl fmt::Display for Exercise {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.exercise_type {
            ExerciseType::European => write!(f, "European({})", self.times[0]),
            ExerciseType::American => {
                write!(f, "American({} to {})", self.times[0], self.last_time())
            }
            ExerciseType::Bermudan => write!(f, "Bermudan({} times)", self.times.len()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn european_exercise() {
        let ex = Exercise::european(1.5).unwrap();
        assert_eq!(ex.exercise_type(), ExerciseType::European);
        assert_eq!(ex.last_time(), 1.5);
        assert!(Exercise::european(0.0).is_err());
    }

    #[test]
    fn american_exercise() {
        let ex = Exercise::american(0.0, 2.0).unwrap();
        assert_eq!(ex.times(), &[0.0, 2.0]);
        assert!(Exercise::american(1.0, 0.5).is_err());
    }

    #[test]
    fn bermudan_exercise_is_sorted() {
        let ex = Exercise::bermudan(vec![1.0, 0.5, 1.0, 0.25]).unwrap();
        assert_eq!(ex.times(), &[0.25, 0.5, 1.0]);
        assert_eq!(ex.to_string(), "Bermudan(3 times)");
        assert!(Exercise::bermudan(vec![]).is_err());
    }
}
