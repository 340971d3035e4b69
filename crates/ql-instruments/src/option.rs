//! Option argument structs handed to pricing engines.

use crate::dividend::CashDividend;
use crate::exercise::{Exercise, ExerciseType};
use crate::payoff::{OptionType, Payoff};
use ql_core::{ensure, errors::Result, Real, Size, Time};

// ────────────────────────────────────────────────────────────────────────────
// Vanilla
// ────────────────────────────────────────────────────────────────────────────

/// Arguments of a one-asset option with European, American or Bermudan
/// exercise and optional discrete cash dividends.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VanillaOptionArguments {
    /// The payoff.
    pub payoff: Payoff,
    /// The exercise schedule.
    pub exercise: Exercise,
    /// Cash dividends paid before expiry, sorted by time.
    pub dividends: Vec<CashDividend>,
}

impl VanillaOptionArguments {
    /// Create option arguments.
    pub fn new(payoff: Payoff, exercise: Exercise) -> Result<Self> {
        payoff.validate()?;
        Ok(Self {
            payoff,
            exercise,
            dividends: Vec::new(),
        })
    }

    /// Attach cash dividends; those after the last exercise time are dropped.
    pub fn with_dividends(mut self, mut dividends: Vec<CashDividend>) -> Self {
        let last = self.exercise.last_time();
        dividends.retain(|d| d.time <= last);
        dividends.sort_by(|a, b| a.time.total_cmp(&b.time));
        self.dividends = dividends;
        self
    }

    /// The last exercise time.
    pub fn maturity(&self) -> Time {
        self.exercise.last_time()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Barrier
// ────────────────────────────────────────────────────────────────────────────

/// Barrier type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BarrierType {
    /// Activated when the price drops below the barrier.
    DownIn,
    /// Activated when the price rises above the barrier.
    UpIn,
    /// Cancelled when the price drops below the barrier.
    DownOut,
    /// Cancelled when the price rises above the barrier.
    UpOut,
}

impl BarrierType {
    /// `true` for down barriers.
    pub fn is_down(self) -> bool {
        matches!(self, BarrierType::DownIn | BarrierType::DownOut)
    }

    /// `true` for knock-in barriers.
    pub fn is_knock_in(self) -> bool {
        matches!(self, BarrierType::DownIn | BarrierType::UpIn)
    }

    /// `true` if `spot` is already beyond the barrier.
    pub fn is_triggered(self, spot: Real, barrier: Real) -> bool {
        if self.is_down() {
            spot <= barrier
        } else {
            spot >= barrier
        }
    }
}

/// Arguments of a single-barrier option with European exercise.
///
/// Knock-out rebates are paid at hit; knock-in rebates at expiry if the
/// barrier was never touched.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BarrierOptionArguments {
    /// The payoff.
    pub payoff: Payoff,
    /// The exercise schedule.
    pub exercise: Exercise,
    /// Barrier type.
    pub barrier_type: BarrierType,
    /// Barrier level.
    pub barrier: Real,
    /// Cash rebate.
    pub rebate: Real,
}

impl BarrierOptionArguments {
    /// Create barrier option arguments.
    pub fn new(
        payoff: Payoff,
        exercise: Exercise,
        barrier_type: BarrierType,
        barrier: Real,
        rebate: Real,
    ) -> Result<Self> {
        payoff.validate()?;
        ensure!(
            exercise.exercise_type() == ExerciseType::European,
            "only European barrier options are supported"
        );
        ensure!(barrier > 0.0 && barrier.is_finite(), "invalid barrier {barrier}");
        ensure!(rebate >= 0.0 && rebate.is_finite(), "invalid rebate {rebate}");
        Ok(Self {
            payoff,
            exercise,
            barrier_type,
            barrier,
            rebate,
        })
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Asian
// ────────────────────────────────────────────────────────────────────────────

/// Averaging convention of an Asian option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AverageType {
    /// Arithmetic mean of the fixings.
    Arithmetic,
    /// Geometric mean of the fixings.
    Geometric,
}

/// Arguments of a discretely monitored average-price option.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AsianOptionArguments {
    /// Averaging convention.
    pub average_type: AverageType,
    /// Sum (arithmetic) or product (geometric) of the past fixings.
    pub running_accumulator: Real,
    /// Number of fixings already observed.
    pub past_fixings: Size,
    /// Future fixing times, strictly increasing.
    pub fixing_times: Vec<Time>,
    /// The payoff applied to the average.
    pub payoff: Payoff,
    /// The exercise schedule (European).
    pub exercise: Exercise,
}

impl AsianOptionArguments {
    /// Create Asian option arguments with no past fixings.
    pub fn new(
        average_type: AverageType,
        fixing_times: Vec<Time>,
        payoff: Payoff,
        exercise: Exercise,
    ) -> Result<Self> {
        let neutral = match average_type {
            AverageType::Arithmetic => 0.0,
            AverageType::Geometric => 1.0,
        };
        Self::with_past_fixings(average_type, neutral, 0, fixing_times, payoff, exercise)
    }

    /// Create Asian option arguments including already observed fixings.
    pub fn with_past_fixings(
        average_type: AverageType,
        running_accumulator: Real,
        past_fixings: Size,
        fixing_times: Vec<Time>,
        payoff: Payoff,
        exercise: Exercise,
    ) -> Result<Self> {
        payoff.validate()?;
        ensure!(
            exercise.exercise_type() == ExerciseType::European,
            "only European Asian options are supported"
        );
        ensure!(!fixing_times.is_empty(), "no fixing times given");
        ensure!(
            fixing_times.windows(2).all(|w| w[1] > w[0]) && fixing_times[0] >= 0.0,
            "fixing times must be non-negative and strictly increasing"
        );
        ensure!(
            fixing_times[fixing_times.len() - 1] <= exercise.last_time(),
            "fixing after expiry"
        );
        if average_type == AverageType::Geometric {
            ensure!(
                running_accumulator > 0.0,
                "geometric running accumulator must be positive"
            );
        }
        Ok(Self {
            average_type,
            running_accumulator,
            past_fixings,
            fixing_times,
            payoff,
            exercise,
        })
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Lookback
// ────────────────────────────────────────────────────────────────────────────

/// Strike convention of a lookback option.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LookbackKind {
    /// Payoff applied to the path maximum (call) or minimum (put).
    FixedStrike(Payoff),
    /// Call pays `S_T − min S`, put pays `max S − S_T`.
    FloatingStrike(OptionType),
}

/// Arguments of a lookback option with European exercise.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LookbackOptionArguments {
    /// Fixed or floating strike.
    pub kind: LookbackKind,
    /// Extremum observed so far, if monitoring has started.
    pub running_extremum: Option<Real>,
    /// The exercise schedule.
    pub exercise: Exercise,
}

impl LookbackOptionArguments {
    /// Create lookback arguments.
    pub fn new(kind: LookbackKind, exercise: Exercise) -> Result<Self> {
        if let LookbackKind::FixedStrike(p) = &kind {
            p.validate()?;
        }
        ensure!(
            exercise.exercise_type() == ExerciseType::European,
            "only European lookback options are supported"
        );
        Ok(Self {
            kind,
            running_extremum: None,
            exercise,
        })
    }

    /// Set the extremum observed so far.
    pub fn with_running_extremum(mut self, extremum: Real) -> Self {
        self.running_extremum = Some(extremum);
        self
    }

    /// The option type.
    pub fn option_type(&self) -> OptionType {
        match self.kind {
            LookbackKind::FixedStrike(p) => p.option_type(),
            LookbackKind::FloatingStrike(t) => t,
        }
    }
}
