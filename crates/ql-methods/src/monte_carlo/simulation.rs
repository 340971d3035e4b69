//! Convergence-driven Monte Carlo sampling.
//!
//! [`McSimulation::calculate`] runs a [`MonteCarloModel`] either for a
//! fixed number of samples or until the error estimate drops below a
//! tolerance.  Running out of the sample budget is not an error: the
//! outcome carries [`McStatus::Exhausted`] together with the best
//! available estimate.

use crate::monte_carlo::model::MonteCarloModel;
use crate::monte_carlo::path_generator::PathSource;
use crate::monte_carlo::path_pricer::PathPricer;
use ql_core::{ensure, errors::Result, Real, Size};
use ql_math::statistics::StatisticsAccumulator;
use tracing::debug;

/// Smallest first batch in tolerance-driven mode.
pub const MIN_SAMPLES: Size = 1023;

/// Life cycle of a simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum McStatus {
    /// No sample drawn yet.
    NotStarted,
    /// Sampling in progress.
    Sampling,
    /// The requested sample count or tolerance was reached.
    Converged,
    /// The sample cap was hit before the tolerance was met.
    Exhausted,
}

impl McStatus {
    /// Stable name used in result maps.
    pub fn as_str(self) -> &'static str {
        match self {
            McStatus::NotStarted => "NotStarted",
            McStatus::Sampling => "Sampling",
            McStatus::Converged => "Converged",
            McStatus::Exhausted => "Exhausted",
        }
    }
}

impl std::fmt::Display for McStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of [`McSimulation::calculate`].
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct McOutcome {
    /// Final state.
    pub status: McStatus,
    /// Sample mean.
    pub value: Real,
    /// Standard error of the mean, when the generator allows one.
    pub error_estimate: Option<Real>,
    /// Number of accumulated samples.
    pub samples: Size,
}

/// Sampling targets of a simulation.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct McConfig {
    /// Target error estimate; mutually exclusive with `required_samples`.
    pub tolerance: Option<Real>,
    /// Fixed sample count.
    pub required_samples: Option<Size>,
    /// Cap on the sample count in tolerance mode.
    pub max_samples: Option<Size>,
}

impl McConfig {
    /// Check that exactly one of tolerance and sample count is given, and
    /// that a sample cap leaves room for an error estimate.
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.tolerance.is_some() || self.required_samples.is_some(),
            "neither tolerance nor number of samples set"
        );
        ensure!(
            self.tolerance.is_none() || self.required_samples.is_none(),
            "both tolerance and number of samples set"
        );
        if let Some(tol) = self.tolerance {
            ensure!(tol > 0.0, "tolerance must be positive, got {tol}");
            if let Some(cap) = self.max_samples {
                ensure!(cap >= 2, "an error estimate needs at least 2 samples, max samples is {cap}");
            }
        }
        if let Some(n) = self.required_samples {
            ensure!(n > 0, "number of samples must be positive");
        }
        Ok(())
    }
}

/// Drives a [`MonteCarloModel`] to a sample count or a tolerance.
#[derive(Debug)]
pub struct McSimulation<G: PathSource, P, S> {
    model: MonteCarloModel<G, P, S>,
    status: McStatus,
    min_samples: Size,
}

impl<G, P, S> McSimulation<G, P, S>
where
    G: PathSource,
    P: PathPricer<G::Path>,
    S: StatisticsAccumulator,
{
    /// Wrap a model.
    pub fn new(model: MonteCarloModel<G, P, S>) -> Self {
        Self {
            model,
            status: McStatus::NotStarted,
            min_samples: MIN_SAMPLES,
        }
    }

    /// Override the first batch size of tolerance-driven runs.
    pub fn with_min_samples(mut self, min_samples: Size) -> Self {
        self.min_samples = min_samples.max(2);
        self
    }

    /// Current state.
    pub fn status(&self) -> McStatus {
        self.status
    }

    /// The underlying model.
    pub fn model(&self) -> &MonteCarloModel<G, P, S> {
        &self.model
    }

    /// Consume the simulation and return the model.
    pub fn into_model(self) -> MonteCarloModel<G, P, S> {
        self.model
    }

    /// Run the simulation.
    ///
    /// Exactly one of `tolerance` and `required_samples` must be given.
    /// A tolerance needs a generator that allows error estimates.
    pub fn calculate(
        &mut self,
        tolerance: Option<Real>,
        required_samples: Option<Size>,
        max_samples: Option<Size>,
    ) -> Result<McOutcome> {
        McConfig {
            tolerance,
            required_samples,
            max_samples,
        }
        .validate()?;

        self.status = McStatus::Sampling;
        if let Some(tol) = tolerance {
            ensure!(
                self.model.path_generator().allows_error_estimate(),
                "chosen random generator policy does not allow an error estimate"
            );
            self.value(tol, max_samples.unwrap_or(Size::MAX))?;
        } else if let Some(n) = required_samples {
            self.value_with_samples(n)?;
        }
        self.outcome()
    }

    fn value(&mut self, tolerance: Real, max_samples: Size) -> Result<()> {
        let mut sample_number = self.model.sample_accumulator().samples();
        if sample_number < self.min_samples {
            let batch = (self.min_samples - sample_number).min(max_samples.saturating_sub(sample_number));
            self.model.add_samples(batch)?;
            sample_number = self.model.sample_accumulator().samples();
        }

        let mut error = self.model.sample_accumulator().error_estimate()?;
        while error > tolerance {
            if sample_number >= max_samples {
                debug!(
                    samples = sample_number,
                    error,
                    tolerance,
                    "max number of samples reached before convergence"
                );
                self.status = McStatus::Exhausted;
                return Ok(());
            }
            let order = (error * error) / (tolerance * tolerance);
            let wanted = (sample_number as Real * order * 0.8 - sample_number as Real)
                .max(self.min_samples as Real);
            let batch = (wanted as Size).min(max_samples - sample_number);
            debug!(samples = sample_number, error, tolerance, batch, "extending simulation");
            self.model.add_samples(batch)?;
            sample_number += batch;
            error = self.model.sample_accumulator().error_estimate()?;
        }
        self.status = McStatus::Converged;
        Ok(())
    }

    fn value_with_samples(&mut self, samples: Size) -> Result<()> {
        let sample_number = self.model.sample_accumulator().samples();
        ensure!(
            samples >= sample_number,
            "number of already simulated samples ({sample_number}) greater than requested samples ({samples})"
        );
        self.model.add_samples(samples - sample_number)?;
        self.status = McStatus::Converged;
        Ok(())
    }

    fn outcome(&self) -> Result<McOutcome> {
        let stats = self.model.sample_accumulator();
        let error_estimate = if self.model.path_generator().allows_error_estimate() {
            stats.error_estimate().ok()
        } else {
            None
        };
        let outcome = McOutcome {
            status: self.status,
            value: stats.mean()?,
            error_estimate,
            samples: stats.samples(),
        };
        debug!(
            status = %outcome.status,
            value = outcome.value,
            error = ?outcome.error_estimate,
            samples = outcome.samples,
            "Monte Carlo simulation finished"
        );
        Ok(outcome)
    }
}
