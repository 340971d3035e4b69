//! Finite-difference Black-Scholes engine for vanilla options.
//!
//! Solves the backward pricing PDE in log-spot on an
//! [`FdmBlackScholesMesher`] concentrated at the strike.  European,
//! American and Bermudan exercise are supported, cash dividends are
//! applied as jumps of the spot, and a local volatility surface in the
//! context replaces the Black volatility when enabled.

use crate::context::PricingContext;
use ql_core::{ensure, errors::Result, Real, Size};
use ql_instruments::{PricingEngine, PricingResults, VanillaOptionArguments};
use ql_methods::finite_differences::{
    log_inner_values, Fdm1DimSolver, Fdm1dMesher, FdmBlackScholesMesher, FdmBlackScholesMesherParams,
    FdmBlackScholesOp, FdmMesherComposite, FdmSchemeDesc, FdmSolverDesc, FdmStepConditionComposite,
    LocalVolRndCalculator, LocalVolRndSettings,
};
use std::sync::Arc;
use tracing::debug;

/// Grid and scheme of the one-dimensional Black-Scholes engines.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FdBlackScholesSettings {
    /// Time steps.
    pub t_grid: Size,
    /// Log-spot grid points.
    pub x_grid: Size,
    /// Implicit Euler sub-steps after each stopping time.
    pub damping_steps: Size,
    /// Time-stepping scheme.
    pub scheme: FdmSchemeDesc,
    /// Use the local volatility surface of the context when present.
    pub local_vol: bool,
}

impl Default for FdBlackScholesSettings {
    fn default() -> Self {
        Self {
            t_grid: 100,
            x_grid: 100,
            damping_steps: 0,
            scheme: FdmSchemeDesc::douglas(),
            local_vol: false,
        }
    }
}

impl FdBlackScholesSettings {
    pub(crate) fn validate(&self) -> Result<()> {
        ensure!(self.t_grid > 0, "at least one time step is required");
        ensure!(self.x_grid >= 4, "x grid needs at least four points, got {}", self.x_grid);
        Ok(())
    }

    pub(crate) fn process(&self, context: &PricingContext) -> Result<ql_processes::GeneralizedBlackScholesProcess> {
        if self.local_vol {
            context.black_scholes_process()
        } else {
            context.black_process()
        }
    }
}

/// Value and greeks of a one-dimensional solution at `spot`.
pub(crate) fn spot_results(solver: &Fdm1DimSolver, spot: Real) -> PricingResults {
    let x = spot.ln();
    let dx = solver.derivative_x(x);
    let mut results = PricingResults::from_value(solver.interpolate_at(x));
    results.delta = Some(dx / spot);
    results.gamma = Some((solver.derivative_xx(x) - dx) / (spot * spot));
    results.theta = Some(solver.theta_at(x));
    results
}

/// Finite-difference engine for vanilla options.
#[derive(Debug, Clone)]
pub struct FdBlackScholesVanillaEngine {
    settings: FdBlackScholesSettings,
    density_mesher: Option<LocalVolRndSettings>,
}

impl FdBlackScholesVanillaEngine {
    /// Engine with validated settings.
    pub fn new(settings: FdBlackScholesSettings) -> Result<Self> {
        settings.validate()?;
        Ok(Self {
            settings,
            density_mesher: None,
        })
    }

    /// Under local volatility, take the log-spot grid from the forward
    /// risk-neutral density at maturity instead of the quantile mesher.
    pub fn with_density_mesher(mut self, settings: LocalVolRndSettings) -> Self {
        self.density_mesher = Some(settings);
        self
    }

    /// The grid settings.
    pub fn settings(&self) -> &FdBlackScholesSettings {
        &self.settings
    }
}

impl PricingEngine<VanillaOptionArguments, PricingContext> for FdBlackScholesVanillaEngine {
    fn calculate(&self, args: &VanillaOptionArguments, context: &PricingContext) -> Result<PricingResults> {
        let args = context.rebase_vanilla(args)?;
        let maturity = args.maturity();
        let strike = args.payoff.strike();
        let process = self.settings.process(context)?;
        let spot = process.spot();

        let mut rescale_steps = None;
        let x_mesher: Arc<dyn Fdm1dMesher> = match (process.local_volatility(), self.density_mesher) {
            (Some(local_vol), Some(rnd)) => {
                ensure!(
                    args.dividends.is_empty(),
                    "the density mesher does not support cash dividends"
                );
                let calculator = LocalVolRndCalculator::new(
                    spot,
                    Arc::clone(context.risk_free()),
                    Arc::clone(context.dividend()),
                    Arc::clone(local_vol),
                    maturity,
                    rnd,
                )?;
                rescale_steps = Some(calculator.rescale_time_steps().iter().map(|&i| i as Real).collect::<Vec<_>>());
                calculator.mesher(maturity)?
            }
            _ => {
                let params = FdmBlackScholesMesherParams {
                    concentration: Some((strike, 0.1)),
                    ..FdmBlackScholesMesherParams::default()
                };
                Arc::new(FdmBlackScholesMesher::new(
                    self.settings.x_grid,
                    &process,
                    maturity,
                    strike,
                    &args.dividends,
                    &params,
                )?)
            }
        };
        let mesher = Arc::new(FdmMesherComposite::from_1d(x_mesher)?);

        let desc = FdmSolverDesc {
            mesher: Arc::clone(&mesher),
            bcs: Vec::new(),
            condition: FdmStepConditionComposite::vanilla(&args.dividends, &args.exercise, &mesher, &args.payoff, 0),
            terminal_values: log_inner_values(&mesher, &args.payoff, 0),
            maturity,
            time_steps: self.settings.t_grid,
            damping_steps: self.settings.damping_steps,
        };
        let op = FdmBlackScholesOp::new(Arc::clone(&mesher), &process, strike);
        let solver = Fdm1DimSolver::solve(desc, self.settings.scheme, Box::new(op))?;

        let mut results = spot_results(&solver, spot);
        debug!(
            value = results.value,
            x_grid = mesher.layout().size(),
            t_grid = self.settings.t_grid,
            exercise = ?args.exercise.exercise_type(),
            "vanilla grid solved"
        );
        if let Some(steps) = rescale_steps {
            results.insert("rescaleTimeSteps", steps);
        }
        Ok(results)
    }
}

/// Builder of [`FdBlackScholesVanillaEngine`].
#[derive(Debug, Clone, Default)]
pub struct MakeFdBlackScholesVanillaEngine {
    settings: FdBlackScholesSettings,
    density_mesher: Option<LocalVolRndSettings>,
}

impl MakeFdBlackScholesVanillaEngine {
    /// Builder with the default grid.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of time steps.
    pub fn with_t_grid(mut self, t_grid: Size) -> Self {
        self.settings.t_grid = t_grid;
        self
    }

    /// Number of log-spot points.
    pub fn with_x_grid(mut self, x_grid: Size) -> Self {
        self.settings.x_grid = x_grid;
        self
    }

    /// Damping sub-steps after each stopping time.
    pub fn with_damping_steps(mut self, damping_steps: Size) -> Self {
        self.settings.damping_steps = damping_steps;
        self
    }

    /// Time-stepping scheme.
    pub fn with_fdm_scheme_desc(mut self, scheme: FdmSchemeDesc) -> Self {
        self.settings.scheme = scheme;
        self
    }

    /// Price under the local volatility surface of the context.
    pub fn with_local_vol(mut self, local_vol: bool) -> Self {
        self.settings.local_vol = local_vol;
        self
    }

    /// Log-spot grid from the local volatility density.
    pub fn with_density_mesher(mut self, settings: LocalVolRndSettings) -> Self {
        self.density_mesher = Some(settings);
        self
    }

    /// Validate the settings and create the engine.
    pub fn build(self) -> Result<FdBlackScholesVanillaEngine> {
        let engine = FdBlackScholesVanillaEngine::new(self.settings)?;
        Ok(match self.density_mesher {
            Some(rnd) => engine.with_density_mesher(rnd),
            None => engine,
        })
    }
}
