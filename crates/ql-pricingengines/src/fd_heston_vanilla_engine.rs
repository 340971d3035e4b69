//! Finite-difference Heston engine for vanilla options.
//!
//! The pricing PDE is solved on a log-spot × variance grid with an ADI
//! scheme.  Solved grids are kept in a [`SolverCache`] keyed by every
//! input of the solve; the cache is registered with the spot quote of
//! each context it has seen and is cleared when that quote moves.
//!
//! With [`FdHestonVanillaEngine::with_multiple_strikes`] one grid serves
//! every plain vanilla strike of the list.  The model is homogeneous in
//! spot and strike, so with `d = K_ref / K`
//!
//! $$V(S, K) = V(S d, K_{ref}) / d.$$

use crate::analytic_heston_engine::HestonParameters;
use crate::context::PricingContext;
use ql_core::{ensure, errors::Result, CacheKey, Observable, Observer, Real, Size, SolverCache, Time};
use ql_instruments::{Payoff, PricingEngine, PricingResults, VanillaOptionArguments};
use ql_methods::finite_differences::{
    log_inner_values, Fdm1dMesher, Fdm2DimSolver, FdmBlackScholesMesher, FdmBlackScholesMesherParams, FdmHestonOp,
    FdmHestonVarianceMesher, FdmMesherComposite, FdmSchemeDesc, FdmSolverDesc, FdmStepConditionComposite,
};
use ql_processes::{GeneralizedBlackScholesProcess, HestonProcess};
use ql_quotes::SimpleQuote;
use ql_termstructures::BlackConstantVol;
use std::sync::{Arc, Mutex, Weak};
use tracing::debug;

/// Grid and scheme of [`FdHestonVanillaEngine`].
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FdHestonSettings {
    /// Time steps.
    pub t_grid: Size,
    /// Log-spot grid points.
    pub x_grid: Size,
    /// Variance grid points.
    pub v_grid: Size,
    /// Implicit Euler sub-steps after each stopping time.
    pub damping_steps: Size,
    /// Time-stepping scheme.
    pub scheme: FdmSchemeDesc,
}

impl Default for FdHestonSettings {
    fn default() -> Self {
        Self {
            t_grid: 100,
            x_grid: 100,
            v_grid: 50,
            damping_steps: 0,
            scheme: FdmSchemeDesc::hundsdorfer(),
        }
    }
}

const VARIANCE_EPSILON: Real = 1e-4;

/// Finite-difference Heston engine with a shared solver cache.
#[derive(Debug)]
pub struct FdHestonVanillaEngine {
    params: HestonParameters,
    settings: FdHestonSettings,
    strikes: Vec<Real>,
    cache: Arc<SolverCache<Fdm2DimSolver>>,
    observed: Mutex<Vec<Weak<SimpleQuote>>>,
}

impl FdHestonVanillaEngine {
    /// Engine for the given variance dynamics.
    pub fn new(params: HestonParameters, settings: FdHestonSettings) -> Result<Self> {
        params.validate()?;
        ensure!(settings.t_grid > 0, "at least one time step is required");
        ensure!(settings.x_grid >= 4, "x grid needs at least four points, got {}", settings.x_grid);
        ensure!(settings.v_grid >= 3, "v grid needs at least three points, got {}", settings.v_grid);
        ensure!(
            params.v0 > 0.0 || params.theta > 0.0,
            "variance dynamics without variance"
        );
        Ok(Self {
            params,
            settings,
            strikes: Vec::new(),
            cache: Arc::new(SolverCache::new()),
            observed: Mutex::new(Vec::new()),
        })
    }

    /// Share one solve between plain vanilla options on `strikes`.
    pub fn with_multiple_strikes(mut self, mut strikes: Vec<Real>) -> Result<Self> {
        ensure!(
            strikes.iter().all(|k| *k > 0.0 && k.is_finite()),
            "strikes must be positive"
        );
        strikes.sort_by(|a, b| a.total_cmp(b));
        strikes.dedup();
        self.strikes = strikes;
        Ok(self)
    }

    /// The solver cache, shared with every quote the engine observes.
    pub fn cache(&self) -> &Arc<SolverCache<Fdm2DimSolver>> {
        &self.cache
    }

    /// Clear the cache whenever `quote` changes.
    pub fn register_with(&self, quote: &Arc<SimpleQuote>) {
        let mut observed = match self.observed.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        observed.retain(|w| w.strong_count() > 0);
        if observed.iter().any(|w| std::ptr::eq(w.as_ptr(), Arc::as_ptr(quote))) {
            return;
        }
        let observer: Arc<dyn Observer> = self.cache.clone();
        quote.register_observer(Arc::downgrade(&observer));
        observed.push(Arc::downgrade(quote));
    }

    // Reference strike when the option can be read off a shared grid.
    fn reference_strike(&self, args: &VanillaOptionArguments) -> Option<Real> {
        let (first, last) = (self.strikes.first()?, self.strikes.last()?);
        let strike = match args.payoff {
            Payoff::PlainVanilla { strike, .. } => strike,
            _ => {
                debug!(payoff = args.payoff.name(), "payoff not strike-scalable, solving on its own grid");
                return None;
            }
        };
        if !args.dividends.is_empty() || strike < *first || strike > *last {
            debug!(strike, "strike outside the shared grid, solving on its own grid");
            return None;
        }
        Some(self.strikes[self.strikes.len() / 2])
    }

    fn cache_key(
        &self,
        args: &VanillaOptionArguments,
        payoff: &Payoff,
        process: &HestonProcess,
        shared: bool,
    ) -> CacheKey {
        let maturity = args.maturity();
        let HestonParameters {
            v0,
            kappa,
            theta,
            sigma,
            rho,
        } = self.params;
        let dividend_times: Vec<Time> = args.dividends.iter().map(|d| d.time).collect();
        let dividend_amounts: Vec<Real> = args.dividends.iter().map(|d| d.amount).collect();
        let FdHestonSettings {
            t_grid,
            x_grid,
            v_grid,
            damping_steps,
            scheme,
        } = self.settings;
        let mut key = CacheKey::builder()
            .tag(&format!("{:?}", args.exercise.exercise_type()))
            .reals(args.exercise.times())
            .tag(&format!("{payoff:?}"))
            .size(t_grid)
            .size(x_grid)
            .size(v_grid)
            .size(damping_steps)
            .tag(&format!("{scheme:?}"))
            .real(process.s0())
            .reals(&[v0, kappa, theta, sigma, rho])
            .real(process.risk_free_rate().discount(maturity))
            .real(process.dividend_yield().discount(maturity))
            .reals(&dividend_times)
            .reals(&dividend_amounts);
        if shared {
            key = key.tag("shared").reals(&self.strikes);
        }
        key.finish()
    }

    fn solve(
        &self,
        process: &HestonProcess,
        args: &VanillaOptionArguments,
        payoff: &Payoff,
        shared: bool,
    ) -> Result<Fdm2DimSolver> {
        let maturity = args.maturity();
        let v_mesher = FdmHestonVarianceMesher::new(self.settings.v_grid, process, maturity, VARIANCE_EPSILON)?;

        let vol = self.params.v0.sqrt().max(self.params.theta.sqrt());
        let black = GeneralizedBlackScholesProcess::new(
            process.s0(),
            Arc::clone(process.risk_free_rate()),
            Arc::clone(process.dividend_yield()),
            Arc::new(BlackConstantVol::new(vol)?),
        )?;
        let strike = payoff.strike();
        let mut params = FdmBlackScholesMesherParams {
            concentration: Some((strike, 0.1)),
            ..FdmBlackScholesMesherParams::default()
        };
        if let (true, Some(k_min), Some(k_max)) = (shared, self.strikes.first(), self.strikes.last()) {
            let base = FdmBlackScholesMesher::new(self.settings.x_grid, &black, maturity, strike, &[], &params)?;
            let locations = base.locations();
            params.x_min = Some(locations[0] + (strike / k_max).ln());
            params.x_max = Some(locations[locations.len() - 1] + (strike / k_min).ln());
        }
        let x_mesher =
            FdmBlackScholesMesher::new(self.settings.x_grid, &black, maturity, strike, &args.dividends, &params)?;
        let mesher = Arc::new(FdmMesherComposite::new(vec![
            Arc::new(x_mesher) as Arc<dyn Fdm1dMesher>,
            Arc::new(v_mesher),
        ])?);

        let desc = FdmSolverDesc {
            mesher: Arc::clone(&mesher),
            bcs: Vec::new(),
            condition: FdmStepConditionComposite::vanilla(&args.dividends, &args.exercise, &mesher, payoff, 0),
            terminal_values: log_inner_values(&mesher, payoff, 0),
            maturity,
            time_steps: self.settings.t_grid,
            damping_steps: self.settings.damping_steps,
        };
        let op = FdmHestonOp::new(Arc::clone(&mesher), process)?;
        Fdm2DimSolver::solve(desc, self.settings.scheme, Box::new(op))
    }
}

impl PricingEngine<VanillaOptionArguments, PricingContext> for FdHestonVanillaEngine {
    fn calculate(&self, args: &VanillaOptionArguments, context: &PricingContext) -> Result<PricingResults> {
        let args = context.rebase_vanilla(args)?;
        self.register_with(context.spot_quote());
        let process = self.params.process(context)?;

        let reference_strike = self.reference_strike(&args);
        let (payoff, scale) = match (reference_strike, args.payoff) {
            (Some(k_ref), Payoff::PlainVanilla { option_type, strike }) => {
                (Payoff::vanilla(option_type, k_ref), k_ref / strike)
            }
            _ => (args.payoff, 1.0),
        };
        let shared = reference_strike.is_some();
        let key = self.cache_key(&args, &payoff, &process, shared);

        let mut solved = false;
        let solver = self.cache.get_or_try_insert_with(key, || {
            solved = true;
            self.solve(&process, &args, &payoff, shared)
        })?;
        if solved {
            debug!(key = key.value(), shared, "solver cache miss, grid solved");
        } else {
            debug!(key = key.value(), shared, "solver cache hit");
        }

        let spot = process.s0() * scale;
        let (x, v0) = (spot.ln(), self.params.v0);
        let dx = solver.derivative_x(x, v0)?;
        let mut results = PricingResults::from_value(solver.interpolate_at(x, v0)? / scale);
        results.delta = Some(dx / spot);
        results.gamma = Some(scale * (solver.derivative_xx(x, v0)? - dx) / (spot * spot));
        results.theta = Some(solver.theta_at(x, v0)? / scale);
        Ok(results)
    }
}

/// Builder of [`FdHestonVanillaEngine`].
#[derive(Debug, Clone)]
pub struct MakeFdHestonVanillaEngine {
    params: HestonParameters,
    settings: FdHestonSettings,
    strikes: Vec<Real>,
}

impl MakeFdHestonVanillaEngine {
    /// Builder with the default grid.
    pub fn new(params: HestonParameters) -> Self {
        Self {
            params,
            settings: FdHestonSettings::default(),
            strikes: Vec::new(),
        }
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

    /// Number of variance points.
    pub fn with_v_grid(mut self, v_grid: Size) -> Self {
        self.settings.v_grid = v_grid;
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

    /// Share one solve between the plain vanilla options on `strikes`.
    pub fn with_multiple_strikes(mut self, strikes: Vec<Real>) -> Self {
        self.strikes = strikes;
        self
    }

    /// Validate the settings and create the engine.
    pub fn build(self) -> Result<FdHestonVanillaEngine> {
        let engine = FdHestonVanillaEngine::new(self.params, self.settings)?;
        if self.strikes.is_empty() {
            Ok(engine)
        } else {
            engine.with_multiple_strikes(self.strikes)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytic_heston_engine::AnalyticHestonEngine;
    use approx::assert_abs_diff_eq;
    use ql_instruments::{CashDividend, Exercise, OptionType};
    use ql_termstructures::FlatForward;

    const PARAMS: HestonParameters = HestonParameters {
        v0: 0.04,
        kappa: 2.5,
        theta: 0.04,
        sigma: 0.66,
        rho: -0.8,
    };

    fn context() -> PricingContext {
        PricingContext::builder()
            .spot(100.0)
            .risk_free(Arc::new(FlatForward::new(0.05)))
            .black_vol(Arc::new(BlackConstantVol::new(0.2).unwrap()))
            .build()
            .unwrap()
    }

    fn put(strike: Real, exercise: Exercise) -> VanillaOptionArguments {
        VanillaOptionArguments::new(Payoff::vanilla(OptionType::Put, strike), exercise).unwrap()
    }

    #[test]
    fn european_put_matches_the_semi_analytic_price() {
        let ctx = context();
        let engine = MakeFdHestonVanillaEngine::new(PARAMS).with_t_grid(200).build().unwrap();
        let args = put(100.0, Exercise::european(1.0).unwrap());
        let res = engine.calculate(&args, &ctx).unwrap();
        let analytic = AnalyticHestonEngine::new(PARAMS).unwrap().calculate(&args, &ctx).unwrap().value;
        assert_abs_diff_eq!(res.value, analytic, epsilon = 3e-2);
        assert_abs_diff_eq!(res.value, 5.1138, epsilon = 5e-2);
        assert_abs_diff_eq!(res.delta.unwrap(), -0.2514, epsilon = 1e-2);
        assert_abs_diff_eq!(res.gamma.unwrap(), 0.0161, epsilon = 1e-2);
    }

    #[test]
    fn cash_dividend_raises_the_put() {
        let ctx = context();
        let engine = MakeFdHestonVanillaEngine::new(PARAMS).with_t_grid(50).build().unwrap();
        let args = put(100.0, Exercise::european(1.0).unwrap()).with_dividends(vec![CashDividend::new(0.5, 5.0).unwrap()]);
        let res = engine.calculate(&args, &ctx).unwrap();
        assert_abs_diff_eq!(res.value, 6.7506, epsilon = 0.1);
    }

    #[test]
    fn american_put_dominates_the_european() {
        let ctx = context();
        let engine = FdHestonVanillaEngine::new(PARAMS, FdHestonSettings::default()).unwrap();
        let european = engine.calculate(&put(100.0, Exercise::european(1.0).unwrap()), &ctx).unwrap().value;
        let american = engine.calculate(&put(100.0, Exercise::american(0.0, 1.0).unwrap()), &ctx).unwrap().value;
        assert!(american > european + 0.1, "{american} vs {european}");
    }

    #[test]
    fn repeated_calls_hit_the_cache() {
        let ctx = context();
        let engine = FdHestonVanillaEngine::new(PARAMS, FdHestonSettings::default()).unwrap();
        let args = put(100.0, Exercise::european(1.0).unwrap());
        let first = engine.calculate(&args, &ctx).unwrap().value;
        let second = engine.calculate(&args, &ctx).unwrap().value;
        assert_eq!(first, second);
        assert_eq!((engine.cache().misses(), engine.cache().hits()), (1, 1));
    }

    #[test]
    fn multiple_strikes_share_one_grid() {
        let ctx = context();
        let strikes = vec![80.0, 90.0, 100.0, 110.0, 120.0];
        let shared = MakeFdHestonVanillaEngine::new(PARAMS)
            .with_multiple_strikes(strikes.clone())
            .build()
            .unwrap();
        let analytic = AnalyticHestonEngine::new(PARAMS).unwrap();
        for &k in &strikes {
            let args = put(k, Exercise::european(1.0).unwrap());
            let fd = shared.calculate(&args, &ctx).unwrap().value;
            let reference = analytic.calculate(&args, &ctx).unwrap().value;
            assert_abs_diff_eq!(fd, reference, epsilon = 5e-2);
        }
        assert_eq!(shared.cache().misses(), 1);
        assert_eq!(shared.cache().hits(), strikes.len() - 1);
    }

    #[test]
    fn spot_moves_clear_the_cache() {
        let ctx = context();
        let engine = FdHestonVanillaEngine::new(PARAMS, FdHestonSettings::default()).unwrap();
        let args = put(100.0, Exercise::european(1.0).unwrap());
        let before = engine.calculate(&args, &ctx).unwrap();
        engine.calculate(&args, &ctx).unwrap();
        assert_eq!(ctx.spot_quote().observers(), 1);
        assert_eq!(engine.cache().len(), 1);

        ctx.spot_quote().set_value(101.0);
        assert!(engine.cache().is_empty());
        let after = engine.calculate(&args, &ctx).unwrap();
        assert_eq!(engine.cache().misses(), 2);
        assert_abs_diff_eq!(after.value - before.value, before.delta.unwrap(), epsilon = 2e-2);
    }

    #[test]
    fn invalid_dynamics_are_rejected() {
        let params = HestonParameters { sigma: 0.0, ..PARAMS };
        assert!(MakeFdHestonVanillaEngine::new(params).build().is_err());
        assert!(MakeFdHestonVanillaEngine::new(PARAMS).with_v_grid(2).build().is_err());
    }
}
