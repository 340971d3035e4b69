//! Time-stepping schemes.
//!
//! A scheme advances the solution from `t` to `t - dt` (backward pricing)
//! or, with the same arithmetic, a density from `t - dt` to `t` (forward
//! equations).  The operator's coefficients are frozen on
//! `[max(0, t - dt), t]` before each step.
//!
//! The splitting schemes treat each direction implicitly in turn and the
//! mixed derivative explicitly:
//!
//! * Douglas: `Y₀ = a + dt·L a`, `Yᵢ = Yᵢ₋₁ + θ dt Lᵢ (Yᵢ - a)`
//! * Craig-Sneyd: Douglas, then a correction of the mixed term
//! * Hundsdorfer-Verwer: Douglas, then a correction of the full operator

use crate::finite_differences::boundary::{after_applying, after_solving, FdmDirichletBoundary};
use crate::finite_differences::operators::FdmLinearOpComposite;
use ql_core::{errors::Result, fail, Real, Size, Time};
use ql_math::Array;

/// Family of a time-stepping scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FdmSchemeType {
    /// Douglas ADI.
    Douglas,
    /// Hundsdorfer-Verwer ADI.
    Hundsdorfer,
    /// Craig-Sneyd ADI.
    CraigSneyd,
    /// Fully implicit Euler.
    ImplicitEuler,
    /// Explicit Euler.
    ExplicitEuler,
    /// Crank-Nicolson θ-scheme.
    CrankNicolson,
}

/// Scheme family with its `θ` and `μ` parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FdmSchemeDesc {
    /// Scheme family.
    pub scheme_type: FdmSchemeType,
    /// Implicitness.
    pub theta: Real,
    /// Weight of the correction step.
    pub mu: Real,
}

impl FdmSchemeDesc {
    /// Douglas with `θ = ½`.
    pub fn douglas() -> Self {
        Self { scheme_type: FdmSchemeType::Douglas, theta: 0.5, mu: 0.0 }
    }

    /// Hundsdorfer-Verwer with `θ = ½ + √3/6`, `μ = ½`.
    pub fn hundsdorfer() -> Self {
        Self {
            scheme_type: FdmSchemeType::Hundsdorfer,
            theta: 0.5 + 3.0_f64.sqrt() / 6.0,
            mu: 0.5,
        }
    }

    /// Hundsdorfer-Verwer with `θ = 1 - √2/2`, `μ = ½`.
    pub fn modified_hundsdorfer() -> Self {
        Self {
            scheme_type: FdmSchemeType::Hundsdorfer,
            theta: 1.0 - 2.0_f64.sqrt() / 2.0,
            mu: 0.5,
        }
    }

    /// Craig-Sneyd with `θ = ½`, `μ = ½`.
    pub fn craig_sneyd() -> Self {
        Self { scheme_type: FdmSchemeType::CraigSneyd, theta: 0.5, mu: 0.5 }
    }

    /// Crank-Nicolson.
    pub fn crank_nicolson() -> Self {
        Self { scheme_type: FdmSchemeType::CrankNicolson, theta: 0.5, mu: 0.0 }
    }

    /// Implicit Euler.
    pub fn implicit_euler() -> Self {
        Self { scheme_type: FdmSchemeType::ImplicitEuler, theta: 0.0, mu: 0.0 }
    }

    /// Explicit Euler.
    pub fn explicit_euler() -> Self {
        Self { scheme_type: FdmSchemeType::ExplicitEuler, theta: 0.0, mu: 0.0 }
    }

    pub(crate) fn build(&self) -> Box<dyn FdmScheme> {
        match self.scheme_type {
            FdmSchemeType::Douglas => Box::new(DouglasScheme::new(self.theta)),
            FdmSchemeType::Hundsdorfer => Box::new(HundsdorferScheme::new(self.theta, self.mu)),
            FdmSchemeType::CraigSneyd => Box::new(CraigSneydScheme::new(self.theta, self.mu)),
            FdmSchemeType::ImplicitEuler => Box::new(ImplicitEulerScheme::new()),
            FdmSchemeType::ExplicitEuler => Box::new(ExplicitEulerScheme::new()),
            FdmSchemeType::CrankNicolson => Box::new(CrankNicolsonScheme::new(self.theta)),
        }
    }
}

impl Default for FdmSchemeDesc {
    fn default() -> Self {
        Self::douglas()
    }
}

/// One time step of a PDE discretisation.
pub trait FdmScheme: std::fmt::Debug + Send {
    /// Set the step size used by [`step`](Self::step).
    fn set_step(&mut self, dt: Time);

    /// Advance `a` over `[t - dt, t]`.
    fn step(
        &mut self,
        op: &mut dyn FdmLinearOpComposite,
        bcs: &[FdmDirichletBoundary],
        a: &mut Array,
        t: Time,
    ) -> Result<()>;
}

fn freeze(op: &mut dyn FdmLinearOpComposite, t: Time, dt: Time) -> Result<()> {
    op.set_time((t - dt).max(0.0), t)
}

// ─── Euler family ─────────────────────────────────────────────────────────────

/// `a ← a + dt·L a`.
#[derive(Debug, Clone, Default)]
pub struct ExplicitEulerScheme {
    dt: Time,
}

impl ExplicitEulerScheme {
    /// New scheme; the step is set later.
    pub fn new() -> Self {
        Self::default()
    }

    fn partial_step(
        &self,
        op: &mut dyn FdmLinearOpComposite,
        bcs: &[FdmDirichletBoundary],
        a: &mut Array,
        t: Time,
        theta: Real,
    ) -> Result<()> {
        freeze(op, t, self.dt)?;
        let la = op.apply(a);
        a.axpy(theta * self.dt, &la);
        after_applying(bcs, a);
        Ok(())
    }
}

impl FdmScheme for ExplicitEulerScheme {
    fn set_step(&mut self, dt: Time) {
        self.dt = dt;
    }

    fn step(
        &mut self,
        op: &mut dyn FdmLinearOpComposite,
        bcs: &[FdmDirichletBoundary],
        a: &mut Array,
        t: Time,
    ) -> Result<()> {
        self.partial_step(op, bcs, a, t, 1.0)
    }
}

/// Solves `(I - dt·L) x = a`; multi-directional operators go through
/// preconditioned BiCGStab.
#[derive(Debug, Clone)]
pub struct ImplicitEulerScheme {
    dt: Time,
    relative_tolerance: Real,
    max_iterations: Size,
}

impl Default for ImplicitEulerScheme {
    fn default() -> Self {
        Self {
            dt: 0.0,
            relative_tolerance: 1e-8,
            max_iterations: 200,
        }
    }
}

impl ImplicitEulerScheme {
    /// New scheme; the step is set later.
    pub fn new() -> Self {
        Self::default()
    }

    fn partial_step(
        &self,
        op: &mut dyn FdmLinearOpComposite,
        bcs: &[FdmDirichletBoundary],
        a: &mut Array,
        t: Time,
        theta: Real,
    ) -> Result<()> {
        freeze(op, t, self.dt)?;
        let s = theta * self.dt;
        let mut x = if op.size() == 1 {
            op.solve_splitting(0, a, s)?
        } else {
            let op: &dyn FdmLinearOpComposite = op;
            bicgstab(
                |v| v - &(op.apply(v) * s),
                |v| op.preconditioner(v, s),
                a,
                self.relative_tolerance,
                self.max_iterations,
            )?
        };
        after_solving(bcs, &mut x);
        *a = x;
        Ok(())
    }
}

impl FdmScheme for ImplicitEulerScheme {
    fn set_step(&mut self, dt: Time) {
        self.dt = dt;
    }

    fn step(
        &mut self,
        op: &mut dyn FdmLinearOpComposite,
        bcs: &[FdmDirichletBoundary],
        a: &mut Array,
        t: Time,
    ) -> Result<()> {
        self.partial_step(op, bcs, a, t, 1.0)
    }
}

/// θ-weighted explicit then implicit Euler.
#[derive(Debug, Clone)]
pub struct CrankNicolsonScheme {
    theta: Real,
    explicit: ExplicitEulerScheme,
    implicit: ImplicitEulerScheme,
}

impl CrankNicolsonScheme {
    /// Scheme with implicitness `theta`.
    pub fn new(theta: Real) -> Self {
        Self {
            theta,
            explicit: ExplicitEulerScheme::new(),
            implicit: ImplicitEulerScheme::new(),
        }
    }
}

impl FdmScheme for CrankNicolsonScheme {
    fn set_step(&mut self, dt: Time) {
        self.explicit.set_step(dt);
        self.implicit.set_step(dt);
    }

    fn step(
        &mut self,
        op: &mut dyn FdmLinearOpComposite,
        bcs: &[FdmDirichletBoundary],
        a: &mut Array,
        t: Time,
    ) -> Result<()> {
        if self.theta != 1.0 {
            self.explicit.partial_step(op, bcs, a, t, 1.0 - self.theta)?;
        }
        if self.theta != 0.0 {
            self.implicit.partial_step(op, bcs, a, t, self.theta)?;
        }
        Ok(())
    }
}

// ─── ADI family ───────────────────────────────────────────────────────────────

/// Implicit sweeps `yᵢ = (I - θ dt Lᵢ)⁻¹ (y - θ dt Lᵢ base)` over every
/// direction.
fn directional_sweeps(
    op: &dyn FdmLinearOpComposite,
    bcs: &[FdmDirichletBoundary],
    y: &mut Array,
    base: &Array,
    theta: Real,
    dt: Time,
) -> Result<()> {
    for direction in 0..op.size() {
        let rhs = &*y - &(op.apply_direction(direction, base) * (theta * dt));
        *y = op.solve_splitting(direction, &rhs, theta * dt)?;
        after_solving(bcs, y);
    }
    Ok(())
}

/// Douglas ADI.
#[derive(Debug, Clone)]
pub struct DouglasScheme {
    theta: Real,
    dt: Time,
}

impl DouglasScheme {
    /// Scheme with implicitness `theta`.
    pub fn new(theta: Real) -> Self {
        Self { theta, dt: 0.0 }
    }
}

impl FdmScheme for DouglasScheme {
    fn set_step(&mut self, dt: Time) {
        self.dt = dt;
    }

    fn step(
        &mut self,
        op: &mut dyn FdmLinearOpComposite,
        bcs: &[FdmDirichletBoundary],
        a: &mut Array,
        t: Time,
    ) -> Result<()> {
        freeze(op, t, self.dt)?;
        let mut y = &*a + &(op.apply(a) * self.dt);
        after_applying(bcs, &mut y);
        directional_sweeps(&*op, bcs, &mut y, a, self.theta, self.dt)?;
        *a = y;
        Ok(())
    }
}

/// Craig-Sneyd ADI.
#[derive(Debug, Clone)]
pub struct CraigSneydScheme {
    theta: Real,
    mu: Real,
    dt: Time,
}

impl CraigSneydScheme {
    /// Scheme with implicitness `theta` and mixed-term weight `mu`.
    pub fn new(theta: Real, mu: Real) -> Self {
        Self { theta, mu, dt: 0.0 }
    }
}

impl FdmScheme for CraigSneydScheme {
    fn set_step(&mut self, dt: Time) {
        self.dt = dt;
    }

    fn step(
        &mut self,
        op: &mut dyn FdmLinearOpComposite,
        bcs: &[FdmDirichletBoundary],
        a: &mut Array,
        t: Time,
    ) -> Result<()> {
        freeze(op, t, self.dt)?;
        let y0 = &*a + &(op.apply(a) * self.dt);
        let mut y = y0.clone();
        after_applying(bcs, &mut y);
        directional_sweeps(&*op, bcs, &mut y, a, self.theta, self.dt)?;

        let diff = &y - &*a;
        let mut yt = &y0 + &(op.apply_mixed(&diff) * (self.mu * self.dt));
        after_applying(bcs, &mut yt);
        directional_sweeps(&*op, bcs, &mut yt, a, self.theta, self.dt)?;
        *a = yt;
        Ok(())
    }
}

/// Hundsdorfer-Verwer ADI.
#[derive(Debug, Clone)]
pub struct HundsdorferScheme {
    theta: Real,
    mu: Real,
    dt: Time,
}

impl HundsdorferScheme {
    /// Scheme with implicitness `theta` and correction weight `mu`.
    pub fn new(theta: Real, mu: Real) -> Self {
        Self { theta, mu, dt: 0.0 }
    }
}

impl FdmScheme for HundsdorferScheme {
    fn set_step(&mut self, dt: Time) {
        self.dt = dt;
    }

    fn step(
        &mut self,
        op: &mut dyn FdmLinearOpComposite,
        bcs: &[FdmDirichletBoundary],
        a: &mut Array,
        t: Time,
    ) -> Result<()> {
        freeze(op, t, self.dt)?;
        let y0 = &*a + &(op.apply(a) * self.dt);
        let mut y = y0.clone();
        after_applying(bcs, &mut y);
        directional_sweeps(&*op, bcs, &mut y, a, self.theta, self.dt)?;

        let diff = &y - &*a;
        let mut yt = &y0 + &(op.apply(&diff) * (self.mu * self.dt));
        after_applying(bcs, &mut yt);
        let base = y.clone();
        directional_sweeps(&*op, bcs, &mut yt, &base, self.theta, self.dt)?;
        *a = yt;
        Ok(())
    }
}

// ─── Krylov solver ────────────────────────────────────────────────────────────

/// Right-preconditioned BiCGStab for `A x = b`, started from `x = b`.
///
/// Fails with a runtime error when the relative residual does not drop
/// below `tolerance` within `max_iterations`.
pub fn bicgstab<A, M>(apply: A, preconditioner: M, b: &Array, tolerance: Real, max_iterations: Size) -> Result<Array>
where
    A: Fn(&Array) -> Array,
    M: Fn(&Array) -> Result<Array>,
{
    let b_norm = b.norm();
    if b_norm == 0.0 {
        return Ok(Array::zeros(b.len()));
    }
    let mut x = b.clone();
    let mut r = b - &apply(&x);
    let r_tilde = r.clone();
    let mut p = Array::zeros(b.len());
    let mut v = Array::zeros(b.len());
    let (mut rho, mut alpha, mut omega) = (1.0, 1.0, 1.0);

    if r.norm() <= tolerance * b_norm {
        return Ok(x);
    }
    for _ in 0..max_iterations {
        let rho_new = r_tilde.dot(&r);
        if rho_new == 0.0 {
            fail!("BiCGStab breakdown: rho = 0");
        }
        let beta = (rho_new / rho) * (alpha / omega);
        p = &r + &((&p - &(&v * omega)) * beta);
        let p_hat = preconditioner(&p)?;
        v = apply(&p_hat);
        alpha = rho_new / r_tilde.dot(&v);
        let s = &r - &(&v * alpha);
        if s.norm() <= tolerance * b_norm {
            x.axpy(alpha, &p_hat);
            return Ok(x);
        }
        let s_hat = preconditioner(&s)?;
        let t = apply(&s_hat);
        omega = t.dot(&s) / t.dot(&t);
        x.axpy(alpha, &p_hat);
        x.axpy(omega, &s_hat);
        r = &s - &(&t * omega);
        if r.norm() <= tolerance * b_norm {
            return Ok(x);
        }
        rho = rho_new;
    }
    fail!("BiCGStab did not converge within {max_iterations} iterations")
}
