//! One-dimensional root finders.
//!
//! Every solver works against an explicit evaluation budget: exhausting
//! it is reported as [`Error::Runtime`], never as a silent best guess.
//! Bracketing methods ([`Solver1D::brent`], [`Solver1D::ridder`],
//! [`Solver1D::bisection`]) require a sign change over `[x_min, x_max]`.

use ql_core::{ensure, errors::Error, Real, Result};

/// Default number of function evaluations.
pub const DEFAULT_MAX_EVALUATIONS: usize = 100;

/// Accuracy and evaluation budget shared by all solvers.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Solver1D {
    /// Absolute accuracy on `x`.
    pub accuracy: Real,
    /// Hard cap on function evaluations.
    pub max_evaluations: usize,
}

impl Default for Solver1D {
    fn default() -> Self {
        Self {
            accuracy: 1e-11,
            max_evaluations: DEFAULT_MAX_EVALUATIONS,
        }
    }
}

/// A bracketing or derivative-based solve result.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Root {
    /// Located root.
    pub x: Real,
    /// Function evaluations spent.
    pub evaluations: usize,
}

fn exhausted(name: &str, n: usize) -> Error {
    Error::Runtime(format!(
        "{name}: maximum number of function evaluations ({n}) exceeded"
    ))
}

impl Solver1D {
    /// Solver with the given accuracy and evaluation cap.
    pub fn new(accuracy: Real, max_evaluations: usize) -> Result<Self> {
        ensure!(accuracy > 0.0, "accuracy must be positive, got {accuracy}");
        ensure!(max_evaluations > 0, "evaluation budget must be positive");
        Ok(Self {
            accuracy,
            max_evaluations,
        })
    }

    /// Brent's method: inverse quadratic interpolation safeguarded by
    /// bisection.
    pub fn brent<F>(&self, f: F, x_min: Real, x_max: Real) -> Result<Root>
    where
        F: Fn(Real) -> Real,
    {
        let (mut a, mut b) = (x_min, x_max);
        let (mut fa, mut fb) = (f(a), f(b));
        let mut evals = 2;
        ensure!(
            fa * fb <= 0.0,
            "root not bracketed: f({a})={fa}, f({b})={fb}"
        );
        if fa == 0.0 {
            return Ok(Root { x: a, evaluations: evals });
        }
        if fb == 0.0 {
            return Ok(Root { x: b, evaluations: evals });
        }

        let (mut c, mut fc) = (b, fb);
        let mut d = b - a;
        let mut e = d;
        while evals <= self.max_evaluations {
            if fb * fc > 0.0 {
                c = a;
                fc = fa;
                d = b - a;
                e = d;
            }
            if fc.abs() < fb.abs() {
                (a, b, c) = (b, c, b);
                (fa, fb, fc) = (fb, fc, fb);
            }
            let tol = 2.0 * Real::EPSILON * b.abs() + 0.5 * self.accuracy;
            let xm = 0.5 * (c - b);
            if xm.abs() <= tol || fb == 0.0 {
                return Ok(Root { x: b, evaluations: evals });
            }
            if e.abs() >= tol && fa.abs() > fb.abs() {
                let s = fb / fa;
                let (mut p, mut q) = if a == c {
                    (2.0 * xm * s, 1.0 - s)
                } else {
                    let qq = fa / fc;
                    let r = fb / fc;
                    (
                        s * (2.0 * xm * qq * (qq - r) - (b - a) * (r - 1.0)),
                        (qq - 1.0) * (r - 1.0) * (s - 1.0),
                    )
                };
                if p > 0.0 {
                    q = -q;
                }
                p = p.abs();
                let min1 = 3.0 * xm * q - (tol * q).abs();
                let min2 = (e * q).abs();
                if 2.0 * p < min1.min(min2) {
                    e = d;
                    d = p / q;
                } else {
                    d = xm;
                    e = d;
                }
            } else {
                d = xm;
                e = d;
            }
            a = b;
            fa = fb;
            b += if d.abs() > tol { d } else { tol.copysign(xm) };
            fb = f(b);
            evals += 1;
        }
        Err(exhausted("Brent", self.max_evaluations))
    }

    /// Ridder's exponential-fit bracketing method.
    pub fn ridder<F>(&self, f: F, x_min: Real, x_max: Real) -> Result<Root>
    where
        F: Fn(Real) -> Real,
    {
        let (mut xl, mut xh) = (x_min, x_max);
        let (mut fl, mut fh) = (f(xl), f(xh));
        let mut evals = 2;
        ensure!(
            fl * fh <= 0.0,
            "root not bracketed: f({xl})={fl}, f({xh})={fh}"
        );
        if fl == 0.0 {
            return Ok(Root { x: xl, evaluations: evals });
        }
        if fh == 0.0 {
            return Ok(Root { x: xh, evaluations: evals });
        }
        let mut root = Real::MAX;
        while evals <= self.max_evaluations {
            let xm = 0.5 * (xl + xh);
            let fm = f(xm);
            let s = (fm * fm - fl * fh).sqrt();
            evals += 1;
            if s == 0.0 {
                return Ok(Root { x: root.min(xm), evaluations: evals });
            }
            let x_new = xm + (xm - xl) * (if fl >= fh { 1.0 } else { -1.0 }) * fm / s;
            if (x_new - root).abs() <= 0.5 * self.accuracy {
                return Ok(Root { x: x_new, evaluations: evals });
            }
            root = x_new;
            let fr = f(root);
            evals += 1;
            if fr == 0.0 {
                return Ok(Root { x: root, evaluations: evals });
            }
            if fm.copysign(fr) != fm {
                xl = xm;
                fl = fm;
                xh = root;
                fh = fr;
            } else if fl.copysign(fr) != fl {
                xh = root;
                fh = fr;
            } else {
                xl = root;
                fl = fr;
            }
            if (xh - xl).abs() <= 0.5 * self.accuracy {
                return Ok(Root { x: root, evaluations: evals });
            }
        }
        Err(exhausted("Ridder", self.max_evaluations))
    }

    /// Plain bisection.
    pub fn bisection<F>(&self, f: F, x_min: Real, x_max: Real) -> Result<Root>
    where
        F: Fn(Real) -> Real,
    {
        let (mut a, mut b) = (x_min, x_max);
        let fa = f(a);
        let fb = f(b);
        let mut evals = 2;
        ensure!(fa * fb <= 0.0, "root not bracketed: f({a})={fa}, f({b})={fb}");
        if fa == 0.0 {
            return Ok(Root { x: a, evaluations: evals });
        }
        if fb == 0.0 {
            return Ok(Root { x: b, evaluations: evals });
        }
        let rising = fa < 0.0;
        while evals <= self.max_evaluations {
            let mid = 0.5 * (a + b);
            let fm = f(mid);
            evals += 1;
            if fm == 0.0 || 0.5 * (b - a).abs() < self.accuracy {
                return Ok(Root { x: mid, evaluations: evals });
            }
            if (fm < 0.0) == rising {
                a = mid;
            } else {
                b = mid;
            }
        }
        Err(exhausted("Bisection", self.max_evaluations))
    }

    /// Newton-Raphson on `f_df(x) = (f, f')`, falling back to a bisection
    /// step whenever the Newton step leaves `[x_min, x_max]`.
    pub fn newton<F>(&self, f_df: F, guess: Real, x_min: Real, x_max: Real) -> Result<Root>
    where
        F: Fn(Real) -> (Real, Real),
    {
        ensure!(x_min < x_max, "invalid range [{x_min}, {x_max}]");
        let (mut lo, mut hi) = (x_min, x_max);
        let mut x = guess.clamp(x_min, x_max);
        let mut evals = 0;
        while evals < self.max_evaluations {
            let (fx, dfx) = f_df(x);
            evals += 1;
            if fx == 0.0 {
                return Ok(Root { x, evaluations: evals });
            }
            // shrink the bracket on the side the function sign indicates
            // (only meaningful for monotone f, harmless otherwise)
            if fx > 0.0 && dfx > 0.0 || fx < 0.0 && dfx < 0.0 {
                hi = x;
            } else {
                lo = x;
            }
            let mut x_new = if dfx != 0.0 { x - fx / dfx } else { Real::NAN };
            if !(x_new > lo && x_new < hi) {
                x_new = 0.5 * (lo + hi);
            }
            if (x_new - x).abs() < self.accuracy {
                return Ok(Root { x: x_new, evaluations: evals });
            }
            x = x_new;
        }
        Err(exhausted("Newton", self.max_evaluations))
    }

    /// Halley's method on `f(x) = (f, f', f'')`, clamped to
    /// `[x_min, x_max]`.
    pub fn halley<F>(&self, f: F, guess: Real, x_min: Real, x_max: Real) -> Result<Root>
    where
        F: Fn(Real) -> (Real, Real, Real),
    {
        let mut x = guess.clamp(x_min, x_max);
        let mut evals = 0;
        while evals < self.max_evaluations {
            let (fx, dfx, d2fx) = f(x);
            evals += 1;
            if fx == 0.0 {
                return Ok(Root { x, evaluations: evals });
            }
            ensure!(dfx != 0.0, "Halley: vanishing derivative at x={x}");
            let denom = 2.0 * dfx * dfx - fx * d2fx;
            let step = if denom != 0.0 {
                2.0 * fx * dfx / denom
            } else {
                fx / dfx
            };
            let x_new = (x - step).clamp(x_min, x_max);
            if (x_new - x).abs() < self.accuracy {
                return Ok(Root { x: x_new, evaluations: evals });
            }
            x = x_new;
        }
        Err(exhausted("Halley", self.max_evaluations))
    }
}
