//! Error types.
//!
//! A single `thiserror`-derived enum covers the whole workspace.  Invalid
//! input is a [`Error::Precondition`], an unsupported model regime is a
//! [`Error::ModelDomain`], and internal numerical failures are
//! [`Error::Runtime`].  "Did not converge within budget" for Monte Carlo
//! loops is *not* an error: drivers report it through a status value.

use thiserror::Error;

/// The top-level error type used throughout the workspace.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    /// General runtime error, e.g. a solver exhausting its evaluations.
    #[error("{0}")]
    Runtime(String),

    /// Precondition violated: invalid input detected at the call site.
    #[error("precondition not satisfied: {0}")]
    Precondition(String),

    /// Postcondition violated.
    #[error("postcondition not satisfied: {0}")]
    Postcondition(String),

    /// The requested model regime is not supported (hard failure).
    #[error("unsupported model domain: {0}")]
    ModelDomain(String),

    /// An operation was requested on a null / unset value.
    #[error("null value")]
    NullValue,

    /// Index out of range.
    #[error("index ({index}) out of range [0, {size})")]
    IndexOutOfRange {
        /// The index that was out of range.
        index: usize,
        /// The size of the container.
        size: usize,
    },

    /// Invalid argument.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Not implemented.
    #[error("not implemented: {0}")]
    NotImplemented(String),
}

impl Error {
    /// `true` for errors caused by the caller's input.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Error::Precondition(_) | Error::InvalidArgument(_) | Error::IndexOutOfRange { .. }
        )
    }
}

/// Shorthand `Result` type used throughout the workspace.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Returns `Err(Error::Precondition(...))` if `$cond` is false.
///
/// # Example
/// ```
/// use ql_core::{ensure, errors::Error};
/// fn positive(x: f64) -> ql_core::errors::Result<f64> {
///     ensure!(x > 0.0, "x must be positive, got {x}");
///     Ok(x)
/// }
/// assert!(positive(1.0).is_ok());
/// assert!(positive(-1.0).is_err());
/// ```
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $($msg:tt)*) => {
        if !$cond {
            return Err($crate::errors::Error::Precondition(
                format!($($msg)*)
            ));
        }
    };
}

/// Returns `Err(Error::Postcondition(...))` if `$cond` is false.
///
/// # Example
/// ```
/// use ql_core::{ensure_post, errors::Error};
/// fn compute(x: f64) -> ql_core::errors::Result<f64> {
///     let result = x * 2.0;
///     ensure_post!(result > 0.0, "result must be positive, got {result}");
///     Ok(result)
/// }
/// assert!(compute(1.0).is_ok());
/// assert!(compute(-1.0).is_err());
/// ```
#[macro_export]
macro_rules! ensure_post {
    ($cond:expr, $($msg:tt)*) => {
        if !$cond {
            return Err($crate::errors::Error::Postcondition(
                format!($($msg)*)
            ));
        }
    };
}

/// Returns `Err(Error::Runtime(...))` immediately.
///
/// # Example
/// ```
/// use ql_core::{fail, errors::Error};
/// fn always_err() -> ql_core::errors::Result<()> {
///     fail!("something went wrong");
/// }
/// assert!(always_err().is_err());
/// ```
#[macro_export]
macro_rules! fail {
    ($($msg:tt)*) => {
        return Err($crate::errors::Error::Runtime(format!($($msg)*)))
    };
}

/// Returns `Err(Error::ModelDomain(...))` immediately.
///
/// # Example
/// ```
/// use ql_core::{fail_domain, errors::Error};
/// fn double_boundary(r: f64, q: f64) -> ql_core::errors::Result<()> {
///     if r < 0.0 && q < r {
///         fail_domain!("double-boundary case r={r}, q={q} is not supported");
///     }
///     Ok(())
/// }
/// assert!(matches!(double_boundary(-0.01, -0.02), Err(Error::ModelDomain(_))));
/// ```
#[macro_export]
macro_rules! fail_domain {
    ($($msg:tt)*) => {
        return Err($crate::errors::Error::ModelDomain(format!($($msg)*)))
    };
}
