//! `Quote` trait and `SimpleQuote` implementation.

use std::sync::{RwLock, Weak};

use ql_core::{
    errors::{Error, Result},
    Observable, ObservableImpl, Observer, Real,
};

/// A market-observable value.
pub trait Quote: std::fmt::Debug + Send + Sync {
    /// Return the current value, or `None` if the quote is not set.
    fn value(&self) -> Option<Real>;

    /// Return `true` if the quote is currently valid.
    fn is_valid(&self) -> bool {
        self.value().is_some()
    }

    /// Return the current value, failing with [`Error::NullValue`] when unset.
    fn try_value(&self) -> Result<Real> {
        self.value().ok_or(Error::NullValue)
    }
}

/// A mutable market quote shared behind an `Arc`.
///
/// Every change of value notifies the registered observers immediately;
/// setting the value it already holds is a no-op.
#[derive(Debug, Default)]
pub struct SimpleQuote {
    value: RwLock<Option<Real>>,
    observable: ObservableImpl,
}

impl SimpleQuote {
    /// Create a new quote with the given value.
    pub fn new(value: Real) -> Self {
        Self {
            value: RwLock::new(Some(value)),
            observable: ObservableImpl::new(),
        }
    }

    /// Create an empty (invalid) quote.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Set a new value and return the difference from the previous one
    /// (`0.0` when the quote was unset).
    pub fn set_value(&self, value: Real) -> Real {
        let previous = self.swap(Some(value));
        if previous != Some(value) {
            tracing::trace!(value, "quote changed");
            self.observable.notify();
        }
        previous.map_or(0.0, |p| value - p)
    }

    /// Clear the value, making the quote invalid.
    pub fn reset(&self) {
        if self.swap(None).is_some() {
            self.observable.notify();
        }
    }

    /// Number of registered observers.
    pub fn observers(&self) -> usize {
        self.observable.len()
    }

    fn swap(&self, value: Option<Real>) -> Option<Real> {
        match self.value.write() {
            Ok(mut guard) => std::mem::replace(&mut *guard, value),
            Err(poisoned) => std::mem::replace(&mut *poisoned.into_inner(), value),
        }
    }
}

impl Quote for SimpleQuote {
    fn value(&self) -> Option<Real> {
        match self.value.read() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

impl Observable for SimpleQuote {
    fn register_observer(&self, observer: Weak<dyn Observer>) {
        self.observable.register(observer);
    }

    fn unregister_observer(&self, observer: &Weak<dyn Observer>) {
        self.observable.unregister(observer);
    }

    fn notify_observers(&self) {
        self.observable.notify();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ql_core::{CacheKey, SolverCache};
    use std::sync::Arc;

    #[test]
    fn simple_quote() {
        let q = SimpleQuote::new(1.05);
        assert!(q.is_valid());
        assert_eq!(q.value(), Some(1.05));
        assert_eq!(q.try_value(), Ok(1.05));
    }

    #[test]
    fn empty_quote() {
        let q = SimpleQuote::empty();
        assert!(!q.is_valid());
        assert_eq!(q.try_value(), Err(Error::NullValue));
    }

    #[test]
    fn set_value_returns_difference() {
        let q = SimpleQuote::new(100.0);
        approx::assert_abs_diff_eq!(q.set_value(101.5), 1.5);
        assert_eq!(q.value(), Some(101.5));
    }

    #[test]
    fn mutation_clears_registered_cache() {
        let quote = SimpleQuote::new(100.0);
        let cache = Arc::new(SolverCache::<Real>::new());
        let weak: Weak<dyn Observer> = Arc::downgrade(&(cache.clone() as Arc<dyn Observer>));
        quote.register_observer(weak.clone());

        let key = CacheKey::builder().real(100.0).finish();
        cache.get_or_try_insert_with(key, || Ok(42.0)).unwrap();
        assert_eq!(cache.len(), 1);

        // same value: no notification
        quote.set_value(100.0);
        assert_eq!(cache.len(), 1);

        quote.set_value(101.0);
        assert!(cache.is_empty());

        cache.get_or_try_insert_with(key, || Ok(43.0)).unwrap();
        quote.unregister_observer(&weak);
        quote.set_value(102.0);
        assert_eq!(cache.len(), 1);
    }
}
