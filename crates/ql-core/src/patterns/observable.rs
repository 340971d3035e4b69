//! Observer / Observable pattern.
//!
//! * An **Observable** object notifies registered **Observer**s whenever it
//!   changes state.
//! * Observers react by calling `update()`.
//!
//! Notification is push-based: a mutation notifies immediately, readers never
//! poll.  The observer list lives behind a `Mutex` so that observables can be
//! shared across threads by concurrent pricing calls.

use std::sync::{Arc, Mutex, Weak};

/// An object that can notify interested parties when it changes.
///
/// All methods take `&self` to support shared ownership; the observer list
/// uses interior mutability.
pub trait Observable {
    /// Register an observer to receive future change notifications.
    fn register_observer(&self, observer: Weak<dyn Observer>);

    /// Remove a previously registered observer.
    fn unregister_observer(&self, observer: &Weak<dyn Observer>);

    /// Notify all currently registered observers that this object has changed.
    fn notify_observers(&self);
}

/// An object that reacts to changes in [`Observable`]s it has subscribed to.
pub trait Observer: Send + Sync {
    /// Called by every observable this observer is registered with when that
    /// observable changes state.
    fn update(&self);
}

/// Embeddable observer-list management.
#[derive(Default)]
pub struct ObservableImpl {
    observers: Mutex<Vec<Weak<dyn Observer>>>,
}

impl std::fmt::Debug for ObservableImpl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObservableImpl")
            .field("observers", &self.len())
            .finish()
    }
}

impl ObservableImpl {
    /// Create a new, empty observable implementation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer.
    pub fn register(&self, observer: Weak<dyn Observer>) {
        if let Ok(mut obs) = self.observers.lock() {
            obs.push(observer);
        }
    }

    /// Remove an observer (by pointer equality of the `Weak`).
    pub fn unregister(&self, observer: &Weak<dyn Observer>) {
        if let Ok(mut obs) = self.observers.lock() {
            obs.retain(|o| !Weak::ptr_eq(o, observer));
        }
    }

    /// Number of registered (possibly dead) observers.
    pub fn len(&self) -> usize {
        self.observers.lock().map(|o| o.len()).unwrap_or(0)
    }

    /// `true` if no observer is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Notify all live observers, pruning dead `Weak` references.
    ///
    /// Observers are called after the lock is released, so an observer may
    /// register further observers from inside `update()`.
    pub fn notify(&self) {
        let live: Vec<Arc<dyn Observer>> = match self.observers.lock() {
            Ok(mut obs) => {
                obs.retain(|w| w.strong_count() > 0);
                obs.iter().filter_map(Weak::upgrade).collect()
            }
            Err(_) => return,
        };
        for obs in live {
            obs.update();
        }
    }
}
