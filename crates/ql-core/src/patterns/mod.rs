//! Patterns sub-module: push-based observable.

pub mod observable;
