// src/shared.rs

//! Process-wide shared instances
//!
//! A [`SharedInstance`] hands out the same `Arc<T>` to every caller while
//! at least one handle is alive. When the last handle drops the instance
//! is destroyed; the next request builds a fresh one.

use std::sync::{Arc, Mutex, OnceLock, PoisonError, Weak};

/// Holder for a lazily created, weakly cached instance
///
/// Meant to live in a `static`:
///
/// ```
/// use zif::shared::SharedInstance;
///
/// static COUNTER: SharedInstance<u32> = SharedInstance::new();
///
/// let a = COUNTER.get_or_init(|| 7);
/// let b = COUNTER.get_or_init(|| 8);
/// assert_eq!(*b, 7);
/// drop((a, b));
/// assert_eq!(*COUNTER.get_or_init(|| 8), 8);
/// ```
pub struct SharedInstance<T> {
    slot: OnceLock<Mutex<Weak<T>>>,
}

impl<T> SharedInstance<T> {
    pub const fn new() -> Self {
        Self { slot: OnceLock::new() }
    }

    fn slot(&self) -> &Mutex<Weak<T>> {
        self.slot.get_or_init(|| Mutex::new(Weak::new()))
    }

    /// The live instance, if any handle still exists
    pub fn get(&self) -> Option<Arc<T>> {
        self.slot()
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .upgrade()
    }

    /// Return the live instance or create one with `init`
    pub fn get_or_init(&self, init: impl FnOnce() -> T) -> Arc<T> {
        match self.get_or_try_init(|| Ok::<T, std::convert::Infallible>(init())) {
            Ok(instance) => instance,
            Err(never) => match never {},
        }
    }

    /// Return the live instance or create one with a fallible `init`
    ///
    /// The lock is held while `init` runs, so concurrent callers never
    /// build two instances.
    pub fn get_or_try_init<E>(&self, init: impl FnOnce() -> Result<T, E>) -> Result<Arc<T>, E> {
        let mut weak = self.slot().lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = weak.upgrade() {
            return Ok(existing);
        }
        let instance = Arc::new(init()?);
        *weak = Arc::downgrade(&instance);
        Ok(instance)
    }
}

impl<T> Default for SharedInstance<T> {
    fn default() -> Self {
        Self::new()
    }
}
