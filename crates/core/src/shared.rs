//! Atomically swappable snapshot of read-mostly process state.
//!
//! Readers take an `Arc` clone of the current value and release the lock at
//! once, so no lock is held while a reader works (or awaits). Writers replace
//! the whole value; a reader never sees a half-updated one.

use std::sync::{Arc, RwLock};

#[derive(Debug)]
pub struct Shared<T> {
    current: RwLock<Arc<T>>,
}

impl<T> Shared<T> {
    pub fn new(value: T) -> Self {
        Self {
            current: RwLock::new(Arc::new(value)),
        }
    }

    /// Current snapshot.
    pub fn load(&self) -> Arc<T> {
        // A poisoned lock still guards a complete `Arc`: writers only ever assign.
        match self.current.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Replace the snapshot, returning the previous one.
    pub fn swap(&self, value: T) -> Arc<T> {
        let next = Arc::new(value);
        let mut guard = self.write();
        std::mem::replace(&mut *guard, next)
    }

    /// Derive the next snapshot from the current one under the write lock,
    /// returning the new snapshot. Concurrent updates are serialized.
    pub fn update(&self, f: impl FnOnce(&T) -> T) -> Arc<T> {
        let mut guard = self.write();
        let next = Arc::new(f(&guard));
        *guard = Arc::clone(&next);
        next
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Arc<T>> {
        match self.current.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl<T: Default> Default for Shared<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}
