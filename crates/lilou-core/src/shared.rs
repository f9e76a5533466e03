use std::sync::{Arc, PoisonError, RwLock};

/// Ledger handle that can be cloned across threads.
///
/// Mutations go through [`Shared::write`], which holds the only writer slot
/// for the duration of the closure, so calls are applied one at a time.
/// [`Shared::read`] may run concurrently with other readers and always sees
/// the state between two whole calls.
#[derive(Debug, Default)]
pub struct Shared<T> {
    inner: Arc<RwLock<T>>,
}

impl<T> Clone for Shared<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Shared<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(RwLock::new(value)),
        }
    }

    pub fn read<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        // Ledger calls validate before they mutate, so a panic inside a
        // closure cannot leave a half-applied call behind.
        let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }

    pub fn write<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }
}
