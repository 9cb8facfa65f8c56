//! Lock-guarded state shared between connection tasks.

use parking_lot::Mutex;
use std::sync::Arc;

pub type Shared<T> = Arc<Mutex<T>>;

pub fn new_state<T>(value: T) -> Shared<T> {
    Arc::new(Mutex::new(value))
}

/// Append-only collection that concurrent tasks push finished fragments into.
///
/// Every append takes the lock for the whole fragment, so rows of one
/// fragment are never interleaved with rows of another.
pub struct FragmentSink<T> {
    inner: Shared<Vec<T>>,
}

impl<T> FragmentSink<T> {
    pub fn new() -> Self {
        Self {
            inner: new_state(Vec::new()),
        }
    }

    /// Appends a fragment and returns the number of items collected so far.
    pub fn append(&self, fragment: Vec<T>) -> usize {
        let mut items = self.inner.lock();
        items.extend(fragment);
        items.len()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Takes everything collected so far, leaving the sink empty.
    pub fn drain(&self) -> Vec<T> {
        std::mem::take(&mut *self.inner.lock())
    }
}

impl<T> Clone for FragmentSink<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Default for FragmentSink<T> {
    fn default() -> Self {
        Self::new()
    }
}
