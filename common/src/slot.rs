use std::{fmt, sync::Arc};

use crossbeam::atomic::AtomicCell;

/// Single value shared between threads, last writer wins.
///
/// Readers always see a complete value and never wait for a new one.
pub struct Slot<T>(Arc<AtomicCell<T>>);

impl<T: Copy> Slot<T> {
    pub fn new(value: T) -> Self {
        Self(Arc::new(AtomicCell::new(value)))
    }

    pub fn publish(&self, value: T) {
        self.0.store(value);
    }

    pub fn latest(&self) -> T {
        self.0.load()
    }
}

impl<T: Copy + Default> Default for Slot<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: Copy + fmt::Debug> fmt::Debug for Slot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Slot").field(&self.latest()).finish()
    }
}

impl<T> Clone for Slot<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}
