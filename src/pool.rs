//! A tiny process-wide object pool for the buffers the parser and writer
//! reuse across rows. Renting never blocks or fails: an empty free list just
//! means a fresh value is allocated, so the pool is purely an optimization.

use std::ops::{Deref, DerefMut};
use std::sync::Mutex;

/// A type whose instances can be handed back to a [`Pool`] and reused
/// instead of reallocated, once `reset` has cleared their contents.
pub(crate) trait Poolable: Default {
    fn reset(&mut self);
}

/// A process-wide free list for `T`. Typically stored in a `static`.
pub(crate) struct Pool<T> {
    free: Mutex<Vec<T>>,
}

impl<T: Poolable> Pool<T> {
    pub(crate) const fn new() -> Pool<T> {
        Pool { free: Mutex::new(Vec::new()) }
    }

    /// Take an item from the free list, or allocate a new one.
    pub(crate) fn rent(&'static self) -> Pooled<T> {
        let item = self.free.lock().unwrap().pop().unwrap_or_default();
        Pooled { item: Some(item), pool: self }
    }
}

/// An item rented from a [`Pool`]. Resets and returns itself to the pool's
/// free list on drop.
pub(crate) struct Pooled<T: Poolable> {
    item: Option<T>,
    pool: &'static Pool<T>,
}

impl<T: Poolable> Deref for Pooled<T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.item.as_ref().expect("Pooled item taken before drop")
    }
}

impl<T: Poolable> DerefMut for Pooled<T> {
    fn deref_mut(&mut self) -> &mut T {
        self.item.as_mut().expect("Pooled item taken before drop")
    }
}

impl<T: Poolable> Drop for Pooled<T> {
    fn drop(&mut self) {
        if let Some(mut item) = self.item.take() {
            item.reset();
            self.pool.free.lock().unwrap().push(item);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Counter(u32);

    impl Poolable for Counter {
        fn reset(&mut self) {
            self.0 = 0;
        }
    }

    static COUNTERS: Pool<Counter> = Pool::new();

    #[test]
    fn recycles_instead_of_reallocating() {
        {
            let mut c = COUNTERS.rent();
            c.0 = 42;
        }
        let c = COUNTERS.rent();
        assert_eq!(c.0, 0, "rented item must have been reset before reuse");
    }
}
