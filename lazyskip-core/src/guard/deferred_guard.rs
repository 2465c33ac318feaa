//! Deferred guard implementation for testing.
//!
//! `DeferredGuard` keeps every unlinked node and replaced value alive until
//! the owning collection is dropped.

#[cfg(debug_assertions)]
use std::collections::HashSet;
use std::mem;
use std::ops::Deref;
use std::sync::Mutex;

use super::Guard;

/// A guard that defers all destruction until it is dropped.
///
/// Destruction timing is predictable, which makes it the default backend for
/// tests. Memory grows with every delete and overwrite until the collection
/// goes away, so long-running code should use `EpochGuard` instead.
///
pub struct DeferredGuard {
    deferred: Mutex<Vec<DeferredPtr>>,
    #[cfg(debug_assertions)]
    seen: Mutex<HashSet<usize>>,
}

struct DeferredPtr {
    ptr: *mut (),
    dealloc: unsafe fn(*mut ()),
}

// Safety: the pointer is only dereferenced by `dealloc` once, on drop.
unsafe impl Send for DeferredPtr {}

impl DeferredGuard {
    pub fn new() -> Self {
        DeferredGuard {
            deferred: Mutex::new(Vec::new()),
            #[cfg(debug_assertions)]
            seen: Mutex::new(HashSet::new()),
        }
    }

    /// Number of allocations waiting for the guard to drop.
    pub fn pending(&self) -> usize {
        self.deferred
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

impl Default for DeferredGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for DeferredGuard {
    fn drop(&mut self) {
        let pending = self
            .deferred
            .get_mut()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        for entry in pending.drain(..) {
            unsafe {
                (entry.dealloc)(entry.ptr);
            }
        }
    }
}

/// A plain reference wrapper for `DeferredGuard`.
///
/// Nothing deferred is freed before the collection drops, so the borrow of
/// the collection is all the protection the reference needs.
///
pub struct DeferredRef<'a, T> {
    data: &'a T,
}

impl<'a, T> DeferredRef<'a, T> {
    pub fn new(data: &'a T) -> Self {
        DeferredRef { data }
    }
}

impl<T> Deref for DeferredRef<'_, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        self.data
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for DeferredRef<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DeferredRef({:?})", self.data)
    }
}

impl Guard for DeferredGuard {
    type GuardedRef<'a, T: 'a> = DeferredRef<'a, T>;

    type ReadGuard = ();

    fn pin() -> Self::ReadGuard {}

    unsafe fn defer_destroy<N>(&self, ptr: *mut N, dealloc: unsafe fn(*mut N)) {
        // Zero-sized allocations all share one dangling address.
        #[cfg(debug_assertions)]
        if mem::size_of::<N>() != 0 {
            let addr = ptr as usize;
            let mut seen = self
                .seen
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if !seen.insert(addr) {
                panic!("DUPLICATE defer_destroy at {:#x}", addr);
            }
        }

        let entry = DeferredPtr {
            ptr: ptr as *mut (),
            dealloc: unsafe { mem::transmute::<unsafe fn(*mut N), unsafe fn(*mut ())>(dealloc) },
        };
        self.deferred
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(entry);
    }

    unsafe fn make_ref<'a, T: 'a>(ptr: *const T) -> Self::GuardedRef<'a, T> {
        DeferredRef::new(unsafe { &*ptr })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct DropCounter(Arc<AtomicUsize>);

    impl Drop for DropCounter {
        fn drop(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    unsafe fn drop_boxed<T>(ptr: *mut T) {
        unsafe { drop(Box::from_raw(ptr)) };
    }

    #[test]
    fn test_deferred_until_drop() {
        let drops = Arc::new(AtomicUsize::new(0));
        let guard = DeferredGuard::default();

        for _ in 0..10 {
            let ptr = Box::into_raw(Box::new(DropCounter(Arc::clone(&drops))));
            unsafe { guard.defer_destroy(ptr, drop_boxed) };
        }

        assert_eq!(guard.pending(), 10);
        assert_eq!(drops.load(Ordering::SeqCst), 0);

        drop(guard);
        assert_eq!(drops.load(Ordering::SeqCst), 10);
    }

    #[test]
    fn test_zero_sized_values_are_not_duplicates() {
        let guard = DeferredGuard::default();
        for _ in 0..3 {
            let ptr = Box::into_raw(Box::new(()));
            unsafe { guard.defer_destroy(ptr, drop_boxed) };
        }
        assert_eq!(guard.pending(), 3);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "DUPLICATE defer_destroy")]
    fn test_duplicate_defer_panics() {
        let guard = DeferredGuard::default();
        let ptr = Box::into_raw(Box::new(7u64));
        unsafe {
            guard.defer_destroy(ptr, drop_boxed);
            guard.defer_destroy(ptr, drop_boxed);
        }
    }

    #[test]
    fn test_deferred_ref() {
        let value = 42;
        let _guard = DeferredGuard::pin();

        let guarded = unsafe { DeferredGuard::make_ref(&value) };
        assert_eq!(*guarded, 42);
        assert_eq!(format!("{:?}", guarded), "DeferredRef(42)");
    }
}
