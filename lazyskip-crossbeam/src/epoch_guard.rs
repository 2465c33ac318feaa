//! Epoch-based reclamation for skip maps and sets.
//!
//! Every map operation pins the current thread for its duration. A node
//! unlinked by `delete` (or a value replaced by `store`) is handed to the
//! global collector and freed once every thread pinned at that moment has
//! unpinned:
//!
//! ```text
//! thread A: pin ── load ptr ───────────────── read value ── unpin
//! thread B:   pin ── unlink node ── defer ── unpin
//!                                     │
//!                                     └── freed after A unpins
//! ```

use crossbeam_epoch::{self as epoch, Guard as CrossbeamGuard};
use lazyskip_core::Guard;
use std::fmt;
use std::ops::Deref;

/// Epoch-based memory reclamation guard.
///
/// Stateless: all bookkeeping lives in crossbeam's global collector, so a
/// map holding an `EpochGuard` stays `Send + Sync` and frees memory while it
/// is running instead of at drop.
#[derive(Debug, Clone, Copy, Default)]
pub struct EpochGuard;

/// A value reference that keeps its own epoch pin.
///
/// While an `EpochRef` is alive the thread stays pinned, so avoid holding
/// one across long waits: it delays reclamation for every map.
pub struct EpochRef<'a, T> {
    _guard: CrossbeamGuard,
    reference: &'a T,
}

impl<'a, T> EpochRef<'a, T> {
    pub fn get(&self) -> &T {
        self.reference
    }
}

impl<T> Deref for EpochRef<'_, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        self.reference
    }
}

impl<T: fmt::Display> fmt::Display for EpochRef<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.reference.fmt(f)
    }
}

impl<T: fmt::Debug> fmt::Debug for EpochRef<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EpochRef({:?})", self.reference)
    }
}

impl Guard for EpochGuard {
    type GuardedRef<'a, T: 'a> = EpochRef<'a, T>;

    type ReadGuard = CrossbeamGuard;

    fn pin() -> Self::ReadGuard {
        epoch::pin()
    }

    unsafe fn defer_destroy<N>(&self, ptr: *mut N, dealloc: unsafe fn(*mut N)) {
        let guard = epoch::pin();
        // Safety: the caller guarantees `ptr` is unreachable for new
        // traversals; readers pinned before this point keep it alive.
        unsafe {
            guard.defer_unchecked(move || dealloc(ptr));
        }
    }

    unsafe fn make_ref<'a, T: 'a>(ptr: *const T) -> Self::GuardedRef<'a, T> {
        // Re-pinning while the caller is still pinned extends the same
        // protection to the returned reference.
        EpochRef {
            _guard: epoch::pin(),
            reference: unsafe { &*ptr },
        }
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

    unsafe fn drop_box<T>(ptr: *mut T) {
        unsafe { drop(Box::from_raw(ptr)) };
    }

    #[test]
    fn test_deferred_value_is_eventually_freed() {
        let drops = Arc::new(AtomicUsize::new(0));
        let guard = EpochGuard;

        for _ in 0..64 {
            let ptr = Box::into_raw(Box::new(DropCounter(Arc::clone(&drops))));
            unsafe { guard.defer_destroy(ptr, drop_box::<DropCounter>) };
        }

        // Drive the collector until everything is reclaimed.
        for _ in 0..10_000 {
            if drops.load(Ordering::SeqCst) == 64 {
                break;
            }
            epoch::pin().flush();
        }
        assert_eq!(drops.load(Ordering::SeqCst), 64);
    }

    #[test]
    fn test_epoch_ref() {
        let value = String::from("pinned");
        let _pin = EpochGuard::pin();

        let guarded = unsafe { EpochGuard::make_ref(&value) };
        assert_eq!(guarded.len(), 6);
        assert_eq!(guarded.get(), "pinned");
        assert_eq!(format!("{}", guarded), "pinned");
        assert_eq!(format!("{:?}", guarded), "EpochRef(\"pinned\")");
    }
}
