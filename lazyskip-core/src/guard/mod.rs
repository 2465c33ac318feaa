//! Guard trait for memory reclamation strategies.
//!
//! Nodes removed from a skip list stay reachable for readers that loaded a
//! pointer to them before they were unlinked. The `Guard` trait abstracts over
//! how such nodes (and replaced values) are eventually freed:
//!
//! ```text
//! LazySkipList<K, V, G: Guard, C>
//!     │
//!     ├── SkipMap<K, V, EpochGuard>      (production, lazyskip-crossbeam)
//!     └── SkipMap<K, V, DeferredGuard>   (testing)
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use lazyskip_core::SkipMap;
//! use lazyskip_crossbeam::EpochGuard;
//!
//! let map: SkipMap<i32, String, EpochGuard> = SkipMap::new();
//! map.store(42, "answer".to_string());
//! ```

mod deferred_guard;

use std::ops::Deref;

pub use deferred_guard::{DeferredGuard, DeferredRef};

/// A memory reclamation guard that protects concurrent access to nodes.
///
/// - **EpochGuard**: Low overhead, batched reclamation (crossbeam-epoch)
/// - **DeferredGuard**: Defers all destruction until the collection drops (testing)
///
/// # Safety Contract
///
/// Implementations must ensure:
/// 1. Pointers passed to `defer_destroy` are not freed while any read guard
///    pinned before the call is still alive
/// 2. `GuardedRef` keeps the referenced data valid for its lifetime
///
/// Guards are stored in collections and must be `Send + Sync`. Thread pinning
/// happens per operation through [`Guard::pin`], not when the stored guard is
/// created.
///
pub trait Guard: Sized + Default + Send + Sync {
    /// A reference protected by a guard of this type.
    type GuardedRef<'a, T: 'a>: Deref<Target = T>;

    /// An active guard that protects reads for its lifetime.
    ///
    /// For epoch-based guards this is a pinned `crossbeam_epoch::Guard`.
    /// For deferred guards this is `()`, protection comes from the guard
    /// stored in the collection.
    type ReadGuard: Sized;

    /// Pin an active read guard.
    fn pin() -> Self::ReadGuard;

    /// Schedule a pointer for deferred destruction.
    ///
    /// # Safety
    ///
    /// - `ptr` must be a valid allocation owned by the collection
    /// - `ptr` must no longer be reachable by new traversals
    /// - `dealloc` must be the correct deallocation function for `ptr`
    /// - the same allocation must not be deferred twice
    ///
    unsafe fn defer_destroy<N>(&self, ptr: *mut N, dealloc: unsafe fn(*mut N));

    /// Create a guarded reference from a raw pointer.
    ///
    /// # Safety
    ///
    /// - `ptr` must point to valid data protected by a read guard pinned by
    ///   the caller at the time of the call
    /// - The data must remain valid for lifetime `'a` once the returned
    ///   reference holds its own protection
    ///
    unsafe fn make_ref<'a, T: 'a>(ptr: *const T) -> Self::GuardedRef<'a, T>;
}
