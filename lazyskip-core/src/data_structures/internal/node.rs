use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};

use parking_lot::RawMutex;
use parking_lot::lock_api::RawMutex as _;

use super::flags::{FULLY_LINKED, MARKED, NodeFlags};

pub(crate) type NodePtr<K, V> = *mut LazyNode<K, V>;

/// A skip list node.
///
/// Each node has:
/// - Key (None for the header sentinel)
/// - Boxed value behind an atomic pointer, swapped in place on overwrite
/// - One forward pointer per level; the level count is fixed at creation
/// - A per-node lock taken by writers that relink or mark the node
/// - Lifecycle flags (fully linked / marked)
///
pub(crate) struct LazyNode<K, V> {
    key: Option<K>,
    value: AtomicPtr<V>,
    next: Box<[AtomicPtr<LazyNode<K, V>>]>,
    lock: RawMutex,
    pub(crate) flags: NodeFlags,
}

impl<K, V> LazyNode<K, V> {
    /// Allocate a node that is not yet linked anywhere.
    pub(crate) fn alloc(key: K, value: Box<V>, level: usize) -> NodePtr<K, V> {
        Box::into_raw(Box::new(LazyNode {
            key: Some(key),
            value: AtomicPtr::new(Box::into_raw(value)),
            next: Self::tower(level),
            lock: RawMutex::INIT,
            flags: NodeFlags::default(),
        }))
    }

    /// Allocate a header sentinel. It is born fully linked and never marked.
    pub(crate) fn alloc_header(level: usize) -> NodePtr<K, V> {
        Box::into_raw(Box::new(LazyNode {
            key: None,
            value: AtomicPtr::new(ptr::null_mut()),
            next: Self::tower(level),
            lock: RawMutex::INIT,
            flags: NodeFlags::new(FULLY_LINKED),
        }))
    }

    fn tower(level: usize) -> Box<[AtomicPtr<LazyNode<K, V>>]> {
        (0..level)
            .map(|_| AtomicPtr::new(ptr::null_mut()))
            .collect()
    }

    /// Free a node and the value it still owns.
    ///
    /// # Safety
    /// - `node` must come from `alloc` or `alloc_header`
    /// - no other thread may access the node afterwards
    /// - must only be called once
    pub(crate) unsafe fn dealloc(node: NodePtr<K, V>) {
        unsafe { drop(Box::from_raw(node)) };
    }

    /// Free a value that was swapped out of a node.
    ///
    /// # Safety
    /// `value` must have been published by `alloc` or `swap_value` and be
    /// unreachable through any node.
    pub(crate) unsafe fn dealloc_value(value: *mut V) {
        unsafe { drop(Box::from_raw(value)) };
    }

    #[inline]
    pub(crate) fn is_header(&self) -> bool {
        self.key.is_none()
    }

    /// Key of a data node.
    ///
    /// # Safety
    /// Must not be called on the header.
    #[inline]
    pub(crate) unsafe fn key(&self) -> &K {
        debug_assert!(!self.is_header(), "header sentinel has no key");
        unsafe { self.key.as_ref().unwrap_unchecked() }
    }

    #[inline]
    pub(crate) fn level(&self) -> usize {
        self.next.len()
    }

    // =========================================================================
    // Forward pointers
    // =========================================================================

    /// Lock-free read of the successor at `level`.
    #[inline]
    pub(crate) fn atomic_load_next(&self, level: usize) -> NodePtr<K, V> {
        self.next[level].load(Ordering::Acquire)
    }

    /// Publish a new successor at `level`.
    #[inline]
    pub(crate) fn atomic_store_next(&self, level: usize, node: NodePtr<K, V>) {
        self.next[level].store(node, Ordering::Release)
    }

    /// Read the successor at `level` without synchronizing.
    ///
    /// Only valid for a thread that holds the lock guarding this pointer
    /// (the node itself once marked, or the predecessor while relinking).
    #[inline]
    pub(crate) fn load_next(&self, level: usize) -> NodePtr<K, V> {
        self.next[level].load(Ordering::Relaxed)
    }

    /// Write the successor at `level` of a node that is not yet published.
    #[inline]
    pub(crate) fn store_next(&self, level: usize, node: NodePtr<K, V>) {
        self.next[level].store(node, Ordering::Relaxed)
    }

    // =========================================================================
    // Value
    // =========================================================================

    #[inline]
    pub(crate) fn load_value(&self) -> *mut V {
        self.value.load(Ordering::Acquire)
    }

    /// Replace the value, returning the previous allocation.
    /// The caller must defer its destruction.
    #[inline]
    pub(crate) fn swap_value(&self, value: Box<V>) -> *mut V {
        self.value.swap(Box::into_raw(value), Ordering::AcqRel)
    }

    // =========================================================================
    // Lock and flags
    // =========================================================================

    #[inline]
    pub(crate) fn lock(&self) {
        self.lock.lock();
    }

    /// # Safety
    /// The calling thread must hold the lock.
    #[inline]
    pub(crate) unsafe fn unlock(&self) {
        unsafe { self.lock.unlock() };
    }

    #[inline]
    pub(crate) fn is_marked(&self) -> bool {
        self.flags.get(MARKED)
    }

    #[inline]
    pub(crate) fn is_present(&self) -> bool {
        self.flags.is_present()
    }
}

impl<K, V> Drop for LazyNode<K, V> {
    fn drop(&mut self) {
        let value = *self.value.get_mut();
        if !value.is_null() {
            unsafe { drop(Box::from_raw(value)) };
        }
    }
}
