use std::cmp::Ordering as CmpOrdering;
use std::ptr;
use std::sync::atomic::{AtomicIsize, AtomicUsize, Ordering};

use tracing::{debug, trace};

use crate::data_structures::comparator::Comparator;
use crate::data_structures::internal::flags::{FULLY_LINKED, MARKED};
use crate::data_structures::internal::level::LevelGenerator;
use crate::data_structures::internal::node::{LazyNode, NodePtr};
use crate::error::OptionsError;
use crate::guard::Guard;
use crate::options::{LEVEL_LIMIT, SkipListOptions};

type Tower<K, V> = [NodePtr<K, V>; LEVEL_LIMIT];

// =============================================================================
// LAZY SKIP LIST INVARIANTS
// =============================================================================
//
// Level 2:  HEAD ─────────────────────────────► 30 ─────────────────► NULL
// Level 1:  HEAD ──────────► 10 ─────────────► 30 ─────────────────► NULL
// Level 0:  HEAD ──────────► 10 ────► 20 ────► 30 ──────► 40 ──────► NULL
//
// 1. Every level is sorted by the comparator, strictly ascending
// 2. Level 0 links every node that is not yet physically unlinked
// 3. A node is visible to readers iff FULLY_LINKED && !MARKED (one load)
// 4. X.next[i] of a published node X only changes while X's lock is held
// 5. Locks are taken in descending key order (layer 0 predecessor first,
//    header last), a node being deleted before its predecessors
// 6. highest_level only grows (except in clear, which needs &mut self)
//
// =============================================================================
// INSERT (lock predecessors, validate, publish)
// =============================================================================
//
// 1. find_node fills preds/succs at every level. If the key is present and
//    not marked, overwrite (or keep) its value. If it is marked, a delete is
//    in flight: retry until the node is gone.
// 2. Lock each distinct pred for levels 0..L bottom-up and validate:
//      !pred.marked && !succ.marked && pred.next[i] == succ
//    Any failure: unlock and restart from 1.
// 3. new.next[i] = succ; pred.next[i] = new (for each level), then set
//    FULLY_LINKED. Until that bit is set readers skip the node.
//
// =============================================================================
// DELETE (mark, then unlink)
// =============================================================================
//
// Phase A: find the victim at its own top layer, fully linked and unmarked.
//          Lock it; if somebody marked it first, they own the delete.
//          Otherwise set MARKED: the node is gone for readers from here on.
//
// Phase B: lock each distinct pred for levels 0..=top bottom-up, validate
//            !pred.marked && pred.next[i] == victim
//          then, top-down, pred.next[i] = victim.next[i]. Failure retries
//          phase B only; the victim stays marked, so the search finds it.
//
//   Before:  pred ──────► victim ──────► next
//   After:   pred ─────────────────────► next
//                         victim ──────► next   (reclaimed via the guard)
//
// =============================================================================

/// Outcome of an insertion attempt. Carries the value pointer that the
/// caller may read while its read guard is pinned.
enum Insertion<V> {
    Inserted(*mut V),
    Existing(*mut V),
}

/// What to do when the key is already present.
#[derive(Clone, Copy, PartialEq, Eq)]
enum OnExisting {
    Overwrite,
    Keep,
}

/// A value that has not been boxed yet, produced at most once.
enum Pending<V, F> {
    Lazy(F),
    Ready(Box<V>),
}

impl<V, F: FnOnce() -> V> Pending<V, F> {
    fn into_box(self) -> Box<V> {
        match self {
            Pending::Lazy(produce) => Box::new(produce()),
            Pending::Ready(value) => value,
        }
    }
}

/// A concurrent ordered map with lock-free reads and per-node write locks.
///
/// Structure:
/// - A header sentinel with `max_level` forward pointers
/// - Nodes with a random level in `1..=max_level`, each with its own lock
/// - An element counter and the highest level in use, both atomic
///
/// Readers (`load_with`, `get`, `contains`, `range`, `len`) never lock.
/// Writers lock only the nodes they relink, see the protocol above.
///
/// Nodes and overwritten values are handed to the guard `G` once no new
/// traversal can reach them.
///
pub struct LazySkipList<K, V, G: Guard, C> {
    header: NodePtr<K, V>,
    length: AtomicIsize,
    highest_level: AtomicUsize,
    levels: LevelGenerator,
    comparator: C,
    guard: G,
}

impl<K, V, G: Guard, C: Comparator<K>> LazySkipList<K, V, G, C> {
    /// Create an empty skip list with the default shape.
    pub fn new(comparator: C) -> Self {
        Self::with_levels(LevelGenerator::default(), comparator)
    }

    /// Create an empty skip list with a custom shape.
    pub fn with_options(options: SkipListOptions, comparator: C) -> Result<Self, OptionsError> {
        options.validate()?;
        if !options.is_default() {
            debug!(
                max_level = options.max_level(),
                branching = options.branching(),
                "creating skip list with custom options"
            );
        }
        Ok(Self::with_levels(LevelGenerator::new(&options), comparator))
    }

    fn with_levels(levels: LevelGenerator, comparator: C) -> Self {
        LazySkipList {
            header: LazyNode::alloc_header(levels.max_level()),
            length: AtomicIsize::new(0),
            highest_level: AtomicUsize::new(1),
            levels,
            comparator,
            guard: G::default(),
        }
    }

    /// The guard that schedules destruction of removed nodes.
    pub fn guard(&self) -> &G {
        &self.guard
    }

    // =========================================================================
    // Public operations (each pins a read guard for its duration)
    // =========================================================================

    /// Insert `key`, overwriting the value if the key is already present.
    pub fn store(&self, key: K, value: V) {
        let _pin = G::pin();
        let value = Pending::<V, fn() -> V>::Ready(Box::new(value));
        self.insert_internal(key, value, OnExisting::Overwrite);
    }

    /// Apply `f` to the value stored under `key`.
    pub fn load_with<F, R>(&self, key: &K, f: F) -> Option<R>
    where
        F: FnOnce(&V) -> R,
    {
        let _pin = G::pin();
        let node = self.find_present(key)?;
        unsafe { Some(f(&*(*node).load_value())) }
    }

    /// Guarded reference to the value stored under `key`.
    pub fn get(&self, key: &K) -> Option<G::GuardedRef<'_, V>> {
        let _pin = G::pin();
        let node = self.find_present(key)?;
        // Safety: `_pin` protects the value until make_ref holds its own guard.
        unsafe { Some(G::make_ref((*node).load_value())) }
    }

    pub fn contains(&self, key: &K) -> bool {
        let _pin = G::pin();
        self.find_present(key).is_some()
    }

    /// Insert `key` with the value from `produce` unless it is already
    /// present, then apply `read` to the value now associated with `key`.
    ///
    /// Returns `read`'s result and whether the key was already present.
    ///
    /// `produce` runs at most once, outside of any node lock, and only after
    /// a search found the key absent. A concurrent insert can still win the
    /// race afterwards, in which case the produced value is dropped.
    pub fn load_or_store_with<P, F, R>(&self, key: K, produce: P, read: F) -> (R, bool)
    where
        P: FnOnce() -> V,
        F: FnOnce(&V) -> R,
    {
        let _pin = G::pin();
        match self.insert_internal(key, Pending::Lazy(produce), OnExisting::Keep) {
            Insertion::Inserted(value) => unsafe { (read(&*value), false) },
            Insertion::Existing(value) => unsafe { (read(&*value), true) },
        }
    }

    /// Remove `key`, applying `f` to its value before the node is handed to
    /// the guard. Returns `None` if the key was absent or another thread
    /// removed it first.
    pub fn remove_with<F, R>(&self, key: &K, f: F) -> Option<R>
    where
        F: FnOnce(&V) -> R,
    {
        let _pin = G::pin();
        let node = self.remove_internal(key)?;
        unsafe {
            let result = f(&*(*node).load_value());
            // Safety: node is unlinked at every level and owned by this thread.
            self.guard.defer_destroy(node, LazyNode::dealloc);
            Some(result)
        }
    }

    /// Visit present entries in comparator order until `visit` returns false.
    ///
    /// Weakly consistent: entries inserted or removed during the walk may or
    /// may not be seen, but no entry is visited twice.
    pub fn range<F>(&self, mut visit: F)
    where
        F: FnMut(&K, &V) -> bool,
    {
        let _pin = G::pin();
        let mut curr = self.first_present();
        while !curr.is_null() {
            unsafe {
                if !visit((*curr).key(), &*(*curr).load_value()) {
                    return;
                }
            }
            curr = self.next_present(curr);
        }
    }

    /// Number of elements.
    ///
    /// Maintained by insert and delete, so it can briefly lag behind what a
    /// concurrent `range` observes.
    pub fn len(&self) -> usize {
        self.length.load(Ordering::Acquire).max(0) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every element and reset the list to its initial state.
    ///
    /// Exclusive access replaces synchronization: no other operation can run
    /// on this list while `clear` does.
    pub fn clear(&mut self) {
        let dropped = self.len();
        let max_level = self.levels.max_level();
        let old_header = std::mem::replace(&mut self.header, LazyNode::alloc_header(max_level));
        unsafe { Self::free_chain(old_header) };
        *self.length.get_mut() = 0;
        *self.highest_level.get_mut() = 1;
        debug!(dropped, "cleared skip list");
    }

    // =========================================================================
    // Level generation
    // =========================================================================

    /// Draw a level for a new node and raise `highest_level` to cover it.
    fn random_level(&self) -> usize {
        let level = self.levels.random_level();
        let mut highest = self.highest_level.load(Ordering::Acquire);
        while level > highest {
            match self.highest_level.compare_exchange_weak(
                highest,
                level,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    trace!(from = highest, to = level, "raised highest level");
                    break;
                }
                Err(actual) => highest = actual,
            }
        }
        level
    }

    // =========================================================================
    // Search (lock-free)
    // =========================================================================

    /// Compare a data node against `key`. `None` for the end of a level.
    #[inline]
    fn compare_node(&self, node: NodePtr<K, V>, key: &K) -> Option<CmpOrdering> {
        if node.is_null() {
            return None;
        }
        unsafe { Some(self.comparator.compare((*node).key(), key)) }
    }

    /// Top-down search recording the predecessor and successor at every
    /// level. Returns as soon as a node with `key` is seen at any level; the
    /// arrays below that level are then stale and must not be used.
    fn find_node(
        &self,
        key: &K,
        preds: &mut Tower<K, V>,
        succs: &mut Tower<K, V>,
    ) -> Option<NodePtr<K, V>> {
        let mut pred = self.header;
        for level in (0..self.highest_level.load(Ordering::Acquire)).rev() {
            let mut succ = unsafe { (*pred).atomic_load_next(level) };
            loop {
                match self.compare_node(succ, key) {
                    Some(CmpOrdering::Less) => {
                        pred = succ;
                        succ = unsafe { (*pred).atomic_load_next(level) };
                    }
                    Some(CmpOrdering::Equal) => return Some(succ),
                    _ => break,
                }
            }
            preds[level] = pred;
            succs[level] = succ;
        }
        None
    }

    /// Full top-down search for deletion. Always fills preds/succs at every
    /// level and returns the highest level at which `key` was found.
    fn find_node_delete(
        &self,
        key: &K,
        preds: &mut Tower<K, V>,
        succs: &mut Tower<K, V>,
    ) -> Option<usize> {
        let mut found = None;
        let mut pred = self.header;
        for level in (0..self.highest_level.load(Ordering::Acquire)).rev() {
            let mut succ = unsafe { (*pred).atomic_load_next(level) };
            while let Some(CmpOrdering::Less) = self.compare_node(succ, key) {
                pred = succ;
                succ = unsafe { (*pred).atomic_load_next(level) };
            }
            preds[level] = pred;
            succs[level] = succ;
            if found.is_none() && self.compare_node(succ, key) == Some(CmpOrdering::Equal) {
                found = Some(level);
            }
        }
        found
    }

    /// Lookup used by readers: the node for `key` if it is present.
    fn find_present(&self, key: &K) -> Option<NodePtr<K, V>> {
        let mut pred = self.header;
        for level in (0..self.highest_level.load(Ordering::Acquire)).rev() {
            let mut succ = unsafe { (*pred).atomic_load_next(level) };
            loop {
                match self.compare_node(succ, key) {
                    Some(CmpOrdering::Less) => {
                        pred = succ;
                        succ = unsafe { (*pred).atomic_load_next(level) };
                    }
                    Some(CmpOrdering::Equal) => {
                        return unsafe { (*succ).is_present() }.then_some(succ);
                    }
                    _ => break,
                }
            }
        }
        None
    }

    /// First present node at level 0 (null if none).
    pub(crate) fn first_present(&self) -> NodePtr<K, V> {
        self.skip_absent(unsafe { (*self.header).atomic_load_next(0) })
    }

    /// Next present node after `node` at level 0 (null if none).
    ///
    /// `node` may have been removed meanwhile: its forward pointer still leads
    /// to larger keys, so the walk never goes backwards.
    pub(crate) fn next_present(&self, node: NodePtr<K, V>) -> NodePtr<K, V> {
        self.skip_absent(unsafe { (*node).atomic_load_next(0) })
    }

    fn skip_absent(&self, mut curr: NodePtr<K, V>) -> NodePtr<K, V> {
        while !curr.is_null() {
            unsafe {
                if (*curr).is_present() {
                    return curr;
                }
                curr = (*curr).atomic_load_next(0);
            }
        }
        ptr::null_mut()
    }

    // =========================================================================
    // Insert
    // =========================================================================

    fn insert_internal<F>(
        &self,
        key: K,
        mut pending: Pending<V, F>,
        on_existing: OnExisting,
    ) -> Insertion<V>
    where
        F: FnOnce() -> V,
    {
        let level = self.random_level();
        let mut preds: Tower<K, V> = [ptr::null_mut(); LEVEL_LIMIT];
        let mut succs: Tower<K, V> = [ptr::null_mut(); LEVEL_LIMIT];

        loop {
            if let Some(found) = self.find_node(&key, &mut preds, &mut succs) {
                let node = unsafe { &*found };
                if node.is_marked() {
                    // Being deleted, wait until it is unlinked.
                    std::hint::spin_loop();
                    continue;
                }
                // Not necessarily fully linked yet; the value is already live.
                return match on_existing {
                    OnExisting::Overwrite => {
                        let value = pending.into_box();
                        let published = &*value as *const V as *mut V;
                        let old = node.swap_value(value);
                        // Safety: `old` was unreachable the moment the swap landed.
                        unsafe { self.guard.defer_destroy(old, LazyNode::<K, V>::dealloc_value) };
                        Insertion::Existing(published)
                    }
                    OnExisting::Keep => Insertion::Existing(node.load_value()),
                };
            }

            // Produce the value before taking any lock.
            let value = pending.into_box();

            let (validated, highest_locked) =
                unsafe { self.lock_for_insert(level, &preds, &succs) };
            if let Err(layer) = validated {
                unsafe { Self::unlock_preds(&preds, highest_locked) };
                trace!(layer, level, "insert validation failed, retrying");
                pending = Pending::Ready(value);
                continue;
            }

            let node = LazyNode::alloc(key, value, level);
            unsafe {
                let published = (*node).load_value();
                for layer in 0..level {
                    (*node).store_next(layer, succs[layer]);
                    (*preds[layer]).atomic_store_next(layer, node);
                }
                (*node).flags.set_true(FULLY_LINKED);
                Self::unlock_preds(&preds, highest_locked);
                self.length.fetch_add(1, Ordering::AcqRel);
                return Insertion::Inserted(published);
            }
        }
    }

    /// Lock the distinct predecessors of levels `0..level` bottom-up and
    /// validate each level. Stops at the first invalid level.
    ///
    /// Returns the first level that failed validation, if any, and the
    /// highest level whose predecessor this call locked.
    ///
    /// # Safety
    /// `preds`/`succs` must come from a `find_node` under the caller's pin.
    unsafe fn lock_for_insert(
        &self,
        level: usize,
        preds: &Tower<K, V>,
        succs: &Tower<K, V>,
    ) -> (Result<(), usize>, Option<usize>) {
        let mut highest_locked = None;
        let mut prev_pred: NodePtr<K, V> = ptr::null_mut();
        for layer in 0..level {
            let pred = preds[layer];
            let succ = succs[layer];
            unsafe {
                if pred != prev_pred {
                    (*pred).lock();
                    highest_locked = Some(layer);
                    prev_pred = pred;
                }
                let valid = !(*pred).is_marked()
                    && (succ.is_null() || !(*succ).is_marked())
                    && (*pred).load_next(layer) == succ;
                if !valid {
                    return (Err(layer), highest_locked);
                }
            }
        }
        (Ok(()), highest_locked)
    }

    /// Release the locks taken on `preds[0..=highest_locked]`, each distinct
    /// node once. Equal predecessors always occupy adjacent levels.
    ///
    /// # Safety
    /// The caller must hold exactly those locks.
    unsafe fn unlock_preds(preds: &Tower<K, V>, highest_locked: Option<usize>) {
        let Some(highest) = highest_locked else {
            return;
        };
        let mut prev_pred: NodePtr<K, V> = ptr::null_mut();
        for layer in (0..=highest).rev() {
            let pred = preds[layer];
            if pred != prev_pred {
                unsafe { (*pred).unlock() };
                prev_pred = pred;
            }
        }
    }

    // =========================================================================
    // Delete
    // =========================================================================

    /// Mark and unlink the node for `key`. Returns the unlinked node, which
    /// the caller must hand to the guard.
    fn remove_internal(&self, key: &K) -> Option<NodePtr<K, V>> {
        let mut preds: Tower<K, V> = [ptr::null_mut(); LEVEL_LIMIT];
        let mut succs: Tower<K, V> = [ptr::null_mut(); LEVEL_LIMIT];
        let mut victim: NodePtr<K, V> = ptr::null_mut();
        let mut top_layer = 0;

        loop {
            let found = self.find_node_delete(key, &mut preds, &mut succs);

            if victim.is_null() {
                // Phase A: logical delete.
                let layer = found?;
                let candidate = succs[layer];
                unsafe {
                    if !(*candidate).is_present() || (*candidate).level() - 1 != layer {
                        // Not fully linked yet, or seen below its top layer.
                        return None;
                    }
                    (*candidate).lock();
                    if (*candidate).is_marked() {
                        (*candidate).unlock();
                        return None;
                    }
                    (*candidate).flags.set_true(MARKED);
                }
                victim = candidate;
                top_layer = layer;
            }

            // Phase B: physical unlink.
            let (validated, highest_locked) =
                unsafe { self.lock_for_unlink(victim, top_layer, &preds) };
            if let Err(layer) = validated {
                unsafe { Self::unlock_preds(&preds, highest_locked) };
                trace!(layer, top_layer, "unlink validation failed, retrying");
                continue;
            }

            unsafe {
                for layer in (0..=top_layer).rev() {
                    // The victim is marked and locked: its links are frozen.
                    (*preds[layer]).atomic_store_next(layer, (*victim).load_next(layer));
                }
                (*victim).unlock();
                Self::unlock_preds(&preds, highest_locked);
            }
            self.length.fetch_sub(1, Ordering::AcqRel);
            return Some(victim);
        }
    }

    /// Lock the distinct predecessors of levels `0..=top_layer` bottom-up and
    /// check each still links directly to `victim`.
    ///
    /// # Safety
    /// `preds` must come from a `find_node_delete` under the caller's pin and
    /// the caller must hold `victim`'s lock.
    unsafe fn lock_for_unlink(
        &self,
        victim: NodePtr<K, V>,
        top_layer: usize,
        preds: &Tower<K, V>,
    ) -> (Result<(), usize>, Option<usize>) {
        let mut highest_locked = None;
        let mut prev_pred: NodePtr<K, V> = ptr::null_mut();
        for layer in 0..=top_layer {
            let pred = preds[layer];
            unsafe {
                if pred != prev_pred {
                    (*pred).lock();
                    highest_locked = Some(layer);
                    prev_pred = pred;
                }
                let valid = !(*pred).is_marked() && (*pred).atomic_load_next(layer) == victim;
                if !valid {
                    return (Err(layer), highest_locked);
                }
            }
        }
        (Ok(()), highest_locked)
    }
}

impl<K, V, G: Guard, C> LazySkipList<K, V, G, C> {
    /// Free `header` and every node linked after it at level 0.
    ///
    /// # Safety
    /// No other thread may reach any node of the chain.
    unsafe fn free_chain(header: NodePtr<K, V>) {
        unsafe {
            let mut curr = (*header).load_next(0);
            LazyNode::dealloc(header);
            while !curr.is_null() {
                let next = (*curr).load_next(0);
                debug_assert!(
                    !(*curr).flags.get(MARKED),
                    "INVARIANT VIOLATION: marked node still linked at teardown"
                );
                LazyNode::dealloc(curr);
                curr = next;
            }
        }
    }
}

impl<K, V, G: Guard, C> Drop for LazySkipList<K, V, G, C> {
    fn drop(&mut self) {
        // Safety: &mut self, no concurrent readers remain.
        unsafe { Self::free_chain(self.header) };
    }
}

// Safety: keys and values are shared with and dropped by arbitrary threads;
// all shared node state goes through atomics and per-node locks.
unsafe impl<K: Send + Sync, V: Send + Sync, G: Guard, C: Send> Send for LazySkipList<K, V, G, C> {}
unsafe impl<K: Send + Sync, V: Send + Sync, G: Guard, C: Sync> Sync for LazySkipList<K, V, G, C> {}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
impl<K, V, G: Guard, C: Comparator<K>> LazySkipList<K, V, G, C> {
    /// Walk every level and check ordering, tower heights and that every
    /// node linked at a level above 0 is also linked at level 0.
    pub(crate) fn check_invariants(&self) {
        use std::collections::HashSet;

        let mut bottom = HashSet::new();
        let highest = self.highest_level.load(Ordering::Acquire);
        assert!(highest >= 1 && highest <= self.levels.max_level());

        for level in 0..self.levels.max_level() {
            let mut prev: NodePtr<K, V> = ptr::null_mut();
            let mut curr = unsafe { (*self.header).atomic_load_next(level) };
            if level >= highest {
                assert!(curr.is_null(), "level {} above highest level is linked", level);
            }
            while !curr.is_null() {
                unsafe {
                    assert!((*curr).level() > level, "node too short for level {}", level);
                    assert!(!(*curr).is_header());
                    if !prev.is_null() {
                        assert_eq!(
                            self.comparator.compare((*prev).key(), (*curr).key()),
                            CmpOrdering::Less,
                            "level {} out of order",
                            level
                        );
                    }
                    if level == 0 {
                        bottom.insert(curr as usize);
                    } else {
                        assert!(bottom.contains(&(curr as usize)), "node missing at level 0");
                    }
                    prev = curr;
                    curr = (*curr).atomic_load_next(level);
                }
            }
        }
        assert_eq!(bottom.len(), self.len(), "length counter drifted");
    }

    pub(crate) fn highest_level(&self) -> usize {
        self.highest_level.load(Ordering::Acquire)
    }
}
