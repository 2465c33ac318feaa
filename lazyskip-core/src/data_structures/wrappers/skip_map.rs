use std::fmt;

use super::iter::Iter;
use crate::data_structures::comparator::{Comparator, Natural};
use crate::data_structures::sorted::LazySkipList;
use crate::error::OptionsError;
use crate::guard::{DeferredGuard, Guard};
use crate::options::SkipListOptions;

/// A concurrent ordered map.
///
/// Keys are kept in the order given by the comparator `C`. Lookups and
/// traversals never block; writers lock only the few nodes they relink.
/// Memory of removed entries is reclaimed through the guard `G`
/// ([`DeferredGuard`] by default, `EpochGuard` from `lazyskip-crossbeam` for
/// long-running services).
///
/// Values are returned by clone (`load`, `load_or_store`, `iter`) or through a
/// guarded reference (`get`).
///
/// ```rust
/// use lazyskip_core::SkipMap;
///
/// let map: SkipMap<u32, &str> = SkipMap::new();
/// map.store(2, "two");
/// map.store(1, "one");
///
/// assert_eq!(map.load(&1), Some("one"));
/// assert_eq!(map.load_or_store(2, "deux"), ("two", true));
/// assert_eq!(map.load_and_delete(&1), Some("one"));
/// assert_eq!(map.len(), 1);
/// ```
pub struct SkipMap<K, V, G: Guard = DeferredGuard, C = Natural> {
    inner: LazySkipList<K, V, G, C>,
}

impl<K: Ord, V, G: Guard> SkipMap<K, V, G, Natural> {
    /// Create an empty map ordered by `K: Ord`.
    pub fn new() -> Self {
        Self::with_comparator(Natural)
    }

    pub fn with_options(options: SkipListOptions) -> Result<Self, OptionsError> {
        Self::with_options_and_comparator(options, Natural)
    }
}

impl<K, V, G: Guard, C: Comparator<K>> SkipMap<K, V, G, C> {
    pub fn with_comparator(comparator: C) -> Self {
        SkipMap {
            inner: LazySkipList::new(comparator),
        }
    }

    pub fn with_options_and_comparator(
        options: SkipListOptions,
        comparator: C,
    ) -> Result<Self, OptionsError> {
        Ok(SkipMap {
            inner: LazySkipList::with_options(options, comparator)?,
        })
    }

    /// Set the value for `key`, replacing any previous value in place.
    pub fn store(&self, key: K, value: V) {
        self.inner.store(key, value);
    }

    /// Clone of the value for `key`.
    pub fn load(&self, key: &K) -> Option<V>
    where
        V: Clone,
    {
        self.inner.load_with(key, V::clone)
    }

    /// Apply `f` to the value for `key` without cloning it.
    pub fn load_with<F, R>(&self, key: &K, f: F) -> Option<R>
    where
        F: FnOnce(&V) -> R,
    {
        self.inner.load_with(key, f)
    }

    /// Reference to the value for `key`, kept alive by the guard.
    ///
    /// A concurrent `store` may replace the value meanwhile; the reference
    /// keeps pointing at the value that was current at lookup time.
    pub fn get(&self, key: &K) -> Option<G::GuardedRef<'_, V>> {
        self.inner.get(key)
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.inner.contains(key)
    }

    /// Return the existing value for `key` if present. Otherwise store
    /// `value` and return it.
    ///
    /// The flag is true when the value was loaded, false when stored.
    pub fn load_or_store(&self, key: K, value: V) -> (V, bool)
    where
        V: Clone,
    {
        self.inner.load_or_store_with(key, move || value, V::clone)
    }

    /// Like [`load_or_store`](Self::load_or_store), but the value is only
    /// produced once the key was found absent.
    ///
    /// `produce` is called at most once and never while a lock is held. If a
    /// concurrent insert of the same key wins after `produce` ran, the
    /// produced value is dropped and the winner's value returned.
    ///
    /// ```rust
    /// use lazyskip_core::SkipMap;
    ///
    /// let map: SkipMap<&str, Vec<u8>> = SkipMap::new();
    /// let (buf, loaded) = map.load_or_store_lazy("a", || vec![0; 4]);
    /// assert_eq!((buf.len(), loaded), (4, false));
    ///
    /// let (_, loaded) = map.load_or_store_lazy("a", || unreachable!());
    /// assert!(loaded);
    /// ```
    pub fn load_or_store_lazy<F>(&self, key: K, produce: F) -> (V, bool)
    where
        F: FnOnce() -> V,
        V: Clone,
    {
        self.inner.load_or_store_with(key, produce, V::clone)
    }

    /// Remove `key`, returning its value if this call removed it.
    pub fn load_and_delete(&self, key: &K) -> Option<V>
    where
        V: Clone,
    {
        self.inner.remove_with(key, V::clone)
    }

    /// Remove `key`. Returns whether this call removed it.
    pub fn delete(&self, key: &K) -> bool {
        self.inner.remove_with(key, |_| ()).is_some()
    }

    /// Call `visit` for each entry in order until it returns false.
    ///
    /// Not a snapshot: entries changed during the walk may or may not be
    /// seen, but each key is visited at most once.
    pub fn range<F>(&self, mut visit: F)
    where
        F: FnMut(&K, &V) -> bool,
    {
        self.inner.range(|k, v| visit(k, v));
    }

    pub fn iter(&self) -> Iter<'_, K, V, G, C> {
        Iter::new(&self.inner)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Remove every entry.
    pub fn clear(&mut self) {
        self.inner.clear();
    }
}

impl<K, V, G: Guard, C: Comparator<K> + Default> Default for SkipMap<K, V, G, C> {
    fn default() -> Self {
        Self::with_comparator(C::default())
    }
}

impl<K, V, G, C> fmt::Debug for SkipMap<K, V, G, C>
where
    K: fmt::Debug,
    V: fmt::Debug,
    G: Guard,
    C: Comparator<K>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        self.range(|k, v| {
            map.entry(k, v);
            true
        });
        map.finish()
    }
}

impl<K, V, G: Guard, C: Comparator<K> + Default> FromIterator<(K, V)> for SkipMap<K, V, G, C> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let map = Self::default();
        for (key, value) in iter {
            map.store(key, value);
        }
        map
    }
}

impl<K, V, G: Guard, C: Comparator<K>> Extend<(K, V)> for SkipMap<K, V, G, C> {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.store(key, value);
        }
    }
}

impl<'a, K, V, G, C> IntoIterator for &'a SkipMap<K, V, G, C>
where
    K: Clone,
    V: Clone,
    G: Guard,
    C: Comparator<K>,
{
    type Item = (K, V);
    type IntoIter = Iter<'a, K, V, G, C>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
