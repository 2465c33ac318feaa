//! Iterators over skip maps and sets.

use crate::data_structures::comparator::Comparator;
use crate::data_structures::internal::node::NodePtr;
use crate::data_structures::sorted::LazySkipList;
use crate::guard::Guard;

// ============================================================================
// Iter - (key, value) pairs in comparator order
// ============================================================================

/// Iterator over the entries of a [`SkipMap`](crate::SkipMap).
///
/// Holds a read guard for its whole lifetime, so no node it can still reach
/// is reclaimed. Entries are cloned out; the walk is weakly consistent in the
/// same way as `range`.
pub struct Iter<'a, K, V, G: Guard, C> {
    list: &'a LazySkipList<K, V, G, C>,
    current: NodePtr<K, V>,
    _pin: G::ReadGuard,
}

impl<'a, K, V, G: Guard, C: Comparator<K>> Iter<'a, K, V, G, C> {
    pub(crate) fn new(list: &'a LazySkipList<K, V, G, C>) -> Self {
        // Pin before the first load.
        let pin = G::pin();
        let current = list.first_present();
        Iter {
            list,
            current,
            _pin: pin,
        }
    }
}

impl<K, V, G, C> Iterator for Iter<'_, K, V, G, C>
where
    K: Clone,
    V: Clone,
    G: Guard,
    C: Comparator<K>,
{
    type Item = (K, V);

    fn next(&mut self) -> Option<Self::Item> {
        if self.current.is_null() {
            return None;
        }
        let node = self.current;
        self.current = self.list.next_present(node);

        // Safety: `_pin` keeps the node and its value alive.
        unsafe { Some(((*node).key().clone(), (*(*node).load_value()).clone())) }
    }
}

// ============================================================================
// SetIter - elements of a SkipSet
// ============================================================================

/// Iterator over the elements of a [`SkipSet`](crate::SkipSet).
pub struct SetIter<'a, T, G: Guard, C> {
    inner: Iter<'a, T, (), G, C>,
}

impl<'a, T, G: Guard, C: Comparator<T>> SetIter<'a, T, G, C> {
    pub(crate) fn new(list: &'a LazySkipList<T, (), G, C>) -> Self {
        SetIter {
            inner: Iter::new(list),
        }
    }
}

impl<T, G, C> Iterator for SetIter<'_, T, G, C>
where
    T: Clone,
    G: Guard,
    C: Comparator<T>,
{
    type Item = T;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(element, ())| element)
    }
}

#[cfg(test)]
mod tests {
    use crate::{DeferredGuard, SkipMap, SkipSet};

    #[test]
    fn test_iter_in_order() {
        let map: SkipMap<i32, &str> = SkipMap::new();
        map.store(2, "b");
        map.store(1, "a");
        map.store(3, "c");

        let entries: Vec<_> = map.iter().collect();
        assert_eq!(entries, vec![(1, "a"), (2, "b"), (3, "c")]);
    }

    #[test]
    fn test_iter_skips_deleted() {
        let set: SkipSet<i32, DeferredGuard> = (0..10).collect();
        for k in (0..10).filter(|k| k % 3 == 0) {
            assert!(set.remove(&k));
        }
        let left: Vec<_> = set.iter().collect();
        assert_eq!(left, vec![1, 2, 4, 5, 7, 8]);
    }

    #[test]
    fn test_iter_survives_removal_of_current() {
        let map: SkipMap<i32, i32> = (0..5).map(|k| (k, k * 10)).collect();
        let mut iter = map.iter();
        assert_eq!(iter.next(), Some((0, 0)));
        // The iterator already points at 1; remove it and its neighbour.
        map.delete(&1);
        map.delete(&2);
        let rest: Vec<_> = iter.map(|(k, _)| k).collect();
        assert!(rest.ends_with(&[3, 4]));
        assert!(!rest.contains(&2));
    }

    #[test]
    fn test_empty_iter() {
        let set: SkipSet<String> = SkipSet::new();
        assert_eq!(set.iter().next(), None);
    }
}
