use std::fmt;

use super::iter::SetIter;
use crate::data_structures::comparator::{Comparator, Natural};
use crate::data_structures::sorted::LazySkipList;
use crate::error::OptionsError;
use crate::guard::{DeferredGuard, Guard};
use crate::options::SkipListOptions;

/// A concurrent ordered set. The same engine as [`SkipMap`](crate::SkipMap)
/// with unit values.
///
/// ```rust
/// use lazyskip_core::SkipSet;
///
/// let set: SkipSet<i32> = SkipSet::new();
/// for k in [5, 3, 8, 1] {
///     set.add(k);
/// }
/// assert_eq!(set.iter().collect::<Vec<_>>(), vec![1, 3, 5, 8]);
///
/// assert!(set.remove(&3));
/// assert_eq!(set.iter().collect::<Vec<_>>(), vec![1, 5, 8]);
/// assert_eq!(set.len(), 3);
/// ```
pub struct SkipSet<T, G: Guard = DeferredGuard, C = Natural> {
    inner: LazySkipList<T, (), G, C>,
}

impl<T: Ord, G: Guard> SkipSet<T, G, Natural> {
    pub fn new() -> Self {
        Self::with_comparator(Natural)
    }

    pub fn with_options(options: SkipListOptions) -> Result<Self, OptionsError> {
        Self::with_options_and_comparator(options, Natural)
    }
}

impl<T, G: Guard, C: Comparator<T>> SkipSet<T, G, C> {
    pub fn with_comparator(comparator: C) -> Self {
        SkipSet {
            inner: LazySkipList::new(comparator),
        }
    }

    pub fn with_options_and_comparator(
        options: SkipListOptions,
        comparator: C,
    ) -> Result<Self, OptionsError> {
        Ok(SkipSet {
            inner: LazySkipList::with_options(options, comparator)?,
        })
    }

    /// Insert `element`. Returns false if an equal element was present.
    pub fn add(&self, element: T) -> bool {
        let ((), loaded) = self.inner.load_or_store_with(element, || (), |_| ());
        !loaded
    }

    pub fn contains(&self, element: &T) -> bool {
        self.inner.contains(element)
    }

    /// Remove `element`. Returns whether this call removed it.
    pub fn remove(&self, element: &T) -> bool {
        self.inner.remove_with(element, |_| ()).is_some()
    }

    /// Call `visit` for each element in order until it returns false.
    pub fn range<F>(&self, mut visit: F)
    where
        F: FnMut(&T) -> bool,
    {
        self.inner.range(|element, _| visit(element));
    }

    pub fn iter(&self) -> SetIter<'_, T, G, C> {
        SetIter::new(&self.inner)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn clear(&mut self) {
        self.inner.clear();
    }
}

impl<T, G: Guard, C: Comparator<T> + Default> Default for SkipSet<T, G, C> {
    fn default() -> Self {
        Self::with_comparator(C::default())
    }
}

impl<T: fmt::Debug, G: Guard, C: Comparator<T>> fmt::Debug for SkipSet<T, G, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut set = f.debug_set();
        self.range(|element| {
            set.entry(element);
            true
        });
        set.finish()
    }
}

impl<T, G: Guard, C: Comparator<T> + Default> FromIterator<T> for SkipSet<T, G, C> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let set = Self::default();
        for element in iter {
            set.add(element);
        }
        set
    }
}

impl<T, G: Guard, C: Comparator<T>> Extend<T> for SkipSet<T, G, C> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for element in iter {
            self.add(element);
        }
    }
}

impl<'a, T: Clone, G: Guard, C: Comparator<T>> IntoIterator for &'a SkipSet<T, G, C> {
    type Item = T;
    type IntoIter = SetIter<'a, T, G, C>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_rejects_duplicates() {
        let set: SkipSet<&str> = SkipSet::new();
        assert!(set.add("b"));
        assert!(set.add("a"));
        assert!(!set.add("b"));
        assert_eq!(set.len(), 2);
        assert!(set.contains(&"a"));
        assert!(!set.contains(&"c"));
    }

    #[test]
    fn test_remove_twice() {
        let set: SkipSet<i32> = [1, 2, 3].into_iter().collect();
        assert!(set.remove(&2));
        assert!(!set.remove(&2));
        assert_eq!(format!("{:?}", set), "{1, 3}");
    }

    #[test]
    fn test_range_early_exit() {
        let set: SkipSet<i32> = (0..100).collect();
        let mut seen = 0;
        set.range(|_| {
            seen += 1;
            seen < 10
        });
        assert_eq!(seen, 10);
    }

    #[test]
    fn test_extend_after_clear() {
        let mut set: SkipSet<u8> = SkipSet::default();
        set.extend([3, 1, 2]);
        set.clear();
        assert!(set.is_empty());
        set.extend([9, 7]);
        assert_eq!((&set).into_iter().collect::<Vec<_>>(), vec![7, 9]);
    }
}
