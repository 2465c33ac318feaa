//! Total orders used to arrange skip list keys.
//!
//! A collection keeps the comparator it was built with for its whole
//! lifetime; the ordering must be total and must not change.

use std::cmp::Ordering;

pub trait Comparator<K>: Send + Sync {
    fn compare(&self, a: &K, b: &K) -> Ordering;
}

/// Ascending order given by `Ord`.
#[derive(Debug, Default, Clone, Copy)]
pub struct Natural;

impl<K: Ord> Comparator<K> for Natural {
    #[inline]
    fn compare(&self, a: &K, b: &K) -> Ordering {
        a.cmp(b)
    }
}

/// Descending order given by `Ord`.
#[derive(Debug, Default, Clone, Copy)]
pub struct Descending;

impl<K: Ord> Comparator<K> for Descending {
    #[inline]
    fn compare(&self, a: &K, b: &K) -> Ordering {
        b.cmp(a)
    }
}

/// Any `Fn(&K, &K) -> Ordering` closure.
///
/// ```rust
/// use lazyskip_core::{CompareFn, DeferredGuard, SkipSet};
///
/// // Case-insensitive ordering of names.
/// let names: SkipSet<String, DeferredGuard, _> =
///     SkipSet::with_comparator(CompareFn(|a: &String, b: &String| {
///         a.to_lowercase().cmp(&b.to_lowercase())
///     }));
/// assert!(names.add("Alice".to_string()));
/// assert!(!names.add("alice".to_string()));
/// ```
#[derive(Clone, Copy)]
pub struct CompareFn<F>(pub F);

impl<K, F> Comparator<K> for CompareFn<F>
where
    F: Fn(&K, &K) -> Ordering + Send + Sync,
{
    #[inline]
    fn compare(&self, a: &K, b: &K) -> Ordering {
        (self.0)(a, b)
    }
}

impl<F> std::fmt::Debug for CompareFn<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("CompareFn(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_orders() {
        assert_eq!(Natural.compare(&1, &2), Ordering::Less);
        assert_eq!(Descending.compare(&1, &2), Ordering::Greater);
        assert_eq!(Descending.compare(&2, &2), Ordering::Equal);

        let by_len = CompareFn(|a: &&str, b: &&str| a.len().cmp(&b.len()));
        assert_eq!(by_len.compare(&"abc", &"de"), Ordering::Greater);
        assert_eq!(format!("{:?}", by_len), "CompareFn(..)");
    }
}
