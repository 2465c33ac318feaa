// Lifecycle bits of a skip list node, packed into one atomic word.
//
// Bit layout:
//   Bit 0: FULLY_LINKED - every forward pointer of the node has been published
//   Bit 1: MARKED       - node is logically deleted (may still be linked)
//
// Flag combinations:
//   0b00: being linked, invisible to readers
//   0b01: present
//   0b11: logically deleted, waiting for (or done with) physical unlink
//   0b10: never produced, a node is only marked once fully linked
//
use std::sync::atomic::{AtomicU32, Ordering};

pub(crate) const FULLY_LINKED: u32 = 0b01;
pub(crate) const MARKED: u32 = 0b10;

/// Atomically updated bitset holding a node's lifecycle flags.
///
/// Presence checks must go through [`NodeFlags::mget`] so that
/// `FULLY_LINKED && !MARKED` is answered from a single load.
#[derive(Debug, Default)]
pub(crate) struct NodeFlags {
    bits: AtomicU32,
}

impl NodeFlags {
    #[inline]
    pub(crate) const fn new(bits: u32) -> Self {
        NodeFlags {
            bits: AtomicU32::new(bits),
        }
    }

    /// OR `flags` into the register.
    #[inline]
    pub(crate) fn set_true(&self, flags: u32) {
        let mut current = self.bits.load(Ordering::Acquire);
        loop {
            if current & flags == flags {
                return;
            }
            match self.bits.compare_exchange_weak(
                current,
                current | flags,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return,
                Err(actual) => current = actual,
            }
        }
    }

    /// Clear whichever of `flags` are currently set. Lifecycle bits are
    /// never cleared on a live node.
    #[cfg_attr(not(test), allow(dead_code))]
    #[inline]
    pub(crate) fn set_false(&self, flags: u32) {
        let mut current = self.bits.load(Ordering::Acquire);
        loop {
            if current & flags == 0 {
                return;
            }
            match self.bits.compare_exchange_weak(
                current,
                current & !flags,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return,
                Err(actual) => current = actual,
            }
        }
    }

    #[inline]
    pub(crate) fn get(&self, flag: u32) -> bool {
        self.bits.load(Ordering::Acquire) & flag != 0
    }

    /// Compound read: `true` iff the bits selected by `mask` equal `expected`.
    #[inline]
    pub(crate) fn mget(&self, mask: u32, expected: u32) -> bool {
        self.bits.load(Ordering::Acquire) & mask == expected
    }

    /// `FULLY_LINKED && !MARKED`, in one load.
    #[inline]
    pub(crate) fn is_present(&self) -> bool {
        self.mget(FULLY_LINKED | MARKED, FULLY_LINKED)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_lifecycle() {
        let flags = NodeFlags::default();
        assert!(!flags.is_present());
        assert!(!flags.get(FULLY_LINKED));

        flags.set_true(FULLY_LINKED);
        assert!(flags.is_present());

        flags.set_true(MARKED);
        assert!(flags.get(FULLY_LINKED));
        assert!(flags.get(MARKED));
        assert!(!flags.is_present());
    }

    #[test]
    fn test_set_false_only_clears_requested_bits() {
        let flags = NodeFlags::new(FULLY_LINKED | MARKED);
        flags.set_false(MARKED);
        assert!(flags.is_present());

        // Clearing an unset bit is a no-op.
        flags.set_false(MARKED);
        assert!(flags.mget(FULLY_LINKED | MARKED, FULLY_LINKED));

        flags.set_false(FULLY_LINKED | MARKED);
        assert!(flags.mget(FULLY_LINKED | MARKED, 0));
    }

    #[test]
    fn test_concurrent_set_true_keeps_both_bits() {
        for _ in 0..100 {
            let flags = Arc::new(NodeFlags::default());
            let a = Arc::clone(&flags);
            let b = Arc::clone(&flags);

            let h1 = thread::spawn(move || a.set_true(FULLY_LINKED));
            let h2 = thread::spawn(move || b.set_true(MARKED));
            h1.join().unwrap();
            h2.join().unwrap();

            assert!(flags.mget(FULLY_LINKED | MARKED, FULLY_LINKED | MARKED));
        }
    }
}
