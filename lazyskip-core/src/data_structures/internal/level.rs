use crate::options::SkipListOptions;

/// Draws node levels from a geometric distribution.
///
/// Each extra level is taken with probability `1 / branching`:
/// - Level 1: 3/4 (branching = 4)
/// - Level 2: 3/16
/// - Level N: (1/4)^(N-1) * 3/4
///
/// Results are capped at `max_level`, so the top level absorbs the tail.
#[derive(Debug, Clone, Copy)]
pub(crate) struct LevelGenerator {
    max_level: usize,
    branching: u32,
}

impl LevelGenerator {
    /// Build a generator from options that were already validated.
    pub(crate) fn new(options: &SkipListOptions) -> Self {
        debug_assert!(options.validate().is_ok());
        LevelGenerator {
            max_level: options.max_level(),
            branching: options.branching(),
        }
    }

    #[inline]
    pub(crate) fn max_level(&self) -> usize {
        self.max_level
    }

    #[inline]
    pub(crate) fn random_level(&self) -> usize {
        let mut level = 1;
        while level < self.max_level && fastrand::u32(..self.branching) == 0 {
            level += 1;
        }
        level
    }
}

impl Default for LevelGenerator {
    fn default() -> Self {
        Self::new(&SkipListOptions::default())
    }
}
