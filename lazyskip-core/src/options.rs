//! Construction options for skip lists.

use crate::error::OptionsError;

/// Default maximum node level.
pub const MAX_LEVEL: usize = 16;

/// Default inverse probability of promoting a node one level (p = 1/4).
pub const BRANCHING: u32 = 4;

/// Hard upper bound for `max_level`; sizes the per-operation
/// predecessor/successor arrays.
pub const LEVEL_LIMIT: usize = 32;

/// Shape parameters of a skip list.
///
/// ```rust
/// use lazyskip_core::SkipListOptions;
///
/// let options = SkipListOptions::default().with_max_level(24).with_branching(2);
/// assert!(options.validate().is_ok());
/// assert!(SkipListOptions::default().with_branching(1).validate().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SkipListOptions {
    max_level: usize,
    branching: u32,
}

impl SkipListOptions {
    pub fn with_max_level(mut self, max_level: usize) -> Self {
        self.max_level = max_level;
        self
    }

    pub fn with_branching(mut self, branching: u32) -> Self {
        self.branching = branching;
        self
    }

    pub fn max_level(&self) -> usize {
        self.max_level
    }

    pub fn branching(&self) -> u32 {
        self.branching
    }

    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }

    pub fn validate(&self) -> Result<(), OptionsError> {
        if self.max_level == 0 {
            return Err(OptionsError::ZeroMaxLevel);
        }
        if self.max_level > LEVEL_LIMIT {
            return Err(OptionsError::MaxLevelTooLarge {
                requested: self.max_level,
                limit: LEVEL_LIMIT,
            });
        }
        if self.branching < 2 {
            return Err(OptionsError::BranchingTooSmall(self.branching));
        }
        Ok(())
    }
}

impl Default for SkipListOptions {
    fn default() -> Self {
        SkipListOptions {
            max_level: MAX_LEVEL,
            branching: BRANCHING,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let options = SkipListOptions::default();
        assert_eq!(options.max_level(), MAX_LEVEL);
        assert_eq!(options.branching(), BRANCHING);
        assert!(options.is_default());
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_shapes() {
        assert_eq!(
            SkipListOptions::default().with_max_level(0).validate(),
            Err(OptionsError::ZeroMaxLevel)
        );
        assert_eq!(
            SkipListOptions::default()
                .with_max_level(LEVEL_LIMIT + 1)
                .validate(),
            Err(OptionsError::MaxLevelTooLarge {
                requested: LEVEL_LIMIT + 1,
                limit: LEVEL_LIMIT,
            })
        );
        assert_eq!(
            SkipListOptions::default().with_branching(1).validate(),
            Err(OptionsError::BranchingTooSmall(1))
        );
        assert!(
            SkipListOptions::default()
                .with_max_level(LEVEL_LIMIT)
                .validate()
                .is_ok()
        );
    }

    #[test]
    fn test_error_messages() {
        let err = SkipListOptions::default()
            .with_max_level(40)
            .validate()
            .unwrap_err();
        assert_eq!(err.to_string(), "max level 40 exceeds the limit of 32");
    }
}
