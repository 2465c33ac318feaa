use thiserror::Error;

/// Rejected [`SkipListOptions`](crate::SkipListOptions).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum OptionsError {
    #[error("max level must be at least 1")]
    ZeroMaxLevel,

    #[error("max level {requested} exceeds the limit of {limit}")]
    MaxLevelTooLarge { requested: usize, limit: usize },

    #[error("branching factor {0} is too small, it must be at least 2")]
    BranchingTooSmall(u32),
}
