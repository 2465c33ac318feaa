//! Internal implementation details.
//!
//! These are pub(crate) and not intended for external use.

pub(crate) mod flags;
pub(crate) mod level;
pub(crate) mod node;
