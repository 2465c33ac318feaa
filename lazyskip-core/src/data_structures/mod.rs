//! Data structures for concurrent collections.
//!
//! # Organization
//!
//! - [`sorted`] - The lazy skip list engine
//! - [`wrappers`] - `SkipMap` and `SkipSet` on top of the engine
//! - [`comparator`] - Key orderings
//! - `internal` - Nodes, flags and level generation (pub(crate))

pub mod comparator;
pub(crate) mod internal;
pub mod sorted;
pub mod wrappers;

pub use comparator::{CompareFn, Comparator, Descending, Natural};
pub use sorted::LazySkipList;
pub use wrappers::{Iter, SetIter, SkipMap, SkipSet};
