//! Concurrent sorted collection engine.
//!
//! The engine is parameterized by a guard type `G: Guard` that determines
//! the memory reclamation strategy:
//!
//! - `DeferredGuard`: Testing - defers destruction until the collection drops
//! - `EpochGuard`: Production - epoch-based reclamation (crossbeam-epoch)

pub mod lazy_skip_list;

pub use lazy_skip_list::LazySkipList;
