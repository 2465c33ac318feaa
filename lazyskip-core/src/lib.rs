//! Concurrent ordered maps and sets built on a lazy, lock-based skip list.
//!
//! Reads never block. Writers lock only the nodes they relink and validate
//! before publishing, so operations on distinct keys proceed in parallel.
//!
//! ```rust
//! use std::sync::Arc;
//! use std::thread;
//!
//! use lazyskip_core::SkipMap;
//!
//! let map: Arc<SkipMap<u64, u64>> = Arc::new(SkipMap::new());
//! let handles: Vec<_> = (0..4)
//!     .map(|t| {
//!         let map = Arc::clone(&map);
//!         thread::spawn(move || {
//!             for i in 0..100 {
//!                 map.store(i * 4 + t, t);
//!             }
//!         })
//!     })
//!     .collect();
//! for handle in handles {
//!     handle.join().unwrap();
//! }
//! assert_eq!(map.len(), 400);
//! ```

pub mod common_tests;
pub mod data_structures;
pub mod error;
pub mod guard;
pub mod options;

pub use data_structures::{
    CompareFn, Comparator, Descending, Iter, LazySkipList, Natural, SetIter, SkipMap, SkipSet,
};
pub use error::OptionsError;
pub use guard::{DeferredGuard, DeferredRef, Guard};
pub use options::{BRANCHING, LEVEL_LIMIT, MAX_LEVEL, SkipListOptions};
