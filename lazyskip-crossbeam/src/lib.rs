//! Epoch-reclaimed skip maps and sets.
//!
//! This crate provides `EpochGuard`, an implementation of the `Guard` trait
//! using crossbeam-epoch, and aliases for maps and sets that use it. Memory
//! of removed entries is returned while the collection is running.
//!
//! # Usage
//!
//! ```rust
//! use lazyskip_crossbeam::EpochSkipMap;
//!
//! let map: EpochSkipMap<u32, String> = EpochSkipMap::new();
//! map.store(42, "answer".to_string());
//!
//! if let Some(value) = map.get(&42) {
//!     assert_eq!(value.as_str(), "answer");
//! }
//! assert!(map.delete(&42));
//! ```

pub mod epoch_guard;

use lazyskip_core::{Natural, SkipMap, SkipSet};

pub use epoch_guard::{EpochGuard, EpochRef};

/// A [`SkipMap`] reclaimed through crossbeam-epoch.
pub type EpochSkipMap<K, V, C = Natural> = SkipMap<K, V, EpochGuard, C>;

/// A [`SkipSet`] reclaimed through crossbeam-epoch.
pub type EpochSkipSet<T, C = Natural> = SkipSet<T, EpochGuard, C>;
