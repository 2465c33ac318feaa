//! Map and set front ends over the skip list engine.

pub mod iter;
pub mod skip_map;
pub mod skip_set;

pub use iter::{Iter, SetIter};
pub use skip_map::SkipMap;
pub use skip_set::SkipSet;
