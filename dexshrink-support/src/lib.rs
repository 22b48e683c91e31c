// Shared support utilities for the dexshrink crates

pub mod strings;
pub use strings::StringInterner;
pub mod bitset;
pub use bitset::BitSet;
pub mod hash;
pub use hash::{FastHashMap, FastHashSet};
