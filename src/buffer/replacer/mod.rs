//! Eviction policy implementations (replacers).
//!
//! - [`LirsReplacer`] - Approximate LIRS: recency / reuse-distance weights,
//!   linear scan for the heaviest evictable frame

mod lirs;

pub use lirs::{AccessStats, LirsReplacer, INFINITE};
