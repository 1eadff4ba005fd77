//! Buffer pool management.
//!
//! The buffer pool caches a bounded number of disk pages in memory. It
//! manages a fixed pool of frames, each holding at most one page.
//!
//! # Components
//! - [`BufferPool`] - The orchestrator: pin/unpin, allocation, flushing
//! - [`FrameStore`] / [`Frame`] - Page bytes + per-frame bookkeeping
//! - [`PageDirectory`] - Resident page id to frame mapping
//! - [`replacer`] - Approximate-LIRS victim selection
//! - [`FrameHandle`], [`PageReadGuard`] / [`PageWriteGuard`] - Page access
//! - [`BufferPoolStats`] - Hit/miss and I/O counters

mod buffer_pool;
mod frame;
mod frame_store;
mod page_directory;
mod page_guard;
pub mod replacer;
mod stats;

pub use buffer_pool::BufferPool;
pub use frame::{Frame, FrameMeta, FrameState};
pub use frame_store::FrameStore;
pub use page_directory::PageDirectory;
pub use page_guard::{FrameHandle, PageReadGuard, PageWriteGuard};
pub use stats::{BufferPoolStats, StatsSnapshot};
