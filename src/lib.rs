//! lirsdb - A page buffer pool with approximate-LIRS replacement.
//!
//! # Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Callers (index, heap, ...)                   │
//! │               pin / unpin / new_pages / free_page               │
//! └─────────────────────────────────────────────────────────────────┘
//!                                  ↓
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                       Buffer Pool (buffer/)                     │
//! │   ┌───────────────┐  ┌───────────────┐  ┌──────────────────┐    │
//! │   │ PageDirectory │  │  FrameStore   │  │  LirsReplacer    │    │
//! │   │ PageId → Fid  │  │ bytes + meta  │  │ free list,       │    │
//! │   └───────────────┘  └───────────────┘  │ max(recency,     │    │
//! │                                         │     reuse dist)  │    │
//! │                 BufferPool + Stats      └──────────────────┘    │
//! └─────────────────────────────────────────────────────────────────┘
//!                                  ↓
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                       Storage Layer (storage/)                  │
//! │   DiskManager trait: FileDiskManager | MemoryDiskManager        │
//! │   Page + DiskHeader (page 0: free pages, file entries, CRC)     │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//! - [`common`] - Shared primitives (PageId, FrameId, Error, config)
//! - [`buffer`] - The buffer pool and its replacement policy
//! - [`storage`] - Disk collaborators and page formats
//!
//! # Quick Start
//! ```no_run
//! use lirsdb::{BufferPool, FileDiskManager};
//!
//! let disk = FileDiskManager::open_or_create("my_database.db").unwrap();
//! let pool = BufferPool::new(64, disk);
//!
//! let mut page = pool.new_page().unwrap();
//! page.as_mut_slice()[0] = 42;
//! drop(page);
//!
//! pool.flush_all_pages().unwrap();
//! ```

pub mod buffer;
pub mod common;
pub mod storage;

pub use common::config::PAGE_SIZE;
pub use common::{BufferPoolConfig, Error, FrameId, PageId, Result};

pub use buffer::{BufferPool, BufferPoolStats, FrameHandle, StatsSnapshot};
pub use storage::{DiskManager, FileDiskManager, MemoryDiskManager, Page};
