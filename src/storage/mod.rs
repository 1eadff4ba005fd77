//! Storage layer - the disk collaborator underneath the buffer pool.
//!
//! - [`DiskManager`] - The interface the buffer pool consumes
//! - [`FileDiskManager`] - A single database file with a header page
//! - [`MemoryDiskManager`] - Heap-backed pages with call counters
//! - [`Page`] - The raw 4KB unit of I/O

mod disk;
pub mod disk_header;
mod file_disk_manager;
mod memory_disk_manager;
mod page;

pub use disk::DiskManager;
pub use disk_header::DiskHeader;
pub use file_disk_manager::FileDiskManager;
pub use memory_disk_manager::{DiskCounters, FailurePlan, MemoryDiskManager};
pub use page::Page;
