//! The disk collaborator interface consumed by the buffer pool.

use crate::common::{PageId, Result};
use crate::storage::Page;

/// Page-granular storage underneath the buffer pool.
///
/// The pool only calls the page methods. The file-entry registry maps names
/// to the first page of a structure (a heap file, an index) and exists for
/// the layers above the pool, which reach it through
/// [`BufferPool::disk`](crate::buffer::BufferPool::disk).
///
/// Implementations are driven from behind the pool latch, so they need no
/// internal synchronization; they must be `Send` so the pool can be shared
/// across threads.
pub trait DiskManager: Send {
    /// Allocate a contiguous run of `count` pages, returning the first id.
    fn allocate_pages(&mut self, count: usize) -> Result<PageId>;

    /// Return a page to the allocator.
    fn deallocate_page(&mut self, page_id: PageId) -> Result<()>;

    /// Read the stored contents of `page_id` into `out`.
    fn read_page(&mut self, page_id: PageId, out: &mut Page) -> Result<()>;

    /// Persist `page` as the contents of `page_id`.
    fn write_page(&mut self, page_id: PageId, page: &Page) -> Result<()>;

    /// Register `name` as starting at `start`.
    fn add_file_entry(&mut self, name: &str, start: PageId) -> Result<()>;

    /// Look up the first page registered under `name`.
    fn get_file_entry(&self, name: &str) -> Option<PageId>;

    /// Forget the registration for `name`.
    fn delete_file_entry(&mut self, name: &str) -> Result<()>;

    /// Number of pages currently allocated (not counting freed pages).
    fn allocated_pages(&self) -> usize;
}
