//! Handles and RAII guards for page access.
//!
//! - [`FrameHandle`] - Returned by `pin`; the caller unpins explicitly
//! - [`PageReadGuard`] - Pinned + read-locked, unpins clean on drop
//! - [`PageWriteGuard`] - Pinned + write-locked, unpins dirty on drop
//!
//! Guards release the page lock before they unpin, so a dropping guard never
//! holds a page lock while it waits for the pool latch.

use std::mem::ManuallyDrop;
use std::ops::{Deref, DerefMut};

use parking_lot::{RwLockReadGuard, RwLockWriteGuard};
use tracing::error;

use crate::buffer::{BufferPool, Frame};
use crate::common::{FrameId, PageId};
use crate::storage::{DiskManager, Page};

/// Access to a pinned page's frame.
///
/// The pin is what keeps the frame from being reused, not the handle: once
/// the caller has called `unpin` for it, the handle must not be used again.
/// Release any lock taken through the handle before that `unpin`.
///
/// # Example
/// ```
/// use lirsdb::{BufferPool, MemoryDiskManager};
///
/// let pool = BufferPool::new(4, MemoryDiskManager::new());
/// let pid = pool.new_pages(1).unwrap();
///
/// let handle = pool.pin(pid, false).unwrap();
/// handle.write().as_mut_slice()[0] = 7;
/// pool.unpin(pid, true).unwrap(); // new_pages' pin
/// pool.unpin(pid, true).unwrap(); // ours
/// ```
#[derive(Clone, Copy)]
pub struct FrameHandle<'a> {
    frame: &'a Frame,
    frame_id: FrameId,
    page_id: PageId,
}

impl<'a> FrameHandle<'a> {
    pub(crate) fn new(frame: &'a Frame, frame_id: FrameId, page_id: PageId) -> Self {
        Self {
            frame,
            frame_id,
            page_id,
        }
    }

    #[inline]
    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    #[inline]
    pub fn frame_id(&self) -> FrameId {
        self.frame_id
    }

    /// Shared access to the page bytes.
    #[inline]
    pub fn read(&self) -> RwLockReadGuard<'a, Page> {
        self.frame.page()
    }

    /// Exclusive access to the page bytes.
    ///
    /// Writing does not mark the page dirty; say so when unpinning.
    #[inline]
    pub fn write(&self) -> RwLockWriteGuard<'a, Page> {
        self.frame.page_mut()
    }
}

impl std::fmt::Debug for FrameHandle<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameHandle")
            .field("frame_id", &self.frame_id)
            .field("page_id", &self.page_id)
            .finish()
    }
}

/// Guard for read-only page access.
///
/// Multiple `PageReadGuard`s can exist for the same page simultaneously.
/// The page is unpinned (clean) when the guard is dropped.
pub struct PageReadGuard<'a, D: DiskManager> {
    pool: &'a BufferPool<D>,
    frame_id: FrameId,
    page_id: PageId,
    lock: ManuallyDrop<RwLockReadGuard<'a, Page>>,
}

impl<'a, D: DiskManager> PageReadGuard<'a, D> {
    pub(crate) fn new(pool: &'a BufferPool<D>, handle: FrameHandle<'a>) -> Self {
        Self {
            pool,
            frame_id: handle.frame_id(),
            page_id: handle.page_id(),
            lock: ManuallyDrop::new(handle.read()),
        }
    }

    #[inline]
    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    #[inline]
    pub fn frame_id(&self) -> FrameId {
        self.frame_id
    }
}

impl<D: DiskManager> Deref for PageReadGuard<'_, D> {
    type Target = Page;

    #[inline]
    fn deref(&self) -> &Page {
        &self.lock
    }
}

impl<D: DiskManager> Drop for PageReadGuard<'_, D> {
    fn drop(&mut self) {
        // SAFETY: `lock` is dropped exactly once, here, and not touched again.
        unsafe { ManuallyDrop::drop(&mut self.lock) };
        if let Err(err) = self.pool.unpin(self.page_id, false) {
            error!(page_id = %self.page_id, %err, "read guard failed to unpin");
        }
    }
}

/// Guard for exclusive write access to a page.
///
/// Only one `PageWriteGuard` can exist for a page at a time.
/// The page is unpinned dirty when the guard is dropped.
pub struct PageWriteGuard<'a, D: DiskManager> {
    pool: &'a BufferPool<D>,
    frame_id: FrameId,
    page_id: PageId,
    lock: ManuallyDrop<RwLockWriteGuard<'a, Page>>,
}

impl<'a, D: DiskManager> PageWriteGuard<'a, D> {
    pub(crate) fn new(pool: &'a BufferPool<D>, handle: FrameHandle<'a>) -> Self {
        Self {
            pool,
            frame_id: handle.frame_id(),
            page_id: handle.page_id(),
            lock: ManuallyDrop::new(handle.write()),
        }
    }

    #[inline]
    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    #[inline]
    pub fn frame_id(&self) -> FrameId {
        self.frame_id
    }
}

impl<D: DiskManager> Deref for PageWriteGuard<'_, D> {
    type Target = Page;

    #[inline]
    fn deref(&self) -> &Page {
        &self.lock
    }
}

impl<D: DiskManager> DerefMut for PageWriteGuard<'_, D> {
    #[inline]
    fn deref_mut(&mut self) -> &mut Page {
        &mut self.lock
    }
}

impl<D: DiskManager> Drop for PageWriteGuard<'_, D> {
    fn drop(&mut self) {
        // SAFETY: `lock` is dropped exactly once, here, and not touched again.
        unsafe { ManuallyDrop::drop(&mut self.lock) };
        if let Err(err) = self.pool.unpin(self.page_id, true) {
            error!(page_id = %self.page_id, %err, "write guard failed to unpin");
        }
    }
}
