//! Frame - a slot in the buffer pool.
//!
//! A [`Frame`] holds a [`Page`] plus the [`FrameMeta`] record the pool uses
//! to manage it:
//! - Which page is loaded (if any)
//! - Pin count for reference counting
//! - Dirty flag for write-back tracking
//! - A single [`FrameState`] instead of overlapping booleans

use parking_lot::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::common::{Error, PageId, Result};
use crate::storage::Page;

/// Residency state of a frame.
///
/// - `Free` ⇔ the frame holds no page
/// - `Pinned` ⇔ the frame holds a page with `pin_count > 0`
/// - `Evictable` ⇔ the frame holds a page with `pin_count == 0`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrameState {
    #[default]
    Free,
    Pinned,
    Evictable,
}

/// Bookkeeping for one frame.
///
/// Every transition goes through a method here so `state` can never drift
/// from `page_id` and `pin_count`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameMeta {
    page_id: Option<PageId>,
    pin_count: u32,
    dirty: bool,
    state: FrameState,
}

impl FrameMeta {
    #[inline]
    pub fn page_id(&self) -> Option<PageId> {
        self.page_id
    }

    #[inline]
    pub fn pin_count(&self) -> u32 {
        self.pin_count
    }

    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    #[inline]
    pub fn state(&self) -> FrameState {
        self.state
    }

    #[inline]
    pub fn is_evictable(&self) -> bool {
        self.state == FrameState::Evictable
    }

    /// Increment the pin count of a resident frame. Returns the new count.
    ///
    /// # Panics
    /// Panics if the frame holds no page.
    pub fn pin(&mut self) -> u32 {
        assert!(self.page_id.is_some(), "pin of a free frame");
        self.pin_count += 1;
        self.state = FrameState::Pinned;
        self.pin_count
    }

    /// Decrement the pin count. Returns the new count.
    ///
    /// # Errors
    /// `Error::OverPin` if the count is already zero; nothing changes.
    pub fn unpin(&mut self) -> Result<u32> {
        if self.pin_count == 0 {
            return Err(Error::OverPin(self.page_id.unwrap_or(PageId::INVALID)));
        }
        self.pin_count -= 1;
        if self.pin_count == 0 {
            self.state = FrameState::Evictable;
        }
        Ok(self.pin_count)
    }

    #[inline]
    pub fn set_dirty(&mut self, dirty: bool) {
        self.dirty = dirty;
    }

    /// Bind `page_id` to this frame: pinned once, clean.
    pub fn occupy(&mut self, page_id: PageId) {
        *self = FrameMeta {
            page_id: Some(page_id),
            pin_count: 1,
            dirty: false,
            state: FrameState::Pinned,
        };
    }

    /// Drop the binding and return to `Free`.
    pub fn vacate(&mut self) {
        *self = FrameMeta::default();
    }
}

/// A frame in the buffer pool.
///
/// # Thread Safety
/// - `page`: `RwLock`, taken by callers while they hold a pin; the pool latch
///   is not held for page content access
/// - `meta`: `Mutex`, only mutated while the pool latch is held
pub struct Frame {
    page: RwLock<Page>,
    meta: Mutex<FrameMeta>,
}

impl Frame {
    /// Create a new empty frame.
    pub fn new() -> Self {
        Self {
            page: RwLock::new(Page::new()),
            meta: Mutex::new(FrameMeta::default()),
        }
    }

    /// Acquire read lock on the page.
    #[inline]
    pub fn page(&self) -> RwLockReadGuard<'_, Page> {
        self.page.read()
    }

    /// Acquire write lock on the page.
    #[inline]
    pub fn page_mut(&self) -> RwLockWriteGuard<'_, Page> {
        self.page.write()
    }

    /// Copy of the current bookkeeping.
    #[inline]
    pub fn meta(&self) -> FrameMeta {
        *self.meta.lock()
    }

    /// Apply `f` to the bookkeeping record.
    #[inline]
    pub(crate) fn update<R>(&self, f: impl FnOnce(&mut FrameMeta) -> R) -> R {
        let mut meta = self.meta.lock();
        f(&mut *meta)
    }
}

impl Default for Frame {
    fn default() -> Self {
        Self::new()
    }
}
