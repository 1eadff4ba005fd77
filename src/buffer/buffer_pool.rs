//! Buffer Pool - the orchestrator of the page caching layer.
//!
//! The [`BufferPool`] provides:
//! - Page caching between the disk collaborator and memory
//! - The pin/unpin protocol
//! - Deferred write-back of dirty pages (at eviction or flush)
//! - Victim selection through the approximate-LIRS [`LirsReplacer`]

use parking_lot::{MappedMutexGuard, Mutex, MutexGuard};
use tracing::{debug, info, trace, warn};

use crate::buffer::replacer::LirsReplacer;
use crate::buffer::{
    BufferPoolStats, FrameHandle, FrameState, FrameStore, PageDirectory, PageReadGuard,
    PageWriteGuard,
};
use crate::common::{BufferPoolConfig, Error, FrameId, PageId, Result};
use crate::storage::DiskManager;

/// Everything the pool latch protects.
struct PoolState<D> {
    directory: PageDirectory,
    replacer: LirsReplacer,
    disk: D,
}

/// Manages a fixed pool of frames for caching disk pages.
///
/// # Architecture
/// ```text
/// ┌──────────────────────────────────────────────────────────────┐
/// │                         BufferPool                           │
/// │  latch: Mutex ─────────────────────────────────────────┐     │
/// │  │ ┌──────────────┐  ┌──────────────┐  ┌────────────┐  │     │
/// │  │ │PageDirectory │  │ LirsReplacer │  │ disk: D    │  │     │
/// │  │ │ PageId → Fid │  │ free list,   │  │DiskManager │  │     │
/// │  │ └──────────────┘  │ stats, clock │  └────────────┘  │     │
/// │  │                   └──────────────┘                  │     │
/// │  └─────────────────────────────────────────────────────┘     │
/// │  frames: FrameStore  [Frame0] [Frame1] [Frame2] ...          │
/// │          (RwLock<Page> + FrameMeta per frame)                │
/// └──────────────────────────────────────────────────────────────┘
/// ```
///
/// # Thread Safety
/// - The latch is held for every directory, bookkeeping and replacer change,
///   and for the whole miss path including disk I/O, so one page is read at
///   most once per fault.
/// - Page bytes are accessed outside the latch through the frame's `RwLock`.
///   A pinned frame is never evicted, so the pin is what protects them.
/// - While holding the latch the pool only waits for page locks of unpinned
///   frames (eviction, free). Page locks of pinned frames may be held while
///   taking the latch: flushes pin their targets, release the latch, and take
///   the page lock before the latch again. A page lock must be released
///   before its pin, which the guards do on drop.
/// - Do not call `flush_page` for a page whose write lock the same thread
///   holds, and do not call pool methods while holding the guard returned by
///   [`BufferPool::disk`].
///
/// # Usage
/// ```
/// use lirsdb::{BufferPool, MemoryDiskManager};
///
/// let pool = BufferPool::new(8, MemoryDiskManager::new());
///
/// // Allocate a page; it comes back pinned once
/// let pid = pool.new_pages(1).unwrap();
/// let handle = pool.pin(pid, false).unwrap();
/// handle.write().as_mut_slice()[0] = 0xAB;
/// pool.unpin(pid, true).unwrap();
/// pool.unpin(pid, false).unwrap();
///
/// // Guards unpin on drop
/// let guard = pool.fetch_page_read(pid).unwrap();
/// assert_eq!(guard.as_slice()[0], 0xAB);
/// ```
pub struct BufferPool<D: DiskManager> {
    frames: FrameStore,
    latch: Mutex<PoolState<D>>,
    stats: BufferPoolStats,
    config: BufferPoolConfig,
}

impl<D: DiskManager> BufferPool<D> {
    /// Create a pool of `num_buffers` frames over `disk`.
    ///
    /// # Panics
    /// Panics if `num_buffers` is 0.
    pub fn new(num_buffers: usize, disk: D) -> Self {
        assert!(num_buffers > 0, "num_buffers must be > 0");
        Self::build(BufferPoolConfig::with_buffers(num_buffers), disk)
    }

    /// Create a pool from a validated configuration.
    pub fn with_config(config: BufferPoolConfig, disk: D) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config, disk))
    }

    fn build(config: BufferPoolConfig, disk: D) -> Self {
        let n = config.num_buffers;
        info!(num_buffers = n, "buffer pool created");

        Self {
            frames: FrameStore::new(n),
            latch: Mutex::new(PoolState {
                directory: PageDirectory::new(n),
                replacer: LirsReplacer::new(n),
                disk,
            }),
            stats: BufferPoolStats::new(),
            config,
        }
    }

    // ========================================================================
    // Pin protocol
    // ========================================================================

    /// Pin `page_id`, loading it if it is not resident.
    ///
    /// With `empty_page`, a miss skips the disk read and hands back a zeroed
    /// buffer; use it for freshly allocated pages.
    ///
    /// # Errors
    /// - `Error::PoolExhausted` if the page is not resident and every frame
    ///   is pinned
    /// - `Error::Upstream` if writing back the victim or reading the page
    ///   fails
    pub fn pin(&self, page_id: PageId, empty_page: bool) -> Result<FrameHandle<'_>> {
        let mut state = self.latch.lock();
        let frame_id = self.pin_locked(&mut state, page_id, empty_page)?;
        Ok(FrameHandle::new(self.frames.frame(frame_id), frame_id, page_id))
    }

    /// Release one pin on `page_id`, recording whether the caller changed it.
    ///
    /// # Errors
    /// - `Error::NotFound` if the page is not resident
    /// - `Error::OverPin` if the page has no pins; nothing changes
    pub fn unpin(&self, page_id: PageId, dirty: bool) -> Result<()> {
        let mut state = self.latch.lock();
        let frame_id = state
            .directory
            .lookup(page_id)
            .ok_or(Error::NotFound(page_id))?;
        self.check_binding(frame_id, page_id);

        let remaining = self.frames.dec_pin(frame_id)?;
        if dirty {
            self.frames.set_dirty(frame_id, true);
        }
        if remaining == 0 {
            state.replacer.on_became_evictable(frame_id)?;
        }

        trace!(%page_id, remaining, dirty, "unpin");
        Ok(())
    }

    // ========================================================================
    // Allocation
    // ========================================================================

    /// Allocate `count` contiguous pages and pin the first one.
    ///
    /// The first page is resident, zeroed and pinned once on return; the
    /// others are only allocated. If the first page cannot be pinned the
    /// whole run is deallocated again before the error is returned.
    ///
    /// # Errors
    /// - `Error::InvalidPageCount` if `count` is 0
    /// - `Error::PoolExhausted` if every frame is pinned
    /// - `Error::Upstream` for disk failures
    pub fn new_pages(&self, count: usize) -> Result<PageId> {
        self.allocate_run(count).map(|(first, _)| first)
    }

    /// Allocate one page and return it write-locked.
    pub fn new_page(&self) -> Result<PageWriteGuard<'_, D>> {
        let (page_id, frame_id) = self.allocate_run(1)?;
        let handle = FrameHandle::new(self.frames.frame(frame_id), frame_id, page_id);
        Ok(PageWriteGuard::new(self, handle))
    }

    /// Deallocate `page_id` on disk.
    ///
    /// A resident, unpinned copy is discarded without write-back and its
    /// frame goes back to the free list.
    ///
    /// # Errors
    /// - `Error::PagePinned` if the page is pinned
    /// - `Error::Upstream` if the disk refuses the deallocation; the pool is
    ///   unchanged
    pub fn free_page(&self, page_id: PageId) -> Result<()> {
        let mut state = self.latch.lock();
        let resident = state.directory.lookup(page_id);

        if let Some(frame_id) = resident {
            self.check_binding(frame_id, page_id);
            if self.frames.pin_count(frame_id) > 0 {
                return Err(Error::PagePinned(page_id));
            }
        }

        state
            .disk
            .deallocate_page(page_id)
            .map_err(|e| Error::upstream(format!("while freeing {page_id}"), e))?;

        if let Some(frame_id) = resident {
            state.directory.remove(page_id)?;
            self.frames.clear(frame_id);
            state.replacer.on_freed(frame_id);
        }

        debug!(%page_id, was_resident = resident.is_some(), "freed page");
        Ok(())
    }

    // ========================================================================
    // Flushing
    // ========================================================================

    /// Write `page_id` back to disk, pinned or not, dirty or not.
    ///
    /// The page is pinned for the duration of the write and waits for any
    /// writer holding its page lock.
    ///
    /// # Errors
    /// - `Error::NotFound` if the page is not resident
    /// - `Error::Upstream` if the write fails; the dirty flag is kept
    pub fn flush_page(&self, page_id: PageId) -> Result<()> {
        let frame_id = {
            let mut state = self.latch.lock();
            let frame_id = state
                .directory
                .lookup(page_id)
                .ok_or(Error::NotFound(page_id))?;
            self.check_binding(frame_id, page_id);
            self.hold_frame(&mut state, frame_id)?;
            frame_id
        };

        self.flush_held(frame_id, page_id)
            .map_err(|e| Error::upstream(format!("while flushing {page_id}"), e))
    }

    /// Write back every dirty resident page, pinned or evictable.
    ///
    /// Pages are written in page id order; the first failure stops the
    /// flush and leaves the remaining pages dirty.
    pub fn flush_all_pages(&self) -> Result<()> {
        let targets = {
            let mut state = self.latch.lock();
            let mut dirty: Vec<(PageId, FrameId)> = state
                .directory
                .iter()
                .filter(|&(_, frame_id)| self.frames.is_dirty(frame_id))
                .collect();
            dirty.sort_unstable();

            for &(_, frame_id) in &dirty {
                self.hold_frame(&mut state, frame_id)?;
            }
            dirty
        };

        let mut result = Ok(());
        for &(page_id, frame_id) in &targets {
            if result.is_ok() {
                result = self
                    .flush_held(frame_id, page_id)
                    .map_err(|e| Error::upstream(format!("while flushing {page_id}"), e));
            } else {
                let mut state = self.latch.lock();
                self.release_frame(&mut state, frame_id)?;
            }
        }

        debug!(pages = targets.len(), ok = result.is_ok(), "flushed dirty pages");
        result
    }

    // ========================================================================
    // Guards
    // ========================================================================

    /// Pin `page_id` and take its read lock; unpins clean on drop.
    pub fn fetch_page_read(&self, page_id: PageId) -> Result<PageReadGuard<'_, D>> {
        let handle = self.pin(page_id, false)?;
        Ok(PageReadGuard::new(self, handle))
    }

    /// Pin `page_id` and take its write lock; unpins dirty on drop.
    pub fn fetch_page_write(&self, page_id: PageId) -> Result<PageWriteGuard<'_, D>> {
        let handle = self.pin(page_id, false)?;
        Ok(PageWriteGuard::new(self, handle))
    }

    // ========================================================================
    // Introspection
    // ========================================================================

    /// Total number of frames.
    pub fn num_buffers(&self) -> usize {
        self.frames.len()
    }

    /// Frames that are free or evictable.
    pub fn num_unpinned(&self) -> usize {
        let state = self.latch.lock();
        state.replacer.free_len() + state.replacer.evictable_len()
    }

    /// Pin count of a resident page.
    pub fn pin_count(&self, page_id: PageId) -> Option<u32> {
        let state = self.latch.lock();
        state
            .directory
            .lookup(page_id)
            .map(|frame_id| self.frames.pin_count(frame_id))
    }

    /// Dirty flag of a resident page.
    pub fn is_dirty(&self, page_id: PageId) -> Option<bool> {
        let state = self.latch.lock();
        state
            .directory
            .lookup(page_id)
            .map(|frame_id| self.frames.is_dirty(frame_id))
    }

    /// Frame state of a resident page.
    pub fn frame_state(&self, page_id: PageId) -> Option<FrameState> {
        let state = self.latch.lock();
        state
            .directory
            .lookup(page_id)
            .map(|frame_id| self.frames.state(frame_id))
    }

    pub fn contains(&self, page_id: PageId) -> bool {
        self.latch.lock().directory.contains(page_id)
    }

    /// Resident page ids, ascending.
    pub fn resident_pages(&self) -> Vec<PageId> {
        let state = self.latch.lock();
        let mut pages: Vec<PageId> = state.directory.iter().map(|(pid, _)| pid).collect();
        pages.sort_unstable();
        pages
    }

    pub fn stats(&self) -> &BufferPoolStats {
        &self.stats
    }

    pub fn config(&self) -> &BufferPoolConfig {
        &self.config
    }

    /// Exclusive access to the disk collaborator, e.g. for file entries.
    ///
    /// The pool latch is held while the guard lives.
    pub fn disk(&self) -> MappedMutexGuard<'_, D> {
        MutexGuard::map(self.latch.lock(), |state| &mut state.disk)
    }

    // ========================================================================
    // Internal
    // ========================================================================

    fn pin_locked(
        &self,
        state: &mut PoolState<D>,
        page_id: PageId,
        empty_page: bool,
    ) -> Result<FrameId> {
        if let Some(frame_id) = state.directory.lookup(page_id) {
            self.check_binding(frame_id, page_id);

            self.hold_frame(state, frame_id)?;
            state.replacer.on_access(frame_id)?;
            self.stats.record_hit();

            trace!(%page_id, %frame_id, "pin hit");
            return Ok(frame_id);
        }

        self.stats.record_miss();
        let frame_id = self.load_page(state, page_id, empty_page)?;
        state.replacer.on_access(frame_id)?;
        Ok(frame_id)
    }

    fn allocate_run(&self, count: usize) -> Result<(PageId, FrameId)> {
        if count == 0 {
            return Err(Error::InvalidPageCount(count));
        }
        let run = u32::try_from(count).map_err(|_| Error::InvalidPageCount(count))?;

        let mut state = self.latch.lock();
        let first = state
            .disk
            .allocate_pages(count)
            .map_err(|e| Error::upstream(format!("while allocating {count} pages"), e))?;

        match self.pin_locked(&mut state, first, true) {
            Ok(frame_id) => {
                debug!(%first, count, "allocated pages");
                Ok((first, frame_id))
            }
            Err(err) => {
                self.rollback_allocation(&mut state, first, run);
                Err(err)
            }
        }
    }

    /// Claim a frame for `page_id` and fill it. Returns with the frame
    /// pinned once and bound in the directory.
    fn load_page(
        &self,
        state: &mut PoolState<D>,
        page_id: PageId,
        empty_page: bool,
    ) -> Result<FrameId> {
        let frame_id = state.replacer.get_victim()?;
        let previous = self.frames.page_id(frame_id);

        if let Some(old_page_id) = previous {
            debug_assert_eq!(self.frames.state(frame_id), FrameState::Evictable);

            if self.frames.is_dirty(frame_id) {
                self.write_back(state, frame_id, old_page_id).map_err(|e| {
                    Error::upstream(
                        format!("while evicting {frame_id} ({old_page_id}) to load {page_id}"),
                        e,
                    )
                })?;
            }
            self.stats.record_eviction();
            debug!(%frame_id, victim = %old_page_id, %page_id, "evicting");
        }

        let loaded = {
            let mut page = self.frames.data(frame_id);
            if empty_page {
                page.reset();
                Ok(())
            } else {
                state.disk.read_page(page_id, &mut page)
            }
        };

        if let Err(err) = loaded {
            // The old occupant is clean on disk; give up the half-filled frame.
            if let Some(old_page_id) = previous {
                state.directory.remove(old_page_id)?;
            }
            self.frames.clear(frame_id);
            state.replacer.on_freed(frame_id);
            return Err(Error::upstream(
                format!("while loading {page_id} into {frame_id}"),
                err,
            ));
        }

        if let Some(old_page_id) = previous {
            state.directory.remove(old_page_id)?;
        }
        state.directory.insert(page_id, frame_id)?;
        self.frames.reset(frame_id, page_id);
        state.replacer.admit(frame_id);

        if !empty_page {
            self.stats.record_read();
        }
        debug!(%page_id, %frame_id, empty_page, "pin miss");
        Ok(frame_id)
    }

    /// Add a pin to a resident frame without counting an access.
    fn hold_frame(&self, state: &mut PoolState<D>, frame_id: FrameId) -> Result<()> {
        if self.frames.inc_pin(frame_id) == 1 {
            state.replacer.on_became_pinned(frame_id)?;
        }
        Ok(())
    }

    /// Drop a pin taken by `hold_frame`.
    fn release_frame(&self, state: &mut PoolState<D>, frame_id: FrameId) -> Result<()> {
        if self.frames.dec_pin(frame_id)? == 0 {
            state.replacer.on_became_evictable(frame_id)?;
        }
        Ok(())
    }

    /// Write back a frame held by `hold_frame`, then release it.
    ///
    /// The page lock is taken before the latch so the flush queues behind a
    /// writer on this page without blocking the rest of the pool.
    fn flush_held(&self, frame_id: FrameId, page_id: PageId) -> Result<()> {
        let page = self.frames.read(frame_id);
        let mut state = self.latch.lock();

        let written = state.disk.write_page(page_id, &page);
        drop(page);
        if written.is_ok() {
            self.frames.set_dirty(frame_id, false);
            self.stats.record_write();
            trace!(%page_id, %frame_id, "flushed");
        }

        self.release_frame(&mut state, frame_id)?;
        written
    }

    /// Write an evictable frame's bytes to disk and clear its dirty flag.
    ///
    /// Called with the latch held; nobody holds the page lock of an
    /// unpinned frame, so this never waits on a caller.
    fn write_back(&self, state: &mut PoolState<D>, frame_id: FrameId, page_id: PageId) -> Result<()> {
        {
            let page = self.frames.read(frame_id);
            state.disk.write_page(page_id, &page)?;
        }
        self.frames.set_dirty(frame_id, false);
        self.stats.record_write();

        trace!(%page_id, %frame_id, "wrote back");
        Ok(())
    }

    /// Give back a run `new_pages` could not pin.
    fn rollback_allocation(&self, state: &mut PoolState<D>, first: PageId, count: u32) {
        for n in 0..count {
            let page_id = first.offset(n);
            if let Err(err) = state.disk.deallocate_page(page_id) {
                warn!(%page_id, %err, "rollback could not deallocate page");
            }
        }
        self.stats.record_rollback();
        debug!(%first, count, "rolled back allocation");
    }

    /// Directory and frame store must agree; anything else is corruption.
    fn check_binding(&self, frame_id: FrameId, page_id: PageId) {
        let resident = self.frames.page_id(frame_id);
        assert_eq!(
            resident,
            Some(page_id),
            "page directory maps {page_id} to {frame_id}, which holds {resident:?}"
        );
    }
}

impl<D: DiskManager> Drop for BufferPool<D> {
    fn drop(&mut self) {
        if self.config.flush_on_drop {
            if let Err(err) = self.flush_all_pages() {
                warn!(%err, "flush on drop failed; dirty pages lost");
            }
        }
    }
}
