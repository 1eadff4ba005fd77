//! Frame Store - the fixed array of frames.

use parking_lot::{RwLockReadGuard, RwLockWriteGuard};

use crate::buffer::frame::{Frame, FrameMeta, FrameState};
use crate::common::{FrameId, PageId, Result};
use crate::storage::Page;

/// All frames of a pool, allocated once at construction.
///
/// Mutating methods are called by the pool with its latch held; the store
/// itself only keeps each frame's bookkeeping consistent.
pub struct FrameStore {
    frames: Vec<Frame>,
}

impl FrameStore {
    /// `num_frames` empty frames, all `Free`.
    pub fn new(num_frames: usize) -> Self {
        Self {
            frames: (0..num_frames).map(|_| Frame::new()).collect(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    #[inline]
    pub fn frame(&self, frame_id: FrameId) -> &Frame {
        &self.frames[frame_id.0]
    }

    #[inline]
    pub fn meta(&self, frame_id: FrameId) -> FrameMeta {
        self.frame(frame_id).meta()
    }

    #[inline]
    pub fn page_id(&self, frame_id: FrameId) -> Option<PageId> {
        self.meta(frame_id).page_id()
    }

    #[inline]
    pub fn pin_count(&self, frame_id: FrameId) -> u32 {
        self.meta(frame_id).pin_count()
    }

    #[inline]
    pub fn is_dirty(&self, frame_id: FrameId) -> bool {
        self.meta(frame_id).is_dirty()
    }

    #[inline]
    pub fn state(&self, frame_id: FrameId) -> FrameState {
        self.meta(frame_id).state()
    }

    /// Add a pin. Returns the new count.
    pub fn inc_pin(&self, frame_id: FrameId) -> u32 {
        self.frame(frame_id).update(FrameMeta::pin)
    }

    /// Drop a pin. Returns the new count; at zero the frame is `Evictable`.
    ///
    /// # Errors
    /// `Error::OverPin` if the frame has no pins.
    pub fn dec_pin(&self, frame_id: FrameId) -> Result<u32> {
        self.frame(frame_id).update(FrameMeta::unpin)
    }

    pub fn set_dirty(&self, frame_id: FrameId, dirty: bool) {
        self.frame(frame_id).update(|meta| meta.set_dirty(dirty));
    }

    /// Repurpose a frame for `page_id`: pinned once, clean.
    pub fn reset(&self, frame_id: FrameId, page_id: PageId) {
        self.frame(frame_id).update(|meta| meta.occupy(page_id));
    }

    /// Return a frame to `Free`, zeroing its bytes.
    pub fn clear(&self, frame_id: FrameId) {
        let frame = self.frame(frame_id);
        frame.page_mut().reset();
        frame.update(FrameMeta::vacate);
    }

    /// Shared access to a frame's bytes.
    #[inline]
    pub fn read(&self, frame_id: FrameId) -> RwLockReadGuard<'_, Page> {
        self.frame(frame_id).page()
    }

    /// Exclusive access to a frame's bytes.
    #[inline]
    pub fn data(&self, frame_id: FrameId) -> RwLockWriteGuard<'_, Page> {
        self.frame(frame_id).page_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Error;

    #[test]
    fn test_store_starts_free() {
        let store = FrameStore::new(4);
        assert_eq!(store.len(), 4);
        assert!((0..4)
            .map(FrameId::new)
            .all(|fid| store.state(fid) == FrameState::Free));
    }

    #[test]
    fn test_pin_lifecycle() {
        let store = FrameStore::new(2);
        let fid = FrameId::new(1);

        store.reset(fid, PageId::new(7));
        assert_eq!(store.page_id(fid), Some(PageId::new(7)));
        assert_eq!(store.state(fid), FrameState::Pinned);

        assert_eq!(store.inc_pin(fid), 2);
        assert_eq!(store.dec_pin(fid).unwrap(), 1);
        assert_eq!(store.dec_pin(fid).unwrap(), 0);
        assert_eq!(store.state(fid), FrameState::Evictable);

        assert!(matches!(store.dec_pin(fid), Err(Error::OverPin(_))));
        assert_eq!(store.pin_count(fid), 0);

        // Other frame untouched
        assert_eq!(store.state(FrameId::new(0)), FrameState::Free);
    }

    #[test]
    fn test_dirty_cleared_on_reset() {
        let store = FrameStore::new(1);
        let fid = FrameId::new(0);

        store.reset(fid, PageId::new(1));
        store.set_dirty(fid, true);
        assert!(store.is_dirty(fid));

        store.reset(fid, PageId::new(2));
        assert!(!store.is_dirty(fid));
    }

    #[test]
    fn test_clear_zeroes_bytes() {
        let store = FrameStore::new(1);
        let fid = FrameId::new(0);

        store.reset(fid, PageId::new(1));
        store.data(fid).as_mut_slice()[100] = 0xFF;
        store.dec_pin(fid).unwrap();

        store.clear(fid);
        assert_eq!(store.state(fid), FrameState::Free);
        assert_eq!(store.page_id(fid), None);
        assert!(store.read(fid).is_zeroed());
    }
}
