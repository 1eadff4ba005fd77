//! Page Directory - which page lives in which frame.

use std::collections::HashMap;

use crate::common::{Error, FrameId, PageId, Result};

/// Injective mapping from resident page ids to frames.
///
/// The forward map answers "where is page P"; the per-frame table answers
/// "what does frame F hold" and keeps two pages from sharing a frame.
#[derive(Debug)]
pub struct PageDirectory {
    entries: HashMap<PageId, FrameId>,
    by_frame: Vec<Option<PageId>>,
}

impl PageDirectory {
    /// An empty directory for a pool of `num_frames` frames.
    pub fn new(num_frames: usize) -> Self {
        Self {
            entries: HashMap::with_capacity(num_frames),
            by_frame: vec![None; num_frames],
        }
    }

    /// Frame holding `page_id`, if resident.
    #[inline]
    pub fn lookup(&self, page_id: PageId) -> Option<FrameId> {
        self.entries.get(&page_id).copied()
    }

    #[inline]
    pub fn contains(&self, page_id: PageId) -> bool {
        self.entries.contains_key(&page_id)
    }

    /// Page bound to `frame_id`, if any.
    #[inline]
    pub fn page_at(&self, frame_id: FrameId) -> Option<PageId> {
        self.by_frame[frame_id.0]
    }

    /// Bind `page_id` to `frame_id`.
    ///
    /// # Errors
    /// `Error::AlreadyPresent` if the page already has a frame.
    ///
    /// # Panics
    /// Panics if the frame is already bound to another page.
    pub fn insert(&mut self, page_id: PageId, frame_id: FrameId) -> Result<()> {
        if self.entries.contains_key(&page_id) {
            return Err(Error::AlreadyPresent(page_id));
        }
        if let Some(occupant) = self.by_frame[frame_id.0] {
            panic!("{frame_id} already holds {occupant}, cannot bind {page_id}");
        }

        self.entries.insert(page_id, frame_id);
        self.by_frame[frame_id.0] = Some(page_id);
        Ok(())
    }

    /// Drop the binding for `page_id`, returning the frame it occupied.
    ///
    /// # Errors
    /// `Error::NotFound` if the page is not resident.
    pub fn remove(&mut self, page_id: PageId) -> Result<FrameId> {
        let frame_id = self
            .entries
            .remove(&page_id)
            .ok_or(Error::NotFound(page_id))?;
        self.by_frame[frame_id.0] = None;
        Ok(frame_id)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All bindings, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (PageId, FrameId)> + '_ {
        self.entries.iter().map(|(&pid, &fid)| (pid, fid))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_lookup_remove() {
        let mut dir = PageDirectory::new(4);
        assert!(dir.is_empty());
        assert_eq!(dir.lookup(PageId::new(10)), None);

        dir.insert(PageId::new(10), FrameId::new(2)).unwrap();
        assert_eq!(dir.lookup(PageId::new(10)), Some(FrameId::new(2)));
        assert_eq!(dir.page_at(FrameId::new(2)), Some(PageId::new(10)));
        assert_eq!(dir.len(), 1);

        assert_eq!(dir.remove(PageId::new(10)).unwrap(), FrameId::new(2));
        assert!(!dir.contains(PageId::new(10)));
        assert_eq!(dir.page_at(FrameId::new(2)), None);
    }

    #[test]
    fn test_duplicate_page_rejected() {
        let mut dir = PageDirectory::new(4);
        dir.insert(PageId::new(1), FrameId::new(0)).unwrap();

        assert!(matches!(
            dir.insert(PageId::new(1), FrameId::new(3)),
            Err(Error::AlreadyPresent(pid)) if pid == PageId::new(1)
        ));
        // Original binding survives
        assert_eq!(dir.lookup(PageId::new(1)), Some(FrameId::new(0)));
        assert_eq!(dir.page_at(FrameId::new(3)), None);
    }

    #[test]
    #[should_panic(expected = "already holds")]
    fn test_shared_frame_panics() {
        let mut dir = PageDirectory::new(2);
        dir.insert(PageId::new(1), FrameId::new(0)).unwrap();
        let _ = dir.insert(PageId::new(2), FrameId::new(0));
    }

    #[test]
    fn test_remove_missing() {
        let mut dir = PageDirectory::new(2);
        assert!(matches!(
            dir.remove(PageId::new(5)),
            Err(Error::NotFound(pid)) if pid == PageId::new(5)
        ));
    }

    #[test]
    fn test_frame_reuse_after_remove() {
        let mut dir = PageDirectory::new(1);
        dir.insert(PageId::new(1), FrameId::new(0)).unwrap();
        dir.remove(PageId::new(1)).unwrap();
        dir.insert(PageId::new(2), FrameId::new(0)).unwrap();

        let bindings: Vec<_> = dir.iter().collect();
        assert_eq!(bindings, vec![(PageId::new(2), FrameId::new(0))]);
    }
}
