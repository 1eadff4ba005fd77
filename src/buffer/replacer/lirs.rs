//! Approximate LIRS replacement policy.
//!
//! LIRS ranks pages by *inter-reference recency*. This replacer keeps the
//! LIRS bookkeeping (recency, reuse distance, a logical clock) but not the
//! LIR/HIR stack split. Each tracked frame carries [`AccessStats`] and a
//! victim is chosen by a linear scan for the largest
//!
//! ```text
//! weight         = max(recency, reuse_distance)
//! recency        = clock - last_access_tick
//! reuse_distance = clock - last_access_tick
//! ```
//!
//! Both terms are refreshed against the clock at scan time, so the weight is
//! the number of accesses since the frame was last touched and the policy
//! behaves like recency-only replacement. Ties go to the lowest frame index.

use std::collections::{BTreeSet, VecDeque};

use crate::common::{Error, FrameId, Result};

/// Weight of an occupant that has not been accessed yet.
pub const INFINITE: u64 = u64::MAX;

/// Per-frame eviction metadata for the current occupant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessStats {
    /// Ticks since the last access, as of the most recent scan or access.
    pub recency: u64,
    /// Clock distance to the last access, as of the most recent scan.
    pub reuse_distance: u64,
    /// Clock value at the most recent access.
    pub last_access_tick: u64,
    accessed: bool,
}

impl AccessStats {
    /// Stats for a new occupant that has not been accessed yet.
    fn fresh() -> Self {
        Self {
            recency: INFINITE,
            reuse_distance: INFINITE,
            last_access_tick: 0,
            accessed: false,
        }
    }

    /// Refresh `recency` against `clock` and return the eviction weight.
    fn weigh(&mut self, clock: u64) -> u64 {
        if self.accessed {
            let idle = clock - self.last_access_tick;
            self.recency = idle;
            self.reuse_distance = idle;
        }
        self.recency.max(self.reuse_distance)
    }

    fn touch(&mut self, clock: u64) {
        self.recency = 0;
        self.reuse_distance = 0;
        self.last_access_tick = clock;
        self.accessed = true;
    }
}

/// Victim selection over a fixed set of frames.
///
/// Frames are in exactly one of three places:
/// - the free list (holding no page), in the order they became free
/// - tracked and evictable (resident, unpinned)
/// - tracked and pinned
///
/// [`get_victim`](Self::get_victim) only proposes a frame. The pool calls
/// [`admit`](Self::admit) once the frame is loaded, so a miss that fails
/// part-way leaves the replacer as it was.
#[derive(Debug)]
pub struct LirsReplacer {
    free_list: VecDeque<FrameId>,
    tracked: Vec<Option<AccessStats>>,
    evictable: BTreeSet<FrameId>,
    clock: u64,
}

impl LirsReplacer {
    /// A replacer for `num_frames` frames, all on the free list.
    pub fn new(num_frames: usize) -> Self {
        Self {
            free_list: (0..num_frames).map(FrameId::new).collect(),
            tracked: vec![None; num_frames],
            evictable: BTreeSet::new(),
            clock: 0,
        }
    }

    /// Pick the frame the next miss should use.
    ///
    /// The head of the free list if there is one; otherwise the evictable
    /// frame with the largest weight, lowest index on ties.
    ///
    /// # Errors
    /// `Error::PoolExhausted` if every frame is pinned.
    pub fn get_victim(&mut self) -> Result<FrameId> {
        if let Some(&frame_id) = self.free_list.front() {
            return Ok(frame_id);
        }

        let clock = self.clock;
        let mut best: Option<(FrameId, u64)> = None;
        for &frame_id in &self.evictable {
            let Some(stats) = self.tracked[frame_id.0].as_mut() else {
                continue;
            };
            let weight = stats.weigh(clock);
            // Ascending scan + strict comparison keeps the lowest index on ties.
            if best.map_or(true, |(_, top)| weight > top) {
                best = Some((frame_id, weight));
            }
        }

        best.map(|(frame_id, _)| frame_id)
            .ok_or(Error::PoolExhausted)
    }

    /// Start tracking a victim for its new occupant. The frame is pinned.
    pub fn admit(&mut self, frame_id: FrameId) {
        if self.free_list.front() == Some(&frame_id) {
            self.free_list.pop_front();
        } else {
            self.free_list.retain(|&fid| fid != frame_id);
        }
        self.evictable.remove(&frame_id);
        self.tracked[frame_id.0] = Some(AccessStats::fresh());
    }

    /// Record an access: recency to 0, stamp the clock, advance the clock.
    ///
    /// # Errors
    /// `Error::UntrackedFrame` if the frame holds no page.
    pub fn on_access(&mut self, frame_id: FrameId) -> Result<()> {
        let stats = self.tracked[frame_id.0]
            .as_mut()
            .ok_or(Error::UntrackedFrame(frame_id))?;
        stats.touch(self.clock);
        self.clock += 1;
        Ok(())
    }

    /// The frame's pin count dropped to zero.
    pub fn on_became_evictable(&mut self, frame_id: FrameId) -> Result<()> {
        self.ensure_tracked(frame_id)?;
        self.evictable.insert(frame_id);
        Ok(())
    }

    /// An evictable frame was pinned again.
    pub fn on_became_pinned(&mut self, frame_id: FrameId) -> Result<()> {
        self.ensure_tracked(frame_id)?;
        self.evictable.remove(&frame_id);
        Ok(())
    }

    /// The frame's page was dropped; it goes to the back of the free list.
    pub fn on_freed(&mut self, frame_id: FrameId) {
        self.tracked[frame_id.0] = None;
        self.evictable.remove(&frame_id);
        if !self.free_list.contains(&frame_id) {
            self.free_list.push_back(frame_id);
        }
    }

    /// Frames holding no page.
    #[inline]
    pub fn free_len(&self) -> usize {
        self.free_list.len()
    }

    /// Resident frames with no pins.
    #[inline]
    pub fn evictable_len(&self) -> usize {
        self.evictable.len()
    }

    #[inline]
    pub fn is_evictable(&self, frame_id: FrameId) -> bool {
        self.evictable.contains(&frame_id)
    }

    /// Current logical time.
    #[inline]
    pub fn clock(&self) -> u64 {
        self.clock
    }

    pub fn stats(&self, frame_id: FrameId) -> Option<AccessStats> {
        self.tracked[frame_id.0]
    }

    /// Weight `frame_id` would get in a scan right now.
    pub fn weight(&self, frame_id: FrameId) -> Option<u64> {
        self.tracked[frame_id.0].map(|mut stats| stats.weigh(self.clock))
    }

    fn ensure_tracked(&self, frame_id: FrameId) -> Result<()> {
        match self.tracked[frame_id.0] {
            Some(_) => Ok(()),
            None => Err(Error::UntrackedFrame(frame_id)),
        }
    }
}
