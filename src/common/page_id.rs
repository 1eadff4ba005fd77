//! Page identifier type.

use std::fmt;

/// Identifies a page on disk.
///
/// Page ids are handed out by the disk collaborator and stay stable for the
/// lifetime of the page. `allocate_pages(n)` returns the first id of a
/// contiguous run, so the rest of the run is reached with [`PageId::offset`].
///
/// # Example
/// ```
/// use lirsdb::PageId;
///
/// let first = PageId::new(10);
/// assert_eq!(first.offset(2), PageId::new(12));
/// assert!(first.is_valid());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageId(pub u32);

impl PageId {
    /// Invalid/sentinel page ID.
    pub const INVALID: PageId = PageId(u32::MAX);

    /// Create a new PageId.
    #[inline]
    pub fn new(id: u32) -> Self {
        PageId(id)
    }

    /// Check if this page ID is valid (not the sentinel value).
    #[inline]
    pub fn is_valid(&self) -> bool {
        *self != Self::INVALID
    }

    /// The id `n` pages after this one in a contiguous run.
    #[inline]
    pub fn offset(self, n: u32) -> PageId {
        PageId(self.0 + n)
    }
}

impl From<u32> for PageId {
    fn from(id: u32) -> Self {
        PageId(id)
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::INVALID {
            write!(f, "Page(INVALID)")
        } else {
            write!(f, "Page({})", self.0)
        }
    }
}
