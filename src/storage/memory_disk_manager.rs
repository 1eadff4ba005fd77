//! In-memory disk manager.
//!
//! A heap-backed [`DiskManager`] for scratch pools and tests. It counts
//! every call the buffer pool makes and can be told to fail I/O, which makes
//! pool behavior (no read on a hit, exactly one write per flush, rollback
//! after a failed miss) directly observable.

use std::collections::{BTreeMap, HashMap};

use crate::common::config::PAGE_SIZE;
use crate::common::{Error, PageId, Result};
use crate::storage::disk_header::DiskHeader;
use crate::storage::{DiskManager, Page};

/// Which calls [`MemoryDiskManager`] should fail.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FailurePlan {
    pub reads: bool,
    pub writes: bool,
    pub allocations: bool,
}

/// Call counters kept by [`MemoryDiskManager`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiskCounters {
    pub reads: u64,
    pub writes: u64,
    pub allocations: u64,
    pub deallocations: u64,
}

/// A purely in-memory disk.
///
/// Page ids start at 1 so that `PageId(0)` never names a live page, the
/// same as on a [`FileDiskManager`](super::FileDiskManager).
#[derive(Debug)]
pub struct MemoryDiskManager {
    pages: HashMap<PageId, Box<[u8]>>,
    next_page_id: u32,
    files: BTreeMap<String, PageId>,
    counters: DiskCounters,
    writes_per_page: HashMap<PageId, u64>,
    failures: FailurePlan,
}

impl MemoryDiskManager {
    pub fn new() -> Self {
        Self {
            pages: HashMap::new(),
            next_page_id: 1,
            files: BTreeMap::new(),
            counters: DiskCounters::default(),
            writes_per_page: HashMap::new(),
            failures: FailurePlan::default(),
        }
    }

    /// Snapshot of the call counters.
    pub fn counters(&self) -> DiskCounters {
        self.counters
    }

    /// How many times `write_page` succeeded for `page_id`.
    pub fn writes_of(&self, page_id: PageId) -> u64 {
        self.writes_per_page.get(&page_id).copied().unwrap_or(0)
    }

    /// The stored bytes of a live page.
    pub fn page_bytes(&self, page_id: PageId) -> Option<&[u8]> {
        self.pages.get(&page_id).map(|bytes| &bytes[..])
    }

    /// Make subsequent calls fail according to `plan`.
    pub fn set_failures(&mut self, plan: FailurePlan) {
        self.failures = plan;
    }

    fn injected(what: &str) -> Error {
        Error::Io(std::io::Error::new(
            std::io::ErrorKind::Other,
            format!("injected {what} failure"),
        ))
    }
}

impl Default for MemoryDiskManager {
    fn default() -> Self {
        Self::new()
    }
}

impl DiskManager for MemoryDiskManager {
    fn allocate_pages(&mut self, count: usize) -> Result<PageId> {
        if count == 0 {
            return Err(Error::InvalidPageCount(count));
        }
        if self.failures.allocations {
            return Err(Self::injected("allocation"));
        }

        let run = u32::try_from(count).map_err(|_| Error::InvalidPageCount(count))?;
        let end = self
            .next_page_id
            .checked_add(run)
            .ok_or(Error::InvalidPageCount(count))?;

        let first = PageId::new(self.next_page_id);
        for n in 0..run {
            self.pages
                .insert(first.offset(n), vec![0u8; PAGE_SIZE].into_boxed_slice());
        }
        self.next_page_id = end;
        self.counters.allocations += 1;
        Ok(first)
    }

    fn deallocate_page(&mut self, page_id: PageId) -> Result<()> {
        if self.pages.remove(&page_id).is_none() {
            return Err(Error::PageNotFound(page_id.0));
        }
        self.counters.deallocations += 1;
        Ok(())
    }

    fn read_page(&mut self, page_id: PageId, out: &mut Page) -> Result<()> {
        if self.failures.reads {
            return Err(Self::injected("read"));
        }
        let bytes = self
            .pages
            .get(&page_id)
            .ok_or(Error::PageNotFound(page_id.0))?;
        out.as_mut_slice().copy_from_slice(bytes);
        self.counters.reads += 1;
        Ok(())
    }

    fn write_page(&mut self, page_id: PageId, page: &Page) -> Result<()> {
        if self.failures.writes {
            return Err(Self::injected("write"));
        }
        let bytes = self
            .pages
            .get_mut(&page_id)
            .ok_or(Error::PageNotFound(page_id.0))?;
        bytes.copy_from_slice(page.as_slice());
        self.counters.writes += 1;
        *self.writes_per_page.entry(page_id).or_insert(0) += 1;
        Ok(())
    }

    fn add_file_entry(&mut self, name: &str, start: PageId) -> Result<()> {
        DiskHeader::validate_name(name)?;
        if self.files.contains_key(name) {
            return Err(Error::DuplicateFileEntry(name.to_string()));
        }
        self.files.insert(name.to_string(), start);
        Ok(())
    }

    fn get_file_entry(&self, name: &str) -> Option<PageId> {
        self.files.get(name).copied()
    }

    fn delete_file_entry(&mut self, name: &str) -> Result<()> {
        self.files
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| Error::FileEntryNotFound(name.to_string()))
    }

    fn allocated_pages(&self) -> usize {
        self.pages.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_write_read() {
        let mut dm = MemoryDiskManager::new();
        let first = dm.allocate_pages(2).unwrap();
        assert_eq!(first, PageId::new(1));
        assert_eq!(dm.allocated_pages(), 2);

        let mut page = Page::new();
        page.as_mut_slice()[10] = 9;
        dm.write_page(first.offset(1), &page).unwrap();

        let mut out = Page::new();
        dm.read_page(first.offset(1), &mut out).unwrap();
        assert_eq!(out.as_slice()[10], 9);

        let counters = dm.counters();
        assert_eq!(counters.reads, 1);
        assert_eq!(counters.writes, 1);
        assert_eq!(dm.writes_of(first.offset(1)), 1);
        assert_eq!(dm.writes_of(first), 0);
    }

    #[test]
    fn test_allocate_past_id_space() {
        let mut dm = MemoryDiskManager::new();
        dm.next_page_id = u32::MAX - 2;

        assert!(matches!(
            dm.allocate_pages(5),
            Err(Error::InvalidPageCount(5))
        ));
        assert_eq!(dm.allocated_pages(), 0);
        assert_eq!(dm.counters().allocations, 0);

        #[cfg(target_pointer_width = "64")]
        assert!(matches!(
            dm.allocate_pages(u32::MAX as usize + 1),
            Err(Error::InvalidPageCount(_))
        ));
    }

    #[test]
    fn test_deallocate_unknown_page() {
        let mut dm = MemoryDiskManager::new();
        assert!(matches!(
            dm.deallocate_page(PageId::new(3)),
            Err(Error::PageNotFound(3))
        ));
    }

    #[test]
    fn test_injected_failures() {
        let mut dm = MemoryDiskManager::new();
        let pid = dm.allocate_pages(1).unwrap();
        dm.set_failures(FailurePlan {
            writes: true,
            ..FailurePlan::default()
        });

        assert!(dm.write_page(pid, &Page::new()).is_err());
        assert_eq!(dm.counters().writes, 0);

        let mut out = Page::new();
        assert!(dm.read_page(pid, &mut out).is_ok());
    }

    #[test]
    fn test_file_entries() {
        let mut dm = MemoryDiskManager::new();
        dm.add_file_entry("idx", PageId::new(4)).unwrap();
        assert_eq!(dm.get_file_entry("idx"), Some(PageId::new(4)));
        assert!(dm.add_file_entry("idx", PageId::new(5)).is_err());
        dm.delete_file_entry("idx").unwrap();
        assert!(dm.delete_file_entry("idx").is_err());
    }
}
