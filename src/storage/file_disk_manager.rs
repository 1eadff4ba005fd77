//! File-backed disk manager.
//!
//! The [`FileDiskManager`] handles all direct file operations:
//! - Reading and writing pages
//! - Allocating and deallocating runs of pages
//! - Keeping the header page (free list, file entries) in sync

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use tracing::{debug, info};

use crate::common::config::{MAX_PAGES, PAGE_SIZE};
use crate::common::{Error, PageId, Result};
use crate::storage::disk_header::DiskHeader;
use crate::storage::{DiskManager, Page};

/// Manages disk I/O for a single database file.
///
/// # File Layout
/// ```text
/// ┌─────────┬─────────┬─────────┬─────────┬─────────┐
/// │ Header  │ Page 1  │ Page 2  │  ...    │ Page N  │
/// │ (4KB)   │ (4KB)   │ (4KB)   │         │ (4KB)   │
/// └─────────┴─────────┴─────────┴─────────┴─────────┘
/// Offset:  0      4096     8192    ...    N×4096
/// ```
///
/// Page N is located at file offset `N × PAGE_SIZE`. Page 0 is the
/// [`DiskHeader`] and is never handed out.
///
/// # Durability
/// Page writes and header updates are followed by `fsync()`. Header updates
/// are built on a copy and only adopted once written, so a failed write
/// leaves the in-memory state unchanged.
pub struct FileDiskManager {
    file: File,
    header: DiskHeader,
}

impl FileDiskManager {
    /// Create a new database file.
    ///
    /// # Errors
    /// Returns an error if the file already exists or cannot be created.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path.as_ref())?;

        let mut dm = Self {
            file,
            header: DiskHeader::new(),
        };
        let header = dm.header.clone();
        dm.store_header(&header)?;

        info!(path = %path.as_ref().display(), "created database file");
        Ok(dm)
    }

    /// Open an existing database file.
    ///
    /// # Errors
    /// Returns an error if the file doesn't exist, or its header page is
    /// missing or corrupt.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path.as_ref())?;

        let mut page = Page::new();
        file.seek(SeekFrom::Start(0))?;
        file.read_exact(page.as_mut_slice())?;
        let header = DiskHeader::read_from(&page)?;

        let file_size = file.metadata()?.len();
        if file_size < header.page_count as u64 * PAGE_SIZE as u64 {
            return Err(Error::CorruptHeader(format!(
                "header claims {} pages but file holds {} bytes",
                header.page_count, file_size
            )));
        }

        info!(
            path = %path.as_ref().display(),
            pages = header.page_count,
            "opened database file"
        );
        Ok(Self { file, header })
    }

    /// Open an existing database file, or create if it doesn't exist.
    pub fn open_or_create<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::open(path)
        } else {
            Self::create(path)
        }
    }

    /// Number of pages in the file, header page included.
    #[inline]
    pub fn page_count(&self) -> u32 {
        self.header.page_count
    }

    /// Get the total size of the database file in bytes.
    #[inline]
    pub fn file_size(&self) -> u64 {
        (self.header.page_count as u64) * (PAGE_SIZE as u64)
    }

    /// Pages deallocated and waiting for reuse.
    pub fn free_pages(&self) -> impl Iterator<Item = PageId> + '_ {
        self.header.free_pages.iter().copied()
    }

    fn store_header(&mut self, header: &DiskHeader) -> Result<()> {
        let mut page = Page::new();
        header.write_to(&mut page)?;
        self.write_raw(0, &page)?;
        self.file.sync_all()?;
        Ok(())
    }

    fn write_raw(&mut self, page_no: u32, page: &Page) -> Result<()> {
        let offset = (page_no as u64) * (PAGE_SIZE as u64);
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(page.as_slice())?;
        Ok(())
    }

    /// Reject the header page, freed pages and pages past the end.
    fn check_live(&self, page_id: PageId) -> Result<()> {
        if page_id.0 == 0 || !page_id.is_valid() {
            return Err(Error::InvalidPageId(page_id.0));
        }
        if page_id.0 >= self.header.page_count || self.header.free_pages.contains(&page_id) {
            return Err(Error::PageNotFound(page_id.0));
        }
        Ok(())
    }

    /// First page of `count` consecutive freed pages, if any.
    fn find_free_run(&self, count: usize) -> Option<PageId> {
        let mut run_start: Option<PageId> = None;
        let mut run_len = 0usize;
        let mut prev: Option<PageId> = None;

        for &pid in &self.header.free_pages {
            match prev {
                Some(p) if p.0 + 1 == pid.0 => run_len += 1,
                _ => {
                    run_start = Some(pid);
                    run_len = 1;
                }
            }
            if run_len == count {
                return run_start;
            }
            prev = Some(pid);
        }
        None
    }
}

impl DiskManager for FileDiskManager {
    fn allocate_pages(&mut self, count: usize) -> Result<PageId> {
        if count == 0 {
            return Err(Error::InvalidPageCount(count));
        }
        let run = u32::try_from(count).map_err(|_| Error::InvalidPageCount(count))?;

        let zeros = Page::new();
        let mut next = self.header.clone();

        let first = match self.find_free_run(count) {
            Some(first) => {
                for n in 0..run {
                    next.free_pages.remove(&first.offset(n));
                }
                first
            }
            None => {
                let end = self.header.page_count as u64 + run as u64;
                if end > MAX_PAGES {
                    return Err(Error::InvalidPageCount(count));
                }
                next.page_count = u32::try_from(end).map_err(|_| Error::InvalidPageCount(count))?;
                PageId::new(self.header.page_count)
            }
        };

        // Allocated pages always read back as zeros, reused or not.
        for n in 0..run {
            self.write_raw(first.offset(n).0, &zeros)?;
        }
        self.store_header(&next)?;
        self.header = next;

        debug!(%first, count, "allocated pages");
        Ok(first)
    }

    fn deallocate_page(&mut self, page_id: PageId) -> Result<()> {
        self.check_live(page_id)?;

        let mut next = self.header.clone();
        next.free_pages.insert(page_id);
        self.store_header(&next)?;
        self.header = next;

        debug!(%page_id, "deallocated page");
        Ok(())
    }

    fn read_page(&mut self, page_id: PageId, out: &mut Page) -> Result<()> {
        self.check_live(page_id)?;

        let offset = (page_id.0 as u64) * (PAGE_SIZE as u64);
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.read_exact(out.as_mut_slice())?;
        Ok(())
    }

    fn write_page(&mut self, page_id: PageId, page: &Page) -> Result<()> {
        self.check_live(page_id)?;

        self.write_raw(page_id.0, page)?;
        self.file.sync_all()?; // fsync for durability
        Ok(())
    }

    fn add_file_entry(&mut self, name: &str, start: PageId) -> Result<()> {
        DiskHeader::validate_name(name)?;
        if self.header.file_entries.contains_key(name) {
            return Err(Error::DuplicateFileEntry(name.to_string()));
        }
        self.check_live(start)?;

        let mut next = self.header.clone();
        next.file_entries.insert(name.to_string(), start);
        self.store_header(&next)?;
        self.header = next;
        Ok(())
    }

    fn get_file_entry(&self, name: &str) -> Option<PageId> {
        self.header.file_entries.get(name).copied()
    }

    fn delete_file_entry(&mut self, name: &str) -> Result<()> {
        if !self.header.file_entries.contains_key(name) {
            return Err(Error::FileEntryNotFound(name.to_string()));
        }

        let mut next = self.header.clone();
        next.file_entries.remove(name);
        self.store_header(&next)?;
        self.header = next;
        Ok(())
    }

    fn allocated_pages(&self) -> usize {
        self.header.page_count as usize - 1 - self.header.free_pages.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_create_new_database() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");

        let dm = FileDiskManager::create(&path).unwrap();
        assert_eq!(dm.page_count(), 1);
        assert_eq!(dm.allocated_pages(), 0);
        assert_eq!(dm.file_size(), PAGE_SIZE as u64);
    }

    #[test]
    fn test_create_existing_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");

        FileDiskManager::create(&path).unwrap();
        assert!(FileDiskManager::create(&path).is_err());
    }

    #[test]
    fn test_open_nonexistent_fails() {
        let dir = tempdir().unwrap();
        assert!(FileDiskManager::open(dir.path().join("nonexistent.db")).is_err());
    }

    #[test]
    fn test_open_garbage_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("garbage.db");
        std::fs::write(&path, vec![0x5Au8; PAGE_SIZE]).unwrap();

        assert!(matches!(
            FileDiskManager::open(&path),
            Err(Error::CorruptHeader(_))
        ));
    }

    #[test]
    fn test_allocate_run_and_read_zeros() {
        let dir = tempdir().unwrap();
        let mut dm = FileDiskManager::create(dir.path().join("test.db")).unwrap();

        let first = dm.allocate_pages(3).unwrap();
        assert_eq!(first, PageId::new(1));
        assert_eq!(dm.page_count(), 4);
        assert_eq!(dm.allocated_pages(), 3);

        let mut page = Page::new();
        page.as_mut_slice()[0] = 0xEE;
        dm.read_page(first.offset(2), &mut page).unwrap();
        assert!(page.is_zeroed());
    }

    #[test]
    fn test_allocate_zero_pages_rejected() {
        let dir = tempdir().unwrap();
        let mut dm = FileDiskManager::create(dir.path().join("test.db")).unwrap();
        assert!(matches!(
            dm.allocate_pages(0),
            Err(Error::InvalidPageCount(0))
        ));
    }

    #[test]
    fn test_write_and_read_page() {
        let dir = tempdir().unwrap();
        let mut dm = FileDiskManager::create(dir.path().join("test.db")).unwrap();
        let page_id = dm.allocate_pages(1).unwrap();

        let mut page = Page::new();
        page.as_mut_slice()[0] = 0xAB;
        page.as_mut_slice()[4095] = 0xEF;
        dm.write_page(page_id, &page).unwrap();

        let mut read_back = Page::new();
        dm.read_page(page_id, &mut read_back).unwrap();
        assert_eq!(read_back.as_slice()[0], 0xAB);
        assert_eq!(read_back.as_slice()[4095], 0xEF);
    }

    #[test]
    fn test_header_page_is_off_limits() {
        let dir = tempdir().unwrap();
        let mut dm = FileDiskManager::create(dir.path().join("test.db")).unwrap();
        let mut page = Page::new();

        assert!(matches!(
            dm.read_page(PageId::new(0), &mut page),
            Err(Error::InvalidPageId(0))
        ));
        assert!(matches!(
            dm.write_page(PageId::new(0), &page),
            Err(Error::InvalidPageId(0))
        ));
    }

    #[test]
    fn test_read_past_end_fails() {
        let dir = tempdir().unwrap();
        let mut dm = FileDiskManager::create(dir.path().join("test.db")).unwrap();
        dm.allocate_pages(1).unwrap();

        let mut page = Page::new();
        assert!(matches!(
            dm.read_page(PageId::new(2), &mut page),
            Err(Error::PageNotFound(2))
        ));
    }

    #[test]
    fn test_deallocate_and_reuse_run() {
        let dir = tempdir().unwrap();
        let mut dm = FileDiskManager::create(dir.path().join("test.db")).unwrap();
        let first = dm.allocate_pages(4).unwrap();

        let mut page = Page::new();
        page.as_mut_slice()[0] = 0x77;
        dm.write_page(first.offset(1), &page).unwrap();

        dm.deallocate_page(first.offset(1)).unwrap();
        dm.deallocate_page(first.offset(2)).unwrap();
        assert_eq!(dm.allocated_pages(), 2);

        // Freed pages are gone until reallocated
        assert!(dm.read_page(first.offset(1), &mut page).is_err());
        assert!(dm.deallocate_page(first.offset(1)).is_err());

        // A run of 2 fits the hole; it comes back zeroed
        let reused = dm.allocate_pages(2).unwrap();
        assert_eq!(reused, first.offset(1));
        dm.read_page(reused, &mut page).unwrap();
        assert!(page.is_zeroed());
        assert_eq!(dm.page_count(), 5);

        // A run of 3 does not; the file grows
        dm.deallocate_page(first).unwrap();
        let grown = dm.allocate_pages(3).unwrap();
        assert_eq!(grown, PageId::new(5));
    }

    #[test]
    fn test_file_entries() {
        let dir = tempdir().unwrap();
        let mut dm = FileDiskManager::create(dir.path().join("test.db")).unwrap();
        let root = dm.allocate_pages(1).unwrap();

        dm.add_file_entry("students", root).unwrap();
        assert_eq!(dm.get_file_entry("students"), Some(root));
        assert_eq!(dm.get_file_entry("courses"), None);

        assert!(matches!(
            dm.add_file_entry("students", root),
            Err(Error::DuplicateFileEntry(_))
        ));
        assert!(matches!(
            dm.add_file_entry("", root),
            Err(Error::InvalidFileName(_))
        ));

        dm.delete_file_entry("students").unwrap();
        assert_eq!(dm.get_file_entry("students"), None);
        assert!(matches!(
            dm.delete_file_entry("students"),
            Err(Error::FileEntryNotFound(_))
        ));
    }

    #[test]
    fn test_persistence() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");

        let page_id;
        {
            let mut dm = FileDiskManager::create(&path).unwrap();
            page_id = dm.allocate_pages(2).unwrap();
            dm.deallocate_page(page_id.offset(1)).unwrap();
            dm.add_file_entry("heap", page_id).unwrap();

            let mut page = Page::new();
            page.as_mut_slice()[0] = 0x42;
            dm.write_page(page_id, &page).unwrap();
        }

        {
            let mut dm = FileDiskManager::open_or_create(&path).unwrap();
            assert_eq!(dm.page_count(), 3);
            assert_eq!(dm.allocated_pages(), 1);
            assert_eq!(dm.free_pages().collect::<Vec<_>>(), vec![page_id.offset(1)]);
            assert_eq!(dm.get_file_entry("heap"), Some(page_id));

            let mut page = Page::new();
            dm.read_page(page_id, &mut page).unwrap();
            assert_eq!(page.as_slice()[0], 0x42);
        }
    }
}
