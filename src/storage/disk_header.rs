//! Header page of a database file.
//!
//! Page 0 of every file managed by [`FileDiskManager`](super::FileDiskManager)
//! holds a [`DiskHeader`]: allocation state plus the file-entry registry.
//!
//! # Layout
//! ```text
//! Offset  Size  Field
//! ------  ----  -----
//! 0       4     magic ("LRSD", little-endian u32)
//! 4       4     checksum (CRC32 of the page with this field zeroed)
//! 8       4     page_count (pages in the file, header included)
//! 12      4     free_count
//! 16      4     entry_count
//! 20      4*n   free page ids
//! ...           entries: name_len (1) | name bytes | start page id (4)
//! ```

use std::collections::{BTreeMap, BTreeSet};

use crate::common::config::{MAX_FILE_NAME_LEN, PAGE_SIZE};
use crate::common::{Error, PageId, Result};
use crate::storage::Page;

/// Allocation state and named roots of a database file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskHeader {
    /// Pages in the file, including the header page itself.
    pub page_count: u32,
    /// Deallocated pages available for reuse.
    pub free_pages: BTreeSet<PageId>,
    /// Registered names and the first page of each.
    pub file_entries: BTreeMap<String, PageId>,
}

impl DiskHeader {
    pub const MAGIC: u32 = u32::from_le_bytes(*b"LRSD");

    const OFFSET_MAGIC: usize = 0;
    const OFFSET_CHECKSUM: usize = 4;
    const OFFSET_PAGE_COUNT: usize = 8;
    const OFFSET_FREE_COUNT: usize = 12;
    const OFFSET_ENTRY_COUNT: usize = 16;
    const OFFSET_BODY: usize = 20;

    /// Header for a freshly created file (only the header page exists).
    pub fn new() -> Self {
        Self {
            page_count: 1,
            free_pages: BTreeSet::new(),
            file_entries: BTreeMap::new(),
        }
    }

    /// Bytes this header occupies when encoded.
    pub fn encoded_len(&self) -> usize {
        let entries: usize = self
            .file_entries
            .keys()
            .map(|name| 1 + name.len() + 4)
            .sum();
        Self::OFFSET_BODY + self.free_pages.len() * 4 + entries
    }

    /// True if the encoded header fits in one page.
    pub fn fits(&self) -> bool {
        self.encoded_len() <= PAGE_SIZE
    }

    /// Encode into `page`, stamping the checksum last.
    pub fn write_to(&self, page: &mut Page) -> Result<()> {
        if !self.fits() {
            return Err(Error::HeaderFull);
        }

        page.reset();
        let data = page.as_mut_slice();
        put_u32(data, Self::OFFSET_MAGIC, Self::MAGIC);
        put_u32(data, Self::OFFSET_PAGE_COUNT, self.page_count);
        put_u32(data, Self::OFFSET_FREE_COUNT, self.free_pages.len() as u32);
        put_u32(data, Self::OFFSET_ENTRY_COUNT, self.file_entries.len() as u32);

        let mut pos = Self::OFFSET_BODY;
        for pid in &self.free_pages {
            put_u32(data, pos, pid.0);
            pos += 4;
        }
        for (name, start) in &self.file_entries {
            data[pos] = name.len() as u8;
            pos += 1;
            data[pos..pos + name.len()].copy_from_slice(name.as_bytes());
            pos += name.len();
            put_u32(data, pos, start.0);
            pos += 4;
        }

        let checksum = Self::compute_checksum(data);
        put_u32(data, Self::OFFSET_CHECKSUM, checksum);
        Ok(())
    }

    /// Decode and validate a header page.
    pub fn read_from(page: &Page) -> Result<Self> {
        let data = page.as_slice();

        if get_u32(data, Self::OFFSET_MAGIC) != Self::MAGIC {
            return Err(Error::CorruptHeader("bad magic".into()));
        }
        let stored = get_u32(data, Self::OFFSET_CHECKSUM);
        if stored != Self::compute_checksum(data) {
            return Err(Error::CorruptHeader("checksum mismatch".into()));
        }

        let page_count = get_u32(data, Self::OFFSET_PAGE_COUNT);
        let free_count = get_u32(data, Self::OFFSET_FREE_COUNT) as usize;
        let entry_count = get_u32(data, Self::OFFSET_ENTRY_COUNT) as usize;

        let mut pos = Self::OFFSET_BODY;
        let mut free_pages = BTreeSet::new();
        for _ in 0..free_count {
            ensure_room(pos, 4)?;
            let pid = PageId::new(get_u32(data, pos));
            if pid.0 == 0 || pid.0 >= page_count {
                return Err(Error::CorruptHeader(format!("free list holds {}", pid)));
            }
            free_pages.insert(pid);
            pos += 4;
        }

        let mut file_entries = BTreeMap::new();
        for _ in 0..entry_count {
            ensure_room(pos, 1)?;
            let len = data[pos] as usize;
            pos += 1;
            ensure_room(pos, len + 4)?;
            let name = std::str::from_utf8(&data[pos..pos + len])
                .map_err(|_| Error::CorruptHeader("file name is not UTF-8".into()))?
                .to_string();
            pos += len;
            let start = PageId::new(get_u32(data, pos));
            pos += 4;
            file_entries.insert(name, start);
        }

        Ok(Self {
            page_count,
            free_pages,
            file_entries,
        })
    }

    /// CRC32 of a header page with the checksum field treated as zero.
    pub fn compute_checksum(data: &[u8]) -> u32 {
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&data[..Self::OFFSET_CHECKSUM]);
        hasher.update(&[0u8; 4]);
        hasher.update(&data[Self::OFFSET_CHECKSUM + 4..]);
        hasher.finalize()
    }

    /// Check a file entry name against the header format.
    pub fn validate_name(name: &str) -> Result<()> {
        if name.is_empty() || name.len() > MAX_FILE_NAME_LEN {
            return Err(Error::InvalidFileName(name.to_string()));
        }
        Ok(())
    }
}

impl Default for DiskHeader {
    fn default() -> Self {
        Self::new()
    }
}

fn ensure_room(pos: usize, len: usize) -> Result<()> {
    if pos + len > PAGE_SIZE {
        return Err(Error::CorruptHeader("header overruns page".into()));
    }
    Ok(())
}

#[inline]
fn put_u32(data: &mut [u8], offset: usize, value: u32) {
    data[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

#[inline]
fn get_u32(data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ])
}
