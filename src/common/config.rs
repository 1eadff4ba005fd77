//! Configuration for lirsdb.

use crate::common::{Error, Result};

/// Size of a page in bytes (4KB).
///
/// Shared by the buffer pool and every disk collaborator. Matches the OS
/// page size on most systems, so pages can be aligned for Direct I/O.
pub const PAGE_SIZE: usize = 4096;

/// Maximum number of pages with u32 PageId (the last value is the sentinel).
pub const MAX_PAGES: u64 = u32::MAX as u64;

/// Longest file entry name the disk header can store.
pub const MAX_FILE_NAME_LEN: usize = 50;

/// Number of frames used by [`BufferPoolConfig::default`].
pub const DEFAULT_NUM_BUFFERS: usize = 64;

/// Settings for constructing a [`BufferPool`](crate::buffer::BufferPool).
///
/// # Example
/// ```
/// use lirsdb::BufferPoolConfig;
///
/// let config = BufferPoolConfig {
///     num_buffers: 8,
///     ..BufferPoolConfig::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferPoolConfig {
    /// Number of frames in the pool.
    pub num_buffers: usize,

    /// Write back every dirty frame when the pool is dropped.
    pub flush_on_drop: bool,
}

impl BufferPoolConfig {
    /// Config with `num_buffers` frames and default everything else.
    pub fn with_buffers(num_buffers: usize) -> Self {
        Self {
            num_buffers,
            ..Self::default()
        }
    }

    /// Reject configurations the pool cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.num_buffers == 0 {
            return Err(Error::InvalidConfig("num_buffers must be > 0"));
        }
        Ok(())
    }
}

impl Default for BufferPoolConfig {
    fn default() -> Self {
        Self {
            num_buffers: DEFAULT_NUM_BUFFERS,
            flush_on_drop: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_size_is_power_of_two() {
        assert!(PAGE_SIZE.is_power_of_two());
        assert_eq!(PAGE_SIZE, 4096);
    }

    #[test]
    fn test_default_config() {
        let config = BufferPoolConfig::default();
        assert_eq!(config.num_buffers, DEFAULT_NUM_BUFFERS);
        assert!(config.flush_on_drop);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_buffers_rejected() {
        let config = BufferPoolConfig::with_buffers(0);
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }
}
