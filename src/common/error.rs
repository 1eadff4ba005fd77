//! Error types for lirsdb.

use crate::common::{FrameId, PageId};

/// Convenient Result type alias.
///
/// Instead of writing `Result<T, Error>` everywhere, we can write `Result<T>`.
pub type Result<T> = std::result::Result<T, Error>;

/// All possible errors in lirsdb.
///
/// Buffer pool errors come first; the disk-level variants are produced by
/// [`DiskManager`](crate::storage::DiskManager) implementations and reach
/// pool callers wrapped in [`Error::Upstream`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The page is not resident in the buffer pool.
    #[error("{0} is not resident in the buffer pool")]
    NotFound(PageId),

    /// Unpin of a page whose pin count is already zero.
    ///
    /// This indicates a bug - unpinning should match pinning.
    #[error("{0} is not pinned")]
    OverPin(PageId),

    /// Every frame is pinned; there is nothing to evict.
    #[error("No free or evictable frames available in buffer pool")]
    PoolExhausted,

    /// A disk collaborator call failed while the pool was doing `context`.
    #[error("{context}: {source}")]
    Upstream {
        context: String,
        #[source]
        source: Box<Error>,
    },

    /// Attempted to free a page that is still pinned.
    #[error("{0} is still pinned")]
    PagePinned(PageId),

    /// The page directory already holds a binding for this page.
    #[error("{0} is already present in the page directory")]
    AlreadyPresent(PageId),

    /// The replacement policy was told about a frame it does not track.
    #[error("{0} is not tracked by the replacer")]
    UntrackedFrame(FrameId),

    /// `new_pages` was asked for an unusable run length.
    #[error("Invalid page count: {0}")]
    InvalidPageCount(usize),

    /// Rejected buffer pool configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(&'static str),

    /// I/O error from disk operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Requested page does not exist on disk.
    #[error("Page {0} not found")]
    PageNotFound(u32),

    /// The provided page ID is invalid (e.g., the header page or past the end).
    #[error("Invalid page ID: {0}")]
    InvalidPageId(u32),

    /// The disk header page failed validation.
    #[error("Corrupt disk header: {0}")]
    CorruptHeader(String),

    /// The disk header page has no room left for the free list or file entries.
    #[error("Disk header page is full")]
    HeaderFull,

    /// A file entry with this name is already registered.
    #[error("File entry {0:?} already exists")]
    DuplicateFileEntry(String),

    /// No file entry with this name is registered.
    #[error("File entry {0:?} not found")]
    FileEntryNotFound(String),

    /// File entry names must be non-empty and fit the header format.
    #[error("Invalid file name {0:?}")]
    InvalidFileName(String),
}

impl Error {
    /// Wrap a disk collaborator failure with what the pool was doing.
    pub fn upstream(context: impl Into<String>, source: Error) -> Self {
        Error::Upstream {
            context: context.into(),
            source: Box::new(source),
        }
    }

    /// The innermost error, looking through any `Upstream` wrappers.
    pub fn root_cause(&self) -> &Error {
        match self {
            Error::Upstream { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::PageNotFound(42);
        assert_eq!(format!("{}", err), "Page 42 not found");

        let err = Error::PoolExhausted;
        assert_eq!(
            format!("{}", err),
            "No free or evictable frames available in buffer pool"
        );

        let err = Error::OverPin(PageId::new(7));
        assert_eq!(format!("{}", err), "Page(7) is not pinned");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();

        match err {
            Error::Io(_) => {} // Success
            _ => panic!("Expected Io error"),
        }
    }

    #[test]
    fn test_upstream_context() {
        let err = Error::upstream("while loading Page(3)", Error::PageNotFound(3));
        assert_eq!(format!("{}", err), "while loading Page(3): Page 3 not found");
        assert!(matches!(err.root_cause(), Error::PageNotFound(3)));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_result_type_alias() {
        fn might_fail() -> Result<u32> {
            Ok(42)
        }

        assert_eq!(might_fail().unwrap(), 42);
    }
}
