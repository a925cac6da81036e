//! File system seam
//!
//! Provides the platform-agnostic file I/O surface used while ingesting a
//! package: listing content folders, reading binaries, probing content types
//! and copying the final metadata document to its export destination.

use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// What the engine needs to know about a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileMetadata {
    pub size: u64,
    pub is_directory: bool,
}

/// Local file access used while ingesting a package.
///
/// Production hosts use the local disk; tests use temporary directories or
/// in-memory fakes.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::FileSystemAccess;
///
/// async fn export(fs: &dyn FileSystemAccess, doc: &Path, dest: &Path) -> Result<()> {
///     fs.copy_file(doc, &dest.join("record.xml")).await?;
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait FileSystemAccess: Send + Sync {
    async fn exists(&self, path: &Path) -> Result<bool>;

    async fn metadata(&self, path: &Path) -> Result<FileMetadata>;

    /// Whole file in memory. Meant for small files such as the metadata document.
    async fn read_file(&self, path: &Path) -> Result<Bytes>;

    /// Read at most `len` bytes from the start of a file
    ///
    /// Used for content sniffing; files shorter than `len` return everything.
    async fn read_prefix(&self, path: &Path, len: usize) -> Result<Bytes>;

    /// Create or truncate `path` and write `data` to it.
    async fn write_file(&self, path: &Path, data: Bytes) -> Result<()>;

    /// Copy a file, replacing the destination if it exists
    ///
    /// Returns the number of bytes copied.
    async fn copy_file(&self, from: &Path, to: &Path) -> Result<u64>;

    /// List all entries in a directory, sorted by file name
    async fn list_directory(&self, path: &Path) -> Result<Vec<PathBuf>>;

    /// Ask the platform for the content type of a file
    ///
    /// Returns `Ok(None)` when the platform has no opinion, letting the caller
    /// fall back to its own detection.
    async fn probe_content_type(&self, path: &Path) -> Result<Option<String>> {
        let _ = path;
        Ok(None)
    }

    /// List the regular files of a directory, sorted by file name
    async fn list_files(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in self.list_directory(path).await? {
            if !self.metadata(&entry).await?.is_directory {
                files.push(entry);
            }
        }
        Ok(files)
    }
}
