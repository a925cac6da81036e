//! File System Access Implementation using Tokio

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    storage::{FileMetadata, FileSystemAccess},
};
use bytes::Bytes;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncReadExt;
use tokio::sync::OnceCell;
use tracing::debug;

/// System table consulted for content types on Unix hosts.
pub const DEFAULT_MIME_TYPES_PATH: &str = "/etc/mime.types";

/// Tokio-based file system implementation
///
/// Provides async file I/O operations using:
/// - `tokio::fs` for async operations
/// - The host's `mime.types` table for content-type probing
pub struct TokioFileSystem {
    mime_types_path: PathBuf,
    mime_table: OnceCell<HashMap<String, String>>,
}

impl TokioFileSystem {
    /// Create a new file system accessor using the system `mime.types` table
    pub fn new() -> Self {
        Self::with_mime_types(DEFAULT_MIME_TYPES_PATH)
    }

    /// Create a new file system accessor with a custom `mime.types` table
    pub fn with_mime_types<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            mime_types_path: path.into(),
            mime_table: OnceCell::new(),
        }
    }

    /// Convert std::io::Error to BridgeError
    fn map_io_error(e: std::io::Error) -> BridgeError {
        BridgeError::Io(e)
    }

    /// Parse a `mime.types` table into an extension -> type map.
    ///
    /// Each non-comment line is `type/subtype ext1 ext2 ...`; later lines win.
    fn parse_mime_types(content: &str) -> HashMap<String, String> {
        let mut table = HashMap::new();

        for line in content.lines() {
            let line = line.split('#').next().unwrap_or_default().trim();
            let mut fields = line.split_whitespace();
            let Some(mime_type) = fields.next() else {
                continue;
            };
            if !mime_type.contains('/') {
                continue;
            }
            for extension in fields {
                table.insert(extension.to_ascii_lowercase(), mime_type.to_string());
            }
        }

        table
    }

    async fn mime_table(&self) -> &HashMap<String, String> {
        self.mime_table
            .get_or_init(|| async {
                match fs::read_to_string(&self.mime_types_path).await {
                    Ok(content) => {
                        let table = Self::parse_mime_types(&content);
                        debug!(
                            path = ?self.mime_types_path,
                            entries = table.len(),
                            "Loaded mime.types table"
                        );
                        table
                    }
                    Err(e) => {
                        debug!(
                            path = ?self.mime_types_path,
                            error = %e,
                            "No mime.types table available"
                        );
                        HashMap::new()
                    }
                }
            })
            .await
    }
}

impl Default for TokioFileSystem {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FileSystemAccess for TokioFileSystem {
    async fn exists(&self, path: &Path) -> Result<bool> {
        fs::try_exists(path).await.map_err(Self::map_io_error)
    }

    async fn metadata(&self, path: &Path) -> Result<FileMetadata> {
        let metadata = fs::metadata(path).await.map_err(Self::map_io_error)?;

        Ok(FileMetadata {
            size: metadata.len(),
            is_directory: metadata.is_dir(),
        })
    }

    async fn read_file(&self, path: &Path) -> Result<Bytes> {
        let data = fs::read(path).await.map_err(Self::map_io_error)?;
        debug!(path = ?path, size = data.len(), "Read file");
        Ok(Bytes::from(data))
    }

    async fn read_prefix(&self, path: &Path, len: usize) -> Result<Bytes> {
        let file = fs::File::open(path).await.map_err(Self::map_io_error)?;
        let mut buffer = Vec::with_capacity(len);
        file.take(len as u64)
            .read_to_end(&mut buffer)
            .await
            .map_err(Self::map_io_error)?;
        Ok(Bytes::from(buffer))
    }

    async fn write_file(&self, path: &Path, data: Bytes) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(Self::map_io_error)?;
        }

        fs::write(path, data.as_ref())
            .await
            .map_err(Self::map_io_error)?;
        debug!(path = ?path, size = data.len(), "Wrote file");
        Ok(())
    }

    async fn copy_file(&self, from: &Path, to: &Path) -> Result<u64> {
        let copied = fs::copy(from, to).await.map_err(Self::map_io_error)?;
        debug!(from = ?from, to = ?to, size = copied, "Copied file");
        Ok(copied)
    }

    async fn list_directory(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let mut entries = Vec::new();
        let mut read_dir = fs::read_dir(path).await.map_err(Self::map_io_error)?;

        while let Some(entry) = read_dir
            .next_entry()
            .await
            .map_err(Self::map_io_error)?
        {
            entries.push(entry.path());
        }

        entries.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

        debug!(path = ?path, count = entries.len(), "Listed directory");
        Ok(entries)
    }

    async fn probe_content_type(&self, path: &Path) -> Result<Option<String>> {
        let Some(extension) = path.extension().and_then(|ext| ext.to_str()) else {
            return Ok(None);
        };

        let table = self.mime_table().await;
        Ok(table.get(&extension.to_ascii_lowercase()).cloned())
    }
}
