//! Shared test doubles for unit tests.

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::{FileMetadata, FileSystemAccess, HttpClient, HttpRequest, HttpResponse};
use bytes::Bytes;
use mockall::mock;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

mock! {
    pub HttpClient {}

    #[async_trait]
    impl HttpClient for HttpClient {
        async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse>;
    }
}

/// In-memory file system keyed by path.
#[derive(Default)]
pub struct MemoryFileSystem {
    files: Mutex<BTreeMap<PathBuf, Bytes>>,
    content_types: HashMap<PathBuf, String>,
    failing_reads: Vec<PathBuf>,
}

impl MemoryFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(self, path: impl Into<PathBuf>, data: impl Into<Bytes>) -> Self {
        self.files
            .lock()
            .unwrap()
            .insert(path.into(), data.into());
        self
    }

    pub fn with_content_type(mut self, path: impl Into<PathBuf>, mime: &str) -> Self {
        self.content_types.insert(path.into(), mime.to_string());
        self
    }

    pub fn with_failing_read(mut self, path: impl Into<PathBuf>) -> Self {
        self.failing_reads.push(path.into());
        self
    }

    pub fn contents(&self, path: &Path) -> Option<Bytes> {
        self.files.lock().unwrap().get(path).cloned()
    }

    fn lookup(&self, path: &Path) -> BridgeResult<Bytes> {
        if self.failing_reads.iter().any(|p| p == path) {
            return Err(BridgeError::OperationFailed(format!(
                "read failed: {}",
                path.display()
            )));
        }
        self.contents(path).ok_or_else(|| {
            BridgeError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                path.display().to_string(),
            ))
        })
    }

    fn is_directory(&self, path: &Path) -> bool {
        self.files
            .lock()
            .unwrap()
            .keys()
            .any(|file| file.parent() == Some(path))
    }
}

#[async_trait]
impl FileSystemAccess for MemoryFileSystem {
    async fn exists(&self, path: &Path) -> BridgeResult<bool> {
        Ok(self.contents(path).is_some() || self.is_directory(path))
    }

    async fn metadata(&self, path: &Path) -> BridgeResult<FileMetadata> {
        let is_directory = self.is_directory(path);
        let size = if is_directory {
            0
        } else {
            self.lookup(path)?.len() as u64
        };
        Ok(FileMetadata {
            size,
            is_directory,
        })
    }

    async fn read_file(&self, path: &Path) -> BridgeResult<Bytes> {
        self.lookup(path)
    }

    async fn read_prefix(&self, path: &Path, len: usize) -> BridgeResult<Bytes> {
        let data = self.lookup(path)?;
        Ok(data.slice(..len.min(data.len())))
    }

    async fn write_file(&self, path: &Path, data: Bytes) -> BridgeResult<()> {
        self.files.lock().unwrap().insert(path.to_path_buf(), data);
        Ok(())
    }

    async fn copy_file(&self, from: &Path, to: &Path) -> BridgeResult<u64> {
        let data = self.lookup(from)?;
        let len = data.len() as u64;
        self.files.lock().unwrap().insert(to.to_path_buf(), data);
        Ok(len)
    }

    async fn list_directory(&self, path: &Path) -> BridgeResult<Vec<PathBuf>> {
        Ok(self
            .files
            .lock()
            .unwrap()
            .keys()
            .filter(|file| file.parent() == Some(path))
            .cloned()
            .collect())
    }

    async fn probe_content_type(&self, path: &Path) -> BridgeResult<Option<String>> {
        Ok(self.content_types.get(path).cloned())
    }
}
