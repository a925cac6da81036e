//! Request, layout and report types shared by the ingest coordinator.

use crate::error::{IngestError, IngestErrorKind, Result};
use crate::job::{IngestJob, IngestJobId, IngestStage};
use crate::references::ReferenceTable;
use crate::transaction::Transaction;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use core_runtime::config::{MASTER_FOLDER, MEDIA_FOLDER};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

// ============================================================================
// Content Folders
// ============================================================================

/// Sub-container of a record holding one kind of binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentFolder {
    Master,
    Media,
}

impl ContentFolder {
    /// Upload order of the folders.
    pub const UPLOAD_ORDER: [ContentFolder; 2] = [ContentFolder::Master, ContentFolder::Media];

    pub fn as_str(&self) -> &'static str {
        match self {
            ContentFolder::Master => MASTER_FOLDER,
            ContentFolder::Media => MEDIA_FOLDER,
        }
    }
}

impl std::fmt::Display for ContentFolder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the files of a content folder come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FolderSource {
    /// Explicit list of files
    Files(Vec<PathBuf>),
    /// Every regular file of a local directory
    Directory(PathBuf),
}

// ============================================================================
// Metadata Document Seam
// ============================================================================

/// What a metadata document builder gets to see.
///
/// All URLs are permanent; the transaction prefix never leaks to the builder.
#[derive(Debug, Clone, Copy)]
pub struct DocumentContext<'a> {
    pub record_id: &'a str,
    pub record_url: &'a str,
    pub references: &'a ReferenceTable,
}

/// Produces the METS document of a record once all binaries are uploaded.
#[async_trait]
pub trait MetadataDocumentBuilder: Send + Sync {
    /// Build the document and return its local path.
    async fn build(&self, context: &DocumentContext<'_>) -> Result<PathBuf>;
}

/// A document that was written before the ingest started.
#[derive(Debug, Clone)]
pub struct PrebuiltDocument(pub PathBuf);

#[async_trait]
impl MetadataDocumentBuilder for PrebuiltDocument {
    async fn build(&self, _context: &DocumentContext<'_>) -> Result<PathBuf> {
        Ok(self.0.clone())
    }
}

// ============================================================================
// Request
// ============================================================================

/// Everything one record ingest needs besides the engine configuration.
#[derive(Clone)]
pub struct IngestRequest {
    pub record_id: String,
    pub master: Option<FolderSource>,
    pub media: Option<FolderSource>,
    pub metadata: Option<Arc<dyn MetadataDocumentBuilder>>,
    /// Directory receiving the exported document
    pub destination: Option<PathBuf>,
}

impl std::fmt::Debug for IngestRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IngestRequest")
            .field("record_id", &self.record_id)
            .field("master", &self.master)
            .field("media", &self.media)
            .field("metadata", &self.metadata.is_some())
            .field("destination", &self.destination)
            .finish()
    }
}

impl IngestRequest {
    pub fn new(record_id: impl Into<String>) -> Self {
        Self {
            record_id: record_id.into(),
            master: None,
            media: None,
            metadata: None,
            destination: None,
        }
    }

    pub fn master_files(mut self, files: Vec<PathBuf>) -> Self {
        self.master = Some(FolderSource::Files(files));
        self
    }

    pub fn master_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.master = Some(FolderSource::Directory(directory.into()));
        self
    }

    pub fn media_files(mut self, files: Vec<PathBuf>) -> Self {
        self.media = Some(FolderSource::Files(files));
        self
    }

    pub fn media_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.media = Some(FolderSource::Directory(directory.into()));
        self
    }

    pub fn metadata_builder(mut self, builder: Arc<dyn MetadataDocumentBuilder>) -> Self {
        self.metadata = Some(builder);
        self
    }

    /// Use an existing document file instead of building one.
    pub fn metadata_document(self, path: impl Into<PathBuf>) -> Self {
        self.metadata_builder(Arc::new(PrebuiltDocument(path.into())))
    }

    pub fn destination(mut self, directory: impl Into<PathBuf>) -> Self {
        self.destination = Some(directory.into());
        self
    }

    pub fn source(&self, folder: ContentFolder) -> Option<&FolderSource> {
        match folder {
            ContentFolder::Master => self.master.as_ref(),
            ContentFolder::Media => self.media.as_ref(),
        }
    }
}

/// Record identifiers become a single path segment. Reserved characters are
/// fine; [`RecordLayout`] percent-encodes them.
pub(crate) fn validate_record_id(record_id: &str) -> Result<()> {
    if record_id.trim().is_empty() {
        return Err(IngestError::InvalidUsage(
            "record identifier may not be empty".to_string(),
        ));
    }
    if record_id.contains('/') || record_id.chars().any(char::is_whitespace) {
        return Err(IngestError::InvalidUsage(format!(
            "record identifier '{}' must be a single path segment",
            record_id
        )));
    }
    Ok(())
}

// ============================================================================
// Record Layout
// ============================================================================

/// Transaction-scoped URLs of one record: `{tx}/{records}/{id}` and its
/// `media` and `master` containers.
///
/// Record identifiers and file names are percent-encoded, so `p#1.tif` is
/// addressed as `p%231.tif` rather than as `p` with a fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordLayout {
    pub record_url: String,
    pub master_url: String,
    pub media_url: String,
}

impl RecordLayout {
    pub fn new(transaction: &Transaction, records_path: &str, record_id: &str) -> Self {
        let records_path = records_path
            .split('/')
            .filter(|segment| !segment.is_empty())
            .map(encode_segment)
            .collect::<Vec<_>>()
            .join("/");
        let record_url =
            transaction.resource_url(&format!("{}/{}", records_path, encode_segment(record_id)));
        Self {
            master_url: format!("{}/{}", record_url, MASTER_FOLDER),
            media_url: format!("{}/{}", record_url, MEDIA_FOLDER),
            record_url,
        }
    }

    pub fn folder_url(&self, folder: ContentFolder) -> &str {
        match folder {
            ContentFolder::Master => &self.master_url,
            ContentFolder::Media => &self.media_url,
        }
    }

    pub fn file_url(&self, folder: ContentFolder, file_name: &str) -> String {
        format!("{}/{}", self.folder_url(folder), encode_segment(file_name))
    }

    /// The metadata document sits directly under the record.
    pub fn document_url(&self, file_name: &str) -> String {
        format!("{}/{}", self.record_url, encode_segment(file_name))
    }
}

fn encode_segment(segment: &str) -> String {
    urlencoding::encode(segment).into_owned()
}

pub(crate) fn file_name_of(path: &Path) -> Option<&str> {
    path.file_name().and_then(|name| name.to_str())
}

// ============================================================================
// Report
// ============================================================================

/// Outcome of one ingest attempt.
///
/// `success` is all or nothing: a failed ingest committed nothing. Warnings
/// only ever come from steps after the commit.
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub job_id: IngestJobId,
    pub record_id: String,
    pub success: bool,
    /// Last stage reached
    pub stage: IngestStage,
    /// Stage the failure happened after
    pub failed_after: Option<IngestStage>,
    pub diagnostic: Option<String>,
    pub error_kind: Option<IngestErrorKind>,
    pub warnings: Vec<String>,
    pub references: ReferenceTable,
    pub exported_to: Option<PathBuf>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl IngestReport {
    pub(crate) fn succeeded(
        job: &IngestJob,
        warnings: Vec<String>,
        references: ReferenceTable,
        exported_to: Option<PathBuf>,
    ) -> Self {
        Self {
            job_id: job.id,
            record_id: job.record_id.clone(),
            success: job.succeeded(),
            stage: job.stage,
            failed_after: None,
            diagnostic: None,
            error_kind: None,
            warnings,
            references,
            exported_to,
            started_at: job.started_at,
            finished_at: job.finished_at,
        }
    }

    pub(crate) fn failed(
        job: &IngestJob,
        failed_after: IngestStage,
        error: &IngestError,
        references: ReferenceTable,
    ) -> Self {
        Self {
            job_id: job.id,
            record_id: job.record_id.clone(),
            success: false,
            stage: job.stage,
            failed_after: Some(failed_after),
            diagnostic: Some(error.to_string()),
            error_kind: Some(error.kind()),
            warnings: Vec::new(),
            references,
            exported_to: None,
            started_at: job.started_at,
            finished_at: job.finished_at,
        }
    }
}
