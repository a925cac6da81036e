//! # Ingest Coordinator
//!
//! Ingests one record into the repository as a single transaction.
//!
//! ## Overview
//!
//! The `IngestCoordinator` sequences the repository operations of one record:
//! - Open a transaction via `TransactionManager`
//! - Remove the previous record via `RecordCleanup` when versioning is off
//! - Create the record, `media` and `master` containers via `ContainerBuilder`
//! - Upload every binary via `ResourceUpsert`, collecting a `ReferenceTable`
//! - Build and upload the METS document
//! - Commit, then rewrite and export the document
//!
//! ## Workflow
//!
//! 1. Validate the request (no network traffic on invalid input)
//! 2. Begin a transaction; no transaction means no ingest
//! 3. Delete the existing record and its tombstone (non-versioned only)
//! 4. Create containers: record, then `media`, then `master`
//! 5. Upload `master`, then `media` files in file name order, refreshing the
//!    transaction after every upload
//! 6. Build the metadata document from the reference table
//! 7. Upload the document next to the containers
//! 8. Commit
//! 9. Rewrite the document's file references to the permanent URLs
//! 10. Copy the document to the export destination
//!
//! Any error in steps 3 to 8 rolls the transaction back and fails the
//! ingest. Steps 9 and 10 run after the commit and only produce warnings.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_ingest::{IngestCoordinator, IngestRequest};
//! use core_runtime::IngestConfig;
//!
//! # async fn example(config: IngestConfig) {
//! let coordinator = IngestCoordinator::new(config);
//! let request = IngestRequest::new("ABC123")
//!     .master_directory("/data/ABC123/master")
//!     .media_directory("/data/ABC123/media")
//!     .metadata_document("/data/ABC123/ABC123_mets.xml")
//!     .destination("/export");
//!
//! let report = coordinator.ingest(request).await;
//! if !report.success {
//!     eprintln!("{:?}", report.diagnostic);
//! }
//! # }
//! ```

use crate::cleanup::RecordCleanup;
use crate::container::ContainerBuilder;
use crate::job::{IngestJob, IngestStage};
use crate::references::ReferenceTable;
use crate::resource::ResourceUpsert;
use crate::rewriter::ReferenceRewriter;
use crate::transaction::{Transaction, TransactionManager};
use crate::types::{
    file_name_of, validate_record_id, ContentFolder, DocumentContext, FolderSource,
    IngestReport, IngestRequest, RecordLayout,
};
use crate::{IngestError, Result};
use bridge_traits::FileSystemAccess;
use chrono::{DateTime, Utc};
use core_runtime::IngestConfig;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn, Span};

const VERSION_LABEL_FORMAT: &str = "%Y-%m-%d_%H.%M.%S%.3f";

/// Label of the versions created by one ingest: `{prefix}.{timestamp}`.
pub fn version_label(prefix: &str, at: DateTime<Utc>) -> String {
    format!("{}.{}", prefix, at.format(VERSION_LABEL_FORMAT))
}

/// Runs record ingests against one repository.
///
/// Holds no per-ingest state, so one coordinator can serve concurrent
/// ingests of different records.
pub struct IngestCoordinator {
    config: IngestConfig,
    transactions: TransactionManager,
    containers: ContainerBuilder,
    cleanup: RecordCleanup,
    resources: ResourceUpsert,
    rewriter: ReferenceRewriter,
}

impl IngestCoordinator {
    pub fn new(config: IngestConfig) -> Self {
        let http = Arc::clone(&config.http_client);
        Self {
            transactions: TransactionManager::new(Arc::clone(&http)),
            containers: ContainerBuilder::new(Arc::clone(&http)),
            cleanup: RecordCleanup::new(Arc::clone(&http)),
            resources: ResourceUpsert::new(http, Arc::clone(&config.file_system)),
            rewriter: ReferenceRewriter::new(config.settings.rewrite_file_groups.clone()),
            config,
        }
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Ingest one record. Never panics and never returns early without a
    /// report; a failed report means nothing was committed.
    #[instrument(
        skip(self, request),
        fields(record_id = %request.record_id, transaction = tracing::field::Empty)
    )]
    pub async fn ingest(&self, request: IngestRequest) -> IngestReport {
        let mut job = IngestJob::new(&request.record_id, self.now());
        let mut references = ReferenceTable::new();
        info!(job_id = %job.id, "Starting ingest");

        if let Err(e) = self.validate(&request) {
            return self.fail(&mut job, e, references);
        }

        let base_url = self.config.settings.base_url();
        let mut transaction = match self.transactions.begin(base_url).await {
            Ok(transaction) => transaction,
            Err(e) => return self.fail(&mut job, e, references),
        };
        Span::current().record("transaction", transaction.url());

        let document = match self
            .run_in_transaction(&mut job, &mut transaction, &request, &mut references)
            .await
        {
            Ok(document) => document,
            Err(e) => {
                error!(stage = %job.stage, error = %e, "Ingest failed, rolling back");
                self.transactions.rollback(&mut transaction).await;
                return self.fail(&mut job, e, references);
            }
        };

        let mut warnings = Vec::new();
        let exported_to = match document {
            Some(document) => {
                self.after_commit(&document, &request, &references, &mut warnings)
                    .await
            }
            None => None,
        };

        if let Err(e) = job.advance(IngestStage::Exported, self.now()) {
            warn!(error = %e, "Could not mark ingest as exported");
            warnings.push(e.to_string());
        }

        info!(
            resources = references.len(),
            warnings = warnings.len(),
            "Ingest finished"
        );
        IngestReport::succeeded(&job, warnings, references, exported_to)
    }

    /// Reject requests the policy cannot satisfy.
    fn validate(&self, request: &IngestRequest) -> Result<()> {
        validate_record_id(&request.record_id)?;

        let policy = self.config.policy();
        if policy.needs_metadata_document() && request.metadata.is_none() {
            return Err(IngestError::InvalidUsage(
                "a metadata document is required to ingest or export METS".to_string(),
            ));
        }
        if policy.export_mets_file && request.destination.is_none() {
            return Err(IngestError::InvalidUsage(
                "METS export is enabled but no destination was given".to_string(),
            ));
        }
        Ok(())
    }

    /// Steps 3 to 8. Returns the local metadata document, if one was built.
    async fn run_in_transaction(
        &self,
        job: &mut IngestJob,
        transaction: &mut Transaction,
        request: &IngestRequest,
        references: &mut ReferenceTable,
    ) -> Result<Option<PathBuf>> {
        job.advance(IngestStage::TxBegun, self.now())?;

        let policy = self.config.policy();
        let layout = RecordLayout::new(
            transaction,
            self.config.settings.records_path(),
            &request.record_id,
        );
        let label = policy
            .use_versioning
            .then(|| version_label(&self.config.settings.version_label_prefix, self.now()));

        if !policy.use_versioning {
            info!("Phase 1: Removing previous record");
            self.cleanup
                .delete_record_if_exists(transaction, &layout.record_url)
                .await?;
            job.advance(IngestStage::CleanedUp, self.now())?;
        }

        info!("Phase 2: Creating containers");
        self.containers
            .create(transaction, &layout.record_url)
            .await?;
        if policy.ingest_media_images {
            self.containers
                .create(transaction, &layout.media_url)
                .await?;
        }
        if policy.ingest_master_images {
            self.containers
                .create(transaction, &layout.master_url)
                .await?;
        }
        job.advance(IngestStage::ContainersReady, self.now())?;

        info!("Phase 3: Uploading files");
        for folder in ContentFolder::UPLOAD_ORDER {
            if !self.folder_enabled(folder) {
                continue;
            }
            let files = self.collect_files(request.source(folder)).await?;
            debug!(folder = %folder, count = files.len(), "Uploading folder");

            for file in files {
                let file_name = file_name_of(&file).ok_or_else(|| {
                    IngestError::InvalidUsage(format!(
                        "file has no usable name: {}",
                        file.display()
                    ))
                })?;
                let target = layout.file_url(folder, file_name);
                let outcome = self
                    .resources
                    .upsert(transaction, &file, &target, label.as_deref())
                    .await?;
                references.push(folder.as_str(), outcome.permanent_url);
                self.transactions.refresh(transaction).await;
            }
        }
        job.advance(IngestStage::FilesUploaded, self.now())?;

        let document = if policy.needs_metadata_document() {
            info!("Phase 4: Building metadata document");
            let document = self
                .build_document(request, transaction, &layout, references)
                .await?;
            job.advance(IngestStage::MetadataBuilt, self.now())?;

            if policy.ingest_mets_file {
                let file_name = file_name_of(&document).ok_or_else(|| {
                    IngestError::MetadataDocument(format!(
                        "document has no usable name: {}",
                        document.display()
                    ))
                })?;
                let target = layout.document_url(file_name);
                self.resources
                    .upsert(transaction, &document, &target, label.as_deref())
                    .await?;
                self.transactions.refresh(transaction).await;
                job.advance(IngestStage::MetadataUploaded, self.now())?;
            }
            Some(document)
        } else {
            None
        };

        info!("Phase 5: Committing");
        self.transactions.commit(transaction).await?;
        job.advance(IngestStage::Committed, self.now())?;
        Ok(document)
    }

    async fn build_document(
        &self,
        request: &IngestRequest,
        transaction: &Transaction,
        layout: &RecordLayout,
        references: &ReferenceTable,
    ) -> Result<PathBuf> {
        let builder = request.metadata.as_ref().ok_or_else(|| {
            IngestError::MetadataDocument("no metadata document builder".to_string())
        })?;

        let record_url = transaction.permanent_url(&layout.record_url);
        let context = DocumentContext {
            record_id: &request.record_id,
            record_url: &record_url,
            references,
        };
        let document = builder.build(&context).await?;

        let exists = self
            .config
            .file_system
            .exists(&document)
            .await
            .map_err(|e| IngestError::MetadataDocument(e.to_string()))?;
        if !exists {
            return Err(IngestError::MetadataDocument(format!(
                "{} does not exist",
                document.display()
            )));
        }
        Ok(document)
    }

    /// Steps 9 and 10. Failures become warnings.
    async fn after_commit(
        &self,
        document: &Path,
        request: &IngestRequest,
        references: &ReferenceTable,
        warnings: &mut Vec<String>,
    ) -> Option<PathBuf> {
        let file_system = self.config.file_system.as_ref();

        if let Err(e) = self
            .rewriter
            .rewrite_file(file_system, document, references)
            .await
        {
            warn!(error = %e, "Could not rewrite file references");
            warnings.push(e.to_string());
        }

        if !self.config.policy().export_mets_file {
            return None;
        }

        match export_document(file_system, document, request.destination.as_deref()).await {
            Ok(exported) => {
                info!(path = %exported.display(), "Metadata document exported");
                Some(exported)
            }
            Err(e) => {
                warn!(error = %e, "Could not export metadata document");
                warnings.push(e.to_string());
                None
            }
        }
    }

    fn folder_enabled(&self, folder: ContentFolder) -> bool {
        let policy = self.config.policy();
        match folder {
            ContentFolder::Master => policy.ingest_master_images,
            ContentFolder::Media => policy.ingest_media_images,
        }
    }

    /// Files of a folder in upload order (sorted by file name).
    async fn collect_files(&self, source: Option<&FolderSource>) -> Result<Vec<PathBuf>> {
        let mut files = match source {
            None => Vec::new(),
            Some(FolderSource::Files(files)) => files.clone(),
            Some(FolderSource::Directory(directory)) => self
                .config
                .file_system
                .list_files(directory)
                .await
                .map_err(|e| {
                    IngestError::InvalidUsage(format!(
                        "cannot list {}: {}",
                        directory.display(),
                        e
                    ))
                })?,
        };
        files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        Ok(files)
    }

    fn fail(
        &self,
        job: &mut IngestJob,
        error: IngestError,
        references: ReferenceTable,
    ) -> IngestReport {
        let failed_after = job.stage;
        job.fail(self.now());
        error!(
            failed_after = %failed_after,
            kind = %error.kind(),
            error = %error,
            "Ingest failed"
        );
        IngestReport::failed(job, failed_after, &error, references)
    }

    fn now(&self) -> DateTime<Utc> {
        self.config.clock.now()
    }
}

/// Copy `document` into `destination`, replacing an earlier export.
async fn export_document(
    file_system: &dyn FileSystemAccess,
    document: &Path,
    destination: Option<&Path>,
) -> Result<PathBuf> {
    let destination = destination
        .ok_or_else(|| IngestError::Export("no export destination".to_string()))?;
    let file_name = document
        .file_name()
        .ok_or_else(|| IngestError::Export(format!("{} has no file name", document.display())))?;
    let target = destination.join(file_name);

    file_system
        .copy_file(document, &target)
        .await
        .map_err(|e| IngestError::Export(format!("{}: {}", target.display(), e)))?;
    Ok(target)
}
