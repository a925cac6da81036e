//! # Repository Ingest Module
//!
//! Ingests digitized records into a Fedora repository, one transaction per
//! record.
//!
//! ## Overview
//!
//! This module manages everything between a local record package and the
//! repository:
//! - Opening, refreshing, committing and rolling back transactions
//! - Creating the record containers
//! - Uploading binaries with existence probing, versioning or replacement
//! - Uploading the METS document and rewriting its file references
//! - Exporting the final document after a successful commit
//!
//! ## Components
//!
//! - **Transactions** (`transaction`): Transaction lifecycle and URL mapping
//! - **Containers** (`container`): Idempotent container creation
//! - **Resource Upsert** (`resource`): Create, version or replace one binary
//! - **Record Cleanup** (`cleanup`): Remove a previous record before re-ingest
//! - **MIME Resolution** (`mime`): Content type fallback chain
//! - **Reference Table** (`references`): Positional list of uploaded URLs
//! - **Reference Rewriter** (`rewriter`): METS `FLocat` rewriting
//! - **Ingest Job State Machine** (`job`): Validated stage transitions
//! - **Ingest Coordinator** (`coordinator`): Sequences one record ingest

pub mod cleanup;
pub mod container;
pub mod coordinator;
pub mod error;
pub mod job;
pub mod mime;
pub mod references;
pub mod resource;
pub mod rewriter;
pub mod status;
pub mod transaction;
pub mod types;

#[cfg(test)]
mod testing;

pub use cleanup::{CleanupOutcome, RecordCleanup};
pub use container::{ContainerBuilder, ContainerOutcome};
pub use coordinator::{version_label, IngestCoordinator};
pub use error::{IngestError, IngestErrorKind, Result};
pub use job::{IngestJob, IngestJobId, IngestStage};
pub use mime::{MimeResolver, MimeSource, ResolvedMime};
pub use references::{ReferenceEntry, ReferenceTable};
pub use resource::{ResourceUpsert, UpsertAction, UpsertOutcome};
pub use rewriter::{ReferenceRewriter, RewriteSummary};
pub use status::StatusOutcome;
pub use transaction::{Transaction, TransactionManager, TransactionState};
pub use types::{
    ContentFolder, DocumentContext, FolderSource, IngestReport, IngestRequest,
    MetadataDocumentBuilder, PrebuiltDocument, RecordLayout,
};
