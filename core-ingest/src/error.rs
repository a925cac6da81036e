use bridge_traits::BridgeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Could not open a repository transaction at {url}: {reason}")]
    Connection { url: String, reason: String },

    #[error("Container creation failed for {url}: {reason}")]
    ContainerCreation { url: String, reason: String },

    #[error("Resource upsert failed for {url}: {reason}")]
    ResourceUpsert { url: String, reason: String },

    #[error("Record cleanup failed for {url}: {reason}")]
    Cleanup { url: String, reason: String },

    #[error("Metadata document unavailable: {0}")]
    MetadataDocument(String),

    #[error("Transaction commit failed: {0}")]
    CommitFailure(String),

    #[error("Reference rewrite failed: {0}")]
    Rewrite(String),

    #[error("Export of metadata document failed: {0}")]
    Export(String),

    #[error("Invalid usage: {0}")]
    InvalidUsage(String),

    #[error("Invalid job ID: {0}")]
    InvalidJobId(String),

    #[error("Invalid ingest stage: {0}")]
    InvalidStage(String),

    #[error("Invalid stage transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error(transparent)]
    Bridge(#[from] BridgeError),
}

/// Coarse classification of [`IngestError`] for reports and log fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestErrorKind {
    ConnectionFailure,
    ContainerCreationFailure,
    ResourceUpsertFailure,
    CleanupFailure,
    MetadataFailure,
    CommitFailure,
    RewriteFailure,
    ExportFailure,
    InvalidUsage,
    StateMachine,
    Bridge,
}

impl IngestErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IngestErrorKind::ConnectionFailure => "connection_failure",
            IngestErrorKind::ContainerCreationFailure => "container_creation_failure",
            IngestErrorKind::ResourceUpsertFailure => "resource_upsert_failure",
            IngestErrorKind::CleanupFailure => "cleanup_failure",
            IngestErrorKind::MetadataFailure => "metadata_failure",
            IngestErrorKind::CommitFailure => "commit_failure",
            IngestErrorKind::RewriteFailure => "rewrite_failure",
            IngestErrorKind::ExportFailure => "export_failure",
            IngestErrorKind::InvalidUsage => "invalid_usage",
            IngestErrorKind::StateMachine => "state_machine",
            IngestErrorKind::Bridge => "bridge",
        }
    }
}

impl std::fmt::Display for IngestErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl IngestError {
    pub fn kind(&self) -> IngestErrorKind {
        match self {
            IngestError::Connection { .. } => IngestErrorKind::ConnectionFailure,
            IngestError::ContainerCreation { .. } => IngestErrorKind::ContainerCreationFailure,
            IngestError::ResourceUpsert { .. } => IngestErrorKind::ResourceUpsertFailure,
            IngestError::Cleanup { .. } => IngestErrorKind::CleanupFailure,
            IngestError::MetadataDocument(_) => IngestErrorKind::MetadataFailure,
            IngestError::CommitFailure(_) => IngestErrorKind::CommitFailure,
            IngestError::Rewrite(_) => IngestErrorKind::RewriteFailure,
            IngestError::Export(_) => IngestErrorKind::ExportFailure,
            IngestError::InvalidUsage(_) => IngestErrorKind::InvalidUsage,
            IngestError::InvalidJobId(_)
            | IngestError::InvalidStage(_)
            | IngestError::InvalidStateTransition { .. } => IngestErrorKind::StateMachine,
            IngestError::Bridge(_) => IngestErrorKind::Bridge,
        }
    }

    /// Whether the error fails the ingest. Rewrite and export run after
    /// commit and only produce warnings.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, IngestError::Rewrite(_) | IngestError::Export(_))
    }
}

pub type Result<T> = std::result::Result<T, IngestError>;
