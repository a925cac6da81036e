//! # Ingest Job State Machine
//!
//! Tracks how far a single record ingest got, with validated transitions.
//!
//! ## State Machine
//!
//! ```text
//! Start → TxBegun → [CleanedUp] → ContainersReady → FilesUploaded
//!   → [MetadataBuilt → [MetadataUploaded]] → Committed → Exported
//!
//! any state before Committed ──→ RolledBack
//! ```
//!
//! `Exported` is the only successful terminal stage and is reached even when
//! the export itself is disabled. `RolledBack` is the only failing terminal
//! stage; it is also used when no transaction could be opened.

use crate::{IngestError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// ID Types
// ============================================================================

/// Unique identifier for an ingest attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IngestJobId(Uuid);

impl IngestJobId {
    /// Create a new random ingest job ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse an ingest job ID from a string
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not a valid UUID
    pub fn from_string(s: &str) -> Result<Self> {
        Ok(Self(
            Uuid::parse_str(s).map_err(|e| IngestError::InvalidJobId(e.to_string()))?,
        ))
    }
}

impl Default for IngestJobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for IngestJobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for IngestJobId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

// ============================================================================
// Stage Types
// ============================================================================

/// The last stage an ingest reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestStage {
    Start,
    TxBegun,
    CleanedUp,
    ContainersReady,
    FilesUploaded,
    MetadataBuilt,
    MetadataUploaded,
    Committed,
    Exported,
    RolledBack,
}

impl IngestStage {
    /// Check if this stage ends the ingest
    pub fn is_terminal(&self) -> bool {
        matches!(self, IngestStage::Exported | IngestStage::RolledBack)
    }

    /// Check if the repository changes of this ingest are (or will be) permanent
    pub fn is_committed(&self) -> bool {
        matches!(self, IngestStage::Committed | IngestStage::Exported)
    }

    /// Check whether moving from this stage to `next` is allowed
    pub fn can_transition_to(&self, next: IngestStage) -> bool {
        use IngestStage::*;

        if next == RolledBack {
            return !self.is_terminal() && *self != Committed;
        }

        matches!(
            (self, next),
            (Start, TxBegun)
                | (TxBegun, CleanedUp)
                | (TxBegun, ContainersReady)
                | (CleanedUp, ContainersReady)
                | (ContainersReady, FilesUploaded)
                | (FilesUploaded, MetadataBuilt)
                | (FilesUploaded, Committed)
                | (MetadataBuilt, MetadataUploaded)
                | (MetadataBuilt, Committed)
                | (MetadataUploaded, Committed)
                | (Committed, Exported)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            IngestStage::Start => "start",
            IngestStage::TxBegun => "tx_begun",
            IngestStage::CleanedUp => "cleaned_up",
            IngestStage::ContainersReady => "containers_ready",
            IngestStage::FilesUploaded => "files_uploaded",
            IngestStage::MetadataBuilt => "metadata_built",
            IngestStage::MetadataUploaded => "metadata_uploaded",
            IngestStage::Committed => "committed",
            IngestStage::Exported => "exported",
            IngestStage::RolledBack => "rolled_back",
        }
    }
}

impl FromStr for IngestStage {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "start" => Ok(IngestStage::Start),
            "tx_begun" => Ok(IngestStage::TxBegun),
            "cleaned_up" => Ok(IngestStage::CleanedUp),
            "containers_ready" => Ok(IngestStage::ContainersReady),
            "files_uploaded" => Ok(IngestStage::FilesUploaded),
            "metadata_built" => Ok(IngestStage::MetadataBuilt),
            "metadata_uploaded" => Ok(IngestStage::MetadataUploaded),
            "committed" => Ok(IngestStage::Committed),
            "exported" => Ok(IngestStage::Exported),
            "rolled_back" => Ok(IngestStage::RolledBack),
            _ => Err(IngestError::InvalidStage(s.to_string())),
        }
    }
}

impl std::fmt::Display for IngestStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Job
// ============================================================================

/// One ingest attempt for one record
#[derive(Debug, Clone, Serialize)]
pub struct IngestJob {
    pub id: IngestJobId,
    pub record_id: String,
    pub stage: IngestStage,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl IngestJob {
    pub fn new(record_id: impl Into<String>, started_at: DateTime<Utc>) -> Self {
        Self {
            id: IngestJobId::new(),
            record_id: record_id.into(),
            stage: IngestStage::Start,
            started_at,
            finished_at: None,
        }
    }

    /// Move to `next`, stamping `finished_at` when it is terminal.
    ///
    /// # Errors
    ///
    /// Returns `InvalidStateTransition` if the transition is not allowed
    pub fn advance(&mut self, next: IngestStage, at: DateTime<Utc>) -> Result<()> {
        if !self.stage.can_transition_to(next) {
            return Err(IngestError::InvalidStateTransition {
                from: self.stage.to_string(),
                to: next.to_string(),
            });
        }

        self.stage = next;
        if next.is_terminal() {
            self.finished_at = Some(at);
        }
        Ok(())
    }

    /// Move to `RolledBack` unless the job is already finished or committed.
    pub fn fail(&mut self, at: DateTime<Utc>) {
        if self.stage.can_transition_to(IngestStage::RolledBack) {
            self.stage = IngestStage::RolledBack;
            self.finished_at = Some(at);
        }
    }

    pub fn succeeded(&self) -> bool {
        self.stage == IngestStage::Exported
    }
}
