//! Removal of a previous record before a non-versioned ingest.
//!
//! A deleted resource leaves a tombstone that blocks recreation at the same
//! path, so both the container and its tombstone must go.

use crate::error::{IngestError, Result};
use crate::status::{self, classify};
use crate::transaction::Transaction;
use bridge_traits::{HttpClient, HttpRequest, HttpResponse};
use std::sync::Arc;
use tracing::{debug, info, instrument};

const TOMBSTONE_SUFFIX: &str = "/fcr:tombstone";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupOutcome {
    /// Nothing to delete
    Absent,
    /// Record container and tombstone removed
    Deleted,
}

pub struct RecordCleanup {
    http_client: Arc<dyn HttpClient>,
}

impl RecordCleanup {
    pub fn new(http_client: Arc<dyn HttpClient>) -> Self {
        Self { http_client }
    }

    /// Delete the record container at `record_url` (inside `transaction`)
    /// and its tombstone. Errors name the permanent record URL.
    #[instrument(
        skip(self, transaction, record_url),
        fields(record = %transaction.permanent_url(record_url))
    )]
    pub async fn delete_record_if_exists(
        &self,
        transaction: &Transaction,
        record_url: &str,
    ) -> Result<CleanupOutcome> {
        let permanent_url = transaction.permanent_url(record_url);
        let failure = |url: &str, reason: String| IngestError::Cleanup {
            url: url.to_string(),
            reason,
        };

        let probe = self
            .send(HttpRequest::probe(record_url))
            .await
            .map_err(|reason| failure(&permanent_url, reason))?;
        if !classify(probe.status).is_present() {
            debug!(status = probe.status, "No previous record");
            return Ok(CleanupOutcome::Absent);
        }

        debug!("Previous record exists; deleting");
        let deleted = self
            .send(HttpRequest::delete(record_url))
            .await
            .map_err(|reason| failure(&permanent_url, reason))?;
        if !classify(deleted.status).is_deleted() {
            return Err(failure(&permanent_url, status::describe(&deleted)));
        }

        let tombstone_url = format!("{}{}", permanent_url, TOMBSTONE_SUFFIX);
        let tombstone = self
            .send(HttpRequest::delete(format!("{}{}", record_url, TOMBSTONE_SUFFIX)))
            .await
            .map_err(|reason| failure(&tombstone_url, reason))?;
        if !classify(tombstone.status).is_deleted() {
            return Err(failure(&tombstone_url, status::describe(&tombstone)));
        }

        info!("Previous record deleted");
        Ok(CleanupOutcome::Deleted)
    }

    async fn send(&self, request: HttpRequest) -> std::result::Result<HttpResponse, String> {
        self.http_client
            .execute(request)
            .await
            .map_err(|e| e.to_string())
    }
}
