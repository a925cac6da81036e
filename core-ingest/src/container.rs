//! Explicit container creation.
//!
//! Containers created implicitly by a deeper PUT are restricted and cannot
//! hold binaries, so the record hierarchy is created top-down with
//! entity-less PUTs.

use crate::error::{IngestError, Result};
use crate::status::{self, classify};
use crate::transaction::Transaction;
use bridge_traits::{HttpClient, HttpRequest};
use std::sync::Arc;
use tracing::{debug, info, instrument};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerOutcome {
    Created,
    AlreadyExists,
}

pub struct ContainerBuilder {
    http_client: Arc<dyn HttpClient>,
}

impl ContainerBuilder {
    pub fn new(http_client: Arc<dyn HttpClient>) -> Self {
        Self { http_client }
    }

    /// Create the container at `url` (inside `transaction`). 201 creates;
    /// 204 and 409 mean it is already there; anything else fails.
    #[instrument(
        skip(self, transaction, url),
        fields(container = %transaction.permanent_url(url))
    )]
    pub async fn create(&self, transaction: &Transaction, url: &str) -> Result<ContainerOutcome> {
        let failure = |reason: String| IngestError::ContainerCreation {
            url: transaction.permanent_url(url),
            reason,
        };

        let response = self
            .http_client
            .execute(HttpRequest::put(url))
            .await
            .map_err(|e| failure(e.to_string()))?;

        let outcome = classify(response.status);
        if outcome.is_created() {
            info!("Container created");
            Ok(ContainerOutcome::Created)
        } else if outcome.is_already_satisfied() {
            debug!(status = response.status, "Container already exists");
            Ok(ContainerOutcome::AlreadyExists)
        } else {
            Err(failure(status::describe(&response)))
        }
    }
}
