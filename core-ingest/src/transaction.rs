//! # Repository Transactions
//!
//! The repository has no client-side transaction object. A transaction is an
//! opaque URL prefix returned by `POST {base}/fcr:tx`; every request made
//! through that prefix is provisional until `fcr:commit`.
//!
//! ```text
//! begin ─→ Open ──commit──→ Committed
//!            │
//!            └──rollback──→ RolledBack
//! ```
//!
//! URLs under the prefix are meaningless once the transaction ends, so
//! anything persisted or logged outside the transaction goes through
//! [`Transaction::permanent_url`] first.

use crate::error::{IngestError, Result};
use crate::status;
use bridge_traits::{HttpClient, HttpRequest};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

const TX_ENDPOINT: &str = "fcr:tx";
const COMMIT_ENDPOINT: &str = "fcr:tx/fcr:commit";
const ROLLBACK_ENDPOINT: &str = "fcr:tx/fcr:rollback";
const VERSIONS_SEGMENT: &str = "/fcr:versions";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Open,
    Committed,
    RolledBack,
}

impl TransactionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionState::Open => "open",
            TransactionState::Committed => "committed",
            TransactionState::RolledBack => "rolled_back",
        }
    }
}

impl std::fmt::Display for TransactionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An open (or finished) repository transaction.
#[derive(Debug, Clone)]
pub struct Transaction {
    url: String,
    base_url: String,
    state: TransactionState,
}

impl Transaction {
    pub fn new(url: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            url: url.into().trim_end_matches('/').to_string(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            state: TransactionState::Open,
        }
    }

    /// Transaction URL prefix
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Permanent repository base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == TransactionState::Open
    }

    /// Address `path` (relative to the repository base) through this transaction.
    pub fn resource_url(&self, path: &str) -> String {
        format!("{}/{}", self.url, path.trim_start_matches('/'))
    }

    /// Map a transaction-scoped URL to its permanent location and cut off any
    /// version sub-path.
    pub fn permanent_url(&self, url: &str) -> String {
        strip_version_path(&url.replace(&self.url, &self.base_url)).to_string()
    }

    fn endpoint(&self, endpoint: &str) -> String {
        format!("{}/{}", self.url, endpoint)
    }
}

/// Cut `…/fcr:versions/…` off a resource URL.
pub fn strip_version_path(url: &str) -> &str {
    match url.find(VERSIONS_SEGMENT) {
        Some(index) => &url[..index],
        None => url,
    }
}

/// Begins, refreshes, commits and rolls back repository transactions.
pub struct TransactionManager {
    http_client: Arc<dyn HttpClient>,
}

impl TransactionManager {
    pub fn new(http_client: Arc<dyn HttpClient>) -> Self {
        Self { http_client }
    }

    /// Open a transaction under `base_url`.
    ///
    /// Any status of 400 or above means no transaction is available; the
    /// ingest cannot start.
    #[instrument(skip(self))]
    pub async fn begin(&self, base_url: &str) -> Result<Transaction> {
        let base_url = base_url.trim_end_matches('/');
        let url = format!("{}/{}", base_url, TX_ENDPOINT);

        let response = self
            .http_client
            .execute(HttpRequest::post(&url))
            .await
            .map_err(|e| IngestError::Connection {
                url: url.clone(),
                reason: e.to_string(),
            })?;

        if response.status >= 400 {
            return Err(IngestError::Connection {
                url,
                reason: status::describe(&response),
            });
        }

        let location = response
            .location()
            .ok_or_else(|| IngestError::Connection {
                url: url.clone(),
                reason: format!(
                    "HTTP {} without a Location header for the transaction",
                    response.status
                ),
            })?;

        let transaction = Transaction::new(location, base_url);
        info!(transaction = %transaction.url(), "Transaction opened");
        Ok(transaction)
    }

    /// Extend the transaction's lifetime. Failures are logged only.
    #[instrument(skip(self, transaction), fields(transaction = %transaction.url()))]
    pub async fn refresh(&self, transaction: &Transaction) {
        if !transaction.is_open() {
            debug!(state = %transaction.state(), "Skipping refresh of finished transaction");
            return;
        }

        match self
            .http_client
            .execute(HttpRequest::post(transaction.endpoint(TX_ENDPOINT)))
            .await
        {
            Ok(response) if response.is_success() => debug!("Transaction refreshed"),
            Ok(response) => warn!(
                diagnostic = %status::describe(&response),
                "Transaction refresh rejected"
            ),
            Err(e) => warn!(error = %e, "Transaction refresh failed"),
        }
    }

    /// Commit all changes made through the transaction.
    ///
    /// Anything but a 2xx response is a failure; the transaction stays open
    /// so the caller can roll it back.
    #[instrument(skip(self, transaction), fields(transaction = %transaction.url()))]
    pub async fn commit(&self, transaction: &mut Transaction) -> Result<()> {
        if !transaction.is_open() {
            return Err(IngestError::InvalidUsage(format!(
                "cannot commit a {} transaction",
                transaction.state()
            )));
        }

        let response = self
            .http_client
            .execute(HttpRequest::post(transaction.endpoint(COMMIT_ENDPOINT)))
            .await
            .map_err(|e| IngestError::CommitFailure(e.to_string()))?;

        if !response.is_success() {
            return Err(IngestError::CommitFailure(status::describe(&response)));
        }

        transaction.state = TransactionState::Committed;
        info!("Transaction committed");
        Ok(())
    }

    /// Discard all changes made through the transaction.
    ///
    /// Safe to call on a transaction that is unusable or already finished;
    /// problems are logged and never returned.
    #[instrument(skip(self, transaction), fields(transaction = %transaction.url()))]
    pub async fn rollback(&self, transaction: &mut Transaction) {
        match transaction.state() {
            TransactionState::RolledBack => {
                debug!("Transaction already rolled back");
                return;
            }
            TransactionState::Committed => {
                warn!("Refusing to roll back a committed transaction");
                return;
            }
            TransactionState::Open => {}
        }

        match self
            .http_client
            .execute(HttpRequest::post(transaction.endpoint(ROLLBACK_ENDPOINT)))
            .await
        {
            Ok(response) if response.is_success() => info!("Transaction rolled back"),
            Ok(response) => warn!(
                diagnostic = %status::describe(&response),
                "Transaction rollback rejected; repository will expire it"
            ),
            Err(e) => warn!(error = %e, "Transaction rollback failed; repository will expire it"),
        }

        transaction.state = TransactionState::RolledBack;
    }
}
