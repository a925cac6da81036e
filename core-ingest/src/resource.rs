//! # Resource Upsert
//!
//! Puts one local file at one repository location, whatever is already
//! there.
//!
//! ## Workflow
//!
//! 1. Probe the target with a GET; only 200 counts as existing, and the body
//!    of an existing resource is never downloaded
//! 2. Resolve the content type (see [`crate::mime`])
//! 3. Branch on existence and versioning:
//!    - missing: PUT the file
//!    - existing, versioned: POST to `fcr:versions` with the version label as `Slug`
//!    - existing, not versioned: DELETE, DELETE the tombstone, PUT again
//! 4. Expect 201 and take the final URL from `Location`
//!
//! The file itself travels as a [`RequestBody::File`], which the HTTP bridge
//! streams from disk.

use crate::error::{IngestError, Result};
use crate::mime::MimeResolver;
use crate::status::{self, classify};
use crate::transaction::Transaction;
use bridge_traits::{FileSystemAccess, HttpClient, HttpRequest, HttpResponse, RequestBody};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// What an upsert did to the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertAction {
    Created,
    Versioned,
    Replaced,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsertOutcome {
    /// Final location inside the transaction
    pub location: String,
    /// Final location under the permanent base, without version sub-path
    pub permanent_url: String,
    pub action: UpsertAction,
    pub mime_type: String,
}

pub struct ResourceUpsert {
    http_client: Arc<dyn HttpClient>,
    file_system: Arc<dyn FileSystemAccess>,
    mime_resolver: MimeResolver,
}

impl ResourceUpsert {
    pub fn new(http_client: Arc<dyn HttpClient>, file_system: Arc<dyn FileSystemAccess>) -> Self {
        let mime_resolver = MimeResolver::new(Arc::clone(&file_system));
        Self {
            http_client,
            file_system,
            mime_resolver,
        }
    }

    /// Upload `file` to `target_url` (a URL inside `transaction`).
    ///
    /// `version_label` set means versioning is on: an existing resource gets
    /// a new version instead of being replaced.
    #[instrument(
        skip(self, transaction, file, target_url),
        fields(file = %file.display(), target = %transaction.permanent_url(target_url))
    )]
    pub async fn upsert(
        &self,
        transaction: &Transaction,
        file: &Path,
        target_url: &str,
        version_label: Option<&str>,
    ) -> Result<UpsertOutcome> {
        let file_name = validate_arguments(file, target_url)?;
        let permanent_target = transaction.permanent_url(target_url);
        let failure = |reason: String| IngestError::ResourceUpsert {
            url: permanent_target.clone(),
            reason,
        };

        let probe = self
            .send(HttpRequest::probe(target_url))
            .await
            .map_err(&failure)?;
        let exists = classify(probe.status).is_present();
        if exists {
            debug!("Resource already exists");
        }

        let resolved = self.mime_resolver.resolve(file).await;
        let mime_type = resolved.essence().to_string();
        let metadata = self
            .file_system
            .metadata(file)
            .await
            .map_err(|e| failure(format!("cannot read {}: {}", file.display(), e)))?;
        if metadata.is_directory {
            return Err(failure(format!("{} is a directory", file.display())));
        }
        let body = RequestBody::from(file);

        let (action, response) = match (exists, version_label) {
            (false, _) => {
                let response = self
                    .put_file(target_url, &file_name, &mime_type, body)
                    .await
                    .map_err(&failure)?;
                (UpsertAction::Created, response)
            }
            (true, Some(label)) => {
                let request = HttpRequest::post(format!("{}/fcr:versions", target_url))
                    .header("Slug", label)
                    .attachment(&file_name, mime_type.as_str(), body);
                let response = self.send(request).await.map_err(&failure)?;
                (UpsertAction::Versioned, response)
            }
            (true, None) => {
                self.delete_expecting_no_content(target_url)
                    .await
                    .map_err(&failure)?;
                self.delete_expecting_no_content(&format!("{}/fcr:tombstone", target_url))
                    .await
                    .map_err(&failure)?;
                let response = self
                    .put_file(target_url, &file_name, &mime_type, body)
                    .await
                    .map_err(&failure)?;
                (UpsertAction::Replaced, response)
            }
        };

        if !classify(response.status).is_created() {
            return Err(failure(status::describe(&response)));
        }

        let location = response.location().unwrap_or(target_url).to_string();
        let permanent_url = transaction.permanent_url(&location);
        info!(action = ?action, mime = %mime_type, location = %permanent_url, "Resource stored");

        Ok(UpsertOutcome {
            location,
            permanent_url,
            action,
            mime_type,
        })
    }

    async fn put_file(
        &self,
        target_url: &str,
        file_name: &str,
        mime_type: &str,
        body: RequestBody,
    ) -> std::result::Result<HttpResponse, String> {
        self.send(HttpRequest::put(target_url).attachment(file_name, mime_type, body))
            .await
    }

    async fn delete_expecting_no_content(&self, url: &str) -> std::result::Result<(), String> {
        let response = self.send(HttpRequest::delete(url)).await?;
        if classify(response.status).is_deleted() {
            Ok(())
        } else {
            Err(format!("DELETE {}: {}", url, status::describe(&response)))
        }
    }

    async fn send(&self, request: HttpRequest) -> std::result::Result<HttpResponse, String> {
        self.http_client
            .execute(request)
            .await
            .map_err(|e| e.to_string())
    }
}

/// Reject empty arguments before any network traffic. Returns the file name
/// announced in `Content-Disposition`.
fn validate_arguments(file: &Path, target_url: &str) -> Result<String> {
    if file.as_os_str().is_empty() {
        return Err(IngestError::InvalidUsage("file may not be empty".to_string()));
    }
    if target_url.trim().is_empty() {
        return Err(IngestError::InvalidUsage("target may not be empty".to_string()));
    }

    file.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .ok_or_else(|| {
            IngestError::InvalidUsage(format!("file has no usable name: {}", file.display()))
        })
}
