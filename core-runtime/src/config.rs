//! # Ingest Configuration Module
//!
//! Provides configuration management for the ingest engine.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct an
//! `IngestConfig` instance that holds the repository settings, the ingest
//! policy and the bridges the engine talks through. It enforces fail-fast
//! validation so that a misconfigured host never opens a transaction.
//!
//! ## Required Dependencies
//!
//! - `HttpClient` - Repository access (desktop default: reqwest)
//! - `FileSystemAccess` - Local package files (desktop default: tokio fs)
//!
//! ## Optional Dependencies
//!
//! - `Clock` - Version label timestamps (default: system clock)
//!
//! When the `desktop-shims` feature is enabled, desktop-ready defaults for
//! `HttpClient` and `FileSystemAccess` are injected automatically if not
//! provided.
//!
//! ## Settings File
//!
//! Repository settings use the same keys as the export plugin configuration:
//!
//! ```json
//! {
//!   "repositoryUrl": "http://localhost:8080/fedora/rest",
//!   "recordsPath": "records",
//!   "rewriteFileGroups": [
//!     { "group": "PRESENTATION", "folder": "media" },
//!     { "group": "FEDORA", "folder": "master" }
//!   ],
//!   "useVersioning": true,
//!   "ingestMasterImages": true,
//!   "ingestMediaImages": true,
//!   "ingestMetsFile": true,
//!   "exportMetsFile": true
//! }
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::{IngestConfig, RepositorySettings};
//!
//! let settings = RepositorySettings::from_json_file("ingest.json")?;
//! let config = IngestConfig::builder()
//!     .settings(settings)
//!     .use_versioning(false)
//!     .build()?;
//! ```

use crate::error::{Error, Result};
use bridge_traits::{Clock, FileSystemAccess, HttpClient, SystemClock};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

/// Repository base used when no URL is configured.
pub const DEFAULT_REPOSITORY_URL: &str = "http://localhost:8080/fedora/rest";

/// Container path under the repository base that holds record containers.
pub const DEFAULT_RECORDS_PATH: &str = "records";

/// Prefix of version labels (`{prefix}.{timestamp}`).
pub const DEFAULT_VERSION_LABEL_PREFIX: &str = "export";

/// Content folder holding master images.
pub const MASTER_FOLDER: &str = "master";

/// Content folder holding media (derivative) images.
pub const MEDIA_FOLDER: &str = "media";

/// Default metadata-document file groups and the folder each one references.
pub const DEFAULT_REWRITE_FILE_GROUPS: &[(&str, &str)] =
    &[("PRESENTATION", MEDIA_FOLDER), ("FEDORA", MASTER_FOLDER)];

/// Policy switches for a single ingest.
///
/// Every switch defaults to `true`, matching the export plugin defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IngestPolicy {
    /// Add versions to existing resources instead of replacing the record
    pub use_versioning: bool,

    /// Upload the master image folder into `{record}/master`
    pub ingest_master_images: bool,

    /// Upload the media image folder into `{record}/media`
    pub ingest_media_images: bool,

    /// Upload the metadata document into the record container
    pub ingest_mets_file: bool,

    /// Copy the rewritten metadata document to the export destination
    pub export_mets_file: bool,
}

impl Default for IngestPolicy {
    fn default() -> Self {
        Self {
            use_versioning: true,
            ingest_master_images: true,
            ingest_media_images: true,
            ingest_mets_file: true,
            export_mets_file: true,
        }
    }
}

impl IngestPolicy {
    /// Whether the metadata document has to be built at all
    pub fn needs_metadata_document(&self) -> bool {
        self.ingest_mets_file || self.export_mets_file
    }
}

/// Binds a metadata-document file group to the content folder whose uploaded
/// resources its file references point at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileGroupRewrite {
    /// Value of the file group's `USE` attribute
    pub group: String,

    /// Content folder (`master` or `media`)
    pub folder: String,
}

impl FileGroupRewrite {
    pub fn new(group: impl Into<String>, folder: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            folder: folder.into(),
        }
    }
}

/// Repository location and layout settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RepositorySettings {
    /// Permanent base URL of the repository REST API
    pub repository_url: String,

    /// Path below the base URL holding record containers
    pub records_path: String,

    /// Prefix of the `Slug` label given to new versions
    pub version_label_prefix: String,

    /// File groups of the metadata document whose locations are rewritten
    pub rewrite_file_groups: Vec<FileGroupRewrite>,

    #[serde(flatten)]
    pub policy: IngestPolicy,
}

impl Default for RepositorySettings {
    fn default() -> Self {
        Self {
            repository_url: DEFAULT_REPOSITORY_URL.to_string(),
            records_path: DEFAULT_RECORDS_PATH.to_string(),
            version_label_prefix: DEFAULT_VERSION_LABEL_PREFIX.to_string(),
            rewrite_file_groups: DEFAULT_REWRITE_FILE_GROUPS
                .iter()
                .map(|(group, folder)| FileGroupRewrite::new(*group, *folder))
                .collect(),
            policy: IngestPolicy::default(),
        }
    }
}

impl RepositorySettings {
    /// Parse settings from a JSON document. Missing keys take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let settings: Self = serde_json::from_str(json)
            .map_err(|e| Error::Config(format!("Invalid settings JSON: {}", e)))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from a JSON file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| Error::ConfigFile {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&content)
    }

    /// Repository base URL without a trailing slash
    pub fn base_url(&self) -> &str {
        self.repository_url.trim_end_matches('/')
    }

    /// Records path without surrounding slashes
    pub fn records_path(&self) -> &str {
        self.records_path.trim_matches('/')
    }

    /// Validates the settings and returns an error if invalid.
    pub fn validate(&self) -> Result<()> {
        let url = self.base_url();
        if url.is_empty() {
            return Err(Error::Config("Repository URL cannot be empty".to_string()));
        }

        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(Error::Config(format!(
                "Repository URL must be an http(s) URL, got '{}'",
                url
            )));
        }

        if self.records_path().is_empty() {
            return Err(Error::Config("Records path cannot be empty".to_string()));
        }

        if self.policy.use_versioning && self.version_label_prefix.trim().is_empty() {
            return Err(Error::Config(
                "Version label prefix cannot be empty when versioning is enabled".to_string(),
            ));
        }

        for rewrite in &self.rewrite_file_groups {
            if rewrite.group.trim().is_empty() {
                return Err(Error::Config(
                    "Rewrite file group names cannot be empty".to_string(),
                ));
            }
            if rewrite.folder != MASTER_FOLDER && rewrite.folder != MEDIA_FOLDER {
                return Err(Error::Config(format!(
                    "File group '{}' references unknown folder '{}' (expected '{}' or '{}')",
                    rewrite.group, rewrite.folder, MASTER_FOLDER, MEDIA_FOLDER
                )));
            }
        }

        Ok(())
    }
}

/// Ingest configuration.
///
/// Holds all settings and bridges required to run ingests. Use
/// [`IngestConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct IngestConfig {
    /// Repository location, layout and policy
    pub settings: RepositorySettings,

    /// HTTP client for repository requests
    pub http_client: Arc<dyn HttpClient>,

    /// File system access for package files and the export copy
    pub file_system: Arc<dyn FileSystemAccess>,

    /// Time source for version labels
    pub clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for IngestConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IngestConfig")
            .field("settings", &self.settings)
            .field("http_client", &"HttpClient { ... }")
            .field("file_system", &"FileSystemAccess { ... }")
            .field("clock", &"Clock { ... }")
            .finish()
    }
}

impl IngestConfig {
    /// Creates a new builder for constructing an `IngestConfig`.
    pub fn builder() -> IngestConfigBuilder {
        IngestConfigBuilder::default()
    }

    /// The ingest policy
    pub fn policy(&self) -> &IngestPolicy {
        &self.settings.policy
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn http_client_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "HttpClient".to_string(),
        message: "HttpClient implementation is required for repository access. \
                 Desktop: ensure the 'desktop-shims' feature is enabled to use the default ReqwestHttpClient. \
                 Other hosts: inject a client via .http_client()."
            .to_string(),
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn file_system_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "FileSystemAccess".to_string(),
        message: "FileSystemAccess implementation is required to read package files. \
                 Desktop: ensure the 'desktop-shims' feature is enabled to use the default TokioFileSystem. \
                 Other hosts: inject an implementation via .file_system()."
            .to_string(),
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client() -> Result<Arc<dyn HttpClient>> {
    use bridge_desktop::ReqwestHttpClient;

    let client = ReqwestHttpClient::new().map_err(|e| {
        Error::BridgeInit(format!("default HTTP client: {}", e))
    })?;
    let client: Arc<dyn HttpClient> = Arc::new(client);
    Ok(client)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client() -> Result<Arc<dyn HttpClient>> {
    Err(http_client_missing_error())
}

#[cfg(feature = "desktop-shims")]
fn provide_default_file_system() -> Result<Arc<dyn FileSystemAccess>> {
    use bridge_desktop::TokioFileSystem;

    let fs: Arc<dyn FileSystemAccess> = Arc::new(TokioFileSystem::new());
    Ok(fs)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_file_system() -> Result<Arc<dyn FileSystemAccess>> {
    Err(file_system_missing_error())
}

/// Builder for constructing [`IngestConfig`] instances.
///
/// Call [`build()`](IngestConfigBuilder::build) to validate and create the
/// final config.
#[derive(Default)]
pub struct IngestConfigBuilder {
    settings: RepositorySettings,
    http_client: Option<Arc<dyn HttpClient>>,
    file_system: Option<Arc<dyn FileSystemAccess>>,
    clock: Option<Arc<dyn Clock>>,
}

impl IngestConfigBuilder {
    /// Replaces all repository settings, e.g. ones loaded from a file.
    pub fn settings(mut self, settings: RepositorySettings) -> Self {
        self.settings = settings;
        self
    }

    /// Sets the permanent repository base URL.
    ///
    /// # Examples
    ///
    /// ```
    /// use core_runtime::config::IngestConfig;
    ///
    /// let builder = IngestConfig::builder()
    ///     .repository_url("https://repo.example.org/rest");
    /// ```
    pub fn repository_url(mut self, url: impl Into<String>) -> Self {
        self.settings.repository_url = url.into();
        self
    }

    /// Sets the path below the base URL that holds record containers.
    pub fn records_path(mut self, path: impl Into<String>) -> Self {
        self.settings.records_path = path.into();
        self
    }

    /// Sets the prefix of version labels.
    pub fn version_label_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.settings.version_label_prefix = prefix.into();
        self
    }

    /// Replaces the metadata-document file groups whose references are rewritten.
    pub fn rewrite_file_groups(mut self, groups: Vec<FileGroupRewrite>) -> Self {
        self.settings.rewrite_file_groups = groups;
        self
    }

    /// Sets the whole ingest policy at once.
    pub fn policy(mut self, policy: IngestPolicy) -> Self {
        self.settings.policy = policy;
        self
    }

    /// Enables or disables versioning of existing resources.
    ///
    /// Default: true
    pub fn use_versioning(mut self, enabled: bool) -> Self {
        self.settings.policy.use_versioning = enabled;
        self
    }

    /// Enables or disables the master image upload.
    ///
    /// Default: true
    pub fn ingest_master_images(mut self, enabled: bool) -> Self {
        self.settings.policy.ingest_master_images = enabled;
        self
    }

    /// Enables or disables the media image upload.
    ///
    /// Default: true
    pub fn ingest_media_images(mut self, enabled: bool) -> Self {
        self.settings.policy.ingest_media_images = enabled;
        self
    }

    /// Enables or disables uploading the metadata document.
    ///
    /// Default: true
    pub fn ingest_mets_file(mut self, enabled: bool) -> Self {
        self.settings.policy.ingest_mets_file = enabled;
        self
    }

    /// Enables or disables exporting the metadata document after commit.
    ///
    /// Default: true
    pub fn export_mets_file(mut self, enabled: bool) -> Self {
        self.settings.policy.export_mets_file = enabled;
        self
    }

    /// Sets the HTTP client implementation.
    ///
    /// If not provided, the desktop default (reqwest-based) will be used when
    /// the `desktop-shims` feature is enabled.
    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Sets the file system access implementation.
    ///
    /// If not provided, the desktop default (tokio fs-based) will be used when
    /// the `desktop-shims` feature is enabled.
    pub fn file_system(mut self, fs: Arc<dyn FileSystemAccess>) -> Self {
        self.file_system = Some(fs);
        self
    }

    /// Sets the time source used for version labels.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Builds the final `IngestConfig` instance.
    ///
    /// # Returns
    ///
    /// Returns `Ok(IngestConfig)` on success, or an error if:
    /// - Required bridges are missing and no desktop default is available
    /// - Repository settings are invalid
    pub fn build(self) -> Result<IngestConfig> {
        self.settings.validate()?;

        let http_client = match self.http_client {
            Some(client) => client,
            None => provide_default_http_client()?,
        };

        let file_system = match self.file_system {
            Some(fs) => fs,
            None => provide_default_file_system()?,
        };

        let clock = self
            .clock
            .unwrap_or_else(|| Arc::new(SystemClock) as Arc<dyn Clock>);

        Ok(IngestConfig {
            settings: self.settings,
            http_client,
            file_system,
            clock,
        })
    }
}
