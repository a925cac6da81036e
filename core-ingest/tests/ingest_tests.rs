//! Record ingests against an in-memory repository and a real temp directory.

mod support;

use bridge_desktop::TokioFileSystem;
use bridge_traits::{FixedClock, HttpMethod};
use chrono::{DateTime, TimeZone, Utc};
use core_ingest::{
    ContainerBuilder, ContainerOutcome, IngestCoordinator, IngestErrorKind, IngestRequest,
    IngestStage, TransactionManager,
};
use core_runtime::{IngestConfig, IngestPolicy};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use support::{FakeRepository, BASE_URL};
use tempfile::TempDir;

const TIFF_HEADER: &[u8] = b"II*\0";

fn at() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap()
}

fn policy(use_versioning: bool) -> IngestPolicy {
    IngestPolicy {
        use_versioning,
        ..IngestPolicy::default()
    }
}

fn coordinator(repository: &Arc<FakeRepository>, policy: IngestPolicy) -> IngestCoordinator {
    let config = IngestConfig::builder()
        .repository_url(BASE_URL)
        .policy(policy)
        .http_client(repository.clone())
        .file_system(Arc::new(TokioFileSystem::with_mime_types(
            "/nonexistent/mime.types",
        )))
        .clock(Arc::new(FixedClock(at())))
        .build()
        .unwrap();
    IngestCoordinator::new(config)
}

/// A record package on disk: `master/`, `media/`, a METS document and an
/// empty export directory.
struct Package {
    _dir: TempDir,
    root: PathBuf,
    record_id: String,
}

impl Package {
    fn new(record_id: &str, pages: &[&str]) -> Self {
        let dir = TempDir::new().unwrap();
        let root = dir.path().to_path_buf();
        fs::create_dir_all(root.join("master")).unwrap();
        fs::create_dir_all(root.join("media")).unwrap();
        fs::create_dir_all(root.join("export")).unwrap();

        for page in pages {
            let mut content = TIFF_HEADER.to_vec();
            content.extend_from_slice(format!("master {}", page).as_bytes());
            fs::write(root.join("master").join(page), content).unwrap();

            let mut content = TIFF_HEADER.to_vec();
            content.extend_from_slice(format!("media {}", page).as_bytes());
            fs::write(root.join("media").join(page), content).unwrap();
        }

        let package = Self {
            _dir: dir,
            root,
            record_id: record_id.to_string(),
        };
        fs::write(package.mets(), mets_document(pages)).unwrap();
        package
    }

    fn folder(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    fn mets(&self) -> PathBuf {
        self.root.join(format!("{}_mets.xml", self.record_id))
    }

    fn exported(&self) -> PathBuf {
        self.folder("export")
            .join(format!("{}_mets.xml", self.record_id))
    }

    fn request(&self) -> IngestRequest {
        IngestRequest::new(self.record_id.clone())
            .master_directory(self.folder("master"))
            .media_directory(self.folder("media"))
            .metadata_document(self.mets())
            .destination(self.folder("export"))
    }
}

fn mets_document(pages: &[&str]) -> String {
    let group = |name: &str, location: &str| {
        let files: String = pages
            .iter()
            .enumerate()
            .map(|(index, page)| {
                format!(
                    r#"<mets:file ID="{name}_{index}" MIMETYPE="image/tiff"><mets:FLocat LOCTYPE="URL" xlink:href="file:///{location}/{page}"/></mets:file>"#
                )
            })
            .collect();
        format!(r#"<mets:fileGrp USE="{name}">{files}</mets:fileGrp>"#)
    };

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<mets:mets xmlns:mets="http://www.loc.gov/METS/" xmlns:xlink="http://www.w3.org/1999/xlink">
<mets:fileSec>{}{}{}</mets:fileSec>
</mets:mets>"#,
        group("LOCAL", "local"),
        group("PRESENTATION", "media"),
        group("FEDORA", "master")
    )
}

fn record_path(record_id: &str, rest: &str) -> String {
    format!("records/{}{}", record_id, rest)
}

#[tokio::test]
async fn test_abc123_end_to_end() {
    let repository = Arc::new(FakeRepository::new());
    let coordinator = coordinator(&repository, policy(false));
    let package = Package::new("ABC123", &["p001.tif"]);

    let report = coordinator.ingest(package.request()).await;

    assert!(report.success, "{:?}", report.diagnostic);
    assert_eq!(report.stage, IngestStage::Exported);
    assert!(report.warnings.is_empty(), "{:?}", report.warnings);
    assert_eq!(repository.open_transactions(), 0);

    for container in ["", "/media", "/master"] {
        let node = repository
            .node(&record_path("ABC123", container))
            .unwrap_or_else(|| panic!("missing container {:?}", container));
        assert!(node.is_container());
    }

    let master = repository
        .node("records/ABC123/master/p001.tif")
        .unwrap();
    assert_eq!(master.content_type(), Some("image/tiff"));
    assert_eq!(master.versions().len(), 1);
    let media = repository.node("records/ABC123/media/p001.tif").unwrap();
    assert_eq!(media.versions().len(), 1);
    assert!(repository.node("records/ABC123/ABC123_mets.xml").is_some());

    let master_url = format!("{}/records/ABC123/master/p001.tif", BASE_URL);
    let media_url = format!("{}/records/ABC123/media/p001.tif", BASE_URL);
    assert_eq!(report.references.urls_for("master"), vec![master_url.as_str()]);
    assert_eq!(report.references.urls_for("media"), vec![media_url.as_str()]);

    assert_eq!(report.exported_to, Some(package.exported()));
    let exported = fs::read_to_string(package.exported()).unwrap();
    assert!(exported.contains(&format!(r#"xlink:href="{}""#, master_url)));
    assert!(exported.contains(&format!(r#"xlink:href="{}""#, media_url)));
    assert!(exported.contains(r#"xlink:href="file:///local/p001.tif""#));
    assert!(!exported.contains("tx:"));
}

#[tokio::test]
async fn test_uploads_run_inside_one_transaction_in_order() {
    let repository = Arc::new(FakeRepository::new());
    let coordinator = coordinator(&repository, policy(false));
    let package = Package::new("ABC123", &["p001.tif"]);

    coordinator.ingest(package.request()).await;

    let tx = format!("{}/tx:0001", BASE_URL);
    let writes: Vec<String> = repository
        .requests()
        .into_iter()
        .filter(|(method, _)| *method == HttpMethod::Put)
        .map(|(_, url)| url)
        .collect();
    assert_eq!(
        writes,
        vec![
            format!("{}/records/ABC123", tx),
            format!("{}/records/ABC123/media", tx),
            format!("{}/records/ABC123/master", tx),
            format!("{}/records/ABC123/master/p001.tif", tx),
            format!("{}/records/ABC123/media/p001.tif", tx),
            format!("{}/records/ABC123/ABC123_mets.xml", tx),
        ]
    );

    // one refresh per uploaded file, the document included
    assert_eq!(
        repository.count_requests(HttpMethod::Post, "tx:0001/fcr:tx"),
        3
    );
    assert_eq!(repository.count_requests(HttpMethod::Post, "/fcr:commit"), 1);
    assert_eq!(repository.count_requests(HttpMethod::Post, "/fcr:rollback"), 0);
}

#[tokio::test]
async fn test_non_versioned_reingest_leaves_single_version() {
    let repository = Arc::new(FakeRepository::new());
    let coordinator = coordinator(&repository, policy(false));
    let package = Package::new("ABC123", &["p001.tif"]);

    assert!(coordinator.ingest(package.request()).await.success);
    fs::write(
        package.folder("master").join("p001.tif"),
        [TIFF_HEADER, &b"second"[..]].concat(),
    )
    .unwrap();
    let report = coordinator.ingest(package.request()).await;

    assert!(report.success, "{:?}", report.diagnostic);
    assert!(report.stage.is_committed());
    let master = repository
        .node("records/ABC123/master/p001.tif")
        .unwrap();
    assert_eq!(master.versions().len(), 1);
    assert_eq!(
        master.content().map(|c| c.to_vec()),
        Some([TIFF_HEADER, &b"second"[..]].concat())
    );

    assert_eq!(
        repository.count_requests(HttpMethod::Delete, "tx:0002/records/ABC123"),
        1
    );
    assert_eq!(
        repository.count_requests(HttpMethod::Delete, "tx:0002/records/ABC123/fcr:tombstone"),
        1
    );
}

#[tokio::test]
async fn test_versioned_reingest_adds_labeled_version() {
    let repository = Arc::new(FakeRepository::new());
    let coordinator = coordinator(&repository, policy(true));
    let package = Package::new("ABC123", &["p001.tif"]);

    assert!(coordinator.ingest(package.request()).await.success);
    let report = coordinator.ingest(package.request()).await;

    assert!(report.success, "{:?}", report.diagnostic);
    assert_eq!(repository.count_requests(HttpMethod::Delete, ""), 0);

    let master = repository
        .node("records/ABC123/master/p001.tif")
        .unwrap();
    let versions = master.versions();
    assert_eq!(versions.len(), 2);
    assert_eq!(versions[0].label, None);
    let label = versions[1].label.as_deref().unwrap();
    assert_eq!(label, "export.2024-03-01_12.30.00.000");
    assert!(label.contains("2024-03-01"));

    // the reference points at the resource, never at a version
    assert_eq!(
        report.references.urls_for("master"),
        vec![format!("{}/records/ABC123/master/p001.tif", BASE_URL).as_str()]
    );
    let exported = fs::read_to_string(package.exported()).unwrap();
    assert!(!exported.contains("fcr:versions"));
}

#[tokio::test]
async fn test_failure_before_commit_changes_nothing() {
    let repository = Arc::new(FakeRepository::new());
    let coordinator = coordinator(&repository, policy(false));
    let package = Package::new("ABC123", &["p001.tif"]);
    assert!(coordinator.ingest(package.request()).await.success);

    let paths_before = repository.paths();
    let master_before = repository.node("records/ABC123/master/p001.tif");
    let export_before = fs::read(package.exported()).unwrap();

    repository.fail_when(HttpMethod::Put, "/media/p001.tif", 500);
    fs::write(
        package.folder("master").join("p001.tif"),
        [TIFF_HEADER, &b"changed"[..]].concat(),
    )
    .unwrap();
    let report = coordinator.ingest(package.request()).await;

    assert!(!report.success);
    assert_eq!(report.stage, IngestStage::RolledBack);
    assert_eq!(report.failed_after, Some(IngestStage::ContainersReady));
    assert_eq!(report.error_kind, Some(IngestErrorKind::ResourceUpsertFailure));
    let diagnostic = report.diagnostic.unwrap();
    assert!(diagnostic.contains("HTTP 500 - injected failure"));
    assert!(!diagnostic.contains("tx:"));
    assert_eq!(report.exported_to, None);

    assert_eq!(repository.count_requests(HttpMethod::Post, "/fcr:rollback"), 1);
    assert_eq!(repository.open_transactions(), 0);
    assert_eq!(repository.paths(), paths_before);
    assert_eq!(
        repository.node("records/ABC123/master/p001.tif"),
        master_before
    );
    assert_eq!(fs::read(package.exported()).unwrap(), export_before);
}

#[tokio::test]
async fn test_begin_failure_touches_nothing() {
    let repository = Arc::new(FakeRepository::new());
    repository.fail_when(HttpMethod::Post, "/rest/fcr:tx", 500);
    let coordinator = coordinator(&repository, policy(false));
    let package = Package::new("ABC123", &["p001.tif"]);

    let report = coordinator.ingest(package.request()).await;

    assert!(!report.success);
    assert_eq!(report.error_kind, Some(IngestErrorKind::ConnectionFailure));
    assert_eq!(report.failed_after, Some(IngestStage::Start));
    assert_eq!(repository.requests().len(), 1);
    assert!(repository.paths().is_empty());
    assert!(!package.exported().exists());
}

#[tokio::test]
async fn test_commit_failure_rolls_back() {
    let repository = Arc::new(FakeRepository::new());
    repository.fail_when(HttpMethod::Post, "/fcr:commit", 500);
    let coordinator = coordinator(&repository, policy(false));
    let package = Package::new("ABC123", &["p001.tif"]);
    let original_mets = fs::read_to_string(package.mets()).unwrap();

    let report = coordinator.ingest(package.request()).await;

    assert!(!report.success);
    assert_eq!(report.error_kind, Some(IngestErrorKind::CommitFailure));
    assert_eq!(report.failed_after, Some(IngestStage::MetadataUploaded));
    assert_eq!(repository.count_requests(HttpMethod::Post, "/fcr:rollback"), 1);
    assert_eq!(repository.open_transactions(), 0);
    assert!(repository.paths().is_empty());
    assert!(!package.exported().exists());
    // nothing after the commit ran, so the document is untouched
    assert_eq!(fs::read_to_string(package.mets()).unwrap(), original_mets);
}

#[tokio::test]
async fn test_rewrite_failure_is_a_warning() {
    let repository = Arc::new(FakeRepository::new());
    let coordinator = coordinator(&repository, policy(false));
    let package = Package::new("ABC123", &["p001.tif"]);
    fs::write(
        package.mets(),
        r#"<mets:mets xmlns:mets="http://www.loc.gov/METS/"><broken></mets:mets>"#,
    )
    .unwrap();

    let report = coordinator.ingest(package.request()).await;

    assert!(report.success, "{:?}", report.diagnostic);
    assert_eq!(report.stage, IngestStage::Exported);
    assert_eq!(report.warnings.len(), 1);
    assert!(report.warnings[0].contains("Reference rewrite failed"));
    assert!(repository.node("records/ABC123/ABC123_mets.xml").is_some());
    assert!(package.exported().exists());
}

#[tokio::test]
async fn test_reference_table_follows_file_name_order() {
    let repository = Arc::new(FakeRepository::new());
    let coordinator = coordinator(&repository, policy(false));
    let pages = ["p001.tif", "p002.tif", "p003.tif"];
    let package = Package::new("ABC123", &pages);

    let shuffled = |folder: &str| -> Vec<PathBuf> {
        ["p003.tif", "p001.tif", "p002.tif"]
            .iter()
            .map(|page| package.folder(folder).join(page))
            .collect()
    };
    let request = IngestRequest::new("ABC123")
        .master_files(shuffled("master"))
        .media_files(shuffled("media"))
        .metadata_document(package.mets())
        .destination(package.folder("export"));

    let report = coordinator.ingest(request).await;

    assert!(report.success, "{:?}", report.diagnostic);
    for folder in ["master", "media"] {
        let expected: Vec<String> = pages
            .iter()
            .map(|page| format!("{}/records/ABC123/{}/{}", BASE_URL, folder, page))
            .collect();
        assert_eq!(report.references.urls_for(folder), expected);
        assert_eq!(report.references.len_for(folder), pages.len());
    }

    let exported = fs::read_to_string(package.exported()).unwrap();
    let positions: Vec<usize> = pages
        .iter()
        .map(|page| {
            exported
                .find(&format!("{}/records/ABC123/master/{}", BASE_URL, page))
                .unwrap()
        })
        .collect();
    assert!(positions.windows(2).all(|pair| pair[0] < pair[1]));
}

#[tokio::test]
async fn test_reserved_characters_in_names_address_distinct_resources() {
    let repository = Arc::new(FakeRepository::new());
    let coordinator = coordinator(&repository, policy(false));
    let pages = ["p#1.tif", "p#2.tif", "scan 50%?.tif"];
    let package = Package::new("AB#1", &pages);

    let report = coordinator.ingest(package.request()).await;

    assert!(report.success, "{:?}", report.diagnostic);
    let encoded = ["p%231.tif", "p%232.tif", "scan%2050%25%3F.tif"];
    for (page, name) in pages.iter().zip(encoded) {
        let path = record_path("AB%231", &format!("/master/{}", name));
        let node = repository
            .node(&path)
            .unwrap_or_else(|| panic!("{} missing", path));
        assert!(node
            .content()
            .unwrap()
            .ends_with(format!("master {}", page).as_bytes()));
    }
    assert!(repository.node(&record_path("AB%231", "/master/p")).is_none());
    assert_eq!(
        report.references.urls_for("master"),
        encoded
            .iter()
            .map(|name| format!("{}/records/AB%231/master/{}", BASE_URL, name))
            .collect::<Vec<_>>()
    );
}

#[tokio::test]
async fn test_directory_listing_skips_subdirectories() {
    let repository = Arc::new(FakeRepository::new());
    let coordinator = coordinator(&repository, policy(false));
    let package = Package::new("ABC123", &["p001.tif", "p002.tif"]);
    fs::create_dir_all(package.folder("master").join("thumbs")).unwrap();

    let report = coordinator.ingest(package.request()).await;

    assert!(report.success, "{:?}", report.diagnostic);
    assert_eq!(report.references.len_for("master"), 2);
    assert!(repository
        .node("records/ABC123/master/thumbs")
        .is_none());
}

#[tokio::test]
async fn test_binaries_only_ingest_needs_no_document() {
    let repository = Arc::new(FakeRepository::new());
    let policy = IngestPolicy {
        use_versioning: false,
        ingest_master_images: true,
        ingest_media_images: false,
        ingest_mets_file: false,
        export_mets_file: false,
    };
    let coordinator = coordinator(&repository, policy);
    let package = Package::new("ABC123", &["p001.tif"]);

    let report = coordinator
        .ingest(IngestRequest::new("ABC123").master_directory(package.folder("master")))
        .await;

    assert!(report.success, "{:?}", report.diagnostic);
    assert_eq!(report.stage, IngestStage::Exported);
    assert!(repository.node("records/ABC123/master/p001.tif").is_some());
    assert!(repository.node("records/ABC123/media").is_none());
    assert!(repository.node("records/ABC123/ABC123_mets.xml").is_none());
    assert_eq!(report.exported_to, None);
}

#[tokio::test]
async fn test_unknown_extension_falls_back_to_octet_stream() {
    let repository = Arc::new(FakeRepository::new());
    let coordinator = coordinator(&repository, policy(false));
    let package = Package::new("ABC123", &[]);
    fs::write(package.folder("master").join("scan.raw"), b"\x00\x01raw").unwrap();
    fs::write(package.folder("master").join("page.tif"), b"not really a tiff").unwrap();

    let report = coordinator.ingest(package.request()).await;

    assert!(report.success, "{:?}", report.diagnostic);
    let raw = repository.node("records/ABC123/master/scan.raw").unwrap();
    assert_eq!(raw.content_type(), Some("application/octet-stream"));
    let tif = repository.node("records/ABC123/master/page.tif").unwrap();
    assert_eq!(tif.content_type(), Some("image/tiff"));
}

#[tokio::test]
async fn test_concurrent_ingests_of_different_records() {
    let repository = Arc::new(FakeRepository::new());
    let coordinator = coordinator(&repository, policy(false));
    let first = Package::new("ABC123", &["p001.tif"]);
    let second = Package::new("XYZ789", &["p001.tif", "p002.tif"]);

    let (a, b) = tokio::join!(
        coordinator.ingest(first.request()),
        coordinator.ingest(second.request())
    );

    assert!(a.success, "{:?}", a.diagnostic);
    assert!(b.success, "{:?}", b.diagnostic);
    assert_ne!(a.job_id, b.job_id);
    assert!(repository.node("records/ABC123/master/p001.tif").is_some());
    assert!(repository.node("records/XYZ789/master/p002.tif").is_some());
    assert_eq!(repository.open_transactions(), 0);

    let exported = fs::read_to_string(second.exported()).unwrap();
    assert!(exported.contains("records/XYZ789/media/p002.tif"));
    assert!(!exported.contains("ABC123"));
}

#[tokio::test]
async fn test_container_creation_is_idempotent() {
    let repository = Arc::new(FakeRepository::new());
    let transactions = TransactionManager::new(repository.clone());
    let containers = ContainerBuilder::new(repository.clone());

    let mut transaction = transactions.begin(BASE_URL).await.unwrap();
    let url = transaction.resource_url("records/ABC123");

    assert_eq!(
        containers.create(&transaction, &url).await.unwrap(),
        ContainerOutcome::Created
    );
    assert_eq!(
        containers.create(&transaction, &url).await.unwrap(),
        ContainerOutcome::AlreadyExists
    );

    transactions.commit(&mut transaction).await.unwrap();
    assert!(repository.node("records/ABC123").unwrap().is_container());
}

#[tokio::test]
async fn test_missing_destination_is_invalid_usage() {
    let repository = Arc::new(FakeRepository::new());
    let coordinator = coordinator(&repository, policy(false));
    let package = Package::new("ABC123", &["p001.tif"]);

    let request = IngestRequest::new("ABC123")
        .master_directory(package.folder("master"))
        .metadata_document(package.mets());
    let report = coordinator.ingest(request).await;

    assert!(!report.success);
    assert_eq!(report.error_kind, Some(IngestErrorKind::InvalidUsage));
    assert!(repository.requests().is_empty());
}

#[tokio::test]
async fn test_missing_document_file_rolls_back() {
    let repository = Arc::new(FakeRepository::new());
    let coordinator = coordinator(&repository, policy(false));
    let package = Package::new("ABC123", &["p001.tif"]);
    fs::remove_file(package.mets()).unwrap();

    let report = coordinator.ingest(package.request()).await;

    assert!(!report.success);
    assert_eq!(report.error_kind, Some(IngestErrorKind::MetadataFailure));
    assert_eq!(report.failed_after, Some(IngestStage::FilesUploaded));
    assert!(repository.paths().is_empty());
    assert!(!package.exported().exists());
}
