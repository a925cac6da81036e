//! Content type detection for uploaded files.
//!
//! The resolver asks, in order:
//! 1. the platform (`FileSystemAccess::probe_content_type`)
//! 2. the file content (magic bytes of the first few bytes)
//! 3. the file-name extension table
//!
//! Each step runs only when the previous one had no answer. Unknown
//! extensions resolve to `application/octet-stream`.

use bridge_traits::FileSystemAccess;
use mime::Mime;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Bytes read from the start of a file for content sniffing.
const SNIFF_LEN: usize = 16;

/// Where a resolved content type came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MimeSource {
    Platform,
    Content,
    Extension,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedMime {
    pub mime: Mime,
    pub source: MimeSource,
}

impl ResolvedMime {
    fn new(mime: Mime, source: MimeSource) -> Self {
        Self { mime, source }
    }

    pub fn essence(&self) -> &str {
        self.mime.essence_str()
    }
}

pub struct MimeResolver {
    file_system: Arc<dyn FileSystemAccess>,
}

impl MimeResolver {
    pub fn new(file_system: Arc<dyn FileSystemAccess>) -> Self {
        Self { file_system }
    }

    /// Resolve the content type of `path`. Never fails; detection errors fall
    /// through to the next step.
    pub async fn resolve(&self, path: &Path) -> ResolvedMime {
        match self.file_system.probe_content_type(path).await {
            Ok(Some(probed)) => match probed.parse::<Mime>() {
                Ok(mime) => return ResolvedMime::new(mime, MimeSource::Platform),
                Err(e) => debug!(path = ?path, probed = %probed, error = %e, "Ignoring unparsable platform content type"),
            },
            Ok(None) => {}
            Err(e) => debug!(path = ?path, error = %e, "Platform content type probe failed"),
        }

        match self.file_system.read_prefix(path, SNIFF_LEN).await {
            Ok(prefix) => {
                if let Some(mime) = sniff(&prefix) {
                    return ResolvedMime::new(mime, MimeSource::Content);
                }
            }
            Err(e) => debug!(path = ?path, error = %e, "Content sniffing failed"),
        }

        let resolved = from_extension(path);
        debug!(path = ?path, mime = %resolved.mime, "Determined content type from file name");
        resolved
    }
}

/// Recognize well-known binary signatures and XML prologs.
pub fn sniff(prefix: &[u8]) -> Option<Mime> {
    if prefix.starts_with(b"II*\0") || prefix.starts_with(b"MM\0*") {
        return image_tiff();
    }
    if prefix.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return Some(mime::IMAGE_JPEG);
    }
    if prefix.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
        return Some(mime::IMAGE_PNG);
    }
    if prefix.starts_with(b"GIF87a") || prefix.starts_with(b"GIF89a") {
        return Some(mime::IMAGE_GIF);
    }

    // UTF-8 BOM before the prolog is allowed
    let text = prefix.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(prefix);
    if text.starts_with(b"<?xml") {
        return Some(mime::TEXT_XML);
    }

    None
}

/// Content type by file-name extension, case-insensitive.
pub fn from_extension(path: &Path) -> ResolvedMime {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());

    let known = match extension.as_deref() {
        Some("tif") | Some("tiff") => image_tiff(),
        Some("jpg") | Some("jpeg") => Some(mime::IMAGE_JPEG),
        Some("png") => Some(mime::IMAGE_PNG),
        Some("xml") => Some(mime::TEXT_XML),
        _ => None,
    };

    match known {
        Some(mime) => ResolvedMime::new(mime, MimeSource::Extension),
        None => ResolvedMime::new(mime::APPLICATION_OCTET_STREAM, MimeSource::Fallback),
    }
}

fn image_tiff() -> Option<Mime> {
    "image/tiff".parse().ok()
}
