//! # Reference Rewriter
//!
//! Points the file references of a METS document at the uploaded resources.
//!
//! For every `mets:fileSec/mets:fileGrp` whose `USE` names a configured
//! group, the n-th `mets:file`'s `mets:FLocat/@xlink:href` is replaced with
//! the n-th URL uploaded into the bound content folder. Everything else in
//! the document is written back unchanged.

use crate::error::{IngestError, Result};
use crate::references::ReferenceTable;
use crate::transaction::strip_version_path;
use bridge_traits::FileSystemAccess;
use bytes::Bytes;
use core_runtime::config::FileGroupRewrite;
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::reader::NsReader;
use quick_xml::Writer;
use std::path::Path;
use tracing::{debug, info, instrument, warn};

pub const METS_NS: &[u8] = b"http://www.loc.gov/METS/";
pub const XLINK_NS: &[u8] = b"http://www.w3.org/1999/xlink";

/// Counts from one rewrite.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RewriteSummary {
    /// References replaced
    pub replaced: usize,
    /// References left alone because the table had no entry at their position
    pub unmatched: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tag {
    FileSec,
    FileGrp,
    File,
    FLocat,
    Other,
}

/// Open METS element on the path from the root.
#[derive(Debug, Clone, Copy)]
enum Frame<'a> {
    FileSec,
    FileGroup { folder: Option<&'a str>, files: usize },
    File { folder: Option<&'a str>, ordinal: usize },
    Other,
}

pub struct ReferenceRewriter {
    file_groups: Vec<FileGroupRewrite>,
}

impl ReferenceRewriter {
    pub fn new(file_groups: Vec<FileGroupRewrite>) -> Self {
        Self { file_groups }
    }

    fn folder_for(&self, group: &str) -> Option<&str> {
        self.file_groups
            .iter()
            .find(|rewrite| rewrite.group == group)
            .map(|rewrite| rewrite.folder.as_str())
    }

    /// Rewrite `document`, returning the new XML and counts.
    pub fn rewrite(
        &self,
        document: &str,
        references: &ReferenceTable,
    ) -> Result<(String, RewriteSummary)> {
        let mut reader = NsReader::from_str(document);
        let mut writer = Writer::new(Vec::with_capacity(document.len()));
        let mut stack: Vec<Frame<'_>> = Vec::new();
        let mut summary = RewriteSummary::default();

        loop {
            let (namespace, event) = reader.read_resolved_event().map_err(xml_error)?;
            let in_mets =
                matches!(namespace, ResolveResult::Bound(Namespace(ns)) if ns == METS_NS);

            match event {
                Event::Start(element) => {
                    let (frame, element) = self.open_element(
                        &reader,
                        &mut stack,
                        element,
                        in_mets,
                        references,
                        &mut summary,
                    )?;
                    stack.push(frame);
                    writer.write_event(Event::Start(element)).map_err(xml_error)?;
                }
                Event::Empty(element) => {
                    let (_, element) = self.open_element(
                        &reader,
                        &mut stack,
                        element,
                        in_mets,
                        references,
                        &mut summary,
                    )?;
                    writer.write_event(Event::Empty(element)).map_err(xml_error)?;
                }
                Event::End(element) => {
                    stack.pop();
                    writer.write_event(Event::End(element)).map_err(xml_error)?;
                }
                Event::Eof => break,
                other => writer.write_event(other).map_err(xml_error)?,
            }
        }

        let xml = String::from_utf8(writer.into_inner())
            .map_err(|e| IngestError::Rewrite(e.to_string()))?;
        Ok((xml, summary))
    }

    /// Rewrite the document at `path` in place.
    #[instrument(skip(self, file_system, references), fields(document = %path.display()))]
    pub async fn rewrite_file(
        &self,
        file_system: &dyn FileSystemAccess,
        path: &Path,
        references: &ReferenceTable,
    ) -> Result<RewriteSummary> {
        let data = file_system
            .read_file(path)
            .await
            .map_err(|e| IngestError::Rewrite(format!("cannot read document: {}", e)))?;
        let document = std::str::from_utf8(&data)
            .map_err(|e| IngestError::Rewrite(format!("document is not UTF-8: {}", e)))?;

        let (xml, summary) = self.rewrite(document, references)?;

        file_system
            .write_file(path, Bytes::from(xml))
            .await
            .map_err(|e| IngestError::Rewrite(format!("cannot write document: {}", e)))?;

        info!(
            replaced = summary.replaced,
            unmatched = summary.unmatched,
            "File references rewritten"
        );
        Ok(summary)
    }

    /// Classify an opening (or self-closing) element, advance the file
    /// ordinal of its group and rewrite it when it is a bound `FLocat`.
    fn open_element<'s, 'a>(
        &'s self,
        reader: &NsReader<&[u8]>,
        stack: &mut [Frame<'s>],
        element: BytesStart<'a>,
        in_mets: bool,
        references: &ReferenceTable,
        summary: &mut RewriteSummary,
    ) -> Result<(Frame<'s>, BytesStart<'a>)> {
        if !in_mets {
            return Ok((Frame::Other, element));
        }

        let tag = match element.local_name().as_ref() {
            b"fileSec" => Tag::FileSec,
            b"fileGrp" => Tag::FileGrp,
            b"file" => Tag::File,
            b"FLocat" => Tag::FLocat,
            _ => Tag::Other,
        };

        let frame = match (stack.last_mut(), tag) {
            (_, Tag::FileSec) => Frame::FileSec,
            (Some(Frame::FileSec), Tag::FileGrp) => {
                let folder = match element.try_get_attribute("USE").map_err(xml_error)? {
                    Some(attribute) => {
                        let group = attribute.unescape_value().map_err(xml_error)?;
                        self.folder_for(&group)
                    }
                    None => None,
                };
                if let Some(folder) = folder {
                    debug!(folder, "Rewriting file group");
                }
                Frame::FileGroup { folder, files: 0 }
            }
            (Some(Frame::FileGroup { folder, files }), Tag::File) => {
                let frame = Frame::File {
                    folder: *folder,
                    ordinal: *files,
                };
                *files += 1;
                frame
            }
            (
                Some(Frame::File {
                    folder: Some(folder),
                    ordinal,
                }),
                Tag::FLocat,
            ) => {
                let (folder, ordinal) = (*folder, *ordinal);
                let element =
                    rewrite_location(reader, element, folder, ordinal, references, summary)?;
                return Ok((Frame::Other, element));
            }
            _ => Frame::Other,
        };

        Ok((frame, element))
    }
}

fn rewrite_location<'a>(
    reader: &NsReader<&[u8]>,
    element: BytesStart<'a>,
    folder: &str,
    ordinal: usize,
    references: &ReferenceTable,
    summary: &mut RewriteSummary,
) -> Result<BytesStart<'a>> {
    let Some(url) = references.get(folder, ordinal) else {
        warn!(
            folder,
            ordinal,
            uploaded = references.len_for(folder),
            "No uploaded resource for file reference; leaving it unchanged"
        );
        summary.unmatched += 1;
        return Ok(element);
    };
    let url = strip_version_path(url);

    let name = String::from_utf8_lossy(element.name().as_ref()).into_owned();
    let mut rebuilt = BytesStart::new(name);
    let mut replaced = false;

    for attribute in element.attributes() {
        let attribute = attribute.map_err(xml_error)?;
        let (namespace, local) = reader.resolve_attribute(attribute.key);
        let is_href = local.as_ref() == b"href"
            && matches!(namespace, ResolveResult::Bound(Namespace(ns)) if ns == XLINK_NS);

        if is_href {
            let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
            rebuilt.push_attribute((key.as_str(), url));
            replaced = true;
        } else {
            rebuilt.push_attribute(attribute);
        }
    }

    if !replaced {
        rebuilt.push_attribute(("xmlns:xlink", "http://www.w3.org/1999/xlink"));
        rebuilt.push_attribute(("xlink:href", url));
    }

    summary.replaced += 1;
    Ok(rebuilt)
}

fn xml_error(e: impl std::fmt::Display) -> IngestError {
    IngestError::Rewrite(e.to_string())
}
