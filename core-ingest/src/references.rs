//! Ordered record of uploaded resource locations.
//!
//! Entries are positional: the n-th upload into a content folder has ordinal
//! n within that folder, matching the n-th file reference of the document
//! file group bound to it.

use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReferenceEntry {
    /// Content folder the resource was uploaded into (`master`, `media`)
    pub group: String,
    /// Zero-based upload position within the group
    pub ordinal: usize,
    /// Permanent resource URL
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReferenceTable {
    entries: Vec<ReferenceEntry>,
    /// Positions in `entries` per group, in ordinal order
    #[serde(skip)]
    by_group: HashMap<String, Vec<usize>>,
}

impl ReferenceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `url` to `group`, returning its ordinal.
    pub fn push(&mut self, group: &str, url: impl Into<String>) -> usize {
        let positions = self.by_group.entry(group.to_string()).or_default();
        let ordinal = positions.len();
        positions.push(self.entries.len());
        self.entries.push(ReferenceEntry {
            group: group.to_string(),
            ordinal,
            url: url.into(),
        });
        ordinal
    }

    /// URLs of `group` in upload order.
    pub fn urls_for(&self, group: &str) -> Vec<&str> {
        self.positions(group)
            .iter()
            .filter_map(|&position| self.url_at(position))
            .collect()
    }

    pub fn get(&self, group: &str, ordinal: usize) -> Option<&str> {
        self.positions(group)
            .get(ordinal)
            .and_then(|&position| self.url_at(position))
    }

    pub fn len_for(&self, group: &str) -> usize {
        self.positions(group).len()
    }

    pub fn entries(&self) -> &[ReferenceEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn positions(&self, group: &str) -> &[usize] {
        self.by_group.get(group).map(Vec::as_slice).unwrap_or(&[])
    }

    fn url_at(&self, position: usize) -> Option<&str> {
        self.entries.get(position).map(|entry| entry.url.as_str())
    }
}
