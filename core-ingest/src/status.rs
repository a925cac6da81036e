//! Repository status classification.
//!
//! Every repository call maps its HTTP status through [`classify`]. The
//! per-operation policies (container idempotency, delete checks, upsert
//! success) are expressed on [`StatusOutcome`] so they live in one place.

use bridge_traits::HttpResponse;

/// Longest response body kept in a diagnostic.
const MAX_DIAGNOSTIC_BODY: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusOutcome {
    /// 200
    Exists,
    /// 201
    Created,
    /// 204
    NoContent,
    /// 409
    Conflict,
    /// Anything else
    Failure(u16),
}

/// Map a repository status code to its outcome.
pub fn classify(status: u16) -> StatusOutcome {
    match status {
        200 => StatusOutcome::Exists,
        201 => StatusOutcome::Created,
        204 => StatusOutcome::NoContent,
        409 => StatusOutcome::Conflict,
        other => StatusOutcome::Failure(other),
    }
}

impl StatusOutcome {
    /// Existence probe: only 200 counts as present.
    pub fn is_present(&self) -> bool {
        matches!(self, StatusOutcome::Exists)
    }

    /// Resource creation, new version or replacement.
    pub fn is_created(&self) -> bool {
        matches!(self, StatusOutcome::Created)
    }

    /// Resource or tombstone deletion.
    pub fn is_deleted(&self) -> bool {
        matches!(self, StatusOutcome::NoContent)
    }

    /// Container already in place (204 or 409).
    pub fn is_already_satisfied(&self) -> bool {
        matches!(self, StatusOutcome::NoContent | StatusOutcome::Conflict)
    }
}

/// Human-readable diagnostic for an unexpected response: status plus body.
pub fn describe(response: &HttpResponse) -> String {
    let body = response.text_lossy();
    let body = body.trim();

    if body.is_empty() {
        return format!("HTTP {}", response.status);
    }

    let mut end = body.len().min(MAX_DIAGNOSTIC_BODY);
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    let ellipsis = if end < body.len() { "..." } else { "" };

    format!("HTTP {} - {}{}", response.status, &body[..end], ellipsis)
}
