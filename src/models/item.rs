//! Per-run item types. None of these outlive a run.

use chrono::NaiveDate;

/// A discovered announcement reference with its raw title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateItem {
    /// Opaque, stable locator of the announcement
    pub source_ref: String,

    pub raw_title: String,
}

/// What the source returns for one announcement page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemDetail {
    pub raw_title: String,

    /// Locator of the attached document, if the page has one
    pub attachment_ref: Option<String>,
}

/// A candidate after relevance and freshness classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedItem {
    pub candidate: CandidateItem,

    /// Title used for publishing and for remote title dedup
    pub normalized_title: String,

    /// Date found in the title, resolved to a full calendar date
    pub occurs_on: Option<NaiveDate>,

    pub is_relevant: bool,
    pub is_fresh: bool,
}

impl ClassifiedItem {
    /// Whether the item should continue through the pipeline.
    pub fn is_actionable(&self) -> bool {
        self.is_relevant && self.is_fresh
    }

    pub fn source_ref(&self) -> &str {
        &self.candidate.source_ref
    }
}

/// Downloaded attachment bytes with the validator's verdict.
#[derive(Debug, Clone)]
pub struct FetchedAttachment {
    pub bytes: Vec<u8>,
    pub is_valid: bool,
}
