//! Change detection between consecutive runs
//!
//! Only the previous completed run's `url -> signature` map is needed; the
//! page content itself is never compared.

use crate::job::ExtractedPage;
use crate::storage::Snapshot;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;

/// Cheap fingerprint of a page's extracted content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageSignature {
    /// SHA-256 of the markdown, hex encoded
    pub content_hash: String,
    pub word_count: u64,
}

impl PageSignature {
    pub fn of(page: &ExtractedPage) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(page.markdown.as_bytes());
        Self {
            content_hash: hex::encode(hasher.finalize()),
            word_count: page.raw_word_count,
        }
    }
}

/// Classification of a URL relative to the previous completed run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    New,
    Changed,
    Unchanged,
    /// Present in the previous run, not fetched in this one
    Removed,
}

impl ChangeKind {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Changed => "changed",
            Self::Unchanged => "unchanged",
            Self::Removed => "removed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "new" => Some(Self::New),
            "changed" => Some(Self::Changed),
            "unchanged" => Some(Self::Unchanged),
            "removed" => Some(Self::Removed),
            _ => None,
        }
    }
}

/// Classifies a freshly extracted page against the previous run
pub fn classify(url: &str, signature: &PageSignature, previous: &Snapshot) -> ChangeKind {
    match previous.get(url) {
        None => ChangeKind::New,
        Some(prev) if prev == signature => ChangeKind::Unchanged,
        Some(_) => ChangeKind::Changed,
    }
}

/// Per-run change tally
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiffSummary {
    pub new: u64,
    pub changed: u64,
    pub unchanged: u64,
    pub removed: u64,
}

impl DiffSummary {
    pub fn record(&mut self, change: ChangeKind) {
        match change {
            ChangeKind::New => self.new += 1,
            ChangeKind::Changed => self.changed += 1,
            ChangeKind::Unchanged => self.unchanged += 1,
            ChangeKind::Removed => self.removed += 1,
        }
    }
}

/// Tracks one run's classifications and builds the next snapshot
#[derive(Debug)]
pub struct DiffTracker {
    previous: Snapshot,
    current: Snapshot,
    summary: DiffSummary,
}

impl DiffTracker {
    pub fn new(previous: Snapshot) -> Self {
        Self {
            previous,
            current: Snapshot::new(),
            summary: DiffSummary::default(),
        }
    }

    /// Classifies and remembers a page fetched in this run
    ///
    /// A URL recorded twice keeps its first classification.
    pub fn observe(&mut self, page: &ExtractedPage) -> ChangeKind {
        let signature = PageSignature::of(page);
        let change = classify(&page.url, &signature, &self.previous);
        if self.current.insert(page.url.clone(), signature).is_none() {
            self.summary.record(change);
        }
        change
    }

    /// URLs of the previous run that were not fetched in this one
    pub fn removed(&self) -> Vec<String> {
        let fetched: HashSet<&String> = self.current.keys().collect();
        let mut removed: Vec<String> = self
            .previous
            .keys()
            .filter(|url| !fetched.contains(url))
            .cloned()
            .collect();
        removed.sort();
        removed
    }

    /// Final counts, removed pages included
    pub fn summary(&self) -> DiffSummary {
        DiffSummary {
            removed: self.removed().len() as u64,
            ..self.summary
        }
    }

    pub fn into_snapshot(self) -> Snapshot {
        self.current
    }
}
