//! Snapshot ledger core: entry model, codec, merge rules, and deltas.
//!
//! One report file per tracked output folder holds an ordered sequence of
//! [`Entry`] records: the regression baseline (`master`), the currently
//! measured checkout (`head`), optional branch tips, and superseded head
//! snapshots kept as history.

pub mod codec;
pub mod delta;
pub mod update;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Sentinel used where a commit hash or subject could not be resolved.
pub const PLACEHOLDER: &str = "UNKNOWN";

/// Report file name within a tracked folder.
pub const REPORT_FILENAME: &str = "report.txt";

/// Derived index/manifest file name.
pub const INDEX_FILENAME: &str = "index.json";

/// Returns `true` if `candidate` is a full 40-character hex commit hash.
///
/// Case-insensitive on input; callers canonicalize to lowercase when
/// persisting.
#[must_use]
pub fn is_commit_sha(candidate: &str) -> bool {
    candidate.len() == 40 && candidate.chars().all(|c| c.is_ascii_hexdigit())
}

/// One named build output file and its byte size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    /// File name of the build output (identity within one entry).
    pub file_name: String,
    /// Measured size in bytes.
    pub size_bytes: u64,
}

/// Classification of a ledger record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    /// The regression baseline commit.
    Master,
    /// The currently measured working tree.
    Head,
    /// A tracked branch tip.
    Branch,
    /// A prior head snapshot displaced by a newer measurement.
    History,
}

impl EntryKind {
    /// Uppercase label token used in the persisted report.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            EntryKind::Master => "MASTER",
            EntryKind::Head => "HEAD",
            EntryKind::Branch => "BRANCH",
            EntryKind::History => "HISTORY",
        }
    }

    /// Lowercase name used in derived JSON payloads.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            EntryKind::Master => "master",
            EntryKind::Head => "head",
            EntryKind::Branch => "branch",
            EntryKind::History => "history",
        }
    }

    /// Parses an uppercase label token from the persisted report.
    #[must_use]
    pub fn from_label(token: &str) -> Option<Self> {
        match token {
            "MASTER" => Some(EntryKind::Master),
            "HEAD" => Some(EntryKind::Head),
            "BRANCH" => Some(EntryKind::Branch),
            "HISTORY" => Some(EntryKind::History),
            _ => None,
        }
    }
}

/// One ledger record: a tagged snapshot of artifact sizes plus commit
/// identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Record classification.
    pub kind: EntryKind,
    /// Full commit hash, or [`PLACEHOLDER`] when unresolved.
    pub sha: String,
    /// Commit subject line as recorded, or [`PLACEHOLDER`] when absent.
    pub message: String,
    /// Re-resolved commit subject, when known.
    pub subject: Option<String>,
    /// Branch name for head/branch entries; `None` when detached or not
    /// applicable.
    pub branch: Option<String>,
    /// ISO-8601 timestamp of the last refresh or commit.
    pub date_iso: Option<String>,
    /// Measured artifacts, ordered by name, unique by name.
    pub artifacts: Vec<Artifact>,
}

impl Entry {
    /// Creates an empty entry of the given kind with sentinel metadata.
    #[must_use]
    pub fn placeholder(kind: EntryKind) -> Self {
        Self {
            kind,
            sha: PLACEHOLDER.to_string(),
            message: PLACEHOLDER.to_string(),
            subject: None,
            branch: None,
            date_iso: None,
            artifacts: Vec::new(),
        }
    }

    /// Returns `true` when the entry carries a resolved commit hash.
    #[must_use]
    pub fn has_commit_sha(&self) -> bool {
        is_commit_sha(&self.sha)
    }

    /// Adds an artifact, replacing any existing artifact with the same name.
    ///
    /// Name collisions within one entry are resolved last-write-wins.
    pub fn push_artifact(&mut self, artifact: Artifact) {
        if let Some(existing) =
            self.artifacts.iter_mut().find(|a| a.file_name == artifact.file_name)
        {
            *existing = artifact;
        } else {
            self.artifacts.push(artifact);
        }
    }

    /// Sorts artifacts by file name, the canonical persisted order.
    pub fn sort_artifacts(&mut self) {
        self.artifacts.sort_by(|a, b| a.file_name.cmp(&b.file_name));
    }

    /// Returns artifact sizes keyed by file name.
    #[must_use]
    pub fn size_map(&self) -> BTreeMap<&str, u64> {
        self.artifacts.iter().map(|a| (a.file_name.as_str(), a.size_bytes)).collect()
    }

    /// Best available subject line: the re-resolved subject when present,
    /// otherwise the recorded message.
    #[must_use]
    pub fn display_subject(&self) -> &str {
        self.subject.as_deref().unwrap_or(&self.message)
    }
}
