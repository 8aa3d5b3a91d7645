//! Merge and retention rules for folding a fresh measurement into the
//! parsed ledger.
//!
//! The merge is a pure function from (existing entries, measured artifacts,
//! commit identity) to the new ordered entry list. Orchestration, I/O, and
//! metadata lookups live in `commands::update`.

use crate::ports::git::{CommitIdentity, RefMetadata};
use crate::report::{Artifact, Entry, EntryKind};

/// Knobs for one merge run.
#[derive(Debug, Default)]
pub struct MergeOptions<'a> {
    /// Recompute the master baseline from this resolved ref, using the
    /// just-measured artifact sizes.
    pub master_override: Option<&'a RefMetadata>,
    /// Mirror the measured head as a branch-tip entry. Callers set this
    /// only when a branch is checked out and the working tree is clean
    /// outside the reports root.
    pub derive_branch: bool,
}

/// Folds a fresh measurement into the existing entries, producing the new
/// ordered entry list: master (when retained), head, then branch and
/// history entries.
#[must_use]
pub fn merge_snapshot(
    existing: Vec<Entry>,
    measured: &[Artifact],
    head: &CommitIdentity,
    options: &MergeOptions<'_>,
) -> Vec<Entry> {
    let mut prev_master = None;
    let mut prev_head = None;
    let mut tail: Vec<Entry> = Vec::new();
    for entry in existing {
        match entry.kind {
            EntryKind::Master if prev_master.is_none() => prev_master = Some(entry),
            EntryKind::Head if prev_head.is_none() => prev_head = Some(entry),
            // A second master or head has no defined meaning; retain it as
            // history rather than dropping data.
            EntryKind::Master | EntryKind::Head => {
                tail.push(Entry { kind: EntryKind::History, ..entry });
            }
            EntryKind::Branch | EntryKind::History => tail.push(entry),
        }
    }

    let new_head = snapshot_entry(EntryKind::Head, head, measured);

    let master = match options.master_override {
        Some(meta) => Some(snapshot_entry(
            EntryKind::Master,
            &CommitIdentity {
                sha: meta.sha.clone(),
                subject: meta.subject.clone(),
                date_iso: meta.date_iso.clone(),
                branch: None,
            },
            measured,
        )),
        None => prev_master,
    };
    // A master identical to head carries no comparative signal.
    let master = master.filter(|m| {
        m.sha != new_head.sha || m.size_map() != new_head.size_map()
    });

    let mut incoming: Vec<Entry> = Vec::new();
    if options.derive_branch && head.branch.is_some() {
        incoming.push(snapshot_entry(EntryKind::Branch, head, measured));
    }
    if let Some(prev) = prev_head {
        if prev.sha != new_head.sha && prev.has_commit_sha() {
            incoming.push(Entry { kind: EntryKind::History, ..prev });
        }
    }
    incoming.extend(tail);

    let mut result: Vec<Entry> = Vec::new();
    result.extend(master);
    result.push(new_head.clone());
    for entry in incoming {
        if duplicates_retained(&entry, &new_head, &result) {
            continue;
        }
        result.push(entry);
    }
    result
}

/// Builds a snapshot entry of the given kind from commit identity plus the
/// measured artifact sizes.
fn snapshot_entry(kind: EntryKind, identity: &CommitIdentity, measured: &[Artifact]) -> Entry {
    let mut entry = Entry {
        kind,
        sha: identity.sha.to_ascii_lowercase(),
        message: identity.subject.clone(),
        subject: Some(identity.subject.clone()),
        branch: identity.branch.clone(),
        date_iso: Some(identity.date_iso.clone()),
        artifacts: measured.to_vec(),
    };
    entry.sort_artifacts();
    entry
}

/// Suppression rules for the branch/history block: one branch entry per
/// (branch, sha) pair, one history entry per sha, and never a history entry
/// carrying the current head's sha.
fn duplicates_retained(candidate: &Entry, new_head: &Entry, retained: &[Entry]) -> bool {
    match candidate.kind {
        EntryKind::Branch => retained.iter().any(|kept| {
            kept.kind == EntryKind::Branch
                && kept.branch == candidate.branch
                && kept.sha == candidate.sha
        }),
        EntryKind::History => {
            candidate.sha == new_head.sha
                || retained
                    .iter()
                    .any(|kept| kept.kind == EntryKind::History && kept.sha == candidate.sha)
        }
        EntryKind::Master | EntryKind::Head => false,
    }
}
