//! Manifest builder: regenerates per-folder JSON indexes and the
//! repository-wide summary manifest from the persisted reports.
//!
//! Both outputs are derived artifacts, destroyed and rebuilt on every run.
//! Commit subjects and timestamps are re-resolved from version control on a
//! best-effort basis; a failed lookup leaves an entry's last-known values
//! untouched and never aborts the rebuild.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::context::ServiceContext;
use crate::error::{Error, Result};
use crate::report::codec;
use crate::report::delta::{compute_deltas, ArtifactDelta};
use crate::report::{Artifact, Entry, EntryKind, INDEX_FILENAME, PLACEHOLDER, REPORT_FILENAME};

/// Per-folder JSON index: the ordered commit history with artifacts.
#[derive(Debug, Serialize)]
pub struct FolderIndex {
    /// When this index was (re)generated.
    pub generated_at: String,
    /// Tracked folder, relative to the reports root.
    pub folder: String,
    /// Report file path, relative to the reports root.
    pub report_path: String,
    /// Ledger entries flattened for consumption by dashboards.
    pub commits: Vec<CommitRecord>,
}

/// One ledger entry flattened into the folder index.
#[derive(Debug, Serialize)]
pub struct CommitRecord {
    /// Entry classification.
    pub kind: EntryKind,
    /// Stable identifier: `{kind}:{branch-or-NO_BRANCH}:{sha}`.
    pub id: String,
    /// Full commit hash or sentinel.
    pub git_sha: String,
    /// Recorded commit message.
    pub git_message: String,
    /// Branch name, when applicable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    /// Best available subject line.
    pub subject: String,
    /// ISO timestamp of the entry.
    pub date: String,
    /// Human-readable display label.
    pub label: String,
    /// Measured artifacts.
    pub artifacts: Vec<Artifact>,
}

/// Repository-wide summary manifest.
#[derive(Debug, Serialize)]
pub struct Manifest {
    /// When the manifest was regenerated; always fresh.
    pub generated_at: String,
    /// One summary row per tracked folder.
    pub folders: Vec<ManifestFolder>,
}

/// Summary row for one tracked folder.
#[derive(Debug, Serialize)]
pub struct ManifestFolder {
    /// Folder path relative to the reports root.
    pub folder: String,
    /// Folder index path relative to the reports root.
    pub index: String,
    /// Number of ledger entries in the folder's report.
    pub commit_count: usize,
    /// Current head commit reference.
    pub head: CommitRef,
    /// Baseline commit reference (sentinels when no master is retained).
    pub master: CommitRef,
    /// Baseline-to-head comparison for the folder's artifacts.
    pub artifacts: Vec<ArtifactDelta>,
}

/// Bare commit reference embedded in a manifest row.
#[derive(Debug, Serialize)]
pub struct CommitRef {
    /// Full commit hash or sentinel.
    pub git_sha: String,
    /// Recorded commit message or sentinel.
    pub git_message: String,
}

/// Rebuilds every folder index under `reports_root` plus the root manifest.
///
/// `updated_folder` names the folder whose snapshot was just refreshed; all
/// other folders keep their previous `generated_at` stamp so an update to
/// one folder does not churn the timestamps of unrelated ones.
///
/// # Errors
///
/// Fails on unreadable or corrupt reports and on index/manifest write
/// failures. Version-control lookup failures are tolerated per entry.
pub fn rebuild(
    ctx: &ServiceContext,
    reports_root: &Path,
    updated_folder: Option<&Path>,
) -> Result<Manifest> {
    let now_iso = ctx.clock.now().to_rfc3339();
    let mut folders = Vec::new();
    let mut indexes: Vec<(PathBuf, FolderIndex)> = Vec::new();

    // Parse every report before writing anything, so a corrupt report in
    // one folder leaves the whole tree untouched.
    for folder in discover_report_folders(ctx, reports_root)? {
        let report_path = folder.join(REPORT_FILENAME);
        let mut entries = codec::read_report(ctx.fs.as_ref(), &report_path)?;
        refresh_metadata(ctx, &mut entries, &now_iso);

        let folder_rel = relative_string(reports_root, &folder);
        let index_path = folder.join(INDEX_FILENAME);
        let generated_at = if updated_folder == Some(folder.as_path()) {
            now_iso.clone()
        } else {
            existing_generated_at(ctx, &index_path).unwrap_or_else(|| now_iso.clone())
        };

        let commits: Vec<CommitRecord> = entries.iter().map(|e| commit_record(e, &now_iso)).collect();
        let index = FolderIndex {
            generated_at,
            folder: folder_rel.clone(),
            report_path: relative_string(reports_root, &report_path),
            commits,
        };

        folders.push(summarize_folder(&entries, folder_rel, &index));
        indexes.push((index_path, index));
    }

    for (index_path, index) in &indexes {
        write_json(ctx, index_path, index)?;
    }

    folders.sort_by(|a, b| a.folder.cmp(&b.folder));
    let manifest = Manifest { generated_at: now_iso, folders };
    write_json(ctx, &reports_root.join(INDEX_FILENAME), &manifest)?;
    Ok(manifest)
}

/// Walks the reports root collecting every directory holding a report file,
/// in sorted path order.
fn discover_report_folders(ctx: &ServiceContext, root: &Path) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        if ctx.fs.exists(&dir.join(REPORT_FILENAME)) {
            found.push(dir.clone());
        }
        let entries = ctx
            .fs
            .list_dir(&dir)
            .map_err(|e| Error::Io(std::io::Error::other(e.to_string())))?;
        for name in entries {
            let child = dir.join(&name);
            if ctx.fs.is_dir(&child) {
                pending.push(child);
            }
        }
    }
    found.sort();
    Ok(found)
}

/// Re-resolves subjects and timestamps, then stamps head/branch entries
/// with the rebuild's generation time.
fn refresh_metadata(ctx: &ServiceContext, entries: &mut [Entry], now_iso: &str) {
    for entry in entries.iter_mut() {
        if entry.has_commit_sha() {
            if let Ok(meta) = ctx.git.metadata_for(&entry.sha) {
                if entry.message == PLACEHOLDER {
                    entry.message.clone_from(&meta.subject);
                }
                entry.subject = Some(meta.subject);
                entry.date_iso = Some(meta.date_iso);
            }
        }
        if matches!(entry.kind, EntryKind::Head | EntryKind::Branch) {
            entry.date_iso = Some(now_iso.to_string());
        }
    }
}

fn commit_record(entry: &Entry, now_iso: &str) -> CommitRecord {
    let subject = entry.display_subject().to_string();
    let short = short_sha(&entry.sha);
    let label = match entry.kind {
        EntryKind::Head => {
            let branch_or_message = entry.branch.as_deref().unwrap_or(&entry.message);
            format!("HEAD-{branch_or_message}-{subject}-{short}")
        }
        EntryKind::Branch => {
            let branch = entry.branch.as_deref().unwrap_or("NO_BRANCH");
            format!("{branch}-{subject}-{short}")
        }
        EntryKind::Master => format!("MASTER-{subject}-{short}"),
        EntryKind::History => format!("{subject}-{short}"),
    };
    CommitRecord {
        kind: entry.kind,
        id: format!(
            "{}:{}:{}",
            entry.kind.name(),
            entry.branch.as_deref().unwrap_or("NO_BRANCH"),
            entry.sha
        ),
        git_sha: entry.sha.clone(),
        git_message: entry.message.clone(),
        branch: entry.branch.clone(),
        subject,
        date: entry.date_iso.clone().unwrap_or_else(|| now_iso.to_string()),
        label,
        artifacts: entry.artifacts.clone(),
    }
}

fn summarize_folder(entries: &[Entry], folder_rel: String, index: &FolderIndex) -> ManifestFolder {
    let head = entries.iter().find(|e| e.kind == EntryKind::Head);
    // Baseline preference: master, else the earliest (oldest) history
    // entry, else the head itself.
    let base = entries
        .iter()
        .find(|e| e.kind == EntryKind::Master)
        .or_else(|| entries.iter().filter(|e| e.kind == EntryKind::History).last())
        .or(head);

    let deltas = match (base, head) {
        (Some(base), Some(head)) => compute_deltas(&base.artifacts, &head.artifacts),
        _ => Vec::new(),
    };
    let index_rel = if folder_rel == "." {
        INDEX_FILENAME.to_string()
    } else {
        format!("{folder_rel}/{INDEX_FILENAME}")
    };
    ManifestFolder {
        folder: folder_rel,
        index: index_rel,
        commit_count: index.commits.len(),
        head: commit_ref(head),
        master: commit_ref(entries.iter().find(|e| e.kind == EntryKind::Master)),
        artifacts: deltas,
    }
}

fn commit_ref(entry: Option<&Entry>) -> CommitRef {
    match entry {
        Some(entry) => {
            CommitRef { git_sha: entry.sha.clone(), git_message: entry.message.clone() }
        }
        None => CommitRef {
            git_sha: PLACEHOLDER.to_string(),
            git_message: PLACEHOLDER.to_string(),
        },
    }
}

/// Pulls `generated_at` out of an existing index file, tolerating hand
/// edits and malformed JSON.
fn existing_generated_at(ctx: &ServiceContext, index_path: &Path) -> Option<String> {
    if !ctx.fs.exists(index_path) {
        return None;
    }
    let content = ctx.fs.read_to_string(index_path).ok()?;
    let value: serde_json::Value = serde_json::from_str(&content).ok()?;
    value.get("generated_at")?.as_str().map(String::from)
}

fn write_json<T: Serialize>(ctx: &ServiceContext, path: &Path, value: &T) -> Result<()> {
    let mut payload = serde_json::to_string_pretty(value)?;
    payload.push('\n');
    ctx.fs
        .write(path, &payload)
        .map_err(|e| Error::Io(std::io::Error::other(e.to_string())))
}

/// First seven characters of the sha field. Sliced on char boundaries:
/// the codec passes non-hex sha fields (sentinels, hand edits) through
/// verbatim, so the field is not guaranteed to be ASCII.
fn short_sha(sha: &str) -> &str {
    match sha.char_indices().nth(7) {
        Some((idx, _)) => &sha[..idx],
        None => sha,
    }
}

fn relative_string(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    let joined = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/");
    if joined.is_empty() {
        ".".to_string()
    } else {
        joined
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::git::{CommitIdentity, CommitMetadataProvider, RefMetadata};
    use crate::ports::{Clock, FileSystem};
    use crate::report::Artifact;
    use chrono::{DateTime, TimeZone, Utc};
    use std::collections::HashMap;
    use std::sync::Mutex;

    fn sha(fill: char) -> String {
        std::iter::repeat(fill).take(40).collect()
    }

    /// Fixed clock for deterministic `generated_at` stamps.
    struct FixedClock(DateTime<Utc>);

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.0
        }
    }

    /// In-memory filesystem with just enough directory semantics for
    /// recursive report discovery.
    struct MemFs {
        files: Mutex<HashMap<PathBuf, String>>,
    }

    impl MemFs {
        fn new() -> Self {
            Self { files: Mutex::new(HashMap::new()) }
        }

        fn insert(&self, path: &str, contents: &str) {
            self.files.lock().unwrap().insert(PathBuf::from(path), contents.to_string());
        }
    }

    impl FileSystem for MemFs {
        fn read_to_string(
            &self,
            path: &Path,
        ) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
            self.files
                .lock()
                .unwrap()
                .get(path)
                .cloned()
                .ok_or_else(|| format!("file not found: {}", path.display()).into())
        }

        fn write(
            &self,
            path: &Path,
            contents: &str,
        ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
            self.files.lock().unwrap().insert(path.to_path_buf(), contents.to_string());
            Ok(())
        }

        fn exists(&self, path: &Path) -> bool {
            let files = self.files.lock().unwrap();
            files.contains_key(path) || files.keys().any(|k| k.starts_with(path))
        }

        fn is_dir(&self, path: &Path) -> bool {
            let files = self.files.lock().unwrap();
            !files.contains_key(path) && files.keys().any(|k| k.starts_with(path))
        }

        fn list_dir(
            &self,
            path: &Path,
        ) -> Result<Vec<String>, Box<dyn std::error::Error + Send + Sync>> {
            let files = self.files.lock().unwrap();
            let mut names: Vec<String> = files
                .keys()
                .filter_map(|k| k.strip_prefix(path).ok())
                .filter_map(|rest| rest.components().next())
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect();
            names.sort();
            names.dedup();
            Ok(names)
        }

        fn file_size(
            &self,
            path: &Path,
        ) -> Result<u64, Box<dyn std::error::Error + Send + Sync>> {
            let files = self.files.lock().unwrap();
            files
                .get(path)
                .map(|c| c.len() as u64)
                .ok_or_else(|| format!("file not found: {}", path.display()).into())
        }

        fn create_dir_all(
            &self,
            _path: &Path,
        ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
            Ok(())
        }
    }

    /// Stub metadata provider that resolves every sha to a fixed subject.
    struct StubGit {
        subject: Option<String>,
    }

    impl CommitMetadataProvider for StubGit {
        fn current_head(
            &self,
        ) -> Result<CommitIdentity, Box<dyn std::error::Error + Send + Sync>> {
            Err("not used by the manifest builder".into())
        }

        fn metadata_for(
            &self,
            reference: &str,
        ) -> Result<RefMetadata, Box<dyn std::error::Error + Send + Sync>> {
            match &self.subject {
                Some(subject) => Ok(RefMetadata {
                    sha: reference.to_string(),
                    subject: subject.clone(),
                    date_iso: "2026-08-20T08:00:00+00:00".to_string(),
                }),
                None => Err("unresolvable".into()),
            }
        }

        fn is_clean_outside(
            &self,
            _path_prefix: &str,
        ) -> Result<bool, Box<dyn std::error::Error + Send + Sync>> {
            Ok(true)
        }
    }

    fn context(fs: MemFs, git: StubGit) -> ServiceContext {
        ServiceContext {
            clock: Box::new(FixedClock(Utc.with_ymd_and_hms(2026, 8, 26, 12, 0, 0).unwrap())),
            fs: Box::new(fs),
            git: Box::new(git),
        }
    }

    fn report_with_head_and_master(head_fill: char, master_fill: char) -> String {
        codec::render_report(&[
            Entry {
                kind: EntryKind::Master,
                sha: sha(master_fill),
                message: "Baseline".into(),
                subject: None,
                branch: None,
                date_iso: None,
                artifacts: vec![Artifact {
                    file_name: "sandbox.wasm".into(),
                    size_bytes: 1_000_000,
                }],
            },
            Entry {
                kind: EntryKind::Head,
                sha: sha(head_fill),
                message: "Current".into(),
                subject: None,
                branch: Some("main".into()),
                date_iso: Some("2026-08-25T09:00:00+00:00".into()),
                artifacts: vec![Artifact {
                    file_name: "sandbox.wasm".into(),
                    size_bytes: 1_030_000,
                }],
            },
        ])
    }

    #[test]
    fn rebuild_writes_folder_index_and_manifest() {
        let fs = MemFs::new();
        fs.insert("reports/size/sandbox/report.txt", &report_with_head_and_master('a', 'b'));
        let ctx = context(fs, StubGit { subject: Some("Resolved subject".into()) });

        let manifest = rebuild(&ctx, Path::new("reports/size"), None).unwrap();

        assert_eq!(manifest.folders.len(), 1);
        let row = &manifest.folders[0];
        assert_eq!(row.folder, "sandbox");
        assert_eq!(row.index, "sandbox/index.json");
        assert_eq!(row.commit_count, 2);
        assert_eq!(row.head.git_sha, sha('a'));
        assert_eq!(row.master.git_sha, sha('b'));
        assert_eq!(row.artifacts.len(), 1);
        assert!(row.artifacts[0].alert);

        let fs = &ctx.fs;
        assert!(fs.exists(Path::new("reports/size/sandbox/index.json")));
        assert!(fs.exists(Path::new("reports/size/index.json")));
    }

    #[test]
    fn commit_ids_and_labels_follow_the_derivation_rules() {
        let fs = MemFs::new();
        fs.insert("reports/size/sandbox/report.txt", &report_with_head_and_master('a', 'b'));
        let ctx = context(fs, StubGit { subject: Some("Resolved subject".into()) });

        rebuild(&ctx, Path::new("reports/size"), None).unwrap();

        let fs_impl = ctx.fs.as_ref();
        let index = fs_impl
            .read_to_string(Path::new("reports/size/sandbox/index.json"))
            .unwrap();
        let index: serde_json::Value = serde_json::from_str(&index).unwrap();
        let commits = index["commits"].as_array().unwrap();

        let master = &commits[0];
        assert_eq!(master["kind"], "master");
        assert_eq!(master["id"], format!("master:NO_BRANCH:{}", sha('b')));
        assert_eq!(
            master["label"],
            format!("MASTER-Resolved subject-{}", &sha('b')[..7])
        );

        let head = &commits[1];
        assert_eq!(head["kind"], "head");
        assert_eq!(head["id"], format!("head:main:{}", sha('a')));
        assert_eq!(
            head["label"],
            format!("HEAD-main-Resolved subject-{}", &sha('a')[..7])
        );
        // Head entries are stamped with the rebuild time.
        assert_eq!(head["date"], "2026-08-26T12:00:00+00:00");
    }

    #[test]
    fn unresolvable_metadata_keeps_last_known_values() {
        let fs = MemFs::new();
        fs.insert("reports/size/sandbox/report.txt", &report_with_head_and_master('a', 'b'));
        let ctx = context(fs, StubGit { subject: None });

        rebuild(&ctx, Path::new("reports/size"), None).unwrap();

        let index = ctx
            .fs
            .read_to_string(Path::new("reports/size/sandbox/index.json"))
            .unwrap();
        let index: serde_json::Value = serde_json::from_str(&index).unwrap();
        assert_eq!(index["commits"][0]["subject"], "Baseline");
        assert_eq!(index["commits"][1]["git_message"], "Current");
    }

    #[test]
    fn untouched_folders_keep_their_generated_at() {
        let fs = MemFs::new();
        fs.insert("reports/size/a/report.txt", &report_with_head_and_master('a', 'b'));
        fs.insert("reports/size/b/report.txt", &report_with_head_and_master('c', 'd'));
        fs.insert(
            "reports/size/b/index.json",
            "{\"generated_at\": \"2026-01-01T00:00:00+00:00\", \"commits\": []}",
        );
        let ctx = context(fs, StubGit { subject: Some("Resolved".into()) });

        rebuild(&ctx, Path::new("reports/size"), Some(Path::new("reports/size/a"))).unwrap();

        let index_a = ctx.fs.read_to_string(Path::new("reports/size/a/index.json")).unwrap();
        let index_a: serde_json::Value = serde_json::from_str(&index_a).unwrap();
        assert_eq!(index_a["generated_at"], "2026-08-26T12:00:00+00:00");

        let index_b = ctx.fs.read_to_string(Path::new("reports/size/b/index.json")).unwrap();
        let index_b: serde_json::Value = serde_json::from_str(&index_b).unwrap();
        assert_eq!(index_b["generated_at"], "2026-01-01T00:00:00+00:00");
    }

    #[test]
    fn base_falls_back_to_oldest_history_without_master() {
        let entries = vec![
            Entry {
                kind: EntryKind::Head,
                sha: sha('a'),
                message: "Current".into(),
                subject: None,
                branch: None,
                date_iso: None,
                artifacts: vec![Artifact { file_name: "app.wasm".into(), size_bytes: 300 }],
            },
            Entry {
                kind: EntryKind::History,
                sha: sha('b'),
                message: "Newer history".into(),
                subject: None,
                branch: None,
                date_iso: None,
                artifacts: vec![Artifact { file_name: "app.wasm".into(), size_bytes: 200 }],
            },
            Entry {
                kind: EntryKind::History,
                sha: sha('c'),
                message: "Oldest history".into(),
                subject: None,
                branch: None,
                date_iso: None,
                artifacts: vec![Artifact { file_name: "app.wasm".into(), size_bytes: 100 }],
            },
        ];
        let index = FolderIndex {
            generated_at: String::new(),
            folder: "sandbox".into(),
            report_path: "sandbox/report.txt".into(),
            commits: Vec::new(),
        };

        let row = summarize_folder(&entries, "sandbox".into(), &index);
        assert_eq!(row.artifacts[0].master_size, 100);
        assert_eq!(row.artifacts[0].head_size, 300);
    }

    #[test]
    fn corrupt_report_aborts_the_rebuild() {
        let fs = MemFs::new();
        fs.insert("reports/size/sandbox/report.txt", "bogus,header\nrow,1\n");
        let ctx = context(fs, StubGit { subject: None });

        let err = rebuild(&ctx, Path::new("reports/size"), None).unwrap_err();
        assert!(err.to_string().contains("corrupt report"));
    }

    #[test]
    fn corrupt_sibling_report_leaves_valid_folders_unwritten() {
        let fs = MemFs::new();
        fs.insert("reports/size/a/report.txt", &report_with_head_and_master('a', 'b'));
        fs.insert("reports/size/z/report.txt", "bogus,header\nrow,1\n");
        let ctx = context(fs, StubGit { subject: Some("Resolved".into()) });

        let err = rebuild(&ctx, Path::new("reports/size"), None).unwrap_err();
        assert!(err.to_string().contains("corrupt report"));
        // The valid folder parsed first must not have been rewritten.
        assert!(!ctx.fs.exists(Path::new("reports/size/a/index.json")));
        assert!(!ctx.fs.exists(Path::new("reports/size/index.json")));
    }

    #[test]
    fn non_ascii_sha_fields_produce_labels_without_panicking() {
        let fs = MemFs::new();
        fs.insert(
            "reports/size/sandbox/report.txt",
            "git_sha,git_message,file_name,size_bytes\n\
             ééééé,Hand edited,HEAD,\n\
             ,,sandbox.wasm,100\n",
        );
        let ctx = context(fs, StubGit { subject: None });

        let manifest = rebuild(&ctx, Path::new("reports/size"), None).unwrap();
        assert_eq!(manifest.folders[0].head.git_sha, "ééééé");

        let index = ctx
            .fs
            .read_to_string(Path::new("reports/size/sandbox/index.json"))
            .unwrap();
        let index: serde_json::Value = serde_json::from_str(&index).unwrap();
        let label = index["commits"][0]["label"].as_str().unwrap();
        assert!(label.contains("ééééé"));
    }

    #[test]
    fn short_sha_truncates_on_char_boundaries() {
        assert_eq!(short_sha(&sha('a')), "aaaaaaa");
        assert_eq!(short_sha("abc"), "abc");
        assert_eq!(short_sha("éééééééé"), "ééééééé");
    }
}
