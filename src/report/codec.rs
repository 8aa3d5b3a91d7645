//! Versioned codec for the persisted tabular report.
//!
//! Three schema generations are accepted on read; the newest is always
//! written:
//!
//! - **V1 flat**: header `git_ref,file_name,size_bytes,git_sha,git_message`,
//!   one `HEAD`/`MASTER` ref tag per artifact row. Migrated on read by
//!   grouping rows per ref, defaulting a sentinel master into existence.
//! - **V2 positional**: header `git_sha,git_message,file_name,size_bytes`,
//!   section-header rows (blank size) followed by artifact rows, with entry
//!   kinds inferred by position (first section is master, then head, then
//!   branch, rest history).
//! - **V3 labeled** (current): same header as V2, but each section-header
//!   row carries an explicit kind label in the `file_name` column, packed as
//!   `LABEL[:branch[:date_iso]]`.

use std::path::Path;

use crate::error::{Error, Result};
use crate::ports::FileSystem;
use crate::report::{is_commit_sha, Artifact, Entry, EntryKind, PLACEHOLDER};

/// Column layout of the current (and V2) schema.
const HEADER: [&str; 4] = ["git_sha", "git_message", "file_name", "size_bytes"];

/// Column layout of the legacy flat schema.
const LEGACY_HEADER: [&str; 5] = ["git_ref", "file_name", "size_bytes", "git_sha", "git_message"];

/// Recognized report schema generations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schema {
    /// Legacy flat rows with a per-row ref tag.
    V1Flat,
    /// Sectioned rows with positionally inferred kinds.
    V2Positional,
    /// Sectioned rows with explicit kind labels.
    V3Labeled,
}

/// Determines which schema generation a parsed report uses.
///
/// The header distinguishes V1 from the sectioned generations; V2 and V3
/// share a header and are told apart by whether any section row carries an
/// explicit label token.
///
/// # Errors
///
/// Returns a reason string when the header matches no known generation.
pub fn detect_schema(
    header: &[String],
    records: &[Vec<String>],
) -> std::result::Result<Schema, String> {
    if *header == LEGACY_HEADER {
        return Ok(Schema::V1Flat);
    }
    if *header == HEADER {
        let labeled = records.iter().any(|fields| {
            fields.get(3).map_or(true, |size| size.trim().is_empty())
                && fields
                    .get(2)
                    .is_some_and(|label| EntryKind::from_label(label_token(label)).is_some())
        });
        return Ok(if labeled { Schema::V3Labeled } else { Schema::V2Positional });
    }
    Err(format!("unexpected header [{}]", header.join(", ")))
}

/// Parses a persisted report into the in-memory entry model.
///
/// # Errors
///
/// Returns a reason string when the header is unrecognized or a row is
/// structurally invalid.
pub fn parse_report(content: &str) -> std::result::Result<Vec<Entry>, String> {
    let mut lines = content.lines().filter(|line| !line.trim().is_empty());
    let Some(header_line) = lines.next() else {
        return Ok(Vec::new());
    };
    let header = split_fields(header_line);
    let records: Vec<Vec<String>> = lines.map(split_fields).collect();

    match detect_schema(&header, &records)? {
        Schema::V1Flat => parse_flat(&records),
        Schema::V2Positional | Schema::V3Labeled => parse_sectioned(&records),
    }
}

/// Renders entries in the current schema.
///
/// Entries with a sentinel sha and no artifacts are dropped; artifacts are
/// written sorted by file name. Entry order is the caller's.
#[must_use]
pub fn render_report(entries: &[Entry]) -> String {
    let mut out = String::new();
    out.push_str(&HEADER.join(","));
    out.push('\n');
    for entry in entries {
        if entry.sha == PLACEHOLDER && entry.artifacts.is_empty() {
            continue;
        }
        let sha = canonical_sha(&entry.sha);
        out.push_str(&render_row(&[&sha, &entry.message, &pack_label(entry), ""]));
        out.push('\n');
        let mut artifacts = entry.artifacts.clone();
        artifacts.sort_by(|a, b| a.file_name.cmp(&b.file_name));
        for artifact in &artifacts {
            out.push_str(&render_row(&[
                "",
                "",
                &artifact.file_name,
                &artifact.size_bytes.to_string(),
            ]));
            out.push('\n');
        }
    }
    out
}

/// Reads and parses the report at `path`, returning an empty list when the
/// file does not exist.
///
/// # Errors
///
/// Returns [`Error::CorruptReport`] for schema or row violations and an I/O
/// error when the file cannot be read.
pub fn read_report(fs: &dyn FileSystem, path: &Path) -> Result<Vec<Entry>> {
    if !fs.exists(path) {
        return Ok(Vec::new());
    }
    let content = fs
        .read_to_string(path)
        .map_err(|e| Error::Io(std::io::Error::other(e.to_string())))?;
    parse_report(&content)
        .map_err(|reason| Error::CorruptReport { path: path.to_path_buf(), reason })
}

/// Serializes `entries` to `path` in the current schema, overwriting any
/// existing file.
///
/// # Errors
///
/// Returns an I/O error when the file cannot be written.
pub fn write_report(fs: &dyn FileSystem, path: &Path, entries: &[Entry]) -> Result<()> {
    fs.write(path, &render_report(entries))
        .map_err(|e| Error::Io(std::io::Error::other(e.to_string())))
}

/// Fold state for positional kind inference over unlabeled section rows.
#[derive(Default)]
struct KindAssignment {
    master: bool,
    head: bool,
    branch: bool,
}

impl KindAssignment {
    fn next_positional(&mut self) -> EntryKind {
        if !self.master {
            self.master = true;
            return EntryKind::Master;
        }
        if !self.head {
            self.head = true;
            return EntryKind::Head;
        }
        if !self.branch {
            self.branch = true;
            return EntryKind::Branch;
        }
        EntryKind::History
    }

    fn mark_explicit(&mut self, kind: EntryKind) {
        match kind {
            EntryKind::Master => self.master = true,
            EntryKind::Head => self.head = true,
            EntryKind::Branch => self.branch = true,
            EntryKind::History => {}
        }
    }
}

fn parse_sectioned(records: &[Vec<String>]) -> std::result::Result<Vec<Entry>, String> {
    let mut entries: Vec<Entry> = Vec::new();
    let mut assignment = KindAssignment::default();

    for fields in records {
        let sha_field = field(fields, 0);
        let message_field = field(fields, 1);
        let name_field = field(fields, 2);
        let size_field = field(fields, 3);

        if size_field.is_empty() {
            // Section header row.
            if sha_field.is_empty() {
                return Err("section row missing git_sha identifier".to_string());
            }
            let (kind, branch, date_iso) = if name_field.is_empty() {
                (assignment.next_positional(), None, None)
            } else {
                let (token, branch, date_iso) = unpack_label(&name_field);
                let Some(kind) = EntryKind::from_label(token) else {
                    return Err(format!("unrecognized section label '{token}'"));
                };
                assignment.mark_explicit(kind);
                (kind, branch, date_iso)
            };
            entries.push(Entry {
                kind,
                sha: canonical_sha(&sha_field),
                message: or_placeholder(message_field),
                subject: None,
                branch,
                date_iso,
                artifacts: Vec::new(),
            });
            continue;
        }

        // Artifact row.
        let Some(current) = entries.last_mut() else {
            return Err("artifact row encountered before any section row".to_string());
        };
        if name_field.is_empty() {
            return Err("artifact row missing file_name".to_string());
        }
        let size_bytes: u64 = size_field
            .parse()
            .map_err(|_| format!("invalid size_bytes '{size_field}'"))?;
        current.push_artifact(Artifact { file_name: name_field, size_bytes });
    }

    for entry in &mut entries {
        entry.sort_artifacts();
    }
    Ok(entries)
}

fn parse_flat(records: &[Vec<String>]) -> std::result::Result<Vec<Entry>, String> {
    // Group rows by their ref tag, preserving first-seen order.
    let mut groups: Vec<(String, Entry)> = Vec::new();
    for fields in records {
        let ref_tag = field(fields, 0);
        let name_field = field(fields, 1);
        let size_field = field(fields, 2);
        let sha_field = field(fields, 3);
        let message_field = field(fields, 4);

        if ref_tag.is_empty() {
            return Err("legacy row missing git_ref tag".to_string());
        }
        let kind = match ref_tag.as_str() {
            "MASTER" => EntryKind::Master,
            "HEAD" => EntryKind::Head,
            _ => EntryKind::History,
        };
        let index = match groups.iter().position(|(tag, _)| *tag == ref_tag) {
            Some(index) => index,
            None => {
                groups.push((ref_tag.clone(), Entry::placeholder(kind)));
                groups.len() - 1
            }
        };
        let entry = &mut groups[index].1;
        if !sha_field.is_empty() {
            entry.sha = canonical_sha(&sha_field);
        }
        if !message_field.is_empty() {
            entry.message = message_field;
        }
        if name_field.is_empty() {
            continue;
        }
        // The legacy generation tolerated unparsable sizes, recording zero.
        let size_bytes = size_field.parse().unwrap_or(0);
        entry.push_artifact(Artifact { file_name: name_field, size_bytes });
    }

    if !groups.iter().any(|(tag, _)| tag == "MASTER") {
        groups.push(("MASTER".to_string(), Entry::placeholder(EntryKind::Master)));
    }

    // Emit master first, head second, remaining groups in first-seen order.
    let mut entries = Vec::with_capacity(groups.len());
    let mut rest = Vec::new();
    let mut head = None;
    let mut master = None;
    for (tag, mut entry) in groups {
        entry.sort_artifacts();
        match tag.as_str() {
            "MASTER" => master = Some(entry),
            "HEAD" => head = Some(entry),
            _ => rest.push(entry),
        }
    }
    entries.extend(master);
    entries.extend(head);
    entries.extend(rest);
    Ok(entries)
}

fn field(fields: &[String], index: usize) -> String {
    fields.get(index).map(|s| s.trim().to_string()).unwrap_or_default()
}

fn or_placeholder(value: String) -> String {
    if value.is_empty() {
        PLACEHOLDER.to_string()
    } else {
        value
    }
}

fn canonical_sha(value: &str) -> String {
    if value.is_empty() {
        return PLACEHOLDER.to_string();
    }
    if is_commit_sha(value) {
        return value.to_ascii_lowercase();
    }
    value.to_string()
}

/// Packs the kind label plus optional branch and date into the section
/// header's filename column, as `LABEL[:branch[:date_iso]]`.
///
/// Git forbids `:` in branch names, so the first two segments split
/// unambiguously even though the date itself contains colons.
fn pack_label(entry: &Entry) -> String {
    let label = entry.kind.label();
    match (&entry.branch, &entry.date_iso) {
        (None, None) => label.to_string(),
        (Some(branch), None) => format!("{label}:{branch}"),
        (None, Some(date)) => format!("{label}::{date}"),
        (Some(branch), Some(date)) => format!("{label}:{branch}:{date}"),
    }
}

fn label_token(packed: &str) -> &str {
    packed.split(':').next().unwrap_or(packed)
}

fn unpack_label(packed: &str) -> (&str, Option<String>, Option<String>) {
    let mut parts = packed.splitn(3, ':');
    let token = parts.next().unwrap_or(packed);
    let branch = parts.next().filter(|s| !s.is_empty()).map(String::from);
    let date_iso = parts.next().filter(|s| !s.is_empty()).map(String::from);
    (token, branch, date_iso)
}

/// Splits one comma-separated row, honoring double-quoted fields with `""`
/// escapes.
fn split_fields(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    current.push('"');
                } else {
                    in_quotes = false;
                }
            }
            '"' => in_quotes = true,
            ',' if !in_quotes => {
                fields.push(std::mem::take(&mut current));
            }
            _ => current.push(c),
        }
    }
    fields.push(current);
    fields
}

fn render_row(fields: &[&str]) -> String {
    fields.iter().map(|f| render_field(f)).collect::<Vec<_>>().join(",")
}

fn render_field(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
