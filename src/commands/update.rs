//! `update` command: measure artifacts, refresh the HEAD snapshot, and
//! regenerate the folder indexes and root manifest.

use std::path::{Component, Path, PathBuf};

use crate::context::ServiceContext;
use crate::error::{Error, Result};
use crate::manifest::{self, Manifest, ManifestFolder};
use crate::ports::git::CommitIdentity;
use crate::report::codec;
use crate::report::update::{merge_snapshot, MergeOptions};
use crate::report::{Artifact, INDEX_FILENAME, REPORT_FILENAME};

/// Files inside a tracked folder that never count as build artifacts.
const ARTIFACT_EXCLUDES: [&str; 3] = [REPORT_FILENAME, INDEX_FILENAME, "README.md"];

/// Runs the full update workflow and prints the operator summary.
///
/// # Errors
///
/// Fails on invalid input/output folders, corrupt reports, or a failed
/// HEAD metadata lookup. No report or index file is touched on failure.
pub fn run(
    ctx: &ServiceContext,
    input: &Path,
    output: &str,
    root: &Path,
    accept_master: Option<&str>,
) -> Result<()> {
    let head = update_snapshot(ctx, input, output, root, accept_master)?;
    let output_folder = root.join(output);
    let manifest = manifest::rebuild(ctx, root, Some(&output_folder))?;

    println!("Updated HEAD snapshot for {output}: {} ({})", head.sha, head.subject);
    print_artifact_summary(output, &manifest);
    Ok(())
}

/// Measures the input folder's artifacts and folds them into the report at
/// `root/output`, returning the identity the snapshot was tagged with.
///
/// # Errors
///
/// Fails with [`Error::InvalidInput`] for a missing/empty input folder,
/// [`Error::OutputPathInvalid`] when `output` escapes the reports root, and
/// [`Error::MetadataUnavailable`] when the HEAD lookup fails.
pub fn update_snapshot(
    ctx: &ServiceContext,
    input: &Path,
    output: &str,
    root: &Path,
    accept_master: Option<&str>,
) -> Result<CommitIdentity> {
    let output_folder = resolve_output_folder(root, output)?;

    if !ctx.fs.exists(input) || !ctx.fs.is_dir(input) {
        return Err(Error::InvalidInput(format!(
            "folder '{}' does not exist or is not a directory",
            input.display()
        )));
    }
    let measured = discover_artifacts(ctx, input)?;
    if measured.is_empty() {
        return Err(Error::InvalidInput(format!(
            "no artifacts found in '{}'; build outputs are required",
            input.display()
        )));
    }

    let head = ctx
        .git
        .current_head()
        .map_err(|e| Error::MetadataUnavailable(e.to_string()))?;
    let master_override = match accept_master {
        Some(reference) => Some(
            ctx.git
                .metadata_for(reference)
                .map_err(|e| Error::MetadataUnavailable(e.to_string()))?,
        ),
        None => None,
    };
    // The snapshot can stand in for the branch tip only when nothing but
    // the reports tree itself is dirty.
    let derive_branch = ctx
        .git
        .is_clean_outside(&root.to_string_lossy())
        .map_err(|e| Error::MetadataUnavailable(e.to_string()))?;

    let report_path = output_folder.join(REPORT_FILENAME);
    let existing = codec::read_report(ctx.fs.as_ref(), &report_path)?;

    let options =
        MergeOptions { master_override: master_override.as_ref(), derive_branch };
    let merged = merge_snapshot(existing, &measured, &head, &options);

    ctx.fs
        .create_dir_all(&output_folder)
        .map_err(|e| Error::Io(std::io::Error::other(e.to_string())))?;
    codec::write_report(ctx.fs.as_ref(), &report_path, &merged)?;
    Ok(head)
}

/// Validates that the requested output folder stays inside the reports
/// root.
fn resolve_output_folder(root: &Path, output: &str) -> Result<PathBuf> {
    let relative = Path::new(output);
    let escapes = relative.is_absolute()
        || relative
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_) | Component::RootDir));
    if output.is_empty() || escapes {
        return Err(Error::OutputPathInvalid(format!(
            "'{output}' must be a relative path inside '{}'",
            root.display()
        )));
    }
    Ok(root.join(relative))
}

/// Lists and measures every artifact file in the input folder, excluding
/// the report, index, and README files, sorted by name.
fn discover_artifacts(ctx: &ServiceContext, input: &Path) -> Result<Vec<Artifact>> {
    let names = ctx
        .fs
        .list_dir(input)
        .map_err(|e| Error::Io(std::io::Error::other(e.to_string())))?;
    let mut artifacts = Vec::new();
    for name in names {
        if ARTIFACT_EXCLUDES.contains(&name.as_str()) {
            continue;
        }
        let path = input.join(&name);
        if ctx.fs.is_dir(&path) {
            continue;
        }
        let size_bytes = ctx
            .fs
            .file_size(&path)
            .map_err(|e| Error::Io(std::io::Error::other(e.to_string())))?;
        artifacts.push(Artifact { file_name: name, size_bytes });
    }
    Ok(artifacts)
}

/// Prints the measured-artifact comparison for the folder that was just
/// updated.
fn print_artifact_summary(folder: &str, manifest: &Manifest) {
    let Some(row) = manifest.folders.iter().find(|f| f.folder == folder) else {
        println!("No manifest entry found for {folder}; artifact summary skipped.");
        return;
    };
    print_folder_row(row);
}

fn print_folder_row(row: &ManifestFolder) {
    println!("Artifacts measured ({}):", row.artifacts.len());
    let mut alert_total = 0;
    for delta in &row.artifacts {
        if delta.alert {
            alert_total += 1;
        }
        let thresholds = if delta.thresholds.is_empty() {
            "none".to_string()
        } else {
            delta.thresholds.join(", ")
        };
        println!(
            "  - {}: master={}B head={}B delta={}B ({}) thresholds={}",
            delta.file_name,
            delta.master_size,
            delta.head_size,
            delta.delta_bytes,
            format_percent(delta.delta_percent),
            thresholds
        );
    }
    println!("Alert thresholds triggered: {alert_total}");
}

fn format_percent(value: Option<f64>) -> String {
    match value {
        Some(percent) => format!("{percent:+.2}%"),
        None => "n/a".to_string(),
    }
}
