//! Live commit metadata adapter using `git` CLI commands.

use std::process::Command;

use crate::ports::git::{CommitIdentity, CommitMetadataProvider, RefMetadata};

/// Live adapter that shells out to the `git` CLI in the current directory.
pub struct LiveGit;

fn run_git(args: &[&str]) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
    let output = Command::new("git").args(args).output()?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let stderr = stderr.trim();
        if stderr.is_empty() {
            return Err(format!("git {} failed", args.join(" ")).into());
        }
        return Err(format!("git {}: {stderr}", args.join(" ")).into());
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

impl CommitMetadataProvider for LiveGit {
    fn current_head(&self) -> Result<CommitIdentity, Box<dyn std::error::Error + Send + Sync>> {
        let sha = run_git(&["rev-parse", "HEAD"])?;
        let subject = run_git(&["show", "-s", "--format=%s", "HEAD"])?;
        let date_iso = run_git(&["show", "-s", "--format=%cI", "HEAD"])?;
        let branch = run_git(&["rev-parse", "--abbrev-ref", "HEAD"])?;
        // `rev-parse --abbrev-ref` reports the literal string HEAD when detached.
        let branch = if branch.is_empty() || branch.eq_ignore_ascii_case("HEAD") {
            None
        } else {
            Some(branch)
        };
        Ok(CommitIdentity { sha, subject, date_iso, branch })
    }

    fn metadata_for(
        &self,
        reference: &str,
    ) -> Result<RefMetadata, Box<dyn std::error::Error + Send + Sync>> {
        let sha = run_git(&["rev-parse", reference])?;
        let subject = run_git(&["show", "-s", "--format=%s", reference])?;
        let date_iso = run_git(&["show", "-s", "--format=%cI", reference])?;
        Ok(RefMetadata { sha, subject, date_iso })
    }

    fn is_clean_outside(
        &self,
        path_prefix: &str,
    ) -> Result<bool, Box<dyn std::error::Error + Send + Sync>> {
        let status = run_git(&["status", "--porcelain"])?;
        let prefix = path_prefix.trim_end_matches('/');
        for line in status.lines() {
            if line.len() < 4 {
                continue;
            }
            // Porcelain rows are `XY <path>` with renames as `old -> new`.
            let path = &line[3..];
            let path = path.rsplit(" -> ").next().unwrap_or(path);
            let path = path.trim_matches('"');
            if !(path == prefix || path.starts_with(&format!("{prefix}/"))) {
                return Ok(false);
            }
        }
        Ok(true)
    }
}
