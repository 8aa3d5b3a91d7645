//! Structural validation for folder index files.
//!
//! Dashboards consume the folder `index.json` files directly, and hand
//! edits or interrupted rebuilds can leave them malformed. The checker
//! collects every finding instead of stopping at the first, so one run
//! reports the full damage.

use std::path::Path;

use serde_json::Value;

use crate::error::{Error, Result};
use crate::ports::FileSystem;

/// Checks a folder index file, returning one finding per structural
/// problem. An empty list means the file is valid.
///
/// # Errors
///
/// Returns an I/O error only when the file exists but cannot be read; a
/// missing file or malformed JSON is reported as a finding.
pub fn validate_index(fs: &dyn FileSystem, path: &Path) -> Result<Vec<String>> {
    if !fs.exists(path) {
        return Ok(vec![format!("{} does not exist", path.display())]);
    }
    let content = fs
        .read_to_string(path)
        .map_err(|e| Error::Io(std::io::Error::other(e.to_string())))?;
    let value: Value = match serde_json::from_str(&content) {
        Ok(value) => value,
        Err(e) => return Ok(vec![format!("{} is not valid JSON: {e}", path.display())]),
    };
    Ok(check_index(&value))
}

/// Structural checks over a parsed folder index document.
fn check_index(value: &Value) -> Vec<String> {
    let Some(document) = value.as_object() else {
        return vec!["top level must be a JSON object".to_string()];
    };

    let mut findings = Vec::new();
    if !document.contains_key("generated_at") {
        findings.push("generated_at is required at the top level".to_string());
    }
    if !document.contains_key("folder") {
        findings.push("folder is required at the top level".to_string());
    }
    match document.get("commits").and_then(Value::as_array) {
        Some(commits) => {
            for (index, commit) in commits.iter().enumerate() {
                check_commit(commit, index, &mut findings);
            }
        }
        None => findings.push("commits must be an array at the top level".to_string()),
    }
    findings
}

fn check_commit(commit: &Value, index: usize, findings: &mut Vec<String>) {
    let prefix = format!("commits[{index}]");
    let Some(commit) = commit.as_object() else {
        findings.push(format!("{prefix} must be an object"));
        return;
    };

    for field in ["id", "git_sha", "date", "artifacts"] {
        if !commit.contains_key(field) {
            findings.push(format!("{prefix}.{field} is required"));
        }
    }
    for field in ["id", "git_sha", "date"] {
        if let Some(value) = commit.get(field) {
            if !value.is_string() {
                findings.push(format!("{prefix}.{field} must be a string"));
            }
        }
    }
    if let Some(artifacts) = commit.get("artifacts") {
        check_artifacts(artifacts, &prefix, findings);
    }
}

fn check_artifacts(artifacts: &Value, prefix: &str, findings: &mut Vec<String>) {
    let Some(artifacts) = artifacts.as_array() else {
        findings.push(format!("{prefix}.artifacts must be an array"));
        return;
    };
    for (index, artifact) in artifacts.iter().enumerate() {
        let path = format!("{prefix}.artifacts[{index}]");
        let Some(artifact) = artifact.as_object() else {
            findings.push(format!("{path} must be an object"));
            continue;
        };
        let named = artifact
            .get("file_name")
            .and_then(Value::as_str)
            .is_some_and(|name| !name.is_empty());
        if !named {
            findings.push(format!("{path}.file_name must be a non-empty string"));
        }
        if artifact.get("size_bytes").and_then(Value::as_u64).is_none() {
            findings.push(format!("{path}.size_bytes must be a non-negative integer"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn well_formed_index_has_no_findings() {
        let value = json!({
            "generated_at": "2026-08-26T12:00:00+00:00",
            "folder": "sandbox",
            "commits": [{
                "id": "head:main:abc",
                "git_sha": "abc",
                "date": "2026-08-26T12:00:00+00:00",
                "artifacts": [{"file_name": "sandbox.wasm", "size_bytes": 4096}],
            }],
        });
        assert!(check_index(&value).is_empty());
    }

    #[test]
    fn missing_top_level_fields_are_each_reported() {
        let findings = check_index(&json!({}));
        assert!(findings.iter().any(|f| f.contains("generated_at")));
        assert!(findings.iter().any(|f| f.contains("folder")));
        assert!(findings.iter().any(|f| f.contains("commits")));
    }

    #[test]
    fn commit_entries_need_required_fields_and_types() {
        let value = json!({
            "generated_at": "now",
            "folder": "sandbox",
            "commits": [{"id": 7, "artifacts": []}],
        });
        let findings = check_index(&value);
        assert!(findings.iter().any(|f| f == "commits[0].git_sha is required"));
        assert!(findings.iter().any(|f| f == "commits[0].date is required"));
        assert!(findings.iter().any(|f| f == "commits[0].id must be a string"));
    }

    #[test]
    fn artifact_shape_is_checked() {
        let value = json!({
            "generated_at": "now",
            "folder": "sandbox",
            "commits": [{
                "id": "x",
                "git_sha": "x",
                "date": "now",
                "artifacts": [
                    {"file_name": "", "size_bytes": 1},
                    {"file_name": "app.wasm", "size_bytes": -5},
                    "bogus",
                ],
            }],
        });
        let findings = check_index(&value);
        assert!(findings
            .iter()
            .any(|f| f == "commits[0].artifacts[0].file_name must be a non-empty string"));
        assert!(findings
            .iter()
            .any(|f| f == "commits[0].artifacts[1].size_bytes must be a non-negative integer"));
        assert!(findings.iter().any(|f| f == "commits[0].artifacts[2] must be an object"));
    }

    #[test]
    fn non_object_top_level_is_a_single_finding() {
        let findings = check_index(&json!([1, 2, 3]));
        assert_eq!(findings, vec!["top level must be a JSON object".to_string()]);
    }
}
