//! `validate` command: structural check of a folder index file.

use std::path::Path;

use crate::context::ServiceContext;
use crate::error::{Error, Result};
use crate::validate::validate_index;

/// Validates a folder index file, printing one line per finding.
///
/// # Errors
///
/// Fails with [`Error::InvalidInput`] when the file has findings and an
/// I/O error when it exists but cannot be read.
pub fn run(ctx: &ServiceContext, path: &Path) -> Result<()> {
    let findings = validate_index(ctx.fs.as_ref(), path)?;
    if findings.is_empty() {
        println!("{} is valid", path.display());
        return Ok(());
    }
    for finding in &findings {
        eprintln!("{finding}");
    }
    Err(Error::InvalidInput(format!(
        "{} failed validation with {} finding(s)",
        path.display(),
        findings.len()
    )))
}
