//! Commit metadata port for version-control queries.

/// Identity of the currently checked-out commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitIdentity {
    /// Full 40-character commit hash.
    pub sha: String,
    /// Commit subject line.
    pub subject: String,
    /// ISO-8601 commit timestamp.
    pub date_iso: String,
    /// Active branch name, or `None` when the checkout is detached.
    pub branch: Option<String>,
}

/// Metadata resolved for an arbitrary commit reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefMetadata {
    /// Full 40-character commit hash.
    pub sha: String,
    /// Commit subject line.
    pub subject: String,
    /// ISO-8601 commit timestamp.
    pub date_iso: String,
}

/// Provides read access to commit metadata from the version-control system.
///
/// The ledger updater needs the identity of HEAD to tag a snapshot; the
/// manifest builder re-resolves subjects and timestamps for historical
/// entries on a best-effort basis.
pub trait CommitMetadataProvider: Send + Sync {
    /// Returns the identity of the current HEAD commit.
    ///
    /// # Errors
    ///
    /// Returns an error if the repository has no commits or is invalid.
    fn current_head(&self) -> Result<CommitIdentity, Box<dyn std::error::Error + Send + Sync>>;

    /// Resolves metadata for an arbitrary commit reference.
    ///
    /// # Errors
    ///
    /// Returns an error if the reference cannot be resolved.
    fn metadata_for(
        &self,
        reference: &str,
    ) -> Result<RefMetadata, Box<dyn std::error::Error + Send + Sync>>;

    /// Returns `true` when the working tree has no changes outside the
    /// given path prefix.
    ///
    /// The ledger updater uses this to decide whether the measured snapshot
    /// can also stand in for the branch tip: report files under the prefix
    /// are expected to change during an update and are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the working-tree status cannot be queried.
    fn is_clean_outside(
        &self,
        path_prefix: &str,
    ) -> Result<bool, Box<dyn std::error::Error + Send + Sync>>;
}
