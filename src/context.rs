//! Service context bundling all port trait objects.

use crate::ports::clock::Clock;
use crate::ports::filesystem::FileSystem;
use crate::ports::git::CommitMetadataProvider;

/// Bundles all port trait objects into a single context.
///
/// Each field provides access to one external boundary. The `live`
/// constructor wires up the real adapters; tests substitute in-memory and
/// stub implementations.
pub struct ServiceContext {
    /// Clock for obtaining the current time.
    pub clock: Box<dyn Clock>,
    /// Filesystem for report and index I/O.
    pub fs: Box<dyn FileSystem>,
    /// Commit metadata provider for version-control queries.
    pub git: Box<dyn CommitMetadataProvider>,
}

impl ServiceContext {
    /// Creates a live context with real adapters for clock, filesystem,
    /// and git.
    #[must_use]
    pub fn live() -> Self {
        use crate::adapters::live::clock::LiveClock;
        use crate::adapters::live::filesystem::LiveFileSystem;
        use crate::adapters::live::git::LiveGit;

        Self { clock: Box::new(LiveClock), fs: Box::new(LiveFileSystem), git: Box::new(LiveGit) }
    }
}
