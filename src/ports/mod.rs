//! Port traits defining external boundaries.
//!
//! Each trait represents a boundary between the application core and an
//! external system (time, filesystem, version control). Implementations
//! live in `src/adapters/`.

pub mod clock;
pub mod filesystem;
pub mod git;

pub use clock::Clock;
pub use filesystem::FileSystem;
pub use git::{CommitIdentity, CommitMetadataProvider, RefMetadata};
