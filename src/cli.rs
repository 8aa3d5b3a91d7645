//! CLI argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Top-level CLI parser for `sizeledger`.
#[derive(Debug, Parser)]
#[command(name = "sizeledger", version, about = "Track build-artifact sizes across commits")]
pub struct Cli {
    /// The command to execute.
    #[command(subcommand)]
    pub command: Command,
}

/// Supported top-level subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Measure build artifacts, refresh the HEAD snapshot, and regenerate
    /// the size dashboards.
    Update {
        /// Folder containing the build artifacts to measure.
        #[arg(long)]
        input: PathBuf,

        /// Target folder relative to the reports root (e.g.
        /// sandbox/wasm/debug).
        #[arg(long)]
        output: String,

        /// Root directory of the size reports tree.
        #[arg(long, default_value = "reports/size")]
        root: PathBuf,

        /// Promote the measured snapshot to MASTER using the supplied git
        /// ref as the baseline identity.
        #[arg(long)]
        accept_master: Option<String>,
    },

    /// Check a folder index file for structural problems.
    Validate {
        /// Path to a folder-level index.json file.
        path: PathBuf,
    },
}
