//! End-to-end run orchestration.
//!
//! One linear pass over the tree: reset stale state, merge the named
//! profiles, apply the feed configuration, render and write the
//! configuration file, then invoke the build tool's normalization step.
//! Each stage either completes or aborts the run; no stage retries and no
//! partial application is rolled back.

use std::io;
use std::path::Path;

use crate::feeds::{self, CommandRunner, FeedError};
use crate::merge::{self, MergeError};
use crate::paths;
use crate::profile::ProfileStore;
use crate::render::{self, RenderError};
use crate::reset::{self, ResetError};

/// The build-normalization command, run in the tree root after the
/// configuration file is written.
pub const DEFCONFIG: &[&str] = &["make", "defconfig"];

/// Errors from a full pipeline run.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Merge(#[from] MergeError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Feeds(#[from] FeedError),

    #[error(transparent)]
    Reset(#[from] ResetError),

    #[error("failed to write {path}: {source}")]
    WriteConfig {
        path: std::path::PathBuf,
        source: io::Error,
    },

    #[error("failed to run 'make defconfig': {0}")]
    SpawnDefconfig(io::Error),

    #[error("Error running make defconfig")]
    DefconfigFailed,
}

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Compose and apply the named profiles to the tree.
pub fn run(
    root: &Path,
    store: &ProfileStore,
    names: &[String],
    runner: &mut dyn CommandRunner,
) -> PipelineResult<()> {
    reset::reset_tree(root)?;

    let profile = merge::merge_all(store, names)?;

    for line in &profile.description {
        println!("{line}");
    }

    feeds::apply_feeds(root, &profile, runner)?;

    let rendered = render::render(&profile)?;
    for package in &profile.packages {
        println!("Add package to .config: {package}");
    }

    let config_path = paths::dot_config(root);
    std::fs::write(&config_path, rendered).map_err(|source| PipelineError::WriteConfig {
        path: config_path,
        source,
    })?;
    println!("Configuration written to .config");

    reset::clear_tmp(root)?;

    println!("Running make defconfig");
    let defconfig: Vec<String> = DEFCONFIG.iter().map(|s| s.to_string()).collect();
    match runner.run(&defconfig) {
        Ok(true) => Ok(()),
        Ok(false) => Err(PipelineError::DefconfigFailed),
        Err(e) => Err(PipelineError::SpawnDefconfig(e)),
    }
}
