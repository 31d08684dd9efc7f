//! Workspace reset.
//!
//! Removes build-generated state so a new profile applies to a clean
//! tree: the scratch directory, both feed directories, the generated feed
//! address list and the generated configuration file. Removal is
//! best-effort with respect to existence; a path that is already gone is
//! not an error, so repeated resets are idempotent.

use std::io;
use std::path::{Path, PathBuf};

use crate::paths;

/// Errors from resetting the tree.
#[derive(Debug, thiserror::Error)]
pub enum ResetError {
    #[error("failed to remove {path}: {source}")]
    Remove { path: PathBuf, source: io::Error },
}

/// Remove all generated state from the tree.
pub fn reset_tree(root: &Path) -> Result<(), ResetError> {
    remove_dir(&paths::tmp_dir(root))?;
    remove_dir(&paths::feeds_packages_dir(root))?;
    remove_dir(&paths::feeds_dir(root))?;
    remove_file(&paths::feeds_conf(root))?;
    remove_file(&paths::dot_config(root))?;
    Ok(())
}

/// Clear only the scratch directory; run immediately before the build
/// tool's normalization step.
pub fn clear_tmp(root: &Path) -> Result<(), ResetError> {
    remove_dir(&paths::tmp_dir(root))
}

fn remove_dir(path: &Path) -> Result<(), ResetError> {
    match std::fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(ResetError::Remove {
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn remove_file(path: &Path) -> Result<(), ResetError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(ResetError::Remove {
            path: path.to_path_buf(),
            source,
        }),
    }
}
