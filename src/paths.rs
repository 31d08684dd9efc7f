//! Well-known locations inside a build tree.
//!
//! Every component takes the tree root explicitly; nothing in this crate
//! depends on the process working directory. The layout mirrors what the
//! feed script and the build tool expect to find.

use std::path::{Path, PathBuf};

/// Scratch directory cleared between runs.
pub fn tmp_dir(root: &Path) -> PathBuf {
    root.join("tmp")
}

/// Working directory where feeds are checked out.
pub fn feeds_dir(root: &Path) -> PathBuf {
    root.join("feeds")
}

/// Feed symlink farm under the package tree.
pub fn feeds_packages_dir(root: &Path) -> PathBuf {
    root.join("packages/feeds")
}

/// Feed address list generated by the feed script's `setup` subcommand.
pub fn feeds_conf(root: &Path) -> PathBuf {
    root.join("feeds.conf")
}

/// Static baseline feed list shipped with the tree.
pub fn default_feeds_conf(root: &Path) -> PathBuf {
    root.join("feeds.conf.default")
}

/// The generated build configuration file.
pub fn dot_config(root: &Path) -> PathBuf {
    root.join(".config")
}

/// Checkout directory of a single named feed.
pub fn feed_checkout(root: &Path, feed: &str) -> PathBuf {
    feeds_dir(root).join(feed)
}
