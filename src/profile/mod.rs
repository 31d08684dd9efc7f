//! Profile document store.
//!
//! A profile is a named TOML document describing a partial build
//! configuration: target identifiers, package lists, descriptive text,
//! feed definitions and raw configuration overrides. Documents live in a
//! single directory, one `<name>.toml` per profile, and are read-only as
//! far as this tool is concerned.

use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Environment variable overriding the profile directory.
pub const PROFILES_ENV: &str = "PROFILES";

/// File extension of profile documents.
const PROFILE_EXT: &str = "toml";

/// A single profile document. Every field is optional; a document only
/// describes the slice of configuration it cares about.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileDocument {
    /// Build target identifier (e.g. `ath79`).
    pub target: Option<String>,

    /// Subtarget within the target (e.g. `generic`).
    pub subtarget: Option<String>,

    /// Whether the target lives in an external feed and must be
    /// feed-installed before configuration.
    pub external_target: Option<bool>,

    /// One line of human-readable text describing this document.
    pub description: Option<String>,

    /// Package names to enable, in order.
    #[serde(default)]
    pub packages: Vec<String>,

    /// Device profile identifiers to enable, in order.
    #[serde(default)]
    pub profiles: Vec<String>,

    /// Raw configuration lines appended verbatim to the generated file.
    pub diffconfig: Option<String>,

    /// Feed definitions contributed by this document.
    #[serde(default)]
    pub feeds: Vec<FeedDefinition>,
}

/// An external package feed, addressed either by a pinned revision or by
/// a tracked branch.
///
/// `name` and `uri` are required but deliberately default to empty here so
/// the merger can reject bad entries with a specific message instead of a
/// generic deserialization error.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FeedDefinition {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub uri: String,

    /// Install method understood by the feed script (default `src-git`).
    pub method: Option<String>,

    /// Pin to a fixed commit-like reference.
    #[serde(alias = "hash")]
    pub revision: Option<String>,

    /// Track a named branch instead of a pin.
    pub branch: Option<String>,
}

impl FeedDefinition {
    /// True when both addressing modes are set at once, which is invalid.
    pub fn has_conflicting_address(&self) -> bool {
        self.revision.is_some() && self.branch.is_some()
    }
}

/// Errors from loading or listing profile documents.
#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    #[error("Profile {0} not found")]
    NotFound(String),

    #[error("profile '{name}': {source}")]
    Parse {
        name: String,
        source: toml::de::Error,
    },

    #[error("failed to read profile directory {dir}: {source}")]
    List { dir: PathBuf, source: io::Error },

    #[error("failed to read profile '{name}': {source}")]
    Io { name: String, source: io::Error },
}

/// Directory of profile documents.
#[derive(Debug, Clone)]
pub struct ProfileStore {
    dir: PathBuf,
}

impl ProfileStore {
    /// Create a store over an explicit directory.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Resolve the store directory: an explicit override wins, then the
    /// `PROFILES` environment variable, then `<root>/profiles`.
    pub fn resolve(override_dir: Option<PathBuf>, root: &Path) -> Self {
        let dir = override_dir
            .or_else(|| std::env::var_os(PROFILES_ENV).map(PathBuf::from))
            .unwrap_or_else(|| root.join("profiles"));
        Self { dir }
    }

    /// The directory this store reads from.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path a document of the given name would have.
    pub fn document_path(&self, name: &str) -> PathBuf {
        self.dir.join(name).with_extension(PROFILE_EXT)
    }

    /// Load one document by name. A missing document is a hard error; the
    /// run never partially applies.
    pub fn load(&self, name: &str) -> Result<ProfileDocument, ProfileError> {
        let path = self.document_path(name);
        if !path.is_file() {
            return Err(ProfileError::NotFound(name.to_string()));
        }

        let contents = std::fs::read_to_string(&path).map_err(|source| ProfileError::Io {
            name: name.to_string(),
            source,
        })?;

        toml::from_str(&contents).map_err(|source| ProfileError::Parse {
            name: name.to_string(),
            source,
        })
    }

    /// Names of all documents in the store, sorted.
    pub fn list(&self) -> Result<Vec<String>, ProfileError> {
        let entries = std::fs::read_dir(&self.dir).map_err(|source| ProfileError::List {
            dir: self.dir.clone(),
            source,
        })?;

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| ProfileError::List {
                dir: self.dir.clone(),
                source,
            })?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(PROFILE_EXT) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }
}
