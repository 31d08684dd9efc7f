//! Profile merge logic.
//!
//! Folds an ordered list of profile documents into one accumulated
//! configuration. Each field kind has exactly one merge strategy:
//! - singletons (`target`, `subtarget`, `external_target`): set at most
//!   once across the chain, a second assignment is a hard error
//! - append-lists (`description`, `packages`, `profiles`): concatenated,
//!   order- and duplicate-preserving
//! - concatenated text (`diffconfig`): verbatim string append
//! - named map (`feeds`): insert/overwrite by feed name, last write wins
//!   wholesale, first-insertion iteration order preserved

use indexmap::IndexMap;

use crate::profile::{FeedDefinition, ProfileDocument, ProfileError, ProfileStore};

/// Errors detected while merging profile documents.
#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    #[error("Duplicate tag found {0}")]
    DuplicateTag(&'static str),

    #[error("Found bad feed '{0}'")]
    BadFeed(String),

    #[error("feed '{0}' sets both a revision and a branch")]
    ConflictingAddress(String),

    #[error("no {0} selected by any profile")]
    MissingTag(&'static str),

    #[error("no device profiles selected by any profile")]
    NoDeviceProfiles,

    #[error(transparent)]
    Profile(#[from] ProfileError),
}

/// The accumulated configuration produced by a merge chain. Exists only in
/// memory for the duration of one run; it is projected into the rendered
/// configuration file and the feed command sequence.
#[derive(Debug, Clone, Default)]
pub struct MergedProfile {
    pub target: Option<String>,
    pub subtarget: Option<String>,
    pub external_target: Option<bool>,
    pub description: Vec<String>,
    pub packages: Vec<String>,
    pub profiles: Vec<String>,
    pub diffconfig: String,
    pub feeds: IndexMap<String, FeedDefinition>,
}

impl MergedProfile {
    /// Fold one document into the accumulator.
    pub fn merge(&mut self, doc: ProfileDocument) -> Result<(), MergeError> {
        merge_singleton(&mut self.target, doc.target, "target")?;
        merge_singleton(&mut self.subtarget, doc.subtarget, "subtarget")?;
        merge_flag(&mut self.external_target, doc.external_target, "external_target")?;

        if let Some(line) = doc.description {
            self.description.push(line);
        }
        merge_append(&mut self.packages, doc.packages);
        merge_append(&mut self.profiles, doc.profiles);
        merge_text(&mut self.diffconfig, doc.diffconfig);
        merge_feeds(&mut self.feeds, doc.feeds)?;
        Ok(())
    }

    /// Enforce the invariants a complete configuration must satisfy before
    /// it can be rendered or applied: a target, a subtarget and at least
    /// one device profile.
    pub fn validate(&self) -> Result<(), MergeError> {
        if is_unset(&self.target) {
            return Err(MergeError::MissingTag("target"));
        }
        if is_unset(&self.subtarget) {
            return Err(MergeError::MissingTag("subtarget"));
        }
        if self.profiles.is_empty() {
            return Err(MergeError::NoDeviceProfiles);
        }
        Ok(())
    }

    /// Whether the target lives in an external feed.
    pub fn is_external_target(&self) -> bool {
        self.external_target.unwrap_or(false)
    }
}

/// A singleton holding nothing or an empty string counts as unset.
fn is_unset(slot: &Option<String>) -> bool {
    slot.as_deref().map_or(true, str::is_empty)
}

/// Merge all named documents from the store, in the order given, and
/// validate the result. The order is significant: list-valued fields
/// preserve it and the feed map is last-write-wins.
pub fn merge_all(store: &ProfileStore, names: &[String]) -> Result<MergedProfile, MergeError> {
    let mut merged = MergedProfile::default();
    for name in names {
        merged.merge(store.load(name)?)?;
    }
    merged.validate()?;
    Ok(merged)
}

/// Singleton strategy: adopt the new value unless a non-empty value is
/// already held, in which case the duplicate assignment is fatal even if
/// the values are identical.
fn merge_singleton(
    slot: &mut Option<String>,
    value: Option<String>,
    field: &'static str,
) -> Result<(), MergeError> {
    let Some(value) = value else { return Ok(()) };
    if !is_unset(slot) {
        return Err(MergeError::DuplicateTag(field));
    }
    *slot = Some(value);
    Ok(())
}

/// Singleton strategy for the external-target flag.
fn merge_flag(
    slot: &mut Option<bool>,
    value: Option<bool>,
    field: &'static str,
) -> Result<(), MergeError> {
    let Some(value) = value else { return Ok(()) };
    if slot.is_some() {
        return Err(MergeError::DuplicateTag(field));
    }
    *slot = Some(value);
    Ok(())
}

/// Append-list strategy: concatenate, keeping order and duplicates.
fn merge_append(list: &mut Vec<String>, new: Vec<String>) {
    list.extend(new);
}

/// Concatenated-text strategy: verbatim append, no separator
/// normalization beyond what the source text already contains.
fn merge_text(text: &mut String, new: Option<String>) {
    if let Some(new) = new {
        text.push_str(&new);
    }
}

/// Named-map strategy: validate each entry, then insert/overwrite under
/// its name. The replacement is wholesale; fields the new entry omits do
/// not survive from the shadowed one. An overwritten name keeps its
/// original position in the iteration order.
fn merge_feeds(
    map: &mut IndexMap<String, FeedDefinition>,
    new: Vec<FeedDefinition>,
) -> Result<(), MergeError> {
    for feed in new {
        if feed.name.is_empty() || feed.uri.is_empty() {
            return Err(MergeError::BadFeed(feed.name));
        }
        if feed.has_conflicting_address() {
            return Err(MergeError::ConflictingAddress(feed.name));
        }
        map.insert(feed.name.clone(), feed);
    }
    Ok(())
}
