//! Feed orchestration.
//!
//! Translates the accumulated feed map into an ordered command plan for
//! the tree's feed script and executes it: one `setup` invocation carrying
//! the full address list, one `update`, then per feed a best-effort
//! uninstall of its currently checked-out packages followed by a forced
//! install. Every step except the per-package uninstall is fatal on
//! failure; nothing is retried and nothing is rolled back.

use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use indexmap::IndexMap;
use walkdir::WalkDir;

use crate::merge::MergedProfile;
use crate::paths;
use crate::profile::FeedDefinition;

/// The feed management script, relative to the tree root.
pub const FEEDS_SCRIPT: &str = "./scripts/feeds";

/// Install method used when a feed does not name one.
pub const DEFAULT_METHOD: &str = "src-git";

/// Branch tracked when a feed names neither a revision nor a branch.
pub const DEFAULT_BRANCH: &str = "master";

/// Errors from feed address construction or command execution.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("failed to read default feed list {path}: {source}")]
    DefaultFeeds { path: PathBuf, source: io::Error },

    #[error("feed '{0}' sets both a revision and a branch")]
    ConflictingAddress(String),

    #[error("failed to run '{command}': {source}")]
    Spawn { command: String, source: io::Error },

    #[error("Error setting up feeds")]
    SetupFailed,

    #[error("Error updating feeds")]
    UpdateFailed,

    #[error("Error installing {0}")]
    InstallFailed(String),

    #[error("Error installing external target {0}")]
    ExternalTargetFailed(String),
}

/// Executes external commands on behalf of the orchestrator.
///
/// The single seam between this tool and the outside world; tests
/// substitute a recording fake so the full command plan can be asserted
/// without a real build tree.
pub trait CommandRunner {
    /// Run `argv` to completion, returning whether it exited successfully.
    fn run(&mut self, argv: &[String]) -> io::Result<bool>;
}

/// Runs commands for real, with the tree root as working directory.
#[derive(Debug, Clone)]
pub struct SystemRunner {
    root: PathBuf,
}

impl SystemRunner {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl CommandRunner for SystemRunner {
    fn run(&mut self, argv: &[String]) -> io::Result<bool> {
        let status = Command::new(&argv[0])
            .args(&argv[1..])
            .current_dir(&self.root)
            .status()?;
        Ok(status.success())
    }
}

/// Build the feed script address for one feed definition.
///
/// Pinned feeds use a caret between uri and revision; branch-tracking
/// feeds use a semicolon, with the branch defaulting to the primary
/// branch. A definition carrying both modes is rejected here even though
/// the merger already guards against it, so no caller can reach the feed
/// script with an ambiguous address.
pub fn feed_address(feed: &FeedDefinition) -> Result<String, FeedError> {
    if feed.has_conflicting_address() {
        return Err(FeedError::ConflictingAddress(feed.name.clone()));
    }

    let method = feed.method.as_deref().unwrap_or(DEFAULT_METHOD);
    let address = match &feed.revision {
        Some(revision) => format!("{method},{},{}^{revision}", feed.name, feed.uri),
        None => {
            let branch = feed.branch.as_deref().unwrap_or(DEFAULT_BRANCH);
            format!("{method},{},{};{branch}", feed.name, feed.uri)
        }
    };
    Ok(address)
}

/// Read the static default feed list and convert each line to an address.
///
/// The defaults are always included first, regardless of profile-sourced
/// feeds. Lines pass through verbatim apart from whitespace-to-comma
/// conversion; blank lines are skipped.
pub fn default_feed_addresses(root: &Path) -> Result<Vec<String>, FeedError> {
    let path = paths::default_feeds_conf(root);
    let contents =
        std::fs::read_to_string(&path).map_err(|source| FeedError::DefaultFeeds { path, source })?;

    let mut addresses = Vec::new();
    for line in contents.lines() {
        let feed = line.trim_end();
        if feed.is_empty() {
            continue;
        }
        println!("Adding default feed '{feed}'");
        addresses.push(feed.split_whitespace().collect::<Vec<_>>().join(","));
    }
    Ok(addresses)
}

/// Build the complete address list: defaults first, then the merged feeds
/// in map order. Fails fast on the first malformed entry.
pub fn build_addresses(
    root: &Path,
    feeds: &IndexMap<String, FeedDefinition>,
) -> Result<Vec<String>, FeedError> {
    let mut addresses = default_feed_addresses(root)?;
    for feed in feeds.values() {
        addresses.push(feed_address(feed)?);
    }
    Ok(addresses)
}

/// Packages currently checked out under a feed's working directory.
///
/// A package is any directory holding a `Makefile`; feeds nest packages
/// under category directories, so the walk is recursive. Returns an empty
/// list when the feed has no checkout yet.
pub fn feed_packages(root: &Path, feed: &str) -> Vec<String> {
    let checkout = paths::feed_checkout(root, feed);
    if !checkout.is_dir() {
        return Vec::new();
    }

    let mut packages = Vec::new();
    for entry in WalkDir::new(&checkout)
        .min_depth(2)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
    {
        if entry.file_type().is_file() && entry.file_name() == "Makefile" {
            if let Some(package) = entry.path().parent().and_then(Path::file_name) {
                packages.push(package.to_string_lossy().into_owned());
            }
        }
    }
    packages
}

/// Apply the merged feed configuration to the tree.
///
/// Strict order: setup with the full address list, update, then per feed
/// uninstall/install, then the external target install when flagged. The
/// address list is built in full before the first command, so a malformed
/// feed aborts the run with zero commands issued.
pub fn apply_feeds(
    root: &Path,
    profile: &MergedProfile,
    runner: &mut dyn CommandRunner,
) -> Result<(), FeedError> {
    let addresses = build_addresses(root, &profile.feeds)?;

    let mut setup = vec![FEEDS_SCRIPT.to_string(), "setup".to_string()];
    setup.extend(addresses);
    if !run(runner, &setup)? {
        return Err(FeedError::SetupFailed);
    }

    if !run_feeds(runner, &["update"])? {
        return Err(FeedError::UpdateFailed);
    }

    for name in profile.feeds.keys() {
        // Clear out whatever an earlier checkout of this feed installed;
        // the forced install below reconciles the final state, so
        // uninstall failures only warrant a warning.
        for package in feed_packages(root, name) {
            match run_feeds(runner, &["uninstall", &package]) {
                Ok(true) => {}
                Ok(false) => eprintln!("Warning: failed to uninstall {package}"),
                Err(e) => eprintln!("Warning: failed to uninstall {package}: {e}"),
            }
        }

        if !run_feeds(runner, &["install", "-a", "-f", "-p", name])? {
            return Err(FeedError::InstallFailed(name.clone()));
        }
    }

    if profile.is_external_target() {
        if let Some(target) = profile.target.as_deref() {
            if !run_feeds(runner, &["install", target])? {
                return Err(FeedError::ExternalTargetFailed(target.to_string()));
            }
        }
    }

    Ok(())
}

fn run_feeds(runner: &mut dyn CommandRunner, args: &[&str]) -> Result<bool, FeedError> {
    let mut argv = vec![FEEDS_SCRIPT.to_string()];
    argv.extend(args.iter().map(|s| s.to_string()));
    run(runner, &argv)
}

fn run(runner: &mut dyn CommandRunner, argv: &[String]) -> Result<bool, FeedError> {
    runner.run(argv).map_err(|source| FeedError::Spawn {
        command: argv.join(" "),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[derive(Default)]
    struct RecordingRunner {
        calls: Vec<Vec<String>>,
        /// Feed-script subcommands that should report failure.
        fail_on: Vec<&'static str>,
    }

    impl CommandRunner for RecordingRunner {
        fn run(&mut self, argv: &[String]) -> io::Result<bool> {
            self.calls.push(argv.to_vec());
            let subcommand = argv.get(1).map(String::as_str).unwrap_or_default();
            Ok(!self.fail_on.contains(&subcommand))
        }
    }

    fn pinned(name: &str, revision: &str) -> FeedDefinition {
        FeedDefinition {
            name: name.to_string(),
            uri: format!("https://example.org/feed/{name}.git"),
            method: None,
            revision: Some(revision.to_string()),
            branch: None,
        }
    }

    fn tracking(name: &str, branch: Option<&str>) -> FeedDefinition {
        FeedDefinition {
            name: name.to_string(),
            uri: format!("https://example.org/feed/{name}.git"),
            method: None,
            revision: None,
            branch: branch.map(str::to_string),
        }
    }

    fn tree_with_defaults(defaults: &str) -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("feeds.conf.default"), defaults).unwrap();
        dir
    }

    fn profile_with_feeds(feeds: Vec<FeedDefinition>) -> MergedProfile {
        let mut profile = MergedProfile {
            target: Some("ath79".into()),
            subtarget: Some("generic".into()),
            profiles: vec!["some_device".into()],
            ..MergedProfile::default()
        };
        for feed in feeds {
            profile.feeds.insert(feed.name.clone(), feed);
        }
        profile
    }

    #[test]
    fn pinned_feed_uses_a_caret() {
        let address = feed_address(&pinned("routing", "abc123")).unwrap();
        assert_eq!(address, "src-git,routing,https://example.org/feed/routing.git^abc123");
    }

    #[test]
    fn tracking_feed_uses_a_semicolon_and_defaults_the_branch() {
        let address = feed_address(&tracking("routing", None)).unwrap();
        assert_eq!(address, "src-git,routing,https://example.org/feed/routing.git;master");

        let address = feed_address(&tracking("routing", Some("openwrt-23.05"))).unwrap();
        assert_eq!(
            address,
            "src-git,routing,https://example.org/feed/routing.git;openwrt-23.05"
        );
    }

    #[test]
    fn explicit_method_is_kept() {
        let mut feed = pinned("local", "abc");
        feed.method = Some("src-link".into());
        assert!(feed_address(&feed).unwrap().starts_with("src-link,local,"));
    }

    #[test]
    fn conflicting_address_is_rejected() {
        let mut feed = pinned("routing", "abc123");
        feed.branch = Some("main".into());
        assert!(matches!(
            feed_address(&feed),
            Err(FeedError::ConflictingAddress(name)) if name == "routing"
        ));
    }

    #[test]
    fn default_feeds_come_first_with_commas() {
        let tree = tree_with_defaults(
            "src-git packages https://example.org/feed/packages.git\n\
             \n\
             src-git luci https://example.org/project/luci.git\n",
        );

        let feeds = IndexMap::from([(String::from("routing"), pinned("routing", "abc"))]);
        let addresses = build_addresses(tree.path(), &feeds).unwrap();
        assert_eq!(
            addresses,
            vec![
                "src-git,packages,https://example.org/feed/packages.git",
                "src-git,luci,https://example.org/project/luci.git",
                "src-git,routing,https://example.org/feed/routing.git^abc",
            ]
        );
    }

    #[test]
    fn missing_default_feed_list_is_fatal() {
        let tree = TempDir::new().unwrap();
        let result = build_addresses(tree.path(), &IndexMap::new());
        assert!(matches!(result, Err(FeedError::DefaultFeeds { .. })));
    }

    #[test]
    fn apply_runs_setup_update_install_in_order() {
        let tree = tree_with_defaults("src-git packages https://example.org/p.git\n");
        let profile = profile_with_feeds(vec![pinned("routing", "abc")]);
        let mut runner = RecordingRunner::default();

        apply_feeds(tree.path(), &profile, &mut runner).unwrap();

        let calls: Vec<String> = runner.calls.iter().map(|c| c.join(" ")).collect();
        assert_eq!(
            calls,
            vec![
                "./scripts/feeds setup src-git,packages,https://example.org/p.git \
                 src-git,routing,https://example.org/feed/routing.git^abc",
                "./scripts/feeds update",
                "./scripts/feeds install -a -f -p routing",
            ]
        );
    }

    #[test]
    fn conflicting_feed_aborts_before_any_command() {
        let tree = tree_with_defaults("src-git packages https://example.org/p.git\n");
        let mut bad = pinned("routing", "abc");
        bad.branch = Some("main".into());
        let profile = profile_with_feeds(vec![bad]);
        let mut runner = RecordingRunner::default();

        let result = apply_feeds(tree.path(), &profile, &mut runner);
        assert!(matches!(result, Err(FeedError::ConflictingAddress(_))));
        assert_eq!(runner.calls.len(), 0);
    }

    #[test]
    fn setup_failure_is_fatal() {
        let tree = tree_with_defaults("");
        let profile = profile_with_feeds(vec![]);
        let mut runner = RecordingRunner {
            fail_on: vec!["setup"],
            ..RecordingRunner::default()
        };

        let result = apply_feeds(tree.path(), &profile, &mut runner);
        assert!(matches!(result, Err(FeedError::SetupFailed)));
        assert_eq!(runner.calls.len(), 1);
    }

    #[test]
    fn uninstall_failure_is_swallowed_but_install_failure_is_not() {
        let tree = tree_with_defaults("");
        fs::create_dir_all(tree.path().join("feeds/routing/batman-adv")).unwrap();
        fs::write(tree.path().join("feeds/routing/batman-adv/Makefile"), "").unwrap();

        let profile = profile_with_feeds(vec![tracking("routing", None)]);
        let mut runner = RecordingRunner {
            fail_on: vec!["uninstall"],
            ..RecordingRunner::default()
        };

        // The failing uninstall must not abort the run.
        apply_feeds(tree.path(), &profile, &mut runner).unwrap();
        let calls: Vec<String> = runner.calls.iter().map(|c| c.join(" ")).collect();
        assert!(calls.contains(&"./scripts/feeds uninstall batman-adv".to_string()));
        assert!(calls.contains(&"./scripts/feeds install -a -f -p routing".to_string()));
    }

    #[test]
    fn install_failure_aborts() {
        let tree = tree_with_defaults("");
        let profile = profile_with_feeds(vec![tracking("routing", None)]);
        let mut runner = RecordingRunner {
            fail_on: vec!["install"],
            ..RecordingRunner::default()
        };

        let result = apply_feeds(tree.path(), &profile, &mut runner);
        assert!(matches!(result, Err(FeedError::InstallFailed(name)) if name == "routing"));
    }

    #[test]
    fn external_target_triggers_one_more_install() {
        let tree = tree_with_defaults("");
        let mut profile = profile_with_feeds(vec![]);
        profile.external_target = Some(true);
        let mut runner = RecordingRunner::default();

        apply_feeds(tree.path(), &profile, &mut runner).unwrap();
        let last = runner.calls.last().unwrap().join(" ");
        assert_eq!(last, "./scripts/feeds install ath79");
    }

    #[test]
    fn nested_feed_packages_are_discovered() {
        let tree = TempDir::new().unwrap();
        for pkg in ["net/olsrd", "batman-adv"] {
            let dir = tree.path().join("feeds/routing").join(pkg);
            fs::create_dir_all(&dir).unwrap();
            fs::write(dir.join("Makefile"), "").unwrap();
        }

        let packages = feed_packages(tree.path(), "routing");
        assert_eq!(packages, vec!["batman-adv", "olsrd"]);
    }

    #[test]
    fn feed_without_checkout_has_no_packages() {
        let tree = TempDir::new().unwrap();
        assert!(feed_packages(tree.path(), "routing").is_empty());
    }
}
