//! Build configuration rendering.
//!
//! Projects a merged profile into the exact line-oriented `KEY=y` text the
//! build tool consumes. Rendering is pure and deterministic: the same
//! merged profile always produces byte-identical output, so tests can
//! assert on full snapshots.

use std::fmt::Write;

use crate::merge::MergedProfile;

/// Errors from rendering a merged profile.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("no target selected")]
    MissingTarget,

    #[error("no subtarget selected")]
    MissingSubtarget,

    #[error("no device profiles selected")]
    NoDeviceProfiles,
}

/// Render the configuration file contents for a merged profile.
///
/// Layout, in order: the target enable line, the target/subtarget line,
/// the device selection (single- or multi-profile shape), the raw
/// diffconfig text verbatim, then one enable line per accumulated package.
/// Duplicate packages produce duplicate lines; the build tool's own
/// normalization pass is responsible for collapsing them.
pub fn render(profile: &MergedProfile) -> Result<String, RenderError> {
    let target = profile
        .target
        .as_deref()
        .filter(|t| !t.is_empty())
        .ok_or(RenderError::MissingTarget)?;
    let subtarget = profile
        .subtarget
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or(RenderError::MissingSubtarget)?;

    // Writing to a String cannot fail; discard the fmt::Result.
    let mut out = String::new();
    let _ = writeln!(out, "CONFIG_TARGET_{target}=y");
    let _ = writeln!(out, "CONFIG_TARGET_{target}_{subtarget}=y");

    match profile.profiles.as_slice() {
        [] => return Err(RenderError::NoDeviceProfiles),
        [device] => {
            let _ = writeln!(out, "CONFIG_TARGET_{target}_{subtarget}_DEVICE_{device}=y");
        }
        devices => {
            let _ = writeln!(out, "CONFIG_TARGET_MULTI_PROFILE=y");
            for device in devices {
                let _ = writeln!(out, "CONFIG_TARGET_DEVICE_{target}_{subtarget}_DEVICE_{device}=y");
            }
        }
    }

    out.push_str(&profile.diffconfig);

    for package in &profile.packages {
        let _ = writeln!(out, "CONFIG_PACKAGE_{package}=y");
    }

    Ok(out)
}
