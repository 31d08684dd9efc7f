//! profilegen - profile-driven build configuration generator
//!
//! Composes a firmware build tree's configuration from layered, named
//! profile documents, then drives the tree's feed script and the build
//! tool's normalization step to materialize it on disk.

pub mod feeds;
pub mod merge;
pub mod paths;
pub mod pipeline;
pub mod profile;
pub mod render;
pub mod reset;

pub use feeds::{CommandRunner, SystemRunner};
pub use merge::{merge_all, MergedProfile};
pub use pipeline::{PipelineError, PipelineResult};
pub use profile::{FeedDefinition, ProfileDocument, ProfileStore};
pub use render::render;
