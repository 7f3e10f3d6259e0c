//! # dmount
//!
//! On-demand disk image mount helper for the automounter.
//!
//! Given a name from its registry, the helper attaches the backing disk
//! image as a block device without mounting it, checks and if needed
//! repairs the filesystem, and prints the mount specification the
//! automounter uses to mount the volume:
//!
//! ```text
//! -fstype=apfs,nobrowse,nodev,nosuid :/dev/disk5s1
//! ```
//!
//! ## Usage
//!
//! ```no_run
//! use dmount::attach::VolumeKind;
//! use dmount::maintenance::ThreadRandom;
//! use dmount::pipeline::{Pipeline, PipelineOptions};
//! use dmount::registry::ImageEntry;
//! use dmount::tool::SystemRunner;
//! use dmount_common::ToolPaths;
//!
//! # fn example() -> dmount_common::DmountResult<()> {
//! let image = ImageEntry::new("VM", "/Users/me/Library/VM/VM.sparsebundle");
//! let mut pipeline = Pipeline::new(
//!     ToolPaths::default(),
//!     PipelineOptions::default(),
//!     SystemRunner,
//!     ThreadRandom,
//! );
//!
//! let outcome = pipeline.run(&image, &mut std::io::stdout())?;
//! assert_eq!(outcome.spec.kind, VolumeKind::Apfs);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod attach;
pub mod cli;
pub mod config;
pub mod emit;
pub mod logging;
pub mod maintenance;
pub mod pipeline;
pub mod privileges;
pub mod registry;
pub mod tool;
pub mod verify;

#[cfg(test)]
mod testing;

pub use attach::{AttachResult, VolumeKind};
pub use pipeline::{MountOutcome, Pipeline, PipelineOptions};
