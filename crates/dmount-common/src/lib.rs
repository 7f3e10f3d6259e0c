//! # dmount-common
//!
//! Shared types for the dmount disk image mount helper.
//!
//! This crate provides functionality used by the helper binary and its
//! pipeline:
//! - The error taxonomy and its mapping to process exit codes
//! - sysexits(3) exit code constants
//! - Standard tool and configuration paths

#![warn(missing_docs)]

pub mod error;
pub mod exit;
pub mod paths;

pub use error::{AttachDecodeError, DmountError, DmountResult};
pub use exit::ExitStatusCode;
pub use paths::ToolPaths;
