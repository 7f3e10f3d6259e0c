//! Mount specification output.
//!
//! The automounter reads exactly one line from stdout:
//! `-fstype=<kind>,nobrowse,nodev,nosuid :<device>`.

use std::fmt;
use std::io::{self, Write};

use crate::attach::{AttachResult, VolumeKind};

/// Mount options and device handed to the automounter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountSpec {
    /// Filesystem type for `-fstype=`.
    pub kind: VolumeKind,
    /// Device node to mount.
    pub device: String,
}

impl From<&AttachResult> for MountSpec {
    fn from(result: &AttachResult) -> Self {
        Self {
            kind: result.kind,
            device: result.device.clone(),
        }
    }
}

impl fmt::Display for MountSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "-fstype={},nobrowse,nodev,nosuid :{}", self.kind, self.device)
    }
}

/// Writes the mount specification when dropped.
///
/// Created as soon as the attach result is known, so every way out of the
/// verification stage emits the line. The normal path calls
/// [`Self::finish`] to see write errors; fatal errors call
/// [`Self::abandon`] to keep stdout empty.
#[must_use = "the mount specification is written when the guard is dropped"]
pub struct Emission<'a, W: Write> {
    spec: MountSpec,
    out: &'a mut W,
    armed: bool,
}

impl<'a, W: Write> Emission<'a, W> {
    /// Arm the guard.
    pub fn new(spec: MountSpec, out: &'a mut W) -> Self {
        Self {
            spec,
            out,
            armed: true,
        }
    }

    /// Disarm the guard; nothing is written.
    pub fn abandon(mut self) {
        self.armed = false;
    }

    /// Write the line now and disarm the guard.
    ///
    /// # Errors
    ///
    /// Returns the I/O error if writing or flushing fails.
    pub fn finish(mut self) -> io::Result<MountSpec> {
        self.armed = false;
        self.write()?;
        Ok(self.spec.clone())
    }

    fn write(&mut self) -> io::Result<()> {
        writeln!(self.out, "{}", self.spec)?;
        self.out.flush()
    }
}

impl<W: Write> Drop for Emission<'_, W> {
    fn drop(&mut self) {
        if !self.armed || std::thread::panicking() {
            return;
        }
        if let Err(e) = self.write() {
            tracing::error!(error = %e, spec = %self.spec, "Failed to write mount specification");
        }
    }
}
