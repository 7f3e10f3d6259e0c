//! Opportunistic compaction of disk images.
//!
//! Sparse images grow but never shrink on their own. A fraction of mount
//! attempts runs `hdiutil compact` before attaching. The tool fails
//! routinely when the image is in use elsewhere, so only a failure to start
//! it at all stops the pipeline.

use rand::{Rng, RngCore};

use dmount_common::{DmountResult, ToolPaths};

use crate::registry::ImageEntry;
use crate::tool::{Invocation, ToolRunner};

/// Probability of compacting on a given invocation.
pub const DEFAULT_COMPACT_PROBABILITY: f64 = 0.1;

/// Source of uniform samples in `[0, 1)`.
pub trait RandomSource {
    /// Next sample.
    fn next_unit(&mut self) -> f64;
}

impl<T: RandomSource + ?Sized> RandomSource for &mut T {
    fn next_unit(&mut self) -> f64 {
        (**self).next_unit()
    }
}

/// Samples from the thread-local generator.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn next_unit(&mut self) -> f64 {
        rand::thread_rng().r#gen::<f64>()
    }
}

/// Samples from a caller-supplied generator, e.g. a seeded `StdRng`.
#[derive(Debug, Clone)]
pub struct SeededRandom<R>(pub R);

impl<R: RngCore> RandomSource for SeededRandom<R> {
    fn next_unit(&mut self) -> f64 {
        self.0.r#gen::<f64>()
    }
}

/// Outcome of a triggered compaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compaction {
    /// `hdiutil compact` exited successfully.
    Compacted,
    /// `hdiutil compact` exited with a non-zero status.
    Failed {
        /// Exit status of the compact process.
        status: i32,
    },
}

/// Compaction settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaintenanceOptions {
    /// Probability in `[0, 1]` of compacting.
    pub probability: f64,
    /// Pass `-quiet` to `hdiutil compact`.
    pub quiet: bool,
}

impl Default for MaintenanceOptions {
    fn default() -> Self {
        Self {
            probability: DEFAULT_COMPACT_PROBABILITY,
            quiet: false,
        }
    }
}

/// Bernoulli gate: `true` with the given probability.
pub fn should_compact<S: RandomSource + ?Sized>(random: &mut S, probability: f64) -> bool {
    random.next_unit() < probability
}

/// Compact the image if the random gate fires.
///
/// Returns `None` when compaction was not attempted.
///
/// # Errors
///
/// Returns [`dmount_common::DmountError::Spawn`] if `hdiutil` cannot be
/// started. A non-zero status is logged and reported as
/// [`Compaction::Failed`].
pub fn maybe_compact<R, S>(
    runner: &mut R,
    random: &mut S,
    tools: &ToolPaths,
    options: &MaintenanceOptions,
    image: &ImageEntry,
) -> DmountResult<Option<Compaction>>
where
    R: ToolRunner + ?Sized,
    S: RandomSource + ?Sized,
{
    if !should_compact(random, options.probability) {
        return Ok(None);
    }
    compact(runner, tools, options, image).map(Some)
}

/// Run `hdiutil compact` on the image.
///
/// # Errors
///
/// Returns [`dmount_common::DmountError::Spawn`] if `hdiutil` cannot be started.
pub fn compact<R: ToolRunner + ?Sized>(
    runner: &mut R,
    tools: &ToolPaths,
    options: &MaintenanceOptions,
    image: &ImageEntry,
) -> DmountResult<Compaction> {
    let mut invocation = Invocation::new(&tools.hdiutil)
        .arg("compact")
        .arg(&image.path);
    if options.quiet {
        invocation = invocation.arg("-quiet");
    }

    let outcome = runner.run(&invocation)?;
    if outcome.success() {
        tracing::info!(image = %image.path.display(), "Compacted disk image");
        Ok(Compaction::Compacted)
    } else {
        tracing::warn!(
            image = %image.path.display(),
            status = outcome.status,
            "Compaction failed for disk image"
        );
        Ok(Compaction::Failed {
            status: outcome.status,
        })
    }
}
