//! The attach, verify and emit pipeline for one disk image.

use std::io::Write;

use dmount_common::{DmountResult, ToolPaths};

use crate::attach;
use crate::emit::{Emission, MountSpec};
use crate::maintenance::{self, Compaction, MaintenanceOptions, RandomSource};
use crate::registry::ImageEntry;
use crate::tool::ToolRunner;
use crate::verify::{self, Verdict, VerifyOptions};

/// Settings for every stage.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PipelineOptions {
    /// Compaction before attach.
    pub maintenance: MaintenanceOptions,
    /// Check and repair after attach.
    pub verify: VerifyOptions,
}

/// What a successful run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountOutcome {
    /// The line written to the output.
    pub spec: MountSpec,
    /// Compaction result, `None` if it was not attempted.
    pub compaction: Option<Compaction>,
    /// Terminal state of the verification stage.
    pub verdict: Verdict,
}

/// Drives the external tools for one image.
#[derive(Debug)]
pub struct Pipeline<R, S> {
    tools: ToolPaths,
    options: PipelineOptions,
    runner: R,
    random: S,
}

impl<R: ToolRunner, S: RandomSource> Pipeline<R, S> {
    /// Create a pipeline.
    pub const fn new(tools: ToolPaths, options: PipelineOptions, runner: R, random: S) -> Self {
        Self {
            tools,
            options,
            runner,
            random,
        }
    }

    /// The tool runner, e.g. to inspect a scripted runner after a run.
    pub const fn runner(&self) -> &R {
        &self.runner
    }

    /// Compact (sometimes), attach, verify and write the mount specification.
    ///
    /// On success exactly one line has been written to `out`; on error
    /// nothing has, unless writing the line itself failed.
    ///
    /// # Errors
    ///
    /// - [`dmount_common::DmountError::Spawn`] if any tool cannot be started
    /// - [`dmount_common::DmountError::AttachFailed`] if attach produced nothing usable
    /// - [`dmount_common::DmountError::Decode`] if no mountable volume was found
    /// - [`dmount_common::DmountError::Io`] if the line cannot be written
    pub fn run<W: Write>(&mut self, image: &ImageEntry, out: &mut W) -> DmountResult<MountOutcome> {
        let _span = tracing::info_span!("mount", image = %image.name).entered();

        let compaction = maintenance::maybe_compact(
            &mut self.runner,
            &mut self.random,
            &self.tools,
            &self.options.maintenance,
            image,
        )?;

        let attached = attach::attach(&mut self.runner, &self.tools, image)?;
        let emission = Emission::new(MountSpec::from(&attached), out);

        let verdict = match verify::check_and_repair(
            &mut self.runner,
            &self.tools,
            &self.options.verify,
            image,
            &attached,
        ) {
            Ok(verdict) => verdict,
            Err(err) => {
                emission.abandon();
                return Err(err);
            }
        };

        let spec = emission.finish()?;

        tracing::debug!(?verdict, ?compaction, %spec, "Mount specification emitted");
        Ok(MountOutcome {
            spec,
            compaction,
            verdict,
        })
    }
}
