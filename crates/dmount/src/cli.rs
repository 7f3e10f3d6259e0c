//! Command line entry points.
//!
//! The automounter runs the helper without arguments to enumerate keys and
//! with a single key to resolve it.

use std::io::{self, Write};
use std::path::PathBuf;

use clap::Parser;

use dmount_common::DmountResult;
use dmount_common::paths::DEFAULT_CONFIG_PATH;

use crate::config::Config;
use crate::logging::LogFormat;
use crate::maintenance::ThreadRandom;
use crate::pipeline::{MountOutcome, Pipeline};
use crate::privileges;
use crate::registry::ImageRegistry;
use crate::tool::SystemRunner;

/// dmount - disk image mount helper for the automounter
#[derive(Parser, Debug)]
#[command(name = "dmount")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file
    #[arg(short, long, env = "DMOUNT_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// Disk image to attach; lists the available names when omitted
    pub name: Option<String>,
}

impl Cli {
    /// Execute the command, writing its result to stdout.
    ///
    /// # Errors
    ///
    /// Returns the error whose exit code the process should terminate with.
    pub fn execute(self) -> DmountResult<()> {
        let config = Config::load(&self.config)?;
        let registry = config.registry().available();
        let mut stdout = io::stdout().lock();

        match self.name {
            None => list(&registry, &mut stdout),
            Some(name) => mount(&config, &registry, &name, &mut stdout).map(|_| ()),
        }
    }
}

/// Print every available image name, one per line.
///
/// # Errors
///
/// Returns an I/O error if writing fails.
pub fn list<W: Write>(registry: &ImageRegistry, out: &mut W) -> DmountResult<()> {
    out.write_all(registry.listing().as_bytes())?;
    out.flush()?;
    Ok(())
}

/// Resolve `name`, become the image owner and run the pipeline.
///
/// # Errors
///
/// - [`dmount_common::DmountError::UnknownImage`] if `name` is not available
/// - [`dmount_common::DmountError::Privileges`] if the owner cannot be assumed
/// - any pipeline error
pub fn mount<W: Write>(
    config: &Config,
    registry: &ImageRegistry,
    name: &str,
    out: &mut W,
) -> DmountResult<MountOutcome> {
    let image = registry.resolve(name)?;
    let owner = privileges::drop_to_owner(&image.path)?;
    tracing::debug!(
        name = %image.name,
        path = %image.path.display(),
        uid = owner.uid,
        "Resolved disk image"
    );

    let mut pipeline = Pipeline::new(
        config.tool_paths(),
        config.pipeline_options(),
        SystemRunner,
        ThreadRandom,
    );
    pipeline.run(&image, out)
}
