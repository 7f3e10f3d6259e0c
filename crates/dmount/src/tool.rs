//! External tool invocation.
//!
//! Every child process the pipeline starts goes through [`ToolRunner`], so
//! the orchestration can be driven by a scripted runner in tests.

use std::ffi::OsString;
use std::path::PathBuf;
use std::process::{Command, ExitStatus, Stdio};

use dmount_common::{DmountError, DmountResult};

/// One call of an external tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Program to execute.
    pub program: PathBuf,
    /// Arguments, without the program name.
    pub args: Vec<OsString>,
    /// Capture standard output instead of discarding it.
    pub capture: bool,
}

impl Invocation {
    /// Create an invocation whose output is discarded.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            capture: false,
        }
    }

    /// Append an argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Capture standard output.
    #[must_use]
    pub fn captured(mut self) -> Self {
        self.capture = true;
        self
    }

    /// The program as a display string, for logs and errors.
    #[must_use]
    pub fn tool(&self) -> String {
        self.program.display().to_string()
    }
}

/// Exit status and captured output of a finished child.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutcome {
    /// Exit status; `128 + signal` when the child was killed.
    pub status: i32,
    /// Standard output, present only for captured invocations.
    pub output: Option<Vec<u8>>,
}

impl ProcessOutcome {
    /// Outcome of an uncaptured invocation.
    #[must_use]
    pub const fn status(status: i32) -> Self {
        Self {
            status,
            output: None,
        }
    }

    /// Outcome of a captured invocation.
    #[must_use]
    pub fn captured(status: i32, output: Vec<u8>) -> Self {
        Self {
            status,
            output: Some(output),
        }
    }

    /// Whether the child exited with status zero.
    #[must_use]
    pub const fn success(&self) -> bool {
        self.status == 0
    }

    /// Captured output, empty when nothing was captured.
    #[must_use]
    pub fn output(&self) -> &[u8] {
        self.output.as_deref().unwrap_or_default()
    }
}

/// Runs an external tool to completion.
pub trait ToolRunner {
    /// Run the invocation and block until the child exits.
    ///
    /// # Errors
    ///
    /// Returns [`DmountError::Spawn`] if the process could not be started.
    fn run(&mut self, invocation: &Invocation) -> DmountResult<ProcessOutcome>;
}

impl<T: ToolRunner + ?Sized> ToolRunner for &mut T {
    fn run(&mut self, invocation: &Invocation) -> DmountResult<ProcessOutcome> {
        (**self).run(invocation)
    }
}

/// [`ToolRunner`] backed by real child processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl ToolRunner for SystemRunner {
    fn run(&mut self, invocation: &Invocation) -> DmountResult<ProcessOutcome> {
        tracing::debug!(
            program = %invocation.program.display(),
            args = ?invocation.args,
            capture = invocation.capture,
            "Running tool"
        );

        let mut cmd = Command::new(&invocation.program);
        cmd.args(&invocation.args).stdin(Stdio::null());

        let spawn_error = |source| DmountError::Spawn {
            tool: invocation.tool(),
            source,
        };

        let outcome = if invocation.capture {
            let output = cmd
                .stdout(Stdio::piped())
                .stderr(Stdio::inherit())
                .output()
                .map_err(spawn_error)?;
            ProcessOutcome::captured(exit_status_code(output.status), output.stdout)
        } else {
            let status = cmd
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .map_err(spawn_error)?;
            ProcessOutcome::status(exit_status_code(status))
        };

        tracing::debug!(
            program = %invocation.program.display(),
            status = outcome.status,
            "Tool exited"
        );
        Ok(outcome)
    }
}

/// Fold an [`ExitStatus`] into a shell-style integer status.
fn exit_status_code(status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;

    status
        .code()
        .or_else(|| status.signal().map(|signal| 128 + signal))
        .unwrap_or(-1)
}
