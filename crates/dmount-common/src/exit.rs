//! Process exit codes, following sysexits(3).
//!
//! The automounter only sees the helper's exit status, so every failure
//! class maps onto one of these codes.

use std::process::ExitCode;

/// Successful termination.
pub const EX_OK: u8 = 0;
/// The command was used incorrectly.
pub const EX_USAGE: u8 = 64;
/// A service is unavailable.
pub const EX_UNAVAILABLE: u8 = 69;
/// An operating system error has been detected.
pub const EX_OSERR: u8 = 71;
/// Something was found in an unconfigured or misconfigured state.
pub const EX_CONFIG: u8 = 78;

/// Exit code classes the helper terminates with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExitStatusCode {
    /// Mount specification emitted, or names listed.
    Ok,
    /// Bad arguments or unknown image name.
    Usage,
    /// Attaching the image did not produce a usable result.
    Unavailable,
    /// A child process could not be spawned, or decoding failed.
    OsError,
    /// The configuration file is missing or invalid.
    Config,
}

impl ExitStatusCode {
    /// Numeric sysexits value.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Ok => EX_OK,
            Self::Usage => EX_USAGE,
            Self::Unavailable => EX_UNAVAILABLE,
            Self::OsError => EX_OSERR,
            Self::Config => EX_CONFIG,
        }
    }
}

impl From<ExitStatusCode> for ExitCode {
    fn from(status: ExitStatusCode) -> Self {
        Self::from(status.code())
    }
}
