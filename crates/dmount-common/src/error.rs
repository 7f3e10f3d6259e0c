//! Error types for the dmount helper.

use miette::Diagnostic;
use thiserror::Error;

use crate::exit::ExitStatusCode;

/// Result type alias using [`DmountError`].
pub type DmountResult<T> = Result<T, DmountError>;

/// Errors raised while decoding the property list printed by `hdiutil attach`.
#[derive(Error, Diagnostic, Debug, Clone, PartialEq, Eq)]
pub enum AttachDecodeError {
    /// The output is not a readable property list.
    #[error("Malformed attach result: {message}")]
    #[diagnostic(code(dmount::attach::malformed))]
    Malformed {
        /// Parser message.
        message: String,
    },

    /// The root dictionary has no `system-entities` array.
    #[error("Attach result has no system-entities list")]
    #[diagnostic(code(dmount::attach::missing_entities))]
    MissingEntities,

    /// A value is present but has an unexpected type.
    #[error("Attach result value at {path} is not a {expected}")]
    #[diagnostic(code(dmount::attach::type_mismatch))]
    TypeMismatch {
        /// Location of the offending value, e.g. `system-entities[1].volume-kind`.
        path: String,
        /// Expected property list type.
        expected: &'static str,
    },

    /// The first mountable entity carries no device node.
    #[error("Mountable volume at system-entities[{index}] has no dev-entry")]
    #[diagnostic(code(dmount::attach::missing_device))]
    MissingDevice {
        /// Position of the entity in `system-entities`.
        index: usize,
    },

    /// No entity in `system-entities` is a mountable volume of a known kind.
    #[error("Key dev-entry not found: no matching mountable volume in system-entities")]
    #[diagnostic(
        code(dmount::attach::no_mountable_volume),
        help("Only apfs and hfs volumes marked potentially-mountable are used")
    )]
    NoMountableVolume,
}

/// Errors across the dmount helper.
#[derive(Error, Diagnostic, Debug)]
pub enum DmountError {
    /// The name is not in the registry, or its image does not exist.
    #[error("Unknown disk image: {name}")]
    #[diagnostic(
        code(dmount::registry::unknown_image),
        help("Run dmount without arguments to list the available names")
    )]
    UnknownImage {
        /// The requested name.
        name: String,
    },

    /// Configuration error.
    #[error("Configuration error: {message}")]
    #[diagnostic(code(dmount::config))]
    Config {
        /// The error message.
        message: String,
    },

    /// A child process could not be started.
    #[error("Failed to spawn {tool}: {source}")]
    #[diagnostic(code(dmount::tool::spawn))]
    Spawn {
        /// Program that failed to start.
        tool: String,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// `hdiutil attach` exited non-zero or printed nothing.
    #[error("Attaching disk image {image} failed with status {status}")]
    #[diagnostic(code(dmount::attach::failed))]
    AttachFailed {
        /// Path of the image.
        image: String,
        /// Exit status of the attach process.
        status: i32,
    },

    /// The attach result could not be decoded.
    #[error("Decoding attach result failed: {0}")]
    #[diagnostic(code(dmount::attach::decode))]
    Decode(#[from] AttachDecodeError),

    /// Dropping privileges to the image owner failed.
    #[error("Failed to {operation}: {source}")]
    #[diagnostic(code(dmount::privileges))]
    Privileges {
        /// The operation that failed.
        operation: String,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    #[diagnostic(code(dmount::io))]
    Io(#[from] std::io::Error),
}

impl DmountError {
    /// Exit code class the process terminates with for this error.
    #[must_use]
    pub const fn exit_status(&self) -> ExitStatusCode {
        match self {
            Self::UnknownImage { .. } => ExitStatusCode::Usage,
            Self::AttachFailed { .. } => ExitStatusCode::Unavailable,
            Self::Config { .. } => ExitStatusCode::Config,
            Self::Spawn { .. } | Self::Decode(_) | Self::Privileges { .. } | Self::Io(_) => {
                ExitStatusCode::OsError
            }
        }
    }

    /// Numeric exit code for this error.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        self.exit_status().code()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = DmountError::AttachFailed {
            image: "/images/vm.sparsebundle".to_string(),
            status: 1,
        };
        assert_eq!(
            err.to_string(),
            "Attaching disk image /images/vm.sparsebundle failed with status 1"
        );
    }

    #[test]
    fn not_found_names_the_collection() {
        let message = AttachDecodeError::NoMountableVolume.to_string();
        assert!(message.contains("system-entities"));
        assert!(message.contains("not found"));
    }

    #[test]
    fn exit_codes_by_class() {
        let spawn = DmountError::Spawn {
            tool: "/usr/bin/hdiutil".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        };
        assert_eq!(spawn.exit_code(), 71);

        let decode: DmountError = AttachDecodeError::NoMountableVolume.into();
        assert_eq!(decode.exit_code(), 71);

        let attach = DmountError::AttachFailed {
            image: "x".to_string(),
            status: 0,
        };
        assert_eq!(attach.exit_code(), 69);

        let unknown = DmountError::UnknownImage {
            name: "vm".to_string(),
        };
        assert_eq!(unknown.exit_code(), 64);

        let config = DmountError::Config {
            message: "bad".to_string(),
        };
        assert_eq!(config.exit_code(), 78);
    }

    #[test]
    fn error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: DmountError = io_err.into();
        assert!(matches!(err, DmountError::Io(_)));
        assert_eq!(err.exit_status(), ExitStatusCode::OsError);
    }
}
