//! Dropping privileges to the owner of a disk image.
//!
//! The automounter runs the helper as root. Everything that touches the
//! image runs as the image's owner instead, so the helper can never attach
//! an image its owner could not. The switch is one-way.

#![allow(unsafe_code)]

use std::io;
use std::os::unix::fs::MetadataExt;
use std::path::Path;

use dmount_common::{DmountError, DmountResult};

/// User and group ids of a file owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Owner {
    /// Owning user.
    pub uid: libc::uid_t,
    /// Owning group.
    pub gid: libc::gid_t,
}

/// Owner of the file or bundle at `path`.
///
/// # Errors
///
/// Returns [`DmountError::Privileges`] if the path cannot be inspected.
pub fn owner_of(path: &Path) -> DmountResult<Owner> {
    let metadata = std::fs::metadata(path).map_err(|source| DmountError::Privileges {
        operation: format!("inspect owner of {}", path.display()),
        source,
    })?;
    Ok(Owner {
        uid: metadata.uid(),
        gid: metadata.gid(),
    })
}

/// Switch the process to `owner` for the rest of its lifetime.
///
/// Supplementary groups are reset when running as root. The group is
/// changed before the user, since a non-root user can no longer change it.
///
/// # Errors
///
/// Returns [`DmountError::Privileges`] if any of the system calls fails.
pub fn drop_to(owner: Owner) -> DmountResult<()> {
    // SAFETY: plain syscalls on integer arguments; the group list outlives the call.
    unsafe {
        if libc::geteuid() == 0 {
            let groups = [owner.gid];
            check(libc::setgroups(1, groups.as_ptr()), "reset supplementary groups")?;
        }
        check(libc::setgid(owner.gid), "set group id")?;
        check(libc::setuid(owner.uid), "set user id")?;
    }

    tracing::debug!(uid = owner.uid, gid = owner.gid, "Dropped privileges");
    Ok(())
}

/// Drop privileges to whoever owns `path`.
///
/// # Errors
///
/// See [`owner_of`] and [`drop_to`].
pub fn drop_to_owner(path: &Path) -> DmountResult<Owner> {
    let owner = owner_of(path)?;
    drop_to(owner)?;
    Ok(owner)
}

fn check(ret: libc::c_int, operation: &str) -> DmountResult<()> {
    if ret == 0 {
        Ok(())
    } else {
        Err(DmountError::Privileges {
            operation: operation.to_string(),
            source: io::Error::last_os_error(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn owner_of_new_file_is_us() {
        let file = NamedTempFile::new().unwrap();
        let owner = owner_of(file.path()).unwrap();
        // SAFETY: geteuid cannot fail.
        assert_eq!(owner.uid, unsafe { libc::geteuid() });
    }

    #[test]
    fn owner_of_missing_path() {
        let err = owner_of(Path::new("/nonexistent/dmount/image.dmg")).unwrap_err();
        assert!(matches!(err, DmountError::Privileges { .. }));
        assert_eq!(err.exit_code(), dmount_common::exit::EX_OSERR);
    }

    #[test]
    fn dropping_to_ourselves_succeeds() {
        // SAFETY: getuid and getgid cannot fail.
        let (uid, gid) = unsafe { (libc::getuid(), libc::getgid()) };
        drop_to(Owner { uid, gid }).unwrap();
    }
}
