//! Standard filesystem paths for dmount.

use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;

/// Default location of the configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/dmount.toml";

/// Disk image tool used for attach and compact.
pub static HDIUTIL: Lazy<PathBuf> = Lazy::new(|| {
    std::env::var("DMOUNT_HDIUTIL")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/usr/bin/hdiutil"))
});

/// Disk utility used for repairs.
pub static DISKUTIL: Lazy<PathBuf> = Lazy::new(|| {
    std::env::var("DMOUNT_DISKUTIL")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/usr/sbin/diskutil"))
});

/// Directory holding the `fsck_<kind>` checkers.
pub static FSCK_DIR: Lazy<PathBuf> = Lazy::new(|| {
    std::env::var("DMOUNT_FSCK_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/sbin"))
});

/// Locations of the external tools the pipeline drives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolPaths {
    /// `hdiutil` binary.
    pub hdiutil: PathBuf,
    /// `diskutil` binary.
    pub diskutil: PathBuf,
    /// Directory containing `fsck_apfs`, `fsck_hfs`, ...
    pub fsck_dir: PathBuf,
}

impl ToolPaths {
    /// Create paths with every tool under a single directory.
    #[must_use]
    pub fn with_root(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            hdiutil: root.join("hdiutil"),
            diskutil: root.join("diskutil"),
            fsck_dir: root.to_path_buf(),
        }
    }

    /// Filesystem checker for a volume kind, e.g. `/sbin/fsck_apfs`.
    #[must_use]
    pub fn fsck(&self, kind: &str) -> PathBuf {
        self.fsck_dir.join(format!("fsck_{kind}"))
    }
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            hdiutil: HDIUTIL.clone(),
            diskutil: DISKUTIL.clone(),
            fsck_dir: FSCK_DIR.clone(),
        }
    }
}
