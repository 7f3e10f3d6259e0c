//! Attaching disk images and decoding the attach result.
//!
//! `hdiutil attach -plist` prints a property list whose `system-entities`
//! array holds one dictionary per partition or volume of the attached
//! image. The first entity that is potentially mountable and of a
//! recognized [`VolumeKind`] is the one handed to the automounter.

use std::fmt;
use std::io::Cursor;

use plist::{Dictionary, Value};

use dmount_common::{AttachDecodeError, DmountError, DmountResult, ToolPaths};

use crate::registry::ImageEntry;
use crate::tool::{Invocation, ToolRunner};

const ENTITIES_KEY: &str = "system-entities";
const DEVICE_KEY: &str = "dev-entry";
const MOUNTABLE_KEY: &str = "potentially-mountable";
const VOLUME_KIND_KEY: &str = "volume-kind";
const MOUNTED_KEY: &str = "mounted";

/// Filesystem kinds the helper knows how to check and mount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VolumeKind {
    /// Apple File System.
    Apfs,
    /// Mac OS Extended.
    Hfs,
}

/// Every kind the helper accepts, in preference-free order.
pub const RECOGNIZED_KINDS: &[VolumeKind] = &[VolumeKind::Apfs, VolumeKind::Hfs];

impl VolumeKind {
    /// Name as used by `volume-kind`, `fsck_<kind>` and `-fstype=`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Apfs => "apfs",
            Self::Hfs => "hfs",
        }
    }
}

impl fmt::Display for VolumeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The mountable volume selected from an attach result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachResult {
    /// Device node, e.g. `/dev/disk5s1`.
    pub device: String,
    /// Filesystem kind of the volume.
    pub kind: VolumeKind,
    /// The attach metadata reports the volume as mounted already.
    pub already_mounted: bool,
}

impl AttachResult {
    /// Decode the property list printed by `hdiutil attach -plist`.
    ///
    /// # Errors
    ///
    /// See [`decode`].
    pub fn from_plist(data: &[u8]) -> Result<Self, AttachDecodeError> {
        decode(data, RECOGNIZED_KINDS)
    }
}

/// Select the first potentially mountable entity whose kind is in `kinds`.
///
/// Entities after the first match are never inspected.
///
/// # Errors
///
/// - [`AttachDecodeError::Malformed`] if `data` is not a property list
/// - [`AttachDecodeError::MissingEntities`] without a `system-entities` array
/// - [`AttachDecodeError::TypeMismatch`] for a present value of the wrong type
/// - [`AttachDecodeError::MissingDevice`] if the match has no `dev-entry`
/// - [`AttachDecodeError::NoMountableVolume`] if nothing matches
pub fn decode(data: &[u8], kinds: &[VolumeKind]) -> Result<AttachResult, AttachDecodeError> {
    let root = Value::from_reader(Cursor::new(data)).map_err(|e| AttachDecodeError::Malformed {
        message: e.to_string(),
    })?;
    let root = root
        .as_dictionary()
        .ok_or_else(|| mismatch("root".to_string(), "dictionary"))?;

    let already_mounted =
        optional_bool(root, MOUNTED_KEY, || MOUNTED_KEY.to_string())?.unwrap_or(false);

    let entities = root
        .get(ENTITIES_KEY)
        .ok_or(AttachDecodeError::MissingEntities)?
        .as_array()
        .ok_or_else(|| mismatch(ENTITIES_KEY.to_string(), "array"))?;

    for (index, entity) in entities.iter().enumerate() {
        let at = |key: &str| format!("{ENTITIES_KEY}[{index}].{key}");
        let entity = entity
            .as_dictionary()
            .ok_or_else(|| mismatch(format!("{ENTITIES_KEY}[{index}]"), "dictionary"))?;

        let mountable =
            optional_bool(entity, MOUNTABLE_KEY, || at(MOUNTABLE_KEY))?.unwrap_or(false);
        let volume_kind =
            optional_string(entity, VOLUME_KIND_KEY, || at(VOLUME_KIND_KEY))?.unwrap_or("");

        let Some(kind) = kinds.iter().copied().find(|k| k.as_str() == volume_kind) else {
            continue;
        };
        if !mountable {
            continue;
        }

        let device = optional_string(entity, DEVICE_KEY, || at(DEVICE_KEY))?
            .ok_or(AttachDecodeError::MissingDevice { index })?;

        tracing::debug!(index, device, %kind, already_mounted, "Selected mountable volume");
        return Ok(AttachResult {
            device: device.to_string(),
            kind,
            already_mounted,
        });
    }

    Err(AttachDecodeError::NoMountableVolume)
}

fn mismatch(path: String, expected: &'static str) -> AttachDecodeError {
    AttachDecodeError::TypeMismatch { path, expected }
}

fn optional_bool(
    dict: &Dictionary,
    key: &str,
    path: impl FnOnce() -> String,
) -> Result<Option<bool>, AttachDecodeError> {
    dict.get(key)
        .map(|value| value.as_boolean().ok_or_else(|| mismatch(path(), "boolean")))
        .transpose()
}

fn optional_string<'a>(
    dict: &'a Dictionary,
    key: &str,
    path: impl FnOnce() -> String,
) -> Result<Option<&'a str>, AttachDecodeError> {
    dict.get(key)
        .map(|value| value.as_string().ok_or_else(|| mismatch(path(), "string")))
        .transpose()
}

/// Attach the image without mounting it and select its mountable volume.
///
/// # Errors
///
/// - [`DmountError::Spawn`] if `hdiutil` cannot be started
/// - [`DmountError::AttachFailed`] on a non-zero status or empty output
/// - [`DmountError::Decode`] if the output has no usable volume
pub fn attach<R: ToolRunner + ?Sized>(
    runner: &mut R,
    tools: &ToolPaths,
    image: &ImageEntry,
) -> DmountResult<AttachResult> {
    let invocation = Invocation::new(&tools.hdiutil)
        .arg("attach")
        .arg(&image.path)
        .arg("-plist")
        .arg("-nomount")
        .arg("-noverify")
        .arg("-noautofsck")
        .captured();

    let outcome = runner.run(&invocation)?;
    if !outcome.success() || outcome.output().is_empty() {
        tracing::error!(
            image = %image.path.display(),
            status = outcome.status,
            "Attaching the disk image failed"
        );
        return Err(DmountError::AttachFailed {
            image: image.path.display().to_string(),
            status: outcome.status,
        });
    }

    let result = AttachResult::from_plist(outcome.output())?;
    tracing::info!(
        image = %image.path.display(),
        device = %result.device,
        kind = %result.kind,
        "Attached disk image"
    );
    Ok(result)
}
