//! Filesystem check and repair of an attached volume.
//!
//! The stage is a small state machine: an already mounted volume is
//! skipped, otherwise `fsck_<kind>` runs and a failed check escalates to a
//! single `diskutil` repair. A failed repair is logged and tolerated; the
//! automounter still receives the device.

use serde::Deserialize;

use dmount_common::{DmountResult, ToolPaths};

use crate::attach::AttachResult;
use crate::registry::ImageEntry;
use crate::tool::{Invocation, ToolRunner};

/// What `diskutil` repairs after a failed check.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepairScope {
    /// `diskutil repairDisk`: the whole disk including its partition map.
    #[default]
    Disk,
    /// `diskutil repairVolume`: only the selected volume.
    Volume,
}

impl RepairScope {
    /// `diskutil` verb.
    #[must_use]
    pub const fn verb(self) -> &'static str {
        match self {
            Self::Disk => "repairDisk",
            Self::Volume => "repairVolume",
        }
    }
}

/// Verification settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VerifyOptions {
    /// Skip check and repair when the attach result reports a mounted volume.
    pub skip_if_mounted: bool,
    /// Repair scope after a failed check.
    pub repair: RepairScope,
}

/// Terminal state of the verification stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Volume already mounted; nothing was run.
    Skipped,
    /// The check passed.
    Clean,
    /// The check failed and the repair succeeded.
    Repaired,
    /// The check failed and so did the repair.
    RepairFailed {
        /// Exit status of the repair process.
        status: i32,
    },
}

/// Check the attached volume and repair it if the check fails.
///
/// # Errors
///
/// Returns [`dmount_common::DmountError::Spawn`] if the checker or
/// `diskutil` cannot be started. Tool exit statuses never fail the stage.
pub fn check_and_repair<R: ToolRunner + ?Sized>(
    runner: &mut R,
    tools: &ToolPaths,
    options: &VerifyOptions,
    image: &ImageEntry,
    attached: &AttachResult,
) -> DmountResult<Verdict> {
    if options.skip_if_mounted && attached.already_mounted {
        tracing::debug!(device = %attached.device, "Volume already mounted, skipping check");
        return Ok(Verdict::Skipped);
    }

    let status = check(runner, tools, attached)?;
    if status == 0 {
        return Ok(Verdict::Clean);
    }

    tracing::warn!(
        image = %image.path.display(),
        status,
        "The file system in the disk image needs repair"
    );
    repair(runner, tools, options.repair, attached)
}

fn check<R: ToolRunner + ?Sized>(
    runner: &mut R,
    tools: &ToolPaths,
    attached: &AttachResult,
) -> DmountResult<i32> {
    let invocation = Invocation::new(tools.fsck(attached.kind.as_str()))
        .arg("-q")
        .arg(&attached.device);
    Ok(runner.run(&invocation)?.status)
}

fn repair<R: ToolRunner + ?Sized>(
    runner: &mut R,
    tools: &ToolPaths,
    scope: RepairScope,
    attached: &AttachResult,
) -> DmountResult<Verdict> {
    let invocation = Invocation::new(&tools.diskutil)
        .arg(scope.verb())
        .arg(&attached.device);
    let outcome = runner.run(&invocation)?;

    if outcome.success() {
        tracing::info!(device = %attached.device, "Repaired file system");
        Ok(Verdict::Repaired)
    } else {
        tracing::error!(
            device = %attached.device,
            status = outcome.status,
            "The file system could not be repaired"
        );
        Ok(Verdict::RepairFailed {
            status: outcome.status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attach::VolumeKind;
    use crate::testing::ScriptedRunner;
    use crate::tool::ProcessOutcome;
    use dmount_common::DmountError;

    fn image() -> ImageEntry {
        ImageEntry::new("VM", "/images/vm.sparsebundle")
    }

    fn attached(kind: VolumeKind, already_mounted: bool) -> AttachResult {
        AttachResult {
            device: "/dev/disk5s1".to_string(),
            kind,
            already_mounted,
        }
    }

    fn tools() -> ToolPaths {
        ToolPaths {
            hdiutil: "/usr/bin/hdiutil".into(),
            diskutil: "/usr/sbin/diskutil".into(),
            fsck_dir: "/sbin".into(),
        }
    }

    #[test]
    fn clean_check_never_repairs() {
        let mut runner = ScriptedRunner::new().respond(ProcessOutcome::status(0));
        let verdict = check_and_repair(
            &mut runner,
            &tools(),
            &VerifyOptions::default(),
            &image(),
            &attached(VolumeKind::Apfs, false),
        )
        .unwrap();

        assert_eq!(verdict, Verdict::Clean);
        assert_eq!(
            runner.calls(),
            vec![vec!["/sbin/fsck_apfs", "-q", "/dev/disk5s1"]]
        );
    }

    #[test_log::test]
    fn failed_check_repairs_once() {
        let mut runner = ScriptedRunner::new()
            .respond(ProcessOutcome::status(8))
            .respond(ProcessOutcome::status(0));
        let verdict = check_and_repair(
            &mut runner,
            &tools(),
            &VerifyOptions::default(),
            &image(),
            &attached(VolumeKind::Hfs, false),
        )
        .unwrap();

        assert_eq!(verdict, Verdict::Repaired);
        assert_eq!(
            runner.calls(),
            vec![
                vec!["/sbin/fsck_hfs", "-q", "/dev/disk5s1"],
                vec!["/usr/sbin/diskutil", "repairDisk", "/dev/disk5s1"],
            ]
        );
    }

    #[test_log::test]
    fn failed_repair_is_tolerated() {
        let mut runner = ScriptedRunner::new()
            .respond(ProcessOutcome::status(8))
            .respond(ProcessOutcome::status(1));
        let verdict = check_and_repair(
            &mut runner,
            &tools(),
            &VerifyOptions::default(),
            &image(),
            &attached(VolumeKind::Apfs, false),
        )
        .unwrap();

        assert_eq!(verdict, Verdict::RepairFailed { status: 1 });
        assert_eq!(runner.calls().len(), 2);
    }

    #[test]
    fn volume_scope_repairs_volume() {
        let mut runner = ScriptedRunner::new()
            .respond(ProcessOutcome::status(8))
            .respond(ProcessOutcome::status(0));
        let options = VerifyOptions {
            repair: RepairScope::Volume,
            ..VerifyOptions::default()
        };
        check_and_repair(
            &mut runner,
            &tools(),
            &options,
            &image(),
            &attached(VolumeKind::Apfs, false),
        )
        .unwrap();

        assert_eq!(
            runner.calls()[1],
            vec!["/usr/sbin/diskutil", "repairVolume", "/dev/disk5s1"]
        );
    }

    #[test]
    fn mounted_volume_is_skipped() {
        let mut runner = ScriptedRunner::new();
        let options = VerifyOptions {
            skip_if_mounted: true,
            ..VerifyOptions::default()
        };
        let verdict = check_and_repair(
            &mut runner,
            &tools(),
            &options,
            &image(),
            &attached(VolumeKind::Apfs, true),
        )
        .unwrap();

        assert_eq!(verdict, Verdict::Skipped);
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn mounted_flag_ignored_without_skip() {
        let mut runner = ScriptedRunner::new().respond(ProcessOutcome::status(0));
        let verdict = check_and_repair(
            &mut runner,
            &tools(),
            &VerifyOptions::default(),
            &image(),
            &attached(VolumeKind::Apfs, true),
        )
        .unwrap();

        assert_eq!(verdict, Verdict::Clean);
        assert_eq!(runner.calls().len(), 1);
    }

    #[test]
    fn checker_spawn_failure_is_fatal() {
        let mut runner = ScriptedRunner::new().fail_spawn();
        let err = check_and_repair(
            &mut runner,
            &tools(),
            &VerifyOptions::default(),
            &image(),
            &attached(VolumeKind::Apfs, false),
        )
        .unwrap_err();

        assert!(matches!(err, DmountError::Spawn { ref tool, .. } if tool == "/sbin/fsck_apfs"));
    }

    #[test]
    fn repair_spawn_failure_is_fatal() {
        let mut runner = ScriptedRunner::new()
            .respond(ProcessOutcome::status(8))
            .fail_spawn();
        let err = check_and_repair(
            &mut runner,
            &tools(),
            &VerifyOptions::default(),
            &image(),
            &attached(VolumeKind::Apfs, false),
        )
        .unwrap_err();

        assert!(matches!(err, DmountError::Spawn { ref tool, .. } if tool == "/usr/sbin/diskutil"));
        assert_eq!(err.exit_code(), dmount_common::exit::EX_OSERR);
    }
}
