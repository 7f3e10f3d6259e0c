//! Helper configuration, read from a TOML file.
//!
//! ```toml
//! [images]
//! VM = "/Users/me/Library/VM/VM.sparsebundle"
//!
//! [tools]
//! hdiutil = "/usr/bin/hdiutil"
//!
//! [pipeline]
//! compact_probability = 0.1
//! repair = "volume"
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use dmount_common::{DmountError, DmountResult, ToolPaths};

use crate::maintenance::{DEFAULT_COMPACT_PROBABILITY, MaintenanceOptions};
use crate::pipeline::PipelineOptions;
use crate::registry::ImageRegistry;
use crate::verify::{RepairScope, VerifyOptions};

/// Top-level configuration file.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Name to image path mapping.
    pub images: BTreeMap<String, PathBuf>,
    /// Tool location overrides.
    pub tools: ToolsConfig,
    /// Stage settings.
    pub pipeline: PipelineConfig,
}

/// `[tools]` table; unset entries fall back to [`ToolPaths::default`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolsConfig {
    /// `hdiutil` binary.
    pub hdiutil: Option<PathBuf>,
    /// `diskutil` binary.
    pub diskutil: Option<PathBuf>,
    /// Directory of the `fsck_<kind>` checkers.
    pub fsck_dir: Option<PathBuf>,
}

/// `[pipeline]` table.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Probability of compacting before attach.
    pub compact_probability: f64,
    /// Pass `-quiet` to `hdiutil compact`.
    pub quiet_compact: bool,
    /// Skip check and repair for volumes reported as mounted.
    pub skip_if_mounted: bool,
    /// `disk` or `volume`.
    pub repair: RepairScope,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            compact_probability: DEFAULT_COMPACT_PROBABILITY,
            quiet_compact: false,
            skip_if_mounted: false,
            repair: RepairScope::default(),
        }
    }
}

impl Config {
    /// Load and validate a configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`DmountError::Config`] if the file cannot be read or is invalid.
    pub fn load(path: &Path) -> DmountResult<Self> {
        tracing::debug!(path = %path.display(), "Loading configuration");

        let content = std::fs::read_to_string(path).map_err(|e| DmountError::Config {
            message: format!("cannot read {}: {e}", path.display()),
        })?;
        Self::from_toml(&content).map_err(|e| match e {
            DmountError::Config { message } => DmountError::Config {
                message: format!("{}: {message}", path.display()),
            },
            other => other,
        })
    }

    /// Parse and validate configuration text.
    ///
    /// # Errors
    ///
    /// Returns [`DmountError::Config`] on a syntax error, an unknown key or
    /// an out-of-range value.
    pub fn from_toml(content: &str) -> DmountResult<Self> {
        let config: Self = toml::from_str(content).map_err(|e| DmountError::Config {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> DmountResult<()> {
        let probability = self.pipeline.compact_probability;
        if !(0.0..=1.0).contains(&probability) {
            return Err(DmountError::Config {
                message: format!("compact_probability must be within 0 and 1, got {probability}"),
            });
        }
        if let Some(name) = self.images.keys().find(|name| name.is_empty()) {
            return Err(DmountError::Config {
                message: format!("image name {name:?} is empty"),
            });
        }
        Ok(())
    }

    /// Every configured image, present on disk or not.
    #[must_use]
    pub fn registry(&self) -> ImageRegistry {
        ImageRegistry::new(self.images.clone())
    }

    /// Tool locations with defaults filled in.
    #[must_use]
    pub fn tool_paths(&self) -> ToolPaths {
        let defaults = ToolPaths::default();
        ToolPaths {
            hdiutil: self.tools.hdiutil.clone().unwrap_or(defaults.hdiutil),
            diskutil: self.tools.diskutil.clone().unwrap_or(defaults.diskutil),
            fsck_dir: self.tools.fsck_dir.clone().unwrap_or(defaults.fsck_dir),
        }
    }

    /// Stage settings.
    #[must_use]
    pub const fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            maintenance: MaintenanceOptions {
                probability: self.pipeline.compact_probability,
                quiet: self.pipeline.quiet_compact,
            },
            verify: VerifyOptions {
                skip_if_mounted: self.pipeline.skip_if_mounted,
                repair: self.pipeline.repair,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const FULL: &str = r#"
[images]
VM = "/Users/me/Library/VM/VM.sparsebundle"
Archive = "/Volumes/Data/Archive.dmg"

[tools]
hdiutil = "/opt/bin/hdiutil"
fsck_dir = "/opt/sbin"

[pipeline]
compact_probability = 0.25
quiet_compact = true
skip_if_mounted = true
repair = "volume"
"#;

    #[test]
    fn full_config() {
        let config = Config::from_toml(FULL).unwrap();

        assert_eq!(config.images.len(), 2);
        assert_eq!(
            config.registry().resolve("VM").unwrap().path,
            PathBuf::from("/Users/me/Library/VM/VM.sparsebundle")
        );

        let tools = config.tool_paths();
        assert_eq!(tools.hdiutil, PathBuf::from("/opt/bin/hdiutil"));
        assert_eq!(tools.fsck("apfs"), PathBuf::from("/opt/sbin/fsck_apfs"));
        assert_eq!(tools.diskutil, ToolPaths::default().diskutil);

        let options = config.pipeline_options();
        assert!((options.maintenance.probability - 0.25).abs() < f64::EPSILON);
        assert!(options.maintenance.quiet);
        assert!(options.verify.skip_if_mounted);
        assert_eq!(options.verify.repair, RepairScope::Volume);
    }

    #[test]
    fn empty_config_uses_defaults() {
        let config = Config::from_toml("").unwrap();
        assert!(config.registry().is_empty());
        assert_eq!(config.pipeline_options(), PipelineOptions::default());
        assert_eq!(config.tool_paths(), ToolPaths::default());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = Config::from_toml("[pipeline]\ncompact_chance = 0.5\n").unwrap_err();
        assert!(matches!(err, DmountError::Config { .. }));
    }

    #[test]
    fn probability_out_of_range() {
        let err = Config::from_toml("[pipeline]\ncompact_probability = 1.5\n").unwrap_err();
        assert!(err.to_string().contains("compact_probability"));
        assert_eq!(err.exit_code(), dmount_common::exit::EX_CONFIG);
    }

    #[test]
    fn invalid_repair_scope() {
        assert!(Config::from_toml("[pipeline]\nrepair = \"partition\"\n").is_err());
    }

    #[test]
    fn load_from_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("dmount.toml");
        std::fs::write(&path, FULL).unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.registry().len(), 2);
    }

    #[test]
    fn missing_file_is_config_error() {
        let temp = TempDir::new().unwrap();
        let err = Config::load(&temp.path().join("missing.toml")).unwrap_err();
        assert!(matches!(err, DmountError::Config { ref message } if message.contains("missing.toml")));
    }
}
