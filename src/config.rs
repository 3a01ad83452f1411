//! Format constants and runtime configuration for the patcher.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Root directory magic number ("LP1C" little-endian).
pub const VFS_MAGIC: u32 = 0x4331_504C;

/// Header bytes of the root directory: magic + subdir count + file count.
pub const ROOT_HEADER_LEN: u64 = 12;

/// Fixed header bytes of a non-root directory, excluding the name.
///
/// One length byte plus two 32-bit counts.
pub const DIR_HEADER_FIXED_LEN: u64 = 9;

/// Fixed header bytes of a file, excluding the name.
///
/// One length byte, size, offset and an 8-byte timestamp.
pub const FILE_HEADER_FIXED_LEN: u64 = 17;

/// Longest name a header can carry (one-byte length prefix).
pub const MAX_NAME_LEN: usize = 255;

/// 100ns intervals between 1601-01-01 and 1970-01-01.
pub const FILETIME_UNIX_EPOCH_DELTA: i64 = 116_444_736_000_000_000;

/// 100ns intervals per second.
pub const FILETIME_TICKS_PER_SECOND: i64 = 10_000_000;

/// Suffix appended to an archive's file name to form its backup.
pub const DEFAULT_BACKUP_SUFFIX: &str = ".bak";

/// Extension of archive files when scanning a directory.
pub const DEFAULT_ARCHIVE_EXTENSION: &str = "vfs";

/// What the writer does when the output stream is behind a file's offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum GapPolicy {
    /// Abort the save with a layout error.
    #[default]
    Error,
    /// Pad the gap with zero bytes and log a warning.
    ZeroFill,
}

/// Configuration for loading, patching and saving archives.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PatchConfig {
    /// Suffix for the one-time backup of the original archive.
    pub backup_suffix: String,

    /// Whether mod files replace files already present at the same path.
    pub overwrite: bool,

    /// Handling of gaps between the write position and assigned offsets.
    pub gap_policy: GapPolicy,

    /// Extension used to recognise archives in a directory.
    pub archive_extension: String,
}

impl Default for PatchConfig {
    fn default() -> Self {
        Self {
            backup_suffix: DEFAULT_BACKUP_SUFFIX.to_string(),
            overwrite: true,
            gap_policy: GapPolicy::Error,
            archive_extension: DEFAULT_ARCHIVE_EXTENSION.to_string(),
        }
    }
}

impl PatchConfig {
    /// Load a configuration from a JSON file and validate it.
    ///
    /// Missing fields fall back to their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: PatchConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.backup_suffix.is_empty() {
            return Err(Error::Config(
                "Backup suffix must not be empty".to_string(),
            ));
        }
        if self.backup_suffix.contains(['/', '\\']) {
            return Err(Error::Config(format!(
                "Backup suffix must not contain path separators: {}",
                self.backup_suffix
            )));
        }
        if self.archive_extension.is_empty() || self.archive_extension.starts_with('.') {
            return Err(Error::Config(format!(
                "Archive extension must be non-empty and given without a dot: {:?}",
                self.archive_extension
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_is_valid() {
        let config = PatchConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.overwrite);
        assert_eq!(config.gap_policy, GapPolicy::Error);
    }

    #[test]
    fn test_rejects_bad_suffix() {
        let config = PatchConfig {
            backup_suffix: "/bak".to_string(),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let config = PatchConfig {
            backup_suffix: String::new(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_partial_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("patcher.json");
        std::fs::write(&path, r#"{ "overwrite": false, "gap_policy": "zero_fill" }"#).unwrap();

        let config = PatchConfig::load(&path).unwrap();
        assert!(!config.overwrite);
        assert_eq!(config.gap_policy, GapPolicy::ZeroFill);
        assert_eq!(config.backup_suffix, DEFAULT_BACKUP_SUFFIX);
    }

    #[test]
    fn test_magic_bytes() {
        assert_eq!(&VFS_MAGIC.to_le_bytes(), b"LP1C");
    }
}
