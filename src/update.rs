//! Applying mod packages to archives on disk.

use crate::config::PatchConfig;
use crate::error::{Error, Result};
use crate::modpack::ModPackage;
use crate::vfs::{SaveReport, VfsArchive};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

/// Outcome of patching one archive.
#[derive(Debug, Clone)]
pub struct ArchiveUpdate {
    /// Archive file that was rewritten.
    pub path: PathBuf,
    /// Names of the mods that had content for it, in application order.
    pub mods: Vec<String>,
    pub report: SaveReport,
}

/// Archives directly inside `dir` whose extension matches, sorted by name.
///
/// The extension is compared case-insensitively.
pub fn find_archives(dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    let mut archives = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry.map_err(io::Error::from)?;
        let path = entry.path();
        if entry.file_type().is_file()
            && path
                .extension()
                .is_some_and(|e| e.eq_ignore_ascii_case(extension))
        {
            archives.push(path.to_path_buf());
        }
    }
    Ok(archives)
}

/// Apply `packages` in order to the pristine contents of the archive at
/// `path` and save it.
///
/// Returns `None`, without opening the archive, when no package has content
/// for it.
pub fn apply_mods(
    path: &Path,
    packages: &[ModPackage],
    config: &PatchConfig,
) -> Result<Option<ArchiveUpdate>> {
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .ok_or_else(|| Error::InvalidPath(path.display().to_string()))?;
    let targeted: Vec<&ModPackage> = packages
        .iter()
        .filter(|p| p.get_subtree(&name).is_some())
        .collect();
    if targeted.is_empty() {
        debug!(archive = %path.display(), "no mod targets archive");
        return Ok(None);
    }

    let mut archive = VfsArchive::open_pristine(path, config.clone())?;
    for package in &targeted {
        archive.add_mod(package)?;
    }
    let report = archive.save()?;

    Ok(Some(ArchiveUpdate {
        path: path.to_path_buf(),
        mods: targeted.iter().map(|p| p.name().to_string()).collect(),
        report,
    }))
}

/// Apply `packages` to every archive in `dir`.
///
/// Only archives that some package targets are rewritten.
pub fn update_directory(
    dir: &Path,
    packages: &[ModPackage],
    config: &PatchConfig,
) -> Result<Vec<ArchiveUpdate>> {
    let mut updated = Vec::new();
    for path in find_archives(dir, &config.archive_extension)? {
        if let Some(update) = apply_mods(&path, packages, config)? {
            updated.push(update);
        }
    }
    info!(dir = %dir.display(), archives = updated.len(), "updated directory");
    Ok(updated)
}
