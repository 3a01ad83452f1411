//! VFS archive handle - the main interface.

use crate::codec::FileTime;
use crate::config::PatchConfig;
use crate::error::{Error, Result};
use crate::modpack::ModPackage;
use crate::vfs::path::VfsPath;
use crate::vfs::reader::load_tree;
use crate::vfs::types::{DirEntry, FileEntry, NodeId, Tree};
use crate::vfs::writer::{
    header_length, plan_layout, write_headers, write_payloads, ArchiveFileSource, CountingWriter,
    PayloadSource, SaveReport,
};
use std::ffi::OsString;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Summary of an archive's contents.
#[derive(Debug, Clone)]
pub struct ArchiveInfo {
    pub name: String,
    pub path: PathBuf,
    pub file_count: usize,
    pub dir_count: usize,
    pub total_file_size: u64,
    pub header_length: u64,
    pub has_backup: bool,
}

/// An archive on disk together with its in-memory tree.
///
/// Files without in-memory data are read from `source`, the file the
/// headers were loaded from.
pub struct VfsArchive {
    /// Path of the archive file.
    path: PathBuf,
    /// Base file name; also the name of the root directory.
    name: String,
    /// Directory tree.
    tree: Tree,
    /// File the tree's old offsets refer to.
    source: PathBuf,
    config: PatchConfig,
}

impl VfsArchive {
    /// Open an archive and load its headers from the file at `path`.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the `.vfs` file
    /// * `config` - Patch configuration
    pub fn open(path: &Path, config: PatchConfig) -> Result<Self> {
        Self::load(path, path.to_path_buf(), config)
    }

    /// Open an archive as it was before it was first patched.
    ///
    /// Headers come from the backup when one exists, so mods applied to the
    /// result replace earlier patches instead of stacking on them. Without a
    /// backup this is the same as [`VfsArchive::open`].
    pub fn open_pristine(path: &Path, config: PatchConfig) -> Result<Self> {
        let backup = backup_path_for(path, &config.backup_suffix);
        if backup.exists() {
            debug!(backup = %backup.display(), "reading headers from existing backup");
            Self::load(path, backup, config)
        } else {
            Self::open(path, config)
        }
    }

    fn load(path: &Path, source: PathBuf, config: PatchConfig) -> Result<Self> {
        config.validate()?;

        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .ok_or_else(|| Error::InvalidPath(path.display().to_string()))?;

        let tree = load_tree(&source, &name)?;
        info!(
            archive = %path.display(),
            source = %source.display(),
            files = tree.file_count(),
            "opened archive"
        );

        Ok(Self {
            path: path.to_path_buf(),
            name,
            tree,
            source,
            config,
        })
    }

    /// Archive name, the file stem.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Path of the archive file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The directory tree.
    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    /// Mutable access to the directory tree.
    pub fn tree_mut(&mut self) -> &mut Tree {
        &mut self.tree
    }

    /// Configuration the archive was opened with.
    pub fn config(&self) -> &PatchConfig {
        &self.config
    }

    /// Path of the one-time backup: the archive file name plus the suffix.
    pub fn backup_path(&self) -> PathBuf {
        backup_path_for(&self.path, &self.config.backup_suffix)
    }

    /// Check if the backup file exists.
    pub fn has_backup(&self) -> bool {
        self.backup_path().exists()
    }

    /// Merge the subtree at `from` in `other` into the root of this archive.
    ///
    /// On error the archive tree is unchanged.
    pub fn merge_tree(&mut self, other: &Tree, from: NodeId, overwrite: bool) -> Result<()> {
        let grafted = self.tree.graft(other, from)?;
        let root = self.tree.root();
        let result = self.tree.merge(root, grafted, overwrite);
        self.tree.remove_subtree(grafted);
        result
    }

    /// Apply the part of a mod addressed to this archive.
    ///
    /// Returns `false` when the mod has nothing for this archive.
    pub fn add_mod(&mut self, package: &ModPackage) -> Result<bool> {
        let Some(subtree) = package.get_subtree(&self.name) else {
            debug!(package = package.name(), archive = %self.name, "mod has no content for archive");
            return Ok(false);
        };
        self.merge_tree(package.tree(), subtree, self.config.overwrite)?;
        info!(package = package.name(), archive = %self.name, "applied mod");
        Ok(true)
    }

    fn resolve(&self, path: &str) -> Result<(VfsPath, NodeId)> {
        let vfs_path = VfsPath::parse(path)?;
        let id = self
            .tree
            .lookup(self.tree.root(), &vfs_path)
            .ok_or_else(|| Error::PathNotFound(vfs_path.to_string()))?;
        Ok((vfs_path, id))
    }

    /// Resolve the parent directory of `vfs_path` for a mutation.
    fn parent_dir(&self, vfs_path: &VfsPath) -> Result<NodeId> {
        let parent_path = vfs_path
            .parent()
            .ok_or_else(|| Error::InvalidPath("Cannot modify the root directory".to_string()))?;
        let parent = self
            .tree
            .lookup(self.tree.root(), &parent_path)
            .ok_or_else(|| Error::PathNotFound(parent_path.to_string()))?;
        if !self.tree[parent].is_directory() {
            return Err(Error::NotADirectory(parent_path.to_string()));
        }
        Ok(parent)
    }

    /// Read a file's payload from memory or from the archive on disk.
    pub fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let (vfs_path, id) = self.resolve(path)?;
        let entry = self.tree[id]
            .file()
            .ok_or_else(|| Error::NotAFile(vfs_path.to_string()))?;

        if let Some(data) = &entry.data {
            return Ok(data.clone());
        }
        let old_offset = entry
            .old_offset
            .ok_or_else(|| Error::MissingPayload(vfs_path.to_string()))?;
        let data = ArchiveFileSource::new(&self.source).read_payload(old_offset, entry.size)?;
        if data.len() != entry.size as usize {
            let mismatch = Error::PayloadSizeMismatch {
                path: vfs_path.to_string(),
                declared: entry.size,
                actual: data.len(),
            };
            warn!("{}", mismatch);
        }
        Ok(data)
    }

    /// Create or replace a file with in-memory contents.
    ///
    /// The parent directory must already exist.
    pub fn write_file(&mut self, path: &str, data: Vec<u8>) -> Result<NodeId> {
        let vfs_path = VfsPath::parse(path)?;
        let parent = self.parent_dir(&vfs_path)?;
        let name = vfs_path.name().unwrap_or_default();

        match self.tree.child(parent, name) {
            Some(id) => {
                let node = self
                    .tree
                    .get_mut(id)
                    .ok_or_else(|| Error::PathNotFound(vfs_path.to_string()))?;
                let entry = node
                    .file_mut()
                    .ok_or_else(|| Error::NotAFile(vfs_path.to_string()))?;
                let replacement = FileEntry::in_memory(data, FileTime::now())?;
                entry.size = replacement.size;
                entry.modified = replacement.modified;
                entry.data = replacement.data;
                Ok(id)
            }
            None => {
                let entry = FileEntry::in_memory(data, FileTime::now())?;
                self.tree.add_file(parent, name, entry)
            }
        }
    }

    /// Create a directory. The parent must already exist.
    pub fn make_directory(&mut self, path: &str) -> Result<NodeId> {
        let vfs_path = VfsPath::parse(path)?;
        let parent = self.parent_dir(&vfs_path)?;
        let name = vfs_path.name().unwrap_or_default();

        if self.tree.child(parent, name).is_some() {
            return Err(Error::PathExists(vfs_path.to_string()));
        }
        self.tree.add_dir(parent, name)
    }

    /// Remove a file or a directory with everything below it.
    pub fn remove(&mut self, path: &str) -> Result<()> {
        let (vfs_path, id) = self.resolve(path)?;
        if vfs_path.is_root() {
            return Err(Error::InvalidPath("Cannot remove the root directory".to_string()));
        }
        self.tree.remove_subtree(id);
        Ok(())
    }

    /// List directory contents, sorted by name.
    pub fn list_dir(&self, path: &str) -> Result<Vec<DirEntry>> {
        let (vfs_path, id) = self.resolve(path)?;
        if !self.tree[id].is_directory() {
            return Err(Error::NotADirectory(vfs_path.to_string()));
        }

        let mut entries: Vec<DirEntry> = self
            .tree
            .children(id)
            .iter()
            .map(|&c| DirEntry::from_node(&self.tree[c]))
            .collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    /// Length of the header section for the current tree.
    pub fn header_length(&self) -> u64 {
        header_length(&self.tree, self.tree.root())
    }

    /// Get archive info.
    pub fn info(&self) -> ArchiveInfo {
        ArchiveInfo {
            name: self.name.clone(),
            path: self.path.clone(),
            file_count: self.tree.file_count(),
            dir_count: self.tree.dir_count(),
            total_file_size: self.tree.total_size(),
            header_length: self.header_length(),
            has_backup: self.has_backup(),
        }
    }

    /// Indented rendering of the tree, one line per node.
    pub fn render_tree(&self) -> Vec<String> {
        let mut lines = vec![self.name.clone()];
        self.render_children(self.tree.root(), "", &mut lines);
        lines
    }

    fn render_children(&self, dir: NodeId, prefix: &str, lines: &mut Vec<String>) {
        let children = self.tree.children(dir);
        for (i, &child) in children.iter().enumerate() {
            let last = i + 1 == children.len();
            let (branch, fill) = if last { ("└── ", "    ") } else { ("├── ", "│   ") };
            lines.push(format!("{}{}{}", prefix, branch, self.tree[child].name));
            self.render_children(child, &format!("{}{}", prefix, fill), lines);
        }
    }

    /// Rewrite the archive file from the current tree.
    ///
    /// The first save renames the original archive to its backup; later
    /// saves leave the backup alone. Files without in-memory data are copied
    /// from the file the headers were loaded from. When that is the archive
    /// itself, the new contents go to a sibling temporary file that replaces
    /// the archive once complete. Nothing on disk changes if the tree cannot
    /// be laid out.
    pub fn save(&mut self) -> Result<SaveReport> {
        let header_len = plan_layout(&self.tree)?;

        let backup = self.backup_path();
        if !backup.exists() {
            std::fs::rename(&self.path, &backup)?;
            info!(backup = %backup.display(), "created backup of original archive");
            if self.source == self.path {
                self.source = backup.clone();
            }
        }

        let in_place = self.source == self.path;
        let target = if in_place {
            sibling_path(&self.path, ".tmp")
        } else {
            self.path.clone()
        };

        let report = match self.write_to(&target, header_len) {
            Ok(report) => report,
            Err(e) => {
                if in_place {
                    let _ = std::fs::remove_file(&target);
                }
                return Err(e);
            }
        };
        if in_place {
            std::fs::rename(&target, &self.path)?;
        }

        // Payloads now live at their new offsets in the rewritten archive.
        for id in self.tree.files(self.tree.root()) {
            if let Some(entry) = self.tree.get_mut(id).and_then(|n| n.file_mut()) {
                entry.old_offset = entry.offset;
            }
        }
        self.source = self.path.clone();

        info!(
            archive = %self.path.display(),
            files = report.files_written,
            bytes = report.total_bytes,
            mismatches = report.size_mismatches,
            "saved archive"
        );
        Ok(report)
    }

    fn write_to(&mut self, target: &Path, header_len: u64) -> Result<SaveReport> {
        let file = File::create(target)?;
        let mut w = CountingWriter::new(BufWriter::new(file));
        let end = write_headers(&mut self.tree, &mut w, header_len)?;
        debug!(header_len, end, target = %target.display(), "wrote header section");

        let mut report = SaveReport {
            header_length: header_len,
            ..Default::default()
        };
        let source = ArchiveFileSource::new(&self.source);
        write_payloads(
            &self.tree,
            &mut w,
            &source,
            self.config.gap_policy,
            &mut report,
        )?;
        w.flush()?;
        Ok(report)
    }
}

fn backup_path_for(path: &Path, suffix: &str) -> PathBuf {
    sibling_path(path, suffix)
}

/// `path` with `suffix` appended to its file name.
fn sibling_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{write_filetime, write_i32, write_string, write_u32};
    use crate::config::VFS_MAGIC;
    use tempfile::TempDir;

    /// Build `Textures.vfs`: readme.txt (12 bytes), textures/a.png (100 bytes).
    fn create_test_archive(dir: &TempDir) -> PathBuf {
        let mut buf = Vec::new();
        write_u32(&mut buf, VFS_MAGIC).unwrap();
        write_i32(&mut buf, 1).unwrap();
        write_i32(&mut buf, 1).unwrap();
        write_string(&mut buf, "readme.txt", true).unwrap();
        write_i32(&mut buf, 12).unwrap();
        write_i32(&mut buf, 78).unwrap();
        write_filetime(&mut buf, FileTime::from_unix_secs(100)).unwrap();
        write_string(&mut buf, "textures", true).unwrap();
        write_i32(&mut buf, 0).unwrap();
        write_i32(&mut buf, 1).unwrap();
        write_string(&mut buf, "a.png", true).unwrap();
        write_i32(&mut buf, 100).unwrap();
        write_i32(&mut buf, 90).unwrap();
        write_filetime(&mut buf, FileTime::from_unix_secs(200)).unwrap();
        buf.extend_from_slice(b"hello world!");
        buf.extend(std::iter::repeat(0x5A).take(100));

        let path = dir.path().join("Textures.vfs");
        std::fs::write(&path, &buf).unwrap();
        path
    }

    #[test]
    fn test_open() {
        let dir = TempDir::new().unwrap();
        let path = create_test_archive(&dir);

        let archive = VfsArchive::open(&path, PatchConfig::default()).unwrap();
        assert_eq!(archive.name(), "Textures");
        assert_eq!(archive.header_length(), 78);
        assert_eq!(archive.read_file("readme.txt").unwrap(), b"hello world!");

        let info = archive.info();
        assert_eq!(info.file_count, 2);
        assert_eq!(info.dir_count, 1);
        assert_eq!(info.total_file_size, 112);
        assert!(!info.has_backup);
    }

    #[test]
    fn test_list_dir() {
        let dir = TempDir::new().unwrap();
        let archive = VfsArchive::open(&create_test_archive(&dir), PatchConfig::default()).unwrap();

        let entries = archive.list_dir("/").unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "readme.txt");
        assert!(entries[1].is_dir);

        assert!(matches!(
            archive.list_dir("readme.txt"),
            Err(Error::NotADirectory(_))
        ));
        assert!(matches!(archive.list_dir("nope"), Err(Error::PathNotFound(_))));
    }

    #[test]
    fn test_write_and_make_directory() {
        let dir = TempDir::new().unwrap();
        let mut archive =
            VfsArchive::open(&create_test_archive(&dir), PatchConfig::default()).unwrap();

        assert!(matches!(
            archive.write_file("missing/new.txt", b"x".to_vec()),
            Err(Error::PathNotFound(_))
        ));

        archive.make_directory("docs").unwrap();
        assert!(matches!(
            archive.make_directory("docs"),
            Err(Error::PathExists(_))
        ));
        archive.write_file("docs/new.txt", b"fresh".to_vec()).unwrap();
        assert_eq!(archive.read_file("docs/new.txt").unwrap(), b"fresh");

        archive.write_file("readme.txt", b"replaced".to_vec()).unwrap();
        assert_eq!(archive.read_file("readme.txt").unwrap(), b"replaced");

        assert!(matches!(
            archive.write_file("textures", b"x".to_vec()),
            Err(Error::NotAFile(_))
        ));
    }

    #[test]
    fn test_remove() {
        let dir = TempDir::new().unwrap();
        let mut archive =
            VfsArchive::open(&create_test_archive(&dir), PatchConfig::default()).unwrap();

        archive.remove("textures").unwrap();
        assert_eq!(archive.info().file_count, 1);
        assert!(matches!(archive.remove("textures"), Err(Error::PathNotFound(_))));
        assert!(archive.remove("/").is_err());
    }

    #[test]
    fn test_render_tree() {
        let dir = TempDir::new().unwrap();
        let archive = VfsArchive::open(&create_test_archive(&dir), PatchConfig::default()).unwrap();

        assert_eq!(
            archive.render_tree(),
            [
                "Textures",
                "├── readme.txt",
                "└── textures",
                "    └── a.png"
            ]
        );
    }

    #[test]
    fn test_backup_path() {
        let dir = TempDir::new().unwrap();
        let path = create_test_archive(&dir);
        let archive = VfsArchive::open(&path, PatchConfig::default()).unwrap();
        assert_eq!(archive.backup_path(), dir.path().join("Textures.vfs.bak"));
    }

    #[test]
    fn test_save_creates_backup_once() {
        let dir = TempDir::new().unwrap();
        let path = create_test_archive(&dir);
        let original = std::fs::read(&path).unwrap();

        let mut archive = VfsArchive::open(&path, PatchConfig::default()).unwrap();
        archive.save().unwrap();
        assert_eq!(std::fs::read(archive.backup_path()).unwrap(), original);
        assert_eq!(std::fs::read(&path).unwrap(), original);

        archive.write_file("readme.txt", b"changed".to_vec()).unwrap();
        archive.save().unwrap();
        // Backup still holds the original bytes.
        assert_eq!(std::fs::read(archive.backup_path()).unwrap(), original);
        assert_ne!(std::fs::read(&path).unwrap(), original);
    }

    #[test]
    fn test_failed_plan_leaves_disk_untouched() {
        let dir = TempDir::new().unwrap();
        let path = create_test_archive(&dir);
        let mut archive = VfsArchive::open(&path, PatchConfig::default()).unwrap();

        archive.write_file("caf\u{1F600}.txt", b"x".to_vec()).unwrap();
        assert!(matches!(archive.save(), Err(Error::InvalidName(_))));
        assert!(!archive.has_backup());
        assert!(path.exists());
    }
}
