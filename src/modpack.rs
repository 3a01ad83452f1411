//! Mod packages: zip files whose contents are merged into archives.
//!
//! A mod's top-level directories are named after the archives they patch,
//! e.g. `Textures/units/tank.dds` targets `Textures.vfs`.

use crate::codec::FileTime;
use crate::error::{Error, Result};
use crate::vfs::{FileEntry, NodeId, Tree, VfsPath};
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;
use tracing::debug;
use zip::ZipArchive;

/// Name of a mod tree's root directory.
pub const MOD_ROOT_NAME: &str = "mod";

/// A mod loaded fully into memory.
#[derive(Debug, Clone)]
pub struct ModPackage {
    name: String,
    tree: Tree,
}

impl ModPackage {
    /// Load a zip file. The mod is named after the file stem.
    pub fn open(path: &Path) -> Result<Self> {
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .ok_or_else(|| Error::InvalidPath(path.display().to_string()))?;
        let reader = BufReader::new(File::open(path)?);
        Self::from_reader(name, reader)
    }

    /// Load a zip from any seekable reader.
    pub fn from_reader<R: Read + Seek>(name: impl Into<String>, reader: R) -> Result<Self> {
        let name = name.into();
        let mut zip = ZipArchive::new(reader)?;
        let mut tree = Tree::new(MOD_ROOT_NAME);
        let root = tree.root();
        let loaded_at = FileTime::now();

        for i in 0..zip.len() {
            let mut entry = zip.by_index(i)?;
            let entry_path = VfsPath::parse(entry.name())?;
            let Some((dirs, file_name)) = entry_path.split_last() else {
                continue;
            };

            if entry.is_dir() {
                tree.ensure_dir(root, entry_path.components())?;
                continue;
            }

            let parent = tree.ensure_dir(root, dirs)?;
            let file_name = file_name.to_string();

            // The declared size is untrusted; let the buffer grow as data arrives.
            let mut data = Vec::new();
            entry.read_to_end(&mut data)?;
            let file = FileEntry::in_memory(data, loaded_at)?;

            match tree.child(parent, &file_name) {
                Some(existing) => match tree.get_mut(existing).and_then(|n| n.file_mut()) {
                    Some(slot) => *slot = file,
                    None => {
                        return Err(Error::TypeMismatch {
                            path: entry_path.to_string(),
                        })
                    }
                },
                None => {
                    tree.add_file(parent, file_name, file)?;
                }
            }
        }

        debug!(
            package = %name,
            files = tree.file_count(),
            bytes = tree.total_size(),
            "loaded mod package"
        );
        Ok(Self { name, tree })
    }

    /// Name of the package, usually the zip's file stem.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The package contents.
    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    /// Root directory of the package tree.
    pub fn root(&self) -> NodeId {
        self.tree.root()
    }

    /// The top-level directory called `name`, if the mod has one.
    pub fn get_subtree(&self, name: &str) -> Option<NodeId> {
        self.tree
            .child(self.tree.root(), name)
            .filter(|&id| self.tree[id].is_directory())
    }

    /// Names of the archives this mod has content for.
    pub fn targets(&self) -> Vec<&str> {
        self.tree
            .children(self.tree.root())
            .iter()
            .filter(|&&id| self.tree[id].is_directory())
            .map(|&id| self.tree[id].name.as_str())
            .collect()
    }

    /// Merge another mod into this one.
    pub fn merge(&mut self, other: &ModPackage, overwrite: bool) -> Result<()> {
        let grafted = self.tree.graft(&other.tree, other.root())?;
        let root = self.tree.root();
        let result = self.tree.merge(root, grafted, overwrite);
        self.tree.remove_subtree(grafted);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use zip::write::FileOptions;
    use zip::{CompressionMethod, ZipWriter};

    fn build_zip(entries: &[(&str, Option<&str>)]) -> Vec<u8> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = FileOptions::default().compression_method(CompressionMethod::Stored);
        for (name, data) in entries {
            match data {
                Some(bytes) => {
                    zip.start_file(*name, options).unwrap();
                    zip.write_all(bytes.as_bytes()).unwrap();
                }
                None => zip.add_directory(*name, options).unwrap(),
            }
        }
        zip.finish().unwrap().into_inner()
    }

    fn size_at(package: &ModPackage, path: &str) -> Option<u32> {
        let id = package
            .tree()
            .lookup(package.root(), &VfsPath::parse(path).unwrap())?;
        package.tree()[id].file().map(|f| f.size)
    }

    #[test]
    fn test_load_zip() {
        let bytes = build_zip(&[
            ("Textures/", None),
            ("Textures/units/", None),
            ("Textures/units/tank.dds", Some("tankdata")),
            ("Sounds/boom.wav", Some("boom")),
        ]);

        let package = ModPackage::from_reader("Clara", Cursor::new(bytes)).unwrap();
        assert_eq!(package.name(), "Clara");
        assert_eq!(package.tree()[package.root()].name, MOD_ROOT_NAME);
        assert_eq!(size_at(&package, "Textures/units/tank.dds"), Some(8));
        // Missing directory entries are created implicitly.
        assert_eq!(size_at(&package, "Sounds/boom.wav"), Some(4));
        assert_eq!(package.targets(), ["Textures", "Sounds"]);

        let id = package
            .tree()
            .lookup(package.root(), &VfsPath::parse("Sounds/boom.wav").unwrap())
            .unwrap();
        assert_eq!(
            package.tree()[id].file().unwrap().data.as_deref(),
            Some(&b"boom"[..])
        );
    }

    #[test]
    fn test_get_subtree() {
        let bytes = build_zip(&[("Textures/a.dds", Some("a")), ("loose.txt", Some("l"))]);
        let package = ModPackage::from_reader("m", Cursor::new(bytes)).unwrap();

        let sub = package.get_subtree("Textures").unwrap();
        assert_eq!(package.tree()[sub].name, "Textures");
        assert!(package.get_subtree("Sounds").is_none());
        // Files are not subtrees.
        assert!(package.get_subtree("loose.txt").is_none());
    }

    #[test]
    fn test_merge_packages() {
        let first = build_zip(&[("Textures/a.dds", Some("first"))]);
        let second = build_zip(&[
            ("Textures/a.dds", Some("second!")),
            ("Textures/b.dds", Some("b")),
        ]);
        let mut base = ModPackage::from_reader("one", Cursor::new(first)).unwrap();
        let other = ModPackage::from_reader("two", Cursor::new(second)).unwrap();

        base.merge(&other, true).unwrap();
        assert_eq!(size_at(&base, "Textures/a.dds"), Some(7));
        assert_eq!(size_at(&base, "Textures/b.dds"), Some(1));
    }

    #[test]
    fn test_declared_size_is_not_trusted() {
        let mut bytes = build_zip(&[("Textures/a.dds", Some("abc"))]);
        // Claim an uncompressed size of 2 GiB in both headers.
        for (signature, field) in [(b"PK\x03\x04", 22), (b"PK\x01\x02", 24)] {
            let at = bytes
                .windows(4)
                .position(|w| w == &signature[..])
                .unwrap();
            bytes[at + field..at + field + 4].copy_from_slice(&0x7FFF_FFFFu32.to_le_bytes());
        }

        let package = ModPackage::from_reader("big", Cursor::new(bytes)).unwrap();
        assert_eq!(size_at(&package, "Textures/a.dds"), Some(3));
    }

    #[test]
    fn test_invalid_zip() {
        let result = ModPackage::from_reader("bad", Cursor::new(b"not a zip".to_vec()));
        assert!(matches!(result, Err(Error::Zip(_))));
    }
}
