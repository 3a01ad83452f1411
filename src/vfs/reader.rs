//! Archive reader: rebuilds a [`Tree`] from an archive's header section.

use crate::codec::{read_filetime, read_i32, read_string, read_u32};
use crate::config::VFS_MAGIC;
use crate::error::{Error, Result};
use crate::vfs::types::{FileEntry, NodeId, Tree};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::debug;

/// Read the header section of the archive at `path`.
///
/// The root directory takes `root_name`; no payloads are loaded.
pub fn load_tree(path: &Path, root_name: &str) -> Result<Tree> {
    let mut reader = BufReader::new(File::open(path)?);
    let tree = read_tree(&mut reader, root_name)?;
    debug!(
        path = %path.display(),
        files = tree.file_count(),
        dirs = tree.dir_count(),
        "loaded archive headers"
    );
    Ok(tree)
}

/// Read a full header section from `r`.
pub fn read_tree<R: Read>(r: &mut R, root_name: &str) -> Result<Tree> {
    let magic = read_u32(r)?;
    if magic != VFS_MAGIC {
        return Err(Error::InvalidMagic { found: magic });
    }

    let mut tree = Tree::new(root_name);
    let root = tree.root();
    read_directory_body(r, &mut tree, root)?;
    Ok(tree)
}

/// Read counts, file headers and subdirectories of `dir`.
///
/// Header order is subdir count then file count, but the entries follow
/// files first.
fn read_directory_body<R: Read>(r: &mut R, tree: &mut Tree, dir: NodeId) -> Result<()> {
    let num_subdirs = read_i32(r)?;
    let num_files = read_i32(r)?;

    for _ in 0..num_files {
        read_file_header(r, tree, dir)?;
    }

    for _ in 0..num_subdirs {
        let name = read_string(r)?;
        let subdir = tree.add_dir(dir, name)?;
        read_directory_body(r, tree, subdir)?;
    }

    Ok(())
}

fn read_file_header<R: Read>(r: &mut R, tree: &mut Tree, dir: NodeId) -> Result<NodeId> {
    let name = read_string(r)?;
    let size = read_u32(r)?;
    let offset = read_u32(r)?;
    let modified = read_filetime(r)?;

    tree.add_file(dir, name, FileEntry::on_disk(size, modified, offset))
}
