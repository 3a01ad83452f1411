//! Archive writer: header layout, offset assignment and payload streaming.

use crate::codec::{encode_latin1, write_filetime, write_i32, write_string, write_u32};
use crate::config::{
    GapPolicy, DIR_HEADER_FIXED_LEN, FILE_HEADER_FIXED_LEN, ROOT_HEADER_LEN, VFS_MAGIC,
};
use crate::error::{Error, Result};
use crate::vfs::types::{NodeId, NodeKind, Tree};
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Source of payload bytes for files that are not held in memory.
pub trait PayloadSource {
    /// Read up to `size` bytes starting at `offset`.
    ///
    /// A short result is not an error; the caller reports the mismatch.
    fn read_payload(&self, offset: u32, size: u32) -> Result<Vec<u8>>;
}

/// Payloads read from an archive file on disk.
///
/// The file is opened for each payload and closed again before returning.
#[derive(Debug, Clone)]
pub struct ArchiveFileSource {
    path: PathBuf,
}

impl ArchiveFileSource {
    /// Read payloads from the file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The file payloads are read from.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PayloadSource for ArchiveFileSource {
    fn read_payload(&self, offset: u32, size: u32) -> Result<Vec<u8>> {
        let mut file = File::open(&self.path)?;
        file.seek(SeekFrom::Start(offset as u64))?;
        let mut buf = Vec::with_capacity(size as usize);
        file.take(size as u64).read_to_end(&mut buf)?;
        Ok(buf)
    }
}

impl PayloadSource for [u8] {
    fn read_payload(&self, offset: u32, size: u32) -> Result<Vec<u8>> {
        let start = (offset as usize).min(self.len());
        let end = start.saturating_add(size as usize).min(self.len());
        Ok(self[start..end].to_vec())
    }
}

/// Writer that tracks how many bytes have gone through it.
pub struct CountingWriter<W> {
    inner: W,
    position: u64,
}

impl<W: Write> CountingWriter<W> {
    /// Wrap `inner`, starting the count at zero.
    pub fn new(inner: W) -> Self {
        Self { inner, position: 0 }
    }

    /// Bytes written so far.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Unwrap the inner writer.
    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.position += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Counters from a save pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SaveReport {
    /// Length of the header section, and offset of the first payload.
    pub header_length: u64,
    /// Number of file payloads written.
    pub files_written: usize,
    /// Payloads taken from memory.
    pub from_memory: usize,
    /// Payloads read from the previous archive.
    pub from_source: usize,
    /// Files whose payload length differed from the declared size.
    pub size_mismatches: usize,
    /// Zero bytes inserted to close layout gaps.
    pub gap_bytes: u64,
    /// Total bytes in the written archive.
    pub total_bytes: u64,
}

/// Header bytes contributed by `id` and everything below it.
///
/// Root: 12 bytes. Directory: 9 + name. File: 17 + name.
pub fn header_length(tree: &Tree, id: NodeId) -> u64 {
    let node = &tree[id];
    match &node.kind {
        NodeKind::File(_) => FILE_HEADER_FIXED_LEN + name_len(&node.name),
        NodeKind::Directory { children } => {
            let own = if id == tree.root() {
                ROOT_HEADER_LEN
            } else {
                DIR_HEADER_FIXED_LEN + name_len(&node.name)
            };
            own + children
                .iter()
                .map(|&c| header_length(tree, c))
                .sum::<u64>()
        }
    }
}

/// Encoded length of a name; one byte per Latin-1 character.
fn name_len(name: &str) -> u64 {
    name.chars().count() as u64
}

/// Check that the tree can be written and return the header length.
///
/// Runs before anything on disk is touched: every name must encode, every
/// file needs a payload source, and the layout must fit 32-bit offsets.
pub fn plan_layout(tree: &Tree) -> Result<u64> {
    let root = tree.root();
    for id in tree.pre_order(root) {
        let node = &tree[id];
        if id != root {
            encode_latin1(&node.name)?;
        }
        if let Some(entry) = node.file() {
            if entry.data.is_none() && entry.old_offset.is_none() {
                return Err(Error::MissingPayload(tree.path_of(id)));
            }
        }
    }

    let header_len = header_length(tree, root);
    let end = header_len + tree.total_size();
    if end > i32::MAX as u64 {
        return Err(Error::ArchiveTooLarge { needed: end });
    }
    Ok(header_len)
}

/// Write the header section of `tree`, assigning every file its offset.
///
/// The first payload starts at `first_offset`. Returns the offset just past
/// the last file.
pub fn write_headers<W: Write>(tree: &mut Tree, w: &mut W, first_offset: u64) -> Result<u64> {
    let root = tree.root();
    write_directory(tree, w, root, first_offset)
}

fn write_directory<W: Write>(
    tree: &mut Tree,
    w: &mut W,
    dir: NodeId,
    mut next_offset: u64,
) -> Result<u64> {
    let (files, subdirs) = tree.files_and_dirs(dir);

    if dir == tree.root() {
        write_u32(w, VFS_MAGIC)?;
    } else {
        write_string(w, &tree[dir].name, true)?;
    }
    write_i32(w, count(subdirs.len())?)?;
    write_i32(w, count(files.len())?)?;

    for file in files {
        next_offset = write_file_header(tree, w, file, next_offset)?;
    }
    for subdir in subdirs {
        next_offset = write_directory(tree, w, subdir, next_offset)?;
    }

    Ok(next_offset)
}

fn write_file_header<W: Write>(
    tree: &mut Tree,
    w: &mut W,
    id: NodeId,
    offset: u64,
) -> Result<u64> {
    let assigned = u32::try_from(offset).map_err(|_| Error::ArchiveTooLarge { needed: offset })?;
    let path = tree.path_of(id);
    let node = tree
        .get_mut(id)
        .ok_or_else(|| Error::PathNotFound(path.clone()))?;
    let name = node.name.clone();
    let entry = node.file_mut().ok_or(Error::NotAFile(path))?;
    entry.offset = Some(assigned);
    let (size, modified) = (entry.size, entry.modified);

    write_string(w, &name, true)?;
    write_i32(w, to_i32(size as u64)?)?;
    write_i32(w, to_i32(assigned as u64)?)?;
    write_filetime(w, modified)?;

    Ok(offset + size as u64)
}

fn count(n: usize) -> Result<i32> {
    i32::try_from(n).map_err(|_| Error::ArchiveTooLarge { needed: n as u64 })
}

fn to_i32(value: u64) -> Result<i32> {
    i32::try_from(value).map_err(|_| Error::ArchiveTooLarge { needed: value })
}

/// Stream every file's payload in offset order.
///
/// Must follow [`write_headers`] on the same writer. Payloads come from
/// memory when present, otherwise from `source` at the file's old offset;
/// the latter are dropped as soon as they are written.
pub fn write_payloads<W: Write, S: PayloadSource + ?Sized>(
    tree: &Tree,
    w: &mut CountingWriter<W>,
    source: &S,
    gap_policy: GapPolicy,
    report: &mut SaveReport,
) -> Result<()> {
    // Empty files share their offset with the next payload and sort first.
    let mut files: Vec<(u32, u32, NodeId)> = tree
        .files(tree.root())
        .into_iter()
        .map(|id| {
            tree[id]
                .file()
                .and_then(|f| f.offset.map(|offset| (offset, f.size, id)))
                .ok_or_else(|| Error::MissingPayload(tree.path_of(id)))
        })
        .collect::<Result<_>>()?;
    files.sort_unstable();

    for (offset, _, id) in files {
        let Some(entry) = tree[id].file() else {
            continue;
        };

        let position = w.position();
        if position < offset as u64 {
            let path = tree.path_of(id);
            match gap_policy {
                GapPolicy::Error => {
                    return Err(Error::LayoutGap {
                        path,
                        position,
                        offset,
                    })
                }
                GapPolicy::ZeroFill => {
                    let gap = offset as u64 - position;
                    warn!(%path, gap, "zero-filling layout gap");
                    write_zeros(w, gap)?;
                    report.gap_bytes += gap;
                }
            }
        } else if position > offset as u64 {
            return Err(Error::LayoutGap {
                path: tree.path_of(id),
                position,
                offset,
            });
        }

        let declared = entry.size as usize;
        let written = match &entry.data {
            Some(data) => {
                report.from_memory += 1;
                write_payload(w, data, declared)?
            }
            None => {
                let old_offset = entry
                    .old_offset
                    .ok_or_else(|| Error::MissingPayload(tree.path_of(id)))?;
                let data = source.read_payload(old_offset, entry.size)?;
                report.from_source += 1;
                write_payload(w, &data, declared)?
            }
        };

        if written != declared {
            report.size_mismatches += 1;
            let mismatch = Error::PayloadSizeMismatch {
                path: tree.path_of(id),
                declared: entry.size,
                actual: written,
            };
            warn!("{}", mismatch);
            // Short payloads are padded so the next file lands on its offset.
            if written < declared {
                write_zeros(w, (declared - written) as u64)?;
            }
        }
        report.files_written += 1;
    }

    report.total_bytes = w.position();
    Ok(())
}

/// Write at most `declared` bytes of `data`; returns the length available.
///
/// Bytes beyond the declared size would overwrite the next file's region and
/// are dropped.
fn write_payload<W: Write>(w: &mut W, data: &[u8], declared: usize) -> Result<usize> {
    let n = data.len().min(declared);
    w.write_all(&data[..n])?;
    Ok(data.len())
}

fn write_zeros<W: Write>(w: &mut W, len: u64) -> Result<()> {
    io::copy(&mut io::repeat(0).take(len), w)?;
    Ok(())
}
