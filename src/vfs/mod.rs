//! Virtual file system tree for VFS container archives.
//!
//! Reads an archive's header section into a [`Tree`], merges other trees
//! into it and writes it back out with freshly assigned payload offsets.

mod archive;
mod merge;
mod path;
pub mod reader;
mod types;
pub mod writer;

pub use archive::{ArchiveInfo, VfsArchive};
pub use path::VfsPath;
pub use types::{DirEntry, FileEntry, Node, NodeId, NodeKind, Tree};
pub use writer::SaveReport;
