//! Tree model: an arena of file and directory nodes.
//!
//! Nodes are addressed by stable [`NodeId`]s. A directory owns its children
//! through its child list; the `parent` link is only used for lookups and
//! for detaching a node before it is moved.

use crate::codec::FileTime;
use crate::error::{Error, Result};
use crate::vfs::path::VfsPath;
use std::collections::VecDeque;
use std::ops::Index;

/// Index of a node within its [`Tree`].
pub type NodeId = usize;

/// Per-file metadata and optional payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// Declared payload length; authoritative for layout.
    pub size: u32,
    /// Last modification time.
    pub modified: FileTime,
    /// Offset assigned in the archive being written. Set by a save pass.
    pub offset: Option<u32>,
    /// Offset in the archive the entry was loaded from.
    pub old_offset: Option<u32>,
    /// In-memory payload, if loaded or supplied by a mod.
    pub data: Option<Vec<u8>>,
}

impl FileEntry {
    /// An entry read from an existing archive, payload left on disk.
    pub fn on_disk(size: u32, modified: FileTime, old_offset: u32) -> Self {
        Self {
            size,
            modified,
            offset: None,
            old_offset: Some(old_offset),
            data: None,
        }
    }

    /// An entry whose payload lives in memory.
    ///
    /// Fails if the payload does not fit the format's 32-bit sizes.
    pub fn in_memory(data: Vec<u8>, modified: FileTime) -> Result<Self> {
        let size = u32::try_from(data.len()).map_err(|_| Error::ArchiveTooLarge {
            needed: data.len() as u64,
        })?;
        Ok(Self {
            size,
            modified,
            offset: None,
            old_offset: None,
            data: Some(data),
        })
    }
}

/// Node variant. The variant of a node never changes after creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// A regular file.
    File(FileEntry),
    /// A directory with ordered child ids.
    Directory { children: Vec<NodeId> },
}

/// A named node in the tree.
#[derive(Debug, Clone)]
pub struct Node {
    /// Name, unique among siblings.
    pub name: String,
    parent: Option<NodeId>,
    /// File or directory payload.
    pub kind: NodeKind,
}

impl Node {
    /// Check if this is a file.
    pub fn is_file(&self) -> bool {
        matches!(self.kind, NodeKind::File(_))
    }

    /// Check if this is a directory.
    pub fn is_directory(&self) -> bool {
        matches!(self.kind, NodeKind::Directory { .. })
    }

    /// The file entry, if this is a file.
    pub fn file(&self) -> Option<&FileEntry> {
        match &self.kind {
            NodeKind::File(entry) => Some(entry),
            NodeKind::Directory { .. } => None,
        }
    }

    /// The mutable file entry, if this is a file.
    pub fn file_mut(&mut self) -> Option<&mut FileEntry> {
        match &mut self.kind {
            NodeKind::File(entry) => Some(entry),
            NodeKind::Directory { .. } => None,
        }
    }

    /// Child ids; empty for files.
    pub fn children(&self) -> &[NodeId] {
        match &self.kind {
            NodeKind::Directory { children } => children,
            NodeKind::File(_) => &[],
        }
    }

    /// Parent id, `None` for a root or a detached node.
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }
}

/// A directory tree stored in an arena.
///
/// Removed nodes leave an empty slot; ids are never reused.
#[derive(Debug, Clone)]
pub struct Tree {
    nodes: Vec<Option<Node>>,
    root: NodeId,
}

impl Tree {
    /// Create a tree holding only a root directory.
    pub fn new(root_name: impl Into<String>) -> Self {
        let root = Node {
            name: root_name.into(),
            parent: None,
            kind: NodeKind::Directory {
                children: Vec::new(),
            },
        };
        Self {
            nodes: vec![Some(root)],
            root: 0,
        }
    }

    /// Root directory id.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Get a node by id.
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id).and_then(Option::as_ref)
    }

    /// Get a mutable node by id.
    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id).and_then(Option::as_mut)
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.get_mut(id)
            .ok_or_else(|| Error::PathNotFound(format!("node #{}", id)))
    }

    /// Create a node with no parent.
    pub fn new_detached(&mut self, name: impl Into<String>, kind: NodeKind) -> NodeId {
        self.nodes.push(Some(Node {
            name: name.into(),
            parent: None,
            kind,
        }));
        self.nodes.len() - 1
    }

    /// Create a file under `parent`.
    pub fn add_file(
        &mut self,
        parent: NodeId,
        name: impl Into<String>,
        entry: FileEntry,
    ) -> Result<NodeId> {
        let id = self.new_detached(name, NodeKind::File(entry));
        self.attach(id, parent, None)?;
        Ok(id)
    }

    /// Create an empty directory under `parent`.
    pub fn add_dir(&mut self, parent: NodeId, name: impl Into<String>) -> Result<NodeId> {
        let id = self.new_detached(
            name,
            NodeKind::Directory {
                children: Vec::new(),
            },
        );
        self.attach(id, parent, None)?;
        Ok(id)
    }

    /// Walk `components` from `start`, creating missing directories.
    pub fn ensure_dir(&mut self, start: NodeId, components: &[String]) -> Result<NodeId> {
        let mut current = start;
        for component in components {
            current = match self.child(current, component) {
                Some(id) if self[id].is_directory() => id,
                Some(id) => return Err(Error::NotADirectory(self.path_of(id))),
                None => self.add_dir(current, component.as_str())?,
            };
        }
        Ok(current)
    }

    /// Child ids of `id`; empty for files and stale ids.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.get(id).map(Node::children).unwrap_or(&[])
    }

    /// First direct child of `dir` called `name`.
    pub fn child(&self, dir: NodeId, name: &str) -> Option<NodeId> {
        self.children(dir)
            .iter()
            .copied()
            .find(|&c| self.get(c).is_some_and(|n| n.name == name))
    }

    /// Resolve a multi-segment path below `start`.
    ///
    /// Returns `None` when any segment is missing.
    pub fn lookup(&self, start: NodeId, path: &VfsPath) -> Option<NodeId> {
        path.components()
            .iter()
            .try_fold(start, |current, component| self.child(current, component))
    }

    /// Check whether `ancestor` is `node` or one of its ancestors.
    pub fn is_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.get(id).and_then(Node::parent);
        }
        false
    }

    /// Unlink `id` from its parent. The subtree stays in the arena.
    pub fn detach(&mut self, id: NodeId) {
        let Some(parent) = self.get(id).and_then(Node::parent) else {
            return;
        };
        if let Some(Node {
            kind: NodeKind::Directory { children },
            ..
        }) = self.get_mut(parent)
        {
            children.retain(|&c| c != id);
        }
        if let Some(node) = self.get_mut(id) {
            node.parent = None;
        }
    }

    /// Move `id` (with its subtree) to the end of `new_parent`'s children.
    pub fn reparent(&mut self, id: NodeId, new_parent: NodeId) -> Result<()> {
        self.attach(id, new_parent, None)
    }

    /// Move `id` under `new_parent`, at `index` or at the end.
    ///
    /// Fails with [`Error::CyclicReparent`] if `new_parent` lies inside the
    /// subtree of `id`; the tree is left unchanged on failure.
    pub fn attach(&mut self, id: NodeId, new_parent: NodeId, index: Option<usize>) -> Result<()> {
        if self.get(id).is_none() {
            return Err(Error::PathNotFound(format!("node #{}", id)));
        }
        match self.get(new_parent) {
            Some(p) if p.is_directory() => {}
            Some(_) => return Err(Error::NotADirectory(self.path_of(new_parent))),
            None => return Err(Error::PathNotFound(format!("node #{}", new_parent))),
        }
        if self.is_ancestor(id, new_parent) {
            return Err(Error::CyclicReparent(self.path_of(id)));
        }

        self.detach(id);
        if let NodeKind::Directory { children } = &mut self.node_mut(new_parent)?.kind {
            let at = index.unwrap_or(children.len()).min(children.len());
            children.insert(at, id);
        }
        self.node_mut(id)?.parent = Some(new_parent);
        Ok(())
    }

    /// Detach `id` and free every node of its subtree.
    pub fn remove_subtree(&mut self, id: NodeId) {
        self.detach(id);
        for node in self.pre_order(id) {
            if node != self.root {
                self.nodes[node] = None;
            }
        }
    }

    /// Copy the subtree at `from` in `other` into this arena, detached.
    ///
    /// Returns the id of the copied subtree root.
    pub fn graft(&mut self, other: &Tree, from: NodeId) -> Result<NodeId> {
        let source = other
            .get(from)
            .ok_or_else(|| Error::PathNotFound(format!("node #{}", from)))?;
        let kind = match &source.kind {
            NodeKind::File(entry) => NodeKind::File(entry.clone()),
            NodeKind::Directory { .. } => NodeKind::Directory {
                children: Vec::new(),
            },
        };
        let id = self.new_detached(source.name.clone(), kind);
        for &child in source.children() {
            let copied = self.graft(other, child)?;
            self.attach(copied, id, None)?;
        }
        Ok(id)
    }

    /// Split the children of `dir` into (files, directories), order kept.
    pub fn files_and_dirs(&self, dir: NodeId) -> (Vec<NodeId>, Vec<NodeId>) {
        self.children(dir)
            .iter()
            .copied()
            .partition(|&c| self.get(c).is_some_and(Node::is_file))
    }

    /// Pre-order traversal from `start`, children in stored order.
    pub fn pre_order(&self, start: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![start];
        while let Some(id) = stack.pop() {
            if self.get(id).is_none() {
                continue;
            }
            out.push(id);
            stack.extend(self.children(id).iter().rev().copied());
        }
        out
    }

    /// Breadth-first traversal from `start`.
    pub fn breadth_first(&self, start: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut queue = VecDeque::from([start]);
        while let Some(id) = queue.pop_front() {
            if self.get(id).is_none() {
                continue;
            }
            out.push(id);
            queue.extend(self.children(id).iter().copied());
        }
        out
    }

    /// All file nodes below `start`, breadth-first.
    pub fn files(&self, start: NodeId) -> Vec<NodeId> {
        self.breadth_first(start)
            .into_iter()
            .filter(|&id| self[id].is_file())
            .collect()
    }

    /// Slash-separated path of `id` relative to its topmost ancestor.
    pub fn path_of(&self, id: NodeId) -> String {
        let mut names = Vec::new();
        let mut current = Some(id);
        while let Some(node_id) = current {
            let Some(node) = self.get(node_id) else { break };
            if node.parent.is_none() {
                break;
            }
            names.push(node.name.as_str());
            current = node.parent;
        }
        names.reverse();
        format!("/{}", names.join("/"))
    }

    /// Number of files below the root.
    pub fn file_count(&self) -> usize {
        self.files(self.root).len()
    }

    /// Number of directories below the root, excluding the root itself.
    pub fn dir_count(&self) -> usize {
        self.breadth_first(self.root)
            .into_iter()
            .filter(|&id| id != self.root && self[id].is_directory())
            .count()
    }

    /// Sum of declared file sizes below the root.
    pub fn total_size(&self) -> u64 {
        self.files(self.root)
            .into_iter()
            .filter_map(|id| self[id].file())
            .map(|f| f.size as u64)
            .sum()
    }
}

impl Index<NodeId> for Tree {
    type Output = Node;

    /// Panics on a freed or out-of-range id.
    fn index(&self, id: NodeId) -> &Node {
        match self.get(id) {
            Some(node) => node,
            None => panic!("stale node id {}", id),
        }
    }
}

/// A directory entry for listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// Name of the entry.
    pub name: String,
    /// Whether this is a directory.
    pub is_dir: bool,
    /// Size in bytes (0 for directories).
    pub size: u32,
    /// Offset of the payload in the archive it was last read from or written to.
    pub offset: Option<u32>,
    /// Modification time (files only).
    pub modified: Option<FileTime>,
}

impl DirEntry {
    /// Create from a node.
    pub fn from_node(node: &Node) -> Self {
        match node.file() {
            Some(entry) => Self {
                name: node.name.clone(),
                is_dir: false,
                size: entry.size,
                offset: entry.offset.or(entry.old_offset),
                modified: Some(entry.modified),
            },
            None => Self {
                name: node.name.clone(),
                is_dir: true,
                size: 0,
                offset: None,
                modified: None,
            },
        }
    }
}
