//! Tree merge engine.

use crate::error::{Error, Result};
use crate::vfs::types::{Node, NodeId, Tree};
use tracing::debug;

impl Tree {
    /// Absorb every descendant of `incoming` into `base`.
    ///
    /// Directories missing from `base` move over as whole subtrees; matching
    /// directories are merged recursively. A file present in both is replaced
    /// when `overwrite` is set and kept otherwise. Entries of `base` without a
    /// counterpart are never removed.
    ///
    /// The whole merge is checked before anything moves: a file/directory
    /// collision fails with [`Error::TypeMismatch`] and leaves `base` as it
    /// was. `incoming` ends up empty but is not removed.
    pub fn merge(&mut self, base: NodeId, incoming: NodeId, overwrite: bool) -> Result<()> {
        for id in [base, incoming] {
            match self.get(id) {
                Some(node) if node.is_directory() => {}
                Some(_) => return Err(Error::NotADirectory(self.path_of(id))),
                None => return Err(Error::PathNotFound(format!("node #{}", id))),
            }
        }
        if self.is_ancestor(incoming, base) {
            return Err(Error::CyclicReparent(self.path_of(incoming)));
        }

        self.check_merge(base, incoming)?;
        let stats = self.merge_into(base, incoming, overwrite)?;
        debug!(
            added = stats.added,
            replaced = stats.replaced,
            skipped = stats.skipped,
            overwrite,
            "merged tree into {}",
            self.path_of(base)
        );
        Ok(())
    }

    fn check_merge(&self, base: NodeId, incoming: NodeId) -> Result<()> {
        for &child in self.children(incoming) {
            let node = &self[child];
            let Some(existing) = self.child(base, &node.name) else {
                continue;
            };
            match (node.is_directory(), self[existing].is_directory()) {
                (true, true) => self.check_merge(existing, child)?,
                (false, false) => {}
                _ => {
                    return Err(Error::TypeMismatch {
                        path: self.path_of(existing),
                    })
                }
            }
        }
        Ok(())
    }

    fn merge_into(&mut self, base: NodeId, incoming: NodeId, overwrite: bool) -> Result<MergeStats> {
        let mut stats = MergeStats::default();
        let children = self.children(incoming).to_vec();

        for child in children {
            let name = self[child].name.clone();
            let Some(existing) = self.child(base, &name) else {
                self.reparent(child, base)?;
                stats.added += 1;
                continue;
            };

            match (self[child].is_directory(), self[existing].is_directory()) {
                (true, true) => {
                    stats += self.merge_into(existing, child, overwrite)?;
                    self.remove_subtree(child);
                }
                (false, false) if overwrite => {
                    let index = self
                        .children(base)
                        .iter()
                        .position(|&c| c == existing);
                    self.remove_subtree(existing);
                    self.attach(child, base, index)?;
                    stats.replaced += 1;
                }
                (false, false) => {
                    self.remove_subtree(child);
                    stats.skipped += 1;
                }
                _ => {
                    return Err(Error::TypeMismatch {
                        path: self.path_of(existing),
                    })
                }
            }
        }

        Ok(stats)
    }

    /// Names of the direct children of `dir`, in stored order.
    pub fn child_names(&self, dir: NodeId) -> Vec<&str> {
        self.children(dir)
            .iter()
            .filter_map(|&c| self.get(c).map(|n: &Node| n.name.as_str()))
            .collect()
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct MergeStats {
    added: usize,
    replaced: usize,
    skipped: usize,
}

impl std::ops::AddAssign for MergeStats {
    fn add_assign(&mut self, rhs: Self) {
        self.added += rhs.added;
        self.replaced += rhs.replaced;
        self.skipped += rhs.skipped;
    }
}
