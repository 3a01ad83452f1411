//! Paths inside an archive or a mod package.

use crate::error::{Error, Result};
use std::fmt;

/// Component separators accepted on input. Mods built on Windows use `\`.
const SEPARATORS: [char; 2] = ['/', '\\'];

/// A path relative to a tree's root directory.
///
/// Empty components are dropped, so `""`, `"/"` and `"\\"` all name the root.
/// `.` and `..` are rejected: an archive has no notion of them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct VfsPath {
    components: Vec<String>,
}

impl VfsPath {
    /// Parse a path string.
    pub fn parse(raw: &str) -> Result<Self> {
        let mut components = Vec::new();
        for part in raw.split(SEPARATORS).filter(|p| !p.is_empty()) {
            if matches!(part, "." | "..") {
                return Err(Error::InvalidPath(format!("{raw}: `{part}` is not allowed")));
            }
            components.push(part.to_owned());
        }
        Ok(Self { components })
    }

    /// The root directory.
    pub fn root() -> Self {
        Self::default()
    }

    /// Check if this is the root path.
    pub fn is_root(&self) -> bool {
        self.components.is_empty()
    }

    /// Path components, outermost first.
    pub fn components(&self) -> &[String] {
        &self.components
    }

    /// Number of components; zero for the root.
    pub fn depth(&self) -> usize {
        self.components.len()
    }

    /// Directory components and final name, or `None` for the root.
    pub fn split_last(&self) -> Option<(&[String], &str)> {
        self.components
            .split_last()
            .map(|(name, dirs)| (dirs, name.as_str()))
    }

    /// The containing directory, or `None` for the root.
    pub fn parent(&self) -> Option<Self> {
        self.split_last().map(|(dirs, _)| Self {
            components: dirs.to_vec(),
        })
    }

    /// Last component, or `None` for the root.
    pub fn name(&self) -> Option<&str> {
        self.split_last().map(|(_, name)| name)
    }
}

impl fmt::Display for VfsPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            return f.write_str("/");
        }
        for component in &self.components {
            write!(f, "/{component}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_spellings() {
        for raw in ["", "/", "\\", "//"] {
            let path = VfsPath::parse(raw).unwrap();
            assert!(path.is_root());
            assert_eq!(path.depth(), 0);
            assert_eq!(path.to_string(), "/");
        }
    }

    #[test]
    fn test_windows_separators() {
        let path = VfsPath::parse("textures\\units/tank.dds").unwrap();
        assert_eq!(path.components(), &["textures", "units", "tank.dds"]);
        assert_eq!(path.to_string(), "/textures/units/tank.dds");
    }

    #[test]
    fn test_dot_components_rejected() {
        assert!(matches!(VfsPath::parse("a/../b"), Err(Error::InvalidPath(_))));
        assert!(VfsPath::parse("./a").is_err());
        // Dots inside a name are fine.
        assert!(VfsPath::parse("a/..b/.c").is_ok());
    }

    #[test]
    fn test_split_last() {
        let path = VfsPath::parse("a/b/c.txt").unwrap();
        let (dirs, name) = path.split_last().unwrap();
        assert_eq!(dirs, &["a", "b"]);
        assert_eq!(name, "c.txt");
        assert_eq!(path.parent().unwrap().to_string(), "/a/b");
        assert_eq!(path.name(), Some("c.txt"));

        assert!(VfsPath::root().split_last().is_none());
        assert!(VfsPath::root().parent().is_none());
        assert_eq!(VfsPath::parse("top").unwrap().parent(), Some(VfsPath::root()));
    }
}
