//! VFS Patcher
//!
//! Reads and rewrites VFS container archives: a directory tree of named files
//! packed into one file behind a binary header section. Mod packages (zip
//! files) can be merged into an archive's tree before it is rewritten.
//!
//! # Architecture
//!
//! ```text
//! Archive → Reader → Tree ← Merge ← Mod package (zip)
//!                     ↓
//!                   Writer → Archive (original kept as backup)
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use vfs_patcher::modpack::ModPackage;
//! use vfs_patcher::vfs::VfsArchive;
//! use std::path::Path;
//!
//! let mut archive = VfsArchive::open(Path::new("Textures.vfs"), Default::default()).unwrap();
//! let package = ModPackage::open(Path::new("HiResTextures.zip")).unwrap();
//!
//! if archive.add_mod(&package).unwrap() {
//!     archive.save().unwrap();
//! }
//! ```

pub mod codec;
pub mod config;
pub mod error;
pub mod modpack;
pub mod update;
pub mod vfs;

pub use config::PatchConfig;
pub use error::{Error, Result};
pub use modpack::ModPackage;
pub use vfs::VfsArchive;
