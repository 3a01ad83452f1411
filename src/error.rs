//! Error types for VFS archive handling.

use thiserror::Error;

/// Result type alias for archive operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while loading, merging or saving archives.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A read ran past the end of the header stream.
    #[error("Truncated input: unexpected end of archive data")]
    TruncatedInput,

    /// Root directory header does not start with the archive magic.
    #[error("Invalid VFS archive: expected magic 0x4331504C, found {found:#010X}")]
    InvalidMagic { found: u32 },

    /// A file and a directory collide at the same path during a merge.
    #[error("Type mismatch at {path}: cannot merge a file with a directory")]
    TypeMismatch { path: String },

    /// A directory required by a mutation does not exist.
    #[error("Path not found: {0}")]
    PathNotFound(String),

    /// Attempt to move a node below itself.
    #[error("Cannot move {0} under its own descendant")]
    CyclicReparent(String),

    /// Resolved payload length differs from the declared size.
    ///
    /// Only ever logged; a save continues and writes what is available.
    #[error("Payload size mismatch for {path}: declared {declared} bytes, got {actual}")]
    PayloadSizeMismatch {
        path: String,
        declared: u32,
        actual: usize,
    },

    /// Output stream fell behind the offset assigned to a file.
    #[error("Layout gap before {path}: stream at {position}, file assigned offset {offset}")]
    LayoutGap {
        path: String,
        position: u64,
        offset: u32,
    },

    /// Name cannot be encoded in the archive's single-byte header format.
    #[error("Invalid entry name: {0}")]
    InvalidName(String),

    /// Invalid path format.
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Not a directory.
    #[error("Not a directory: {0}")]
    NotADirectory(String),

    /// Not a file.
    #[error("Not a file: {0}")]
    NotAFile(String),

    /// Path already exists.
    #[error("Path already exists: {0}")]
    PathExists(String),

    /// Layout does not fit the 32-bit offsets of the format.
    #[error("Archive too large: {needed} bytes exceeds the 32-bit offset range")]
    ArchiveTooLarge { needed: u64 },

    /// Mod package could not be read.
    #[error("Mod package error: {0}")]
    Zip(String),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// File has neither in-memory data nor a location in a previous archive.
    #[error("No payload source for {0}")]
    MissingPayload(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<zip::result::ZipError> for Error {
    fn from(e: zip::result::ZipError) -> Self {
        match e {
            zip::result::ZipError::Io(io) => Error::Io(io),
            other => Error::Zip(other.to_string()),
        }
    }
}
