//! Error types for walking and digesting.

use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Step of a file digest that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestStage {
    /// Opening the file.
    Open,
    /// Querying the file size.
    Metadata,
    /// Reading a block of content.
    Read,
}

impl fmt::Display for DigestStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DigestStage::Open => "open",
            DigestStage::Metadata => "stat",
            DigestStage::Read => "read",
        })
    }
}

/// Failure to digest a single file.
///
/// Always tied to the path that caused it so the walker can attribute it.
#[derive(Debug, Error)]
#[error("cannot {stage} {path}: {source}")]
pub struct DigestError {
    /// File that failed.
    pub path: PathBuf,
    /// Step that failed.
    pub stage: DigestStage,
    /// Underlying I/O error.
    #[source]
    pub source: std::io::Error,
}

impl DigestError {
    /// Create a digest error for a path.
    pub fn new(path: impl Into<PathBuf>, stage: DigestStage, source: std::io::Error) -> Self {
        Self {
            path: path.into(),
            stage,
            source,
        }
    }
}

/// Non-fatal fault encountered during a walk.
#[derive(Debug, Error)]
pub enum WalkFault {
    /// A file could not be digested.
    #[error(transparent)]
    Digest(#[from] DigestError),

    /// A directory entry could not be read.
    #[error("cannot traverse {path}: {message}")]
    Traversal { path: PathBuf, message: String },
}

impl WalkFault {
    /// Path the fault is attributed to.
    pub fn path(&self) -> &Path {
        match self {
            WalkFault::Digest(err) => &err.path,
            WalkFault::Traversal { path, .. } => path,
        }
    }
}

/// Errors that abort a walk.
#[derive(Debug, Error)]
pub enum WalkError {
    /// Root path does not exist.
    #[error("Root path not found: {path}")]
    RootNotFound { path: PathBuf },

    /// Root path is not a directory.
    #[error("Root path is not a directory: {path}")]
    NotADirectory { path: PathBuf },

    /// Resume marker does not exist.
    #[error("Resume marker not found: {path}: {source}")]
    ResumeMarkerNotFound {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Resume marker lies outside the walked tree.
    #[error("Resume marker {marker} is outside of root {root}")]
    ResumeMarkerOutsideRoot { marker: PathBuf, root: PathBuf },

    /// Generic I/O error.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Invalid configuration.
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },
}

impl WalkError {
    /// Create an I/O error for the root path.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::NotFound => Self::RootNotFound { path },
            _ => Self::Io { path, source },
        }
    }
}

/// Failure to parse a manifest line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ManifestParseError {
    /// The line does not have path, size and checksum fields.
    #[error("expected `path,size,checksum`, got {line:?}")]
    MissingField { line: String },

    /// The size field is not an unsigned integer.
    #[error("invalid size {value:?}")]
    InvalidSize { value: String },

    /// The checksum field is not 8 hex digits.
    #[error("invalid checksum {value:?}")]
    InvalidChecksum { value: String },
}
