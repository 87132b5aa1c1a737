//! Checksum walking engine for treesum.
//!
//! This crate walks a directory tree, computes a CRC-32 checksum and size
//! for every regular file, and yields one [`FileRecord`] per file. Walks can
//! be resumed after an interruption from the last file or directory a
//! previous run completed.
//!
//! # Overview
//!
//! - **Streaming digests**: files are read in fixed-size blocks, never
//!   loaded whole
//! - **Lazy, single-threaded** traversal via jwalk
//! - **Resumable** from any file or directory inside the root
//! - **Fault isolation**: a file that cannot be read is counted and
//!   reported to a [`FaultSink`], and the walk carries on
//!
//! # Example
//!
//! ```rust,no_run
//! use treesum_scan::TreeWalker;
//!
//! let mut walker = TreeWalker::new("/path/to/scan").unwrap();
//! println!("ROOT: {}", walker.root().display());
//!
//! for record in walker.walk(None).unwrap() {
//!     println!("{record}");
//! }
//!
//! let stats = walker.stats();
//! println!("{} processed, {} errors", stats.processed, stats.erroneous);
//! ```
//!
//! # Resuming
//!
//! ```rust,no_run
//! use std::path::Path;
//! use treesum_scan::TreeWalker;
//!
//! let mut walker = TreeWalker::new("/path/to/scan").unwrap();
//! let records: Vec<_> = walker
//!     .walk(Some(Path::new("photos/2019/img_0042.jpg")))
//!     .unwrap()
//!     .collect();
//! ```

mod digest;
mod sink;
mod walker;

pub use digest::{FileDigest, checksum_reader, digest};
pub use sink::{FaultSink, LogSink, WriterSink};
pub use walker::{TreeWalker, Walk};

// Re-export core types for convenience
pub use treesum_core::{
    Checksum, DEFAULT_BLOCK_SIZE, DigestError, DigestStage, FileRecord, WalkConfig, WalkError,
    WalkFault, WalkStats,
};
