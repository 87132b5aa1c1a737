//! Core types for treesum.
//!
//! This crate provides the data model shared by the scanning engine and the
//! command line front end: manifest records, checksums, walk statistics,
//! walk configuration and the error taxonomy.

mod config;
mod error;
mod record;
mod stats;

pub use config::{DEFAULT_BLOCK_SIZE, WalkConfig, WalkConfigBuilder};
pub use error::{DigestError, DigestStage, ManifestParseError, WalkError, WalkFault};
pub use record::{Checksum, FileRecord};
pub use stats::WalkStats;
