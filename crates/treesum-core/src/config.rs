//! Walk configuration types.

use std::path::PathBuf;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

/// Default number of bytes read per checksum block.
pub const DEFAULT_BLOCK_SIZE: usize = 4096;

/// Configuration for a tree walk.
#[derive(Debug, Clone, PartialEq, Eq, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct WalkConfig {
    /// Root directory to walk.
    pub root: PathBuf,

    /// Bytes read per checksum block.
    #[builder(default = "DEFAULT_BLOCK_SIZE")]
    #[serde(default = "default_block_size")]
    pub block_size: usize,

    /// Follow symbolic links to directories.
    #[builder(default = "false")]
    #[serde(default)]
    pub follow_symlinks: bool,

    /// Sort directory entries by name instead of using the OS order.
    #[builder(default = "false")]
    #[serde(default)]
    pub sort_entries: bool,
}

fn default_block_size() -> usize {
    DEFAULT_BLOCK_SIZE
}

impl WalkConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        match self.root {
            Some(ref root) if root.as_os_str().is_empty() => {
                return Err("Root path cannot be empty".to_string());
            }
            None => return Err("Root path is required".to_string()),
            _ => {}
        }
        if self.block_size == Some(0) {
            return Err("Block size must be greater than zero".to_string());
        }
        Ok(())
    }
}

impl WalkConfig {
    /// Create a new walk config builder.
    pub fn builder() -> WalkConfigBuilder {
        WalkConfigBuilder::default()
    }

    /// Create a config with default options for walking a path.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            block_size: DEFAULT_BLOCK_SIZE,
            follow_symlinks: false,
            sort_entries: false,
        }
    }
}

impl Default for WalkConfig {
    fn default() -> Self {
        Self::new(".")
    }
}
