//! Streaming CRC-32 file digests.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use crc32fast::Hasher;

use treesum_core::{Checksum, DEFAULT_BLOCK_SIZE, DigestError, DigestStage};

/// Computes the size and CRC-32 checksum of single files.
///
/// Holds one block-sized buffer that is reused across files.
#[derive(Debug, Clone)]
pub struct FileDigest {
    buf: Vec<u8>,
}

impl FileDigest {
    /// Create a digester using the default 4 KiB block size.
    pub fn new() -> Self {
        Self::with_block_size(DEFAULT_BLOCK_SIZE)
    }

    /// Create a digester reading `block_size` bytes at a time.
    ///
    /// A block size of zero is treated as one byte.
    pub fn with_block_size(block_size: usize) -> Self {
        Self {
            buf: vec![0; block_size.max(1)],
        }
    }

    /// Block size in bytes.
    pub fn block_size(&self) -> usize {
        self.buf.len()
    }

    /// Digest the file at `path`, returning its size and checksum.
    ///
    /// The size comes from a metadata query on the open handle, not from
    /// the number of bytes read. The handle is closed before returning.
    pub fn digest(&mut self, path: &Path) -> Result<(u64, Checksum), DigestError> {
        let file = File::open(path).map_err(|e| DigestError::new(path, DigestStage::Open, e))?;
        let size = file
            .metadata()
            .map_err(|e| DigestError::new(path, DigestStage::Metadata, e))?
            .len();
        let checksum = fold_blocks(file, &mut self.buf)
            .map_err(|e| DigestError::new(path, DigestStage::Read, e))?;

        Ok((size, checksum))
    }
}

impl Default for FileDigest {
    fn default() -> Self {
        Self::new()
    }
}

/// Digest a single file with the default block size.
pub fn digest(path: impl AsRef<Path>) -> Result<(u64, Checksum), DigestError> {
    FileDigest::new().digest(path.as_ref())
}

/// Fold every byte of `reader` into a CRC-32, `block_size` bytes at a time.
pub fn checksum_reader<R: Read>(reader: R, block_size: usize) -> io::Result<Checksum> {
    let mut buf = vec![0; block_size.max(1)];
    fold_blocks(reader, &mut buf)
}

fn fold_blocks<R: Read>(mut reader: R, buf: &mut [u8]) -> io::Result<Checksum> {
    let mut hasher = Hasher::new();
    loop {
        match reader.read(buf) {
            Ok(0) => break,
            Ok(n) => hasher.update(&buf[..n]),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(Checksum::new(hasher.finalize()))
}
