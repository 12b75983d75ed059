//! Streaming content digests
//!
//! A file's identity is the BLAKE3 extended output truncated to
//! [`ContentHash::LEN`] bytes. Files are read in fixed-size chunks so memory
//! use is bounded by the chunk size, never by the file size.

use docsync_types::{ChunkSize, ContentHash};
use std::path::Path;
use tokio::io::AsyncReadExt;

/// Incremental digest over a byte stream
#[derive(Debug, Clone, Default)]
pub struct ContentHasher {
    inner: blake3::Hasher,
    bytes: u64,
}

impl ContentHasher {
    /// Create an empty hasher
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the next chunk
    pub fn update(&mut self, chunk: &[u8]) {
        self.inner.update(chunk);
        self.bytes += chunk.len() as u64;
    }

    /// Number of bytes consumed so far
    pub fn bytes_hashed(&self) -> u64 {
        self.bytes
    }

    /// Finish the digest
    pub fn finalize(&self) -> ContentHash {
        let mut out = [0u8; ContentHash::LEN];
        self.inner.finalize_xof().fill(&mut out);
        ContentHash::from_bytes(out)
    }
}

/// Digest an in-memory buffer
pub fn hash_bytes(data: &[u8]) -> ContentHash {
    let mut hasher = ContentHasher::new();
    hasher.update(data);
    hasher.finalize()
}

/// Digest a file by streaming it through the hasher in `chunk_size` reads
pub async fn hash_file(path: &Path, chunk_size: ChunkSize) -> std::io::Result<ContentHash> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut buffer = vec![0u8; chunk_size.get()];
    let mut hasher = ContentHasher::new();

    loop {
        let read = file.read(&mut buffer).await?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    Ok(hasher.finalize())
}
