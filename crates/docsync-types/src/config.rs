//! Configuration types for DocuSync
//!
//! Validated newtypes shared by the configuration layer and the engine.

/// Size of the chunks streamed through the content digest and the copy loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "usize", into = "usize"))]
pub struct ChunkSize(usize);

impl ChunkSize {
    /// Minimum chunk size (512B)
    pub const MIN: usize = 512;
    /// Maximum chunk size (16MB)
    pub const MAX: usize = 16 * 1024 * 1024;
    /// Default chunk size (8KB)
    pub const DEFAULT: usize = 8 * 1024;

    /// Create a new chunk size with validation
    pub fn new(size: usize) -> Result<Self, String> {
        if size < Self::MIN {
            Err(format!("Chunk size {} is below minimum {}", size, Self::MIN))
        } else if size > Self::MAX {
            Err(format!("Chunk size {} exceeds maximum {}", size, Self::MAX))
        } else {
            Ok(Self(size))
        }
    }

    /// Get the chunk size value
    pub fn get(self) -> usize {
        self.0
    }
}

impl Default for ChunkSize {
    fn default() -> Self {
        Self(Self::DEFAULT)
    }
}

impl TryFrom<usize> for ChunkSize {
    type Error = String;

    fn try_from(value: usize) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ChunkSize> for usize {
    fn from(value: ChunkSize) -> Self {
        value.0
    }
}

/// Size of a bounded worker pool (hashing or action execution)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "usize", into = "usize"))]
pub struct WorkerCount(usize);

impl WorkerCount {
    /// Minimum worker count
    pub const MIN: usize = 1;
    /// Maximum worker count
    pub const MAX: usize = 64;
    /// Default worker count; disk-bound work gains little past a few workers
    pub const DEFAULT: usize = 4;

    /// Create a new worker count with validation
    pub fn new(count: usize) -> Result<Self, String> {
        if count < Self::MIN {
            Err(format!("Worker count {} is below minimum {}", count, Self::MIN))
        } else if count > Self::MAX {
            Err(format!("Worker count {} exceeds maximum {}", count, Self::MAX))
        } else {
            Ok(Self(count))
        }
    }

    /// A single worker, which makes execution strictly sequential
    pub fn sequential() -> Self {
        Self(1)
    }

    /// Get the worker count value
    pub fn get(self) -> usize {
        self.0
    }
}

impl Default for WorkerCount {
    fn default() -> Self {
        Self(Self::DEFAULT)
    }
}

impl TryFrom<usize> for WorkerCount {
    type Error = String;

    fn try_from(value: usize) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<WorkerCount> for usize {
    fn from(value: WorkerCount) -> Self {
        value.0
    }
}
