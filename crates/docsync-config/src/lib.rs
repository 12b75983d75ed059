//! Configuration management system for DocuSync
//!
//! Settings are layered: compiled-in defaults, then an optional YAML, TOML or
//! JSON file, then `DOCSYNC__SECTION__KEY` environment variables.
//!
//! # Examples
//!
//! ```rust,no_run
//! use docsync_config::{ConfigBuilder, ConfigLoader};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load configuration with defaults
//! let config = ConfigLoader::load_default()?;
//!
//! // Or build a custom configuration
//! let config = ConfigBuilder::new()
//!     .add_source_file("docsync.yaml")
//!     .add_env_prefix("DOCSYNC")
//!     .build()?;
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod builder;
pub mod error;
pub mod loader;
pub mod logging;

pub use builder::ConfigBuilder;
pub use error::{ConfigError, ConfigResult};
pub use loader::ConfigLoader;
pub use logging::init_logging;

use docsync_types::{ChunkSize, SyncStrategy, WorkerCount};
use serde::{Deserialize, Serialize};

/// Main configuration structure for DocuSync
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Folder scanning and hashing settings
    pub scan: ScanConfig,
    /// Plan and execution settings
    pub sync: SyncConfig,
    /// Logging settings
    pub logging: LoggingConfig,
}

/// Folder scanning configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Read size used while streaming file content through the digest
    pub chunk_size: ChunkSize,
    /// Number of files hashed concurrently
    pub hash_workers: WorkerCount,
    /// Follow symbolic links while walking
    pub follow_symlinks: bool,
    /// Skip entries whose name starts with a dot
    pub skip_hidden: bool,
    /// Lower-case extensions (without the dot) to include; empty means all
    pub extensions: Vec<String>,
    /// Mark records eligible for downstream text extraction
    pub extract_text: bool,
    /// Files above this size are flagged to skip text extraction
    pub max_extract_size: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            chunk_size: ChunkSize::default(),
            hash_workers: WorkerCount::default(),
            follow_symlinks: true,
            skip_hidden: true,
            extensions: Vec::new(),
            extract_text: false,
            max_extract_size: 100 * 1024 * 1024,
        }
    }
}

/// Plan and execution configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Conflict resolution policy
    pub strategy: SyncStrategy,
    /// Report the plan without touching the filesystem
    pub dry_run: bool,
    /// Number of actions executed concurrently
    pub workers: WorkerCount,
    /// Carry the source modification time over to copies
    pub preserve_timestamps: bool,
    /// Suffix inserted before the extension of a kept-both copy
    pub copy_suffix: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            strategy: SyncStrategy::KeepBoth,
            dry_run: true,
            workers: WorkerCount::default(),
            preserve_timestamps: true,
            copy_suffix: "_copy".to_string(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json_format: bool,
    /// Enable ANSI colors
    pub colored_output: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            colored_output: true,
        }
    }
}
