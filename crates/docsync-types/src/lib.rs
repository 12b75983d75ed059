//! Core type system and error handling for DocuSync
//!
//! This crate provides the foundational types, error handling, and shared data structures
//! used throughout the DocuSync reconciliation engine. It includes:
//!
//! - **Error handling**: The engine's error taxonomy with severity levels and recoverability
//! - **Core types**: Content hashes, root-relative paths, file records and sync strategies
//! - **Configuration**: Validated chunk-size and worker-count newtypes
//!
//! # Features
//!
//! - `std` (default): Enable standard library features
//! - `serde`: Enable serialization support
//!
//! # Examples
//!
//! ```rust
//! use docsync_types::{RelativePath, Result, SyncStrategy};
//!
//! fn example_operation() -> Result<RelativePath> {
//!     let strategy: SyncStrategy = "keep_newest".parse()?;
//!     assert_eq!(strategy, SyncStrategy::KeepNewest);
//!     RelativePath::new("sub/doc.pdf")
//! }
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod result;
pub mod types;

// Re-export commonly used types
pub use config::{ChunkSize, WorkerCount};
pub use error::{Error, ErrorKind, ErrorSeverity};
pub use result::Result;
pub use types::*;
