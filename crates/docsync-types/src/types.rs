//! Core data types for DocuSync
//!
//! This module provides the data model shared by the snapshotter, reconciler,
//! duplicate classifier, planner and executor: content hashes, root-relative
//! paths, file records and the sync strategy.

use crate::{Error, Result};
use chrono::{DateTime, Utc};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;
use std::time::SystemTime;

/// File size in bytes
pub type FileSize = u64;

/// 128-bit content-addressed identity of a file's bytes
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentHash([u8; 16]);

impl ContentHash {
    /// Digest length in bytes
    pub const LEN: usize = 16;

    /// Wrap raw digest bytes
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Raw digest bytes
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// Lowercase hex encoding (32 characters)
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({})", self.to_hex())
    }
}

impl FromStr for ContentHash {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut bytes = [0u8; 16];
        hex::decode_to_slice(s, &mut bytes)
            .map_err(|e| Error::other(format!("Invalid content hash '{}': {}", s, e)))?;
        Ok(Self(bytes))
    }
}

#[cfg(feature = "serde")]
impl Serialize for ContentHash {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

#[cfg(feature = "serde")]
impl<'de> Deserialize<'de> for ContentHash {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        encoded.parse().map_err(serde::de::Error::custom)
    }
}

/// Identifier of a root taking part in an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RootId(u32);

impl RootId {
    /// First root of a reconciliation pair
    pub const ROOT1: Self = Self(1);
    /// Second root of a reconciliation pair
    pub const ROOT2: Self = Self(2);

    /// Create a root id from a caller-chosen number
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Numeric value
    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for RootId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "root{}", self.0)
    }
}

/// Root-relative, `/`-separated, case-preserving path used as the matching key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct RelativePath(String);

impl RelativePath {
    /// Normalize a `/`-separated path: empty and `.` segments are dropped,
    /// `..` segments and empty results are rejected.
    pub fn new(raw: &str) -> Result<Self> {
        let mut segments = Vec::new();
        for segment in raw.split('/') {
            match segment {
                "" | "." => {}
                ".." => {
                    return Err(Error::invalid_path(format!(
                        "'{}' escapes its root",
                        raw
                    )))
                }
                other => segments.push(other),
            }
        }

        if segments.is_empty() {
            return Err(Error::invalid_path(format!("'{}' names no file", raw)));
        }
        Ok(Self(segments.join("/")))
    }

    /// Express `path` relative to `root`
    pub fn from_root(root: &Path, path: &Path) -> Result<Self> {
        let stripped = path.strip_prefix(root).map_err(|_| {
            Error::invalid_path(format!(
                "'{}' is not inside root '{}'",
                path.display(),
                root.display()
            ))
        })?;

        let mut segments = Vec::new();
        for component in stripped.components() {
            match component {
                Component::Normal(name) => {
                    let name = name.to_str().ok_or_else(|| {
                        Error::invalid_path(format!("'{}' is not valid UTF-8", path.display()))
                    })?;
                    segments.push(name);
                }
                Component::CurDir => {}
                _ => {
                    return Err(Error::invalid_path(format!(
                        "'{}' has a non-normal component",
                        path.display()
                    )))
                }
            }
        }

        Self::new(&segments.join("/"))
    }

    /// The path as a `/`-separated string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Final segment
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// Resolve against a root directory
    pub fn resolve(&self, root: &Path) -> PathBuf {
        self.0.split('/').fold(root.to_path_buf(), |acc, s| acc.join(s))
    }

    /// Insert a disambiguating suffix before the extension of the final
    /// segment: `n == 1` gives `name{suffix}.ext`, `n >= 2` gives `name{suffix}{n}.ext`.
    pub fn with_suffix(&self, suffix: &str, n: u32) -> Self {
        let (dir, name) = match self.0.rfind('/') {
            Some(idx) => (&self.0[..=idx], &self.0[idx + 1..]),
            None => ("", self.0.as_str()),
        };
        let (stem, ext) = match name.rfind('.') {
            Some(idx) if idx > 0 => (&name[..idx], &name[idx..]),
            _ => (name, ""),
        };
        let counter = if n <= 1 { String::new() } else { n.to_string() };
        Self(format!("{}{}{}{}{}", dir, stem, suffix, counter, ext))
    }
}

impl fmt::Display for RelativePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity and metadata of one regular file inside a root
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FileRecord {
    /// Root the file was found in
    pub root_id: RootId,
    /// Path relative to the root
    pub relative_path: RelativePath,
    /// Absolute path on disk
    pub absolute_path: PathBuf,
    /// Size in bytes
    pub size_bytes: FileSize,
    /// Last modification time
    pub modified_time: SystemTime,
    /// Content digest
    pub content_hash: ContentHash,
    /// Whether text extraction should be skipped for this file
    pub skip_extraction: bool,
}

impl FileRecord {
    /// Modification time as a UTC timestamp
    pub fn modified_utc(&self) -> DateTime<Utc> {
        DateTime::<Utc>::from(self.modified_time)
    }

    /// Absolute path as a string, the tie-break key for stable ordering
    pub fn sort_key(&self) -> String {
        self.absolute_path.to_string_lossy().into_owned()
    }
}

/// Policy used to resolve same-path, different-content conflicts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum SyncStrategy {
    /// Keep both versions, the foreign one under a suffixed name
    #[default]
    KeepBoth,
    /// Overwrite the older version with the newer one
    KeepNewest,
    /// Overwrite the smaller version with the larger one
    KeepLargest,
}

impl SyncStrategy {
    /// All strategies, in declaration order
    pub const ALL: [Self; 3] = [Self::KeepBoth, Self::KeepNewest, Self::KeepLargest];

    /// Wire name of the strategy
    pub fn as_str(self) -> &'static str {
        match self {
            Self::KeepBoth => "keep_both",
            Self::KeepNewest => "keep_newest",
            Self::KeepLargest => "keep_largest",
        }
    }
}

impl fmt::Display for SyncStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "keep_both" => Ok(Self::KeepBoth),
            "keep_newest" => Ok(Self::KeepNewest),
            "keep_largest" => Ok(Self::KeepLargest),
            other => Err(Error::config(format!(
                "Unknown sync strategy '{}' (expected keep_both, keep_newest or keep_largest)",
                other
            ))),
        }
    }
}

/// Format a byte count as a human-readable string
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", size, UNITS[unit_index])
    }
}
