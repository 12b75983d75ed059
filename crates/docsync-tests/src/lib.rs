//! DocuSync integration test support
//!
//! Fixtures shared by the end-to-end tests and the benchmarks.

#![warn(missing_docs)]
#![warn(clippy::all)]

use docsync_sync::hash_bytes;
use docsync_types::{FileRecord, RelativePath, RootId};
use filetime::FileTime;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

/// A temporary root populated file by file
pub struct TestRoot {
    dir: TempDir,
}

impl TestRoot {
    /// Create an empty root
    pub fn new() -> anyhow::Result<Self> {
        Ok(Self {
            dir: TempDir::new()?,
        })
    }

    /// Root directory
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Absolute path of `relative` inside the root
    pub fn join(&self, relative: &str) -> PathBuf {
        self.dir.path().join(relative)
    }

    /// Write `content` at `relative`, creating parent directories
    pub fn write(&self, relative: &str, content: &[u8]) -> anyhow::Result<PathBuf> {
        let path = self.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, content)?;
        Ok(path)
    }

    /// Write `content` at `relative` with a modification time of `unix_secs`
    pub fn write_at(&self, relative: &str, content: &[u8], unix_secs: i64) -> anyhow::Result<PathBuf> {
        let path = self.write(relative, content)?;
        filetime::set_file_mtime(&path, FileTime::from_unix_time(unix_secs, 0))?;
        Ok(path)
    }

    /// Read the file at `relative`
    pub fn read(&self, relative: &str) -> anyhow::Result<Vec<u8>> {
        Ok(fs::read(self.join(relative))?)
    }

    /// Whether a file exists at `relative`
    pub fn exists(&self, relative: &str) -> bool {
        self.join(relative).exists()
    }

    /// Every regular file under the root as sorted relative path strings
    pub fn listing(&self) -> anyhow::Result<Vec<String>> {
        let mut out = Vec::new();
        collect(self.path(), self.path(), &mut out)?;
        out.sort();
        Ok(out)
    }
}

fn collect(root: &Path, dir: &Path, out: &mut Vec<String>) -> anyhow::Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            collect(root, &path, out)?;
        } else {
            let relative = path.strip_prefix(root)?.to_string_lossy().replace('\\', "/");
            out.push(relative);
        }
    }
    Ok(())
}

/// Unix epoch seconds for midnight UTC of a 2024 day-of-year
pub fn day_2024(day_of_year: i64) -> i64 {
    1_704_067_200 + (day_of_year - 1) * 86_400
}

/// An in-memory record, for building snapshots without touching disk
pub fn synthetic_record(root_id: RootId, root: &str, relative: &str, content: &[u8], mtime_secs: u64) -> FileRecord {
    FileRecord {
        root_id,
        relative_path: RelativePath::new(relative).unwrap_or_else(|e| panic!("{}", e)),
        absolute_path: PathBuf::from(format!("{}/{}", root, relative)),
        size_bytes: content.len() as u64,
        modified_time: SystemTime::UNIX_EPOCH + Duration::from_secs(mtime_secs),
        content_hash: hash_bytes(content),
        skip_extraction: true,
    }
}

/// Deterministic pseudo-random bytes
pub fn generate_test_data(size: usize, seed: u8) -> Vec<u8> {
    (0..size)
        .map(|i| ((i * 7 + 13 + seed as usize * 31) % 256) as u8)
        .collect()
}
