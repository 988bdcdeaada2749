//! Atomic file replacement.
//!
//! Writers compose the full new content, write it to a temporary sibling,
//! fsync, then rename over the target. A concurrent reader observes either the
//! old file or the new one, never a partial write.
//!
//! # Example
//!
//! ```no_run
//! use mulch_core::safe_io::atomic_write;
//! use std::path::Path;
//!
//! # fn example() -> std::io::Result<()> {
//! atomic_write(Path::new(".mulch/expertise/testing.jsonl"), b"")?;
//! # Ok(())
//! # }
//! ```

use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Temporary sibling used while replacing `path`.
///
/// The pid suffix keeps two processes that bypass the lock from sharing one
/// temp file.
fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(format!(".tmp.{}", std::process::id()));
    path.with_file_name(name)
}

/// Atomically write bytes to a file.
///
/// Creates missing parent directories. On any failure before the rename the
/// temp file is removed and the target is left untouched.
pub fn atomic_write(path: &Path, contents: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }

    let tmp_path = temp_path(path);
    let result = write_and_sync(&tmp_path, contents).and_then(|()| fs::rename(&tmp_path, path));
    if result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    result
}

/// Atomically write UTF-8 text to a file.
pub fn atomic_write_text(path: &Path, contents: &str) -> io::Result<()> {
    atomic_write(path, contents.as_bytes())
}

fn write_and_sync(tmp_path: &Path, contents: &[u8]) -> io::Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(tmp_path)?;

    {
        let mut writer = BufWriter::new(&mut file);
        writer.write_all(contents)?;
        writer.flush()?;
    }

    // Sync to disk before rename
    file.sync_all()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_atomic_write_basic() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("test.jsonl");

        atomic_write(&path, b"hello world").unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "hello world");
    }

    #[test]
    fn test_atomic_write_creates_parent_dirs() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("dir").join("test.jsonl");

        atomic_write_text(&path, "nested content").unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "nested content");
    }

    #[test]
    fn test_atomic_write_overwrites_existing() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("test.jsonl");

        atomic_write(&path, b"original").unwrap();
        atomic_write(&path, b"updated").unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "updated");
    }

    #[test]
    fn test_atomic_write_no_tmp_file_left() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("test.jsonl");

        atomic_write(&path, b"content").unwrap();

        let leftovers: Vec<_> = fs::read_dir(temp_dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(leftovers.len(), 1, "temp file should be renamed away");
        assert!(!temp_path(&path).exists());
    }

    #[test]
    fn test_temp_path_is_sibling() {
        let path = Path::new("/a/b/testing.jsonl");
        let tmp = temp_path(path);
        assert_eq!(tmp.parent(), path.parent());
        assert!(
            tmp.file_name()
                .unwrap()
                .to_string_lossy()
                .starts_with("testing.jsonl.tmp.")
        );
    }
}
