//! Byte storage abstraction.
//!
//! # Responsibility
//! - Define the minimal filesystem contract the file manager builds on.
//! - Provide crash-safe atomic replacement of whole files.
//!
//! # Invariants
//! - `write_atomic` never leaves a partially written target; readers see
//!   either the old or the new content.
//! - Temporary files live next to the target so the final rename stays on
//!   one filesystem.
//! - `copy_tree` never follows symlinks: links inside a copied directory
//!   are skipped and logged, a symlink source is rejected.
//!
//! # See also
//! - `fs::file_manager` for sandboxing on top of this layer.

pub mod local;

use crate::model::file_info::FileInfo;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

pub use local::LocalStorage;

/// Filesystem operations used by the notebook.
///
/// All paths are absolute; sandbox checks happen before calls reach here.
pub trait Storage: Send + Sync {
    fn read_all(&self, path: &Path) -> io::Result<Vec<u8>>;
    fn write_atomic(&self, path: &Path, bytes: &[u8]) -> io::Result<()>;
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;
    /// `true` for any entry, including dangling symlinks.
    fn exists(&self, path: &Path) -> bool;
    fn stat(&self, path: &Path) -> io::Result<FileInfo>;
    /// Direct children of `dir`, unordered.
    fn list(&self, dir: &Path) -> io::Result<Vec<FileInfo>>;
    fn create_dir_all(&self, path: &Path) -> io::Result<()>;
    /// Removes a file, or a directory with all of its contents.
    fn remove(&self, path: &Path) -> io::Result<()>;
    /// Copies a file or a whole directory tree to a fresh `dst`.
    fn copy_tree(&self, src: &Path, dst: &Path) -> io::Result<()>;
}

/// Writes `bytes` to a sibling temp file, syncs it, then renames it over
/// `path`. The temp file is removed when any step fails.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let parent = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .ok_or_else(|| invalid_input("target path has no parent directory"))?;
    let file_name = path
        .file_name()
        .ok_or_else(|| invalid_input("target path has no file name"))?;
    let temp_path = parent.join(format!(
        ".{}.{}.tmp",
        file_name.to_string_lossy(),
        Uuid::new_v4().simple()
    ));

    let result = (|| -> io::Result<()> {
        let mut file = File::create(&temp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        fs::rename(&temp_path, path)
    })();

    if result.is_err() {
        let _ = fs::remove_file(&temp_path);
    }
    result
}

pub(crate) fn system_time_ms(time: SystemTime) -> i64 {
    time.duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as i64)
        .unwrap_or(0)
}

fn invalid_input(message: &'static str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidInput, message)
}
