//! Sandboxed workspace file management.
//!
//! # Responsibility
//! - Resolve caller paths against the workspace root and refuse escapes.
//! - Offer listing, directory, rename, move, copy and delete operations.
//!
//! # Invariants
//! - No operation touches a path outside the root, including through
//!   `..` segments or symlinks that resolve outside it.
//! - Both endpoints of rename/move/copy are validated before any existence
//!   check.
//! - The root itself can never be deleted or moved.

pub mod file_manager;
pub mod sandbox;

use log::error;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io;
use std::path::{Path, PathBuf};

pub use file_manager::FileManager;
pub use sandbox::Sandbox;

pub type FsResult<T> = Result<T, FsError>;

/// File manager failures.
#[derive(Debug)]
pub enum FsError {
    NotFound(PathBuf),
    AlreadyExists(PathBuf),
    /// Path resolves outside the workspace root.
    OutsideRoot(PathBuf),
    InvalidPath { path: PathBuf, reason: &'static str },
    Io { path: PathBuf, source: io::Error },
}

impl FsError {
    pub(crate) fn invalid(path: &Path, reason: &'static str) -> Self {
        Self::InvalidPath {
            path: path.to_path_buf(),
            reason,
        }
    }

    /// Maps an I/O error on `path`, logging anything that is not a plain
    /// not-found or already-exists condition.
    pub(crate) fn from_io(op: &'static str, path: &Path, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            io::ErrorKind::AlreadyExists => Self::AlreadyExists(path.to_path_buf()),
            _ => {
                error!(
                    "event=fs_io module=fs status=error op={} path={} error={}",
                    op,
                    path.display(),
                    err
                );
                Self::Io {
                    path: path.to_path_buf(),
                    source: err,
                }
            }
        }
    }
}

impl Display for FsError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(path) => write!(f, "path not found: {}", path.display()),
            Self::AlreadyExists(path) => write!(f, "path already exists: {}", path.display()),
            Self::OutsideRoot(path) => {
                write!(f, "path is outside the workspace root: {}", path.display())
            }
            Self::InvalidPath { path, reason } => {
                write!(f, "invalid path `{}`: {reason}", path.display())
            }
            Self::Io { path, source } => write!(f, "i/o error at {}: {source}", path.display()),
        }
    }
}

impl Error for FsError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}
