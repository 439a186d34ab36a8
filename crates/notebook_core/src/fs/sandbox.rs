//! Workspace root containment checks.

use super::{FsError, FsResult};
use std::fs;
use std::path::{Component, Path, PathBuf};

/// Resolves caller paths to absolute paths inside one root directory.
#[derive(Debug, Clone)]
pub struct Sandbox {
    /// Root as configured, lexically normalized.
    configured_root: PathBuf,
    /// Root with symlinks resolved; every resolved path starts with it.
    root: PathBuf,
}

impl Sandbox {
    /// Builds a sandbox over an existing directory.
    ///
    /// # Errors
    /// - `InvalidPath` when `root` is relative or not a directory.
    /// - `NotFound` when `root` does not exist.
    pub fn new(root: impl AsRef<Path>) -> FsResult<Self> {
        let configured = root.as_ref();
        if !configured.is_absolute() {
            return Err(FsError::invalid(configured, "workspace root must be absolute"));
        }
        let canonical = fs::canonicalize(configured)
            .map_err(|err| FsError::from_io("canonicalize_root", configured, err))?;
        if !canonical.is_dir() {
            return Err(FsError::invalid(configured, "workspace root is not a directory"));
        }
        Ok(Self {
            configured_root: normalize_lexically(configured),
            root: canonical,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn is_root(&self, resolved: &Path) -> bool {
        resolved == self.root
    }

    /// Maps `path` onto the canonical root.
    ///
    /// Relative paths are joined to the root. Absolute paths may be spelled
    /// with either the configured or the canonical root prefix. The deepest
    /// existing ancestor is canonicalized so symlinks cannot leave the root;
    /// the returned path itself keeps its final component unresolved.
    ///
    /// # Errors
    /// - `InvalidPath` for empty paths or paths containing NUL.
    /// - `OutsideRoot` for anything that lands outside the root.
    pub fn resolve(&self, path: impl AsRef<Path>) -> FsResult<PathBuf> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(FsError::invalid(path, "path cannot be empty"));
        }
        if path.to_string_lossy().contains('\0') {
            return Err(FsError::invalid(path, "path contains a NUL character"));
        }

        let joined = if path.is_absolute() {
            normalize_lexically(path)
        } else {
            normalize_lexically(&self.root.join(path))
        };

        let rebased = if joined.starts_with(&self.root) {
            joined
        } else if let Ok(rest) = joined.strip_prefix(&self.configured_root) {
            self.root.join(rest)
        } else {
            return Err(FsError::OutsideRoot(path.to_path_buf()));
        };

        self.ensure_no_symlink_escape(path, &rebased)?;
        Ok(rebased)
    }

    fn ensure_no_symlink_escape(&self, original: &Path, resolved: &Path) -> FsResult<()> {
        let mut ancestor = resolved;
        loop {
            if fs::symlink_metadata(ancestor).is_ok() {
                let canonical = fs::canonicalize(ancestor)
                    .map_err(|_| FsError::OutsideRoot(original.to_path_buf()))?;
                if canonical.starts_with(&self.root) {
                    return Ok(());
                }
                return Err(FsError::OutsideRoot(original.to_path_buf()));
            }
            match ancestor.parent() {
                Some(parent) if parent.starts_with(&self.root) => ancestor = parent,
                _ => return Ok(()),
            }
        }
    }
}

/// Removes `.` segments and folds `..` without touching the filesystem.
pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => normalized.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    normalized.push("..");
                }
            }
            Component::Normal(segment) => normalized.push(segment),
        }
    }
    normalized
}
