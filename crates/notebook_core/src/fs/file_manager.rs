//! Workspace file operations.

use super::sandbox::Sandbox;
use super::{FsError, FsResult};
use crate::model::file_info::{sort_entries, FileInfo, FileTreeNode};
use crate::storage::{LocalStorage, Storage};
use log::{debug, info};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// File manager confined to one workspace root.
pub struct FileManager {
    sandbox: Sandbox,
    storage: Arc<dyn Storage>,
}

impl FileManager {
    /// Opens a workspace on the local filesystem, creating `root` if needed.
    pub fn new(root: impl AsRef<Path>) -> FsResult<Self> {
        Self::with_storage(root, Arc::new(LocalStorage::new()))
    }

    pub fn with_storage(root: impl AsRef<Path>, storage: Arc<dyn Storage>) -> FsResult<Self> {
        let root = root.as_ref();
        if !root.is_absolute() {
            return Err(FsError::invalid(root, "workspace root must be absolute"));
        }
        storage
            .create_dir_all(root)
            .map_err(|err| FsError::from_io("create_root", root, err))?;
        let sandbox = Sandbox::new(root)?;
        info!(
            "event=workspace_open module=fs status=ok root={}",
            sandbox.root().display()
        );
        Ok(Self { sandbox, storage })
    }

    /// Canonical workspace root.
    pub fn root(&self) -> &Path {
        self.sandbox.root()
    }

    /// Resolves `path` inside the root without checking existence.
    pub fn resolve(&self, path: impl AsRef<Path>) -> FsResult<PathBuf> {
        self.sandbox.resolve(path)
    }

    pub fn exists(&self, path: impl AsRef<Path>) -> FsResult<bool> {
        let resolved = self.resolve(path)?;
        Ok(self.storage.exists(&resolved))
    }

    pub fn stat(&self, path: impl AsRef<Path>) -> FsResult<FileInfo> {
        let resolved = self.resolve(path)?;
        self.storage
            .stat(&resolved)
            .map_err(|err| FsError::from_io("stat", &resolved, err))
    }

    /// Lists direct children of `dir`, directories first then by name.
    pub fn list_files(&self, dir: impl AsRef<Path>) -> FsResult<Vec<FileInfo>> {
        let resolved = self.resolve(dir)?;
        let mut entries = self.list_resolved(&resolved)?;
        sort_entries(&mut entries);
        debug!(
            "event=fs_list module=fs status=ok path={} entries={}",
            resolved.display(),
            entries.len()
        );
        Ok(entries)
    }

    /// Creates `path` and any missing parents. Idempotent for directories.
    ///
    /// # Errors
    /// - `AlreadyExists` when a file occupies `path`.
    pub fn create_directory(&self, path: impl AsRef<Path>) -> FsResult<PathBuf> {
        let resolved = self.resolve(path)?;
        if self.storage.exists(&resolved) {
            let info = self.stat_resolved(&resolved)?;
            if info.is_directory {
                return Ok(resolved);
            }
            return Err(FsError::AlreadyExists(resolved));
        }
        self.storage
            .create_dir_all(&resolved)
            .map_err(|err| FsError::from_io("create_dir", &resolved, err))?;
        info!(
            "event=fs_create_dir module=fs status=ok path={}",
            resolved.display()
        );
        Ok(resolved)
    }

    /// Deletes a file or a directory tree.
    pub fn delete_file(&self, path: impl AsRef<Path>) -> FsResult<()> {
        let resolved = self.resolve(path)?;
        if self.sandbox.is_root(&resolved) {
            return Err(FsError::invalid(&resolved, "refusing to delete the workspace root"));
        }
        if !self.storage.exists(&resolved) {
            return Err(FsError::NotFound(resolved));
        }
        self.storage
            .remove(&resolved)
            .map_err(|err| FsError::from_io("delete", &resolved, err))?;
        info!(
            "event=fs_delete module=fs status=ok path={}",
            resolved.display()
        );
        Ok(())
    }

    /// Renames `old` to exactly `new`.
    pub fn rename_file(&self, old: impl AsRef<Path>, new: impl AsRef<Path>) -> FsResult<PathBuf> {
        let from = self.resolve(old)?;
        let to = self.resolve(new)?;
        self.relocate("rename", &from, to)
    }

    /// Moves `src` to `dst`, or into `dst` when it is an existing directory.
    pub fn move_file(&self, src: impl AsRef<Path>, dst: impl AsRef<Path>) -> FsResult<PathBuf> {
        let from = self.resolve(src)?;
        let to = self.resolve(dst)?;
        let target = self.into_directory_target(&from, to)?;
        self.relocate("move", &from, target)
    }

    /// Copies a file or directory tree, with the same target rule as move.
    pub fn copy_file(&self, src: impl AsRef<Path>, dst: impl AsRef<Path>) -> FsResult<PathBuf> {
        let from = self.resolve(src)?;
        let to = self.resolve(dst)?;
        if !self.storage.exists(&from) {
            return Err(FsError::NotFound(from));
        }
        let target = self.into_directory_target(&from, to)?;
        self.check_relocation_target(&from, &target)?;
        self.storage
            .copy_tree(&from, &target)
            .map_err(|err| FsError::from_io("copy", &target, err))?;
        info!(
            "event=fs_copy module=fs status=ok from={} to={}",
            from.display(),
            target.display()
        );
        Ok(target)
    }

    /// Builds the recursive listing rooted at `path`.
    pub fn file_tree(&self, path: impl AsRef<Path>) -> FsResult<FileTreeNode> {
        let resolved = self.resolve(path)?;
        let info = self.stat_resolved(&resolved)?;
        self.build_tree(info)
    }

    /// Finds files whose name matches a `*`/`?` glob.
    pub fn search_files(
        &self,
        dir: impl AsRef<Path>,
        pattern: &str,
        recursive: bool,
    ) -> FsResult<Vec<FileInfo>> {
        let resolved = self.resolve(dir)?;
        if pattern.trim().is_empty() {
            return Err(FsError::invalid(&resolved, "search pattern cannot be empty"));
        }
        let matcher = glob_to_regex(pattern)
            .map_err(|_| FsError::invalid(&resolved, "search pattern is not a valid glob"))?;

        let mut matches = Vec::new();
        self.collect_matches(&resolved, &matcher, recursive, &mut matches)?;
        sort_entries(&mut matches);
        Ok(matches)
    }

    /// Total size in bytes of all files under `dir`.
    pub fn directory_size(&self, dir: impl AsRef<Path>) -> FsResult<u64> {
        let resolved = self.resolve(dir)?;
        self.size_of(&resolved)
    }

    pub fn read_file(&self, path: impl AsRef<Path>) -> FsResult<Vec<u8>> {
        let resolved = self.resolve(path)?;
        self.storage
            .read_all(&resolved)
            .map_err(|err| FsError::from_io("read", &resolved, err))
    }

    /// Atomically writes `bytes`, creating missing parent directories.
    pub fn write_file(&self, path: impl AsRef<Path>, bytes: &[u8]) -> FsResult<PathBuf> {
        let resolved = self.resolve(path)?;
        if self.sandbox.is_root(&resolved) {
            return Err(FsError::invalid(&resolved, "cannot write to the workspace root"));
        }
        if let Some(parent) = resolved.parent() {
            self.storage
                .create_dir_all(parent)
                .map_err(|err| FsError::from_io("create_parent", parent, err))?;
        }
        self.storage
            .write_atomic(&resolved, bytes)
            .map_err(|err| FsError::from_io("write", &resolved, err))?;
        debug!(
            "event=fs_write module=fs status=ok path={} bytes={}",
            resolved.display(),
            bytes.len()
        );
        Ok(resolved)
    }

    fn relocate(&self, op: &'static str, from: &Path, to: PathBuf) -> FsResult<PathBuf> {
        if !self.storage.exists(from) {
            return Err(FsError::NotFound(from.to_path_buf()));
        }
        self.check_relocation_target(from, &to)?;
        self.storage
            .rename(from, &to)
            .map_err(|err| FsError::from_io(op, &to, err))?;
        info!(
            "event=fs_{} module=fs status=ok from={} to={}",
            op,
            from.display(),
            to.display()
        );
        Ok(to)
    }

    fn check_relocation_target(&self, from: &Path, to: &Path) -> FsResult<()> {
        if self.sandbox.is_root(from) {
            return Err(FsError::invalid(from, "the workspace root cannot be relocated"));
        }
        if self.storage.exists(to) {
            return Err(FsError::AlreadyExists(to.to_path_buf()));
        }
        if to.starts_with(from) {
            return Err(FsError::invalid(to, "cannot place a directory inside itself"));
        }
        match to.parent() {
            Some(parent) if self.storage.exists(parent) => Ok(()),
            Some(parent) => Err(FsError::NotFound(parent.to_path_buf())),
            None => Err(FsError::invalid(to, "target has no parent directory")),
        }
    }

    fn into_directory_target(&self, from: &Path, to: PathBuf) -> FsResult<PathBuf> {
        if !self.storage.exists(&to) || !self.stat_resolved(&to)?.is_directory {
            return Ok(to);
        }
        match from.file_name() {
            Some(name) => Ok(to.join(name)),
            None => Err(FsError::invalid(from, "source has no file name")),
        }
    }

    fn stat_resolved(&self, resolved: &Path) -> FsResult<FileInfo> {
        self.storage
            .stat(resolved)
            .map_err(|err| FsError::from_io("stat", resolved, err))
    }

    fn list_resolved(&self, resolved: &Path) -> FsResult<Vec<FileInfo>> {
        let info = self.stat_resolved(resolved)?;
        if !info.is_directory {
            return Err(FsError::invalid(resolved, "not a directory"));
        }
        self.storage
            .list(resolved)
            .map_err(|err| FsError::from_io("list", resolved, err))
    }

    fn build_tree(&self, info: FileInfo) -> FsResult<FileTreeNode> {
        if !info.is_directory {
            return Ok(FileTreeNode {
                info,
                children: Vec::new(),
            });
        }
        let mut entries = self.list_resolved(&info.path)?;
        sort_entries(&mut entries);
        let children = entries
            .into_iter()
            .map(|entry| self.build_tree(entry))
            .collect::<FsResult<Vec<_>>>()?;
        Ok(FileTreeNode { info, children })
    }

    fn collect_matches(
        &self,
        dir: &Path,
        matcher: &Regex,
        recursive: bool,
        out: &mut Vec<FileInfo>,
    ) -> FsResult<()> {
        for entry in self.list_resolved(dir)? {
            if entry.is_directory {
                if recursive {
                    self.collect_matches(&entry.path, matcher, recursive, out)?;
                }
            } else if matcher.is_match(&entry.name) {
                out.push(entry);
            }
        }
        Ok(())
    }

    fn size_of(&self, path: &Path) -> FsResult<u64> {
        let info = self.stat_resolved(path)?;
        if !info.is_directory {
            return Ok(info.size);
        }
        let mut total = 0_u64;
        for entry in self.list_resolved(path)? {
            total += if entry.is_directory {
                self.size_of(&entry.path)?
            } else {
                entry.size
            };
        }
        Ok(total)
    }
}

fn glob_to_regex(pattern: &str) -> Result<Regex, regex::Error> {
    let mut source = String::with_capacity(pattern.len() + 2);
    source.push('^');
    let mut buffer = [0_u8; 4];
    for ch in pattern.chars() {
        match ch {
            '*' => source.push_str(".*"),
            '?' => source.push('.'),
            other => source.push_str(&regex::escape(other.encode_utf8(&mut buffer))),
        }
    }
    source.push('$');
    Regex::new(&source)
}
