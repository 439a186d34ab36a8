//! `Storage` backed by the local filesystem.

use super::{system_time_ms, write_atomic, Storage};
use crate::model::file_info::FileInfo;
use log::debug;
use std::fs::{self, Metadata};
use std::io;
use std::path::Path;

#[derive(Debug, Clone, Copy, Default)]
pub struct LocalStorage;

impl LocalStorage {
    pub fn new() -> Self {
        Self
    }
}

impl Storage for LocalStorage {
    fn read_all(&self, path: &Path) -> io::Result<Vec<u8>> {
        fs::read(path)
    }

    fn write_atomic(&self, path: &Path, bytes: &[u8]) -> io::Result<()> {
        write_atomic(path, bytes)
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        fs::rename(from, to)
    }

    fn exists(&self, path: &Path) -> bool {
        fs::symlink_metadata(path).is_ok()
    }

    fn stat(&self, path: &Path) -> io::Result<FileInfo> {
        let metadata = fs::symlink_metadata(path)?;
        Ok(file_info(path, &metadata))
    }

    fn list(&self, dir: &Path) -> io::Result<Vec<FileInfo>> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let metadata = entry.metadata()?;
            entries.push(file_info(&entry.path(), &metadata));
        }
        Ok(entries)
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        fs::create_dir_all(path)
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        let metadata = fs::symlink_metadata(path)?;
        if metadata.is_dir() {
            fs::remove_dir_all(path)
        } else {
            fs::remove_file(path)
        }
    }

    fn copy_tree(&self, src: &Path, dst: &Path) -> io::Result<()> {
        let metadata = fs::symlink_metadata(src)?;
        if metadata.is_dir() {
            fs::create_dir(dst)?;
            for entry in fs::read_dir(src)? {
                let entry = entry?;
                if entry.file_type()?.is_symlink() {
                    debug!(
                        "event=copy_tree module=storage status=skipped reason=symlink path={}",
                        entry.path().display()
                    );
                    continue;
                }
                self.copy_tree(&entry.path(), &dst.join(entry.file_name()))?;
            }
            Ok(())
        } else if metadata.is_file() {
            let bytes = fs::read(src)?;
            write_atomic(dst, &bytes)
        } else {
            Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "only regular files and directories can be copied",
            ))
        }
    }
}

fn file_info(path: &Path, metadata: &Metadata) -> FileInfo {
    let is_directory = metadata.is_dir();
    FileInfo {
        path: path.to_path_buf(),
        name: path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default(),
        is_directory,
        size: if is_directory { 0 } else { metadata.len() },
        modified_at: metadata.modified().map(system_time_ms).unwrap_or(0),
    }
}
