//! Filesystem entry metadata.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Metadata for one file or directory inside the workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileInfo {
    pub path: PathBuf,
    pub name: String,
    pub is_directory: bool,
    /// Bytes; zero for directories.
    pub size: u64,
    /// Unix epoch milliseconds.
    pub modified_at: i64,
}

/// Recursive directory listing node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileTreeNode {
    pub info: FileInfo,
    pub children: Vec<FileTreeNode>,
}

/// Orders entries directories first, then by name (byte-wise).
pub fn sort_entries(entries: &mut [FileInfo]) {
    entries.sort_by(|left, right| {
        right
            .is_directory
            .cmp(&left.is_directory)
            .then_with(|| left.name.cmp(&right.name))
    });
}
