//! Note domain model.
//!
//! # Responsibility
//! - Hold the in-memory state of one open note.
//! - Provide mutation helpers that keep `dirty` and timestamps consistent.
//!
//! # Invariants
//! - `id` is assigned once at creation or open and never changes.
//! - A note is encrypted exactly when `encryption` is `Some`.
//! - `dirty` is cleared only by a successful save.

use crate::crypto::EncryptionAlgorithm;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Session identity of an open note.
pub type NoteId = Uuid;

const KNOWN_NOTE_EXTENSIONS: [&str; 4] = [".enc.md", ".md", ".markdown", ".txt"];

/// One open note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: NoteId,
    pub title: String,
    /// Decrypted Markdown body.
    pub content: String,
    /// Absent until the note is first saved.
    pub file_path: Option<PathBuf>,
    /// Cipher used on save; `None` stores plaintext.
    pub encryption: Option<EncryptionAlgorithm>,
    /// Unix epoch milliseconds.
    pub created_at: i64,
    /// Unix epoch milliseconds.
    pub modified_at: i64,
    pub dirty: bool,
}

impl Note {
    /// Creates a new unsaved note. New notes start dirty.
    pub fn new(title: impl Into<String>, content: impl Into<String>, now_ms: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            content: content.into(),
            file_path: None,
            encryption: None,
            created_at: now_ms,
            modified_at: now_ms,
            dirty: true,
        }
    }

    /// Builds a clean note from file contents loaded at `path`.
    pub fn loaded(
        path: PathBuf,
        content: String,
        encryption: Option<EncryptionAlgorithm>,
        modified_at: i64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title_from_path(&path),
            content,
            file_path: Some(path),
            encryption,
            created_at: modified_at,
            modified_at,
            dirty: false,
        }
    }

    pub fn is_encrypted(&self) -> bool {
        self.encryption.is_some()
    }

    /// Replaces content. Returns `false` and leaves the note untouched when
    /// the content is unchanged.
    pub fn set_content(&mut self, content: &str, now_ms: i64) -> bool {
        if self.content == content {
            return false;
        }
        self.content = content.to_string();
        self.touch(now_ms);
        true
    }

    pub fn set_title(&mut self, title: &str, now_ms: i64) -> bool {
        if self.title == title {
            return false;
        }
        self.title = title.to_string();
        self.touch(now_ms);
        true
    }

    pub fn set_encryption(
        &mut self,
        encryption: Option<EncryptionAlgorithm>,
        now_ms: i64,
    ) -> bool {
        if self.encryption == encryption {
            return false;
        }
        self.encryption = encryption;
        self.touch(now_ms);
        true
    }

    fn touch(&mut self, now_ms: i64) {
        self.dirty = true;
        self.modified_at = self.modified_at.max(now_ms);
    }
}

/// Derives a display title from a note file name.
///
/// Strips one known note extension (`.enc.md`, `.md`, `.markdown`, `.txt`,
/// case-insensitive); other extensions are kept as part of the title.
pub fn title_from_path(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let lowered = name.to_ascii_lowercase();
    for extension in KNOWN_NOTE_EXTENSIONS {
        if lowered.ends_with(extension) && lowered.len() > extension.len() {
            return name[..name.len() - extension.len()].to_string();
        }
    }
    name
}
