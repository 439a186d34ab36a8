//! Open-note registry and persistence.
//!
//! # Responsibility
//! - Own the set of open notes and their in-memory state.
//! - Load and save note files, encrypting and decrypting as configured.
//!
//! # Invariants
//! - A note is registered at most once per file path.
//! - Saves of one note are serialized; `dirty` is cleared only when no edit
//!   happened between the content snapshot and the completed write.
//! - The registry lock is never held while a per-note lock is acquired.
//! - An encrypted file is only handed out after its envelope authenticated
//!   the supplied secret, even when the note is already open.

pub mod note_repo;

use crate::capability::BiometricError;
use crate::crypto::CryptoError;
use crate::fs::FsError;
use crate::model::note::NoteId;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub use note_repo::{AutosaveOutcome, NoteRepository, OpenOutcome};

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository-level failures.
#[derive(Debug)]
pub enum RepoError {
    Fs(FsError),
    Crypto(CryptoError),
    NoteNotFound(NoteId),
    /// Decryption of the file at this path failed authentication.
    InvalidPassword(PathBuf),
    /// An encrypted note has no password, session secret or biometric key.
    PasswordRequired(NoteId),
    Biometric(BiometricError),
    /// Close was refused because the note has unsaved changes.
    DirtyNote(NoteId),
    /// The save was cancelled before the file was written.
    Cancelled(NoteId),
    /// The open was cancelled before the note was registered.
    OpenCancelled(PathBuf),
    InvalidUtf8(PathBuf),
}

impl RepoError {
    pub fn is_wrong_password(&self) -> bool {
        matches!(self, Self::InvalidPassword(_))
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fs(err) => write!(f, "{err}"),
            Self::Crypto(err) => write!(f, "{err}"),
            Self::NoteNotFound(id) => write!(f, "note not open: {id}"),
            Self::InvalidPassword(path) => write!(f, "wrong password for {}", path.display()),
            Self::PasswordRequired(id) => write!(f, "password required to save note {id}"),
            Self::Biometric(err) => write!(f, "{err}"),
            Self::DirtyNote(id) => write!(f, "note {id} has unsaved changes"),
            Self::Cancelled(id) => write!(f, "save of note {id} was cancelled"),
            Self::OpenCancelled(path) => write!(f, "open of {} was cancelled", path.display()),
            Self::InvalidUtf8(path) => write!(f, "note file is not valid UTF-8: {}", path.display()),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Fs(err) => Some(err),
            Self::Crypto(err) => Some(err),
            Self::Biometric(err) => Some(err),
            _ => None,
        }
    }
}

impl From<FsError> for RepoError {
    fn from(value: FsError) -> Self {
        Self::Fs(value)
    }
}

impl From<CryptoError> for RepoError {
    fn from(value: CryptoError) -> Self {
        Self::Crypto(value)
    }
}

impl From<BiometricError> for RepoError {
    fn from(value: BiometricError) -> Self {
        Self::Biometric(value)
    }
}
