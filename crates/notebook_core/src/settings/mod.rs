//! Persistent user settings.
//!
//! # Responsibility
//! - Load, validate and atomically persist `Settings` as JSON.
//! - Notify subscribers after each accepted change.
//!
//! # Invariants
//! - Rejected settings never replace the current value and never notify.
//! - A missing settings file means defaults, not an error.

pub mod store;

use crate::model::settings::SettingsValidationError;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io;
use std::path::PathBuf;

pub use store::SettingsStore;

pub type SettingsResult<T> = Result<T, SettingsError>;

#[derive(Debug)]
pub enum SettingsError {
    Validation(SettingsValidationError),
    Io { path: PathBuf, source: io::Error },
    /// The settings file is not valid JSON for `Settings`.
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    Serialize(serde_json::Error),
    /// No per-user configuration directory on this platform.
    NoConfigDir,
}

impl SettingsError {
    pub fn validation(&self) -> Option<&SettingsValidationError> {
        match self {
            Self::Validation(err) => Some(err),
            _ => None,
        }
    }
}

impl Display for SettingsError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Io { path, source } => {
                write!(f, "settings io error at `{}`: {source}", path.display())
            }
            Self::Parse { path, source } => {
                write!(f, "invalid settings file `{}`: {source}", path.display())
            }
            Self::Serialize(err) => write!(f, "failed to serialize settings: {err}"),
            Self::NoConfigDir => write!(f, "no per-user configuration directory available"),
        }
    }
}

impl Error for SettingsError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Io { source, .. } => Some(source),
            Self::Parse { source, .. } => Some(source),
            Self::Serialize(err) => Some(err),
            Self::NoConfigDir => None,
        }
    }
}

impl From<SettingsValidationError> for SettingsError {
    fn from(value: SettingsValidationError) -> Self {
        Self::Validation(value)
    }
}
