//! User settings model and validation.
//!
//! # Responsibility
//! - Define the persisted user configuration and its defaults.
//! - Validate candidate settings before they are accepted.
//!
//! # Invariants
//! - `auto_save_interval` is in `1..=60` minutes for accepted settings.
//! - `default_save_location` is a non-empty absolute path.
//! - Unknown JSON fields survive a load/save round-trip through `extra`.

use crate::crypto::EncryptionAlgorithm;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::time::Duration;

pub const SETTINGS_SCHEMA_VERSION: u32 = 1;
pub const MIN_AUTO_SAVE_MINUTES: u32 = 1;
pub const MAX_AUTO_SAVE_MINUTES: u32 = 60;
pub const DEFAULT_AUTO_SAVE_MINUTES: u32 = 5;

const DEFAULT_NOTES_DIR: &str = "NotebookApp/notes";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
    #[default]
    Auto,
}

impl Theme {
    pub const ALL: [Theme; 3] = [Self::Light, Self::Dark, Self::Auto];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
            Self::Auto => "auto",
        }
    }
}

/// Persisted user configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    pub schema_version: u32,
    pub default_encryption: EncryptionAlgorithm,
    /// Minutes between autosave ticks.
    pub auto_save_interval: u32,
    pub default_save_location: PathBuf,
    pub biometric_enabled: bool,
    pub theme: Theme,
    /// Fields written by newer versions; preserved verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            schema_version: SETTINGS_SCHEMA_VERSION,
            default_encryption: EncryptionAlgorithm::Aes256Gcm,
            auto_save_interval: DEFAULT_AUTO_SAVE_MINUTES,
            default_save_location: default_save_location(),
            biometric_enabled: false,
            theme: Theme::Auto,
            extra: Map::new(),
        }
    }
}

impl Settings {
    pub fn with_default_encryption(mut self, algorithm: EncryptionAlgorithm) -> Self {
        self.default_encryption = algorithm;
        self
    }

    pub fn with_auto_save_interval(mut self, minutes: u32) -> Self {
        self.auto_save_interval = minutes;
        self
    }

    pub fn with_default_save_location(mut self, location: impl Into<PathBuf>) -> Self {
        self.default_save_location = location.into();
        self
    }

    pub fn with_biometric_enabled(mut self, enabled: bool) -> Self {
        self.biometric_enabled = enabled;
        self
    }

    pub fn with_theme(mut self, theme: Theme) -> Self {
        self.theme = theme;
        self
    }

    pub fn auto_save_period(&self) -> Duration {
        Duration::from_secs(u64::from(self.auto_save_interval) * 60)
    }

    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }

    /// Checks every field and reports all problems at once.
    ///
    /// # Errors
    /// - Returns `SettingsValidationError` listing each offending field.
    pub fn validate(&self) -> Result<(), SettingsValidationError> {
        let mut issues = Vec::new();

        if !(MIN_AUTO_SAVE_MINUTES..=MAX_AUTO_SAVE_MINUTES).contains(&self.auto_save_interval) {
            issues.push(FieldIssue::new(
                "autoSaveInterval",
                format!(
                    "must be between {MIN_AUTO_SAVE_MINUTES} and {MAX_AUTO_SAVE_MINUTES} minutes, got {}",
                    self.auto_save_interval
                ),
            ));
        }
        if self.default_save_location.as_os_str().is_empty() {
            issues.push(FieldIssue::new("defaultSaveLocation", "cannot be empty"));
        } else if !self.default_save_location.is_absolute() {
            issues.push(FieldIssue::new(
                "defaultSaveLocation",
                format!(
                    "must be an absolute path, got `{}`",
                    self.default_save_location.display()
                ),
            ));
        }
        if self.schema_version == 0 || self.schema_version > SETTINGS_SCHEMA_VERSION {
            issues.push(FieldIssue::new(
                "schemaVersion",
                format!(
                    "unsupported schema version {}; expected 1..={SETTINGS_SCHEMA_VERSION}",
                    self.schema_version
                ),
            ));
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(SettingsValidationError { issues })
        }
    }
}

pub fn supported_encryption_algorithms() -> &'static [EncryptionAlgorithm] {
    &EncryptionAlgorithm::ALL
}

pub fn supported_themes() -> &'static [Theme] {
    &Theme::ALL
}

/// `<documents>/NotebookApp/notes`, falling back to the home directory and
/// then the temp directory when the platform has no documents folder.
pub fn default_save_location() -> PathBuf {
    dirs::document_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(std::env::temp_dir)
        .join(DEFAULT_NOTES_DIR)
}

/// One rejected settings field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldIssue {
    /// Serialized (camelCase) field name.
    pub field: &'static str,
    pub reason: String,
}

impl FieldIssue {
    fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

/// Settings rejected by `Settings::validate`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsValidationError {
    pub issues: Vec<FieldIssue>,
}

impl SettingsValidationError {
    pub fn has_field(&self, field: &str) -> bool {
        self.issues.iter().any(|issue| issue.field == field)
    }
}

impl Display for SettingsValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid settings:")?;
        for issue in &self.issues {
            write!(f, " {}: {};", issue.field, issue.reason)?;
        }
        Ok(())
    }
}

impl Error for SettingsValidationError {}
