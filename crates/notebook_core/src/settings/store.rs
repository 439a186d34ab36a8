//! JSON-file backed settings store.

use super::{SettingsError, SettingsResult};
use crate::model::settings::{Settings, SettingsValidationError};
use crate::service::events::call_guarded;
use crate::storage;
use log::{info, warn};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

const SETTINGS_DIR: &str = "notebook";
const SETTINGS_FILE: &str = "settings.json";

type ChangeListener = Arc<dyn Fn(&Settings) + Send + Sync>;

/// Current settings plus their backing file.
///
/// Readers get a cheap `Arc` snapshot; saves swap the pointer.
pub struct SettingsStore {
    path: PathBuf,
    current: RwLock<Arc<Settings>>,
    listeners: RwLock<Vec<ChangeListener>>,
    save_lock: Mutex<()>,
}

impl SettingsStore {
    /// Store at `path` holding defaults until [`load`](Self::load) runs.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            current: RwLock::new(Arc::new(Settings::default())),
            listeners: RwLock::new(Vec::new()),
            save_lock: Mutex::new(()),
        }
    }

    /// Store at `path` with the file already loaded.
    pub fn open(path: impl Into<PathBuf>) -> SettingsResult<Self> {
        let store = Self::new(path);
        store.load()?;
        Ok(store)
    }

    /// Store at [`default_path`](Self::default_path).
    pub fn open_default() -> SettingsResult<Self> {
        Self::open(Self::default_path()?)
    }

    /// `<config dir>/notebook/settings.json`.
    pub fn default_path() -> SettingsResult<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join(SETTINGS_DIR).join(SETTINGS_FILE))
            .ok_or(SettingsError::NoConfigDir)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the file into the current value. A missing file yields
    /// defaults; unreadable or invalid content leaves the current value
    /// untouched.
    pub fn load(&self) -> SettingsResult<Arc<Settings>> {
        let loaded = match std::fs::read(&self.path) {
            Ok(bytes) => {
                let parsed: Settings =
                    serde_json::from_slice(&bytes).map_err(|source| SettingsError::Parse {
                        path: self.path.clone(),
                        source,
                    })?;
                parsed.validate()?;
                parsed
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    "event=settings_load module=settings status=default path={}",
                    self.path.display()
                );
                Settings::default()
            }
            Err(source) => {
                return Err(SettingsError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        let loaded = Arc::new(loaded);
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Arc::clone(&loaded);
        info!(
            "event=settings_load module=settings status=ok path={} unknown_fields={}",
            self.path.display(),
            loaded.extra.len()
        );
        Ok(loaded)
    }

    pub fn current(&self) -> Arc<Settings> {
        Arc::clone(&self.current.read().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn validate(&self, candidate: &Settings) -> Result<(), SettingsValidationError> {
        candidate.validate()
    }

    /// Validates, writes atomically, swaps the current value and then
    /// notifies listeners in registration order.
    ///
    /// Listeners run on the saving thread and must not call `save`.
    ///
    /// # Errors
    /// - `Validation` lists every rejected field; nothing is written.
    /// - `Io` / `Serialize` when persisting fails; the current value stays.
    pub fn save(&self, settings: Settings) -> SettingsResult<Arc<Settings>> {
        let _guard = self.save_lock.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(err) = settings.validate() {
            warn!(
                "event=settings_save module=settings status=rejected fields={}",
                err.issues
                    .iter()
                    .map(|issue| issue.field)
                    .collect::<Vec<_>>()
                    .join(",")
            );
            return Err(err.into());
        }

        let json = serde_json::to_vec_pretty(&settings).map_err(SettingsError::Serialize)?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| SettingsError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        storage::write_atomic(&self.path, &json).map_err(|source| SettingsError::Io {
            path: self.path.clone(),
            source,
        })?;

        let saved = Arc::new(settings);
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Arc::clone(&saved);
        info!(
            "event=settings_save module=settings status=ok path={}",
            self.path.display()
        );

        let listeners: Vec<ChangeListener> = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let snapshot: &Settings = &saved;
        for listener in listeners {
            call_guarded("settings", "settings_changed", || listener(snapshot));
        }
        Ok(saved)
    }

    /// Applies `change` to a copy of the current value and saves it.
    pub fn update(&self, change: impl FnOnce(Settings) -> Settings) -> SettingsResult<Arc<Settings>> {
        let candidate = change(Settings::clone(&self.current()));
        self.save(candidate)
    }

    /// Registers `listener` for every accepted save.
    pub fn on_change(&self, listener: impl Fn(&Settings) + Send + Sync + 'static) {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(listener));
    }
}
