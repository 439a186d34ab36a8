//! In-memory registry of open notes backed by workspace files.
//!
//! # Responsibility
//! - Create, open, edit, save and close notes.
//! - Keep a session secret per encrypted note so autosave can re-encrypt.
//!
//! # Invariants
//! - Lock order is save lock, then state lock or registry lock; the
//!   registry lock is released before any per-note lock is taken.
//! - Encryption runs outside the state lock so edits never wait on the KDF.
//! - A cancelled save writes nothing.

use super::{RepoError, RepoResult};
use crate::cancel::CancelToken;
use crate::capability::{BiometricError, BiometricUnlock, Clock};
use crate::crypto::{self, CryptoError, EncryptionAlgorithm};
use crate::fs::{FileManager, FsError};
use crate::model::note::{Note, NoteId};
use log::{debug, info, warn};
use std::collections::HashMap;
use std::fmt::{Debug, Formatter};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

const PLAIN_EXTENSION: &str = ".md";
const ENCRYPTED_EXTENSION: &str = ".enc.md";
const MAX_FILE_STEM_CHARS: usize = 100;
const MAX_NAME_SUFFIX: u32 = 10_000;

/// Result of opening a note file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpenOutcome {
    Opened(Note),
    /// The file is encrypted; retry with `open_encrypted` or
    /// `open_with_biometric`.
    NeedsPassword { file_path: PathBuf },
}

/// Result of one autosave tick for a note.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AutosaveOutcome {
    Saved(Note),
    Clean,
    /// Dirty but not saveable in the background; the reason is a log key.
    Skipped(&'static str),
    /// The note is no longer open.
    Missing,
}

#[derive(Clone)]
enum Secret {
    Password(String),
    KeyMaterial(Vec<u8>),
}

impl Secret {
    fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Password(password) => password.as_bytes(),
            Self::KeyMaterial(key) => key,
        }
    }
}

impl Debug for Secret {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Password(_) => f.write_str("Secret::Password(..)"),
            Self::KeyMaterial(_) => f.write_str("Secret::KeyMaterial(..)"),
        }
    }
}

#[derive(Debug)]
struct NoteState {
    note: Note,
    /// Bumped on every accepted edit.
    revision: u64,
    secret: Option<Secret>,
}

#[derive(Debug)]
struct NoteEntry {
    state: Mutex<NoteState>,
    save_lock: Mutex<()>,
}

impl NoteEntry {
    fn new(note: Note, secret: Option<Secret>) -> Self {
        Self {
            state: Mutex::new(NoteState {
                note,
                revision: 0,
                secret,
            }),
            save_lock: Mutex::new(()),
        }
    }

    fn snapshot(&self) -> Note {
        lock(&self.state).note.clone()
    }
}

#[derive(Debug, Default)]
struct Registry {
    notes: HashMap<NoteId, Arc<NoteEntry>>,
    by_path: HashMap<PathBuf, NoteId>,
}

/// Registry of open notes.
pub struct NoteRepository {
    files: Arc<FileManager>,
    clock: Arc<dyn Clock>,
    biometric: Option<Arc<dyn BiometricUnlock>>,
    biometric_enabled: AtomicBool,
    registry: RwLock<Registry>,
}

impl NoteRepository {
    pub fn new(files: Arc<FileManager>, clock: Arc<dyn Clock>) -> Self {
        Self {
            files,
            clock,
            biometric: None,
            biometric_enabled: AtomicBool::new(false),
            registry: RwLock::new(Registry::default()),
        }
    }

    pub fn with_biometric(mut self, unlock: Arc<dyn BiometricUnlock>) -> Self {
        self.biometric = Some(unlock);
        self
    }

    pub fn set_biometric_enabled(&self, enabled: bool) {
        self.biometric_enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn files(&self) -> &Arc<FileManager> {
        &self.files
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Registers a new, unsaved note.
    pub fn create(&self, title: &str, content: &str) -> Note {
        let note = Note::new(title, content, self.clock.now_ms());
        let id = note.id;
        write(&self.registry)
            .notes
            .insert(id, Arc::new(NoteEntry::new(note.clone(), None)));
        info!("event=note_create module=repo status=ok note_id={}", id);
        note
    }

    /// Opens a plaintext note, or reports that the file needs a password.
    ///
    /// Opening a plaintext path that is already open returns the open note.
    /// An encrypted file always reports `NeedsPassword`, open or not.
    pub fn open(&self, path: impl AsRef<Path>) -> RepoResult<OpenOutcome> {
        self.open_cancellable(path, &CancelToken::new())
    }

    /// [`open`](Self::open) that gives up with `OpenCancelled` when `cancel`
    /// fires before the note is registered.
    pub fn open_cancellable(
        &self,
        path: impl AsRef<Path>,
        cancel: &CancelToken,
    ) -> RepoResult<OpenOutcome> {
        let resolved = self.files.resolve(path)?;
        let bytes = self.files.read_file(&resolved)?;
        if crypto::is_encrypted_blob(&bytes) {
            info!(
                "event=note_open module=repo status=needs_password path={}",
                resolved.display()
            );
            return Ok(OpenOutcome::NeedsPassword {
                file_path: resolved,
            });
        }
        self.open_plaintext(resolved, bytes, cancel)
            .map(OpenOutcome::Opened)
    }

    /// Opens an encrypted note with a password.
    ///
    /// The password is checked against the file even when the note is
    /// already open; on success the open note is returned.
    ///
    /// # Errors
    /// - `InvalidPassword` when authentication fails.
    /// - `Crypto` for a malformed header or unknown algorithm.
    pub fn open_encrypted(&self, path: impl AsRef<Path>, password: &str) -> RepoResult<Note> {
        self.open_encrypted_cancellable(path, password, &CancelToken::new())
    }

    /// [`open_encrypted`](Self::open_encrypted) with cancellation checked
    /// after the key derivation and decryption.
    pub fn open_encrypted_cancellable(
        &self,
        path: impl AsRef<Path>,
        password: &str,
        cancel: &CancelToken,
    ) -> RepoResult<Note> {
        let resolved = self.files.resolve(path)?;
        self.open_blob(resolved, Secret::Password(password.to_string()), cancel)
    }

    /// Opens an encrypted note with the key held by the biometric store.
    pub fn open_with_biometric(&self, path: impl AsRef<Path>) -> RepoResult<Note> {
        let resolved = self.files.resolve(path)?;
        let key = self.biometric_key(&resolved)?;
        self.open_blob(resolved, Secret::KeyMaterial(key), &CancelToken::new())
    }

    /// Saves the note to its current path, deriving one from the title when
    /// it has none. Saving a clean note that already has a path is a no-op.
    ///
    /// # Errors
    /// - `PasswordRequired` for an encrypted note with no usable secret.
    /// - `Cancelled` when `cancel` fired before the write started.
    pub fn save(&self, id: NoteId, password: Option<&str>, cancel: &CancelToken) -> RepoResult<Note> {
        self.save_to(id, None, password, cancel)
    }

    /// Saves the note to `path` and makes it the note's path.
    pub fn save_as(
        &self,
        id: NoteId,
        path: impl AsRef<Path>,
        password: Option<&str>,
        cancel: &CancelToken,
    ) -> RepoResult<Note> {
        let resolved = self.files.resolve(path)?;
        self.save_to(id, Some(resolved), password, cancel)
    }

    /// One background save attempt.
    pub fn autosave(&self, id: NoteId) -> RepoResult<AutosaveOutcome> {
        let entry = match self.entry(id) {
            Ok(entry) => entry,
            Err(RepoError::NoteNotFound(_)) => return Ok(AutosaveOutcome::Missing),
            Err(err) => return Err(err),
        };
        {
            let state = lock(&entry.state);
            if !state.note.dirty {
                return Ok(AutosaveOutcome::Clean);
            }
            if state.note.file_path.is_none() {
                return Ok(AutosaveOutcome::Skipped("no_file_path"));
            }
            if state.note.is_encrypted() && state.secret.is_none() && !self.biometric_ready() {
                return Ok(AutosaveOutcome::Skipped("no_secret"));
            }
        }

        match self.save(id, None, &CancelToken::new()) {
            Ok(note) => Ok(AutosaveOutcome::Saved(note)),
            Err(RepoError::NoteNotFound(_)) => Ok(AutosaveOutcome::Missing),
            Err(err) => Err(err),
        }
    }

    /// Replaces note content. Returns whether anything changed.
    pub fn update_content(&self, id: NoteId, content: &str) -> RepoResult<bool> {
        self.mutate(id, |note, now| note.set_content(content, now))
            .map(|(changed, _)| changed)
    }

    pub fn rename_title(&self, id: NoteId, title: &str) -> RepoResult<bool> {
        self.mutate(id, |note, now| note.set_title(title, now))
            .map(|(changed, _)| changed)
    }

    /// Chooses the cipher for future saves; `None` stores plaintext.
    pub fn set_encryption(
        &self,
        id: NoteId,
        encryption: Option<EncryptionAlgorithm>,
    ) -> RepoResult<Note> {
        self.mutate(id, |note, now| note.set_encryption(encryption, now))
            .map(|(_, note)| note)
    }

    /// Unregisters a note. Waits for an in-flight save to finish.
    ///
    /// # Errors
    /// - `DirtyNote` when the note has unsaved changes and `force` is false.
    pub fn close(&self, id: NoteId, force: bool) -> RepoResult<()> {
        let entry = self.entry(id)?;
        let _save_guard = lock(&entry.save_lock);
        if !force && lock(&entry.state).note.dirty {
            return Err(RepoError::DirtyNote(id));
        }

        let mut registry = write(&self.registry);
        registry.notes.remove(&id);
        registry.by_path.retain(|_, owner| *owner != id);
        info!(
            "event=note_close module=repo status=ok note_id={} forced={}",
            id, force
        );
        Ok(())
    }

    pub fn get(&self, id: NoteId) -> RepoResult<Note> {
        Ok(self.entry(id)?.snapshot())
    }

    pub fn is_dirty(&self, id: NoteId) -> RepoResult<bool> {
        Ok(lock(&self.entry(id)?.state).note.dirty)
    }

    /// Snapshots of every open note, most recently modified first.
    pub fn list_open(&self) -> Vec<Note> {
        let entries: Vec<Arc<NoteEntry>> = read(&self.registry).notes.values().cloned().collect();
        let mut notes: Vec<Note> = entries.iter().map(|entry| entry.snapshot()).collect();
        notes.sort_by(|left, right| {
            right
                .modified_at
                .cmp(&left.modified_at)
                .then_with(|| left.id.cmp(&right.id))
        });
        notes
    }

    fn save_to(
        &self,
        id: NoteId,
        target: Option<PathBuf>,
        password: Option<&str>,
        cancel: &CancelToken,
    ) -> RepoResult<Note> {
        let entry = self.entry(id)?;
        let _save_guard = lock(&entry.save_lock);

        let (snapshot, revision, stored_secret) = {
            let state = lock(&entry.state);
            if target.is_none() && !state.note.dirty && state.note.file_path.is_some() {
                debug!("event=note_save module=repo status=skip reason=clean note_id={}", id);
                return Ok(state.note.clone());
            }
            (state.note.clone(), state.revision, state.secret.clone())
        };

        let (path, claimed) = match target {
            Some(path) => {
                let claimed = self.claim_path(id, &path)?;
                (path, claimed)
            }
            None => match snapshot.file_path.clone() {
                Some(path) => (path, false),
                None => (self.claim_derived_path(id, &snapshot)?, true),
            },
        };

        let (written, byte_count, used_secret) =
            match self.seal_and_write(id, &path, snapshot, password, stored_secret, cancel) {
                Ok(done) => done,
                Err(err) => {
                    if claimed {
                        self.release_claim(id, &path);
                    }
                    return Err(err);
                }
            };

        let now = self.clock.now_ms();
        let (note, previous_path) = {
            let mut state = lock(&entry.state);
            let previous = state.note.file_path.replace(written.clone());
            state.note.modified_at = state.note.modified_at.max(now);
            if state.revision == revision {
                state.note.dirty = false;
            }
            if let Some(secret) = used_secret {
                state.secret = Some(secret);
            }
            (state.note.clone(), previous)
        };

        if previous_path.as_ref() != Some(&written) || written != path {
            let mut registry = write(&self.registry);
            for stale in previous_path.iter().chain(std::iter::once(&path)) {
                if *stale != written && registry.by_path.get(stale) == Some(&id) {
                    registry.by_path.remove(stale);
                }
            }
            if registry.notes.contains_key(&id) {
                registry.by_path.insert(written.clone(), id);
            } else if registry.by_path.get(&written) == Some(&id) {
                registry.by_path.remove(&written);
            }
        }

        info!(
            "event=note_save module=repo status=ok note_id={} path={} bytes={} encrypted={} still_dirty={}",
            id,
            written.display(),
            byte_count,
            note.is_encrypted(),
            note.dirty
        );
        Ok(note)
    }

    /// Encrypts when configured, honors `cancel`, then writes atomically.
    fn seal_and_write(
        &self,
        id: NoteId,
        path: &Path,
        snapshot: Note,
        password: Option<&str>,
        stored_secret: Option<Secret>,
        cancel: &CancelToken,
    ) -> RepoResult<(PathBuf, usize, Option<Secret>)> {
        let (bytes, used_secret) = match snapshot.encryption {
            None => (snapshot.content.into_bytes(), None),
            Some(algorithm) => {
                let secret = self.resolve_secret(id, path, password, stored_secret)?;
                let sealed = crypto::encrypt(snapshot.content.as_bytes(), secret.as_bytes(), algorithm)?;
                (sealed, Some(secret))
            }
        };

        if cancel.is_cancelled() {
            info!("event=note_save module=repo status=cancelled note_id={}", id);
            return Err(RepoError::Cancelled(id));
        }

        let written = self.files.write_file(path, &bytes)?;
        Ok((written, bytes.len(), used_secret))
    }

    fn open_plaintext(
        &self,
        resolved: PathBuf,
        bytes: Vec<u8>,
        cancel: &CancelToken,
    ) -> RepoResult<Note> {
        ensure_open_not_cancelled(cancel, &resolved)?;
        if let Some(entry) = self.registered_at(&resolved) {
            return Ok(entry.snapshot());
        }
        let content =
            String::from_utf8(bytes).map_err(|_| RepoError::InvalidUtf8(resolved.clone()))?;
        Ok(self.register_loaded(resolved, content, None, None))
    }

    /// Decrypts before consulting the registry so an open note is only
    /// returned to a caller holding the right secret.
    fn open_blob(&self, resolved: PathBuf, secret: Secret, cancel: &CancelToken) -> RepoResult<Note> {
        let bytes = self.files.read_file(&resolved)?;
        if !crypto::is_encrypted_blob(&bytes) {
            return self.open_plaintext(resolved, bytes, cancel);
        }

        let algorithm = crypto::peek_algorithm(&bytes)?;
        let plaintext = crypto::decrypt(&bytes, secret.as_bytes()).map_err(|err| match err {
            CryptoError::InvalidPassword => {
                warn!(
                    "event=note_open module=repo status=error reason=invalid_password path={}",
                    resolved.display()
                );
                RepoError::InvalidPassword(resolved.clone())
            }
            other => RepoError::Crypto(other),
        })?;
        ensure_open_not_cancelled(cancel, &resolved)?;
        let content =
            String::from_utf8(plaintext).map_err(|_| RepoError::InvalidUtf8(resolved.clone()))?;
        Ok(self.register_loaded(resolved, content, Some(algorithm), Some(secret)))
    }

    fn register_loaded(
        &self,
        path: PathBuf,
        content: String,
        encryption: Option<EncryptionAlgorithm>,
        secret: Option<Secret>,
    ) -> Note {
        let modified_at = self
            .files
            .stat(&path)
            .map(|info| info.modified_at)
            .unwrap_or_else(|_| self.clock.now_ms());
        let note = Note::loaded(path.clone(), content, encryption, modified_at);

        let existing = {
            let mut registry = write(&self.registry);
            let existing = registry
                .by_path
                .get(&path)
                .and_then(|id| registry.notes.get(id))
                .cloned();
            if existing.is_none() {
                registry.by_path.insert(path.clone(), note.id);
                registry
                    .notes
                    .insert(note.id, Arc::new(NoteEntry::new(note.clone(), secret)));
            }
            existing
        };
        if let Some(entry) = existing {
            return entry.snapshot();
        }

        info!(
            "event=note_open module=repo status=ok note_id={} path={} encrypted={}",
            note.id,
            path.display(),
            note.is_encrypted()
        );
        note
    }

    fn mutate(
        &self,
        id: NoteId,
        apply: impl FnOnce(&mut Note, i64) -> bool,
    ) -> RepoResult<(bool, Note)> {
        let entry = self.entry(id)?;
        let now = self.clock.now_ms();
        let mut state = lock(&entry.state);
        let changed = apply(&mut state.note, now);
        if changed {
            state.revision += 1;
        }
        Ok((changed, state.note.clone()))
    }

    fn entry(&self, id: NoteId) -> RepoResult<Arc<NoteEntry>> {
        read(&self.registry)
            .notes
            .get(&id)
            .cloned()
            .ok_or(RepoError::NoteNotFound(id))
    }

    fn registered_at(&self, path: &Path) -> Option<Arc<NoteEntry>> {
        let registry = read(&self.registry);
        registry
            .by_path
            .get(path)
            .and_then(|id| registry.notes.get(id))
            .cloned()
    }

    fn resolve_secret(
        &self,
        id: NoteId,
        path: &Path,
        password: Option<&str>,
        stored: Option<Secret>,
    ) -> RepoResult<Secret> {
        if let Some(password) = password {
            return Ok(Secret::Password(password.to_string()));
        }
        if let Some(secret) = stored {
            return Ok(secret);
        }
        if self.biometric_ready() {
            return self.biometric_key(path).map(Secret::KeyMaterial);
        }
        Err(RepoError::PasswordRequired(id))
    }

    fn biometric_ready(&self) -> bool {
        self.biometric.is_some() && self.biometric_enabled.load(Ordering::SeqCst)
    }

    fn biometric_key(&self, path: &Path) -> RepoResult<Vec<u8>> {
        let unlock = match (&self.biometric, self.biometric_enabled.load(Ordering::SeqCst)) {
            (Some(unlock), true) => unlock,
            _ => {
                return Err(RepoError::Biometric(BiometricError::Unavailable(
                    "biometric unlock is disabled".to_string(),
                )))
            }
        };
        unlock.retrieve_key(&path.to_string_lossy()).map_err(|err| {
            warn!(
                "event=biometric_unlock module=repo status=error path={} error={}",
                path.display(),
                err
            );
            RepoError::Biometric(err)
        })
    }

    /// Registers `path` for `id`. Returns whether the claim is new.
    fn claim_path(&self, id: NoteId, path: &Path) -> RepoResult<bool> {
        let mut registry = write(&self.registry);
        match registry.by_path.get(path) {
            Some(owner) if *owner != id => {
                Err(RepoError::Fs(FsError::AlreadyExists(path.to_path_buf())))
            }
            Some(_) => Ok(false),
            None => {
                registry.by_path.insert(path.to_path_buf(), id);
                Ok(true)
            }
        }
    }

    /// Picks `<root>/<stem>[-n]<ext>` and claims it under the registry
    /// write lock, so concurrent first saves never share a path.
    fn claim_derived_path(&self, id: NoteId, note: &Note) -> RepoResult<PathBuf> {
        let stem = sanitize_file_stem(&note.title);
        let extension = if note.is_encrypted() {
            ENCRYPTED_EXTENSION
        } else {
            PLAIN_EXTENSION
        };

        let mut registry = write(&self.registry);
        for suffix in 0..MAX_NAME_SUFFIX {
            let name = if suffix == 0 {
                format!("{stem}{extension}")
            } else {
                format!("{stem}-{suffix}{extension}")
            };
            let candidate = self.files.resolve(&name)?;
            if !registry.by_path.contains_key(&candidate) && !self.files.exists(&candidate)? {
                registry.by_path.insert(candidate.clone(), id);
                return Ok(candidate);
            }
        }
        Err(RepoError::Fs(FsError::AlreadyExists(
            self.files.root().join(format!("{stem}{extension}")),
        )))
    }

    fn release_claim(&self, id: NoteId, path: &Path) {
        let mut registry = write(&self.registry);
        if registry.by_path.get(path) == Some(&id) {
            registry.by_path.remove(path);
            debug!(
                "event=path_claim module=repo status=released note_id={} path={}",
                id,
                path.display()
            );
        }
    }
}

fn ensure_open_not_cancelled(cancel: &CancelToken, path: &Path) -> RepoResult<()> {
    if cancel.is_cancelled() {
        info!(
            "event=note_open module=repo status=cancelled path={}",
            path.display()
        );
        return Err(RepoError::OpenCancelled(path.to_path_buf()));
    }
    Ok(())
}

/// Maps a note title to a portable file stem.
pub fn sanitize_file_stem(title: &str) -> String {
    let replaced: String = title
        .chars()
        .map(|ch| match ch {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            ch if ch.is_control() => '_',
            ch => ch,
        })
        .take(MAX_FILE_STEM_CHARS)
        .collect();
    let trimmed = replaced.trim().trim_matches('.').trim();
    if trimmed.is_empty() {
        "untitled".to_string()
    } else {
        trimmed.to_string()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}
