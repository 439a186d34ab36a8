//! Periodic background saves for dirty notes.
//!
//! # Responsibility
//! - Keep at most one autosave task per dirty note.
//! - Retire a task once its note stayed clean for a full interval, or was
//!   closed or is not saveable.
//! - Track per-note save status and serve immediate saves.
//!
//! # Invariants
//! - File I/O and key derivation run on the blocking pool, never on a
//!   runtime worker.
//! - A retiring task only removes its own registration.
//! - At most one save per note is in flight through this scheduler.
//! - Encrypted notes tick `encrypted_extra` later than plaintext notes.

use super::events::{EventBus, NotebookEvent};
use crate::model::note::NoteId;
use crate::repo::{AutosaveOutcome, NoteRepository, RepoError};
use log::{debug, info, warn};
use serde::Serialize;
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// Extra delay for encrypted notes; each of their saves pays a full KDF.
pub const DEFAULT_ENCRYPTED_EXTRA: Duration = Duration::from_secs(30);

/// Save bookkeeping for one tracked note.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveStatus {
    pub is_saving: bool,
    /// Epoch ms of the last successful save through the scheduler.
    pub last_saved: Option<i64>,
    /// Message of the last failed save; cleared by the next success.
    pub last_error: Option<String>,
    pub save_count: u64,
}

#[derive(Debug)]
pub enum AutosaveError {
    /// Another save of this note is still running.
    SaveInProgress(NoteId),
    Repo(RepoError),
    /// The blocking save task panicked or was aborted.
    Task(String),
}

impl Display for AutosaveError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SaveInProgress(id) => write!(f, "note {id} is already being saved"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::Task(details) => write!(f, "autosave task failed: {details}"),
        }
    }
}

impl Error for AutosaveError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for AutosaveError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

struct Task {
    generation: u64,
    handle: JoinHandle<()>,
}

struct Inner {
    repo: Arc<NoteRepository>,
    events: EventBus,
    runtime: Handle,
    interval: Mutex<Duration>,
    encrypted_extra: Mutex<Duration>,
    next_generation: AtomicU64,
    tasks: Mutex<HashMap<NoteId, Task>>,
    statuses: Mutex<HashMap<NoteId, SaveStatus>>,
}

impl Inner {
    fn tasks(&self) -> MutexGuard<'_, HashMap<NoteId, Task>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn statuses(&self) -> MutexGuard<'_, HashMap<NoteId, SaveStatus>> {
        self.statuses.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn interval(&self) -> Duration {
        *self.interval.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn encrypted_extra(&self) -> Duration {
        *self
            .encrypted_extra
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn interval_for(&self, id: NoteId) -> Duration {
        let encrypted = self
            .repo
            .get(id)
            .map(|note| note.is_encrypted())
            .unwrap_or(false);
        if encrypted {
            self.interval() + self.encrypted_extra()
        } else {
            self.interval()
        }
    }

    fn retire(&self, id: NoteId, generation: u64) {
        let mut tasks = self.tasks();
        if tasks.get(&id).is_some_and(|task| task.generation == generation) {
            tasks.remove(&id);
        }
    }

    /// Dirtiness is checked under the task lock so an edit racing with
    /// retirement always reschedules.
    fn retire_if_clean(&self, id: NoteId, generation: u64) -> bool {
        let mut tasks = self.tasks();
        if !tasks.get(&id).is_some_and(|task| task.generation == generation) {
            return true;
        }
        if matches!(self.repo.is_dirty(id), Ok(true)) {
            return false;
        }
        tasks.remove(&id);
        true
    }

    fn begin_save(&self, id: NoteId) -> bool {
        let mut statuses = self.statuses();
        let status = statuses.entry(id).or_default();
        if status.is_saving {
            return false;
        }
        status.is_saving = true;
        true
    }

    fn finish_save(&self, id: NoteId, result: &Result<AutosaveOutcome, AutosaveError>) {
        let now = self.repo.clock().now_ms();
        let mut statuses = self.statuses();
        let Some(status) = statuses.get_mut(&id) else {
            return;
        };
        status.is_saving = false;
        match result {
            Ok(AutosaveOutcome::Saved(_)) => {
                status.last_saved = Some(now);
                status.last_error = None;
                status.save_count += 1;
            }
            Ok(_) => {}
            Err(err) => status.last_error = Some(err.to_string()),
        }
    }
}

/// Per-note autosave timers on a tokio runtime.
#[derive(Clone)]
pub struct AutosaveScheduler {
    inner: Arc<Inner>,
}

impl AutosaveScheduler {
    pub fn new(
        repo: Arc<NoteRepository>,
        events: EventBus,
        runtime: Handle,
        interval: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                repo,
                events,
                runtime,
                interval: Mutex::new(interval),
                encrypted_extra: Mutex::new(DEFAULT_ENCRYPTED_EXTRA),
                next_generation: AtomicU64::new(1),
                tasks: Mutex::new(HashMap::new()),
                statuses: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Takes effect at the next tick of every running task.
    pub fn set_interval(&self, interval: Duration) {
        *self
            .inner
            .interval
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = interval;
        debug!(
            "event=autosave_interval module=autosave status=ok interval_ms={}",
            interval.as_millis()
        );
    }

    pub fn interval(&self) -> Duration {
        self.inner.interval()
    }

    pub fn set_encrypted_extra(&self, extra: Duration) {
        *self
            .inner
            .encrypted_extra
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = extra;
    }

    /// Tick period for `id`: the base interval, plus the encrypted extra
    /// when the note is configured for encryption.
    pub fn interval_for(&self, id: NoteId) -> Duration {
        self.inner.interval_for(id)
    }

    /// Starts a timer for `id` unless one is already running.
    pub fn schedule(&self, id: NoteId) {
        let mut tasks = self.inner.tasks();
        if tasks.get(&id).is_some_and(|task| !task.handle.is_finished()) {
            return;
        }
        self.inner.statuses().entry(id).or_default();
        let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed);
        let handle = self
            .inner
            .runtime
            .spawn(run(Arc::clone(&self.inner), id, generation));
        tasks.insert(id, Task { generation, handle });
        debug!(
            "event=autosave_schedule module=autosave status=ok note_id={}",
            id
        );
    }

    /// Saves `id` now on the blocking pool, recording the result in its
    /// status. The note does not need a running timer.
    ///
    /// # Errors
    /// - `SaveInProgress` when a tick or another immediate save is running.
    pub async fn save_now(&self, id: NoteId) -> Result<AutosaveOutcome, AutosaveError> {
        save_once(&self.inner, id).await
    }

    /// Stops the timer for `id` and forgets its status. A save already on
    /// the blocking pool still completes.
    pub fn cancel(&self, id: NoteId) -> bool {
        self.inner.statuses().remove(&id);
        match self.inner.tasks().remove(&id) {
            Some(task) => {
                task.handle.abort();
                true
            }
            None => false,
        }
    }

    pub fn is_scheduled(&self, id: NoteId) -> bool {
        self.inner
            .tasks()
            .get(&id)
            .is_some_and(|task| !task.handle.is_finished())
    }

    pub fn scheduled_count(&self) -> usize {
        self.inner
            .tasks()
            .values()
            .filter(|task| !task.handle.is_finished())
            .count()
    }

    pub fn status(&self, id: NoteId) -> Option<SaveStatus> {
        self.inner.statuses().get(&id).cloned()
    }

    pub fn statuses(&self) -> HashMap<NoteId, SaveStatus> {
        self.inner.statuses().clone()
    }

    pub fn shutdown(&self) {
        let drained: Vec<Task> = self.inner.tasks().drain().map(|(_, task)| task).collect();
        for task in &drained {
            task.handle.abort();
        }
        self.inner.statuses().clear();
        info!(
            "event=autosave_shutdown module=autosave status=ok aborted={}",
            drained.len()
        );
    }
}

async fn save_once(inner: &Arc<Inner>, id: NoteId) -> Result<AutosaveOutcome, AutosaveError> {
    if !inner.begin_save(id) {
        return Err(AutosaveError::SaveInProgress(id));
    }

    let repo = Arc::clone(&inner.repo);
    let result = match tokio::task::spawn_blocking(move || repo.autosave(id)).await {
        Ok(Ok(outcome)) => Ok(outcome),
        Ok(Err(err)) => Err(AutosaveError::Repo(err)),
        Err(err) => Err(AutosaveError::Task(err.to_string())),
    };
    inner.finish_save(id, &result);

    match &result {
        Ok(AutosaveOutcome::Saved(note)) => {
            info!(
                "event=autosave module=autosave status=ok note_id={} modified_at={}",
                id, note.modified_at
            );
            inner.events.emit(NotebookEvent::NoteSaved { id });
        }
        Err(err) => {
            warn!(
                "event=autosave module=autosave status=error note_id={} error={}",
                id, err
            );
        }
        Ok(_) => {}
    }
    result
}

async fn run(inner: Arc<Inner>, id: NoteId, generation: u64) {
    loop {
        tokio::time::sleep(inner.interval_for(id)).await;

        match save_once(&inner, id).await {
            // Stay armed: the note retires only after a full clean interval.
            Ok(AutosaveOutcome::Saved(_)) => {}
            Ok(AutosaveOutcome::Clean) => {
                if inner.retire_if_clean(id, generation) {
                    return;
                }
            }
            Ok(AutosaveOutcome::Skipped(reason)) => {
                debug!(
                    "event=autosave module=autosave status=skipped note_id={} reason={}",
                    id, reason
                );
                inner.retire(id, generation);
                return;
            }
            Ok(AutosaveOutcome::Missing) => {
                inner.retire(id, generation);
                return;
            }
            Err(AutosaveError::SaveInProgress(_)) => {
                debug!(
                    "event=autosave module=autosave status=skipped note_id={} reason=save_in_progress",
                    id
                );
            }
            Err(AutosaveError::Repo(_)) => {}
            Err(AutosaveError::Task(_)) => {
                inner.retire(id, generation);
                return;
            }
        }
    }
}
