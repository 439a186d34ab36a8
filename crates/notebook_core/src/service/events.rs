//! Change notifications for host observers.
//!
//! # Responsibility
//! - Fan out note, settings and view events to subscribers.
//! - Deliver through the host dispatcher so callbacks land on its thread.
//!
//! # Invariants
//! - Subscribers see events in emission order.
//! - A panicking subscriber is logged and never reaches the emitter.

use crate::capability::{Dispatcher, ImmediateDispatcher};
use crate::model::note::NoteId;
use crate::model::settings::Settings;
use crate::view::ViewStateChange;
use log::error;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

/// Event delivered to every subscriber of an [`EventBus`].
#[derive(Debug, Clone, PartialEq)]
pub enum NotebookEvent {
    NoteCreated { id: NoteId },
    NoteOpened { id: NoteId },
    NoteSaved { id: NoteId },
    NoteModified { id: NoteId },
    NoteClosed { id: NoteId },
    /// An open request hit an encrypted file.
    NeedsPassword { file_path: PathBuf },
    SettingsChanged { settings: Arc<Settings> },
    ViewStateChanged(ViewStateChange),
}

impl NotebookEvent {
    /// Stable name used in log lines.
    pub fn name(&self) -> &'static str {
        match self {
            Self::NoteCreated { .. } => "note_created",
            Self::NoteOpened { .. } => "note_opened",
            Self::NoteSaved { .. } => "note_saved",
            Self::NoteModified { .. } => "note_modified",
            Self::NoteClosed { .. } => "note_closed",
            Self::NeedsPassword { .. } => "needs_password",
            Self::SettingsChanged { .. } => "settings_changed",
            Self::ViewStateChanged(_) => "view_state_changed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Arc<dyn Fn(&NotebookEvent) + Send + Sync>;

struct Inner {
    next_id: AtomicU64,
    listeners: RwLock<Vec<(SubscriptionId, Listener)>>,
    dispatcher: Arc<dyn Dispatcher>,
}

/// Cloneable handle to a shared subscriber list.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<Inner>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    /// Bus that delivers inline on the emitting thread.
    pub fn new() -> Self {
        Self::with_dispatcher(Arc::new(ImmediateDispatcher))
    }

    pub fn with_dispatcher(dispatcher: Arc<dyn Dispatcher>) -> Self {
        Self {
            inner: Arc::new(Inner {
                next_id: AtomicU64::new(1),
                listeners: RwLock::new(Vec::new()),
                dispatcher,
            }),
        }
    }

    pub fn subscribe(
        &self,
        listener: impl Fn(&NotebookEvent) + Send + Sync + 'static,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        self.inner
            .listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(listener)));
        id
    }

    /// Returns `false` when `id` was not subscribed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self
            .inner
            .listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Posts `event` to the dispatcher, which calls every subscriber in
    /// subscription order.
    pub fn emit(&self, event: NotebookEvent) {
        let listeners: Vec<Listener> = self
            .inner
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        if listeners.is_empty() {
            return;
        }

        self.inner.dispatcher.post(Box::new(move || {
            for listener in &listeners {
                call_guarded("events", event.name(), || listener(&event));
            }
        }));
    }
}

/// Runs a host callback, logging instead of propagating a panic.
pub(crate) fn call_guarded(module: &str, event: &str, callback: impl FnOnce()) {
    if catch_unwind(AssertUnwindSafe(callback)).is_err() {
        error!(
            "event=listener_panic module={} status=error source_event={}",
            module, event
        );
    }
}
