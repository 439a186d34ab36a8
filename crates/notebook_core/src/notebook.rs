//! Composition root wiring the engine together.
//!
//! # Responsibility
//! - Bootstrap logging, settings, the workspace and the editor service.
//! - Route accepted settings changes into the editor and the event bus.
//!
//! # Invariants
//! - The workspace root is fixed for the lifetime of a `Notebook`; a new
//!   `defaultSaveLocation` applies on the next open.

use crate::capability::{
    BiometricUnlock, Clock, Dispatcher, ImmediateDispatcher, MarkdownRenderer, SystemClock,
};
use crate::fs::{FileManager, FsError};
use crate::logging::{default_log_level, init_logging, LoggingError};
use crate::repo::NoteRepository;
use crate::service::editor_service::EditorService;
use crate::service::events::{EventBus, NotebookEvent};
use crate::settings::{SettingsError, SettingsStore};
use crate::view::ViewStateModel;
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::runtime::Handle;

/// Bootstrap overrides. `None` fields fall back to platform defaults.
#[derive(Debug, Clone, Default)]
pub struct NotebookConfig {
    pub settings_path: Option<PathBuf>,
    /// Overrides `defaultSaveLocation` from settings.
    pub workspace_root: Option<PathBuf>,
    /// Logging is started only when this is set.
    pub log_dir: Option<PathBuf>,
    pub log_level: Option<String>,
}

/// Host-provided capabilities.
#[derive(Clone)]
pub struct Capabilities {
    pub renderer: Arc<dyn MarkdownRenderer>,
    pub clock: Arc<dyn Clock>,
    pub biometric: Option<Arc<dyn BiometricUnlock>>,
    pub dispatcher: Arc<dyn Dispatcher>,
}

impl Capabilities {
    /// System clock, inline dispatch and no biometric store.
    pub fn new(renderer: Arc<dyn MarkdownRenderer>) -> Self {
        Self {
            renderer,
            clock: Arc::new(SystemClock),
            biometric: None,
            dispatcher: Arc::new(ImmediateDispatcher),
        }
    }
}

#[derive(Debug)]
pub enum NotebookError {
    Logging(LoggingError),
    Settings(SettingsError),
    Fs(FsError),
}

impl Display for NotebookError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Logging(err) => write!(f, "{err}"),
            Self::Settings(err) => write!(f, "{err}"),
            Self::Fs(err) => write!(f, "{err}"),
        }
    }
}

impl Error for NotebookError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Logging(err) => Some(err),
            Self::Settings(err) => Some(err),
            Self::Fs(err) => Some(err),
        }
    }
}

impl From<LoggingError> for NotebookError {
    fn from(value: LoggingError) -> Self {
        Self::Logging(value)
    }
}

impl From<SettingsError> for NotebookError {
    fn from(value: SettingsError) -> Self {
        Self::Settings(value)
    }
}

impl From<FsError> for NotebookError {
    fn from(value: FsError) -> Self {
        Self::Fs(value)
    }
}

/// A fully wired notebook engine.
pub struct Notebook {
    settings: Arc<SettingsStore>,
    files: Arc<FileManager>,
    editor: Arc<EditorService>,
    events: EventBus,
}

impl Notebook {
    /// Opens the engine; background work runs on `runtime`.
    ///
    /// # Errors
    /// - `Logging` when `log_dir` is set and logging cannot start.
    /// - `Settings` when the settings file exists but is unreadable or
    ///   invalid.
    /// - `Fs` when the workspace root cannot be created.
    pub fn open(
        config: NotebookConfig,
        capabilities: Capabilities,
        runtime: Handle,
    ) -> Result<Self, NotebookError> {
        if let Some(log_dir) = &config.log_dir {
            let level = config.log_level.as_deref().unwrap_or(default_log_level());
            init_logging(level, log_dir)?;
        }

        let settings = Arc::new(match config.settings_path {
            Some(path) => SettingsStore::open(path)?,
            None => SettingsStore::open_default()?,
        });
        let current = settings.current();

        let root = config
            .workspace_root
            .unwrap_or_else(|| current.default_save_location.clone());
        let files = Arc::new(FileManager::new(&root)?);

        let mut repo = NoteRepository::new(Arc::clone(&files), capabilities.clock);
        if let Some(biometric) = capabilities.biometric {
            repo = repo.with_biometric(biometric);
        }

        let events = EventBus::with_dispatcher(capabilities.dispatcher);
        let editor = Arc::new(EditorService::new(
            Arc::new(repo),
            capabilities.renderer,
            events.clone(),
            runtime,
            &current,
        ));

        let listener_editor = Arc::clone(&editor);
        let listener_events = events.clone();
        settings.on_change(move |updated| {
            listener_editor.apply_settings(updated);
            listener_events.emit(NotebookEvent::SettingsChanged {
                settings: Arc::new(updated.clone()),
            });
        });

        info!(
            "event=notebook_open module=core status=ok root={} settings={}",
            files.root().display(),
            settings.path().display()
        );
        Ok(Self {
            settings,
            files,
            editor,
            events,
        })
    }

    pub fn settings(&self) -> &Arc<SettingsStore> {
        &self.settings
    }

    pub fn files(&self) -> &Arc<FileManager> {
        &self.files
    }

    pub fn editor(&self) -> &Arc<EditorService> {
        &self.editor
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Fresh view model whose changes are republished on the event bus.
    pub fn view_model(&self) -> ViewStateModel {
        let mut model = ViewStateModel::new();
        model.forward_to(self.events.clone());
        model
    }

    /// Stops background autosave timers.
    pub fn shutdown(&self) {
        self.editor.shutdown();
        info!("event=notebook_close module=core status=ok");
    }
}

#[cfg(test)]
mod tests {
    use super::{Capabilities, Notebook, NotebookConfig};
    use crate::capability::{MarkdownRenderer, RenderError};
    use crate::model::settings::Theme;
    use crate::service::events::NotebookEvent;
    use std::sync::{Arc, Mutex};

    struct EchoRenderer;

    impl MarkdownRenderer for EchoRenderer {
        fn render(&self, markdown: &str) -> Result<String, RenderError> {
            Ok(format!("<p>{markdown}</p>"))
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn settings_changes_reach_the_event_bus() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let notebook = Notebook::open(
            NotebookConfig {
                settings_path: Some(dir.path().join("settings.json")),
                workspace_root: Some(dir.path().join("notes")),
                ..NotebookConfig::default()
            },
            Capabilities::new(Arc::new(EchoRenderer)),
            tokio::runtime::Handle::current(),
        )
        .expect("notebook should open");

        let themes = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&themes);
        notebook.events().subscribe(move |event| {
            if let NotebookEvent::SettingsChanged { settings } = event {
                sink.lock().expect("sink lock").push(settings.theme);
            }
        });

        notebook
            .settings()
            .update(|settings| settings.with_theme(Theme::Light).with_auto_save_interval(2))
            .expect("update should save");

        assert_eq!(*themes.lock().expect("themes lock"), vec![Theme::Light]);
        assert_eq!(
            notebook.editor().autosave().interval(),
            std::time::Duration::from_secs(120)
        );
        assert_eq!(
            notebook.editor().preview_markdown("hi").expect("render should succeed"),
            "<p>hi</p>"
        );
        notebook.shutdown();
    }
}
