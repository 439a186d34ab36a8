//! Editor use-case service.
//!
//! # Responsibility
//! - Orchestrate note lifecycle calls and publish their events.
//! - Schedule autosave for notes that become dirty.
//! - Run slow opens and saves on the blocking pool with cancellation.
//! - Export notes to HTML through the host renderer.
//! - Expose Markdown preview, formatting and auto-complete helpers.
//!
//! # Invariants
//! - Events are emitted only after the underlying repository call succeeded.
//! - `NoteModified` is emitted only for accepted changes.
//! - Closing a note cancels its autosave timer.
//!
//! # See also
//! - service/autosave.rs

use super::autosave::{AutosaveError, AutosaveScheduler, SaveStatus};
use super::events::{EventBus, NotebookEvent};
use super::export::{BatchExportResult, ExportError, ExportOptions, HtmlExporter};
use super::markdown::{self, AutoCompleteSuggestion, MarkdownError, MarkdownIssue, WrapEdit};
use crate::analysis::lexicon::{InputDictionary, Lexicon, LexiconError};
use crate::cancel::CancelToken;
use crate::capability::{MarkdownRenderer, RenderError};
use crate::crypto::EncryptionAlgorithm;
use crate::model::note::{Note, NoteId};
use crate::model::settings::Settings;
use crate::repo::{AutosaveOutcome, NoteRepository, OpenOutcome, RepoError};
use log::{debug, info};
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

pub type EditorResult<T> = Result<T, EditorError>;

/// Service error for editor use-cases.
#[derive(Debug)]
pub enum EditorError {
    Repo(RepoError),
    /// The host renderer failed.
    Render(RenderError),
    Markdown(MarkdownError),
    Lexicon(LexiconError),
    Autosave(AutosaveError),
    Export(ExportError),
    /// A background task was aborted or panicked.
    Task(String),
}

impl Display for EditorError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Repo(err) => write!(f, "{err}"),
            Self::Render(err) => write!(f, "{err}"),
            Self::Markdown(err) => write!(f, "{err}"),
            Self::Lexicon(err) => write!(f, "{err}"),
            Self::Autosave(err) => write!(f, "{err}"),
            Self::Export(err) => write!(f, "{err}"),
            Self::Task(details) => write!(f, "background task failed: {details}"),
        }
    }
}

impl Error for EditorError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            Self::Render(err) => Some(err),
            Self::Markdown(err) => Some(err),
            Self::Lexicon(err) => Some(err),
            Self::Autosave(err) => Some(err),
            Self::Export(err) => Some(err),
            Self::Task(_) => None,
        }
    }
}

impl From<RepoError> for EditorError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<RenderError> for EditorError {
    fn from(value: RenderError) -> Self {
        Self::Render(value)
    }
}

impl From<MarkdownError> for EditorError {
    fn from(value: MarkdownError) -> Self {
        Self::Markdown(value)
    }
}

impl From<LexiconError> for EditorError {
    fn from(value: LexiconError) -> Self {
        Self::Lexicon(value)
    }
}

impl From<AutosaveError> for EditorError {
    fn from(value: AutosaveError) -> Self {
        Self::Autosave(value)
    }
}

impl From<ExportError> for EditorError {
    fn from(value: ExportError) -> Self {
        Self::Export(value)
    }
}

/// Entry point the UI adapter drives.
pub struct EditorService {
    repo: Arc<NoteRepository>,
    renderer: Arc<dyn MarkdownRenderer>,
    exporter: HtmlExporter,
    events: EventBus,
    autosave: AutosaveScheduler,
    runtime: Handle,
    dictionary: RwLock<InputDictionary>,
}

impl EditorService {
    /// Builds the service; autosave timers run on `runtime` with the
    /// interval taken from `settings`.
    pub fn new(
        repo: Arc<NoteRepository>,
        renderer: Arc<dyn MarkdownRenderer>,
        events: EventBus,
        runtime: Handle,
        settings: &Settings,
    ) -> Self {
        let autosave = AutosaveScheduler::new(
            Arc::clone(&repo),
            events.clone(),
            runtime.clone(),
            settings.auto_save_period(),
        );
        repo.set_biometric_enabled(settings.biometric_enabled);
        Self {
            repo,
            exporter: HtmlExporter::new(Arc::clone(&renderer)),
            renderer,
            events,
            autosave,
            runtime,
            dictionary: RwLock::new(InputDictionary::embedded()),
        }
    }

    pub fn repository(&self) -> &Arc<NoteRepository> {
        &self.repo
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn autosave(&self) -> &AutosaveScheduler {
        &self.autosave
    }

    pub fn create_note(&self, title: &str, initial_content: &str) -> Note {
        let note = self.repo.create(title, initial_content);
        self.events.emit(NotebookEvent::NoteCreated { id: note.id });
        note
    }

    /// Opens a note file. An encrypted file yields `NeedsPassword` and
    /// emits the matching event instead of `NoteOpened`.
    pub fn open_note(&self, path: impl AsRef<Path>) -> EditorResult<OpenOutcome> {
        let outcome = self.repo.open(path)?;
        emit_open(&self.events, &outcome);
        Ok(outcome)
    }

    /// Runs [`open_note`](Self::open_note) on the blocking pool.
    /// `cancel` is honored until the note is registered.
    pub fn spawn_open(
        &self,
        path: PathBuf,
        cancel: CancelToken,
    ) -> JoinHandle<EditorResult<OpenOutcome>> {
        let repo = Arc::clone(&self.repo);
        let events = self.events.clone();
        self.runtime.spawn_blocking(move || {
            let outcome = repo.open_cancellable(&path, &cancel)?;
            emit_open(&events, &outcome);
            Ok(outcome)
        })
    }

    /// Decrypts on the blocking pool; the KDF makes this the slowest open.
    pub fn spawn_open_encrypted(
        &self,
        path: PathBuf,
        password: String,
        cancel: CancelToken,
    ) -> JoinHandle<EditorResult<Note>> {
        let repo = Arc::clone(&self.repo);
        let events = self.events.clone();
        self.runtime.spawn_blocking(move || {
            let note = repo.open_encrypted_cancellable(&path, &password, &cancel)?;
            events.emit(NotebookEvent::NoteOpened { id: note.id });
            Ok(note)
        })
    }

    pub fn open_encrypted_note(&self, path: impl AsRef<Path>, password: &str) -> EditorResult<Note> {
        let note = self.repo.open_encrypted(path, password)?;
        self.events.emit(NotebookEvent::NoteOpened { id: note.id });
        Ok(note)
    }

    pub fn open_with_biometric(&self, path: impl AsRef<Path>) -> EditorResult<Note> {
        let note = self.repo.open_with_biometric(path)?;
        self.events.emit(NotebookEvent::NoteOpened { id: note.id });
        Ok(note)
    }

    /// Replaces the content; a real change emits `NoteModified` and
    /// schedules autosave.
    pub fn update_content(&self, id: NoteId, content: &str) -> EditorResult<bool> {
        let changed = self.repo.update_content(id, content)?;
        if changed {
            self.modified(id);
        }
        Ok(changed)
    }

    pub fn rename_note(&self, id: NoteId, title: &str) -> EditorResult<bool> {
        let changed = self.repo.rename_title(id, title)?;
        if changed {
            self.modified(id);
        }
        Ok(changed)
    }

    pub fn set_encryption(
        &self,
        id: NoteId,
        encryption: Option<EncryptionAlgorithm>,
    ) -> EditorResult<Note> {
        let before = self.repo.get(id)?;
        let note = self.repo.set_encryption(id, encryption)?;
        if before.encryption != note.encryption {
            self.modified(id);
        }
        Ok(note)
    }

    /// Saves on the calling thread and emits `NoteSaved`.
    pub fn save_note(&self, id: NoteId, password: Option<&str>) -> EditorResult<Note> {
        let note = self.repo.save(id, password, &CancelToken::new())?;
        self.events.emit(NotebookEvent::NoteSaved { id });
        Ok(note)
    }

    pub fn save_note_as(
        &self,
        id: NoteId,
        path: impl AsRef<Path>,
        password: Option<&str>,
    ) -> EditorResult<Note> {
        let note = self.repo.save_as(id, path, password, &CancelToken::new())?;
        self.events.emit(NotebookEvent::NoteSaved { id });
        Ok(note)
    }

    /// Runs a save on the blocking pool. `cancel` is honored until the
    /// write starts.
    pub fn spawn_save(
        &self,
        id: NoteId,
        password: Option<String>,
        cancel: CancelToken,
    ) -> JoinHandle<EditorResult<Note>> {
        let repo = Arc::clone(&self.repo);
        let events = self.events.clone();
        self.runtime.spawn_blocking(move || {
            let note = repo.save(id, password.as_deref(), &cancel)?;
            events.emit(NotebookEvent::NoteSaved { id });
            Ok(note)
        })
    }

    /// Awaits a [`spawn_save`](Self::spawn_save) handle, folding join
    /// failures into [`EditorError::Task`].
    pub async fn join_save(handle: JoinHandle<EditorResult<Note>>) -> EditorResult<Note> {
        Self::join_task(handle).await
    }

    /// Awaits any handle returned by this service.
    pub async fn join_task<T>(handle: JoinHandle<EditorResult<T>>) -> EditorResult<T> {
        handle
            .await
            .map_err(|err| EditorError::Task(err.to_string()))?
    }

    /// Saves through the autosave path right away, updating its status.
    ///
    /// # Errors
    /// - `Autosave(SaveInProgress)` while another save of `id` is running.
    pub async fn save_now(&self, id: NoteId) -> EditorResult<AutosaveOutcome> {
        Ok(self.autosave.save_now(id).await?)
    }

    pub fn save_status(&self, id: NoteId) -> Option<SaveStatus> {
        self.autosave.status(id)
    }

    pub fn save_statuses(&self) -> HashMap<NoteId, SaveStatus> {
        self.autosave.statuses()
    }

    pub fn close_note(&self, id: NoteId, force: bool) -> EditorResult<()> {
        self.repo.close(id, force)?;
        self.autosave.cancel(id);
        self.events.emit(NotebookEvent::NoteClosed { id });
        Ok(())
    }

    pub fn get_note(&self, id: NoteId) -> EditorResult<Note> {
        Ok(self.repo.get(id)?)
    }

    pub fn open_notes(&self) -> Vec<Note> {
        self.repo.list_open()
    }

    /// Pushes the runtime-relevant settings into the service.
    pub fn apply_settings(&self, settings: &Settings) {
        self.autosave.set_interval(settings.auto_save_period());
        self.repo.set_biometric_enabled(settings.biometric_enabled);
        info!(
            "event=settings_apply module=editor status=ok auto_save_minutes={} biometric={}",
            settings.auto_save_interval, settings.biometric_enabled
        );
    }

    pub fn preview_markdown(&self, content: &str) -> EditorResult<String> {
        Ok(self.renderer.render(content)?)
    }

    pub fn export_note_html(
        &self,
        id: NoteId,
        path: impl AsRef<Path>,
        options: &ExportOptions,
    ) -> EditorResult<()> {
        let note = self.repo.get(id)?;
        Ok(self.exporter.export_html(&note, path.as_ref(), options)?)
    }

    /// Exports every listed open note into `output_dir`.
    pub fn export_notes_html(
        &self,
        ids: &[NoteId],
        output_dir: impl AsRef<Path>,
        options: &ExportOptions,
    ) -> EditorResult<BatchExportResult> {
        let notes = ids
            .iter()
            .map(|id| self.repo.get(*id))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(self.exporter.export_batch(&notes, output_dir.as_ref(), options)?)
    }

    pub fn apply_wrap(
        &self,
        content: &str,
        selection_start: usize,
        selection_end: usize,
        prefix: &str,
        suffix: &str,
        placeholder: &str,
    ) -> WrapEdit {
        markdown::apply_wrap(content, selection_start, selection_end, prefix, suffix, placeholder)
    }

    pub fn apply_line_prefix(&self, content: &str, line: usize, prefix: &str) -> String {
        markdown::apply_line_prefix(content, line, prefix)
    }

    pub fn toggle_line_prefix(&self, content: &str, line: usize, prefix: &str) -> String {
        markdown::toggle_line_prefix(content, line, prefix)
    }

    pub fn format_link(&self, text: &str, url: &str) -> String {
        markdown::format_link(text, url)
    }

    pub fn format_image(&self, alt: &str, src: &str) -> String {
        markdown::format_image(alt, src)
    }

    pub fn format_code_block(&self, code: &str, lang: &str) -> String {
        markdown::format_code_block(code, lang)
    }

    pub fn format_math(&self, expression: &str, inline: bool) -> String {
        markdown::format_math(expression, inline)
    }

    pub fn generate_table_template(&self, rows: usize, cols: usize) -> String {
        markdown::generate_table_template(rows, cols)
    }

    pub fn format_table(&self, table: &str) -> EditorResult<String> {
        Ok(markdown::format_table(table)?)
    }

    pub fn validate_markdown(&self, content: &str) -> Vec<MarkdownIssue> {
        markdown::validate_markdown(content)
    }

    pub fn supported_code_languages(&self) -> &'static [&'static str] {
        markdown::supported_code_languages()
    }

    /// Suggestions for char offset `cursor` in `content`.
    pub fn get_auto_complete_suggestions(
        &self,
        content: &str,
        cursor: usize,
    ) -> Vec<AutoCompleteSuggestion> {
        let dictionary = self.dictionary.read().unwrap_or_else(PoisonError::into_inner);
        markdown::auto_complete_suggestions(content, cursor, &dictionary)
    }

    pub fn add_custom_word(&self, word: &str) -> EditorResult<()> {
        self.dictionary
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .add_custom_word(word)?;
        debug!("event=custom_word_add module=editor status=ok");
        Ok(())
    }

    pub fn remove_custom_word(&self, word: &str) -> bool {
        self.dictionary
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove_custom_word(word)
    }

    /// Swaps in a host-supplied Zhuyin table.
    pub fn set_zhuyin_lexicon(&self, lexicon: Lexicon) {
        let mut dictionary = self.dictionary.write().unwrap_or_else(PoisonError::into_inner);
        *dictionary = std::mem::take(&mut *dictionary).with_zhuyin(lexicon);
        info!("event=lexicon_replace module=editor status=ok");
    }

    /// Stops every autosave timer.
    pub fn shutdown(&self) {
        self.autosave.shutdown();
    }

    fn modified(&self, id: NoteId) {
        self.events.emit(NotebookEvent::NoteModified { id });
        self.autosave.schedule(id);
    }
}

fn emit_open(events: &EventBus, outcome: &OpenOutcome) {
    match outcome {
        OpenOutcome::Opened(note) => events.emit(NotebookEvent::NoteOpened { id: note.id }),
        OpenOutcome::NeedsPassword { file_path } => events.emit(NotebookEvent::NeedsPassword {
            file_path: file_path.clone(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::{EditorError, EditorService};
    use crate::capability::{MarkdownRenderer, RenderError, SystemClock};
    use crate::fs::FileManager;
    use crate::model::settings::Settings;
    use crate::repo::NoteRepository;
    use crate::service::events::EventBus;
    use std::sync::Arc;

    struct FailingRenderer;

    impl MarkdownRenderer for FailingRenderer {
        fn render(&self, _markdown: &str) -> Result<String, RenderError> {
            Err(RenderError("renderer offline".to_string()))
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn renderer_failures_surface_as_render_errors() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let files = Arc::new(FileManager::new(dir.path()).expect("file manager should open"));
        let repo = Arc::new(NoteRepository::new(files, Arc::new(SystemClock)));
        let editor = EditorService::new(
            repo,
            Arc::new(FailingRenderer),
            EventBus::new(),
            tokio::runtime::Handle::current(),
            &Settings::default(),
        );

        let err = editor
            .preview_markdown("# title")
            .expect_err("render should fail");
        assert!(matches!(err, EditorError::Render(_)));
        assert!(editor.format_table("| a |").is_err());
        assert_eq!(editor.supported_code_languages().len(), 15);
    }
}
