//! HTML export of notes.
//!
//! # Responsibility
//! - Render a note through the host renderer into a standalone HTML page.
//! - Export one note to a chosen file, or many notes into a directory.
//!
//! # Invariants
//! - Every written page goes through `storage::write_atomic`.
//! - A batch never aborts on a single failure; failures are counted and
//!   reported by note title.
//! - Batch file names are unique within one batch.

use crate::capability::{MarkdownRenderer, RenderError};
use crate::model::note::Note;
use crate::repo::note_repo::sanitize_file_stem;
use crate::storage;
use chrono::DateTime;
use log::{info, warn};
use serde::Serialize;
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub type ExportResult<T> = Result<T, ExportError>;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S UTC";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportOptions {
    /// Adds created/modified timestamps under the title.
    pub include_metadata: bool,
    pub footer_text: Option<String>,
}

#[derive(Debug)]
pub enum ExportError {
    EmptyPath,
    /// Target does not end in `.html`.
    InvalidExtension(PathBuf),
    /// Parent directory of the target does not exist.
    MissingDirectory(PathBuf),
    EmptyBatch,
    Render(RenderError),
    Io { path: PathBuf, source: io::Error },
}

impl Display for ExportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyPath => write!(f, "export path is empty"),
            Self::InvalidExtension(path) => {
                write!(f, "export path must end in .html: {}", path.display())
            }
            Self::MissingDirectory(path) => {
                write!(f, "export directory does not exist: {}", path.display())
            }
            Self::EmptyBatch => write!(f, "no notes to export"),
            Self::Render(err) => write!(f, "{err}"),
            Self::Io { path, source } => write!(f, "export to {} failed: {source}", path.display()),
        }
    }
}

impl Error for ExportError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Render(err) => Some(err),
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<RenderError> for ExportError {
    fn from(value: RenderError) -> Self {
        Self::Render(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchExportResult {
    pub total_files: usize,
    pub success_count: usize,
    pub failure_count: usize,
    /// Titles of the notes that could not be exported.
    pub failed_files: Vec<String>,
    pub output_dir: PathBuf,
}

pub struct HtmlExporter {
    renderer: Arc<dyn MarkdownRenderer>,
}

impl HtmlExporter {
    pub fn new(renderer: Arc<dyn MarkdownRenderer>) -> Self {
        Self { renderer }
    }

    /// Renders `note` into a full HTML document.
    pub fn render_page(&self, note: &Note, options: &ExportOptions) -> ExportResult<String> {
        let body = self.renderer.render(&note.content)?;
        let title = escape_html(&note.title);

        let mut page = String::with_capacity(body.len() + 512);
        page.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"UTF-8\">\n");
        page.push_str(&format!("<title>{title}</title>\n"));
        page.push_str("</head>\n<body>\n");
        page.push_str(&format!("<h1 class=\"note-title\">{title}</h1>\n"));
        if options.include_metadata {
            page.push_str("<div class=\"metadata\">\n");
            page.push_str(&format!(
                "<p>Created: {}</p>\n<p>Modified: {}</p>\n",
                format_timestamp(note.created_at),
                format_timestamp(note.modified_at)
            ));
            page.push_str("</div>\n");
        }
        page.push_str("<div class=\"content\">\n");
        page.push_str(&body);
        page.push_str("\n</div>\n");
        if let Some(footer) = options.footer_text.as_deref().filter(|text| !text.is_empty()) {
            page.push_str(&format!("<footer>{}</footer>\n", escape_html(footer)));
        }
        page.push_str("</body>\n</html>\n");
        Ok(page)
    }

    /// Writes one note to `path`.
    ///
    /// # Errors
    /// - `EmptyPath`, `InvalidExtension`, `MissingDirectory` for a bad target.
    /// - `Render` when the host renderer fails; nothing is written then.
    pub fn export_html(&self, note: &Note, path: &Path, options: &ExportOptions) -> ExportResult<()> {
        validate_export_path(path)?;
        let page = self.render_page(note, options)?;
        storage::write_atomic(path, page.as_bytes()).map_err(|source| ExportError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        info!(
            "event=export_html module=export status=ok note_id={} path={} bytes={}",
            note.id,
            path.display(),
            page.len()
        );
        Ok(())
    }

    /// Exports every note into `output_dir`, creating it if needed.
    /// Files are named after the sanitized title; clashes get `-2`, `-3`.
    pub fn export_batch(
        &self,
        notes: &[Note],
        output_dir: &Path,
        options: &ExportOptions,
    ) -> ExportResult<BatchExportResult> {
        if notes.is_empty() {
            return Err(ExportError::EmptyBatch);
        }
        if output_dir.as_os_str().is_empty() {
            return Err(ExportError::EmptyPath);
        }
        std::fs::create_dir_all(output_dir).map_err(|source| ExportError::Io {
            path: output_dir.to_path_buf(),
            source,
        })?;

        let mut result = BatchExportResult {
            total_files: notes.len(),
            success_count: 0,
            failure_count: 0,
            failed_files: Vec::new(),
            output_dir: output_dir.to_path_buf(),
        };
        let mut used = HashSet::new();
        for note in notes {
            let path = output_dir.join(unique_file_name(&note.title, &mut used));
            match self.export_html(note, &path, options) {
                Ok(()) => result.success_count += 1,
                Err(err) => {
                    warn!(
                        "event=export_html module=export status=error note_id={} error={}",
                        note.id, err
                    );
                    result.failure_count += 1;
                    result.failed_files.push(note.title.clone());
                }
            }
        }
        info!(
            "event=export_batch module=export status=ok total={} failed={}",
            result.total_files, result.failure_count
        );
        Ok(result)
    }
}

fn validate_export_path(path: &Path) -> ExportResult<()> {
    if path.as_os_str().is_empty() {
        return Err(ExportError::EmptyPath);
    }
    let is_html = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("html"));
    if !is_html {
        return Err(ExportError::InvalidExtension(path.to_path_buf()));
    }
    match path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        Some(parent) if !parent.is_dir() => Err(ExportError::MissingDirectory(parent.to_path_buf())),
        _ => Ok(()),
    }
}

fn unique_file_name(title: &str, used: &mut HashSet<String>) -> String {
    let stem = sanitize_file_stem(title);
    let mut candidate = format!("{stem}.html");
    let mut suffix = 2;
    while !used.insert(candidate.to_lowercase()) {
        candidate = format!("{stem}-{suffix}.html");
        suffix += 1;
    }
    candidate
}

fn format_timestamp(epoch_ms: i64) -> String {
    DateTime::from_timestamp_millis(epoch_ms)
        .map(|time| time.format(TIMESTAMP_FORMAT).to_string())
        .unwrap_or_else(|| epoch_ms.to_string())
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            ch => escaped.push(ch),
        }
    }
    escaped
}
