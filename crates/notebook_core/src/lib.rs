//! Headless notebook engine.
//! Owns note lifecycle, encryption, sandboxed files, CJK-aware editing
//! helpers, settings and view state; hosts plug in rendering and UI.

pub mod analysis;
pub mod cancel;
pub mod capability;
pub mod crypto;
pub mod fs;
pub mod logging;
pub mod model;
pub mod notebook;
pub mod repo;
pub mod service;
pub mod settings;
pub mod storage;
pub mod view;

pub use analysis::{
    analyze_composition, contains_chinese, count_chinese, find_word_boundary,
    get_common_completions, get_zhuyin_candidates, validate_chinese_input, InputDictionary,
    Lexicon, TextComposition,
};
pub use cancel::CancelToken;
pub use capability::{
    BiometricError, BiometricUnlock, Clock, Dispatcher, ImmediateDispatcher, ManualClock,
    MarkdownRenderer, RenderError, SystemClock,
};
pub use crypto::{CryptoError, CryptoResult, EncryptionAlgorithm};
pub use fs::{FileManager, FsError, FsResult};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::file_info::{FileInfo, FileTreeNode};
pub use model::note::{Note, NoteId};
pub use model::settings::{Settings, SettingsValidationError, Theme};
pub use model::view_state::{ViewMode, ViewState};
pub use notebook::{Capabilities, Notebook, NotebookConfig, NotebookError};
pub use repo::{AutosaveOutcome, NoteRepository, OpenOutcome, RepoError, RepoResult};
pub use service::autosave::{AutosaveError, AutosaveScheduler, SaveStatus};
pub use service::editor_service::{EditorError, EditorResult, EditorService};
pub use service::events::{EventBus, NotebookEvent, SubscriptionId};
pub use service::export::{BatchExportResult, ExportError, ExportOptions, HtmlExporter};
pub use settings::{SettingsError, SettingsResult, SettingsStore};
pub use view::{ViewField, ViewStateChange, ViewStateModel, ViewValue};

/// Minimal health-check API for host integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
