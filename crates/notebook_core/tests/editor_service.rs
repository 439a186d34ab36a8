use notebook_core::service::markdown::SuggestionKind;
use notebook_core::{
    AutosaveOutcome, CancelToken, EditorError, EditorService, EncryptionAlgorithm, EventBus,
    ExportOptions, FileManager, MarkdownRenderer, NoteRepository, OpenOutcome,
    RenderError, RepoError, Settings, SystemClock,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

struct TagRenderer;

impl MarkdownRenderer for TagRenderer {
    fn render(&self, markdown: &str) -> Result<String, RenderError> {
        Ok(format!("<article>{markdown}</article>"))
    }
}

struct Fixture {
    dir: TempDir,
    editor: EditorService,
    events: Arc<Mutex<Vec<String>>>,
}

fn setup() -> Fixture {
    let dir = tempfile::tempdir().expect("tempdir should be created");
    let files = Arc::new(FileManager::new(dir.path()).expect("workspace should open"));
    let repo = Arc::new(NoteRepository::new(files, Arc::new(SystemClock)));
    let bus = EventBus::new();
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    bus.subscribe(move |event| sink.lock().unwrap().push(event.name().to_string()));

    let editor = EditorService::new(
        repo,
        Arc::new(TagRenderer),
        bus,
        tokio::runtime::Handle::current(),
        &Settings::default(),
    );
    Fixture { dir, editor, events }
}

fn seen(fixture: &Fixture) -> Vec<String> {
    fixture.events.lock().unwrap().clone()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn lifecycle_emits_events_in_order() {
    let fixture = setup();
    let editor = &fixture.editor;

    let note = editor.create_note("Log", "start");
    assert!(editor.update_content(note.id, "changed").unwrap());
    assert!(!editor.update_content(note.id, "changed").unwrap());
    editor.save_note(note.id, None).unwrap();
    editor.close_note(note.id, false).unwrap();

    assert_eq!(
        seen(&fixture),
        vec!["note_created", "note_modified", "note_saved", "note_closed"]
    );
    assert!(!editor.autosave().is_scheduled(note.id));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn opening_encrypted_file_requests_password() {
    let fixture = setup();
    let editor = &fixture.editor;
    let note = editor.create_note("Locked", "hidden");
    editor
        .set_encryption(note.id, Some(notebook_core::EncryptionAlgorithm::Aes256Gcm))
        .unwrap();
    let saved = editor.save_note(note.id, Some("pw")).unwrap();
    editor.close_note(note.id, false).unwrap();
    fixture.events.lock().unwrap().clear();

    let path = saved.file_path.unwrap();
    let outcome = editor.open_note(&path).unwrap();
    assert!(matches!(outcome, OpenOutcome::NeedsPassword { .. }));
    let wrong = editor.open_encrypted_note(&path, "nope").unwrap_err();
    assert!(matches!(wrong, EditorError::Repo(RepoError::InvalidPassword(_))));
    editor.open_encrypted_note(&path, "pw").unwrap();

    assert_eq!(seen(&fixture), vec!["needs_password", "note_opened"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn autosave_writes_the_latest_content() {
    let fixture = setup();
    let editor = &fixture.editor;
    editor.autosave().set_interval(Duration::from_millis(50));

    let note = editor.create_note("Auto", "v0");
    editor.save_note(note.id, None).unwrap();

    editor.update_content(note.id, "v1").unwrap();
    editor.update_content(note.id, "v2").unwrap();
    assert_eq!(editor.autosave().scheduled_count(), 1);

    for _ in 0..200 {
        if !editor.get_note(note.id).unwrap().dirty {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let on_disk = std::fs::read_to_string(fixture.dir.path().join("Auto.md")).unwrap();
    assert_eq!(on_disk, "v2");
    assert!(!editor.get_note(note.id).unwrap().dirty);
    assert!(seen(&fixture).iter().filter(|name| *name == "note_saved").count() >= 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn spawned_save_honors_cancellation() {
    let fixture = setup();
    let editor = &fixture.editor;
    let note = editor.create_note("Background", "body");

    let cancel = CancelToken::new();
    cancel.cancel();
    let cancelled = EditorService::join_save(editor.spawn_save(note.id, None, cancel)).await;
    assert!(matches!(
        cancelled,
        Err(EditorError::Repo(RepoError::Cancelled(_)))
    ));
    assert!(!fixture.dir.path().join("Background.md").exists());

    let saved = EditorService::join_save(editor.spawn_save(note.id, None, CancelToken::new()))
        .await
        .unwrap();
    assert!(!saved.dirty);
    assert!(fixture.dir.path().join("Background.md").exists());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn spawned_open_completes_or_cancels() {
    let fixture = setup();
    let editor = &fixture.editor;
    let path = fixture.dir.path().join("Inbox.md");
    std::fs::write(&path, "queued").unwrap();

    let cancel = CancelToken::new();
    cancel.cancel();
    let cancelled = EditorService::join_task(editor.spawn_open(path.clone(), cancel)).await;
    assert!(matches!(
        cancelled,
        Err(EditorError::Repo(RepoError::OpenCancelled(_)))
    ));
    assert!(editor.open_notes().is_empty());
    assert!(seen(&fixture).is_empty());

    let outcome = EditorService::join_task(editor.spawn_open(path, CancelToken::new()))
        .await
        .unwrap();
    let OpenOutcome::Opened(note) = outcome else {
        panic!("plaintext file should open");
    };
    assert_eq!(note.content, "queued");
    assert_eq!(seen(&fixture), vec!["note_opened"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn spawned_encrypted_open_completes_or_cancels() {
    let fixture = setup();
    let editor = &fixture.editor;
    let note = editor.create_note("Vault", "sealed");
    editor
        .set_encryption(note.id, Some(EncryptionAlgorithm::ChaCha20Poly1305))
        .unwrap();
    let path = editor.save_note(note.id, Some("pw")).unwrap().file_path.unwrap();
    editor.close_note(note.id, false).unwrap();
    fixture.events.lock().unwrap().clear();

    let cancel = CancelToken::new();
    cancel.cancel();
    let cancelled = EditorService::join_task(editor.spawn_open_encrypted(
        path.clone(),
        "pw".to_string(),
        cancel,
    ))
    .await;
    assert!(matches!(
        cancelled,
        Err(EditorError::Repo(RepoError::OpenCancelled(_)))
    ));
    assert!(editor.open_notes().is_empty());

    let opened = EditorService::join_task(editor.spawn_open_encrypted(
        path,
        "pw".to_string(),
        CancelToken::new(),
    ))
    .await
    .unwrap();
    assert_eq!(opened.content, "sealed");
    assert_eq!(seen(&fixture), vec!["note_opened"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn save_now_updates_the_save_status() {
    let fixture = setup();
    let editor = &fixture.editor;
    let note = editor.create_note("Status", "v0");
    editor.save_note(note.id, None).unwrap();
    editor.update_content(note.id, "v1").unwrap();
    assert_eq!(editor.save_status(note.id).unwrap().save_count, 0);

    let outcome = editor.save_now(note.id).await.unwrap();
    assert!(matches!(outcome, AutosaveOutcome::Saved(_)));
    let status = editor.save_status(note.id).unwrap();
    assert_eq!(status.save_count, 1);
    assert!(status.last_saved.is_some());
    assert_eq!(editor.save_statuses().len(), 1);
    assert_eq!(
        std::fs::read_to_string(fixture.dir.path().join("Status.md")).unwrap(),
        "v1"
    );

    editor.close_note(note.id, false).unwrap();
    assert!(editor.save_status(note.id).is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn notes_export_to_html() {
    let fixture = setup();
    let editor = &fixture.editor;
    let first = editor.create_note("First", "one");
    let second = editor.create_note("Second", "two");
    let options = ExportOptions {
        include_metadata: false,
        footer_text: Some("notebook".to_string()),
    };

    let single = fixture.dir.path().join("first.html");
    editor.export_note_html(first.id, &single, &options).unwrap();
    let page = std::fs::read_to_string(&single).unwrap();
    assert!(page.contains("<article>one</article>"));
    assert!(page.contains("<footer>notebook</footer>"));

    let out = fixture.dir.path().join("export");
    let result = editor
        .export_notes_html(&[first.id, second.id], &out, &options)
        .unwrap();
    assert_eq!(result.success_count, 2);
    assert_eq!(result.failure_count, 0);
    assert!(out.join("First.html").exists());
    assert!(out.join("Second.html").exists());

    let err = editor
        .export_note_html(first.id, fixture.dir.path().join("first.txt"), &options)
        .unwrap_err();
    assert!(matches!(err, EditorError::Export(_)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn preview_and_markdown_helpers() {
    let fixture = setup();
    let editor = &fixture.editor;

    assert_eq!(
        editor.preview_markdown("# Hi").unwrap(),
        "<article># Hi</article>"
    );
    assert_eq!(editor.format_image("logo", "img/logo.png"), "![logo](img/logo.png)");
    assert_eq!(editor.apply_line_prefix("a\nb", 0, "# "), "# a\nb");
    let table = editor.format_table("|x|y|\n|-|-|\n|long cell|z|").unwrap();
    assert!(table.starts_with("| x         | y   |"));
    assert_eq!(editor.validate_markdown("```rust\nfn x() {}").len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn custom_words_feed_completions() {
    let fixture = setup();
    let editor = &fixture.editor;

    editor.add_custom_word("你們好嗎").unwrap();
    let suggestions = editor.get_auto_complete_suggestions("你們", 2);
    assert!(suggestions
        .iter()
        .any(|item| item.kind == SuggestionKind::Completion && item.text == "你們好嗎"));

    assert!(editor.remove_custom_word("你們好嗎"));
    let suggestions = editor.get_auto_complete_suggestions("你們", 2);
    assert!(!suggestions.iter().any(|item| item.text == "你們好嗎"));
}
