use notebook_core::crypto::EncryptionAlgorithm;
use notebook_core::{Settings, SettingsError, SettingsStore, Theme};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

fn setup() -> (tempfile::TempDir, SettingsStore) {
    let dir = tempfile::tempdir().expect("tempdir should be created");
    let store = SettingsStore::open(dir.path().join("notebook").join("settings.json"))
        .expect("missing file should open with defaults");
    (dir, store)
}

#[test]
fn invalid_interval_is_rejected_without_side_effects() {
    let (_dir, store) = setup();
    let notified = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&notified);
    store.on_change(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    let before = store.current();

    let err = store
        .update(|settings| settings.with_auto_save_interval(0))
        .expect_err("zero interval must be rejected");
    let validation = err.validation().expect("validation error expected");
    assert!(validation.has_field("autoSaveInterval"));

    assert_eq!(store.current(), before);
    assert_eq!(notified.load(Ordering::SeqCst), 0);
    assert!(!store.path().exists());
}

#[test]
fn relative_save_location_is_rejected() {
    let (_dir, store) = setup();
    let err = store
        .save(
            Settings::default()
                .with_default_save_location("notes")
                .with_auto_save_interval(61),
        )
        .expect_err("invalid settings must fail");
    match err {
        SettingsError::Validation(validation) => {
            assert!(validation.has_field("defaultSaveLocation"));
            assert!(validation.has_field("autoSaveInterval"));
        }
        other => panic!("unexpected error {other}"),
    }
}

#[test]
fn round_trip_preserves_unknown_fields() {
    let (dir, store) = setup();
    let path = store.path().to_path_buf();
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    let location = dir.path().join("notes");
    std::fs::write(
        &path,
        serde_json::to_vec(&json!({
            "defaultEncryption": "chacha20",
            "autoSaveInterval": 10,
            "defaultSaveLocation": location,
            "biometricEnabled": true,
            "theme": "dark",
            "schemaVersion": 1,
            "fontFamily": "Noto Sans TC",
            "recent": ["a.md", "b.md"]
        }))
        .unwrap(),
    )
    .unwrap();

    let loaded = store.load().expect("valid file should load");
    assert_eq!(loaded.default_encryption, EncryptionAlgorithm::ChaCha20Poly1305);
    assert_eq!(loaded.theme, Theme::Dark);
    assert_eq!(loaded.extra["fontFamily"], "Noto Sans TC");

    store.save(Settings::clone(&loaded)).unwrap();
    let reloaded = SettingsStore::open(&path).unwrap().current();
    assert_eq!(reloaded, loaded);

    let raw: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
    assert_eq!(raw["recent"], json!(["a.md", "b.md"]));
    assert_eq!(raw["autoSaveInterval"], 10);
}

#[test]
fn unknown_enum_value_is_a_parse_error() {
    let (_dir, store) = setup();
    std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
    std::fs::write(store.path(), br#"{"theme":"neon"}"#).unwrap();
    assert!(matches!(store.load(), Err(SettingsError::Parse { .. })));
    assert!(store.current().is_default());
}

#[test]
fn listeners_run_in_order_and_survive_panics() {
    let (_dir, store) = setup();
    let order = Arc::new(Mutex::new(Vec::new()));

    let first = Arc::clone(&order);
    store.on_change(move |_| first.lock().unwrap().push("first"));
    store.on_change(|_| panic!("listener failure"));
    let third = Arc::clone(&order);
    store.on_change(move |settings| {
        assert_eq!(settings.theme, Theme::Light);
        third.lock().unwrap().push("third");
    });

    store
        .update(|settings| settings.with_theme(Theme::Light))
        .expect("save should succeed despite panicking listener");
    assert_eq!(*order.lock().unwrap(), vec!["first", "third"]);
    assert_eq!(store.current().theme, Theme::Light);
}
