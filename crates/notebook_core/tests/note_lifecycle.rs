use notebook_core::{
    BiometricError, BiometricUnlock, CancelToken, EncryptionAlgorithm, FileManager, ManualClock,
    NoteRepository, OpenOutcome, RepoError,
};
use std::sync::{Arc, Barrier, Mutex};
use std::thread;
use tempfile::TempDir;

fn setup() -> (TempDir, NoteRepository) {
    let dir = tempfile::tempdir().expect("tempdir should be created");
    let files = FileManager::new(dir.path()).expect("workspace should open");
    let repo = NoteRepository::new(Arc::new(files), Arc::new(ManualClock::new(1_700_000_000_000)));
    (dir, repo)
}

#[test]
fn plaintext_round_trip() {
    let (dir, repo) = setup();
    let note = repo.create("a", "# Hello\n");
    assert!(note.dirty);
    assert!(note.file_path.is_none());

    let saved = repo
        .save_as(note.id, "notes/a.md", None, &CancelToken::new())
        .expect("save should succeed");
    assert!(!saved.dirty);
    repo.close(note.id, false).expect("clean note should close");

    let reopened = match repo.open(dir.path().join("notes/a.md")).unwrap() {
        OpenOutcome::Opened(note) => note,
        other => panic!("expected plaintext open, got {other:?}"),
    };
    assert_eq!(reopened.content, "# Hello\n");
    assert_eq!(reopened.title, "a");
    assert!(!reopened.is_encrypted());
    assert!(!reopened.dirty);
}

#[test]
fn encrypted_round_trip_needs_password() {
    let (dir, repo) = setup();
    let note = repo.create("vault", "secret");
    repo.set_encryption(note.id, Some(EncryptionAlgorithm::Aes256Gcm))
        .unwrap();
    let saved = repo
        .save(note.id, Some("pw"), &CancelToken::new())
        .expect("encrypted save should succeed");
    let path = saved.file_path.expect("save should assign a path");
    assert!(path.to_string_lossy().ends_with("vault.enc.md"));

    let on_disk = std::fs::read(&path).unwrap();
    assert_eq!(&on_disk[..4], b"ENC1");
    assert!(!String::from_utf8_lossy(&on_disk).contains("secret"));
    repo.close(note.id, false).unwrap();

    match repo.open(&path).unwrap() {
        OpenOutcome::NeedsPassword { file_path } => {
            assert_eq!(file_path, dir.path().canonicalize().unwrap().join("vault.enc.md"))
        }
        other => panic!("expected password prompt, got {other:?}"),
    }

    let err = repo
        .open_encrypted(&path, "bad")
        .expect_err("wrong password must fail");
    assert!(err.is_wrong_password());

    let opened = repo.open_encrypted(&path, "pw").expect("right password opens");
    assert_eq!(opened.content, "secret");
    assert_eq!(opened.encryption, Some(EncryptionAlgorithm::Aes256Gcm));
}

#[test]
fn reopen_while_open_still_needs_password() {
    let (_dir, repo) = setup();
    let note = repo.create("open vault", "kept");
    repo.set_encryption(note.id, Some(EncryptionAlgorithm::Aes256Gcm))
        .unwrap();
    let path = repo
        .save(note.id, Some("pw"), &CancelToken::new())
        .unwrap()
        .file_path
        .unwrap();

    assert!(matches!(
        repo.open(&path).unwrap(),
        OpenOutcome::NeedsPassword { .. }
    ));
    assert_eq!(repo.list_open().len(), 1);
}

#[test]
fn wrong_password_on_open_note_is_rejected() {
    let (_dir, repo) = setup();
    let note = repo.create("open diary", "private");
    repo.set_encryption(note.id, Some(EncryptionAlgorithm::ChaCha20Poly1305))
        .unwrap();
    let path = repo
        .save(note.id, Some("pw"), &CancelToken::new())
        .unwrap()
        .file_path
        .unwrap();

    let err = repo
        .open_encrypted(&path, "guess")
        .expect_err("wrong password must fail while the note is open");
    assert!(err.is_wrong_password());

    let again = repo.open_encrypted(&path, "pw").unwrap();
    assert_eq!(again.id, note.id);
    assert_eq!(again.content, "private");
}

#[test]
fn session_secret_lets_later_saves_reencrypt() {
    let (_dir, repo) = setup();
    let note = repo.create("diary", "one");
    repo.set_encryption(note.id, Some(EncryptionAlgorithm::ChaCha20Poly1305))
        .unwrap();
    assert!(matches!(
        repo.save(note.id, None, &CancelToken::new()),
        Err(RepoError::PasswordRequired(_))
    ));

    let saved = repo.save(note.id, Some("pw"), &CancelToken::new()).unwrap();
    repo.update_content(note.id, "two").unwrap();
    repo.save(note.id, None, &CancelToken::new())
        .expect("stored secret should be reused");
    repo.close(note.id, false).unwrap();

    let path = saved.file_path.unwrap();
    let reopened = repo.open_encrypted(&path, "pw").unwrap();
    assert_eq!(reopened.content, "two");
}

#[test]
fn dirty_note_refuses_close_unless_forced() {
    let (_dir, repo) = setup();
    let note = repo.create("draft", "text");
    assert!(matches!(
        repo.close(note.id, false),
        Err(RepoError::DirtyNote(_))
    ));
    repo.close(note.id, true).expect("forced close succeeds");
    assert!(matches!(repo.get(note.id), Err(RepoError::NoteNotFound(_))));
}

#[test]
fn cancelled_save_writes_nothing() {
    let (dir, repo) = setup();
    let note = repo.create("later", "text");
    let cancel = CancelToken::new();
    cancel.cancel();

    assert!(matches!(
        repo.save(note.id, None, &cancel),
        Err(RepoError::Cancelled(_))
    ));
    assert!(!dir.path().join("later.md").exists());
    assert!(repo.is_dirty(note.id).unwrap());
}

#[test]
fn saving_a_clean_note_is_a_no_op() {
    let (_dir, repo) = setup();
    let note = repo.create("stable", "text");
    let first = repo.save(note.id, None, &CancelToken::new()).unwrap();
    let second = repo.save(note.id, None, &CancelToken::new()).unwrap();
    assert_eq!(first, second);
    assert!(!second.dirty);
}

#[test]
fn concurrent_edits_and_saves_leave_the_last_edit_on_disk() {
    let (dir, repo) = setup();
    let repo = Arc::new(repo);
    let note = repo.create("busy", "0");
    repo.save(note.id, None, &CancelToken::new()).unwrap();

    let handles: Vec<_> = (1..=4)
        .map(|worker| {
            let repo = Arc::clone(&repo);
            thread::spawn(move || {
                for step in 0..25 {
                    repo.update_content(note.id, &format!("{worker}-{step}"))
                        .unwrap();
                    repo.save(note.id, None, &CancelToken::new()).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("worker should not panic");
    }

    repo.save(note.id, None, &CancelToken::new()).unwrap();
    let current = repo.get(note.id).unwrap();
    assert!(!current.dirty);
    let on_disk = std::fs::read_to_string(dir.path().join("busy.md")).unwrap();
    assert_eq!(on_disk, current.content);
}

#[test]
fn concurrent_first_saves_with_same_title_get_distinct_paths() {
    let (dir, repo) = setup();
    let repo = Arc::new(repo);

    for round in 0..20 {
        let title = format!("Same {round}");
        let barrier = Arc::new(Barrier::new(2));
        let handles: Vec<_> = (0..2)
            .map(|worker| {
                let repo = Arc::clone(&repo);
                let barrier = Arc::clone(&barrier);
                let note = repo.create(&title, &format!("worker {worker}"));
                thread::spawn(move || {
                    barrier.wait();
                    repo.save(note.id, None, &CancelToken::new()).unwrap()
                })
            })
            .collect();
        let saved: Vec<_> = handles
            .into_iter()
            .map(|handle| handle.join().expect("worker should not panic"))
            .collect();

        let first = saved[0].file_path.clone().unwrap();
        let second = saved[1].file_path.clone().unwrap();
        assert_ne!(first, second, "round {round} reused a path");
        for note in &saved {
            let on_disk = std::fs::read_to_string(note.file_path.as_ref().unwrap()).unwrap();
            assert_eq!(on_disk, note.content);
        }
    }
    let files = std::fs::read_dir(dir.path()).unwrap().count();
    assert_eq!(files, 40);
}

struct FixedKey {
    requests: Mutex<Vec<String>>,
    deny: bool,
}

impl BiometricUnlock for FixedKey {
    fn retrieve_key(&self, key_id: &str) -> Result<Vec<u8>, BiometricError> {
        self.requests.lock().unwrap().push(key_id.to_string());
        if self.deny {
            Err(BiometricError::Denied)
        } else {
            Ok(vec![7_u8; 32])
        }
    }
}

#[test]
fn biometric_key_saves_and_opens_when_enabled() {
    let dir = tempfile::tempdir().unwrap();
    let files = Arc::new(FileManager::new(dir.path()).unwrap());
    let unlock = Arc::new(FixedKey {
        requests: Mutex::new(Vec::new()),
        deny: false,
    });
    let repo = NoteRepository::new(Arc::clone(&files), Arc::new(ManualClock::new(0)))
        .with_biometric(unlock.clone());

    let note = repo.create("bio", "fingerprint");
    repo.set_encryption(note.id, Some(EncryptionAlgorithm::Aes256Gcm))
        .unwrap();
    assert!(matches!(
        repo.save(note.id, None, &CancelToken::new()),
        Err(RepoError::PasswordRequired(_))
    ));

    repo.set_biometric_enabled(true);
    let saved = repo.save(note.id, None, &CancelToken::new()).unwrap();
    let path = saved.file_path.unwrap();
    repo.close(note.id, false).unwrap();

    let reopened = repo.open_with_biometric(&path).unwrap();
    assert_eq!(reopened.content, "fingerprint");
    let requests = unlock.requests.lock().unwrap();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0], path.to_string_lossy());
}

#[test]
fn biometric_reopen_of_open_note_checks_the_key() {
    let dir = tempfile::tempdir().unwrap();
    let files = Arc::new(FileManager::new(dir.path()).unwrap());
    let repo = NoteRepository::new(files, Arc::new(ManualClock::new(0))).with_biometric(Arc::new(
        FixedKey {
            requests: Mutex::new(Vec::new()),
            deny: false,
        },
    ));
    repo.set_biometric_enabled(true);

    let note = repo.create("pw only", "body");
    repo.set_encryption(note.id, Some(EncryptionAlgorithm::Aes256Gcm))
        .unwrap();
    let path = repo
        .save(note.id, Some("pw"), &CancelToken::new())
        .unwrap()
        .file_path
        .unwrap();

    assert!(repo.open_with_biometric(&path).is_err());
}

#[test]
fn denied_biometric_surfaces_as_error() {
    let dir = tempfile::tempdir().unwrap();
    let files = Arc::new(FileManager::new(dir.path()).unwrap());
    let repo = NoteRepository::new(files, Arc::new(ManualClock::new(0))).with_biometric(Arc::new(
        FixedKey {
            requests: Mutex::new(Vec::new()),
            deny: true,
        },
    ));
    repo.set_biometric_enabled(true);

    let note = repo.create("locked", "x");
    repo.set_encryption(note.id, Some(EncryptionAlgorithm::Aes256Gcm))
        .unwrap();
    assert!(matches!(
        repo.save(note.id, None, &CancelToken::new()),
        Err(RepoError::Biometric(BiometricError::Denied))
    ));
}

#[test]
fn reopening_an_open_path_returns_the_same_note() {
    let (dir, repo) = setup();
    std::fs::write(dir.path().join("shared.txt"), "hello").unwrap();

    let first = match repo.open("shared.txt").unwrap() {
        OpenOutcome::Opened(note) => note,
        other => panic!("unexpected {other:?}"),
    };
    repo.update_content(first.id, "edited").unwrap();
    let second = match repo.open(dir.path().join("shared.txt")).unwrap() {
        OpenOutcome::Opened(note) => note,
        other => panic!("unexpected {other:?}"),
    };
    assert_eq!(second.id, first.id);
    assert_eq!(second.content, "edited");
    assert_eq!(second.title, "shared");
    assert_eq!(repo.list_open().len(), 1);
}
