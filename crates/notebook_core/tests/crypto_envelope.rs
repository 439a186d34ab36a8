use notebook_core::crypto::envelope::{HEADER_LEN, MIN_BLOB_LEN};
use notebook_core::crypto::{
    check_password_strength, decrypt, encrypt, is_encrypted_blob, peek_algorithm, StrengthLevel,
};
use notebook_core::{CryptoError, EncryptionAlgorithm};

#[test]
fn every_algorithm_round_trips_and_rejects_wrong_password() {
    let plaintext = "秘密筆記 with ascii".as_bytes();
    for algorithm in EncryptionAlgorithm::ALL {
        let blob = encrypt(plaintext, "correct horse", algorithm).expect("encrypt should succeed");
        assert!(is_encrypted_blob(&blob));
        assert_eq!(&blob[..4], b"ENC1");
        assert_eq!(peek_algorithm(&blob), Ok(algorithm));
        assert_eq!(blob.len(), MIN_BLOB_LEN + plaintext.len());

        assert_eq!(
            decrypt(&blob, "correct horse").expect("decrypt should succeed"),
            plaintext
        );
        assert_eq!(
            decrypt(&blob, "battery staple").expect_err("wrong password must fail"),
            CryptoError::InvalidPassword
        );
    }
}

#[test]
fn tampering_is_indistinguishable_from_wrong_password() {
    let mut blob = encrypt(b"body", "pw", EncryptionAlgorithm::Aes256Gcm).unwrap();
    let last = blob.len() - 1;
    blob[last] ^= 0x01;
    assert_eq!(decrypt(&blob, "pw"), Err(CryptoError::InvalidPassword));

    let mut swapped = encrypt(b"body", "pw", EncryptionAlgorithm::Aes256Gcm).unwrap();
    swapped[4] = EncryptionAlgorithm::ChaCha20Poly1305.tag();
    assert_eq!(decrypt(&swapped, "pw"), Err(CryptoError::InvalidPassword));
}

#[test]
fn malformed_headers_are_reported() {
    assert!(matches!(
        decrypt(b"ENC1", "pw"),
        Err(CryptoError::CorruptHeader(_))
    ));

    let mut unknown = vec![0_u8; MIN_BLOB_LEN];
    unknown[..4].copy_from_slice(b"ENC1");
    unknown[4] = 0x7f;
    assert!(matches!(
        decrypt(&unknown, "pw"),
        Err(CryptoError::UnsupportedAlgorithm(_))
    ));

    let plain = vec![b'#'; HEADER_LEN + 32];
    assert!(!is_encrypted_blob(&plain));
    assert!(matches!(
        decrypt(&plain, "pw"),
        Err(CryptoError::CorruptHeader(_))
    ));
}

#[test]
fn empty_password_is_refused() {
    assert_eq!(
        encrypt(b"x", "", EncryptionAlgorithm::ChaCha20Poly1305),
        Err(CryptoError::EmptyPassword)
    );
}

#[test]
fn algorithm_names_parse_from_settings_vocabulary() {
    assert_eq!(
        "aes256".parse::<EncryptionAlgorithm>().unwrap(),
        EncryptionAlgorithm::Aes256Gcm
    );
    assert_eq!(
        "chacha20".parse::<EncryptionAlgorithm>().unwrap(),
        EncryptionAlgorithm::ChaCha20Poly1305
    );
    assert!("rot13".parse::<EncryptionAlgorithm>().is_err());
}

#[test]
fn password_strength_levels() {
    assert_eq!(check_password_strength("abc").level, StrengthLevel::Weak);
    assert_eq!(check_password_strength("password").level, StrengthLevel::Weak);
    assert_eq!(
        check_password_strength("Tr0ub4dor&3-horse-staple").level,
        StrengthLevel::Strong
    );
    assert!(!check_password_strength("abcdefgh").suggestions.is_empty());
}
