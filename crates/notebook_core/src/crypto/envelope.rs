//! Encrypted note envelope.
//!
//! Layout, all fields fixed width except the ciphertext:
//!
//! ```text
//! "ENC1" | algorithm tag (1) | salt (16) | nonce (12) | ciphertext | auth tag (16)
//! ```
//!
//! The magic and algorithm tag are bound to the ciphertext as associated
//! data, so a rewritten header fails authentication.

use super::kdf::{derive_key, generate_salt, KdfParams, SALT_LEN};
use super::{CryptoError, CryptoResult, EncryptionAlgorithm};
use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::Aes256Gcm;
use chacha20poly1305::ChaCha20Poly1305;
use log::debug;
use rand::RngCore;

pub const MAGIC: &[u8; 4] = b"ENC1";
pub const NONCE_LEN: usize = 12;
pub const AUTH_TAG_LEN: usize = 16;

const ALGORITHM_OFFSET: usize = MAGIC.len();
const SALT_OFFSET: usize = ALGORITHM_OFFSET + 1;
const NONCE_OFFSET: usize = SALT_OFFSET + SALT_LEN;
pub const HEADER_LEN: usize = NONCE_OFFSET + NONCE_LEN;
pub const MIN_BLOB_LEN: usize = HEADER_LEN + AUTH_TAG_LEN;

struct Header<'a> {
    algorithm: EncryptionAlgorithm,
    salt: &'a [u8],
    nonce: &'a [u8],
}

impl<'a> Header<'a> {
    fn parse(blob: &'a [u8]) -> CryptoResult<Self> {
        if blob.len() < MIN_BLOB_LEN {
            return Err(CryptoError::CorruptHeader("blob shorter than envelope header"));
        }
        if &blob[..ALGORITHM_OFFSET] != MAGIC {
            return Err(CryptoError::CorruptHeader("missing ENC1 magic"));
        }
        let tag = blob[ALGORITHM_OFFSET];
        let algorithm = EncryptionAlgorithm::from_tag(tag)
            .ok_or_else(|| CryptoError::UnsupportedAlgorithm(format!("tag 0x{tag:02x}")))?;
        Ok(Self {
            algorithm,
            salt: &blob[SALT_OFFSET..NONCE_OFFSET],
            nonce: &blob[NONCE_OFFSET..HEADER_LEN],
        })
    }
}

/// Returns whether `bytes` starts with the envelope magic.
///
/// Only the magic is checked; a truncated blob still reports `true` so the
/// caller routes it to decryption and gets a precise error there.
pub fn is_encrypted_blob(bytes: &[u8]) -> bool {
    bytes.starts_with(MAGIC)
}

/// Reads the algorithm from an envelope header without decrypting.
pub fn peek_algorithm(blob: &[u8]) -> CryptoResult<EncryptionAlgorithm> {
    Header::parse(blob).map(|header| header.algorithm)
}

/// Encrypts `plaintext` under a key derived from `password`.
///
/// # Errors
/// - `EmptyPassword` when `password` is empty.
/// - `Backend` when the cipher primitive fails.
pub fn encrypt(
    plaintext: &[u8],
    password: impl AsRef<[u8]>,
    algorithm: EncryptionAlgorithm,
) -> CryptoResult<Vec<u8>> {
    let password = password.as_ref();
    if password.is_empty() {
        return Err(CryptoError::EmptyPassword);
    }

    let salt = generate_salt();
    let mut nonce = [0_u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut nonce);
    let key = derive_key(password, &salt, &KdfParams::default())?;

    let mut blob = Vec::with_capacity(MIN_BLOB_LEN + plaintext.len());
    blob.extend_from_slice(MAGIC);
    blob.push(algorithm.tag());
    blob.extend_from_slice(&salt);
    blob.extend_from_slice(&nonce);

    let sealed = match algorithm {
        EncryptionAlgorithm::Aes256Gcm => {
            seal::<Aes256Gcm>(&key, &nonce, &blob[..SALT_OFFSET], plaintext)?
        }
        EncryptionAlgorithm::ChaCha20Poly1305 => {
            seal::<ChaCha20Poly1305>(&key, &nonce, &blob[..SALT_OFFSET], plaintext)?
        }
    };
    blob.extend_from_slice(&sealed);

    debug!(
        "event=envelope_seal module=crypto status=ok algorithm={} bytes={}",
        algorithm,
        blob.len()
    );
    Ok(blob)
}

/// Decrypts an envelope produced by [`encrypt`].
///
/// # Errors
/// - `CorruptHeader` when the blob is too short or lacks the magic.
/// - `UnsupportedAlgorithm` for unknown tag bytes.
/// - `InvalidPassword` when authentication fails.
pub fn decrypt(blob: &[u8], password: impl AsRef<[u8]>) -> CryptoResult<Vec<u8>> {
    let header = Header::parse(blob)?;
    let key = derive_key(password.as_ref(), header.salt, &KdfParams::default())?;
    let aad = &blob[..SALT_OFFSET];
    let body = &blob[HEADER_LEN..];

    match header.algorithm {
        EncryptionAlgorithm::Aes256Gcm => open::<Aes256Gcm>(&key, header.nonce, aad, body),
        EncryptionAlgorithm::ChaCha20Poly1305 => {
            open::<ChaCha20Poly1305>(&key, header.nonce, aad, body)
        }
    }
}

fn seal<C: Aead + KeyInit>(
    key: &[u8],
    nonce: &[u8],
    aad: &[u8],
    plaintext: &[u8],
) -> CryptoResult<Vec<u8>> {
    let cipher = C::new_from_slice(key)
        .map_err(|_| CryptoError::Backend("cipher rejected key length".to_string()))?;
    cipher
        .encrypt(
            aes_gcm::aead::Nonce::<C>::from_slice(nonce),
            Payload {
                msg: plaintext,
                aad,
            },
        )
        .map_err(|_| CryptoError::Backend("encryption failed".to_string()))
}

fn open<C: Aead + KeyInit>(
    key: &[u8],
    nonce: &[u8],
    aad: &[u8],
    ciphertext: &[u8],
) -> CryptoResult<Vec<u8>> {
    let cipher = C::new_from_slice(key)
        .map_err(|_| CryptoError::Backend("cipher rejected key length".to_string()))?;
    cipher
        .decrypt(
            aes_gcm::aead::Nonce::<C>::from_slice(nonce),
            Payload {
                msg: ciphertext,
                aad,
            },
        )
        .map_err(|_| CryptoError::InvalidPassword)
}
