//! Password-based note encryption.
//!
//! # Responsibility
//! - Derive content keys from passwords with Argon2id.
//! - Seal and open note bodies with AES-256-GCM or ChaCha20-Poly1305.
//! - Own the on-disk envelope layout and password strength scoring.
//!
//! # Invariants
//! - Every encryption uses a fresh random salt and nonce.
//! - An authentication failure never yields partial plaintext.
//! - Blobs are self-describing; decryption reads the algorithm from the header.
//!
//! # See also
//! - `envelope` for the exact byte layout.

pub mod envelope;
pub mod kdf;
pub mod password;

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

pub use envelope::{decrypt, encrypt, is_encrypted_blob, peek_algorithm};
pub use kdf::{derive_key, KdfParams};
pub use password::{check_password_strength, PasswordStrength, StrengthLevel};

pub type CryptoResult<T> = Result<T, CryptoError>;

/// Authenticated cipher used for a note body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EncryptionAlgorithm {
    #[serde(rename = "aes256")]
    Aes256Gcm,
    #[serde(rename = "chacha20")]
    ChaCha20Poly1305,
}

impl EncryptionAlgorithm {
    pub const ALL: [EncryptionAlgorithm; 2] = [Self::Aes256Gcm, Self::ChaCha20Poly1305];

    /// Stable settings/wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Aes256Gcm => "aes256",
            Self::ChaCha20Poly1305 => "chacha20",
        }
    }

    /// Envelope header tag byte.
    pub fn tag(self) -> u8 {
        match self {
            Self::Aes256Gcm => 1,
            Self::ChaCha20Poly1305 => 2,
        }
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            1 => Some(Self::Aes256Gcm),
            2 => Some(Self::ChaCha20Poly1305),
            _ => None,
        }
    }
}

impl Display for EncryptionAlgorithm {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EncryptionAlgorithm {
    type Err = CryptoError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "aes256" | "aes-256-gcm" => Ok(Self::Aes256Gcm),
            "chacha20" | "chacha20-poly1305" => Ok(Self::ChaCha20Poly1305),
            other => Err(CryptoError::UnsupportedAlgorithm(other.to_string())),
        }
    }
}

/// Crypto-layer failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Authentication failed: wrong password or tampered data.
    InvalidPassword,
    /// Algorithm tag or name is not one we can decrypt.
    UnsupportedAlgorithm(String),
    /// Envelope is shorter than the fixed header or carries a bad magic.
    CorruptHeader(&'static str),
    /// Caller-supplied KDF parameters are below the security floor.
    InvalidKdfParams(String),
    /// Encryption was requested with an empty password.
    EmptyPassword,
    /// Backend primitive failed for a reason other than authentication.
    Backend(String),
}

impl Display for CryptoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidPassword => write!(f, "invalid password or corrupted ciphertext"),
            Self::UnsupportedAlgorithm(name) => write!(f, "unsupported encryption algorithm: {name}"),
            Self::CorruptHeader(reason) => write!(f, "corrupt encryption header: {reason}"),
            Self::InvalidKdfParams(reason) => write!(f, "invalid key derivation params: {reason}"),
            Self::EmptyPassword => write!(f, "password cannot be empty"),
            Self::Backend(reason) => write!(f, "crypto backend failure: {reason}"),
        }
    }
}

impl Error for CryptoError {}
