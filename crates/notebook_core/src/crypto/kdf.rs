//! Argon2id key derivation.

use super::{CryptoError, CryptoResult};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::RngCore;

pub const SALT_LEN: usize = 16;
pub const KEY_LEN: usize = 32;

const MIN_MEMORY_KIB: u32 = 64 * 1024;
const MIN_ITERATIONS: u32 = 3;

/// Argon2id cost parameters.
///
/// The defaults are also the floor: weaker settings are rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            memory_kib: MIN_MEMORY_KIB,
            iterations: MIN_ITERATIONS,
            parallelism: 1,
        }
    }
}

impl KdfParams {
    pub fn validate(&self) -> CryptoResult<()> {
        if self.memory_kib < MIN_MEMORY_KIB {
            return Err(CryptoError::InvalidKdfParams(format!(
                "memory {} KiB is below the {MIN_MEMORY_KIB} KiB minimum",
                self.memory_kib
            )));
        }
        if self.iterations < MIN_ITERATIONS {
            return Err(CryptoError::InvalidKdfParams(format!(
                "iterations {} is below the minimum of {MIN_ITERATIONS}",
                self.iterations
            )));
        }
        if self.parallelism == 0 {
            return Err(CryptoError::InvalidKdfParams(
                "parallelism must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Derives a 256-bit key from `password` and `salt`.
///
/// # Errors
/// - `InvalidKdfParams` when `params` is below the floor or rejected by argon2.
pub fn derive_key(password: &[u8], salt: &[u8], params: &KdfParams) -> CryptoResult<[u8; KEY_LEN]> {
    params.validate()?;
    let argon_params = Params::new(
        params.memory_kib,
        params.iterations,
        params.parallelism,
        Some(KEY_LEN),
    )
    .map_err(|err| CryptoError::InvalidKdfParams(err.to_string()))?;

    let mut key = [0_u8; KEY_LEN];
    Argon2::new(Algorithm::Argon2id, Version::V0x13, argon_params)
        .hash_password_into(password, salt, &mut key)
        .map_err(|err| CryptoError::Backend(format!("argon2: {err}")))?;
    Ok(key)
}

pub fn generate_salt() -> [u8; SALT_LEN] {
    let mut salt = [0_u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);
    salt
}
