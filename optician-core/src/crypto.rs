//! Argon2id password hashing for the wholesale and master passwords.
//!
//! Hashes are stored as PHC strings (`$argon2id$v=19$m=..,t=..,p=..$salt$hash`),
//! so the cost parameters travel with every hash. Verification re-derives
//! with the stored parameters and compares in constant time.

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, SaltString},
    Algorithm, Argon2, Params, Version,
};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use thiserror::Error;

/// Salt length in bytes
pub const SALT_LEN: usize = 16;

/// Hash output length in bytes
pub const OUTPUT_LEN: usize = 32;

/// Errors that can occur while hashing or verifying passwords
#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("Password hashing failed: {0}")]
    HashFailed(String),

    #[error("Invalid hash parameters: {0}")]
    InvalidParams(String),

    #[error("Malformed password hash: {0}")]
    MalformedHash(String),
}

/// Result type for crypto operations
pub type Result<T> = std::result::Result<T, CryptoError>;

/// Argon2id cost parameters used for new hashes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HashParams {
    /// Memory cost in KiB
    pub memory_kib: u32,

    /// Number of passes
    pub iterations: u32,

    /// Degree of parallelism (lanes)
    pub parallelism: u32,
}

impl Default for HashParams {
    fn default() -> Self {
        Self {
            memory_kib: 19_456, // 19 MiB
            iterations: 2,
            parallelism: 1,
        }
    }
}

impl HashParams {
    pub fn new(memory_kib: u32, iterations: u32, parallelism: u32) -> Self {
        Self {
            memory_kib,
            iterations,
            parallelism,
        }
    }

    /// Verify that parameters are within what Argon2 accepts
    pub fn validate(&self) -> Result<()> {
        if self.parallelism < 1 {
            return Err(CryptoError::InvalidParams(
                "Parallelism too low (minimum: 1)".to_string(),
            ));
        }
        if self.iterations < 1 {
            return Err(CryptoError::InvalidParams(
                "Iterations too low (minimum: 1)".to_string(),
            ));
        }
        if self.memory_kib < 8 * self.parallelism {
            return Err(CryptoError::InvalidParams(format!(
                "Memory cost too low (minimum: {} KiB)",
                8 * self.parallelism
            )));
        }
        Ok(())
    }

    fn hasher(&self) -> Result<Argon2<'static>> {
        let params = Params::new(
            self.memory_kib,
            self.iterations,
            self.parallelism,
            Some(OUTPUT_LEN),
        )
        .map_err(|e| CryptoError::InvalidParams(e.to_string()))?;

        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }
}

/// Hash a password with a fresh random salt, returning a PHC string
pub fn hash_password(password: &[u8], params: &HashParams) -> Result<String> {
    params.validate()?;

    let salt_bytes: [u8; SALT_LEN] = rand::random();
    let salt = SaltString::encode_b64(&salt_bytes)
        .map_err(|e| CryptoError::HashFailed(format!("Failed to encode salt: {}", e)))?;

    let hash = params
        .hasher()?
        .hash_password(password, &salt)
        .map_err(|e| CryptoError::HashFailed(e.to_string()))?;

    Ok(hash.to_string())
}

/// Whether `stored` is a PHC string carrying a salt and a hash output
pub fn is_phc_hash(stored: &str) -> bool {
    PasswordHash::new(stored).is_ok_and(|parsed| parsed.salt.is_some() && parsed.hash.is_some())
}

/// Verify a password against a stored PHC string
///
/// Returns `Ok(false)` for a wrong password and `Err` only when the stored
/// hash cannot be parsed. The derived and stored outputs are compared with
/// `subtle::ConstantTimeEq`.
pub fn verify_password(password: &[u8], stored: &str) -> Result<bool> {
    let parsed =
        PasswordHash::new(stored).map_err(|e| CryptoError::MalformedHash(e.to_string()))?;

    let expected = parsed
        .hash
        .ok_or_else(|| CryptoError::MalformedHash("missing hash output".to_string()))?;
    let salt = parsed
        .salt
        .ok_or_else(|| CryptoError::MalformedHash("missing salt".to_string()))?;

    let algorithm = Algorithm::new(parsed.algorithm.as_str())
        .map_err(|e| CryptoError::MalformedHash(e.to_string()))?;
    let version = match parsed.version {
        Some(v) => Version::try_from(v).map_err(|e| CryptoError::MalformedHash(e.to_string()))?,
        None => Version::V0x13,
    };

    let stored_params =
        Params::try_from(&parsed).map_err(|e| CryptoError::MalformedHash(e.to_string()))?;
    let params = Params::new(
        stored_params.m_cost(),
        stored_params.t_cost(),
        stored_params.p_cost(),
        Some(expected.len()),
    )
    .map_err(|e| CryptoError::MalformedHash(e.to_string()))?;

    let derived = Argon2::new(algorithm, version, params)
        .hash_password(password, salt)
        .map_err(|e| CryptoError::HashFailed(e.to_string()))?;
    let derived = derived
        .hash
        .ok_or_else(|| CryptoError::HashFailed("No hash output".to_string()))?;

    Ok(derived.as_bytes().ct_eq(expected.as_bytes()).into())
}
