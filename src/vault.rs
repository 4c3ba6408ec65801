//! Password sealing of private keys using PBKDF2 + AES-256-GCM
//!
//! This module implements at-rest protection for a private key export:
//! - PBKDF2-HMAC-SHA256 (100,000 iterations by default) derives a 256-bit
//!   key from the password and a fresh 16-byte salt
//! - AES-256-GCM with a fresh 12-byte IV encrypts and authenticates the export
//!
//! The binary format of a sealed blob is:
//! - salt: 16 bytes
//! - iv: 12 bytes
//! - length: 8 bytes (big-endian signed int64)
//! - ciphertext: variable length (includes 16-byte GCM tag)

use std::mem::size_of;

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::config::Config;
use crate::error::{CypherError, ErrorCategory, ErrorKind, Result};
use crate::keywrap::{self, PrivateKey};
use crate::varmor::{self, ArmorKind};

/// Length of salt in bytes
pub const SALT_LEN: usize = 16;

/// Length of AES-GCM initialization vector in bytes
pub const IV_LEN: usize = 12;

/// Length of derived key in bytes
const KEY_LEN: usize = 32;

/// A private key export sealed under a password.
///
/// The three fields are the entire persisted state; store them however you
/// like and hand them back unchanged to [`unseal`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedBlob {
    pub ciphertext: Vec<u8>,
    pub salt: Vec<u8>,
    pub iv: Vec<u8>,
}

/// Derive a 32-byte key from a password and salt using PBKDF2-HMAC-SHA256
pub fn derive_key(password: &[u8], salt: &[u8], iterations: u32) -> Result<Zeroizing<[u8; KEY_LEN]>> {
    if iterations == 0 {
        return Err(CypherError::with_kind(
            ErrorCategory::User,
            ErrorKind::KeyDerivationFailed,
            "key derivation needs at least one iteration",
        ));
    }
    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    pbkdf2_hmac::<Sha256>(password, salt, iterations, &mut *key);
    Ok(key)
}

fn cipher(key: &[u8; KEY_LEN]) -> Result<Aes256Gcm> {
    Aes256Gcm::new_from_slice(key).map_err(|_| {
        CypherError::with_kind(
            ErrorCategory::Internal,
            ErrorKind::InternalInvariant,
            "AES-256-GCM rejected the derived key",
        )
    })
}

/// Seal a private key export with a password using random salt and IV
pub fn seal(export: &[u8], password: &[u8], config: &Config) -> Result<SealedBlob> {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);

    let mut iv = [0u8; IV_LEN];
    OsRng.fill_bytes(&mut iv);

    seal_deterministic(export, password, &salt, &iv, config.kdf_iterations)
}

/// Seal a private key export using provided salt and IV
///
/// This function is ONLY for testing purposes to generate deterministic output.
/// NEVER use this in production - always use `seal()` which generates random salt/IV.
pub fn seal_deterministic(
    export: &[u8],
    password: &[u8],
    salt: &[u8; SALT_LEN],
    iv: &[u8; IV_LEN],
    iterations: u32,
) -> Result<SealedBlob> {
    tracing::debug!(export_len = export.len(), iterations, "sealing private key");
    let key = derive_key(password, salt, iterations)?;
    let ciphertext = cipher(&key)?
        .encrypt(Nonce::from_slice(iv), export)
        .map_err(|_| {
            CypherError::with_kind(
                ErrorCategory::Internal,
                ErrorKind::SealFailed,
                "failed to seal private key",
            )
        })?;

    Ok(SealedBlob {
        ciphertext,
        salt: salt.to_vec(),
        iv: iv.to_vec(),
    })
}

/// Unseal a blob with a password.
///
/// Wrong password, tampering, corruption and malformed salt/IV all return
/// the same `UnsealFailed` error. The key is always derived first so the
/// paths cost the same.
pub fn unseal(blob: &SealedBlob, password: &[u8], config: &Config) -> Result<Zeroizing<Vec<u8>>> {
    let key = derive_key(password, &blob.salt, config.kdf_iterations)?;

    let opened = if blob.salt.len() == SALT_LEN && blob.iv.len() == IV_LEN {
        cipher(&key)?
            .decrypt(Nonce::from_slice(&blob.iv), blob.ciphertext.as_slice())
            .ok()
    } else {
        None
    };

    match opened {
        Some(export) => {
            tracing::debug!(export_len = export.len(), "unsealed private key");
            Ok(Zeroizing::new(export))
        }
        None => {
            tracing::warn!("failed to unseal private key");
            Err(unseal_failed())
        }
    }
}

fn unseal_failed() -> CypherError {
    CypherError::with_kind(
        ErrorCategory::User,
        ErrorKind::UnsealFailed,
        "corrupt input, tampered-with data, or bad password",
    )
}

/// Export and seal a private key.
pub fn seal_private_key(key: &PrivateKey, password: &[u8], config: &Config) -> Result<SealedBlob> {
    let export = keywrap::export_private_key(key)?;
    seal(&export, password, config)
}

/// Unseal and import a private key.
///
/// A blob that authenticates but does not hold a valid key is reported the
/// same way as a wrong password.
pub fn unseal_private_key(blob: &SealedBlob, password: &[u8], config: &Config) -> Result<PrivateKey> {
    let export = unseal(blob, password, config)?;
    keywrap::import_private_key(&export).map_err(|_| unseal_failed())
}

impl SealedBlob {
    /// Binary form: salt(16) + iv(12) + length(8) + ciphertext(variable)
    ///
    /// Salt and IV must have their fixed sizes; the layout has no room for
    /// anything else.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        if self.salt.len() != SALT_LEN || self.iv.len() != IV_LEN {
            return Err(CypherError::with_kind(
                ErrorCategory::User,
                ErrorKind::BinaryFormat,
                format!(
                    "sealed key needs a {}-byte salt and a {}-byte iv, got {} and {}",
                    SALT_LEN,
                    IV_LEN,
                    self.salt.len(),
                    self.iv.len()
                ),
            ));
        }
        let ciphertext_len = i64::try_from(self.ciphertext.len()).map_err(|_| {
            CypherError::with_kind(
                ErrorCategory::User,
                ErrorKind::BinaryFormat,
                "sealed key too long to encode",
            )
        })?;
        let mut output = Vec::with_capacity(
            self.salt.len() + self.iv.len() + size_of::<i64>() + self.ciphertext.len(),
        );
        output.extend_from_slice(&self.salt);
        output.extend_from_slice(&self.iv);
        output.extend_from_slice(&ciphertext_len.to_be_bytes()); // big-endian i64
        output.extend_from_slice(&self.ciphertext);
        Ok(output)
    }

    /// Parse the binary form produced by [`SealedBlob::to_bytes`].
    pub fn from_bytes(input: &[u8]) -> Result<Self> {
        let mut pos = 0;

        if input.len() < pos + SALT_LEN {
            return Err(truncated("input likely truncated while reading salt"));
        }
        let salt = input[pos..pos + SALT_LEN].to_vec();
        pos += SALT_LEN;

        if input.len() < pos + IV_LEN {
            return Err(truncated("input likely truncated while reading iv"));
        }
        let iv = input[pos..pos + IV_LEN].to_vec();
        pos += IV_LEN;

        if input.len() < pos + size_of::<i64>() {
            return Err(truncated("input likely truncated while reading sealed key"));
        }
        let mut length_bytes = [0u8; 8];
        length_bytes.copy_from_slice(&input[pos..pos + size_of::<i64>()]);
        let ciphertext_len = i64::from_be_bytes(length_bytes);
        pos += size_of::<i64>();

        if ciphertext_len < 0 {
            return Err(CypherError::with_kind(
                ErrorCategory::User,
                ErrorKind::BinaryFormat,
                "negative sealed key length (when interpreted as a big-endian i64)",
            ));
        }

        // Anything that does not fit the remaining input is rejected before
        // the cast can truncate on small platforms.
        if ciphertext_len as u64 > (input.len() - pos) as u64 {
            return Err(truncated(
                "truncated or corrupt input; claimed length greater than available input",
            ));
        }
        let ciphertext_len = ciphertext_len as usize;

        let ciphertext = input[pos..pos + ciphertext_len].to_vec();
        pos += ciphertext_len;

        if pos < input.len() {
            return Err(CypherError::with_kind(
                ErrorCategory::User,
                ErrorKind::TrailingData,
                "invalid input: unexpected data after sealed key",
            ));
        }

        Ok(Self {
            ciphertext,
            salt,
            iv,
        })
    }

    pub fn to_armored(&self) -> Result<String> {
        Ok(varmor::wrap(ArmorKind::SealedKey, &self.to_bytes()?))
    }

    pub fn from_armored(armored: &str) -> Result<Self> {
        let body = varmor::unwrap(ArmorKind::SealedKey, armored)?;
        Self::from_bytes(&body)
    }
}

fn truncated(msg: &str) -> CypherError {
    CypherError::with_kind(ErrorCategory::User, ErrorKind::TruncatedInput, msg)
}
