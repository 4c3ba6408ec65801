//! RSA-OAEP wrapping of individual pad values
//!
//! Every pad value is encrypted on its own as a one-byte OAEP (SHA-256,
//! MGF1-SHA-256) message. Wrapped values carry no index: position in the
//! wrapped sequence is the only link to the pad position, so both
//! [`wrap_pad`] and [`unwrap_pad`] return results in input order.
//!
//! Public keys travel as DER SubjectPublicKeyInfo; private keys are
//! exported as DER PKCS#8 for sealing.

use std::fmt;
use std::thread;

use rand::rngs::OsRng;
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey};
use rsa::traits::PublicKeyParts;
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::alphabet::ALPHABET_SIZE;
use crate::config::Config;
use crate::error::{CypherError, ErrorCategory, ErrorKind, Result};
use crate::pad::Pad;
use crate::varmor::{self, ArmorKind};

/// A recipient's public key.
#[derive(Clone, PartialEq, Eq)]
pub struct PublicKey(RsaPublicKey);

/// A private key. Held in memory only; persist it through the vault.
#[derive(Clone)]
pub struct PrivateKey(RsaPrivateKey);

#[derive(Debug)]
pub struct KeyPair {
    pub public: PublicKey,
    pub private: PrivateKey,
}

impl KeyPair {
    /// Generate a fresh RSA key pair of `config.modulus_bits` bits.
    pub fn generate(config: &Config) -> Result<Self> {
        config.validate()?;
        tracing::debug!(bits = config.modulus_bits, "generating key pair");
        let private = RsaPrivateKey::new(&mut OsRng, config.modulus_bits).map_err(|e| {
            CypherError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::KeyGenerationFailed,
                format!("failed to generate {}-bit key pair", config.modulus_bits),
                e,
            )
        })?;
        let private = PrivateKey(private);
        Ok(Self {
            public: private.public_key(),
            private,
        })
    }
}

impl PublicKey {
    /// Modulus size in bits.
    pub fn bits(&self) -> usize {
        self.0.n().bits()
    }

    /// Armored SPKI, as written to public key files.
    pub fn to_armored(&self) -> Result<String> {
        Ok(varmor::wrap(ArmorKind::PublicKey, &export_public_key(self)?))
    }

    pub fn from_armored(armored: &str) -> Result<Self> {
        import_public_key(&varmor::unwrap(ArmorKind::PublicKey, armored)?)
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublicKey")
            .field("bits", &self.bits())
            .finish()
    }
}

impl PrivateKey {
    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.0.to_public_key())
    }

    pub fn bits(&self) -> usize {
        self.0.n().bits()
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKey")
            .field("bits", &self.bits())
            .finish_non_exhaustive()
    }
}

/// Serialize a public key as DER SubjectPublicKeyInfo.
pub fn export_public_key(key: &PublicKey) -> Result<Vec<u8>> {
    let der = key.0.to_public_key_der().map_err(|e| {
        CypherError::with_kind(
            ErrorCategory::Internal,
            ErrorKind::KeyEncodingInvalid,
            format!("failed to encode public key: {}", e),
        )
    })?;
    Ok(der.as_bytes().to_vec())
}

/// Parse a DER SubjectPublicKeyInfo RSA public key.
pub fn import_public_key(der: &[u8]) -> Result<PublicKey> {
    RsaPublicKey::from_public_key_der(der)
        .map(PublicKey)
        .map_err(|e| {
            CypherError::with_kind(
                ErrorCategory::User,
                ErrorKind::KeyEncodingInvalid,
                format!("invalid public key: {}", e),
            )
        })
}

/// Serialize a private key as DER PKCS#8. The returned bytes are wiped on drop.
pub fn export_private_key(key: &PrivateKey) -> Result<Zeroizing<Vec<u8>>> {
    let der = key.0.to_pkcs8_der().map_err(|e| {
        CypherError::with_kind(
            ErrorCategory::Internal,
            ErrorKind::KeyEncodingInvalid,
            format!("failed to encode private key: {}", e),
        )
    })?;
    Ok(Zeroizing::new(der.as_bytes().to_vec()))
}

/// Parse a DER PKCS#8 RSA private key.
pub fn import_private_key(der: &[u8]) -> Result<PrivateKey> {
    // The parser error is not forwarded; it may describe secret material.
    RsaPrivateKey::from_pkcs8_der(der)
        .map(PrivateKey)
        .map_err(|_| {
            CypherError::with_kind(
                ErrorCategory::User,
                ErrorKind::KeyEncodingInvalid,
                "invalid private key",
            )
        })
}

/// Wrap one pad value under the public key.
pub fn wrap_value(value: u8, key: &PublicKey) -> Result<Vec<u8>> {
    if value >= ALPHABET_SIZE {
        return Err(CypherError::with_kind(
            ErrorCategory::Internal,
            ErrorKind::IndexOutOfAlphabet,
            format!("pad value {} is outside the alphabet", value),
        ));
    }
    key.0
        .encrypt(&mut OsRng, Oaep::new::<Sha256>(), &[value])
        .map_err(|e| {
            CypherError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::WrapFailed,
                "failed to wrap pad value",
                e,
            )
        })
}

/// Unwrap one pad value.
///
/// Wrong key, corrupted bytes and a payload that is not a single in-range
/// byte all produce the same error.
pub fn unwrap_value(wrapped: &[u8], key: &PrivateKey) -> Result<u8> {
    let payload = key
        .0
        .decrypt(Oaep::new::<Sha256>(), wrapped)
        .map(Zeroizing::new)
        .map_err(|_| unwrap_failed())?;
    match payload.as_slice() {
        &[value] if value < ALPHABET_SIZE => Ok(value),
        _ => Err(unwrap_failed()),
    }
}

fn unwrap_failed() -> CypherError {
    CypherError::with_kind(
        ErrorCategory::User,
        ErrorKind::KeyDecryptionFailed,
        "failed to unwrap pad: wrong key or corrupted data",
    )
}

/// Wrap every pad value, fanning out over at most `workers` threads.
pub fn wrap_pad(pad: &Pad, key: &PublicKey, workers: usize) -> Result<Vec<Vec<u8>>> {
    ordered_fan_out(pad.as_bytes(), workers, |&value| wrap_value(value, key))
}

/// Unwrap a wrapped pad, fanning out over at most `workers` threads.
pub fn unwrap_pad(wrapped: &[Vec<u8>], key: &PrivateKey, workers: usize) -> Result<Pad> {
    let values = ordered_fan_out(wrapped, workers, |w| unwrap_value(w, key))?;
    Pad::from_values(values)
}

/// Map `f` over `items` using contiguous chunks on scoped threads.
///
/// Output order always equals input order. The first failing chunk (in
/// input order) determines the returned error.
fn ordered_fan_out<T, R, F>(items: &[T], workers: usize, f: F) -> Result<Vec<R>>
where
    T: Sync,
    R: Send,
    F: Fn(&T) -> Result<R> + Sync,
{
    let workers = workers.clamp(1, items.len().max(1));
    if workers == 1 {
        return items.iter().map(&f).collect();
    }

    let chunk_len = items.len().div_ceil(workers);
    let f = &f;
    let chunk_results: Vec<Result<Vec<R>>> = thread::scope(|scope| {
        let handles: Vec<_> = items
            .chunks(chunk_len)
            .map(|chunk| scope.spawn(move || chunk.iter().map(f).collect::<Result<Vec<R>>>()))
            .collect();
        handles
            .into_iter()
            .map(|handle| {
                handle.join().unwrap_or_else(|_| {
                    Err(CypherError::with_kind(
                        ErrorCategory::Internal,
                        ErrorKind::InternalInvariant,
                        "pad worker thread panicked",
                    ))
                })
            })
            .collect()
    });

    let mut out = Vec::with_capacity(items.len());
    for chunk in chunk_results {
        out.extend(chunk?);
    }
    Ok(out)
}
