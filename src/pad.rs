//! One-time pad over the symbol alphabet
//!
//! `ciphertext[i] = (index[i] + pad[i]) mod 74` and the inverse. A pad must
//! come from [`Pad::generate`] and be used for exactly one message; nothing
//! here caches or reuses pads.

use rand::Rng;
use rand::rngs::OsRng;
use zeroize::Zeroizing;

use crate::alphabet::ALPHABET_SIZE;
use crate::error::{CypherError, ErrorCategory, ErrorKind, Result};

/// A single-use sequence of values in `[0, 74)`.
///
/// The backing memory is wiped when the pad is dropped.
pub struct Pad {
    values: Zeroizing<Vec<u8>>,
}

impl Pad {
    /// Draw `len` independent, uniform values from the OS entropy source.
    pub fn generate(len: usize) -> Self {
        let mut values = Zeroizing::new(Vec::with_capacity(len));
        for _ in 0..len {
            values.push(OsRng.gen_range(0..ALPHABET_SIZE));
        }
        Self { values }
    }

    /// Rebuild a pad from raw values, e.g. after unwrapping.
    ///
    /// Every value must lie in `[0, 74)`.
    pub fn from_values(values: Vec<u8>) -> Result<Self> {
        let values = Zeroizing::new(values);
        if let Some(pos) = values.iter().position(|&v| v >= ALPHABET_SIZE) {
            return Err(CypherError::with_kind(
                ErrorCategory::User,
                ErrorKind::IndexOutOfAlphabet,
                format!(
                    "pad value {} at position {} is outside the alphabet",
                    values[pos], pos
                ),
            ));
        }
        Ok(Self { values })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// One byte per pad value; this is also the integrity key.
    pub fn as_bytes(&self) -> &[u8] {
        &self.values
    }
}

impl std::fmt::Debug for Pad {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pad").field("len", &self.len()).finish()
    }
}

fn check_lengths(what: &str, data_len: usize, pad: &Pad) -> Result<()> {
    if data_len != pad.len() {
        return Err(CypherError::with_kind(
            ErrorCategory::Internal,
            ErrorKind::LengthMismatch,
            format!(
                "{} length {} does not match pad length {}",
                what,
                data_len,
                pad.len()
            ),
        ));
    }
    Ok(())
}

fn check_range(what: &str, data: &[u8]) -> Result<()> {
    if let Some(pos) = data.iter().position(|&v| v >= ALPHABET_SIZE) {
        return Err(CypherError::with_kind(
            ErrorCategory::User,
            ErrorKind::IndexOutOfAlphabet,
            format!(
                "{} value {} at position {} is outside the alphabet",
                what, data[pos], pos
            ),
        ));
    }
    Ok(())
}

/// Add the pad to the symbol indices, mod 74.
pub fn encrypt(indices: &[u8], pad: &Pad) -> Result<Vec<u8>> {
    check_lengths("plaintext", indices.len(), pad)?;
    check_range("plaintext", indices)?;
    Ok(indices
        .iter()
        .zip(pad.as_bytes())
        .map(|(&m, &k)| (m + k) % ALPHABET_SIZE)
        .collect())
}

/// Subtract the pad from the ciphertext, mod 74.
pub fn decrypt(ciphertext: &[u8], pad: &Pad) -> Result<Vec<u8>> {
    check_lengths("ciphertext", ciphertext.len(), pad)?;
    check_range("ciphertext", ciphertext)?;
    Ok(ciphertext
        .iter()
        .zip(pad.as_bytes())
        .map(|(&c, &k)| (c + ALPHABET_SIZE - k) % ALPHABET_SIZE)
        .collect())
}
