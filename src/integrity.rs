//! HMAC-SHA256 tag over a package
//!
//! The key is the pad (one byte per value, before wrapping) and the message
//! is the ciphertext (one byte per value). A receiver only ever gets the key
//! by unwrapping; a pad supplied from anywhere else proves nothing.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::{CypherError, ErrorCategory, ErrorKind, Result};
use crate::pad::Pad;

type HmacSha256 = Hmac<Sha256>;

/// Tag length in bytes.
pub const TAG_LEN: usize = 32;

pub type Tag = [u8; TAG_LEN];

fn keyed(pad: &Pad, ciphertext: &[u8]) -> Result<HmacSha256> {
    // HMAC accepts keys of any length, including the empty pad of an
    // empty message.
    let mut mac = HmacSha256::new_from_slice(pad.as_bytes()).map_err(|_| {
        CypherError::with_kind(
            ErrorCategory::Internal,
            ErrorKind::InternalInvariant,
            "HMAC rejected the pad as key",
        )
    })?;
    mac.update(ciphertext);
    Ok(mac)
}

/// Compute the tag for a pad and ciphertext.
pub fn tag(pad: &Pad, ciphertext: &[u8]) -> Result<Tag> {
    let digest = keyed(pad, ciphertext)?.finalize().into_bytes();
    let mut out = [0u8; TAG_LEN];
    out.copy_from_slice(&digest);
    Ok(out)
}

/// Constant-time check of `candidate` against the recomputed tag.
///
/// A candidate of the wrong length simply does not verify.
pub fn verify(pad: &Pad, ciphertext: &[u8], candidate: &[u8]) -> Result<bool> {
    Ok(keyed(pad, ciphertext)?.verify_slice(candidate).is_ok())
}
