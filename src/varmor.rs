//! Versioned armoring for binary data
//!
//! Provides base64url encoding with a kind-and-version prefix for packages,
//! sealed keys and public keys. The armored format is:
//! - Free of whitespace (including newlines)
//! - Safe to embed in URLs and JSON strings
//! - Safe to pass unescaped in a POSIX shell

use crate::error::{CypherError, ErrorCategory, ErrorKind, Result};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};

/// Prefix shared by every armored cypherpad object.
const MAGIC_PREFIX: &str = "cypherpad-";

/// Current (and only) armor version.
const VERSION_MARKER: &str = "1:";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArmorKind {
    /// An encrypted message package.
    Message,
    /// A password-sealed private key.
    SealedKey,
    /// A DER public key.
    PublicKey,
}

impl ArmorKind {
    fn label(self) -> &'static str {
        match self {
            ArmorKind::Message => "cypherpad-msg",
            ArmorKind::SealedKey => "cypherpad-key",
            ArmorKind::PublicKey => "cypherpad-pub",
        }
    }

    fn describe(self) -> &'static str {
        match self {
            ArmorKind::Message => "message package",
            ArmorKind::SealedKey => "sealed private key",
            ArmorKind::PublicKey => "public key",
        }
    }
}

/// Wrap bytes in armor, returning the armored string
///
/// Format: {label}1:{base64url-no-padding}
pub fn wrap(kind: ArmorKind, body: &[u8]) -> String {
    let encoded = URL_SAFE_NO_PAD.encode(body);
    format!("{}{}{}", kind.label(), VERSION_MARKER, encoded)
}

/// Unwrap an armored string of the given kind, returning the original bytes
pub fn unwrap(kind: ArmorKind, armored: &str) -> Result<Vec<u8>> {
    let label = kind.label();
    if armored.len() < label.len() + VERSION_MARKER.len() {
        return Err(CypherError::with_kind(
            ErrorCategory::User,
            ErrorKind::ArmoringInvalid,
            "input size smaller than magic marker; likely truncated",
        ));
    }

    if let Some(encoded) = armored
        .strip_prefix(label)
        .and_then(|rest| rest.strip_prefix(VERSION_MARKER))
    {
        let body = URL_SAFE_NO_PAD.decode(encoded).map_err(|e| {
            CypherError::with_kind_and_source(
                ErrorCategory::User,
                ErrorKind::ArmoringDecode,
                format!("base64 decoding failed: {}", e),
                e,
            )
        })?;
        Ok(body)
    } else if armored.starts_with(label) {
        Err(CypherError::with_kind(
            ErrorCategory::User,
            ErrorKind::ArmoringFromFuture,
            format!(
                "input claims to be a cypherpad {}, but not a version we support",
                kind.describe()
            ),
        ))
    } else if armored.starts_with(MAGIC_PREFIX) {
        Err(CypherError::with_kind(
            ErrorCategory::User,
            ErrorKind::ArmoringInvalid,
            format!("input is cypherpad data, but not a {}", kind.describe()),
        ))
    } else {
        Err(CypherError::with_kind(
            ErrorCategory::User,
            ErrorKind::ArmoringInvalid,
            "input unrecognized as cypherpad data",
        ))
    }
}
