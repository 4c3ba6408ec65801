use std::error::Error as StdError;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorCategory {
    /// Any failure that cannot be confidently attributed to any other error
    /// category in this enum.
    ///
    /// Use of Internal is never a guarantee that the error is not, for
    /// example, caused by corrupted input - merely that it cannot be
    /// confidently determined by the code.
    Internal,

    /// The caller provided invalid input (text, keys, packages, passwords)
    /// or requested an operation that cannot be completed.
    User,
}

/// Fine-grained condition flags for consumers that want to branch on error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// Plaintext indices and pad (or ciphertext and pad) differ in length.
    LengthMismatch,
    /// Text to encode contains a character outside the 74-symbol alphabet.
    SymbolOutOfAlphabet,
    /// A symbol index or pad value lies outside `[0, 74)`.
    IndexOutOfAlphabet,
    /// A wrapped pad value could not be unwrapped. Deliberately does not
    /// say whether the key was wrong or the bytes were corrupted.
    KeyDecryptionFailed,
    /// The package tag does not match the unwrapped pad and ciphertext.
    IntegrityViolation,
    /// A sealed key blob could not be opened. Wrong password, tampering and
    /// corruption all collapse into this one kind.
    UnsealFailed,
    /// Encrypting the private key export under the derived key failed.
    SealFailed,
    /// RSA key pair generation failed.
    KeyGenerationFailed,
    /// A pad value could not be wrapped under the recipient's public key.
    WrapFailed,
    /// Public or private key bytes are not a valid DER key of the expected type.
    KeyEncodingInvalid,
    /// PBKDF2 key derivation could not produce a key.
    KeyDerivationFailed,
    /// The armored representation is malformed (prefix or unsupported kind).
    ArmoringInvalid,
    /// Base64 decoding of the armored payload failed.
    ArmoringDecode,
    /// Input claimed to be cypherpad data but used a future/unsupported version.
    ArmoringFromFuture,
    /// Length fields or binary layout are invalid.
    BinaryFormat,
    /// Input data ended before the expected component could be read.
    TruncatedInput,
    /// Additional bytes were present after the encoded object.
    TrailingData,
    /// Password could not be obtained from the configured reader.
    PasswordUnavailable,
    /// Engine configuration is out of the supported range.
    InvalidConfig,
    /// Unexpected state reached within cypherpad logic.
    InternalInvariant,
    /// Interaction with the filesystem, stdin/stdout, or other I/O failed.
    Io,
}

#[derive(Debug, Error)]
#[error("{msg}")]
pub struct CypherError {
    /// Broad error category, always provided.
    pub category: ErrorCategory,
    /// Optional specific condition tag for consumers that need to
    /// branch their behavior. Any code consuming errors MUST handle
    /// the absence of a defined kind.
    pub kind: Option<ErrorKind>,
    #[source]
    source: Option<Box<dyn StdError + Send + Sync + 'static>>,
    msg: String,
}

impl CypherError {
    /// Creates a new error that also tags the failure with a kind.
    pub fn with_kind(category: ErrorCategory, kind: ErrorKind, msg: impl Into<String>) -> Self {
        Self {
            category,
            kind: Some(kind),
            source: None,
            msg: msg.into(),
        }
    }

    /// Creates a new error that carries both a kind tag and the originating source error.
    pub fn with_kind_and_source(
        category: ErrorCategory,
        kind: ErrorKind,
        msg: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self {
            category,
            kind: Some(kind),
            source: Some(Box::new(source)),
            msg: msg.into(),
        }
    }

    /// The user-facing message carried by the error.
    pub fn message(&self) -> &str {
        &self.msg
    }

    /// Returns the preserved source error if present.
    pub fn source_error(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        self.source.as_deref()
    }

    /// Wraps the current error with a higher-level message while preserving
    /// the original as source. Category and kind carry over so callers can
    /// still branch on, say, an integrity violation after context is added.
    pub fn with_context(self, msg: impl Into<String>) -> Self {
        let category = self.category;
        let kind = self.kind;
        Self {
            category,
            kind,
            source: Some(Box::new(self)),
            msg: msg.into(),
        }
    }

    /// True if this error (after any added context) is a tag mismatch.
    pub fn is_integrity_violation(&self) -> bool {
        self.kind == Some(ErrorKind::IntegrityViolation)
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, CypherError>;
