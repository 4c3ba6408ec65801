//! Cypherpad - one-time-pad message encryption with RSA-OAEP pad wrapping
//!
//! A message over a 74-symbol alphabet is blinded with a fresh random pad.
//! Each pad value is wrapped under the recipient's RSA public key, and the
//! pad keys an HMAC-SHA256 tag over the ciphertext. Private keys are kept at
//! rest sealed under a password (PBKDF2-HMAC-SHA256 + AES-256-GCM).

#![forbid(unsafe_code)]

pub mod alphabet;
pub mod config;
pub mod error;
pub mod file_ops;
pub mod integrity;
pub mod keywrap;
pub mod message;
pub mod pad;
pub mod password;
pub mod varmor;
pub mod vault;

#[cfg(test)]
mod test_support;

pub use config::Config;
pub use error::{CypherError, ErrorCategory, ErrorKind, Result};
pub use keywrap::{KeyPair, PrivateKey, PublicKey};
pub use message::{Package, decrypt_package, encrypt_for_recipient};
pub use vault::{SealedBlob, seal_private_key, unseal_private_key};
