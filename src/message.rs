//! Message packages: encrypt for a recipient, decrypt with a private key
//!
//! Sending: text -> symbol indices -> fresh pad -> ciphertext; each pad
//! value is wrapped under the recipient's public key; the pad keys an HMAC
//! over the ciphertext. Receiving unwraps the pad, checks the tag, and only
//! then decrypts.
//!
//! The binary format of a package is:
//! - count: 4 bytes (big-endian u32)
//! - ciphertext: count bytes, each in [0, 74)
//! - wrapped pad: count entries of length (2 bytes, big-endian u16) + bytes
//! - tag: 32 bytes

use zeroize::Zeroizing;

use crate::alphabet::{self, ALPHABET_SIZE};
use crate::config::Config;
use crate::error::{CypherError, ErrorCategory, ErrorKind, Result};
use crate::integrity::{self, TAG_LEN, Tag};
use crate::keywrap::{self, PrivateKey, PublicKey};
use crate::pad::{self, Pad};
use crate::varmor::{self, ArmorKind};

/// The unit exchanged between sender and receiver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Package {
    pub ciphertext: Vec<u8>,
    /// One wrapped value per ciphertext position, in the same order.
    pub wrapped_pad: Vec<Vec<u8>>,
    pub tag: Tag,
}

/// Encrypt `plaintext` for the holder of `recipient`'s private key.
///
/// Every call draws a new pad; nothing about it outlives the call.
pub fn encrypt_for_recipient(
    plaintext: &str,
    recipient: &PublicKey,
    config: &Config,
) -> Result<Package> {
    config.validate()?;
    let indices = Zeroizing::new(alphabet::encode(plaintext)?);
    let pad = Pad::generate(indices.len());
    let ciphertext = pad::encrypt(&indices, &pad)?;
    let wrapped_pad = keywrap::wrap_pad(&pad, recipient, config.wrap_workers)?;
    let tag = integrity::tag(&pad, &ciphertext)?;

    tracing::debug!(
        symbols = ciphertext.len(),
        workers = config.wrap_workers,
        "encrypted message package"
    );
    Ok(Package {
        ciphertext,
        wrapped_pad,
        tag,
    })
}

/// Decrypt a package with the recipient's private key.
///
/// Fails with `KeyDecryptionFailed` if the pad cannot be unwrapped and with
/// `IntegrityViolation` if the tag does not match; in neither case is any
/// plaintext returned.
pub fn decrypt_package(package: &Package, key: &PrivateKey, config: &Config) -> Result<String> {
    config.validate()?;
    if package.wrapped_pad.len() != package.ciphertext.len() {
        tracing::warn!(
            symbols = package.ciphertext.len(),
            wrapped = package.wrapped_pad.len(),
            "package pad count does not match ciphertext"
        );
        return Err(integrity_violation(
            "wrapped pad length does not match ciphertext length",
        ));
    }

    let pad = keywrap::unwrap_pad(&package.wrapped_pad, key, config.wrap_workers)?;
    if !integrity::verify(&pad, &package.ciphertext, &package.tag)? {
        tracing::warn!(symbols = package.ciphertext.len(), "package tag mismatch");
        return Err(integrity_violation("message integrity check failed"));
    }

    let indices = Zeroizing::new(pad::decrypt(&package.ciphertext, &pad)?);
    let plaintext = alphabet::decode(&indices)?;
    tracing::debug!(symbols = indices.len(), "decrypted message package");
    Ok(plaintext)
}

fn integrity_violation(msg: &str) -> CypherError {
    CypherError::with_kind(ErrorCategory::User, ErrorKind::IntegrityViolation, msg)
}

fn truncated(msg: &str) -> CypherError {
    CypherError::with_kind(ErrorCategory::User, ErrorKind::TruncatedInput, msg)
}

fn format_error(msg: impl Into<String>) -> CypherError {
    CypherError::with_kind(ErrorCategory::User, ErrorKind::BinaryFormat, msg)
}

impl Package {
    /// Binary form: count(4) + ciphertext(count) + count * (len(2) + wrapped) + tag(32)
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        if self.wrapped_pad.len() != self.ciphertext.len() {
            return Err(format_error(
                "wrapped pad length does not match ciphertext length",
            ));
        }
        let count = u32::try_from(self.ciphertext.len())
            .map_err(|_| format_error("message too long to encode"))?;

        let wrapped_total: usize = self.wrapped_pad.iter().map(|w| 2 + w.len()).sum();
        let mut output =
            Vec::with_capacity(4 + self.ciphertext.len() + wrapped_total + TAG_LEN);
        output.extend_from_slice(&count.to_be_bytes());
        output.extend_from_slice(&self.ciphertext);
        for wrapped in &self.wrapped_pad {
            let len = u16::try_from(wrapped.len())
                .map_err(|_| format_error("wrapped pad value too long to encode"))?;
            output.extend_from_slice(&len.to_be_bytes());
            output.extend_from_slice(wrapped);
        }
        output.extend_from_slice(&self.tag);
        Ok(output)
    }

    /// Parse the binary form produced by [`Package::to_bytes`].
    pub fn from_bytes(input: &[u8]) -> Result<Self> {
        let mut pos = 0;

        if input.len() < pos + 4 {
            return Err(truncated("input likely truncated while reading message length"));
        }
        let mut count_bytes = [0u8; 4];
        count_bytes.copy_from_slice(&input[pos..pos + 4]);
        let count = u32::from_be_bytes(count_bytes) as usize;
        pos += 4;

        if input.len() - pos < count {
            return Err(truncated(
                "truncated or corrupt input; claimed length greater than available input",
            ));
        }
        let ciphertext = input[pos..pos + count].to_vec();
        pos += count;
        if let Some(i) = ciphertext.iter().position(|&c| c >= ALPHABET_SIZE) {
            return Err(format_error(format!(
                "ciphertext value {} at position {} is outside the alphabet",
                ciphertext[i], i
            )));
        }

        let mut wrapped_pad = Vec::with_capacity(count);
        for _ in 0..count {
            if input.len() - pos < 2 {
                return Err(truncated("input likely truncated while reading wrapped pad"));
            }
            let len = u16::from_be_bytes([input[pos], input[pos + 1]]) as usize;
            pos += 2;
            if input.len() - pos < len {
                return Err(truncated("input likely truncated while reading wrapped pad"));
            }
            wrapped_pad.push(input[pos..pos + len].to_vec());
            pos += len;
        }

        if input.len() - pos < TAG_LEN {
            return Err(truncated("input likely truncated while reading tag"));
        }
        let mut tag = [0u8; TAG_LEN];
        tag.copy_from_slice(&input[pos..pos + TAG_LEN]);
        pos += TAG_LEN;

        if pos < input.len() {
            return Err(CypherError::with_kind(
                ErrorCategory::User,
                ErrorKind::TrailingData,
                "invalid input: unexpected data after package",
            ));
        }

        Ok(Self {
            ciphertext,
            wrapped_pad,
            tag,
        })
    }

    pub fn to_armored(&self) -> Result<String> {
        Ok(varmor::wrap(ArmorKind::Message, &self.to_bytes()?))
    }

    pub fn from_armored(armored: &str) -> Result<Self> {
        let body = varmor::unwrap(ArmorKind::Message, armored)?;
        Self::from_bytes(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{fixture_private_key, fixture_public_key};
    use proptest::prelude::*;

    fn config() -> Config {
        Config::default().with_wrap_workers(4)
    }

    fn roundtrip(text: &str) -> String {
        let package = encrypt_for_recipient(text, &fixture_public_key(), &config()).unwrap();
        decrypt_package(&package, &fixture_private_key(), &config()).unwrap()
    }

    /// A package built from a known pad, bypassing `encrypt_for_recipient`.
    fn package_with_pad(text: &str, pad_values: Vec<u8>) -> Package {
        let pad = Pad::from_values(pad_values).unwrap();
        let indices = alphabet::encode(text).unwrap();
        let ciphertext = pad::encrypt(&indices, &pad).unwrap();
        Package {
            wrapped_pad: keywrap::wrap_pad(&pad, &fixture_public_key(), 1).unwrap(),
            tag: integrity::tag(&pad, &ciphertext).unwrap(),
            ciphertext,
        }
    }

    #[test]
    fn test_roundtrip() {
        for text in [
            "Hi!",
            "",
            "Hello, world! 123",
            "hello, world! this is secure :)",
            "\"Quoted\" (and; dashed-words) - ok?",
        ] {
            assert_eq!(roundtrip(text), text);
        }
    }

    #[test]
    fn test_package_shape() {
        let package = encrypt_for_recipient("Hi!", &fixture_public_key(), &config()).unwrap();
        assert_eq!(package.ciphertext.len(), 3);
        assert_eq!(package.wrapped_pad.len(), 3);
        assert!(package.wrapped_pad.iter().all(|w| w.len() == 256));
        assert!(package.ciphertext.iter().all(|&c| c < ALPHABET_SIZE));
    }

    #[test]
    fn test_known_pad_package() {
        let package = package_with_pad("Hi!", vec![5, 12, 40]);
        assert_eq!(package.ciphertext, vec![38, 20, 31]);
        assert_eq!(
            decrypt_package(&package, &fixture_private_key(), &config()).unwrap(),
            "Hi!"
        );
    }

    #[test]
    fn test_fresh_pad_per_message() {
        let text = "the same message, twice over";
        let a = encrypt_for_recipient(text, &fixture_public_key(), &config()).unwrap();
        let b = encrypt_for_recipient(text, &fixture_public_key(), &config()).unwrap();
        assert_ne!(a.ciphertext, b.ciphertext);
        assert_ne!(a.tag, b.tag);
    }

    #[test]
    fn test_unsupported_symbol_rejected() {
        let err = encrypt_for_recipient("na\u{ef}ve", &fixture_public_key(), &config())
            .expect_err("expected alphabet error");
        assert_eq!(err.kind, Some(ErrorKind::SymbolOutOfAlphabet));
    }

    #[test]
    fn test_ciphertext_tampering_detected() {
        let package = encrypt_for_recipient("tamper", &fixture_public_key(), &config()).unwrap();
        let key = fixture_private_key();
        for i in 0..package.ciphertext.len() {
            let mut tampered = package.clone();
            tampered.ciphertext[i] = (tampered.ciphertext[i] + 1) % ALPHABET_SIZE;
            let err = decrypt_package(&tampered, &key, &config()).expect_err("expected failure");
            assert!(err.is_integrity_violation(), "position {}", i);
        }
    }

    #[test]
    fn test_tag_tampering_detected() {
        let package = encrypt_for_recipient("tag", &fixture_public_key(), &config()).unwrap();
        let key = fixture_private_key();
        for i in 0..TAG_LEN {
            let mut tampered = package.clone();
            tampered.tag[i] ^= 0x01;
            let err = decrypt_package(&tampered, &key, &config()).expect_err("expected failure");
            assert!(err.is_integrity_violation(), "tag byte {}", i);
        }
    }

    #[test]
    fn test_reordered_pad_detected() {
        let mut package = package_with_pad("Hi!", vec![5, 12, 40]);
        package.wrapped_pad.swap(0, 1);
        let err = decrypt_package(&package, &fixture_private_key(), &config())
            .expect_err("expected failure");
        assert!(err.is_integrity_violation());
    }

    #[test]
    fn test_missing_pad_element_detected() {
        let mut package = package_with_pad("Hi!", vec![5, 12, 40]);
        package.wrapped_pad.pop();
        let err = decrypt_package(&package, &fixture_private_key(), &config())
            .expect_err("expected failure");
        assert!(err.is_integrity_violation());
    }

    #[test]
    fn test_wrong_key_is_a_key_error() {
        let other = keywrap::KeyPair::generate(&Config::default().with_modulus_bits(1024)).unwrap();
        let package = encrypt_for_recipient("secret", &other.public, &config()).unwrap();
        let err = decrypt_package(&package, &fixture_private_key(), &config())
            .expect_err("expected failure");
        assert_eq!(err.kind, Some(ErrorKind::KeyDecryptionFailed));
    }

    #[test]
    fn test_binary_roundtrip() {
        let package = encrypt_for_recipient("Hi!", &fixture_public_key(), &config()).unwrap();
        let bytes = package.to_bytes().unwrap();
        assert_eq!(bytes.len(), 4 + 3 + 3 * (2 + 256) + TAG_LEN);
        assert_eq!(Package::from_bytes(&bytes).unwrap(), package);

        let armored = package.to_armored().unwrap();
        assert!(armored.starts_with("cypherpad-msg1:"));
        assert_eq!(Package::from_armored(&armored).unwrap(), package);
    }

    #[test]
    fn test_empty_package_encoding() {
        let package = encrypt_for_recipient("", &fixture_public_key(), &config()).unwrap();
        let bytes = package.to_bytes().unwrap();
        assert_eq!(bytes.len(), 4 + TAG_LEN);
        assert_eq!(Package::from_bytes(&bytes).unwrap(), package);
    }

    #[test]
    fn test_truncated_inputs() {
        let bytes = package_with_pad("Hi!", vec![5, 12, 40]).to_bytes().unwrap();
        for len in [0, 3, 4, 6, 7, 8, 100, bytes.len() - TAG_LEN, bytes.len() - 1] {
            let err = Package::from_bytes(&bytes[..len]).expect_err("expected failure");
            assert_eq!(err.kind, Some(ErrorKind::TruncatedInput), "length {}", len);
        }
    }

    #[test]
    fn test_huge_count_rejected() {
        let mut bytes = u32::MAX.to_be_bytes().to_vec();
        bytes.extend_from_slice(&[0u8; 40]);
        let err = Package::from_bytes(&bytes).expect_err("expected failure");
        assert_eq!(err.kind, Some(ErrorKind::TruncatedInput));
    }

    #[test]
    fn test_trailing_data() {
        let mut bytes = package_with_pad("Hi!", vec![5, 12, 40]).to_bytes().unwrap();
        bytes.push(0);
        let err = Package::from_bytes(&bytes).expect_err("expected failure");
        assert_eq!(err.kind, Some(ErrorKind::TrailingData));
    }

    #[test]
    fn test_out_of_range_ciphertext_rejected() {
        let mut bytes = package_with_pad("Hi!", vec![5, 12, 40]).to_bytes().unwrap();
        bytes[5] = 74;
        let err = Package::from_bytes(&bytes).expect_err("expected failure");
        assert_eq!(err.kind, Some(ErrorKind::BinaryFormat));
    }

    #[test]
    fn test_mismatched_package_not_encodable() {
        let mut package = package_with_pad("Hi!", vec![5, 12, 40]);
        package.wrapped_pad.pop();
        let err = package.to_bytes().expect_err("expected failure");
        assert_eq!(err.kind, Some(ErrorKind::BinaryFormat));
    }

    #[test]
    fn test_concurrent_calls_share_keys() {
        let public = fixture_public_key();
        let private = fixture_private_key();
        let config = Config::default().with_wrap_workers(2);
        let texts: Vec<String> = (0..4).map(|i| format!("Message {} (thread)!", i)).collect();

        let results: Vec<String> = std::thread::scope(|scope| {
            let handles: Vec<_> = texts
                .iter()
                .map(|text| {
                    let (public, private, config) = (&public, &private, &config);
                    scope.spawn(move || {
                        let package = encrypt_for_recipient(text, public, config).unwrap();
                        decrypt_package(&package, private, config).unwrap()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(results, texts);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn test_any_alphabet_text_roundtrips(indices in proptest::collection::vec(0u8..ALPHABET_SIZE, 0..24)) {
            let text: String = indices.iter().map(|&i| alphabet::SYMBOLS[i as usize]).collect();
            prop_assert_eq!(roundtrip(&text), text);
        }
    }
}
