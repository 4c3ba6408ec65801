//! Golden test vector validation
//!
//! The vectors in testdata/golden-vectors.json were produced by an
//! independent implementation; every check here is cross-implementation.

use base64::{Engine, engine::general_purpose::STANDARD as BASE64_STANDARD};
use serde::Deserialize;

use cypherpad::config::Config;
use cypherpad::keywrap::{self, PrivateKey};
use cypherpad::message::{self, Package};
use cypherpad::pad::{self, Pad};
use cypherpad::vault::{self, IV_LEN, SALT_LEN, SealedBlob};
use cypherpad::{alphabet, integrity};

#[derive(Debug, Deserialize)]
struct GoldenVectors {
    pad_cipher: Vec<PadCipherVector>,
    vault: Vec<VaultVector>,
    packages: Vec<PackageVector>,
}

#[derive(Debug, Deserialize)]
struct PadCipherVector {
    plaintext: String,
    indices: Vec<u8>,
    pad: Vec<u8>,
    ciphertext: Vec<u8>,
    tag: String,
}

#[derive(Debug, Deserialize)]
struct VaultVector {
    export: String,
    password: String,
    salt: String,
    iv: String,
    iterations: u32,
    sealed: String,
    comment: String,
}

#[derive(Debug, Deserialize)]
struct PackageVector {
    plaintext: String,
    package: String,
    comment: String,
}

fn load_golden_vectors() -> GoldenVectors {
    let json_data = include_str!("../testdata/golden-vectors.json");
    serde_json::from_str(json_data).expect("failed to parse golden vectors")
}

fn fixture_private_key() -> PrivateKey {
    let der = BASE64_STANDARD
        .decode(include_str!("../testdata/fixture-private-key.pk8.b64").trim())
        .expect("failed to decode fixture key");
    keywrap::import_private_key(&der).expect("failed to import fixture key")
}

fn decode(field: &str, value: &str) -> Vec<u8> {
    BASE64_STANDARD
        .decode(value)
        .unwrap_or_else(|e| panic!("failed to decode {}: {}", field, e))
}

#[test]
fn test_pad_cipher_vectors() {
    let vectors = load_golden_vectors().pad_cipher;
    println!("Testing {} pad cipher vectors", vectors.len());

    for (i, vector) in vectors.iter().enumerate() {
        let indices = alphabet::encode(&vector.plaintext).unwrap();
        assert_eq!(indices, vector.indices, "vector {}: indices", i);

        let pad = Pad::from_values(vector.pad.clone()).unwrap();
        let ciphertext = pad::encrypt(&indices, &pad).unwrap();
        assert_eq!(ciphertext, vector.ciphertext, "vector {}: ciphertext", i);

        let tag = integrity::tag(&pad, &ciphertext).unwrap();
        assert_eq!(hex::encode(tag), vector.tag, "vector {}: tag", i);

        let decrypted = pad::decrypt(&ciphertext, &pad).unwrap();
        assert_eq!(
            alphabet::decode(&decrypted).unwrap(),
            vector.plaintext,
            "vector {}: decrypt",
            i
        );
    }
}

#[test]
fn test_vault_vectors() {
    let vectors = load_golden_vectors().vault;
    println!("Testing {} vault vectors", vectors.len());

    let mut passed = 0;
    for (i, vector) in vectors.iter().enumerate() {
        let export = decode("export", &vector.export);
        let password = decode("password", &vector.password);
        let salt: [u8; SALT_LEN] = decode("salt", &vector.salt)
            .try_into()
            .unwrap_or_else(|_| panic!("vector {}: salt must be {} bytes", i, SALT_LEN));
        let iv: [u8; IV_LEN] = decode("iv", &vector.iv)
            .try_into()
            .unwrap_or_else(|_| panic!("vector {}: iv must be {} bytes", i, IV_LEN));

        let sealed =
            vault::seal_deterministic(&export, &password, &salt, &iv, vector.iterations).unwrap();
        assert_eq!(
            sealed.to_armored().unwrap(),
            vector.sealed,
            "vector {} ({}): sealed output mismatch",
            i,
            vector.comment
        );

        let config = Config::default().with_kdf_iterations(vector.iterations);
        let blob = SealedBlob::from_armored(&vector.sealed).unwrap();
        let unsealed = vault::unseal(&blob, &password, &config).unwrap();
        assert_eq!(*unsealed, export, "vector {} ({}): unseal", i, vector.comment);
        passed += 1;
    }
    println!("Results: {} passed", passed);
}

#[test]
fn test_vault_fixture_key() {
    let vector = &load_golden_vectors().vault[0];
    let config = Config::default().with_kdf_iterations(vector.iterations);
    let blob = SealedBlob::from_armored(&vector.sealed).unwrap();
    let password = decode("password", &vector.password);

    let key = vault::unseal_private_key(&blob, &password, &config).unwrap();
    assert_eq!(key.public_key(), fixture_private_key().public_key());

    let err = vault::unseal_private_key(&blob, b"Correct horse", &config)
        .expect_err("expected wrong password to fail");
    assert_eq!(err.kind, Some(cypherpad::ErrorKind::UnsealFailed));
}

#[test]
fn test_package_vectors() {
    let vectors = load_golden_vectors().packages;
    println!("Testing {} package vectors", vectors.len());

    let key = fixture_private_key();
    let config = Config::default();
    for (i, vector) in vectors.iter().enumerate() {
        let package = Package::from_armored(&vector.package).unwrap();
        assert_eq!(
            package.ciphertext.len(),
            vector.plaintext.chars().count(),
            "vector {}: length",
            i
        );
        let plaintext = message::decrypt_package(&package, &key, &config).unwrap();
        assert_eq!(
            plaintext, vector.plaintext,
            "vector {} ({}): plaintext",
            i, vector.comment
        );
        assert_eq!(
            package.to_armored().unwrap(),
            vector.package,
            "vector {}: re-encoding",
            i
        );
    }
}

#[test]
fn test_package_vectors_detect_tampering() {
    let vector = &load_golden_vectors().packages[0];
    let key = fixture_private_key();
    let mut package = Package::from_armored(&vector.package).unwrap();
    package.tag[0] ^= 0xff;

    let err = message::decrypt_package(&package, &key, &Config::default())
        .expect_err("expected integrity failure");
    assert!(err.is_integrity_violation());
}
