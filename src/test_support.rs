//! Shared fixtures for unit tests

use base64::{Engine, engine::general_purpose::STANDARD};

use crate::config::Config;
use crate::keywrap::{self, PrivateKey, PublicKey};

/// The 2048-bit key the golden vectors were generated with.
pub fn fixture_private_key() -> PrivateKey {
    let der = STANDARD
        .decode(include_str!("../testdata/fixture-private-key.pk8.b64").trim())
        .unwrap();
    keywrap::import_private_key(&der).unwrap()
}

pub fn fixture_public_key() -> PublicKey {
    let der = STANDARD
        .decode(include_str!("../testdata/fixture-public-key.spki.b64").trim())
        .unwrap();
    keywrap::import_public_key(&der).unwrap()
}

/// Default config with a cheap KDF.
pub fn fast_config() -> Config {
    Config::default().with_kdf_iterations(1000)
}
