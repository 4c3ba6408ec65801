//! Engine tuning parameters
//!
//! None of these are protocol constants: a package or sealed blob produced
//! under one configuration can be opened under another, except that
//! `kdf_iterations` must match between sealing and unsealing.

use std::thread;

use crate::error::{CypherError, ErrorCategory, ErrorKind, Result};

/// RSA modulus size used for new key pairs.
pub const DEFAULT_MODULUS_BITS: usize = 2048;

/// PBKDF2-HMAC-SHA256 iteration count used to seal private keys.
pub const DEFAULT_KDF_ITERATIONS: u32 = 100_000;

/// Upper bound on the default wrap fan-out.
const MAX_DEFAULT_WORKERS: usize = 8;

const MIN_MODULUS_BITS: usize = 1024;
const MAX_MODULUS_BITS: usize = 8192;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub modulus_bits: usize,
    pub kdf_iterations: u32,
    /// Threads used to wrap/unwrap the pad of a single message.
    pub wrap_workers: usize,
}

impl Default for Config {
    fn default() -> Self {
        let wrap_workers = thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
            .min(MAX_DEFAULT_WORKERS);
        Self {
            modulus_bits: DEFAULT_MODULUS_BITS,
            kdf_iterations: DEFAULT_KDF_ITERATIONS,
            wrap_workers,
        }
    }
}

impl Config {
    pub fn with_modulus_bits(mut self, bits: usize) -> Self {
        self.modulus_bits = bits;
        self
    }

    pub fn with_kdf_iterations(mut self, iterations: u32) -> Self {
        self.kdf_iterations = iterations;
        self
    }

    pub fn with_wrap_workers(mut self, workers: usize) -> Self {
        self.wrap_workers = workers;
        self
    }

    /// Reject settings outside the supported range.
    pub fn validate(&self) -> Result<()> {
        if !(MIN_MODULUS_BITS..=MAX_MODULUS_BITS).contains(&self.modulus_bits) {
            return Err(invalid(format!(
                "modulus size {} bits is outside the supported range {}..={}",
                self.modulus_bits, MIN_MODULUS_BITS, MAX_MODULUS_BITS
            )));
        }
        if self.kdf_iterations == 0 {
            return Err(invalid("key derivation needs at least one iteration"));
        }
        if self.wrap_workers == 0 {
            return Err(invalid("at least one wrap worker is required"));
        }
        Ok(())
    }
}

fn invalid(msg: impl Into<String>) -> CypherError {
    CypherError::with_kind(ErrorCategory::User, ErrorKind::InvalidConfig, msg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.modulus_bits, 2048);
        assert_eq!(config.kdf_iterations, 100_000);
        assert!((1..=MAX_DEFAULT_WORKERS).contains(&config.wrap_workers));
    }

    #[test]
    fn test_rejects_out_of_range() {
        let cases = [
            Config::default().with_modulus_bits(512),
            Config::default().with_modulus_bits(16384),
            Config::default().with_kdf_iterations(0),
            Config::default().with_wrap_workers(0),
        ];
        for config in cases {
            let err = config.validate().expect_err("expected invalid config");
            assert_eq!(err.kind, Some(ErrorKind::InvalidConfig));
            assert_eq!(err.category, ErrorCategory::User);
        }
    }
}
