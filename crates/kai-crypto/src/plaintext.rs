//! Identity strategy.

use async_trait::async_trait;

use crate::error::{CryptoError, Result};
use crate::Encryptor;

/// Passes values through unchanged.
///
/// Empty input is rejected in both directions so that an unset field is never
/// silently "encrypted".
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaintextEncryptor;

impl PlaintextEncryptor {
    /// Creates the identity strategy.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Encryptor for PlaintextEncryptor {
    async fn encrypt(&self, plaintext: &str, _key_id: &str) -> Result<String> {
        if plaintext.is_empty() {
            return Err(CryptoError::EmptyValue);
        }
        Ok(plaintext.to_string())
    }

    async fn decrypt(&self, ciphertext: &str, _key_id: &str) -> Result<String> {
        if ciphertext.is_empty() {
            return Err(CryptoError::EmptyValue);
        }
        Ok(ciphertext.to_string())
    }
}
