//! # kai-crypto
//!
//! Encryption strategies applied to `secret`-scope values before they reach a
//! storage backend.
//!
//! Every strategy implements [`Encryptor`] and is bound to a store once, at
//! construction time:
//!
//! - [`PlaintextEncryptor`]: identity transform, rejects empty values
//! - [`SymmetricEncryptor`]: ChaCha20-Poly1305 under one operator key, with a
//!   per-`key_id` key derived through BLAKE3
//! - [`TransitEncryptor`]: delegates to Vault's transit engine, one named key
//!   per `key_id`
//!
//! ## Example
//!
//! ```rust
//! use kai_crypto::{Encryptor, SymmetricEncryptor};
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let enc = SymmetricEncryptor::new(b"0123456789abcdef0123456789abcdef").unwrap();
//! let ct = enc.encrypt("hunter2", "dev_kaigara_api").await.unwrap();
//! assert_eq!(enc.decrypt(&ct, "dev_kaigara_api").await.unwrap(), "hunter2");
//! # });
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod plaintext;
pub mod symmetric;
pub mod transit;

use async_trait::async_trait;

pub use error::{CryptoError, Result};
pub use plaintext::PlaintextEncryptor;
pub use symmetric::{SymmetricEncryptor, VALID_KEY_LENGTHS};
pub use transit::{RenewalHandle, TransitEncryptor};

/// A value-level encryption strategy.
///
/// `key_id` names the logical key a value belongs to. Strategies that keep a
/// single key may use it for derivation; remote strategies map it to a named
/// key.
#[async_trait]
pub trait Encryptor: Send + Sync {
    /// Encrypts `plaintext` under `key_id`.
    async fn encrypt(&self, plaintext: &str, key_id: &str) -> Result<String>;

    /// Decrypts `ciphertext` produced by [`Encryptor::encrypt`] under the same `key_id`.
    async fn decrypt(&self, ciphertext: &str, key_id: &str) -> Result<String>;
}

/// Builds the key id used for an application's secrets.
#[must_use]
pub fn key_id(deployment_id: &str, app_name: &str) -> String {
    format!("{deployment_id}_kaigara_{app_name}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_id_joins_deployment_and_app() {
        assert_eq!(key_id("opendax", "peatio"), "opendax_kaigara_peatio");
    }
}
