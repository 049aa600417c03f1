//! Symmetric strategy using ChaCha20-Poly1305.
//!
//! Ciphertexts are self-describing: the random nonce travels with the
//! encrypted bytes, so decryption needs nothing but the key.
//!
//! Wire format (URL-safe base64, padded): `nonce || ciphertext || tag`.

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE;
use base64::Engine as _;
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Nonce,
};
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{CryptoError, Result};
use crate::Encryptor;

/// Accepted operator key sizes in bytes.
pub const VALID_KEY_LENGTHS: [usize; 3] = [16, 24, 32];

/// Size of the derived AEAD key in bytes.
const KEY_SIZE: usize = 32;

/// Size of the nonce in bytes.
const NONCE_SIZE: usize = 12;

/// Size of the authentication tag in bytes.
const TAG_SIZE: usize = 16;

#[derive(Clone, Zeroize, ZeroizeOnDrop)]
struct DerivedKey {
    bytes: [u8; KEY_SIZE],
}

/// Encrypts values under a single operator-supplied key.
///
/// The AEAD key for each `key_id` is derived from the operator key with
/// BLAKE3, so two apps never share an encryption key even though the operator
/// only manages one secret.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SymmetricEncryptor {
    material: Vec<u8>,
}

impl SymmetricEncryptor {
    /// Creates the strategy from raw key material.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidKeyLength`] unless the key is 16, 24 or 32
    /// bytes long.
    pub fn new(key: &[u8]) -> Result<Self> {
        if !VALID_KEY_LENGTHS.contains(&key.len()) {
            return Err(CryptoError::InvalidKeyLength { len: key.len() });
        }
        Ok(Self {
            material: key.to_vec(),
        })
    }

    fn derive(&self, key_id: &str) -> DerivedKey {
        let context = format!("kaigara symmetric v1 {key_id}");
        DerivedKey {
            bytes: blake3::derive_key(&context, &self.material),
        }
    }

    fn cipher(&self, key_id: &str) -> Result<ChaCha20Poly1305> {
        let key = self.derive(key_id);
        ChaCha20Poly1305::new_from_slice(&key.bytes).map_err(|e| CryptoError::EncryptFailed {
            reason: format!("failed to create cipher: {e}"),
        })
    }

    /// Encrypts raw bytes, returning `nonce || ciphertext || tag`.
    fn seal(&self, plaintext: &[u8], key_id: &str) -> Result<Vec<u8>> {
        let cipher = self.cipher(key_id)?;

        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, plaintext)
            .map_err(|e| CryptoError::EncryptFailed {
                reason: e.to_string(),
            })?;

        let mut output = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        output.extend_from_slice(&nonce_bytes);
        output.extend_from_slice(&ciphertext);
        Ok(output)
    }

    fn open(&self, sealed: &[u8], key_id: &str) -> Result<Vec<u8>> {
        if sealed.len() < NONCE_SIZE + TAG_SIZE {
            return Err(CryptoError::DecryptFailed {
                reason: format!(
                    "ciphertext too short: expected at least {} bytes, got {}",
                    NONCE_SIZE + TAG_SIZE,
                    sealed.len()
                ),
            });
        }

        let cipher = self.cipher(key_id).map_err(|e| CryptoError::DecryptFailed {
            reason: e.to_string(),
        })?;
        let (nonce, encrypted) = sealed.split_at(NONCE_SIZE);

        cipher
            .decrypt(Nonce::from_slice(nonce), encrypted)
            .map_err(|e| CryptoError::DecryptFailed {
                reason: e.to_string(),
            })
    }
}

#[async_trait]
impl Encryptor for SymmetricEncryptor {
    async fn encrypt(&self, plaintext: &str, key_id: &str) -> Result<String> {
        let sealed = self.seal(plaintext.as_bytes(), key_id)?;
        Ok(URL_SAFE.encode(sealed))
    }

    async fn decrypt(&self, ciphertext: &str, key_id: &str) -> Result<String> {
        let sealed = URL_SAFE
            .decode(ciphertext)
            .map_err(|e| CryptoError::DecryptFailed {
                reason: format!("invalid base64: {e}"),
            })?;
        let plaintext = self.open(&sealed, key_id)?;
        String::from_utf8(plaintext).map_err(|e| CryptoError::DecryptFailed {
            reason: format!("plaintext is not utf-8: {e}"),
        })
    }
}

impl std::fmt::Debug for SymmetricEncryptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SymmetricEncryptor")
            .field("key", &"[REDACTED]")
            .finish()
    }
}
