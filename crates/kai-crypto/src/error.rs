//! Error types for encryption strategies.

use thiserror::Error;

/// Errors that can occur while encrypting or decrypting a value.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// An empty value was handed to the plaintext strategy.
    #[error("value is empty")]
    EmptyValue,

    /// Operator key material has an unsupported size.
    #[error("invalid key length: {len} bytes (expected 16, 24 or 32)")]
    InvalidKeyLength {
        /// Length of the supplied key material.
        len: usize,
    },

    /// Encryption failed.
    #[error("encryption failed: {reason}")]
    EncryptFailed {
        /// Why encryption failed.
        reason: String,
    },

    /// Decryption failed (tampered, truncated or foreign ciphertext).
    #[error("decryption failed: {reason}")]
    DecryptFailed {
        /// Why decryption failed.
        reason: String,
    },

    /// The remote key service could not be reached or refused the call.
    #[error("key service unavailable: {reason}")]
    RemoteUnavailable {
        /// Underlying failure.
        reason: String,
    },

    /// A transit key could not be created.
    #[error("failed to provision key {key}: {reason}")]
    KeyProvisionFailed {
        /// Name of the key.
        key: String,
        /// Underlying failure.
        reason: String,
    },
}

impl From<kai_vault::VaultError> for CryptoError {
    fn from(err: kai_vault::VaultError) -> Self {
        Self::RemoteUnavailable {
            reason: err.to_string(),
        }
    }
}

/// Result type alias for encryption operations.
pub type Result<T> = std::result::Result<T, CryptoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formats_correctly() {
        assert_eq!(CryptoError::EmptyValue.to_string(), "value is empty");
        assert_eq!(
            CryptoError::InvalidKeyLength { len: 7 }.to_string(),
            "invalid key length: 7 bytes (expected 16, 24 or 32)"
        );
        assert_eq!(
            CryptoError::KeyProvisionFailed {
                key: "dev_kaigara_api".to_string(),
                reason: "forbidden".to_string(),
            }
            .to_string(),
            "failed to provision key dev_kaigara_api: forbidden"
        );
    }

    #[test]
    fn vault_errors_map_to_remote_unavailable() {
        let err: CryptoError = kai_vault::VaultError::EmptyToken.into();
        assert!(matches!(err, CryptoError::RemoteUnavailable { .. }));
    }
}
