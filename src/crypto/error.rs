// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Crypto Error Types
//!
//! Error surface for the asymmetric (ECIES) and symmetric (AES-CBC) primitives.
//!
//! ## Error Variants
//!
//! - **DecryptionFailed**: any decrypt failure (bad padding, MAC mismatch, wrong key,
//!   truncated input). The variant deliberately carries no reason so that callers
//!   cannot distinguish which stage failed.
//! - **EncryptionFailed**: encryption could not be performed
//! - **InvalidKey**: malformed key material (wrong size, invalid point, zero scalar)
//! - **InvalidEncoding**: a text field (base64) could not be decoded
//! - **Other**: generic error for library errors or unexpected failures
//!
//! ## Usage Example
//!
//! ```rust
//! use ectsm::crypto::CryptoError;
//!
//! fn decrypt_field(_ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
//!     Err(CryptoError::DecryptionFailed {
//!         operation: "timestamp".to_string(),
//!     })
//! }
//! ```

use std::fmt;

/// Error type for all cryptographic operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Decryption failed
    ///
    /// Covers padding errors, MAC mismatches, truncated ciphertext and wrong
    /// keys alike. Only the operation is recorded.
    DecryptionFailed {
        /// Which operation was being performed (e.g. "ecies_unwrap", "body")
        operation: String,
    },

    /// Encryption failed
    EncryptionFailed {
        /// Which operation was being performed
        operation: String,
        /// Specific failure reason
        reason: String,
    },

    /// Invalid cryptographic key
    ///
    /// This error occurs when:
    /// - Key has wrong length
    /// - Key represents an invalid curve point
    /// - Private scalar is zero or out of range
    InvalidKey {
        /// Type of key that failed (e.g., "server_public_key", "session_key")
        key_type: String,
        /// Specific failure reason
        reason: String,
    },

    /// Text encoding of a field could not be decoded
    InvalidEncoding {
        /// Which field failed decoding
        field: String,
        /// Specific failure reason
        reason: String,
    },

    /// Generic error for library errors or unexpected failures
    Other(String),
}

impl CryptoError {
    /// Shorthand for the stage-free decrypt failure
    pub fn decryption(operation: &str) -> Self {
        CryptoError::DecryptionFailed {
            operation: operation.to_string(),
        }
    }

    pub fn invalid_key(key_type: &str, reason: impl Into<String>) -> Self {
        CryptoError::InvalidKey {
            key_type: key_type.to_string(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for CryptoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CryptoError::DecryptionFailed { operation } => {
                write!(f, "Decryption failed during {}", operation)
            }
            CryptoError::EncryptionFailed { operation, reason } => {
                write!(f, "Encryption failed during {}: {}", operation, reason)
            }
            CryptoError::InvalidKey { key_type, reason } => {
                write!(f, "Invalid key ({}): {}", key_type, reason)
            }
            CryptoError::InvalidEncoding { field, reason } => {
                write!(f, "Invalid encoding for field '{}': {}", field, reason)
            }
            CryptoError::Other(msg) => {
                write!(f, "Crypto error: {}", msg)
            }
        }
    }
}

impl std::error::Error for CryptoError {}

// Conversion from base64 decode errors
impl From<base64::DecodeError> for CryptoError {
    fn from(err: base64::DecodeError) -> Self {
        CryptoError::InvalidEncoding {
            field: "base64_field".to_string(),
            reason: format!("base64 decode error: {}", err),
        }
    }
}

// Conversion from k256 errors (elliptic curve operations)
impl From<k256::elliptic_curve::Error> for CryptoError {
    fn from(err: k256::elliptic_curve::Error) -> Self {
        CryptoError::InvalidKey {
            key_type: "unknown".to_string(),
            reason: format!("k256 error: {}", err),
        }
    }
}
