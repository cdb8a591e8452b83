// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Key Material
//!
//! The server's long-lived secp256k1 key pair and the per-client 16-byte
//! session key.
//!
//! ## Text Formats
//!
//! - Private key: base64 of the 32-byte big-endian scalar
//! - Public key: base64 of the 65-byte uncompressed SEC1 point (`0x04 || X || Y`)
//!
//! ## Security Considerations
//!
//! - Session keys and private keys are NEVER logged; their `Debug` output is redacted
//! - Configuration reads the private key from `ECTSM_PRIVATE_KEY`

use super::CryptoError;
use base64::{engine::general_purpose::STANDARD, Engine};
use k256::{elliptic_curve::sec1::ToEncodedPoint, PublicKey, SecretKey};
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use std::fmt;

/// Session key length in bytes (AES-128)
pub const SESSION_KEY_SIZE: usize = 16;

/// secp256k1 private scalar size in bytes
pub const PRIVATE_KEY_SIZE: usize = 32;

/// secp256k1 uncompressed public key size in bytes (04 prefix + x + y coordinates)
pub const PUBLIC_KEY_SIZE: usize = 65;

/// Environment variable holding the server's base64 private key
pub const PRIVATE_KEY_ENV: &str = "ECTSM_PRIVATE_KEY";

/// Symmetric key securing one client's traffic
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct SessionKey([u8; SESSION_KEY_SIZE]);

impl SessionKey {
    /// Generate a fresh random session key from the OS CSPRNG
    pub fn generate() -> Self {
        let mut key = [0u8; SESSION_KEY_SIZE];
        OsRng.fill_bytes(&mut key);
        Self(key)
    }

    pub fn from_bytes(bytes: [u8; SESSION_KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Build a session key from an unwrapped byte slice
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        let key: [u8; SESSION_KEY_SIZE] = bytes.try_into().map_err(|_| {
            CryptoError::invalid_key(
                "session_key",
                format!(
                    "expected {} bytes, got {}",
                    SESSION_KEY_SIZE,
                    bytes.len()
                ),
            )
        })?;
        Ok(Self(key))
    }

    pub fn as_bytes(&self) -> &[u8; SESSION_KEY_SIZE] {
        &self.0
    }
}

impl fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionKey([REDACTED])")
    }
}

/// Server key pair on secp256k1
#[derive(Clone)]
pub struct KeyPair {
    secret: SecretKey,
    public: PublicKey,
}

impl KeyPair {
    /// Generate a new random key pair
    pub fn generate() -> Self {
        let secret = SecretKey::random(&mut OsRng);
        let public = secret.public_key();
        Self { secret, public }
    }

    /// Build a key pair from a raw 32-byte private scalar
    ///
    /// Rejects scalars of the wrong length, zero, or outside the curve order.
    pub fn from_private_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() != PRIVATE_KEY_SIZE {
            return Err(CryptoError::invalid_key(
                "server_private_key",
                format!(
                    "expected {} bytes, got {}",
                    PRIVATE_KEY_SIZE,
                    bytes.len()
                ),
            ));
        }
        let secret = SecretKey::from_slice(bytes).map_err(|_| {
            CryptoError::invalid_key("server_private_key", "scalar is zero or out of range")
        })?;
        let public = secret.public_key();
        Ok(Self { secret, public })
    }

    /// Parse a base64 encoded private key
    pub fn from_private_base64(encoded: &str) -> Result<Self, CryptoError> {
        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|e| CryptoError::InvalidEncoding {
                field: "server_private_key".to_string(),
                reason: format!("base64 decode error: {}", e),
            })?;
        Self::from_private_bytes(&bytes)
    }

    pub fn secret(&self) -> &SecretKey {
        &self.secret
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }

    /// Base64 of the 32-byte private scalar
    pub fn private_key_base64(&self) -> String {
        STANDARD.encode(self.secret.to_bytes())
    }

    /// Base64 of the 65-byte uncompressed public point
    pub fn public_key_base64(&self) -> String {
        public_key_to_base64(&self.public)
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public", &self.public_key_base64())
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

pub fn public_key_to_base64(public: &PublicKey) -> String {
    STANDARD.encode(public.to_encoded_point(false).as_bytes())
}

/// Parse a base64 encoded SEC1 public key (compressed or uncompressed)
pub fn public_key_from_base64(encoded: &str) -> Result<PublicKey, CryptoError> {
    if encoded.trim().is_empty() {
        return Err(CryptoError::invalid_key("server_public_key", "empty input"));
    }
    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|e| CryptoError::InvalidEncoding {
            field: "server_public_key".to_string(),
            reason: format!("base64 decode error: {}", e),
        })?;
    PublicKey::from_sec1_bytes(&bytes)
        .map_err(|_| CryptoError::invalid_key("server_public_key", "invalid curve point"))
}

/// Short, non-reversible identifier for a wrapped key, safe for logs
pub fn fingerprint(wrapped_key: &str) -> String {
    let digest = Sha256::digest(wrapped_key.as_bytes());
    hex::encode(&digest[..6])
}
