// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! AES-128-CBC Header and Body Encryption
//!
//! Symmetric primitive used for every ECT header field and body once a
//! session key is established.
//!
//! **Formats**:
//! ```text
//! IvMode::KeyDerived:   [ciphertext]              iv = key[..16]
//! IvMode::RandomPrefix: [iv (16 bytes) | ciphertext]
//! ```
//!
//! `KeyDerived` is the wire-compatible default. Identical (key, plaintext)
//! pairs produce identical ciphertext in that mode; every field this crate
//! encrypts carries a fresh timestamp or request-specific content.

use super::keys::SessionKey;
use super::CryptoError;
use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};

type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;
type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;

/// AES block size in bytes
pub const BLOCK_SIZE: usize = 16;

/// How the CBC initialisation vector is chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IvMode {
    /// IV is the first block of the key (compatible with deployed peers)
    #[default]
    KeyDerived,
    /// Fresh random IV prepended to each ciphertext
    RandomPrefix,
}

impl std::str::FromStr for IvMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "key_derived" | "key-derived" | "compat" => Ok(IvMode::KeyDerived),
            "random_prefix" | "random-prefix" | "random" => Ok(IvMode::RandomPrefix),
            other => Err(format!("unknown IV mode '{}'", other)),
        }
    }
}

/// Encrypt `plaintext` under the session key with PKCS#7 padding
pub fn encrypt(key: &SessionKey, plaintext: &[u8], mode: IvMode) -> Result<Vec<u8>, CryptoError> {
    match mode {
        IvMode::KeyDerived => {
            let iv = key_derived_iv(key);
            encrypt_with_iv(key, &iv, plaintext)
        }
        IvMode::RandomPrefix => {
            let mut iv = [0u8; BLOCK_SIZE];
            OsRng.fill_bytes(&mut iv);
            let ciphertext = encrypt_with_iv(key, &iv, plaintext)?;

            let mut out = Vec::with_capacity(BLOCK_SIZE + ciphertext.len());
            out.extend_from_slice(&iv);
            out.extend_from_slice(&ciphertext);
            Ok(out)
        }
    }
}

/// Decrypt and unpad
///
/// # Errors
///
/// Every failure (length not a block multiple, missing IV, bad padding)
/// returns the same `CryptoError::DecryptionFailed`.
pub fn decrypt(key: &SessionKey, ciphertext: &[u8], mode: IvMode) -> Result<Vec<u8>, CryptoError> {
    let (iv, body) = match mode {
        IvMode::KeyDerived => (key_derived_iv(key), ciphertext),
        IvMode::RandomPrefix => {
            if ciphertext.len() < BLOCK_SIZE {
                return Err(CryptoError::decryption("aes_cbc"));
            }
            let (prefix, rest) = ciphertext.split_at(BLOCK_SIZE);
            let mut iv = [0u8; BLOCK_SIZE];
            iv.copy_from_slice(prefix);
            (iv, rest)
        }
    };

    if body.is_empty() || body.len() % BLOCK_SIZE != 0 {
        return Err(CryptoError::decryption("aes_cbc"));
    }

    Aes128CbcDec::new_from_slices(key.as_bytes(), &iv)
        .map_err(|_| CryptoError::decryption("aes_cbc"))?
        .decrypt_padded_vec_mut::<Pkcs7>(body)
        .map_err(|_| CryptoError::decryption("aes_cbc"))
}

fn encrypt_with_iv(
    key: &SessionKey,
    iv: &[u8; BLOCK_SIZE],
    plaintext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let cipher = Aes128CbcEnc::new_from_slices(key.as_bytes(), iv).map_err(|e| {
        CryptoError::EncryptionFailed {
            operation: "aes_cbc".to_string(),
            reason: e.to_string(),
        }
    })?;
    Ok(cipher.encrypt_padded_vec_mut::<Pkcs7>(plaintext))
}

fn key_derived_iv(key: &SessionKey) -> [u8; BLOCK_SIZE] {
    let mut iv = [0u8; BLOCK_SIZE];
    iv.copy_from_slice(&key.as_bytes()[..BLOCK_SIZE]);
    iv
}
