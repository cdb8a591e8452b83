// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Body encryption for requests and responses

use crate::crypto::{aes_cbc, CryptoError, IvMode, SessionKey};
use crate::error::{EctError, Result};
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

/// Transport form of an encrypted body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BodyEncoding {
    /// Raw ciphertext bytes
    #[default]
    Raw,
    /// Base64 text of the ciphertext, for text-only transports
    Base64,
}

impl BodyEncoding {
    pub fn content_type(&self) -> &'static str {
        match self {
            BodyEncoding::Raw => "application/octet-stream",
            BodyEncoding::Base64 => "text/plain",
        }
    }
}

impl std::str::FromStr for BodyEncoding {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "raw" | "binary" => Ok(BodyEncoding::Raw),
            "base64" | "text" => Ok(BodyEncoding::Base64),
            other => Err(format!("unknown body encoding '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BodyCodec {
    encoding: BodyEncoding,
    iv_mode: IvMode,
}

impl BodyCodec {
    pub fn new(encoding: BodyEncoding, iv_mode: IvMode) -> Self {
        Self { encoding, iv_mode }
    }

    pub fn encoding(&self) -> BodyEncoding {
        self.encoding
    }

    pub fn content_type(&self) -> &'static str {
        self.encoding.content_type()
    }

    pub fn encrypt_body(&self, key: &SessionKey, payload: &[u8]) -> Result<Vec<u8>> {
        let ciphertext = aes_cbc::encrypt(key, payload, self.iv_mode)?;
        Ok(match self.encoding {
            BodyEncoding::Raw => ciphertext,
            BodyEncoding::Base64 => STANDARD.encode(ciphertext).into_bytes(),
        })
    }

    pub fn decrypt_body(&self, key: &SessionKey, body: &[u8]) -> Result<Vec<u8>> {
        let decoded;
        let ciphertext = match self.encoding {
            BodyEncoding::Raw => body,
            BodyEncoding::Base64 => {
                let text = std::str::from_utf8(body)
                    .map_err(|_| EctError::InvalidBody("body is not valid base64 text".into()))?;
                decoded = STANDARD
                    .decode(text.trim())
                    .map_err(|_| EctError::InvalidBody("body is not valid base64 text".into()))?;
                decoded.as_slice()
            }
        };
        aes_cbc::decrypt(key, ciphertext, self.iv_mode)
            .map_err(|_| EctError::Crypto(CryptoError::decryption("body")))
    }

    /// Serialize with serde_json, then encrypt
    pub fn encrypt_json<T: Serialize>(&self, key: &SessionKey, value: &T) -> Result<Vec<u8>> {
        let json = serde_json::to_vec(value)?;
        self.encrypt_body(key, &json)
    }

    /// Decrypt, then deserialize with serde_json
    pub fn decrypt_json<T: DeserializeOwned>(&self, key: &SessionKey, body: &[u8]) -> Result<T> {
        let json = self.decrypt_body(key, body)?;
        Ok(serde_json::from_slice(&json)?)
    }
}
