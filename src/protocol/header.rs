// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! ECT Header Codec
//!
//! Builds and parses the protocol header fields:
//!
//! - key identifier: base64 wrapped session key (sent as-is, not AES encrypted)
//! - time: base64(AES(8-byte big-endian Unix seconds)), fresh on every message
//! - token: base64(AES(token bytes)), only when a token is attached
//!
//! Field names are configuration. Lookups are case-insensitive.

use super::replay::{check_timestamp, unix_now};
use crate::crypto::{aes_cbc, CryptoError, IvMode, SessionKey};
use crate::error::{EctError, Result};
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};

/// Names of the three ECT header fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderNames {
    pub key: String,
    pub time: String,
    pub token: String,
}

impl HeaderNames {
    /// Canonical field set
    pub fn ectm() -> Self {
        Self {
            key: "ectm_key".to_string(),
            time: "ectm_time".to_string(),
            token: "ectm_token".to_string(),
        }
    }

    /// Legacy `{ecs, timestamp}` set, token carried in `authorization`
    pub fn legacy_timestamp() -> Self {
        Self {
            key: "ecs".to_string(),
            time: "timestamp".to_string(),
            token: "authorization".to_string(),
        }
    }

    /// Legacy `{ecs, ecttimestamp}` set, token carried in `authorization`
    pub fn legacy_ecttimestamp() -> Self {
        Self {
            key: "ecs".to_string(),
            time: "ecttimestamp".to_string(),
            token: "authorization".to_string(),
        }
    }

    pub fn all(&self) -> [&str; 3] {
        [&self.key, &self.time, &self.token]
    }
}

impl Default for HeaderNames {
    fn default() -> Self {
        Self::ectm()
    }
}

/// Ordered, case-insensitive set of header name/value pairs
///
/// Transport agnostic: the HTTP adapters convert to and from their own
/// header maps. Names are stored lowercase.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderFields {
    fields: Vec<(String, String)>,
}

impl HeaderFields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a field, replacing any existing value with the same name
    pub fn insert(&mut self, name: &str, value: impl Into<String>) {
        let name = name.to_ascii_lowercase();
        let value = value.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<N: AsRef<str>, V: Into<String>> FromIterator<(N, V)> for HeaderFields {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        let mut fields = HeaderFields::new();
        for (name, value) in iter {
            fields.insert(name.as_ref(), value);
        }
        fields
    }
}

/// Result of a successful header verification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedHeader {
    /// Decrypted token, opaque to the protocol
    pub token: Option<Vec<u8>>,
    /// Decrypted message timestamp (Unix seconds)
    pub timestamp: i64,
}

/// Encrypts and decrypts ECT header fields
#[derive(Debug, Clone, Default)]
pub struct HeaderCodec {
    names: HeaderNames,
    iv_mode: IvMode,
}

impl HeaderCodec {
    pub fn new(names: HeaderNames, iv_mode: IvMode) -> Self {
        Self { names, iv_mode }
    }

    pub fn names(&self) -> &HeaderNames {
        &self.names
    }

    /// Build a request header stamped with the current time
    ///
    /// The key identifier is included when `wrapped_key` is given; the
    /// encrypted token only when `token` is given.
    pub fn build_request_header(
        &self,
        key: &SessionKey,
        wrapped_key: Option<&str>,
        token: Option<&[u8]>,
    ) -> Result<HeaderFields> {
        self.build_request_header_at(key, wrapped_key, token, unix_now())
    }

    pub fn build_request_header_at(
        &self,
        key: &SessionKey,
        wrapped_key: Option<&str>,
        token: Option<&[u8]>,
        timestamp: i64,
    ) -> Result<HeaderFields> {
        let mut fields = HeaderFields::new();
        if let Some(wrapped) = wrapped_key.filter(|w| !w.is_empty()) {
            fields.insert(&self.names.key, wrapped);
        }
        fields.insert(&self.names.time, self.encrypt_field(key, &timestamp.to_be_bytes())?);
        if let Some(token) = token.filter(|t| !t.is_empty()) {
            fields.insert(&self.names.token, self.encrypt_field(key, token)?);
        }
        Ok(fields)
    }

    /// Build a response header: encrypted timestamp only
    pub fn build_response_header(&self, key: &SessionKey) -> Result<HeaderFields> {
        self.build_response_header_at(key, unix_now())
    }

    pub fn build_response_header_at(&self, key: &SessionKey, timestamp: i64) -> Result<HeaderFields> {
        let mut fields = HeaderFields::new();
        fields.insert(&self.names.time, self.encrypt_field(key, &timestamp.to_be_bytes())?);
        Ok(fields)
    }

    /// Extract the base64 wrapped key used as the session identifier
    pub fn wrapped_key<'a>(&self, fields: &'a HeaderFields) -> Result<&'a str> {
        fields
            .get(&self.names.key)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| EctError::missing_header(&self.names.key))
    }

    /// Decrypt the timestamp, enforce the window, then decrypt the optional token
    pub fn parse_and_verify(
        &self,
        fields: &HeaderFields,
        key: &SessionKey,
        allowed_skew: u64,
    ) -> Result<VerifiedHeader> {
        self.parse_and_verify_at(fields, key, allowed_skew, unix_now())
    }

    pub fn parse_and_verify_at(
        &self,
        fields: &HeaderFields,
        key: &SessionKey,
        allowed_skew: u64,
        now: i64,
    ) -> Result<VerifiedHeader> {
        let time_field = fields
            .get(&self.names.time)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| EctError::missing_header(&self.names.time))?;

        let raw = self.decrypt_field(key, time_field, "timestamp")?;
        let timestamp = decode_timestamp(&raw)?;
        check_timestamp(timestamp, now, allowed_skew)?;

        let token = match fields.get(&self.names.token).map(str::trim) {
            Some(value) if !value.is_empty() => Some(self.decrypt_field(key, value, "token")?),
            _ => None,
        };

        Ok(VerifiedHeader { token, timestamp })
    }

    fn encrypt_field(&self, key: &SessionKey, value: &[u8]) -> Result<String> {
        let ciphertext = aes_cbc::encrypt(key, value, self.iv_mode)?;
        Ok(STANDARD.encode(ciphertext))
    }

    fn decrypt_field(&self, key: &SessionKey, value: &str, operation: &str) -> Result<Vec<u8>> {
        let ciphertext = STANDARD
            .decode(value)
            .map_err(|_| CryptoError::decryption(operation))?;
        aes_cbc::decrypt(key, &ciphertext, self.iv_mode)
            .map_err(|_| EctError::Crypto(CryptoError::decryption(operation)))
    }
}

fn decode_timestamp(raw: &[u8]) -> Result<i64> {
    let bytes: [u8; 8] = raw
        .try_into()
        .map_err(|_| CryptoError::decryption("timestamp"))?;
    Ok(i64::from_be_bytes(bytes))
}
