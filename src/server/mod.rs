// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! ECT Server Engine
//!
//! Owns the long-lived key pair and the session cache. For each request:
//!
//! 1. Extract the wrapped key from the header
//! 2. Resolve the session key through the cache (ECIES unwrap on a miss)
//! 3. Decrypt and window-check the timestamp, decrypt the optional token
//! 4. Decrypt the body
//!
//! Responses are encrypted with the same session key and stamped with a
//! fresh encrypted timestamp.

pub mod cache;
pub mod demo;
pub mod http;

pub use cache::{CacheStats, KeyUnwrapper, SessionCache};

use crate::config::{ProtocolConfig, ServerConfig};
use crate::crypto::{fingerprint, KeyPair, SessionKey};
use crate::error::{EctError, Result};
use crate::protocol::{unix_now, BodyCodec, HeaderCodec, HeaderFields};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Bootstrap endpoint payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ServerInfo {
    pub unix_time: i64,
    /// Base64 uncompressed secp256k1 public key
    pub public_key: String,
}

/// A request that passed session resolution and header verification
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub session_key: SessionKey,
    /// Decrypted token, opaque to the protocol
    pub token: Option<Vec<u8>>,
    pub timestamp: i64,
    /// Wrapped key the session was resolved from
    pub wrapped_key: String,
}

impl RequestContext {
    /// Token as UTF-8 text, when present and valid
    pub fn token_str(&self) -> Option<&str> {
        self.token
            .as_deref()
            .and_then(|t| std::str::from_utf8(t).ok())
    }
}

/// Encrypted response ready to be written to the transport
#[derive(Debug, Clone)]
pub struct EncryptedResponse {
    pub headers: HeaderFields,
    pub body: Vec<u8>,
    pub content_type: &'static str,
}

pub struct EctServer {
    key_pair: Arc<KeyPair>,
    cache: SessionCache,
    protocol: ProtocolConfig,
    headers: HeaderCodec,
    body: BodyCodec,
}

impl EctServer {
    pub fn new(key_pair: KeyPair, protocol: ProtocolConfig) -> Self {
        Self::with_cache(key_pair, protocol, SessionCache::new())
    }

    /// Build a server around an externally owned cache
    pub fn with_cache(key_pair: KeyPair, protocol: ProtocolConfig, cache: SessionCache) -> Self {
        let headers = protocol.header_codec();
        let body = protocol.body_codec();
        Self {
            key_pair: Arc::new(key_pair),
            cache,
            protocol,
            headers,
            body,
        }
    }

    /// Build from configuration; the private key is required
    ///
    /// Starts the background sweeper when a sweep interval is configured,
    /// so this must run inside a tokio runtime in that case.
    pub fn from_config(config: &ServerConfig) -> Result<Self> {
        let encoded = config
            .private_key
            .as_deref()
            .ok_or_else(|| EctError::Config("server private key is not configured".into()))?;
        let key_pair = KeyPair::from_private_base64(encoded)?;

        let cache = SessionCache::with_ttl(config.cache_ttl());
        if let Some(interval) = config.sweep_interval() {
            cache.spawn_sweeper(interval);
        }

        let server = Self::with_cache(key_pair, config.protocol.clone(), cache);
        info!(
            "ECT server ready (public key: {}, cache ttl: {}s)",
            server.public_key_base64(),
            config.cache_ttl_secs
        );
        Ok(server)
    }

    pub fn public_key_base64(&self) -> String {
        self.key_pair.public_key_base64()
    }

    pub fn protocol(&self) -> &ProtocolConfig {
        &self.protocol
    }

    pub fn header_codec(&self) -> &HeaderCodec {
        &self.headers
    }

    pub fn body_codec(&self) -> &BodyCodec {
        &self.body
    }

    pub fn cache(&self) -> &SessionCache {
        &self.cache
    }

    /// Payload for the bootstrap endpoint
    pub fn info(&self) -> ServerInfo {
        ServerInfo {
            unix_time: unix_now(),
            public_key: self.public_key_base64(),
        }
    }

    /// Resolve the session and verify the header of an incoming request
    pub async fn verify_request(&self, fields: &HeaderFields) -> Result<RequestContext> {
        self.verify_request_at(fields, unix_now()).await
    }

    pub async fn verify_request_at(&self, fields: &HeaderFields, now: i64) -> Result<RequestContext> {
        let wrapped_key = self.headers.wrapped_key(fields)?;
        let session_key = self
            .cache
            .resolve(wrapped_key, self.key_pair.as_ref())
            .await?;

        let verified = self
            .headers
            .parse_and_verify_at(fields, &session_key, self.protocol.replay_window_secs, now)
            .map_err(|e| {
                warn!(
                    target: "ectsm::security",
                    session = %fingerprint(wrapped_key),
                    kind = e.kind(),
                    "request header rejected"
                );
                e
            })?;

        debug!(
            session = %fingerprint(wrapped_key),
            has_token = verified.token.is_some(),
            "request header verified"
        );

        Ok(RequestContext {
            session_key,
            token: verified.token,
            timestamp: verified.timestamp,
            wrapped_key: wrapped_key.to_string(),
        })
    }

    /// Verify a request that carries no body
    pub async fn handle_get(&self, fields: &HeaderFields) -> Result<RequestContext> {
        self.verify_request(fields).await
    }

    /// Verify a request and decrypt its body
    ///
    /// The header is verified before the body is touched.
    pub async fn handle_post(
        &self,
        fields: &HeaderFields,
        body: &[u8],
    ) -> Result<(RequestContext, Vec<u8>)> {
        let context = self.verify_request(fields).await?;
        let plaintext = self.body.decrypt_body(&context.session_key, body)?;
        Ok((context, plaintext))
    }

    /// Encrypt a response body and build its header
    pub fn respond(&self, session_key: &SessionKey, payload: &[u8]) -> Result<EncryptedResponse> {
        Ok(EncryptedResponse {
            headers: self.headers.build_response_header(session_key)?,
            body: self.body.encrypt_body(session_key, payload)?,
            content_type: self.body.content_type(),
        })
    }

    pub fn respond_json<T: Serialize>(
        &self,
        session_key: &SessionKey,
        value: &T,
    ) -> Result<EncryptedResponse> {
        let payload = serde_json::to_vec(value)?;
        self.respond(session_key, &payload)
    }
}
