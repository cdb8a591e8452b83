// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! ECT Client Session
//!
//! Lifecycle: `Uninitialized -> Bootstrapping -> Ready -> Closed`.
//!
//! Bootstrap fetches the server clock and public key, rejects the server if
//! its clock is too far from ours, then generates a session key and wraps it
//! once. The wrapped key travels on every request and doubles as the session
//! identifier on the server.
//!
//! Session material is immutable after bootstrap, so requests can run
//! concurrently through `&self`.

use crate::config::ClientConfig;
use crate::crypto::{ecies, fingerprint, public_key_from_base64, SessionKey};
use crate::error::{EctError, Result};
use crate::protocol::{unix_now, BodyCodec, HeaderCodec, HeaderFields};
use crate::server::ServerInfo;
use base64::{engine::general_purpose::STANDARD, Engine};
use reqwest::{Client, Method};
use serde::{de::DeserializeOwned, Serialize};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Observable client lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    Uninitialized,
    Bootstrapping,
    Ready,
    Closed,
}

/// Key material fixed at bootstrap
#[derive(Debug, Clone)]
pub struct Session {
    key: SessionKey,
    wrapped_key: String,
    server_public_key: String,
    clock_gap: i64,
}

impl Session {
    pub fn session_key(&self) -> &SessionKey {
        &self.key
    }

    /// Base64 ECIES ciphertext of the session key
    pub fn wrapped_key(&self) -> &str {
        &self.wrapped_key
    }

    pub fn server_public_key(&self) -> &str {
        &self.server_public_key
    }

    /// Local clock minus server clock at bootstrap, in seconds
    pub fn clock_gap(&self) -> i64 {
        self.clock_gap
    }
}

/// Check the server clock and derive fresh session material
///
/// # Errors
///
/// `ClockSkew` when `|local_now - info.unix_time| > allowed_skew`, and
/// `SessionEstablish` when the public key is unusable.
pub fn establish_session(info: &ServerInfo, local_now: i64, allowed_skew: u64) -> Result<Session> {
    let gap = local_now.saturating_sub(info.unix_time);
    if gap.unsigned_abs() > allowed_skew {
        warn!(
            target: "ectsm::security",
            gap,
            allowed = allowed_skew,
            "server clock outside bootstrap window"
        );
        return Err(EctError::ClockSkew {
            gap,
            allowed: allowed_skew,
        });
    }

    let public = public_key_from_base64(&info.public_key).map_err(EctError::SessionEstablish)?;
    let key = SessionKey::generate();
    let wrapped = ecies::wrap(&public, key.as_bytes()).map_err(EctError::SessionEstablish)?;

    Ok(Session {
        key,
        wrapped_key: STANDARD.encode(wrapped),
        server_public_key: info.public_key.clone(),
        clock_gap: gap,
    })
}

/// Per-call overrides
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Replaces the session default token for this call
    pub token: Option<Vec<u8>>,
    /// Replaces the configured request timeout for this call
    pub timeout: Option<Duration>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(mut self, token: impl Into<Vec<u8>>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Response to an ECT call
///
/// Non-200 responses are returned as received with `decrypted == false`.
#[derive(Debug, Clone)]
pub struct EctResponse {
    pub status: u16,
    pub headers: HeaderFields,
    pub body: Vec<u8>,
    pub decrypted: bool,
}

impl EctResponse {
    pub fn is_success(&self) -> bool {
        self.status == 200 && self.decrypted
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

enum Phase {
    Uninitialized,
    Bootstrapping,
    Ready(Arc<Session>),
    Closed,
}

/// Resets a bootstrap that did not complete, including a cancelled one
struct BootstrapReset<'a> {
    phase: &'a RwLock<Phase>,
    armed: bool,
}

impl Drop for BootstrapReset<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut phase = self.phase.write().unwrap_or_else(PoisonError::into_inner);
        if matches!(*phase, Phase::Bootstrapping) {
            *phase = Phase::Uninitialized;
        }
    }
}

pub struct EctClient {
    http: Client,
    config: ClientConfig,
    headers: HeaderCodec,
    body: BodyCodec,
    phase: RwLock<Phase>,
    bootstrap_lock: Mutex<()>,
    token: tokio::sync::RwLock<Option<Vec<u8>>>,
}

impl EctClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let http = Client::builder()
            .build()
            .map_err(|e| EctError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            headers: config.protocol.header_codec(),
            body: config.protocol.body_codec(),
            token: tokio::sync::RwLock::new(config.token.clone().map(String::into_bytes)),
            phase: RwLock::new(Phase::Uninitialized),
            bootstrap_lock: Mutex::new(()),
            config,
        })
    }

    /// Create a client and bootstrap it
    pub async fn connect(config: ClientConfig) -> Result<Self> {
        let client = Self::new(config)?;
        client.bootstrap().await?;
        Ok(client)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn state(&self) -> ClientState {
        match *self.phase.read().unwrap_or_else(PoisonError::into_inner) {
            Phase::Uninitialized => ClientState::Uninitialized,
            Phase::Bootstrapping => ClientState::Bootstrapping,
            Phase::Ready(_) => ClientState::Ready,
            Phase::Closed => ClientState::Closed,
        }
    }

    /// Current session material
    pub fn session(&self) -> Result<Arc<Session>> {
        match &*self.phase.read().unwrap_or_else(PoisonError::into_inner) {
            Phase::Ready(session) => Ok(Arc::clone(session)),
            Phase::Closed => Err(EctError::SessionClosed),
            Phase::Uninitialized | Phase::Bootstrapping => Err(EctError::NotReady),
        }
    }

    fn set_phase(&self, next: Phase) {
        *self.phase.write().unwrap_or_else(PoisonError::into_inner) = next;
    }

    /// Fetch server info and establish the session
    ///
    /// A no-op once ready. On any failure the client returns to
    /// `Uninitialized` with no partial session.
    pub async fn bootstrap(&self) -> Result<()> {
        let _serial = self.bootstrap_lock.lock().await;
        {
            let mut phase = self.phase.write().unwrap_or_else(PoisonError::into_inner);
            match *phase {
                Phase::Ready(_) => return Ok(()),
                Phase::Closed => return Err(EctError::SessionClosed),
                Phase::Uninitialized | Phase::Bootstrapping => *phase = Phase::Bootstrapping,
            }
        }

        let mut reset = BootstrapReset {
            phase: &self.phase,
            armed: true,
        };

        let info = self.fetch_info().await?;
        let session = establish_session(
            &info,
            unix_now(),
            self.config.protocol.bootstrap_skew_secs,
        )?;

        let session_id = fingerprint(session.wrapped_key());
        let clock_gap = session.clock_gap();

        // close() may have run while the info request was in flight
        {
            let mut phase = self.phase.write().unwrap_or_else(PoisonError::into_inner);
            if !matches!(*phase, Phase::Bootstrapping) {
                reset.armed = false;
                return Err(EctError::SessionClosed);
            }
            *phase = Phase::Ready(Arc::new(session));
        }
        reset.armed = false;

        info!(
            "ECT session established with {} (session: {}, clock gap: {}s)",
            self.config.info_url, session_id, clock_gap
        );
        Ok(())
    }

    async fn fetch_info(&self) -> Result<ServerInfo> {
        let timeout = self.config.request_timeout();
        let exchange = async {
            let response = self.http.get(&self.config.info_url).send().await?;
            let status = response.status().as_u16();
            if status != 200 {
                return Ok::<_, reqwest::Error>(Err(status));
            }
            Ok(Ok(response.json::<ServerInfo>().await?))
        };

        let outcome = tokio::time::timeout(timeout, exchange)
            .await
            .map_err(|_| EctError::Timeout(timeout))?
            .map_err(|e| request_error(e, timeout))?;

        outcome.map_err(|status| EctError::Transport { status })
    }

    /// Set the default token attached to every request
    pub async fn set_user_token(&self, token: impl Into<Vec<u8>>) {
        *self.token.write().await = Some(token.into());
    }

    pub async fn clear_user_token(&self) {
        *self.token.write().await = None;
    }

    pub async fn get(&self, url: &str, options: RequestOptions) -> Result<EctResponse> {
        self.send(Method::GET, url, None, options).await
    }

    pub async fn post(&self, url: &str, body: &[u8], options: RequestOptions) -> Result<EctResponse> {
        self.send(Method::POST, url, Some(body), options).await
    }

    pub async fn post_json<T: Serialize>(
        &self,
        url: &str,
        value: &T,
        options: RequestOptions,
    ) -> Result<EctResponse> {
        let payload = serde_json::to_vec(value)?;
        self.post(url, &payload, options).await
    }

    async fn send(
        &self,
        method: Method,
        url: &str,
        body: Option<&[u8]>,
        options: RequestOptions,
    ) -> Result<EctResponse> {
        let session = self.session()?;
        let token = match options.token {
            Some(token) => Some(token),
            None => self.token.read().await.clone(),
        };

        let fields = self.headers.build_request_header(
            session.session_key(),
            Some(session.wrapped_key()),
            token.as_deref(),
        )?;

        let mut request = self.http.request(method.clone(), url);
        for (name, value) in fields.iter() {
            request = request.header(name, value);
        }
        if let Some(payload) = body {
            let encrypted = self.body.encrypt_body(session.session_key(), payload)?;
            request = request
                .header(reqwest::header::CONTENT_TYPE, self.body.content_type())
                .body(encrypted);
        }

        let timeout = options
            .timeout
            .unwrap_or_else(|| self.config.request_timeout());
        let names = self.headers.names();
        let exchange = async {
            let response = request.send().await?;
            let status = response.status().as_u16();
            let headers: HeaderFields = names
                .all()
                .into_iter()
                .filter_map(|name| {
                    response
                        .headers()
                        .get(name)
                        .and_then(|v| v.to_str().ok())
                        .map(|v| (name, v.to_string()))
                })
                .collect();
            let bytes = response.bytes().await?;
            Ok::<_, reqwest::Error>((status, headers, bytes.to_vec()))
        };

        let (status, headers, raw) = tokio::time::timeout(timeout, exchange)
            .await
            .map_err(|_| EctError::Timeout(timeout))?
            .map_err(|e| request_error(e, timeout))?;

        debug!(%method, url, status, "ECT response received");

        if status != 200 {
            return Ok(EctResponse {
                status,
                headers,
                body: raw,
                decrypted: false,
            });
        }

        self.headers.parse_and_verify(
            &headers,
            session.session_key(),
            self.config.protocol.replay_window_secs,
        )?;
        let plaintext = self.body.decrypt_body(session.session_key(), &raw)?;

        Ok(EctResponse {
            status,
            headers,
            body: plaintext,
            decrypted: true,
        })
    }

    /// Discard the session; later calls fail with `SessionClosed`
    pub fn close(&self) {
        self.set_phase(Phase::Closed);
        info!("ECT session closed");
    }
}

fn request_error(err: reqwest::Error, timeout: Duration) -> EctError {
    if err.is_timeout() {
        EctError::Timeout(timeout)
    } else {
        EctError::Network(err.to_string())
    }
}
