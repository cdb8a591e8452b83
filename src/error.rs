// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Error taxonomy for the ECT protocol engine
//!
//! Every failure is returned to the immediate caller (request handler or
//! client call site). Crypto failures never reveal which stage failed.

use crate::crypto::CryptoError;
use crate::protocol::replay::ReplayError;
use std::time::Duration;
use thiserror::Error;

/// Errors produced by the client, server and codec
#[derive(Debug, Error)]
pub enum EctError {
    /// Server clock is too far from the local clock at bootstrap
    #[error("Server clock differs from local clock by {gap}s (allowed {allowed}s)")]
    ClockSkew { gap: i64, allowed: u64 },

    /// Asymmetric or symmetric primitive failure
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// Message timestamp outside the allowed window
    #[error("Replay rejected: {0}")]
    Replay(#[from] ReplayError),

    /// Wrapped key could not be unwrapped on a cache miss
    #[error("Session establishment failed: {0}")]
    SessionEstablish(CryptoError),

    /// Unexpected HTTP status on a call that requires success
    #[error("Transport error: HTTP {status}")]
    Transport { status: u16 },

    /// Connection-level failure
    #[error("Network error: {0}")]
    Network(String),

    /// Round trip exceeded the caller-supplied timeout
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// Required header field missing or empty
    #[error("Missing or invalid header field '{field}'")]
    InvalidHeader { field: String },

    /// Body could not be read or decoded from its transport form
    #[error("Invalid body: {0}")]
    InvalidBody(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    /// Client call made before a successful bootstrap
    #[error("Client session is not ready")]
    NotReady,

    #[error("Client session is closed")]
    SessionClosed,
}

impl EctError {
    /// Stable machine-readable kind, used for logs and HTTP mapping
    pub fn kind(&self) -> &'static str {
        match self {
            EctError::ClockSkew { .. } => "clock_skew",
            EctError::Crypto(_) => "crypto",
            EctError::Replay(_) => "replay",
            EctError::SessionEstablish(_) => "session_establish",
            EctError::Transport { .. } => "transport",
            EctError::Network(_) => "network",
            EctError::Timeout(_) => "timeout",
            EctError::InvalidHeader { .. } => "invalid_header",
            EctError::InvalidBody(_) => "invalid_body",
            EctError::Serialization(_) => "serialization",
            EctError::Config(_) => "config",
            EctError::NotReady => "not_ready",
            EctError::SessionClosed => "session_closed",
        }
    }

    /// Failures that likely indicate tampering or replay
    pub fn is_security_event(&self) -> bool {
        matches!(
            self,
            EctError::Replay(_) | EctError::Crypto(_) | EctError::SessionEstablish(_)
        )
    }

    /// HTTP status a server should answer with for this failure
    pub fn status_code(&self) -> u16 {
        match self {
            EctError::Replay(_) => 401,
            EctError::Crypto(_)
            | EctError::SessionEstablish(_)
            | EctError::InvalidHeader { .. }
            | EctError::InvalidBody(_)
            | EctError::Serialization(_) => 400,
            EctError::Timeout(_) => 504,
            _ => 500,
        }
    }

    pub(crate) fn missing_header(field: &str) -> Self {
        EctError::InvalidHeader {
            field: field.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, EctError>;
