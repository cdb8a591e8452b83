// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! ECTSM: an encrypted transport layered on plain HTTP
//!
//! A client fetches the server's clock and secp256k1 public key, wraps a fresh
//! AES-128 session key for it once, and then sends that wrapped key with
//! every request. Header fields carry an encrypted timestamp and an optional
//! encrypted token; bodies are AES-128-CBC encrypted under the session key.
pub mod cli;
pub mod client;
pub mod config;
pub mod crypto;
pub mod error;
pub mod protocol;
pub mod server;
pub mod version;

pub use client::{ClientState, EctClient, EctResponse, RequestOptions};
pub use config::{ClientConfig, ProtocolConfig, ServerConfig};
pub use crypto::{CryptoError, IvMode, KeyPair, SessionKey};
pub use error::{EctError, Result};
pub use protocol::{BodyEncoding, HeaderFields, HeaderNames};
pub use server::{EctServer, ServerInfo, SessionCache};
