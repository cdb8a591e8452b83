// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Cryptographic Primitives
//!
//! - **ECIES**: secp256k1 key wrapping of the 16-byte session key
//! - **AES-CBC**: AES-128-CBC with PKCS#7 for header fields and bodies
//! - **Keys**: server key pair, session key, base64 key codecs
//!
//! ## Security Considerations
//!
//! - Session keys live in memory only, never persisted or logged
//! - Decrypt failures collapse into one error variant regardless of stage
//! - ECIES is probabilistic: a wrapped key is computed once per session and
//!   reused verbatim as the session identifier

pub mod aes_cbc;
pub mod ecies;
pub mod error;
pub mod keys;

pub use aes_cbc::IvMode;
pub use error::CryptoError;
pub use keys::{fingerprint, public_key_from_base64, KeyPair, SessionKey};
