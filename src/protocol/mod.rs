// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! ECT Protocol Codec
//!
//! Header fields, body encryption and the timestamp window check. Nothing in
//! here performs I/O; the client and server adapters move the results over HTTP.

pub mod body;
pub mod header;
pub mod replay;

pub use body::{BodyCodec, BodyEncoding};
pub use header::{HeaderCodec, HeaderFields, HeaderNames, VerifiedHeader};
pub use replay::{check_timestamp, unix_now, ReplayError};

/// Well-known bootstrap endpoint path
pub const INFO_PATH: &str = "/ectminfo";
