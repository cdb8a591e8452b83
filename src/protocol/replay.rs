// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Replay Guard
//!
//! Stateless timestamp window check shared by the request and response paths
//! and by the bootstrap clock check (each with its own bound).
//!
//! There are no nonces or sequence numbers: a captured message can be replayed
//! for as long as its timestamp stays inside the window. That limit is accepted;
//! the window only bounds how long a capture stays useful.

use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Message timestamp outside the allowed window
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("timestamp {timestamp} is outside the {allowed_skew}s window around {now}")]
pub struct ReplayError {
    pub timestamp: i64,
    pub now: i64,
    pub allowed_skew: u64,
}

/// Accept iff `|now - timestamp| <= allowed_skew`
pub fn check_timestamp(timestamp: i64, now: i64, allowed_skew: u64) -> Result<(), ReplayError> {
    if now.abs_diff(timestamp) > allowed_skew {
        tracing::warn!(
            target: "ectsm::security",
            timestamp,
            now,
            allowed_skew,
            "message timestamp outside allowed window"
        );
        return Err(ReplayError {
            timestamp,
            now,
            allowed_skew,
        });
    }
    Ok(())
}

/// Current wall-clock time in Unix seconds
pub fn unix_now() -> i64 {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(elapsed) => elapsed.as_secs() as i64,
        Err(before) => -(before.duration().as_secs() as i64),
    }
}
