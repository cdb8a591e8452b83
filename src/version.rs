// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// Version information for ECTSM

/// Full version string with feature description
pub const VERSION: &str = "v0.1.0-ectm-headers-2025-10-13";

/// Semantic version number
pub const VERSION_NUMBER: &str = "0.1.0";

/// Major version number
pub const VERSION_MAJOR: u32 = 0;

/// Minor version number
pub const VERSION_MINOR: u32 = 1;

/// Patch version number
pub const VERSION_PATCH: u32 = 0;

/// Build date
pub const BUILD_DATE: &str = "2025-10-13";

/// Supported features in this version
pub const FEATURES: &[&str] = &[
    "ecies-secp256k1",
    "aes-128-cbc",
    "ectm-headers",
    "legacy-header-presets",
    "replay-window",
    "session-key-cache",
    "single-flight-unwrap",
    "random-iv-mode",
    "base64-body-encoding",
];

/// Get formatted version string for logging
pub fn get_version_string() -> String {
    format!("ECTSM {} ({})", VERSION_NUMBER, BUILD_DATE)
}

/// Get full version info for API responses
pub fn get_version_info() -> serde_json::Value {
    serde_json::json!({
        "version": VERSION_NUMBER,
        "build": VERSION,
        "date": BUILD_DATE,
        "features": FEATURES,
    })
}
