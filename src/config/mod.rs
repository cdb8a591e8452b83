// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Configuration
//!
//! Defaults, TOML files and environment variables, applied in that order.
//!
//! | Variable | Field |
//! |---|---|
//! | `ECTSM_CONFIG` | server TOML file read by the `ectsm` binary |
//! | `ECTSM_PRIVATE_KEY` | `ServerConfig::private_key` |
//! | `ECTSM_LISTEN_ADDR` | `ServerConfig::listen_addr` |
//! | `ECTSM_CACHE_TTL_SECS` | `ServerConfig::cache_ttl_secs` |
//! | `ECTSM_SWEEP_INTERVAL_SECS` | `ServerConfig::sweep_interval_secs` |
//! | `ECTSM_INFO_URL` | `ClientConfig::info_url` |
//! | `ECTSM_REQUEST_TIMEOUT_SECS` | `ClientConfig::request_timeout_secs` |
//! | `ECTSM_REPLAY_WINDOW_SECS` | `ProtocolConfig::replay_window_secs` |
//! | `ECTSM_BOOTSTRAP_SKEW_SECS` | `ProtocolConfig::bootstrap_skew_secs` |
//! | `ECTSM_BODY_ENCODING` | `ProtocolConfig::body_encoding` (`raw`/`base64`) |
//! | `ECTSM_IV_MODE` | `ProtocolConfig::iv_mode` (`key_derived`/`random_prefix`) |
//! | `RUST_LOG` | log directives for both binaries, see [`log_filter`] |

use crate::crypto::{keys::PRIVATE_KEY_ENV, IvMode};
use crate::protocol::{BodyCodec, BodyEncoding, HeaderCodec, HeaderNames};
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

pub const DEFAULT_BOOTSTRAP_SKEW_SECS: u64 = 30;
pub const DEFAULT_REPLAY_WINDOW_SECS: u64 = 180;
pub const DEFAULT_CACHE_TTL_SECS: u64 = 3600;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_LOG_DIRECTIVES: &str = "info";

/// Settings both peers must agree on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    pub header_names: HeaderNames,
    /// Max |local - server| clock gap accepted at bootstrap
    pub bootstrap_skew_secs: u64,
    /// Max |now - message timestamp| accepted on requests and responses
    pub replay_window_secs: u64,
    pub body_encoding: BodyEncoding,
    pub iv_mode: IvMode,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            header_names: HeaderNames::default(),
            bootstrap_skew_secs: DEFAULT_BOOTSTRAP_SKEW_SECS,
            replay_window_secs: DEFAULT_REPLAY_WINDOW_SECS,
            body_encoding: BodyEncoding::default(),
            iv_mode: IvMode::default(),
        }
    }
}

impl ProtocolConfig {
    pub fn header_codec(&self) -> HeaderCodec {
        HeaderCodec::new(self.header_names.clone(), self.iv_mode)
    }

    pub fn body_codec(&self) -> BodyCodec {
        BodyCodec::new(self.body_encoding, self.iv_mode)
    }

    pub fn apply_env(&mut self) -> Result<()> {
        if let Some(v) = env_parse::<u64>("ECTSM_REPLAY_WINDOW_SECS")? {
            self.replay_window_secs = v;
        }
        if let Some(v) = env_parse::<u64>("ECTSM_BOOTSTRAP_SKEW_SECS")? {
            self.bootstrap_skew_secs = v;
        }
        if let Some(v) = env_parse::<BodyEncoding>("ECTSM_BODY_ENCODING")? {
            self.body_encoding = v;
        }
        if let Some(v) = env_parse::<IvMode>("ECTSM_IV_MODE")? {
            self.iv_mode = v;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    /// Base64 private scalar; prefer the environment over files
    pub private_key: Option<String>,
    pub cache_ttl_secs: u64,
    /// Background sweep of expired cache entries; `None` keeps purging lazy only
    pub sweep_interval_secs: Option<u64>,
    pub protocol: ProtocolConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8080".to_string(),
            private_key: None,
            cache_ttl_secs: DEFAULT_CACHE_TTL_SECS,
            sweep_interval_secs: Some(300),
            protocol: ProtocolConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).context("Failed to parse server config TOML")
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml_str(&contents)
    }

    /// Defaults overridden by environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    pub fn apply_env(&mut self) -> Result<()> {
        if let Ok(key) = env::var(PRIVATE_KEY_ENV) {
            if !key.trim().is_empty() {
                self.private_key = Some(key.trim().to_string());
            }
        }
        if let Ok(addr) = env::var("ECTSM_LISTEN_ADDR") {
            self.listen_addr = addr;
        }
        if let Some(v) = env_parse::<u64>("ECTSM_CACHE_TTL_SECS")? {
            self.cache_ttl_secs = v;
        }
        if let Some(v) = env_parse::<u64>("ECTSM_SWEEP_INTERVAL_SECS")? {
            self.sweep_interval_secs = if v == 0 { None } else { Some(v) };
        }
        self.protocol.apply_env()
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn sweep_interval(&self) -> Option<Duration> {
        self.sweep_interval_secs.map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Bootstrap endpoint returning server time and public key
    pub info_url: String,
    pub request_timeout_secs: u64,
    /// Default token attached to every request unless overridden
    pub token: Option<String>,
    pub protocol: ProtocolConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            info_url: "http://127.0.0.1:8080/ectminfo".to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            token: None,
            protocol: ProtocolConfig::default(),
        }
    }
}

impl ClientConfig {
    pub fn new(info_url: impl Into<String>) -> Self {
        Self {
            info_url: info_url.into(),
            ..Self::default()
        }
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).context("Failed to parse client config TOML")
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml_str(&contents)
    }

    pub fn apply_env(&mut self) -> Result<()> {
        if let Ok(url) = env::var("ECTSM_INFO_URL") {
            self.info_url = url;
        }
        if let Some(v) = env_parse::<u64>("ECTSM_REQUEST_TIMEOUT_SECS")? {
            self.request_timeout_secs = v;
        }
        self.protocol.apply_env()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Log filter from `RUST_LOG`-style directives
///
/// Missing, blank or unparsable directives fall back to `info`.
pub fn log_filter(directives: Option<&str>) -> EnvFilter {
    directives
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_DIRECTIVES))
}

fn env_parse<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| anyhow!("{} is invalid: {}", name, e)),
        _ => Ok(None),
    }
}
