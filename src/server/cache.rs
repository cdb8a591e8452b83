// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Session Key Cache
//!
//! Maps a base64 wrapped key to its unwrapped session key so the costly
//! ECIES decrypt runs once per client session instead of once per request.
//!
//! - Entries expire a fixed TTL after insertion; hits do not extend it
//! - Expired entries are never returned; they are purged lazily on access
//!   and by the optional background sweeper
//! - Cold misses are single-flight per wrapped key: concurrent resolvers of
//!   the same key wait for one unwrap, different keys unwrap in parallel
//! - Failed unwraps are never cached
//!
//! **Security**: Keys are stored in memory only and never persisted to disk.

use crate::crypto::{ecies, fingerprint, CryptoError, KeyPair, SessionKey};
use crate::error::{EctError, Result};
use base64::{engine::general_purpose::STANDARD, Engine};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::{Duration, Instant};
use tokio::sync::{OnceCell, RwLock};
use tokio::task::JoinHandle;

/// Recovers a session key from its wrapped form
///
/// Implemented by the server key pair; tests substitute counting or failing
/// implementations.
pub trait KeyUnwrapper: Send + Sync {
    fn unwrap_session_key(&self, wrapped: &[u8]) -> std::result::Result<SessionKey, CryptoError>;
}

impl KeyUnwrapper for KeyPair {
    fn unwrap_session_key(&self, wrapped: &[u8]) -> std::result::Result<SessionKey, CryptoError> {
        let raw = ecies::unwrap_with(self, wrapped)?;
        SessionKey::from_slice(&raw).map_err(|_| CryptoError::decryption("ecies_unwrap"))
    }
}

#[derive(Clone, Copy)]
struct CacheEntry {
    key: SessionKey,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// Snapshot of cache counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub unwraps: u64,
    pub unwrap_failures: u64,
    pub expired: u64,
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    unwraps: AtomicU64,
    unwrap_failures: AtomicU64,
    expired: AtomicU64,
}

type Entries = RwLock<HashMap<String, CacheEntry>>;
type InFlight = Mutex<HashMap<String, Arc<OnceCell<SessionKey>>>>;

/// Removes the in-flight cell when its resolver finishes or is dropped
struct InFlightGuard<'a> {
    in_flight: &'a InFlight,
    wrapped_key: &'a str,
    cell: Arc<OnceCell<SessionKey>>,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if in_flight
            .get(self.wrapped_key)
            .map_or(false, |current| Arc::ptr_eq(current, &self.cell))
        {
            in_flight.remove(self.wrapped_key);
        }
    }
}

/// Wrapped-key to session-key cache with per-key single-flight
#[derive(Clone)]
pub struct SessionCache {
    entries: Arc<Entries>,
    in_flight: Arc<InFlight>,
    counters: Arc<Counters>,
    ttl: Duration,
}

impl SessionCache {
    pub fn new() -> Self {
        Self::with_ttl(Duration::from_secs(crate::config::DEFAULT_CACHE_TTL_SECS))
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            in_flight: Arc::new(Mutex::new(HashMap::new())),
            counters: Arc::new(Counters::default()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Return the session key for `wrapped_key`, unwrapping on a miss
    ///
    /// # Errors
    ///
    /// `EctError::SessionEstablish` when the wrapped key is not valid base64
    /// or does not unwrap under the server key. Nothing is cached then.
    pub async fn resolve(
        &self,
        wrapped_key: &str,
        unwrapper: &dyn KeyUnwrapper,
    ) -> Result<SessionKey> {
        if let Some(key) = self.get(wrapped_key).await {
            self.counters.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(key);
        }
        self.counters.misses.fetch_add(1, Ordering::Relaxed);

        let cell = {
            let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
            in_flight
                .entry(wrapped_key.to_string())
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .clone()
        };
        let guard = InFlightGuard {
            in_flight: &self.in_flight,
            wrapped_key,
            cell,
        };

        let result = guard
            .cell
            .get_or_try_init(|| self.unwrap_and_insert(wrapped_key, unwrapper))
            .await
            .copied();
        result
    }

    #[cfg(test)]
    fn in_flight_len(&self) -> usize {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    async fn unwrap_and_insert(
        &self,
        wrapped_key: &str,
        unwrapper: &dyn KeyUnwrapper,
    ) -> Result<SessionKey> {
        // A previous flight may have finished between our miss and taking the cell
        if let Some(key) = self.get(wrapped_key).await {
            return Ok(key);
        }

        let ciphertext = STANDARD.decode(wrapped_key).map_err(|e| {
            self.counters.unwrap_failures.fetch_add(1, Ordering::Relaxed);
            EctError::SessionEstablish(CryptoError::InvalidEncoding {
                field: "wrapped_key".to_string(),
                reason: format!("base64 decode error: {}", e),
            })
        })?;

        self.counters.unwraps.fetch_add(1, Ordering::Relaxed);
        let key = unwrapper.unwrap_session_key(&ciphertext).map_err(|e| {
            self.counters.unwrap_failures.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(
                target: "ectsm::security",
                session = %fingerprint(wrapped_key),
                "wrapped key could not be unwrapped"
            );
            EctError::SessionEstablish(e)
        })?;

        self.insert(wrapped_key, key).await;
        Ok(key)
    }

    /// Look up a live entry, dropping it if it has expired
    pub async fn get(&self, wrapped_key: &str) -> Option<SessionKey> {
        let now = Instant::now();
        {
            let entries = self.entries.read().await;
            match entries.get(wrapped_key) {
                Some(entry) if entry.is_live(now) => return Some(entry.key),
                Some(_) => {}
                None => return None,
            }
        }

        let mut entries = self.entries.write().await;
        if let Some(entry) = entries.get(wrapped_key) {
            if entry.is_live(now) {
                return Some(entry.key);
            }
            entries.remove(wrapped_key);
            self.counters.expired.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(session = %fingerprint(wrapped_key), "session key expired");
        }
        None
    }

    /// Insert or replace an entry; its TTL starts now
    pub async fn insert(&self, wrapped_key: &str, key: SessionKey) {
        let mut entries = self.entries.write().await;
        entries.insert(
            wrapped_key.to_string(),
            CacheEntry {
                key,
                expires_at: Instant::now() + self.ttl,
            },
        );
        tracing::info!(
            "🔑 Session key cached for session: {} (total keys: {})",
            fingerprint(wrapped_key),
            entries.len()
        );
    }

    /// Remove an entry, returning whether it was present
    pub async fn evict(&self, wrapped_key: &str) -> bool {
        let mut entries = self.entries.write().await;
        let removed = entries.remove(wrapped_key).is_some();
        if removed {
            tracing::info!(
                "🗑️  Session key evicted for session: {} (remaining: {})",
                fingerprint(wrapped_key),
                entries.len()
            );
        }
        removed
    }

    /// Drop every expired entry, returning how many were removed
    pub async fn purge_expired(&self) -> usize {
        purge(&self.entries, &self.counters).await
    }

    /// Number of stored entries, including expired ones not yet purged
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    pub async fn clear(&self) {
        let mut entries = self.entries.write().await;
        let count = entries.len();
        entries.clear();
        tracing::info!("🗑️  Cleared all session keys (count: {})", count);
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            unwraps: self.counters.unwraps.load(Ordering::Relaxed),
            unwrap_failures: self.counters.unwrap_failures.load(Ordering::Relaxed),
            expired: self.counters.expired.load(Ordering::Relaxed),
        }
    }

    /// Periodically purge expired entries
    ///
    /// The task holds only weak references and exits once every clone of
    /// the cache has been dropped.
    pub fn spawn_sweeper(&self, interval: Duration) -> JoinHandle<()> {
        let entries: Weak<Entries> = Arc::downgrade(&self.entries);
        let counters = Arc::downgrade(&self.counters);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let (Some(entries), Some(counters)) = (entries.upgrade(), counters.upgrade())
                else {
                    break;
                };
                let removed = purge(&entries, &counters).await;
                if removed > 0 {
                    tracing::debug!(removed, "swept expired session keys");
                }
            }
        })
    }
}

impl Default for SessionCache {
    fn default() -> Self {
        Self::new()
    }
}

async fn purge(entries: &Entries, counters: &Counters) -> usize {
    let now = Instant::now();
    let mut entries = entries.write().await;
    let before = entries.len();
    entries.retain(|_, entry| entry.is_live(now));
    let removed = before - entries.len();
    counters.expired.fetch_add(removed as u64, Ordering::Relaxed);
    removed
}
