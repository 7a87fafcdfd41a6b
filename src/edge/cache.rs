//! Edge response cache.
//!
//! # Responsibilities
//! - Hold static responses keyed by request signature until their TTL
//! - Expire lazily on read and periodically via the sweeper
//! - Invalidate by path pattern
//!
//! # Design Decisions
//! - No single-flight: concurrent misses may each fetch from the origin
//! - `tokio::time::Instant` so expiry follows the runtime clock

use axum::http::StatusCode;
use bytes::Bytes;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::Instant;

use crate::observability::metrics;
use crate::routing::PathPattern;

/// Longest TTL a binding may configure (one year).
pub const MAX_TTL_SECS: u64 = 31_536_000;

/// Request signature: binding, full path with query, selected header values.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub binding: String,
    pub path_and_query: String,
    pub headers: Vec<(String, String)>,
}

impl CacheKey {
    fn path(&self) -> &str {
        self.path_and_query
            .split_once('?')
            .map(|(path, _)| path)
            .unwrap_or(&self.path_and_query)
    }
}

#[derive(Debug, Clone)]
pub struct CachedResponse {
    pub status: StatusCode,
    pub content_type: String,
    pub body: Bytes,
    pub stored_at: Instant,
    pub expires_at: Instant,
}

impl CachedResponse {
    /// Whole seconds since the entry was stored.
    pub fn age(&self) -> u64 {
        self.stored_at.elapsed().as_secs()
    }
}

#[derive(Debug, Default)]
pub struct ResponseCache {
    entries: DashMap<CacheKey, CachedResponse>,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fresh entry for `key`, dropping it if expired.
    pub fn get(&self, key: &CacheKey) -> Option<CachedResponse> {
        let now = Instant::now();
        let entry = self.entries.get(key)?;
        if entry.expires_at > now {
            return Some(entry.value().clone());
        }
        // Release the shard read lock before removing.
        drop(entry);
        self.entries.remove_if(key, |_, v| v.expires_at <= now);
        None
    }

    pub fn insert(
        &self,
        key: CacheKey,
        status: StatusCode,
        content_type: String,
        body: Bytes,
        ttl: Duration,
    ) {
        let now = Instant::now();
        let Some(expires_at) = now.checked_add(ttl) else {
            tracing::warn!(path = %key.path_and_query, ttl_secs = ttl.as_secs(), "TTL out of range, response not cached");
            return;
        };
        self.entries.insert(
            key,
            CachedResponse {
                status,
                content_type,
                body,
                stored_at: now,
                expires_at,
            },
        );
        metrics::record_cache_entries(self.entries.len());
    }

    /// Remove entries past their TTL; returns how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, v| v.expires_at > now);
        let removed = before.saturating_sub(self.entries.len());
        metrics::record_cache_entries(self.entries.len());
        removed
    }

    /// Remove entries whose request path matches `pattern`.
    pub fn invalidate(&self, pattern: &PathPattern) -> usize {
        let before = self.entries.len();
        self.entries.retain(|k, _| !pattern.matches(k.path()));
        let removed = before.saturating_sub(self.entries.len());
        tracing::info!(pattern = %pattern, removed, "Cache invalidated");
        metrics::record_cache_entries(self.entries.len());
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Periodically purge expired entries until shutdown.
pub async fn run_sweeper(
    cache: Arc<ResponseCache>,
    interval: Duration,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let removed = cache.purge_expired();
                if removed > 0 {
                    tracing::debug!(removed, remaining = cache.len(), "Expired cache entries swept");
                }
            }
            _ = shutdown.recv() => {
                tracing::info!("Cache sweeper received shutdown signal, exiting loop");
                break;
            }
        }
    }
}
