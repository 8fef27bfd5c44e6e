//! Single-snapshot rate cache with dual expiry.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use ratecast_common::{constants, ms_to_unix, unix_to_ms};
use serde::Serialize;
use tracing::debug;

use crate::snapshot::{RatesPayload, Snapshot};

/// Cached snapshot together with its validity metadata.
///
/// The snapshot and its expiry live in one immutable value so that they are
/// always swapped together.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub snapshot: Arc<Snapshot>,
    /// Capture time (server clock, unix seconds).
    pub as_of_unix: i64,
    /// `min(as_of + ttl, provider next update)`, never before `as_of`.
    pub expires_at_ms: i64,
}

impl CacheEntry {
    fn new(snapshot: Snapshot, now_ms: i64, ttl: Duration) -> Self {
        let as_of_unix = ms_to_unix(now_ms);
        let expires_at_ms = expiry_ms(as_of_unix, ttl, snapshot.next_update_unix);

        Self {
            snapshot: Arc::new(snapshot),
            as_of_unix,
            expires_at_ms,
        }
    }

    /// Valid strictly before `expires_at_ms`.
    pub fn is_valid(&self, now_ms: i64) -> bool {
        now_ms < self.expires_at_ms
    }

    /// Build the subscriber payload for this entry.
    pub fn payload(&self, ttl: Duration) -> RatesPayload {
        RatesPayload {
            snapshot: self.snapshot.as_ref().clone(),
            as_of_unix: self.as_of_unix,
            cache_ttl_ms: ttl.as_millis() as u64,
            expires_unix: ms_to_unix(self.expires_at_ms),
        }
    }
}

/// Expiry for a snapshot captured at `as_of_unix`.
///
/// A provider window already in the past clamps to `as_of_unix * 1000`.
pub fn expiry_ms(as_of_unix: i64, ttl: Duration, next_update_unix: i64) -> i64 {
    let as_of_ms = unix_to_ms(as_of_unix);
    let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
    let ttl_bound = as_of_ms.saturating_add(ttl_ms);
    let provider_bound = unix_to_ms(next_update_unix);

    ttl_bound.min(provider_bound).max(as_of_ms)
}

/// Configuration for rate cache.
#[derive(Debug, Clone)]
pub struct RateCacheConfig {
    /// Maximum local lifetime of a snapshot.
    pub ttl: Duration,
}

impl Default for RateCacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_millis(constants::DEFAULT_CACHE_TTL_MS),
        }
    }
}

/// Thread-safe holder of the current snapshot.
///
/// Readers clone an `Arc` under a short read lock; `put` swaps the whole
/// entry under the write lock, so no reader ever sees new rates paired with
/// an old expiry.
pub struct RateCache {
    entry: RwLock<Option<Arc<CacheEntry>>>,
    config: RateCacheConfig,
}

impl RateCache {
    /// Create a new rate cache with default configuration.
    pub fn new() -> Self {
        Self::with_config(RateCacheConfig::default())
    }

    /// Create a new rate cache with custom configuration.
    pub fn with_config(config: RateCacheConfig) -> Self {
        Self {
            entry: RwLock::new(None),
            config,
        }
    }

    /// Get the snapshot if it is still valid at `now_ms`.
    pub fn get(&self, now_ms: i64) -> Option<Arc<Snapshot>> {
        self.valid_entry(now_ms).map(|entry| entry.snapshot.clone())
    }

    /// Get the whole entry if it is still valid at `now_ms`.
    pub fn valid_entry(&self, now_ms: i64) -> Option<Arc<CacheEntry>> {
        let entry = self.entry()?;
        if entry.is_valid(now_ms) {
            Some(entry)
        } else {
            debug!(
                expires_at_ms = entry.expires_at_ms,
                now_ms, "Cached snapshot expired"
            );
            None
        }
    }

    /// Get the stored entry regardless of expiry.
    pub fn entry(&self) -> Option<Arc<CacheEntry>> {
        self.entry.read().clone()
    }

    /// Replace the cached snapshot, returning the new entry.
    pub fn put(&self, snapshot: Snapshot, now_ms: i64) -> Arc<CacheEntry> {
        let entry = Arc::new(CacheEntry::new(snapshot, now_ms, self.config.ttl));
        *self.entry.write() = Some(entry.clone());

        debug!(
            base = %entry.snapshot.base_code,
            currencies = entry.snapshot.len(),
            as_of_unix = entry.as_of_unix,
            expires_at_ms = entry.expires_at_ms,
            "Cached new snapshot"
        );

        entry
    }

    /// Subscriber payload for the current entry, if still valid.
    pub fn payload(&self, now_ms: i64) -> Option<RatesPayload> {
        self.valid_entry(now_ms)
            .map(|entry| entry.payload(self.config.ttl))
    }

    /// True until the first `put`.
    pub fn is_empty(&self) -> bool {
        self.entry.read().is_none()
    }

    /// Configured TTL.
    pub fn ttl(&self) -> Duration {
        self.config.ttl
    }

    /// Get cache statistics.
    pub fn stats(&self, now_ms: i64) -> CacheStats {
        match self.entry() {
            Some(entry) => CacheStats {
                populated: true,
                valid: entry.is_valid(now_ms),
                currencies: entry.snapshot.len(),
                as_of_unix: Some(entry.as_of_unix),
                expires_at_ms: Some(entry.expires_at_ms),
            },
            None => CacheStats::default(),
        }
    }
}

impl Default for RateCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Cache statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    pub populated: bool,
    pub valid: bool,
    pub currencies: usize,
    pub as_of_unix: Option<i64>,
    pub expires_at_ms: Option<i64>,
}
