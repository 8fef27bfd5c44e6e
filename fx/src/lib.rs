//! Ratecast FX Core
//!
//! Exchange rate cache and refresh engine sitting between query clients and a
//! rate-limited upstream provider.
//!
//! # Features
//!
//! - Single-snapshot rate cache with dual expiry (local TTL and provider window)
//! - Self-scheduling, single-flight refresh loop with fixed backoff
//! - Direct and cross-rate conversion against the cached snapshot
//! - Publisher seam for pushing every fresh snapshot to subscribers
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use ratecast_common::{Currency, SystemClock};
//! use ratecast_fx::{
//!     ConversionEngine, ExchangeRateApiClient, NoopPublisher, ProviderConfig, RateCache,
//!     RateCacheConfig, RefreshScheduler, SchedulerConfig,
//! };
//!
//! let clock = Arc::new(SystemClock);
//! let cache = Arc::new(RateCache::with_config(RateCacheConfig::default()));
//! let provider = Arc::new(ExchangeRateApiClient::new(ProviderConfig::new(
//!     "https://v6.exchangerate-api.com/v6",
//!     api_key,
//!     Currency::usd(),
//! ))?);
//!
//! let scheduler = RefreshScheduler::new(
//!     provider,
//!     cache.clone(),
//!     Arc::new(NoopPublisher),
//!     clock.clone(),
//!     SchedulerConfig::default(),
//! );
//! scheduler.start().await;
//!
//! let engine = ConversionEngine::new(cache, clock);
//! let quote = engine.convert(&Currency::eur(), &Currency::gbp(), 100.0)?;
//! ```

pub mod cache;
pub mod conversion;
pub mod error;
pub mod provider;
pub mod publisher;
pub mod scheduler;
pub mod snapshot;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use cache::{CacheEntry, CacheStats, RateCache, RateCacheConfig};
pub use conversion::{Conversion, ConversionEngine, RateQuote};
pub use error::{FxError, FxResult};
pub use provider::{ExchangeRateApiClient, ProviderConfig, RateProvider};
pub use publisher::{NoopPublisher, SnapshotPublisher};
pub use scheduler::{
    RefreshOutcome, RefreshScheduler, SchedulerConfig, SchedulerState, SchedulerStats,
};
pub use snapshot::{RatesPayload, Snapshot};
