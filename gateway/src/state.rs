//! Shared application state, built once by the composition root.

use std::sync::Arc;

use ratecast_common::Clock;
use ratecast_fx::{
    ConversionEngine, RateCache, RateCacheConfig, RateProvider, RatesPayload, RefreshScheduler,
    SchedulerConfig,
};
use tokio::sync::broadcast;

/// Buffered payloads per push subscriber before it starts lagging.
const UPDATE_CHANNEL_CAPACITY: usize = 16;

/// Handles shared by the scheduler and every request handler.
#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<RateCache>,
    pub engine: Arc<ConversionEngine>,
    pub scheduler: Arc<RefreshScheduler>,
    pub updates: broadcast::Sender<RatesPayload>,
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    /// Wire cache, scheduler, engine and push channel around `provider`.
    pub fn build(
        provider: Arc<dyn RateProvider>,
        clock: Arc<dyn Clock>,
        cache_config: RateCacheConfig,
        scheduler_config: SchedulerConfig,
    ) -> Self {
        let cache = Arc::new(RateCache::with_config(cache_config));
        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);

        let scheduler = Arc::new(RefreshScheduler::new(
            provider,
            cache.clone(),
            Arc::new(updates.clone()),
            clock.clone(),
            scheduler_config,
        ));
        let engine = Arc::new(ConversionEngine::new(cache.clone(), clock.clone()));

        Self {
            cache,
            engine,
            scheduler,
            updates,
            clock,
        }
    }

    /// Current payload if a valid snapshot is cached.
    pub fn current_payload(&self) -> Option<RatesPayload> {
        self.cache.payload(self.clock.now_ms())
    }
}
