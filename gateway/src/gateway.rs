//! Gateway composition: provider, cache, scheduler and HTTP surface.

use std::future::Future;
use std::sync::Arc;

use axum::Router;
use ratecast_common::{Clock, SystemClock};
use ratecast_fx::{
    ExchangeRateApiClient, FxResult, RateProvider, RefreshOutcome, SchedulerConfig,
};
use tokio::net::TcpListener;
use tracing::{info, instrument, warn};

use crate::config::GatewayConfig;
use crate::routes;
use crate::state::AppState;

/// The running service.
pub struct Gateway {
    config: GatewayConfig,
    state: AppState,
}

impl Gateway {
    /// Build a gateway talking to the configured ExchangeRate-API endpoint.
    pub fn new(config: GatewayConfig) -> FxResult<Self> {
        let provider = Arc::new(ExchangeRateApiClient::new(config.provider_config())?);
        Ok(Self::with_provider(config, provider, Arc::new(SystemClock)))
    }

    /// Build a gateway around any provider and clock.
    pub fn with_provider(
        config: GatewayConfig,
        provider: Arc<dyn RateProvider>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let state = AppState::build(
            provider,
            clock,
            config.cache_config(),
            SchedulerConfig::default(),
        );
        Self { config, state }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn router(&self) -> Router {
        routes::router(self.state.clone())
    }

    /// Bootstrap the cache and start the refresh loop.
    ///
    /// A failed bootstrap is logged, not returned: the service still comes up
    /// and answers `NOT_READY` until a refresh succeeds.
    #[instrument(skip(self))]
    pub async fn start(&self) -> RefreshOutcome {
        info!(
            base = %self.config.upstream.base_currency,
            cache_ttl_ms = self.config.cache_ttl.as_millis() as u64,
            "Starting rate gateway"
        );

        let outcome = self.state.scheduler.start().await;
        match &outcome {
            RefreshOutcome::Failed { error, retry_in } => warn!(
                error = %error,
                retry_in_ms = retry_in.as_millis() as u64,
                "Initial rate fetch failed, serving NOT_READY until it succeeds"
            ),
            other => info!(outcome = ?other, "Initial rate fetch done"),
        }
        outcome
    }

    /// Serve HTTP on `listener` until `shutdown` resolves.
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if let Ok(addr) = listener.local_addr() {
            info!(%addr, "Rate gateway listening");
        }
        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await
    }

    /// Stop the refresh loop.
    #[instrument(skip(self))]
    pub async fn stop(&self) {
        info!("Stopping rate gateway");
        self.state.scheduler.stop().await;
        info!("Rate gateway stopped");
    }
}
