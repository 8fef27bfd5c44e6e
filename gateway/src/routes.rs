//! HTTP query endpoints.

use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use ratecast_common::Currency;
use ratecast_fx::{CacheStats, Conversion, FxError, RateQuote, RatesPayload, SchedulerState, SchedulerStats};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use crate::ws;

/// Build the gateway router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/rates", get(rates))
        .route("/rates/:currency", get(rate_of))
        .route("/convert", get(convert))
        .route("/ws", get(ws::subscribe))
        .with_state(state)
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub scheduler_state: SchedulerState,
    pub cache: CacheStats,
    pub refresh: SchedulerStats,
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let cache = state.cache.stats(state.clock.now_ms());
    let status = if cache.valid { "ok" } else { "not_ready" };

    Json(HealthResponse {
        status,
        scheduler_state: state.scheduler.state(),
        cache,
        refresh: state.scheduler.stats(),
    })
}

async fn rates(State(state): State<AppState>) -> ApiResult<Json<RatesPayload>> {
    state
        .current_payload()
        .map(Json)
        .ok_or(ApiError(FxError::CacheEmpty))
}

async fn rate_of(
    State(state): State<AppState>,
    Path(currency): Path<String>,
) -> ApiResult<Json<RateQuote>> {
    let currency = Currency::parse(&currency).map_err(FxError::from)?;
    Ok(Json(state.engine.rate_quote(&currency)?))
}

/// Raw `/convert` query; parsed by hand so bad input maps to our own errors.
#[derive(Debug, Deserialize)]
pub struct ConvertQuery {
    pub from: Option<String>,
    pub to: Option<String>,
    pub amount: Option<String>,
}

async fn convert(
    State(state): State<AppState>,
    Query(query): Query<ConvertQuery>,
) -> ApiResult<Json<Conversion>> {
    let from = query.from.unwrap_or_default();
    let to = query.to.unwrap_or_default();
    let amount = parse_amount(query.amount.as_deref())?;

    debug!(from = %from, to = %to, amount, "Conversion requested");
    Ok(Json(state.engine.convert_raw(&from, &to, amount)?))
}

/// Missing amount means one unit.
fn parse_amount(raw: Option<&str>) -> Result<f64, FxError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(1.0),
        Some(value) => value
            .parse::<f64>()
            .map_err(|_| FxError::InvalidAmount(format!("{value:?} is not a number"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use ratecast_common::{Clock, SystemClock};
    use ratecast_fx::testing::{snapshot_with, ScriptedProvider};
    use ratecast_fx::{RateCacheConfig, SchedulerConfig};
    use serde_json::Value;
    use tower::ServiceExt;

    fn state() -> AppState {
        AppState::build(
            Arc::new(ScriptedProvider::new(|_| {
                Err(FxError::ProviderError("unused".into()))
            })),
            Arc::new(SystemClock),
            RateCacheConfig {
                ttl: Duration::from_secs(60),
            },
            SchedulerConfig::default(),
        )
    }

    fn warm_state() -> AppState {
        let state = state();
        let now_ms = state.clock.now_ms();
        let now_unix = now_ms / 1000;
        state.cache.put(
            snapshot_with(
                "USD",
                &[("USD", 1.0), ("EUR", 0.90), ("ARS", 1000.0)],
                now_unix,
                now_unix + 3600,
            ),
            now_ms,
        );
        state
    }

    async fn get(state: AppState, uri: &str) -> (StatusCode, Value) {
        let response = router(state)
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health_reports_not_ready() {
        let (status, body) = get(state(), "/health").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "not_ready");
        assert_eq!(body["scheduler_state"], "IDLE");
        assert_eq!(body["cache"]["populated"], false);
    }

    #[tokio::test]
    async fn test_rates_not_ready() {
        let (status, body) = get(state(), "/rates").await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"], "NOT_READY");
    }

    #[tokio::test]
    async fn test_rates_payload() {
        let (status, body) = get(warm_state(), "/rates").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["base_code"], "USD");
        assert_eq!(body["rates"]["EUR"], 0.90);
        assert_eq!(body["cache_ttl_ms"], 60_000);
        assert!(body["expires_unix"].as_i64().unwrap() > body["as_of_unix"].as_i64().unwrap());
    }

    #[tokio::test]
    async fn test_rate_of_currency() {
        let (status, body) = get(warm_state(), "/rates/eur").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["base"], "USD");
        assert_eq!(body["currency"], "EUR");
        assert_eq!(body["rate"], 0.90);

        let (status, body) = get(warm_state(), "/rates/EURO").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "INVALID_CURRENCY_CODE");

        let (status, _) = get(warm_state(), "/rates/JPY").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = get(state(), "/rates/EUR").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_convert_cross_pair() {
        let (status, body) = get(warm_state(), "/convert?from=EUR&to=ARS&amount=10").await;

        assert_eq!(status, StatusCode::OK);
        let converted = body["converted"].as_f64().unwrap();
        assert!(((converted - 11_111.111_111) / 11_111.111_111).abs() < 1e-6);
        assert_eq!(body["amount"], 10.0);
    }

    #[tokio::test]
    async fn test_convert_defaults_to_one_unit() {
        let (status, body) = get(warm_state(), "/convert?from=USD&to=EUR").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["converted"], 0.90);
    }

    #[tokio::test]
    async fn test_convert_rejects_bad_input() {
        for uri in [
            "/convert?from=EUR&to=ARS&amount=-5",
            "/convert?from=EUR&to=ARS&amount=ten",
            "/convert?from=EUR&to=ARS&amount=inf",
            "/convert?from=EURO&to=ARS&amount=1",
            "/convert?to=ARS&amount=1",
        ] {
            let (status, _) = get(state(), uri).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        }
    }

    #[tokio::test]
    async fn test_convert_status_mapping() {
        let (status, _) = get(state(), "/convert?from=EUR&to=ARS&amount=1").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

        let (status, _) = get(warm_state(), "/convert?from=EUR&to=JPY&amount=1").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = get(state(), "/convert?from=XAU&to=xau&amount=3").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["converted"], 3.0);
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount(None), Ok(1.0));
        assert_eq!(parse_amount(Some(" 2.5 ")), Ok(2.5));
        assert!(parse_amount(Some("1,5")).is_err());
    }
}
