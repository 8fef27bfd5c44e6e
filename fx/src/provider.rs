//! Rate provider trait and the ExchangeRate-API client.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use async_trait::async_trait;
use ratecast_common::{constants, Currency};
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use crate::error::{FxError, FxResult};
use crate::snapshot::Snapshot;

/// Provider name used when the vendor omits one.
pub const DEFAULT_PROVIDER_NAME: &str = "https://www.exchangerate-api.com";

/// Source of full rate snapshots.
///
/// Implementations are stateless with respect to the cache: they fetch and
/// normalize, nothing else.
#[async_trait]
pub trait RateProvider: Send + Sync {
    /// Get the provider name.
    fn name(&self) -> &str;

    /// Fetch the latest snapshot, classifying every failure.
    async fn fetch_snapshot(&self) -> FxResult<Snapshot>;
}

/// Configuration for [`ExchangeRateApiClient`].
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Endpoint prefix, e.g. `https://v6.exchangerate-api.com/v6`.
    pub endpoint: String,
    pub api_key: String,
    pub base_currency: Currency,
    /// Hard deadline for one call.
    pub timeout: Duration,
}

impl ProviderConfig {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>, base_currency: Currency) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            base_currency,
            timeout: constants::PROVIDER_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// HTTP client for `GET {endpoint}/{api_key}/latest/{base}`.
pub struct ExchangeRateApiClient {
    client: reqwest::Client,
    config: ProviderConfig,
}

impl ExchangeRateApiClient {
    pub fn new(config: ProviderConfig) -> FxResult<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| FxError::Network(format!("failed to build http client: {e}")))?;

        Ok(Self { client, config })
    }

    fn latest_url(&self) -> String {
        format!(
            "{}/{}/latest/{}",
            self.config.endpoint.trim_end_matches('/'),
            self.config.api_key,
            self.config.base_currency
        )
    }

    async fn request_latest(&self) -> FxResult<Snapshot> {
        let response = self
            .client
            .get(self.latest_url())
            .send()
            .await
            .map_err(|e| self.classify_transport(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FxError::Network(format!("provider returned HTTP {status}")));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| self.classify_transport(e))?;

        parse_latest(&body)
    }

    fn classify_transport(&self, err: reqwest::Error) -> FxError {
        if err.is_timeout() {
            return FxError::Timeout(self.config.timeout);
        }
        // reqwest errors carry the URL, which carries the API key.
        FxError::Network(err.without_url().to_string())
    }
}

#[async_trait]
impl RateProvider for ExchangeRateApiClient {
    fn name(&self) -> &str {
        "exchangerate-api"
    }

    #[instrument(skip(self), fields(base = %self.config.base_currency))]
    async fn fetch_snapshot(&self) -> FxResult<Snapshot> {
        debug!(endpoint = %self.config.endpoint, "Requesting latest rates");

        match tokio::time::timeout(self.config.timeout, self.request_latest()).await {
            Ok(result) => result,
            Err(_) => Err(FxError::Timeout(self.config.timeout)),
        }
    }
}

/// Vendor envelope, read first to tell success from failure.
#[derive(Debug, Deserialize)]
struct Envelope {
    result: Option<String>,
    #[serde(rename = "error-type")]
    error_type: Option<String>,
}

/// Vendor success body.
#[derive(Debug, Deserialize)]
struct LatestResponse {
    base_code: String,
    conversion_rates: HashMap<String, f64>,
    time_last_update_unix: i64,
    time_next_update_unix: i64,
    #[serde(default)]
    time_eol_unix: Option<i64>,
    #[serde(default)]
    documentation: String,
    #[serde(default)]
    terms_of_use: String,
    #[serde(default)]
    provider: Option<String>,
}

/// Normalize a vendor response body into a snapshot.
pub fn parse_latest(body: &[u8]) -> FxResult<Snapshot> {
    let value: serde_json::Value = serde_json::from_slice(body)
        .map_err(|e| FxError::MalformedResponse(format!("invalid JSON: {e}")))?;

    let envelope: Envelope = serde_json::from_value(value.clone())
        .map_err(|e| FxError::MalformedResponse(format!("invalid envelope: {e}")))?;

    match envelope.result.as_deref() {
        Some("success") => {}
        Some(_) => {
            let reason = envelope.error_type.unwrap_or_else(|| "unknown".to_string());
            return Err(FxError::ProviderError(reason));
        }
        None => {
            return Err(FxError::MalformedResponse("missing result field".to_string()));
        }
    }

    let latest: LatestResponse = serde_json::from_value(value)
        .map_err(|e| FxError::MalformedResponse(e.to_string()))?;

    let base_code = Currency::parse(&latest.base_code)
        .map_err(|_| FxError::MalformedResponse(format!("bad base_code {:?}", latest.base_code)))?;

    Ok(Snapshot {
        base_code,
        rates: normalize_rates(latest.conversion_rates),
        last_update_unix: latest.time_last_update_unix,
        next_update_unix: latest.time_next_update_unix,
        eol_unix: latest.time_eol_unix.unwrap_or(0),
        documentation: latest.documentation,
        terms_of_use: latest.terms_of_use,
        provider: latest
            .provider
            .unwrap_or_else(|| DEFAULT_PROVIDER_NAME.to_string()),
    })
}

fn normalize_rates(raw: HashMap<String, f64>) -> BTreeMap<Currency, f64> {
    let mut rates = BTreeMap::new();
    for (code, rate) in raw {
        let Ok(currency) = Currency::parse(&code) else {
            warn!(code = %code, "Skipping rate with invalid currency code");
            continue;
        };
        if !rate.is_finite() || rate < 0.0 {
            warn!(currency = %currency, rate, "Skipping unusable rate");
            continue;
        }
        rates.insert(currency, rate);
    }
    rates
}
