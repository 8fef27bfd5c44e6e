//! Gateway configuration.

use std::net::SocketAddr;
use std::time::Duration;

use ratecast_common::{constants, Currency};
use ratecast_fx::{ProviderConfig, RateCacheConfig};
use thiserror::Error;

/// Default provider endpoint prefix.
pub const DEFAULT_PROVIDER_ENDPOINT: &str = "https://v6.exchangerate-api.com/v6";

/// Startup misconfiguration. Always fatal.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required setting {0}")]
    Missing(&'static str),

    #[error("Invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Provider configuration.
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    /// Endpoint prefix, `{endpoint}/{api_key}/latest/{base}`.
    pub endpoint: String,
    pub api_key: String,
    pub base_currency: Currency,
    /// Hard deadline per provider call.
    pub timeout: Duration,
}

/// Main gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Listen address.
    pub listen_addr: String,
    /// Listen port.
    pub listen_port: u16,
    /// Local cache TTL.
    pub cache_ttl: Duration,
    /// Upstream provider settings.
    pub upstream: UpstreamConfig,
}

impl GatewayConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_key = get("EXCHANGE_API_KEY").ok_or(ConfigError::Missing("EXCHANGE_API_KEY"))?;

        let base_currency = match get("BASE_CURRENCY") {
            Some(code) => Currency::parse(&code).map_err(|e| ConfigError::Invalid {
                key: "BASE_CURRENCY",
                value: code,
                reason: e.to_string(),
            })?,
            None => Currency::usd(),
        };

        let cache_ttl_ms = parse_or("CACHE_TTL_MS", get("CACHE_TTL_MS"), constants::DEFAULT_CACHE_TTL_MS)?;
        let listen_port = parse_or("PORT", get("PORT"), 3000u16)?;

        let config = Self {
            listen_addr: get("LISTEN_ADDR").unwrap_or_else(|| "0.0.0.0".to_string()),
            listen_port,
            cache_ttl: Duration::from_millis(cache_ttl_ms),
            upstream: UpstreamConfig {
                endpoint: get("PROVIDER_ENDPOINT")
                    .unwrap_or_else(|| DEFAULT_PROVIDER_ENDPOINT.to_string()),
                api_key,
                base_currency,
                timeout: constants::PROVIDER_TIMEOUT,
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.listen_port == 0 {
            return Err(ConfigError::Invalid {
                key: "PORT",
                value: "0".to_string(),
                reason: "listen port cannot be 0".to_string(),
            });
        }

        if self.cache_ttl.is_zero() {
            return Err(ConfigError::Invalid {
                key: "CACHE_TTL_MS",
                value: "0".to_string(),
                reason: "cache TTL must be positive".to_string(),
            });
        }

        let endpoint = &self.upstream.endpoint;
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            return Err(ConfigError::Invalid {
                key: "PROVIDER_ENDPOINT",
                value: endpoint.clone(),
                reason: "endpoint must be an http(s) URL".to_string(),
            });
        }

        Ok(())
    }

    /// Socket address to bind.
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let raw = format!("{}:{}", self.listen_addr, self.listen_port);
        raw.parse().map_err(|_| ConfigError::Invalid {
            key: "LISTEN_ADDR",
            value: self.listen_addr.clone(),
            reason: "not an IP address".to_string(),
        })
    }

    pub fn cache_config(&self) -> RateCacheConfig {
        RateCacheConfig {
            ttl: self.cache_ttl,
        }
    }

    pub fn provider_config(&self) -> ProviderConfig {
        ProviderConfig::new(
            self.upstream.endpoint.clone(),
            self.upstream.api_key.clone(),
            self.upstream.base_currency.clone(),
        )
        .with_timeout(self.upstream.timeout)
    }
}

fn parse_or<T: std::str::FromStr>(
    key: &'static str,
    raw: Option<String>,
    default: T,
) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match raw {
        Some(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            value,
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}
