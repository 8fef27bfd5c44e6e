//! Ratecast Gateway
//!
//! HTTP and WebSocket front for the cached exchange-rate snapshot. The gateway
//! owns the refresh scheduler; query handlers only ever read the cache.

pub mod config;
pub mod error;
pub mod gateway;
pub mod routes;
pub mod state;
pub mod ws;

pub use config::{ConfigError, GatewayConfig};
pub use error::ApiError;
pub use gateway::Gateway;
pub use state::AppState;
