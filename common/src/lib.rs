//! Ratecast Common Types
//!
//! Shared types used across the Ratecast workspace: validated currency codes,
//! currency pairs and the clock abstraction used by the rate cache and the
//! refresh scheduler.

pub mod currency;
pub mod error;
pub mod time;

pub use currency::*;
pub use error::*;
pub use time::*;
