//! Rate snapshot types.

use std::collections::BTreeMap;

use ratecast_common::Currency;
use serde::{Deserialize, Serialize};

/// One immutable set of base-relative rates plus provider timing metadata.
///
/// Snapshots are never edited after construction; a refresh replaces the
/// cached snapshot wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Currency every rate is expressed against.
    pub base_code: Currency,
    /// Units of each currency per one unit of `base_code`.
    pub rates: BTreeMap<Currency, f64>,
    /// Provider's last update (unix seconds).
    pub last_update_unix: i64,
    /// Provider's next scheduled update (unix seconds).
    pub next_update_unix: i64,
    /// Provider end-of-life notice, 0 when none.
    pub eol_unix: i64,
    pub documentation: String,
    pub terms_of_use: String,
    pub provider: String,
}

impl Snapshot {
    /// Rate of `currency` relative to the base.
    pub fn rate_of(&self, currency: &Currency) -> Option<f64> {
        self.rates.get(currency).copied()
    }

    /// Rate converting one unit of `from` into `to`.
    ///
    /// Identity pairs are always 1, even for codes the snapshot does not
    /// carry. A zero rate on the `from` side never produces an infinite
    /// result; it is reported as unavailable.
    pub fn rate_between(&self, from: &Currency, to: &Currency) -> Option<f64> {
        if from == to {
            return Some(1.0);
        }
        if *from == self.base_code {
            return self.rate_of(to);
        }

        let from_rate = self.rate_of(from).filter(|rate| *rate != 0.0)?;
        if *to == self.base_code {
            return Some(1.0 / from_rate);
        }

        let to_rate = self.rate_of(to)?;
        Some(to_rate / from_rate)
    }

    /// Number of quoted currencies.
    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }
}

/// Snapshot plus cache metadata, as pushed to subscribers and served by
/// `GET /rates`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatesPayload {
    #[serde(flatten)]
    pub snapshot: Snapshot,
    /// When the snapshot was captured (server clock, unix seconds).
    pub as_of_unix: i64,
    /// Configured local TTL.
    pub cache_ttl_ms: u64,
    /// When the cached snapshot stops being served (unix seconds).
    pub expires_unix: i64,
}
