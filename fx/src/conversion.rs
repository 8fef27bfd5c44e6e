//! Read-side conversion against the cached snapshot.

use std::sync::Arc;

use ratecast_common::{Clock, Currency, CurrencyPair};
use serde::{Deserialize, Serialize};

use crate::cache::{CacheEntry, RateCache};
use crate::error::{FxError, FxResult};
use crate::snapshot::Snapshot;

/// Result of converting an amount between two currencies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversion {
    pub from: Currency,
    pub to: Currency,
    /// Input amount in `from`.
    pub amount: f64,
    /// Units of `to` per unit of `from`.
    pub rate: f64,
    /// `amount * rate`, unrounded.
    pub converted: f64,
}

/// Base-relative rate of one currency, with the snapshot it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateQuote {
    pub base: Currency,
    pub currency: Currency,
    pub rate: f64,
    pub as_of_unix: i64,
    pub expires_at_ms: i64,
}

/// Computes direct and cross rates from the cached snapshot.
///
/// Never calls the provider. Every lookup reads the cache once, so a single
/// answer is always computed from a single snapshot.
pub struct ConversionEngine {
    cache: Arc<RateCache>,
    clock: Arc<dyn Clock>,
}

impl ConversionEngine {
    pub fn new(cache: Arc<RateCache>, clock: Arc<dyn Clock>) -> Self {
        Self { cache, clock }
    }

    /// Current valid cache entry, or `CacheEmpty`.
    pub fn entry(&self) -> FxResult<Arc<CacheEntry>> {
        self.cache
            .valid_entry(self.clock.now_ms())
            .ok_or(FxError::CacheEmpty)
    }

    /// Current valid snapshot, or `CacheEmpty`.
    pub fn snapshot(&self) -> FxResult<Arc<Snapshot>> {
        self.entry().map(|entry| entry.snapshot.clone())
    }

    /// Rate of `currency` relative to the snapshot base.
    pub fn rate_of(&self, currency: &Currency) -> FxResult<f64> {
        self.rate_quote(currency).map(|quote| quote.rate)
    }

    /// Like [`rate_of`](Self::rate_of), keeping the snapshot metadata.
    pub fn rate_quote(&self, currency: &Currency) -> FxResult<RateQuote> {
        let entry = self.entry()?;
        let snapshot = &entry.snapshot;
        let rate = snapshot.rate_of(currency).ok_or_else(|| {
            FxError::RateUnavailable(CurrencyPair::new(
                snapshot.base_code.clone(),
                currency.clone(),
            ))
        })?;

        Ok(RateQuote {
            base: snapshot.base_code.clone(),
            currency: currency.clone(),
            rate,
            as_of_unix: entry.as_of_unix,
            expires_at_ms: entry.expires_at_ms,
        })
    }

    /// Rate converting one unit of `from` into `to`.
    ///
    /// Identity pairs answer 1 without reading the cache, so they work before
    /// the first refresh and for codes the provider does not quote.
    pub fn rate_between(&self, from: &Currency, to: &Currency) -> FxResult<f64> {
        if from == to {
            return Ok(1.0);
        }

        let snapshot = self.snapshot()?;
        snapshot
            .rate_between(from, to)
            .ok_or_else(|| FxError::RateUnavailable(CurrencyPair::new(from.clone(), to.clone())))
    }

    /// Convert `amount` units of `from` into `to`.
    pub fn convert(&self, from: &Currency, to: &Currency, amount: f64) -> FxResult<Conversion> {
        validate_amount(amount)?;
        let rate = self.rate_between(from, to)?;

        Ok(Conversion {
            from: from.clone(),
            to: to.clone(),
            amount,
            rate,
            converted: amount * rate,
        })
    }

    /// Parse codes and amount from raw query input, then convert.
    pub fn convert_raw(&self, from: &str, to: &str, amount: f64) -> FxResult<Conversion> {
        let from = Currency::parse(from)?;
        let to = Currency::parse(to)?;
        self.convert(&from, &to, amount)
    }
}

fn validate_amount(amount: f64) -> FxResult<()> {
    if !amount.is_finite() {
        return Err(FxError::InvalidAmount(format!("{amount} is not finite")));
    }
    if amount < 0.0 {
        return Err(FxError::InvalidAmount(format!("{amount} is negative")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::RateCacheConfig;
    use crate::testing::snapshot_with;
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicI64, Ordering};
    use std::time::Duration;

    const NOW_MS: i64 = 1_700_000_000_000;
    const NOW_UNIX: i64 = 1_700_000_000;

    struct FixedClock(AtomicI64);

    impl Clock for FixedClock {
        fn now_ms(&self) -> i64 {
            self.0.load(Ordering::SeqCst)
        }
    }

    fn code(s: &str) -> Currency {
        Currency::parse(s).unwrap()
    }

    fn empty_engine() -> (ConversionEngine, Arc<RateCache>, Arc<FixedClock>) {
        let cache = Arc::new(RateCache::with_config(RateCacheConfig {
            ttl: Duration::from_secs(60),
        }));
        let clock = Arc::new(FixedClock(AtomicI64::new(NOW_MS)));
        (
            ConversionEngine::new(cache.clone(), clock.clone()),
            cache,
            clock,
        )
    }

    fn engine() -> (ConversionEngine, Arc<FixedClock>) {
        let (engine, cache, clock) = empty_engine();
        cache.put(
            snapshot_with(
                "USD",
                &[("EUR", 0.90), ("ARS", 1000.0), ("ZWL", 0.0)],
                NOW_UNIX - 60,
                NOW_UNIX + 3600,
            ),
            NOW_MS,
        );
        (engine, clock)
    }

    #[test]
    fn test_rate_of() {
        let (engine, _) = engine();
        assert_eq!(engine.rate_of(&code("EUR")).unwrap(), 0.90);
        assert!(matches!(
            engine.rate_of(&code("JPY")),
            Err(FxError::RateUnavailable(_))
        ));
    }

    #[test]
    fn test_rate_quote_metadata() {
        let (engine, _) = engine();
        let quote = engine.rate_quote(&code("ARS")).unwrap();

        assert_eq!(quote.base, code("USD"));
        assert_eq!(quote.rate, 1000.0);
        assert_eq!(quote.as_of_unix, NOW_UNIX);
        assert_eq!(quote.expires_at_ms, NOW_MS + 60_000);
    }

    #[test]
    fn test_rate_of_on_empty_cache() {
        let (engine, _, _) = empty_engine();
        assert_eq!(engine.rate_of(&code("EUR")), Err(FxError::CacheEmpty));
    }

    #[test]
    fn test_rate_between_rules() {
        let (engine, _) = engine();

        assert_eq!(engine.rate_between(&code("USD"), &code("EUR")).unwrap(), 0.90);
        assert_eq!(
            engine.rate_between(&code("EUR"), &code("USD")).unwrap(),
            1.0 / 0.90
        );
        assert_eq!(
            engine.rate_between(&code("EUR"), &code("ARS")).unwrap(),
            1000.0 / 0.90
        );
    }

    #[test]
    fn test_zero_rate_to_base_is_unavailable() {
        let (engine, _) = engine();
        let err = engine.rate_between(&code("ZWL"), &code("USD")).unwrap_err();
        assert_eq!(
            err,
            FxError::RateUnavailable(CurrencyPair::new(code("ZWL"), code("USD")))
        );
    }

    #[test]
    fn test_identity_skips_cache() {
        let (engine, _, _) = empty_engine();
        assert_eq!(engine.rate_between(&code("XYZ"), &code("XYZ")).unwrap(), 1.0);

        let conversion = engine.convert(&code("EUR"), &code("EUR"), 42.5).unwrap();
        assert_eq!(conversion.converted, 42.5);
    }

    #[test]
    fn test_convert_cross_pair() {
        let (engine, _) = engine();
        let conversion = engine.convert(&code("EUR"), &code("ARS"), 10.0).unwrap();

        let expected_rate = 1111.111_111_111_111;
        let expected_converted = 11_111.111_111_111_11;
        assert!(((conversion.rate - expected_rate) / expected_rate).abs() < 1e-6);
        assert!(((conversion.converted - expected_converted) / expected_converted).abs() < 1e-6);
        assert_eq!(conversion.from, code("EUR"));
        assert_eq!(conversion.to, code("ARS"));
    }

    #[test]
    fn test_convert_zero_amount() {
        let (engine, _) = engine();
        let conversion = engine.convert(&code("USD"), &code("EUR"), 0.0).unwrap();
        assert_eq!(conversion.converted, 0.0);
    }

    #[test]
    fn test_invalid_amount_rejected_before_cache() {
        let (engine, _, _) = empty_engine();

        for amount in [-1.0, f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let err = engine.convert(&code("USD"), &code("EUR"), amount).unwrap_err();
            assert!(matches!(err, FxError::InvalidAmount(_)), "{amount}");
        }
    }

    #[test]
    fn test_convert_raw_rejects_bad_codes() {
        let (engine, _) = engine();

        assert_eq!(
            engine.convert_raw("EURO", "USD", 1.0),
            Err(FxError::InvalidCurrencyCode("EURO".into()))
        );
        assert!(engine.convert_raw("eur", "usd", 1.0).is_ok());
    }

    #[test]
    fn test_expired_snapshot_reads_as_empty() {
        let (engine, clock) = engine();
        clock.0.store(NOW_MS + 60_000, Ordering::SeqCst);

        assert_eq!(
            engine.rate_between(&code("USD"), &code("EUR")),
            Err(FxError::CacheEmpty)
        );
        // identity is still answered
        assert_eq!(engine.rate_between(&code("USD"), &code("USD")), Ok(1.0));
    }

    proptest! {
        #[test]
        fn prop_identity_is_one(code_str in "[A-Z]{3}") {
            let (engine, _) = engine();
            let currency = code(&code_str);
            prop_assert_eq!(engine.rate_between(&currency, &currency).unwrap(), 1.0);
        }
    }
}
