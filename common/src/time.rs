//! Time utilities for Ratecast.
//!
//! All cache arithmetic is done in integer unix milliseconds. The [`Clock`]
//! trait lets the scheduler and the read paths share one notion of "now",
//! which tests replace with a deterministic source.

use chrono::Utc;

/// Timing constants.
pub mod constants {
    use std::time::Duration;

    /// Hard deadline for one upstream provider call (10 seconds).
    pub const PROVIDER_TIMEOUT: Duration = Duration::from_secs(10);

    /// Retry delay after a failed steady-state refresh (15 seconds).
    pub const REFRESH_BACKOFF: Duration = Duration::from_secs(15);

    /// Retry delay after a failed bootstrap refresh (5 seconds).
    pub const BOOTSTRAP_RETRY: Duration = Duration::from_secs(5);

    /// Lower bound on any re-arm delay (1 second).
    pub const MIN_REFRESH_DELAY: Duration = Duration::from_secs(1);

    /// Default local cache TTL in milliseconds.
    pub const DEFAULT_CACHE_TTL_MS: u64 = 60_000;
}

/// Source of wall-clock time in unix milliseconds.
pub trait Clock: Send + Sync {
    /// Current time in unix milliseconds.
    fn now_ms(&self) -> i64;

    /// Current time in whole unix seconds.
    fn now_unix(&self) -> i64 {
        self.now_ms().div_euclid(1000)
    }
}

/// Clock backed by the system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// Convert unix seconds to unix milliseconds, saturating on overflow.
pub fn unix_to_ms(unix: i64) -> i64 {
    unix.saturating_mul(1000)
}

/// Convert unix milliseconds to whole unix seconds.
pub fn ms_to_unix(ms: i64) -> i64 {
    ms.div_euclid(1000)
}

/// Milliseconds from `now_ms` until `deadline_ms`, zero if already passed.
pub fn remaining_ms(deadline_ms: i64, now_ms: i64) -> u64 {
    u64::try_from(deadline_ms.saturating_sub(now_ms)).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock_is_consistent() {
        let clock = SystemClock;
        let ms = clock.now_ms();
        let unix = clock.now_unix();
        assert!((ms / 1000 - unix).abs() <= 1);
        assert!(unix > 1_600_000_000);
    }

    #[test]
    fn test_unix_conversions() {
        assert_eq!(unix_to_ms(1_700_000_000), 1_700_000_000_000);
        assert_eq!(ms_to_unix(1_700_000_000_999), 1_700_000_000);
        assert_eq!(unix_to_ms(i64::MAX), i64::MAX);
    }

    #[test]
    fn test_remaining_ms() {
        assert_eq!(remaining_ms(5_000, 2_000), 3_000);
        assert_eq!(remaining_ms(2_000, 5_000), 0);
    }
}
