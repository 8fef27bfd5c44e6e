//! Self-scheduling refresh loop that keeps the rate cache warm.
//!
//! The scheduler is a small state machine:
//!
//! ```text
//! IDLE -> FETCHING -> IDLE     (success: re-arm for the cache validity window)
//!                  -> BACKOFF  (failure: re-arm for a fixed backoff)
//! any  -> STOPPED              (explicit stop)
//! ```
//!
//! The state doubles as the single-flight guard: a refresh only starts by
//! moving out of a non-`Fetching` state under the write lock, so at most one
//! provider call is ever outstanding.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use ratecast_common::{constants, remaining_ms, Clock};
use serde::Serialize;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::cache::RateCache;
use crate::error::FxError;
use crate::provider::RateProvider;
use crate::publisher::SnapshotPublisher;

/// Scheduler operational state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SchedulerState {
    /// Waiting for the next wake-up after a success (or before the first fetch).
    Idle,
    /// A provider call is outstanding.
    Fetching,
    /// Waiting out the retry delay after a failure.
    Backoff,
    /// Stopped; no further fetches.
    Stopped,
}

/// Timing configuration for the refresh loop.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Delay after a failed steady-state refresh.
    pub backoff: Duration,
    /// Delay after a failed bootstrap refresh.
    pub bootstrap_retry: Duration,
    /// Floor for every success re-arm.
    pub min_delay: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            backoff: constants::REFRESH_BACKOFF,
            bootstrap_retry: constants::BOOTSTRAP_RETRY,
            min_delay: constants::MIN_REFRESH_DELAY,
        }
    }
}

/// What a single refresh attempt did, and when to try again.
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    /// Fetched and cached a new snapshot.
    Refreshed { next_in: Duration },
    /// Cache was still valid; no provider call was made.
    StillFresh { next_in: Duration },
    /// Provider call failed; cache untouched.
    Failed { error: FxError, retry_in: Duration },
    /// Another refresh was already in flight.
    InFlight,
    /// Scheduler has been stopped.
    Stopped,
}

impl RefreshOutcome {
    /// Delay before the next attempt, `None` once stopped.
    pub fn next_delay(&self, config: &SchedulerConfig) -> Option<Duration> {
        match self {
            RefreshOutcome::Refreshed { next_in } | RefreshOutcome::StillFresh { next_in } => {
                Some(*next_in)
            }
            RefreshOutcome::Failed { retry_in, .. } => Some(*retry_in),
            RefreshOutcome::InFlight => Some(config.min_delay),
            RefreshOutcome::Stopped => None,
        }
    }
}

/// Refresh counters.
#[derive(Debug, Default)]
struct Counters {
    attempts: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
    skipped_fresh: AtomicU64,
    skipped_in_flight: AtomicU64,
}

/// Point-in-time copy of the refresh counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SchedulerStats {
    pub attempts: u64,
    pub successes: u64,
    pub failures: u64,
    pub skipped_fresh: u64,
    pub skipped_in_flight: u64,
}

struct SchedulerInner {
    provider: Arc<dyn RateProvider>,
    cache: Arc<RateCache>,
    publisher: Arc<dyn SnapshotPublisher>,
    clock: Arc<dyn Clock>,
    config: SchedulerConfig,
    state: RwLock<SchedulerState>,
    counters: Counters,
    wake: Notify,
}

/// Resets `Fetching` back to `Idle` if a refresh future is dropped mid-call.
struct FetchGuard<'a> {
    state: &'a RwLock<SchedulerState>,
    armed: bool,
}

impl Drop for FetchGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            let mut state = self.state.write();
            if *state == SchedulerState::Fetching {
                *state = SchedulerState::Idle;
            }
        }
    }
}

impl SchedulerInner {
    #[instrument(skip(self), fields(provider = self.provider.name()))]
    async fn refresh(&self, bootstrap: bool) -> RefreshOutcome {
        {
            let mut state = self.state.write();
            match *state {
                SchedulerState::Stopped => return RefreshOutcome::Stopped,
                SchedulerState::Fetching => {
                    self.counters.skipped_in_flight.fetch_add(1, Ordering::Relaxed);
                    debug!("Refresh already in flight");
                    return RefreshOutcome::InFlight;
                }
                SchedulerState::Idle | SchedulerState::Backoff => {}
            }

            let now_ms = self.clock.now_ms();
            if let Some(entry) = self.cache.valid_entry(now_ms) {
                self.counters.skipped_fresh.fetch_add(1, Ordering::Relaxed);
                *state = SchedulerState::Idle;
                let next_in = self.delay_until(entry.expires_at_ms, now_ms);
                debug!(next_in_ms = next_in.as_millis() as u64, "Cache still fresh, skipping fetch");
                return RefreshOutcome::StillFresh { next_in };
            }

            *state = SchedulerState::Fetching;
        }

        let mut guard = FetchGuard {
            state: &self.state,
            armed: true,
        };
        self.counters.attempts.fetch_add(1, Ordering::Relaxed);

        let result = self.provider.fetch_snapshot().await;
        guard.armed = false;

        match result {
            Ok(snapshot) => {
                let now_ms = self.clock.now_ms();
                let entry = self.cache.put(snapshot, now_ms);
                self.counters.successes.fetch_add(1, Ordering::Relaxed);
                self.transition(SchedulerState::Idle);

                self.publisher.publish(entry.payload(self.cache.ttl()));

                let next_in = self.delay_until(entry.expires_at_ms, now_ms);
                info!(
                    base = %entry.snapshot.base_code,
                    currencies = entry.snapshot.len(),
                    as_of_unix = entry.as_of_unix,
                    expires_at_ms = entry.expires_at_ms,
                    next_in_ms = next_in.as_millis() as u64,
                    "Rates refreshed"
                );
                RefreshOutcome::Refreshed { next_in }
            }
            Err(error) => {
                self.counters.failures.fetch_add(1, Ordering::Relaxed);
                self.transition(SchedulerState::Backoff);

                let retry_in = if bootstrap {
                    self.config.bootstrap_retry
                } else {
                    self.config.backoff
                };
                warn!(
                    error = %error,
                    code = error.error_code(),
                    bootstrap,
                    cache_empty = self.cache.is_empty(),
                    retry_in_ms = retry_in.as_millis() as u64,
                    "Rate refresh failed"
                );
                RefreshOutcome::Failed { error, retry_in }
            }
        }
    }

    /// Move to `next` unless stopped meanwhile.
    fn transition(&self, next: SchedulerState) {
        let mut state = self.state.write();
        if *state != SchedulerState::Stopped {
            *state = next;
        }
    }

    fn delay_until(&self, deadline_ms: i64, now_ms: i64) -> Duration {
        Duration::from_millis(remaining_ms(deadline_ms, now_ms)).max(self.config.min_delay)
    }

    async fn run(self: Arc<Self>, mut delay: Duration, mut shutdown: watch::Receiver<bool>) {
        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                _ = shutdown.changed() => break,
                _ = tokio::time::sleep(delay) => {}
                _ = self.wake.notified() => debug!("Refresh wake-up requested"),
            }

            let outcome = tokio::select! {
                _ = shutdown.changed() => break,
                outcome = self.refresh(false) => outcome,
            };

            match outcome.next_delay(&self.config) {
                Some(next) => delay = next,
                None => break,
            }
        }

        debug!("Refresh loop exited");
    }
}

/// Keeps the rate cache warm with at most one outstanding provider call.
pub struct RefreshScheduler {
    inner: Arc<SchedulerInner>,
    shutdown_tx: watch::Sender<bool>,
    started: AtomicBool,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl RefreshScheduler {
    pub fn new(
        provider: Arc<dyn RateProvider>,
        cache: Arc<RateCache>,
        publisher: Arc<dyn SnapshotPublisher>,
        clock: Arc<dyn Clock>,
        config: SchedulerConfig,
    ) -> Self {
        let (shutdown_tx, _) = watch::channel(false);

        Self {
            inner: Arc::new(SchedulerInner {
                provider,
                cache,
                publisher,
                clock,
                config,
                state: RwLock::new(SchedulerState::Idle),
                counters: Counters::default(),
                wake: Notify::new(),
            }),
            shutdown_tx,
            started: AtomicBool::new(false),
            task: Mutex::new(None),
        }
    }

    /// Run the bootstrap refresh, then spawn the background loop.
    ///
    /// Bootstrap failure is not fatal: the loop retries after the shorter
    /// bootstrap delay. Only the first call starts anything; later or
    /// concurrent calls return `InFlight` at once.
    #[instrument(skip(self))]
    pub async fn start(&self) -> RefreshOutcome {
        if self.started.swap(true, Ordering::AcqRel) {
            debug!("Refresh scheduler already started");
            return RefreshOutcome::InFlight;
        }

        info!("Starting refresh scheduler");
        let mut shutdown = self.shutdown_tx.subscribe();

        let outcome = tokio::select! {
            _ = shutdown.changed() => RefreshOutcome::Stopped,
            outcome = self.inner.refresh(true) => outcome,
        };

        let Some(delay) = outcome.next_delay(&self.inner.config) else {
            return outcome;
        };

        let inner = self.inner.clone();
        let handle = tokio::spawn(inner.run(delay, shutdown));
        *self.task.lock() = Some(handle);

        outcome
    }

    /// Attempt a refresh right now, honoring single-flight and freshness.
    pub async fn refresh_now(&self) -> RefreshOutcome {
        self.inner.refresh(false).await
    }

    /// Nudge an idle loop to re-check the cache now.
    ///
    /// Only honored in `Idle`: a backoff always runs its full length. A
    /// wake-up with no loop waiting is dropped, never stored for later.
    pub fn wake(&self) {
        match self.state() {
            SchedulerState::Idle => self.inner.wake.notify_waiters(),
            state => debug!(?state, "Ignoring wake-up"),
        }
    }

    /// Stop the loop, cancelling the pending timer and any in-flight call.
    ///
    /// Returns once the background task has exited.
    #[instrument(skip(self))]
    pub async fn stop(&self) {
        *self.inner.state.write() = SchedulerState::Stopped;
        let _ = self.shutdown_tx.send(true);

        let handle = self.task.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(error = %e, "Refresh loop ended abnormally");
            }
        }

        info!("Refresh scheduler stopped");
    }

    /// Get the current scheduler state.
    pub fn state(&self) -> SchedulerState {
        *self.inner.state.read()
    }

    /// Get refresh statistics.
    pub fn stats(&self) -> SchedulerStats {
        let c = &self.inner.counters;
        SchedulerStats {
            attempts: c.attempts.load(Ordering::Relaxed),
            successes: c.successes.load(Ordering::Relaxed),
            failures: c.failures.load(Ordering::Relaxed),
            skipped_fresh: c.skipped_fresh.load(Ordering::Relaxed),
            skipped_in_flight: c.skipped_in_flight.load(Ordering::Relaxed),
        }
    }
}

impl Drop for RefreshScheduler {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(true);
        if let Some(handle) = self.task.get_mut().take() {
            handle.abort();
        }
    }
}
