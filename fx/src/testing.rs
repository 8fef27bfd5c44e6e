//! Test doubles for the provider, publisher and clock seams.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use ratecast_common::{Clock, Currency};
use tokio::time::Instant;

use crate::error::FxResult;
use crate::provider::RateProvider;
use crate::publisher::SnapshotPublisher;
use crate::snapshot::{RatesPayload, Snapshot};

/// Build a snapshot from literal codes. Panics on malformed codes.
pub fn snapshot_with(
    base: &str,
    rates: &[(&str, f64)],
    last_update_unix: i64,
    next_update_unix: i64,
) -> Snapshot {
    Snapshot {
        base_code: Currency::parse(base).expect("valid base code"),
        rates: rates
            .iter()
            .map(|(code, rate)| (Currency::parse(code).expect("valid code"), *rate))
            .collect(),
        last_update_unix,
        next_update_unix,
        eol_unix: 0,
        documentation: "https://www.exchangerate-api.com/docs".to_string(),
        terms_of_use: "https://www.exchangerate-api.com/terms".to_string(),
        provider: "TEST".to_string(),
    }
}

/// Clock that follows tokio's (possibly paused) time, starting at a fixed
/// unix millisecond value.
pub struct PausedClock {
    origin: Instant,
    origin_ms: i64,
}

impl PausedClock {
    pub fn new(origin_ms: i64) -> Self {
        Self {
            origin: Instant::now(),
            origin_ms,
        }
    }
}

impl Clock for PausedClock {
    fn now_ms(&self) -> i64 {
        self.origin_ms + self.origin.elapsed().as_millis() as i64
    }
}

type Responder = Box<dyn Fn(usize) -> FxResult<Snapshot> + Send + Sync>;

/// Provider whose answers come from a closure of the call index.
pub struct ScriptedProvider {
    responder: Responder,
    latency: Duration,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    call_times: Mutex<Vec<Instant>>,
}

impl ScriptedProvider {
    pub fn new(responder: impl Fn(usize) -> FxResult<Snapshot> + Send + Sync + 'static) -> Self {
        Self {
            responder: Box::new(responder),
            latency: Duration::ZERO,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            call_times: Mutex::new(Vec::new()),
        }
    }

    /// Simulate upstream latency on every call.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Milliseconds between consecutive calls.
    pub fn call_spacing_ms(&self) -> Vec<u64> {
        self.call_times
            .lock()
            .windows(2)
            .map(|w| w[1].duration_since(w[0]).as_millis() as u64)
            .collect()
    }
}

#[async_trait]
impl RateProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "SCRIPTED"
    }

    async fn fetch_snapshot(&self) -> FxResult<Snapshot> {
        let index = self.calls.fetch_add(1, Ordering::SeqCst);
        self.call_times.lock().push(Instant::now());

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        (self.responder)(index)
    }
}

/// Publisher that keeps every payload it receives.
#[derive(Default)]
pub struct RecordingPublisher {
    published: Mutex<Vec<RatesPayload>>,
}

impl RecordingPublisher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn published(&self) -> Vec<RatesPayload> {
        self.published.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.published.lock().len()
    }
}

impl SnapshotPublisher for RecordingPublisher {
    fn publish(&self, payload: RatesPayload) {
        self.published.lock().push(payload);
    }
}
