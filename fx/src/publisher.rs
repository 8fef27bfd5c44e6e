//! Outbound seam for pushing fresh snapshots to subscribers.

use tokio::sync::broadcast;
use tracing::debug;

use crate::snapshot::RatesPayload;

/// Receives every snapshot the scheduler stores.
///
/// Delivery is fire-and-forget: implementations must not block and must not
/// report failures back to the scheduler.
pub trait SnapshotPublisher: Send + Sync {
    fn publish(&self, payload: RatesPayload);
}

/// Publisher that drops everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopPublisher;

impl SnapshotPublisher for NoopPublisher {
    fn publish(&self, _payload: RatesPayload) {}
}

impl SnapshotPublisher for broadcast::Sender<RatesPayload> {
    fn publish(&self, payload: RatesPayload) {
        let as_of_unix = payload.as_of_unix;
        match self.send(payload) {
            Ok(receivers) => debug!(receivers, as_of_unix, "Published rates snapshot"),
            Err(_) => debug!(as_of_unix, "No subscribers for rates snapshot"),
        }
    }
}
