//! Local broadcast transport: same-device, cross-process event fan-out.
//!
//! Engine instances on one device attach to a shared [`BroadcastHub`]. A
//! frame published by one bus reaches every other attached bus; the sender
//! never re-receives its own frame. The hub is optional; a bus constructed
//! without one simply runs local-only.

use serde_json::Value;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Enough for burst handling; a lagged receiver skips old frames and keeps
/// going, since a skipped frame is recovered by the next full-state push.
const HUB_CAPACITY: usize = 64;

/// One event crossing process boundaries on the same device.
#[derive(Debug, Clone)]
pub(crate) struct Frame {
    /// Identity of the bus that published this frame, for loop prevention.
    pub sender: Uuid,
    pub event: String,
    pub payload: Value,
}

/// Shared fan-out channel for all engine instances on one device.
#[derive(Clone)]
pub struct BroadcastHub {
    tx: broadcast::Sender<Frame>,
}

impl BroadcastHub {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(HUB_CAPACITY);
        Self { tx }
    }

    /// Best-effort publish; a hub with no other attached bus is not an error.
    pub(crate) fn send(&self, frame: Frame) {
        let _ = self.tx.send(frame);
    }

    pub(crate) fn attach(&self) -> broadcast::Receiver<Frame> {
        self.tx.subscribe()
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new()
    }
}
