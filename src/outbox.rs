//! Bounded per-member outbound queue
//!
//! Built on a single-receiver `tokio::sync::broadcast` channel, which gives
//! the overflow policy we want for free: a send never waits, and once the
//! buffer is full the oldest pending frame is overwritten. The receiver is
//! told how many frames it missed and resumes at the oldest one still held.
//!
//! The queue closes once every `OutboxSender` is gone, which happens when
//! the owning member is removed from its room.

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::debug;

/// An encoded snapshot, shared between all queues of one broadcast
pub type Frame = Arc<str>;

/// Create a queue holding at least `capacity` frames
///
/// The capacity is rounded up to the next power of two by tokio.
///
/// # Panics
/// Panics if `capacity` is zero. `Config` rejects zero capacities.
pub fn outbox(capacity: usize) -> (OutboxSender, OutboxReceiver) {
    let (tx, rx) = broadcast::channel(capacity);
    (OutboxSender { tx }, OutboxReceiver { rx })
}

/// Producer half, held by the room on behalf of the member
#[derive(Debug, Clone)]
pub struct OutboxSender {
    tx: broadcast::Sender<Frame>,
}

impl OutboxSender {
    /// Enqueue a frame without waiting
    ///
    /// Returns false if the receiving half has been dropped.
    pub fn push(&self, frame: Frame) -> bool {
        self.tx.send(frame).is_ok()
    }
}

/// Consumer half, owned by the member's write loop
#[derive(Debug)]
pub struct OutboxReceiver {
    rx: broadcast::Receiver<Frame>,
}

impl OutboxReceiver {
    /// Wait for the next frame
    ///
    /// Returns `None` once all senders are dropped and the queue is drained.
    pub async fn recv(&mut self) -> Option<Frame> {
        loop {
            match self.rx.recv().await {
                Ok(frame) => return Some(frame),
                Err(RecvError::Lagged(skipped)) => {
                    debug!("Outbound queue full, dropped {} stale snapshot(s)", skipped);
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}
