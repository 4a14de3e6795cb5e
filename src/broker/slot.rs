//! Single-slot holder for the most recently drained message.
//!
//! Not a queue: `put` replaces whatever is pending, and
//! `take` hands the pending message to exactly one caller.

use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time::Instant;

use crate::broker::message::Message;

#[derive(Debug, Default)]
pub struct PendingSlot {
    pending: Mutex<Option<Message>>,
    arrived: Notify,
}

impl PendingSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `message`, returning the unreturned message it displaced.
    pub fn put(&self, message: Message) -> Option<Message> {
        let displaced = self.pending.lock().replace(message);
        self.arrived.notify_waiters();
        displaced
    }

    /// Removes and returns the pending message, if any.
    pub fn take(&self) -> Option<Message> {
        self.pending.lock().take()
    }

    /// Like `take`, but waits up to `wait` for a message to arrive.
    ///
    /// Only the calling task is suspended. Concurrent waiters race on `take`
    /// when a message arrives; the losers keep waiting until their deadline.
    pub async fn take_within(&self, wait: Duration) -> Option<Message> {
        if let Some(message) = self.take() {
            return Some(message);
        }
        if wait.is_zero() {
            return None;
        }

        let deadline = Instant::now() + wait;
        loop {
            let notified = self.arrived.notified();
            tokio::pin!(notified);
            // Register before re-checking so a `put` in between is not missed.
            notified.as_mut().enable();

            if let Some(message) = self.take() {
                return Some(message);
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return self.take();
            }
        }
    }
}
