//! Per-peer protocol frame queue.
//!
//! A bounded FIFO shared between the event loop (producer) and the
//! peer's writer task (consumer). The wakeup signal is a single permit:
//! redundant notifies while one is already pending are dropped, so a
//! burst of pushes wakes the consumer exactly once and the consumer
//! drains until empty.

use std::collections::VecDeque;
use std::sync::Mutex;

use tokio::sync::Notify;

use sidewinder_core::Frame;

/// Bounded FIFO of frames with a coalesced ready signal.
pub struct ProtoQueue {
    inner: Mutex<VecDeque<Frame>>,
    notify: Notify,
    capacity: usize,
}

impl ProtoQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
            capacity,
        }
    }

    /// Append a frame. Returns false (dropping the frame) when full.
    pub fn push(&self, frame: Frame) -> bool {
        {
            let mut frames = self.inner.lock().expect("proto queue poisoned");
            if frames.len() >= self.capacity {
                return false;
            }
            frames.push_back(frame);
        }
        // Stores at most one permit; concurrent pushes coalesce.
        self.notify.notify_one();
        true
    }

    /// Take the oldest frame, if any.
    pub fn pop(&self) -> Option<Frame> {
        self.inner.lock().expect("proto queue poisoned").pop_front()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().expect("proto queue poisoned").len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().expect("proto queue poisoned").is_empty()
    }

    /// Drop every held frame and wake any parked consumer so it can
    /// observe the reset.
    pub fn reset(&self) {
        self.inner.lock().expect("proto queue poisoned").clear();
        self.notify.notify_waiters();
    }

    /// Resolve once the queue is non-empty.
    ///
    /// Returns immediately when frames are already waiting; otherwise
    /// parks on the signal. The check-then-park is race-free because a
    /// producer's permit posted between the two is consumed by the park.
    pub async fn wait(&self) {
        loop {
            if !self.is_empty() {
                return;
            }
            self.notify.notified().await;
        }
    }
}
