//! Lock-free bounded event bus.
//!
//! One producer (the capture thread) and one consumer (the processing
//! thread) share a crossbeam `ArrayQueue`. What happens when the queue is
//! full is decided by the configured [`BackpressurePolicy`]. Closing the bus
//! lets the consumer drain what is left and then stop.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread;
use std::time::Duration;

use crossbeam::queue::ArrayQueue;
use crossbeam::utils::Backoff;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const IDLE_SLEEP: Duration = Duration::from_millis(1);

/// Event bus error conditions.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum EventError {
    #[error("Invalid capacity {0} (must be a non-zero power of two)")]
    InvalidCapacity(usize),
    #[error("Event bus is closed")]
    Closed,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackpressurePolicy {
    /// Producer waits for room; nothing is lost.
    Block,
    /// Oldest queued event is discarded to make room.
    #[default]
    DropOldest,
}

pub struct EventBus<T> {
    queue: ArrayQueue<T>,
    policy: BackpressurePolicy,
    closed: AtomicBool,
    dropped: AtomicU64,
}

impl<T> EventBus<T> {
    /// Creates a new event bus. `capacity` must be a power of two.
    pub fn with_capacity(capacity: usize, policy: BackpressurePolicy) -> Result<Self, EventError> {
        if !capacity.is_power_of_two() {
            return Err(EventError::InvalidCapacity(capacity));
        }
        Ok(Self {
            queue: ArrayQueue::new(capacity),
            policy,
            closed: AtomicBool::new(false),
            dropped: AtomicU64::new(0),
        })
    }

    /// Enqueue event using Tigerbeetle-style *_verb naming.
    ///
    /// Returns the event displaced under [`BackpressurePolicy::DropOldest`].
    pub fn event_enqueue(&self, event: T) -> Result<Option<T>, EventError> {
        if self.is_closed() {
            return Err(EventError::Closed);
        }
        match self.policy {
            BackpressurePolicy::DropOldest => {
                let displaced = self.queue.force_push(event);
                if displaced.is_some() {
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                }
                Ok(displaced)
            }
            BackpressurePolicy::Block => {
                let backoff = Backoff::new();
                let mut pending = event;
                loop {
                    match self.queue.push(pending) {
                        Ok(()) => return Ok(None),
                        Err(rejected) => {
                            if self.is_closed() {
                                return Err(EventError::Closed);
                            }
                            pending = rejected;
                            if backoff.is_completed() {
                                thread::sleep(IDLE_SLEEP);
                            } else {
                                backoff.snooze();
                            }
                        }
                    }
                }
            }
        }
    }

    /// Dequeue without waiting.
    pub fn event_dequeue(&self) -> Option<T> {
        self.queue.pop()
    }

    /// Waits for the next event. Returns `None` once the bus is closed and
    /// fully drained.
    pub fn event_dequeue_wait(&self) -> Option<T> {
        let backoff = Backoff::new();
        loop {
            if let Some(event) = self.queue.pop() {
                return Some(event);
            }
            if self.is_closed() {
                // A push may have landed between the pop and the flag check.
                return self.queue.pop();
            }
            if backoff.is_completed() {
                thread::sleep(IDLE_SLEEP);
            } else {
                backoff.snooze();
            }
        }
    }

    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }

    pub fn policy(&self) -> BackpressurePolicy {
        self.policy
    }

    /// Events discarded so far under `drop_oldest`.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
