//! Core building blocks of the session controller.
//!
//! Free of any socket dependency: the controller owns one of each and drives
//! them from its event loop.
//! - `BackoffState`: reconnect counter and exponential delay math
//! - `OutboundQueue`: FIFO of frames waiting for an open socket
//! - `HeartbeatMonitor`: the single periodic liveness timer

use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

use crate::infrastructure::config::{OverflowPolicy, ReconnectConfig};

/// Reconnect counter with exponential backoff.
///
/// Delay for attempt `n` (1-based) is `base * 2^(n-1)`, capped at `max_delay`,
/// with no jitter.
#[derive(Debug, Clone, Copy)]
pub struct BackoffState {
    attempts: u32,
    config: ReconnectConfig,
}

impl BackoffState {
    pub fn new(config: ReconnectConfig) -> Self {
        Self {
            attempts: 0,
            config,
        }
    }

    pub fn reset(&mut self) {
        self.attempts = 0;
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn max_attempts(&self) -> u32 {
        self.config.max_attempts
    }

    pub fn is_exhausted(&self) -> bool {
        self.attempts >= self.config.max_attempts
    }

    /// Delay before attempt `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base_ms = self.config.base_delay.as_millis() as u64;
        let exponential = base_ms.saturating_mul(2u64.saturating_pow(attempt.saturating_sub(1)));
        Duration::from_millis(exponential).min(self.config.max_delay)
    }

    /// Count one more attempt and return the delay to wait before it.
    ///
    /// Returns `None` once the ceiling is reached; the counter is left as is.
    pub fn next_delay_and_advance(&mut self) -> Option<Duration> {
        if self.is_exhausted() {
            return None;
        }

        self.attempts += 1;
        Some(self.delay_for(self.attempts))
    }
}

#[derive(Debug)]
struct QueuedFrame {
    seq: u64,
    frame: String,
}

/// FIFO buffer of serialized frames not yet written to the socket.
///
/// Producers append at the tail; the controller drains from the head and puts
/// a frame back at the head when the socket refuses it.
#[derive(Debug)]
pub struct OutboundQueue {
    frames: VecDeque<QueuedFrame>,
    capacity: Option<usize>,
    overflow: OverflowPolicy,
    next_seq: u64,
    dropped: u64,
}

impl OutboundQueue {
    /// Queue with no size limit.
    pub fn unbounded() -> Self {
        Self::new(None, OverflowPolicy::DropOldest)
    }

    pub fn new(capacity: Option<usize>, overflow: OverflowPolicy) -> Self {
        Self {
            frames: VecDeque::new(),
            capacity,
            overflow,
            next_seq: 0,
            dropped: 0,
        }
    }

    /// Append a frame at the tail.
    ///
    /// On a full bounded queue the overflow policy decides which frame is lost.
    /// Returns false if the new frame itself was dropped.
    pub fn enqueue(&mut self, frame: String) -> bool {
        if let Some(capacity) = self.capacity {
            if self.frames.len() >= capacity {
                self.dropped += 1;
                match self.overflow {
                    OverflowPolicy::DropNewest => return false,
                    OverflowPolicy::DropOldest => {
                        self.frames.pop_front();
                    }
                }
                // A zero-capacity queue cannot hold the new frame either.
                if capacity == 0 {
                    return false;
                }
            }
        }

        self.next_seq += 1;
        self.frames.push_back(QueuedFrame {
            seq: self.next_seq,
            frame,
        });
        true
    }

    /// Hand frames to `sender` from the head, one at a time.
    ///
    /// Stops at the first frame `sender` refuses; that frame goes back to the
    /// head so the queue keeps its original order. Returns the number sent.
    pub fn drain_to<F>(&mut self, mut sender: F) -> usize
    where
        F: FnMut(&str) -> bool,
    {
        let mut sent = 0;
        while let Some(queued) = self.frames.pop_front() {
            if !sender(&queued.frame) {
                self.frames.push_front(queued);
                break;
            }
            sent += 1;
        }
        sent
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Frames lost to the overflow policy since construction.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Queued frames, head first.
    pub fn frames(&self) -> impl Iterator<Item = &str> {
        self.frames.iter().map(|queued| queued.frame.as_str())
    }

    /// Enqueue order of the head frame.
    pub fn head_seq(&self) -> Option<u64> {
        self.frames.front().map(|queued| queued.seq)
    }
}

/// The single periodic liveness timer.
///
/// At most one interval exists; `start` replaces any running one. The first
/// tick fires one full period after `start`. A zero period leaves the
/// monitor stopped.
#[derive(Debug, Default)]
pub struct HeartbeatMonitor {
    interval: Option<Interval>,
}

impl HeartbeatMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self, period: Duration) {
        self.stop();
        if period.is_zero() {
            tracing::warn!("Heartbeat period is zero, heartbeat disabled");
            return;
        }
        let mut interval = interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.interval = Some(interval);
    }

    pub fn stop(&mut self) {
        self.interval = None;
    }

    pub fn is_running(&self) -> bool {
        self.interval.is_some()
    }

    /// Resolves on the next tick; never resolves while stopped.
    pub async fn tick(&mut self) {
        match self.interval.as_mut() {
            Some(interval) => {
                interval.tick().await;
            }
            None => std::future::pending::<()>().await,
        }
    }
}
