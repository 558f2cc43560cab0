//! Bounded frame queues
//!
//! The TX and RX legs of a call cross task (and for TX, thread) boundaries
//! through a [`FrameQueue`]: a bounded FIFO that drops the oldest frame on
//! overflow instead of back-pressuring the producer, and logs a warning when
//! it first crosses half capacity. Push and pop never block the caller;
//! async consumers can await [`FrameQueue::pop_wait`].

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::warn;

use crate::types::AudioFrame;

/// Bounded, drop-oldest frame FIFO shared between producer and consumer
pub struct FrameQueue {
    name: &'static str,
    capacity: usize,
    frames: Mutex<VecDeque<AudioFrame>>,
    notify: Notify,
    above_half: AtomicBool,
    dropped: Mutex<u64>,
}

impl FrameQueue {
    /// Create a queue holding at most `capacity` frames
    pub fn new(name: &'static str, capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            name,
            capacity,
            frames: Mutex::new(VecDeque::with_capacity(capacity)),
            notify: Notify::new(),
            above_half: AtomicBool::new(false),
            dropped: Mutex::new(0),
        })
    }

    /// Enqueue a frame. Returns `true` if an old frame was dropped to make
    /// room. The frame at the head (possibly already handed to the
    /// consumer) is never the one dropped; overflow evicts the oldest
    /// still-queued frame.
    pub fn push(&self, frame: AudioFrame) -> bool {
        let mut dropped = false;
        {
            let mut frames = self.frames.lock();
            if frames.len() >= self.capacity {
                frames.pop_front();
                dropped = true;
                *self.dropped.lock() += 1;
            }
            frames.push_back(frame);

            let above_half = frames.len() >= self.capacity / 2;
            if above_half && !self.above_half.swap(true, Ordering::Relaxed) {
                warn!(
                    queue = self.name,
                    len = frames.len(),
                    capacity = self.capacity,
                    "frame queue above half capacity"
                );
            } else if !above_half {
                self.above_half.store(false, Ordering::Relaxed);
            }
        }
        if dropped {
            warn!(queue = self.name, "frame queue overflow, dropped oldest");
        }
        self.notify.notify_one();
        dropped
    }

    /// Dequeue the oldest frame without waiting
    pub fn pop_now(&self) -> Option<AudioFrame> {
        self.frames.lock().pop_front()
    }

    /// Dequeue the oldest frame, waiting until one is available
    pub async fn pop_wait(&self) -> AudioFrame {
        loop {
            if let Some(frame) = self.pop_now() {
                return frame;
            }
            self.notify.notified().await;
        }
    }

    /// Number of queued frames
    pub fn len(&self) -> usize {
        self.frames.lock().len()
    }

    /// Whether the queue is empty
    pub fn is_empty(&self) -> bool {
        self.frames.lock().is_empty()
    }

    /// Total frames dropped to overflow since creation
    pub fn dropped(&self) -> u64 {
        *self.dropped.lock()
    }

    /// Discard every queued frame (caller interruption)
    pub fn clear(&self) {
        self.frames.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tone::silence_frame;
    use crate::types::SampleRate;

    fn frame(ts: u64) -> AudioFrame {
        silence_frame(SampleRate::Hz48000, ts)
    }

    #[test]
    fn fifo_order() {
        let q = FrameQueue::new("test", 4);
        q.push(frame(0));
        q.push(frame(20));
        assert_eq!(q.pop_now().unwrap().timestamp_ms, 0);
        assert_eq!(q.pop_now().unwrap().timestamp_ms, 20);
        assert!(q.pop_now().is_none());
    }

    #[test]
    fn overflow_drops_oldest() {
        let q = FrameQueue::new("test", 3);
        for ts in [0, 20, 40] {
            assert!(!q.push(frame(ts)));
        }
        assert!(q.push(frame(60)));
        assert_eq!(q.dropped(), 1);
        // Frame 0 was evicted; order of the rest is preserved.
        let stamps: Vec<u64> = std::iter::from_fn(|| q.pop_now())
            .map(|f| f.timestamp_ms)
            .collect();
        assert_eq!(stamps, vec![20, 40, 60]);
    }

    #[test]
    fn clear_empties_queue() {
        let q = FrameQueue::new("test", 8);
        q.push(frame(0));
        q.push(frame(20));
        q.clear();
        assert!(q.is_empty());
    }

    #[tokio::test]
    async fn pop_wait_wakes_on_push() {
        let q = FrameQueue::new("test", 4);
        let q2 = q.clone();
        let waiter = tokio::spawn(async move { q2.pop_wait().await.timestamp_ms });
        tokio::task::yield_now().await;
        q.push(frame(40));
        assert_eq!(waiter.await.unwrap(), 40);
    }
}
