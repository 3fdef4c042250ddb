// The hand-off queue between the acquisition and transmit workers.

use super::block::Buffer;
use crate::Core::futex;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

struct QueueState {
    blocks: VecDeque<Buffer>,
    pushed: u64,
    taken: u64,
}

/// Unbounded FIFO of block ownership.
///
/// ### Concurrency Design:
/// - Every operation that touches the blocks or the counters holds `state`,
///   so no caller ever sees a half-updated queue.
/// - Emptiness and removal are one operation ([`HandoffQueue::try_take_front`]);
///   there is no separate front/pop pair to race between.
/// - Nothing here blocks waiting for content. `signal` is a wake word that a
///   waiting consumer parks on; it is bumped by every push and by
///   [`HandoffQueue::notify`], never by the lock itself.
pub struct HandoffQueue {
    state: Mutex<QueueState>,
    signal: AtomicU32,
}

impl HandoffQueue {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                blocks: VecDeque::new(),
                pushed: 0,
                taken: 0,
            }),
            signal: AtomicU32::new(0),
        }
    }

    /// Append `block` at the tail. Never fails.
    pub fn push(&self, block: Buffer) {
        {
            let mut state = self.state.lock();
            state.blocks.push_back(block);
            state.pushed += 1;
        }
        self.notify();
    }

    /// Remove and return the head, or `None` if the queue is empty.
    pub fn try_take_front(&self) -> Option<Buffer> {
        let mut state = self.state.lock();
        let block = state.blocks.pop_front()?;
        state.taken += 1;
        Some(block)
    }

    /// Release every remaining block. Returns how many were dropped.
    pub fn drain(&self) -> usize {
        let drained: Vec<Buffer> = {
            let mut state = self.state.lock();
            let blocks: Vec<Buffer> = state.blocks.drain(..).collect();
            state.taken += blocks.len() as u64;
            blocks
        };
        // Deallocate outside the lock
        let count = drained.len();
        drop(drained);
        count
    }

    pub fn len(&self) -> usize {
        self.state.lock().blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().blocks.is_empty()
    }

    /// Blocks ever pushed.
    pub fn total_pushed(&self) -> u64 {
        self.state.lock().pushed
    }

    /// Blocks ever removed, by take or by drain.
    pub fn total_taken(&self) -> u64 {
        self.state.lock().taken
    }

    /// `(len, pushed, taken)` read under one lock.
    pub fn snapshot(&self) -> (usize, u64, u64) {
        let state = self.state.lock();
        (state.blocks.len(), state.pushed, state.taken)
    }

    /// Wake a consumer parked in [`HandoffQueue::wait_for_data`].
    pub fn notify(&self) {
        self.signal.fetch_add(1, Ordering::Release);
        futex::futex_wake_all(&self.signal);
    }

    /// Park until the next push or notify, for at most `timeout`.
    ///
    /// Returns immediately when blocks are already queued. May return
    /// spuriously; callers loop.
    pub fn wait_for_data(&self, timeout: Duration) {
        let seen = self.signal.load(Ordering::Acquire);
        if !self.is_empty() {
            return;
        }
        futex::futex_wait_timeout(&self.signal, seen, timeout);
    }
}

impl Default for HandoffQueue {
    fn default() -> Self {
        Self::new()
    }
}
