// Cooperative cancellation between the coordinator and the workers.

use crate::config::{ACK_BACKOFF_MAX, ACK_BACKOFF_START};
use crate::error::{PipelineError, Result};
use crossbeam_utils::CachePadded;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CancelPhase {
    Running = 0,
    CancellationRequested = 1,
    Acknowledged = 2,
    /// The worker panicked and will never acknowledge.
    Abandoned = 3,
}

impl CancelPhase {
    fn from_raw(raw: u8) -> Self {
        match raw {
            0 => CancelPhase::Running,
            1 => CancelPhase::CancellationRequested,
            2 => CancelPhase::Acknowledged,
            _ => CancelPhase::Abandoned,
        }
    }
}

/// Per-worker cancellation flag.
///
/// Written by the coordinator (`Running -> CancellationRequested`), by the
/// owning worker (`-> Acknowledged`) and by the worker's thread wrapper when
/// the run loop panics (`-> Abandoned`). Padded so the two workers' flags never
/// share a cache line.
pub struct CancellationState {
    phase: CachePadded<AtomicU8>,
}

impl CancellationState {
    pub fn new() -> Self {
        Self {
            phase: CachePadded::new(AtomicU8::new(CancelPhase::Running as u8)),
        }
    }

    pub fn phase(&self) -> CancelPhase {
        CancelPhase::from_raw(self.phase.load(Ordering::Acquire))
    }

    /// Move `Running -> CancellationRequested`. A worker that already has a
    /// request pending or has acknowledged is left alone.
    ///
    /// Returns the phase observed before the call.
    pub fn request(&self) -> CancelPhase {
        match self.phase.compare_exchange(
            CancelPhase::Running as u8,
            CancelPhase::CancellationRequested as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(prev) | Err(prev) => CancelPhase::from_raw(prev),
        }
    }

    #[inline]
    pub fn is_requested(&self) -> bool {
        self.phase.load(Ordering::Acquire) == CancelPhase::CancellationRequested as u8
    }

    #[inline]
    pub fn is_acknowledged(&self) -> bool {
        self.phase.load(Ordering::Acquire) == CancelPhase::Acknowledged as u8
    }

    pub fn acknowledge(&self) {
        self.phase.store(CancelPhase::Acknowledged as u8, Ordering::Release);
    }

    /// Record that the worker died without acknowledging.
    pub fn abandon(&self) {
        self.phase.store(CancelPhase::Abandoned as u8, Ordering::Release);
    }
}

impl Default for CancellationState {
    fn default() -> Self {
        Self::new()
    }
}

/// Read side of a worker's [`CancellationState`], handed to sources so a
/// blocking wait can be raced against cancellation.
#[derive(Clone)]
pub struct CancelToken {
    state: Arc<CancellationState>,
}

impl CancelToken {
    pub fn new(state: Arc<CancellationState>) -> Self {
        Self { state }
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.state.is_requested()
    }
}

/// Marks the worker Acknowledged when its run loop ends.
///
/// Skipped during a panic, so a dead worker stays distinguishable from one
/// that stopped cleanly.
pub(crate) struct AckOnExit {
    state: Arc<CancellationState>,
}

impl AckOnExit {
    pub(crate) fn new(state: Arc<CancellationState>) -> Self {
        Self { state }
    }
}

impl Drop for AckOnExit {
    fn drop(&mut self) {
        if !std::thread::panicking() {
            self.state.acknowledge();
        }
    }
}

/// The coordinator's reference to a running worker.
///
/// Enough to request cancellation and observe acknowledgment. It owns none of
/// the worker's resources.
pub struct WorkerHandle {
    name: &'static str,
    state: Arc<CancellationState>,
    thread: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    pub fn new(name: &'static str, state: Arc<CancellationState>, thread: JoinHandle<()>) -> Self {
        Self {
            name,
            state,
            thread: Some(thread),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn phase(&self) -> CancelPhase {
        self.state.phase()
    }

    pub fn is_acknowledged(&self) -> bool {
        self.state.is_acknowledged()
    }

    /// Whether the worker's thread has ended (or was already joined).
    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().map_or(true, |t| t.is_finished())
    }

    /// Ask the worker to stop at its next safe point.
    ///
    /// Fails when the worker panicked or its thread has ended without
    /// acknowledging, since such a request could never be honoured.
    pub fn request_cancel(&self) -> Result<()> {
        if self.is_finished() && self.state.phase() == CancelPhase::Running {
            return Err(PipelineError::Cancellation {
                worker: self.name,
                reason: "worker thread exited without acknowledging",
            });
        }

        match self.state.request() {
            CancelPhase::Running => {
                log::debug!("{} worker: cancellation requested", self.name);
                Ok(())
            }
            CancelPhase::CancellationRequested => Ok(()),
            CancelPhase::Acknowledged => {
                log::debug!("{} worker already stopped", self.name);
                Ok(())
            }
            CancelPhase::Abandoned => Err(self.abandoned()),
        }
    }

    /// Poll the worker's flag with bounded backoff until it acknowledges.
    ///
    /// Returns `Ok(false)` once `deadline` has passed, and a
    /// `CancellationError` if the worker panics while being waited on.
    pub fn wait_acknowledged(&self, deadline: Duration) -> Result<bool> {
        let start = Instant::now();
        let mut backoff = ACK_BACKOFF_START;

        loop {
            match self.state.phase() {
                CancelPhase::Acknowledged => return Ok(true),
                CancelPhase::Abandoned => return Err(self.abandoned()),
                _ => {}
            }

            let elapsed = start.elapsed();
            if elapsed >= deadline {
                return Ok(false);
            }
            thread::sleep(std::cmp::min(backoff, deadline - elapsed));
            backoff = std::cmp::min(backoff * 2, ACK_BACKOFF_MAX);
        }
    }

    /// Cancel this worker alone, wait for it, and reap its thread.
    ///
    /// Used when its peer never started. A worker that misses `deadline` is
    /// left detached and the call fails with `ShutdownTimeout`.
    pub fn stop(&mut self, deadline: Duration) -> Result<()> {
        self.request_cancel()?;
        if !self.wait_acknowledged(deadline)? {
            return Err(PipelineError::ShutdownTimeout(deadline));
        }
        self.join();
        Ok(())
    }

    fn abandoned(&self) -> PipelineError {
        PipelineError::Cancellation {
            worker: self.name,
            reason: "worker panicked before acknowledging",
        }
    }

    /// Reap the worker thread. Only call once it has acknowledged.
    pub fn join(&mut self) {
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("{} worker panicked", self.name);
            }
        }
    }
}
