// Orchestrates the stop of both workers. Never acquires or transmits itself.

use super::builder::PipelineContext;
use super::cancel::{CancelPhase, WorkerHandle};
use crate::config::{ACK_BACKOFF_MAX, ACK_BACKOFF_START};
use crate::error::{PipelineError, Result};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Blocks still queued after both workers stopped.
    pub drained: usize,
    /// Time spent waiting for acknowledgment.
    pub waited: Duration,
}

pub struct ShutdownCoordinator {
    context: Arc<PipelineContext>,
    acquisition: WorkerHandle,
    transmit: WorkerHandle,
    ack_deadline: Duration,
    triggered: bool,
}

impl ShutdownCoordinator {
    pub fn new(
        context: Arc<PipelineContext>,
        acquisition: WorkerHandle,
        transmit: WorkerHandle,
    ) -> Self {
        let ack_deadline = context.config().ack_deadline;
        Self {
            context,
            acquisition,
            transmit,
            ack_deadline,
            triggered: false,
        }
    }

    pub fn is_triggered(&self) -> bool {
        self.triggered
    }

    pub fn acquisition(&self) -> &WorkerHandle {
        &self.acquisition
    }

    pub fn transmit(&self) -> &WorkerHandle {
        &self.transmit
    }

    /// Cancel both workers, wait for both to acknowledge, then drain the queue.
    ///
    /// Runs at most once; later calls return `Ok(None)`. A failed cancellation
    /// request or an expired acknowledgment deadline is returned as an error
    /// and the queue is left untouched, since a worker may still be using it.
    pub fn shutdown(&mut self) -> Result<Option<ShutdownReport>> {
        if self.triggered {
            return Ok(None);
        }
        self.triggered = true;

        log::info!("shutdown: cancelling workers");
        self.acquisition.request_cancel()?;
        self.transmit.request_cancel()?;
        // A parked transmit worker only rechecks its flag when woken
        self.context.queue().notify();

        let waited = self.await_acknowledgment()?;
        log::debug!("shutdown: both workers acknowledged after {:?}", waited);

        let drained = self.context.queue().drain();
        if drained > 0 {
            log::info!("shutdown: released {} queued blocks", drained);
        }

        self.acquisition.join();
        self.transmit.join();

        log::info!("shutdown complete");
        Ok(Some(ShutdownReport { drained, waited }))
    }

    fn await_acknowledgment(&self) -> Result<Duration> {
        let start = Instant::now();
        let mut backoff = ACK_BACKOFF_START;

        loop {
            if self.acquisition.is_acknowledged() && self.transmit.is_acknowledged() {
                return Ok(start.elapsed());
            }
            // A worker that panics mid-wait will never acknowledge
            for worker in [&self.acquisition, &self.transmit] {
                if worker.phase() == CancelPhase::Abandoned {
                    return Err(PipelineError::Cancellation {
                        worker: worker.name(),
                        reason: "worker panicked before acknowledging",
                    });
                }
            }

            let elapsed = start.elapsed();
            if elapsed >= self.ack_deadline {
                for worker in [&self.acquisition, &self.transmit] {
                    if !worker.is_acknowledged() {
                        log::error!(
                            "shutdown: {} worker still {:?} after {:?}",
                            worker.name(),
                            worker.phase(),
                            self.ack_deadline
                        );
                    }
                }
                return Err(PipelineError::ShutdownTimeout(self.ack_deadline));
            }

            thread::sleep(std::cmp::min(backoff, self.ack_deadline - elapsed));
            backoff = std::cmp::min(backoff * 2, ACK_BACKOFF_MAX);
        }
    }
}
