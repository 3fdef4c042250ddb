use super::builder::PipelineContext;
use super::cancel::{AckOnExit, CancellationState};
use super::queue::HandoffQueue;
use super::transport::Transport;
use crate::config::{ConsumerWait, IDLE_WAIT};
use crate::error::{PipelineError, Result, TransmitError};
use std::sync::Arc;

/// Takes blocks off the queue and sends each as one datagram.
///
/// The safe point is checked on every iteration, whether or not a block was
/// sent. The transport belongs to this worker alone and is released on every
/// exit path before the worker acknowledges.
pub struct TransmitWorker {
    transport: Box<dyn Transport>,
    context: Arc<PipelineContext>,
    wait: ConsumerWait,
}

impl TransmitWorker {
    pub fn new(transport: Box<dyn Transport>, context: Arc<PipelineContext>) -> Self {
        let wait = context.config().consumer_wait;
        Self {
            transport,
            context,
            wait,
        }
    }

    pub fn with_wait(mut self, wait: ConsumerWait) -> Self {
        self.wait = wait;
        self
    }

    /// Run until cancelled (`Ok`) or until a send fails (`Err`).
    pub fn run(self) -> Result<()> {
        let state = self.context.transmit_state();
        // Declared first so it drops last: release, then acknowledge
        let _ack = AckOnExit::new(Arc::clone(&state));
        let mut transport = self.transport;

        log::info!("transmit worker started ({:?})", self.wait);

        let outcome = pump(transport.as_mut(), self.context.queue(), &state, self.wait);
        let released = transport.release().map_err(PipelineError::ResourceRelease);

        match (outcome, released) {
            (Ok(sent), Ok(())) => {
                log::info!("transmit worker cancelled after {} blocks", sent);
                Ok(())
            }
            (Ok(_), Err(e)) => {
                log::error!("transmit worker: {}", e);
                Err(e)
            }
            (Err(e), released) => {
                if let Err(release_err) = released {
                    log::error!("transmit worker: {}", release_err);
                }
                log::error!("transmit worker stopping: {}", e);
                Err(e)
            }
        }
    }
}

/// The send loop. Returns the number of blocks sent once cancelled.
fn pump(
    transport: &mut dyn Transport,
    queue: &HandoffQueue,
    state: &CancellationState,
    wait: ConsumerWait,
) -> Result<u64> {
    let mut sent: u64 = 0;

    loop {
        match queue.try_take_front() {
            Some(block) => {
                let expected = block.len();
                let accepted = transport
                    .send(block.as_slice())
                    .map_err(TransmitError::Send)?;
                if accepted != expected {
                    return Err(TransmitError::Partial {
                        sent: accepted,
                        expected,
                    }
                    .into());
                }
                sent += 1;
                log::trace!("sent block #{} ({} bytes)", sent, expected);
            }
            None => match wait {
                ConsumerWait::BusyPoll => std::hint::spin_loop(),
                ConsumerWait::Notify => {
                    if !state.is_requested() {
                        queue.wait_for_data(IDLE_WAIT);
                    }
                }
            },
        }

        // Safe point
        if state.is_requested() {
            return Ok(sent);
        }
    }
}
