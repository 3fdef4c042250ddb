use super::builder::PipelineContext;
use super::cancel::{AckOnExit, CancelToken};
use super::source::BlockSource;
use crate::error::{AcquireError, Result};
use std::sync::Arc;

/// Pulls blocks from a [`BlockSource`] and hands them to the queue.
///
/// The only suspension point is inside `next_block`. The cancellation safe
/// point follows every successful push; a source that watches its
/// [`CancelToken`] can also end the wait early.
pub struct AcquisitionWorker<S: BlockSource> {
    source: S,
    context: Arc<PipelineContext>,
}

impl<S: BlockSource> AcquisitionWorker<S> {
    pub fn new(source: S, context: Arc<PipelineContext>) -> Self {
        Self { source, context }
    }

    /// Run until cancelled (`Ok`) or until the source fails (`Err`).
    ///
    /// End-of-stream is a failure: with no producer the pipeline has nothing
    /// left to do. So is an `Interrupted` that no cancellation request
    /// explains.
    pub fn run(mut self) -> Result<()> {
        let state = self.context.acquisition_state();
        let _ack = AckOnExit::new(Arc::clone(&state));
        let token = CancelToken::new(state.clone());
        let block_size = self.context.block_size();
        let queue = self.context.queue();
        let mut acquired: u64 = 0;

        log::info!("acquisition worker started (block size {} bytes)", block_size);

        loop {
            match self.source.next_block(&token) {
                Ok(block) => {
                    if block.len() != block_size {
                        let err = AcquireError::WrongSize {
                            expected: block_size,
                            actual: block.len(),
                        };
                        log::error!("acquisition worker: {}", err);
                        return Err(err.into());
                    }
                    queue.push(block);
                    acquired += 1;
                    log::trace!("acquired block #{}", acquired);
                }
                Err(AcquireError::Interrupted) if state.is_requested() => {
                    log::info!("acquisition worker interrupted after {} blocks", acquired);
                    return Ok(());
                }
                Err(e) => {
                    log::error!("acquisition worker stopping after {} blocks: {}", acquired, e);
                    return Err(e.into());
                }
            }

            // Safe point
            if state.is_requested() {
                log::info!("acquisition worker cancelled after {} blocks", acquired);
                return Ok(());
            }
        }
    }
}
