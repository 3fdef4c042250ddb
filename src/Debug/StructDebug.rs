use std::fmt;
use crate::SPSC::{
    Buffer, CancellationState, HandoffQueue, Pipeline, PipelineContext, ShutdownCoordinator,
    WorkerHandle,
};

/// Debug function for HandoffQueue
///
/// Reads length and counters under a single lock so the three values are
/// mutually consistent. Block contents are never printed.
pub fn debug_handoff_queue(queue: &HandoffQueue, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let (len, pushed, taken) = queue.snapshot();
    f.debug_struct("HandoffQueue")
        .field("len", &len)
        .field("pushed", &pushed)
        .field("taken", &taken)
        .finish()
}

/// Debug function for Buffer
///
/// Shows the size and the first byte (the marker for synthetic sources)
pub fn debug_buffer(buffer: &Buffer, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Buffer")
        .field("len", &buffer.len())
        .field("head", &buffer.as_slice().first())
        .finish_non_exhaustive()
}

pub fn debug_cancellation_state(state: &CancellationState, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_tuple("CancellationState").field(&state.phase()).finish()
}

pub fn debug_worker_handle(handle: &WorkerHandle, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("WorkerHandle")
        .field("name", &handle.name())
        .field("phase", &handle.phase())
        .finish_non_exhaustive()
}

/// Debug function for PipelineContext
///
/// Shows:
/// - Queue statistics
/// - Both cancellation phases
/// - Configured block size and destination
pub fn debug_pipeline_context(context: &PipelineContext, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("PipelineContext")
        .field("queue", context.queue())
        .field("acquisition", &context.acquisition_state().phase())
        .field("transmit", &context.transmit_state().phase())
        .field("block_size", &context.block_size())
        .field("destination", &context.config().destination)
        .finish()
}

pub fn debug_shutdown_coordinator(coordinator: &ShutdownCoordinator, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ShutdownCoordinator")
        .field("acquisition", coordinator.acquisition())
        .field("transmit", coordinator.transmit())
        .field("triggered", &coordinator.is_triggered())
        .finish()
}

// Debug proxy implementations that call the standalone debug functions

impl fmt::Debug for HandoffQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        debug_handoff_queue(self, f)
    }
}

impl fmt::Debug for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        debug_buffer(self, f)
    }
}

impl fmt::Debug for CancellationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        debug_cancellation_state(self, f)
    }
}

impl fmt::Debug for WorkerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        debug_worker_handle(self, f)
    }
}

impl fmt::Debug for PipelineContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        debug_pipeline_context(self, f)
    }
}

impl fmt::Debug for ShutdownCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        debug_shutdown_coordinator(self, f)
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("context", &**self.context())
            .field("coordinator", self.coordinator())
            .finish_non_exhaustive()
    }
}
