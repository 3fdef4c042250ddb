//! Error taxonomy and process exit codes.
//!
//! Nothing in the pipeline retries. Every `PipelineError` ends the process,
//! and operators classify the failure by [`PipelineError::exit_code`].

use std::io;
use std::time::Duration;

/// Result type alias
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Outcome of a failed `BlockSource::next_block` call.
#[derive(Debug, thiserror::Error)]
pub enum AcquireError {
    /// The source has no more blocks
    #[error("end of stream")]
    EndOfStream,

    /// The source observed a cancellation request while waiting
    #[error("interrupted by cancellation")]
    Interrupted,

    /// The source produced a block of the wrong size
    #[error("block size mismatch: expected {expected} bytes, got {actual}")]
    WrongSize { expected: usize, actual: usize },

    /// Device-level failure
    #[error("device error: {0}")]
    Device(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Transport failures. Datagrams are all-or-nothing, so a short send is fatal.
#[derive(Debug, thiserror::Error)]
pub enum TransmitError {
    #[error("failed to open transport: {0}")]
    Open(#[source] io::Error),

    #[error("send failed: {0}")]
    Send(#[source] io::Error),

    #[error("partial send: {sent} of {expected} bytes accepted")]
    Partial { sent: usize, expected: usize },
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Signal mask, handler installation or configuration failure
    #[error("setup failed ({context}): {source}")]
    Setup {
        context: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("failed to spawn {worker} worker: {source}")]
    ThreadSpawn {
        worker: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("acquisition failed: {0}")]
    Acquisition(#[from] AcquireError),

    #[error("transmission failed: {0}")]
    Transmission(#[from] TransmitError),

    #[error("cancellation request to {worker} worker failed: {reason}")]
    Cancellation {
        worker: &'static str,
        reason: &'static str,
    },

    /// A worker's run loop panicked; it never acknowledged
    #[error("{worker} worker panicked: {message}")]
    WorkerPanic {
        worker: &'static str,
        message: String,
    },

    #[error("failed to release transport: {0}")]
    ResourceRelease(#[source] io::Error),

    #[error("workers did not acknowledge cancellation within {0:?}")]
    ShutdownTimeout(Duration),
}

impl PipelineError {
    /// Process exit status for this failure category.
    pub fn exit_code(&self) -> i32 {
        match self {
            PipelineError::ThreadSpawn { .. } => 1,
            PipelineError::Setup { .. } => 2,
            PipelineError::Cancellation { .. } => 6,
            PipelineError::WorkerPanic { .. } => 7,
            PipelineError::Acquisition(_) => 8,
            PipelineError::Transmission(TransmitError::Open(_)) => 10,
            PipelineError::Transmission(_) => 11,
            PipelineError::ResourceRelease(_) => 12,
            PipelineError::ShutdownTimeout(_) => 13,
        }
    }

    pub(crate) fn setup(context: &'static str, source: io::Error) -> Self {
        PipelineError::Setup { context, source }
    }
}
