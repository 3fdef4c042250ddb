mod builder;
mod consumer;
mod producer;
mod shutdown;

pub mod block;
pub mod cancel;
pub mod queue;
pub mod source;
pub mod transport;

pub use builder::{ControlEvent, Pipeline, PipelineBuilder, PipelineContext};
pub use cancel::{CancelPhase, CancelToken, CancellationState, WorkerHandle};
pub use consumer::TransmitWorker;
pub use producer::AcquisitionWorker;
pub use queue::HandoffQueue;
pub use shutdown::{ShutdownCoordinator, ShutdownReport};
pub use source::{BlockSource, PatternSource, ScriptedSource};
pub use transport::{Transport, UdpTransport};
pub use block::Buffer;
