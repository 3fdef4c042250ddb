use super::cancel::{CancellationState, WorkerHandle};
use super::consumer::TransmitWorker;
use super::producer::AcquisitionWorker;
use super::queue::HandoffQueue;
use super::shutdown::{ShutdownCoordinator, ShutdownReport};
use super::source::BlockSource;
use super::transport::{Transport, UdpTransport};
use crate::config::{ConsumerWait, PipelineConfig};
use crate::error::{PipelineError, Result};
use crossbeam_channel::{Receiver, Sender};
use std::any::Any;
use std::io;
use std::net::SocketAddr;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// State shared by both workers and the coordinator: the queue and the two
/// cancellation flags. Built once per pipeline and passed around by `Arc`.
pub struct PipelineContext {
    queue: HandoffQueue,
    acquisition: Arc<CancellationState>,
    transmit: Arc<CancellationState>,
    config: PipelineConfig,
}

impl PipelineContext {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            queue: HandoffQueue::new(),
            acquisition: Arc::new(CancellationState::new()),
            transmit: Arc::new(CancellationState::new()),
            config,
        }
    }

    pub fn queue(&self) -> &HandoffQueue {
        &self.queue
    }

    pub fn acquisition_state(&self) -> Arc<CancellationState> {
        Arc::clone(&self.acquisition)
    }

    pub fn transmit_state(&self) -> Arc<CancellationState> {
        Arc::clone(&self.transmit)
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn block_size(&self) -> usize {
        self.config.block_size
    }
}

/// Messages for the control thread.
#[derive(Debug)]
pub enum ControlEvent {
    /// A termination signal arrived.
    Terminate,
    /// A worker stopped on a fatal error or panicked.
    Fault(PipelineError),
}

pub struct PipelineBuilder {
    config: PipelineConfig,
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self {
            config: PipelineConfig::default(),
        }
    }
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_block_size(mut self, size: usize) -> Self {
        self.config.block_size = size;
        self
    }

    pub fn with_destination(mut self, destination: SocketAddr) -> Self {
        self.config.destination = destination;
        self
    }

    pub fn with_consumer_wait(mut self, wait: ConsumerWait) -> Self {
        self.config.consumer_wait = wait;
        self
    }

    pub fn with_ack_deadline(mut self, deadline: Duration) -> Self {
        self.config.ack_deadline = deadline;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Open a UDP transport to the configured destination and start.
    pub fn launch_udp<S>(self, source: S) -> Result<Pipeline>
    where
        S: BlockSource + 'static,
    {
        let transport = UdpTransport::open(self.config.destination)?;
        self.launch(source, Box::new(transport))
    }

    /// Spawn both workers around a fresh context.
    pub fn launch<S>(self, source: S, transport: Box<dyn Transport>) -> Result<Pipeline>
    where
        S: BlockSource + 'static,
    {
        if self.config.block_size == 0 {
            return Err(PipelineError::setup(
                "block size",
                io::Error::new(io::ErrorKind::InvalidInput, "block size must be non-zero"),
            ));
        }

        let context = Arc::new(PipelineContext::new(self.config));
        let (control, events) = crossbeam_channel::unbounded();

        let mut acquisition = spawn_worker(
            "acquisition",
            context.acquisition_state(),
            control.clone(),
            AcquisitionWorker::new(source, Arc::clone(&context)),
            AcquisitionWorker::<S>::run,
        )?;

        let transmit = match spawn_worker(
            "transmit",
            context.transmit_state(),
            control.clone(),
            TransmitWorker::new(transport, Arc::clone(&context)),
            TransmitWorker::run,
        ) {
            Ok(handle) => handle,
            Err(e) => {
                // Don't leave the producer filling a queue nobody reads
                if let Err(stop_err) = acquisition.stop(context.config().ack_deadline) {
                    log::error!("failed to stop acquisition worker: {}", stop_err);
                }
                context.queue().drain();
                return Err(e);
            }
        };

        log::info!(
            "pipeline started: {} byte blocks to {}",
            context.block_size(),
            context.config().destination
        );

        let coordinator = ShutdownCoordinator::new(Arc::clone(&context), acquisition, transmit);
        Ok(Pipeline {
            context,
            coordinator,
            control,
            events,
        })
    }
}

fn spawn_worker<W, F>(
    name: &'static str,
    state: Arc<CancellationState>,
    control: Sender<ControlEvent>,
    worker: W,
    run: F,
) -> Result<WorkerHandle>
where
    W: Send + 'static,
    F: FnOnce(W) -> Result<()> + Send + 'static,
{
    let worker_state = Arc::clone(&state);
    let thread = thread::Builder::new()
        .name(name.to_string())
        .spawn(move || {
            let fault = match panic::catch_unwind(AssertUnwindSafe(|| run(worker))) {
                Ok(Ok(())) => return,
                Ok(Err(e)) => e,
                Err(payload) => {
                    // Before the fault is visible, so shutdown never waits on us
                    worker_state.abandon();
                    PipelineError::WorkerPanic {
                        worker: name,
                        message: panic_message(payload.as_ref()),
                    }
                }
            };
            // The control thread may already be gone during process exit
            let _ = control.send(ControlEvent::Fault(fault));
        })
        .map_err(|source| PipelineError::ThreadSpawn {
            worker: name,
            source,
        })?;

    Ok(WorkerHandle::new(name, state, thread))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// A running pipeline.
pub struct Pipeline {
    context: Arc<PipelineContext>,
    coordinator: ShutdownCoordinator,
    control: Sender<ControlEvent>,
    events: Receiver<ControlEvent>,
}

impl Pipeline {
    pub fn context(&self) -> &Arc<PipelineContext> {
        &self.context
    }

    pub fn queue(&self) -> &HandoffQueue {
        self.context.queue()
    }

    /// A sender for the termination trigger (e.g. a signal handler).
    pub fn control(&self) -> Sender<ControlEvent> {
        self.control.clone()
    }

    pub fn coordinator(&self) -> &ShutdownCoordinator {
        &self.coordinator
    }

    /// Block until a termination request or a worker fault.
    pub fn wait_event(&self) -> ControlEvent {
        // We hold a sender ourselves, so the channel never disconnects
        self.events.recv().unwrap_or(ControlEvent::Terminate)
    }

    pub fn wait_event_timeout(&self, timeout: Duration) -> Option<ControlEvent> {
        self.events.recv_timeout(timeout).ok()
    }

    /// Run the shutdown protocol. `Ok(None)` if it already ran.
    pub fn shutdown(&mut self) -> Result<Option<ShutdownReport>> {
        self.coordinator.shutdown()
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        if let Err(e) = self.coordinator.shutdown() {
            log::error!("shutdown on drop failed: {}", e);
        }
    }
}
