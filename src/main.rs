//! DMXP-Streamer daemon
//!
//! Streams fixed-size blocks from the acquisition source to the configured
//! UDP destination until the first termination signal, then stops both
//! workers, drains the queue and exits. Fatal conditions exit with a
//! category-specific status (see `PipelineError::exit_code`).

use dmxp_streamer::config::{BLOCK_SIZE, DESTINATION};
use dmxp_streamer::error::PipelineError;
use dmxp_streamer::Core::{SignalMask, TerminationListener};
use dmxp_streamer::SPSC::{ControlEvent, PatternSource, Pipeline, PipelineBuilder};
use std::process;
use std::time::Duration;

/// Cadence of the synthetic acquisition source standing in for the DMA engine.
const ACQUISITION_PERIOD: Duration = Duration::from_millis(10);

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("DMXP-Streamer v{} starting...", env!("CARGO_PKG_VERSION"));

    // The listener must outlive the wait below
    let (mut pipeline, _listener) = match start() {
        Ok(running) => running,
        Err(e) => fail(e),
    };

    let status = match pipeline.wait_event() {
        ControlEvent::Terminate => {
            log::info!("Received termination signal");
            match pipeline.shutdown() {
                Ok(_) => 0,
                Err(e) => {
                    log::error!("{}", e);
                    e.exit_code()
                }
            }
        }
        ControlEvent::Fault(e) => {
            log::error!("Pipeline fault: {}", e);
            if let Err(shutdown_err) = pipeline.shutdown() {
                log::error!("Shutdown after fault failed: {}", shutdown_err);
            }
            e.exit_code()
        }
    };

    // process::exit skips Pipeline's drop; shutdown has already run or escalated
    process::exit(status);
}

/// Bring the pipeline up with every signal blocked, so no termination can
/// land before the handler is installed. Workers inherit the full mask and
/// never run the handler themselves.
fn start() -> Result<(Pipeline, TerminationListener), PipelineError> {
    let mask = SignalMask::block_all()
        .map_err(|e| PipelineError::Setup { context: "block signals", source: e })?;

    let source = PatternSource::new(BLOCK_SIZE, ACQUISITION_PERIOD);
    let pipeline = PipelineBuilder::new()
        .with_block_size(BLOCK_SIZE)
        .with_destination(DESTINATION)
        .launch_udp(source)?;

    let control = pipeline.control();
    let listener = TerminationListener::spawn(move |_signal| {
        let _ = control.send(ControlEvent::Terminate);
    })
    .map_err(|e| PipelineError::Setup {
        context: "install termination handler",
        source: e,
    })?;

    mask.restore()
        .map_err(|e| PipelineError::Setup { context: "unblock signals", source: e })?;

    Ok((pipeline, listener))
}

fn fail(e: PipelineError) -> ! {
    log::error!("{}", e);
    process::exit(e.exit_code());
}
