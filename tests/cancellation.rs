use dmxp_streamer::config::PipelineConfig;
use dmxp_streamer::error::{AcquireError, PipelineError};
use dmxp_streamer::SPSC::{
    AcquisitionWorker, BlockSource, Buffer, CancelPhase, CancelToken, CancellationState,
    PipelineContext, ScriptedSource, WorkerHandle,
};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const BLOCK: usize = 64;

fn context() -> Arc<PipelineContext> {
    Arc::new(PipelineContext::new(PipelineConfig {
        block_size: BLOCK,
        ..PipelineConfig::default()
    }))
}

/// Produces a block every millisecond, forever, ignoring cancellation.
struct Ticker {
    next: u8,
}

impl BlockSource for Ticker {
    fn next_block(&mut self, _cancel: &CancelToken) -> Result<Buffer, AcquireError> {
        thread::sleep(Duration::from_millis(1));
        self.next = self.next.wrapping_add(1);
        Ok(Buffer::filled(BLOCK, self.next))
    }
}

/// Never produces; waits until cancelled.
struct Stalled;

impl BlockSource for Stalled {
    fn next_block(&mut self, cancel: &CancelToken) -> Result<Buffer, AcquireError> {
        while !cancel.is_cancelled() {
            thread::sleep(Duration::from_millis(1));
        }
        Err(AcquireError::Interrupted)
    }
}

fn wait_until(what: &str, mut cond: impl FnMut() -> bool) {
    let start = Instant::now();
    while !cond() {
        assert!(start.elapsed() < Duration::from_secs(5), "timed out waiting for {}", what);
        thread::sleep(Duration::from_millis(1));
    }
}

#[test]
fn state_transitions() {
    let state = CancellationState::new();
    assert_eq!(state.phase(), CancelPhase::Running);

    assert_eq!(state.request(), CancelPhase::Running);
    assert!(state.is_requested());

    // Repeated request is a no-op
    assert_eq!(state.request(), CancelPhase::CancellationRequested);
    assert_eq!(state.phase(), CancelPhase::CancellationRequested);

    state.acknowledge();
    assert!(state.is_acknowledged());
    assert!(!state.is_requested());

    // A request never rewinds an acknowledged worker
    assert_eq!(state.request(), CancelPhase::Acknowledged);
    assert_eq!(state.phase(), CancelPhase::Acknowledged);
}

#[test]
fn acquisition_acknowledges_at_safe_point() {
    let ctx = context();
    let worker = AcquisitionWorker::new(Ticker { next: 0 }, Arc::clone(&ctx));
    let handle = thread::spawn(move || worker.run());

    wait_until("first blocks", || ctx.queue().total_pushed() >= 3);

    ctx.acquisition_state().request();
    let result = handle.join().unwrap();
    assert!(result.is_ok(), "{:?}", result);
    assert_eq!(ctx.acquisition_state().phase(), CancelPhase::Acknowledged);

    // No pushes after acknowledgment
    let pushed = ctx.queue().total_pushed();
    thread::sleep(Duration::from_millis(20));
    assert_eq!(ctx.queue().total_pushed(), pushed);
}

#[test]
fn blocked_acquisition_is_interrupted() {
    let ctx = context();
    let worker = AcquisitionWorker::new(Stalled, Arc::clone(&ctx));
    let handle = thread::spawn(move || worker.run());

    thread::sleep(Duration::from_millis(20));
    assert_eq!(ctx.acquisition_state().phase(), CancelPhase::Running);

    let start = Instant::now();
    ctx.acquisition_state().request();
    assert!(handle.join().unwrap().is_ok());
    assert!(start.elapsed() < Duration::from_secs(1));

    assert!(ctx.acquisition_state().is_acknowledged());
    assert!(ctx.queue().is_empty());
}

#[test]
fn end_of_stream_is_fatal_but_acknowledged() {
    let ctx = context();
    let worker = AcquisitionWorker::new(ScriptedSource::ascending(3, BLOCK), Arc::clone(&ctx));

    let err = worker.run().unwrap_err();
    assert!(matches!(err, PipelineError::Acquisition(AcquireError::EndOfStream)));
    assert_eq!(err.exit_code(), 8);

    // The three blocks made it into the queue before the stream ended
    assert_eq!(ctx.queue().len(), 3);
    assert!(ctx.acquisition_state().is_acknowledged());
}

/// Reports an interruption nobody asked for.
struct Spurious;

impl BlockSource for Spurious {
    fn next_block(&mut self, _cancel: &CancelToken) -> Result<Buffer, AcquireError> {
        Err(AcquireError::Interrupted)
    }
}

#[test]
fn unrequested_interruption_is_fatal() {
    let ctx = context();
    let worker = AcquisitionWorker::new(Spurious, Arc::clone(&ctx));

    let err = worker.run().unwrap_err();
    assert!(matches!(err, PipelineError::Acquisition(AcquireError::Interrupted)));
    assert_eq!(err.exit_code(), 8);
    assert!(ctx.acquisition_state().is_acknowledged());
}

#[test]
fn wrong_size_block_is_fatal() {
    let ctx = context();
    let source = ScriptedSource::new(vec![Buffer::zeroed(BLOCK), Buffer::zeroed(BLOCK / 2)]);
    let worker = AcquisitionWorker::new(source, Arc::clone(&ctx));

    match worker.run() {
        Err(PipelineError::Acquisition(AcquireError::WrongSize { expected, actual })) => {
            assert_eq!(expected, BLOCK);
            assert_eq!(actual, BLOCK / 2);
        }
        other => panic!("unexpected result: {:?}", other),
    }
    // The short block is not queued
    assert_eq!(ctx.queue().len(), 1);
}

#[test]
fn cancel_request_to_panicked_worker_fails() {
    let state = Arc::new(CancellationState::new());
    let thread = thread::spawn(|| panic!("worker died"));
    let mut handle = WorkerHandle::new("acquisition", Arc::clone(&state), thread);

    wait_until("thread exit", || handle.is_finished());

    let err = handle.request_cancel().unwrap_err();
    assert!(matches!(err, PipelineError::Cancellation { worker: "acquisition", .. }));
    assert_eq!(err.exit_code(), 6);
    assert_eq!(state.phase(), CancelPhase::Running);

    handle.join();
}

#[test]
fn abandoned_worker_rejects_cancellation() {
    let state = Arc::new(CancellationState::new());
    state.abandon();
    assert_eq!(state.phase(), CancelPhase::Abandoned);
    assert!(!state.is_acknowledged());

    // A request leaves the phase alone
    assert_eq!(state.request(), CancelPhase::Abandoned);

    let thread = thread::spawn(|| thread::sleep(Duration::from_millis(200)));
    let mut handle = WorkerHandle::new("transmit", Arc::clone(&state), thread);
    // Rejected even while the thread is still alive
    let err = handle.request_cancel().unwrap_err();
    assert!(matches!(err, PipelineError::Cancellation { worker: "transmit", .. }));

    let err = handle.wait_acknowledged(Duration::from_secs(1)).unwrap_err();
    assert!(matches!(err, PipelineError::Cancellation { .. }));
    handle.join();
}

#[test]
fn stopping_a_lone_worker_joins_it() {
    let ctx = context();
    let worker = AcquisitionWorker::new(Stalled, Arc::clone(&ctx));
    let thread = thread::spawn(move || {
        let _ = worker.run();
    });
    let mut handle = WorkerHandle::new("acquisition", ctx.acquisition_state(), thread);

    handle.stop(Duration::from_secs(5)).unwrap();
    assert!(handle.is_acknowledged());
    assert!(handle.is_finished());
}

#[test]
fn stopping_an_unresponsive_worker_times_out() {
    let state = Arc::new(CancellationState::new());
    // Stuck in a call that ignores the token, then stops on its own
    let thread = {
        let state = Arc::clone(&state);
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(300));
            state.acknowledge();
        })
    };
    let mut handle = WorkerHandle::new("acquisition", Arc::clone(&state), thread);

    let start = Instant::now();
    let err = handle.stop(Duration::from_millis(50)).unwrap_err();
    assert!(matches!(err, PipelineError::ShutdownTimeout(d) if d == Duration::from_millis(50)));
    assert!(start.elapsed() < Duration::from_millis(250));

    // Late acknowledgment is still observed
    assert!(handle.wait_acknowledged(Duration::from_secs(5)).unwrap());
    handle.join();
}

#[test]
fn cancel_request_to_stopped_worker_is_noop() {
    let state = Arc::new(CancellationState::new());
    let thread = {
        let state = Arc::clone(&state);
        thread::spawn(move || state.acknowledge())
    };
    let mut handle = WorkerHandle::new("transmit", Arc::clone(&state), thread);

    wait_until("thread exit", || handle.is_finished());

    assert!(handle.request_cancel().is_ok());
    assert!(handle.is_acknowledged());
    handle.join();
}
