use dmxp_streamer::config::{ConsumerWait, PipelineConfig};
use dmxp_streamer::error::{PipelineError, TransmitError};
use dmxp_streamer::SPSC::{Buffer, CancelPhase, PipelineContext, TransmitWorker, Transport};
use parking_lot::Mutex;
use std::io;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const BLOCK: usize = 128;

fn context(wait: ConsumerWait) -> Arc<PipelineContext> {
    Arc::new(PipelineContext::new(PipelineConfig {
        block_size: BLOCK,
        consumer_wait: wait,
        ..PipelineConfig::default()
    }))
}

#[derive(Clone, Copy)]
enum Behaviour {
    AcceptAll,
    AcceptShort,
    FailSend,
}

#[derive(Default)]
struct Record {
    sent: Vec<Vec<u8>>,
    attempts: usize,
    released: bool,
    /// Transmit phase observed at release time.
    phase_at_release: Option<CancelPhase>,
}

struct StubTransport {
    behaviour: Behaviour,
    fail_release: bool,
    record: Arc<Mutex<Record>>,
    ctx: Arc<PipelineContext>,
}

impl StubTransport {
    fn new(behaviour: Behaviour, ctx: &Arc<PipelineContext>) -> (Box<Self>, Arc<Mutex<Record>>) {
        let record = Arc::new(Mutex::new(Record::default()));
        let stub = Box::new(Self {
            behaviour,
            fail_release: false,
            record: Arc::clone(&record),
            ctx: Arc::clone(ctx),
        });
        (stub, record)
    }
}

impl Transport for StubTransport {
    fn send(&mut self, block: &[u8]) -> io::Result<usize> {
        let mut record = self.record.lock();
        record.attempts += 1;
        match self.behaviour {
            Behaviour::AcceptAll => {
                record.sent.push(block.to_vec());
                Ok(block.len())
            }
            Behaviour::AcceptShort => Ok(block.len() - 1),
            Behaviour::FailSend => Err(io::Error::new(io::ErrorKind::Other, "network unreachable")),
        }
    }

    fn release(self: Box<Self>) -> io::Result<()> {
        let mut record = self.record.lock();
        record.released = true;
        record.phase_at_release = Some(self.ctx.transmit_state().phase());
        if self.fail_release {
            return Err(io::Error::new(io::ErrorKind::Other, "close failed"));
        }
        Ok(())
    }
}

#[test]
fn partial_send_is_fatal_and_not_retried() {
    let ctx = context(ConsumerWait::Notify);
    ctx.queue().push(Buffer::filled(BLOCK, 1));
    ctx.queue().push(Buffer::filled(BLOCK, 2));

    let (stub, record) = StubTransport::new(Behaviour::AcceptShort, &ctx);
    let err = TransmitWorker::new(stub, Arc::clone(&ctx)).run().unwrap_err();

    match &err {
        PipelineError::Transmission(TransmitError::Partial { sent, expected }) => {
            assert_eq!(*sent, BLOCK - 1);
            assert_eq!(*expected, BLOCK);
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(err.exit_code(), 11);

    let record = record.lock();
    assert_eq!(record.attempts, 1, "failed block was retried");
    assert!(record.released);

    // The failed block is gone, the second one is untouched
    assert_eq!(ctx.queue().snapshot(), (1, 2, 1));
    assert!(ctx.transmit_state().is_acknowledged());
}

#[test]
fn send_error_is_fatal() {
    let ctx = context(ConsumerWait::Notify);
    ctx.queue().push(Buffer::filled(BLOCK, 1));

    let (stub, record) = StubTransport::new(Behaviour::FailSend, &ctx);
    let err = TransmitWorker::new(stub, Arc::clone(&ctx)).run().unwrap_err();

    assert!(matches!(err, PipelineError::Transmission(TransmitError::Send(_))));
    assert_eq!(err.exit_code(), 11);
    assert!(record.lock().released);
    assert!(ctx.queue().is_empty());
}

#[test]
fn release_failure_is_reported() {
    let ctx = context(ConsumerWait::Notify);
    let (mut stub, record) = StubTransport::new(Behaviour::AcceptAll, &ctx);
    stub.fail_release = true;

    // Already cancelled: one pass through the loop, then release
    ctx.transmit_state().request();
    let err = TransmitWorker::new(stub, Arc::clone(&ctx)).run().unwrap_err();

    assert!(matches!(err, PipelineError::ResourceRelease(_)));
    assert_eq!(err.exit_code(), 12);
    assert!(record.lock().released);
    assert!(ctx.transmit_state().is_acknowledged());
}

#[test]
fn release_happens_before_acknowledgment() {
    let ctx = context(ConsumerWait::Notify);
    let (stub, record) = StubTransport::new(Behaviour::AcceptAll, &ctx);

    ctx.transmit_state().request();
    TransmitWorker::new(stub, Arc::clone(&ctx)).run().unwrap();

    let record = record.lock();
    assert_eq!(record.phase_at_release, Some(CancelPhase::CancellationRequested));
    assert!(ctx.transmit_state().is_acknowledged());
}

fn sends_in_order_until_cancelled(wait: ConsumerWait) {
    let ctx = context(wait);
    let (stub, record) = StubTransport::new(Behaviour::AcceptAll, &ctx);

    let handle = {
        let ctx = Arc::clone(&ctx);
        thread::spawn(move || TransmitWorker::new(stub, ctx).run())
    };

    for marker in 1..=5u8 {
        ctx.queue().push(Buffer::filled(BLOCK, marker));
        thread::sleep(Duration::from_millis(2));
    }

    let start = Instant::now();
    while record.lock().sent.len() < 5 {
        assert!(start.elapsed() < Duration::from_secs(5), "blocks not sent");
        thread::sleep(Duration::from_millis(1));
    }

    ctx.transmit_state().request();
    ctx.queue().notify();
    let stop = Instant::now();
    assert!(handle.join().unwrap().is_ok());
    assert!(stop.elapsed() < Duration::from_secs(1));

    let record = record.lock();
    let markers: Vec<u8> = record.sent.iter().map(|b| b[0]).collect();
    assert_eq!(markers, vec![1, 2, 3, 4, 5]);
    assert!(record.sent.iter().all(|b| b.len() == BLOCK));
    assert!(record.released);
    assert!(ctx.transmit_state().is_acknowledged());
}

#[test]
fn notify_mode_sends_in_order() {
    sends_in_order_until_cancelled(ConsumerWait::Notify);
}

#[test]
fn busy_poll_mode_sends_in_order() {
    sends_in_order_until_cancelled(ConsumerWait::BusyPoll);
}

#[test]
fn no_takes_after_acknowledgment() {
    let ctx = context(ConsumerWait::Notify);
    let (stub, record) = StubTransport::new(Behaviour::AcceptAll, &ctx);

    let handle = {
        let ctx = Arc::clone(&ctx);
        thread::spawn(move || TransmitWorker::new(stub, ctx).run())
    };

    thread::sleep(Duration::from_millis(10));
    ctx.transmit_state().request();
    ctx.queue().notify();
    handle.join().unwrap().unwrap();

    ctx.queue().push(Buffer::filled(BLOCK, 9));
    thread::sleep(Duration::from_millis(20));
    assert_eq!(ctx.queue().len(), 1);
    assert_eq!(record.lock().attempts, 0);
}
