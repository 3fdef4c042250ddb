// Turns asynchronous termination signals into a plain callback on a
// dedicated thread. The signal handler itself only writes to signal-hook's
// self-pipe.

use libc::SIGIO;
use signal_hook::consts::signal::{
    SIGALRM, SIGHUP, SIGINT, SIGPIPE, SIGPROF, SIGQUIT, SIGTERM, SIGUSR1, SIGUSR2, SIGVTALRM,
    SIGXCPU, SIGXFSZ,
};
use signal_hook::iterator::{Handle, Signals};
use std::io;
use std::thread::{self, JoinHandle};

/// Every catchable signal whose default action ends the process.
///
/// Synchronous fault signals (SIGSEGV, SIGBUS, SIGILL, SIGFPE, SIGTRAP,
/// SIGSYS) and SIGABRT are left alone: they report a bug in this process,
/// not a request to stop.
pub const TERMINATION_SIGNALS: &[libc::c_int] = &[
    SIGHUP, SIGINT, SIGQUIT, SIGTERM, SIGUSR1, SIGUSR2, SIGALRM, SIGPIPE, SIGIO, SIGPROF,
    SIGVTALRM, SIGXCPU, SIGXFSZ,
];

/// Owns the handlers for [`TERMINATION_SIGNALS`] and the thread reading them.
///
/// The callback runs once, for the first signal. Later signals are consumed
/// and logged so they cannot kill the process mid-shutdown. Dropping the
/// listener unregisters the handlers and joins the thread.
pub struct TerminationListener {
    handle: Handle,
    thread: Option<JoinHandle<()>>,
}

impl TerminationListener {
    pub fn spawn<F>(on_signal: F) -> io::Result<Self>
    where
        F: FnOnce(libc::c_int) + Send + 'static,
    {
        let mut signals = Signals::new(TERMINATION_SIGNALS)?;
        let handle = signals.handle();

        let thread = thread::Builder::new()
            .name("termination".to_string())
            .spawn(move || {
                let mut on_signal = Some(on_signal);
                for signal in signals.forever() {
                    match on_signal.take() {
                        Some(callback) => {
                            log::info!("received signal {}", signal);
                            callback(signal);
                        }
                        None => log::debug!("ignoring repeated signal {}", signal),
                    }
                }
            });

        let thread = match thread {
            Ok(thread) => thread,
            Err(e) => {
                handle.close();
                return Err(e);
            }
        };

        Ok(Self {
            handle,
            thread: Some(thread),
        })
    }
}

impl Drop for TerminationListener {
    fn drop(&mut self) {
        self.handle.close();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("termination listener panicked");
            }
        }
    }
}
