// Module naming follows project convention (SPSC = Single-Producer Single-Consumer)
#[allow(non_snake_case)]
pub mod SPSC;

#[allow(non_snake_case)]
pub mod Core {
    pub mod futex;
    pub mod signals;
    pub mod termination;
    pub use signals::SignalMask;
    pub use termination::{TerminationListener, TERMINATION_SIGNALS};
}

#[allow(non_snake_case)]
pub mod Debug {
    pub mod StructDebug;
}

pub mod config;
pub mod error;

pub use error::{AcquireError, PipelineError, TransmitError};
