// System constants. Nothing here is parsed at runtime.

use std::net::{Ipv6Addr, SocketAddr, SocketAddrV6};
use std::time::Duration;

/// Size in bytes of every acquired block, and therefore of every datagram.
/// Largest multiple of 1 KiB that still fits one UDP payload on IPv4 and IPv6.
pub const BLOCK_SIZE: usize = 63 * 1024;

/// Destination port for transmitted blocks.
pub const DESTINATION_PORT: u16 = 50002;

/// Destination for transmitted blocks.
pub const DESTINATION: SocketAddr =
    SocketAddr::V6(SocketAddrV6::new(Ipv6Addr::LOCALHOST, DESTINATION_PORT, 0, 0));

/// How long shutdown waits for both workers to acknowledge before escalating.
pub const ACK_DEADLINE: Duration = Duration::from_secs(5);

/// First and largest sleep of the acknowledgment backoff.
pub const ACK_BACKOFF_START: Duration = Duration::from_micros(50);
pub const ACK_BACKOFF_MAX: Duration = Duration::from_millis(10);

/// Upper bound of one idle wait in the transmit worker.
pub const IDLE_WAIT: Duration = Duration::from_millis(10);

/// How the transmit worker waits when the queue is empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConsumerWait {
    /// Re-check immediately. Burns a full core while idle.
    BusyPoll,
    /// Park on the queue's signal word until a push or a cancellation request.
    #[default]
    Notify,
}

/// Runtime settings of one pipeline instance.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub block_size: usize,
    pub destination: SocketAddr,
    pub consumer_wait: ConsumerWait,
    pub ack_deadline: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            block_size: BLOCK_SIZE,
            destination: DESTINATION,
            consumer_wait: ConsumerWait::default(),
            ack_deadline: ACK_DEADLINE,
        }
    }
}
