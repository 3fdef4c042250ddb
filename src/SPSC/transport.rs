//! Datagram transport contract and the UDP implementation.

use crate::error::TransmitError;
use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};
#[cfg(unix)]
use std::os::fd::IntoRawFd;

/// Sends whole blocks to one fixed destination.
pub trait Transport: Send {
    /// Send `block` as a single datagram. Returns the byte count the
    /// transport accepted; anything short of `block.len()` is a failure.
    fn send(&mut self, block: &[u8]) -> io::Result<usize>;

    /// Close the underlying resource and report whether that succeeded.
    fn release(self: Box<Self>) -> io::Result<()>;
}

/// Unconnected UDP socket sending to a configured destination.
pub struct UdpTransport {
    socket: UdpSocket,
    destination: SocketAddr,
}

impl UdpTransport {
    /// Bind an ephemeral local port of the destination's address family.
    pub fn open(destination: SocketAddr) -> Result<Self, TransmitError> {
        let local: SocketAddr = match destination {
            SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
            SocketAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
        };
        let socket = UdpSocket::bind(local).map_err(TransmitError::Open)?;
        log::debug!(
            "UDP transport bound to {:?}, sending to {}",
            socket.local_addr().ok(),
            destination
        );
        Ok(Self {
            socket,
            destination,
        })
    }

    pub fn destination(&self) -> SocketAddr {
        self.destination
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }
}

impl Transport for UdpTransport {
    fn send(&mut self, block: &[u8]) -> io::Result<usize> {
        self.socket.send_to(block, self.destination)
    }

    #[cfg(unix)]
    fn release(self: Box<Self>) -> io::Result<()> {
        // Dropping a UdpSocket swallows close(2) errors; close by hand instead
        let UdpTransport { socket, .. } = *self;
        let fd = socket.into_raw_fd();
        if unsafe { libc::close(fd) } != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    #[cfg(not(unix))]
    fn release(self: Box<Self>) -> io::Result<()> {
        let UdpTransport { socket, .. } = *self;
        drop(socket);
        Ok(())
    }
}
