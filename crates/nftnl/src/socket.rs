//! Blocking netfilter netlink socket and the transport seam used by the
//! batch capability probe.

use std::os::unix::io::{AsRawFd, RawFd};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use bytes::BytesMut;
use netlink_sys::{Socket, SocketAddr, protocols};

use crate::error::Result;

/// Transport over which request/reply exchanges run.
///
/// The kernel-backed implementation is [`NetlinkSocket`]; tests substitute
/// fakes. An empty `recv` result means the reply stream is exhausted.
pub trait Transport {
    /// Send one request buffer (possibly carrying several batched messages).
    fn send(&mut self, buf: &[u8]) -> Result<()>;

    /// Receive one datagram worth of reply messages.
    fn recv(&mut self) -> Result<Vec<u8>>;
}

/// Blocking NETLINK_NETFILTER socket.
///
/// All I/O blocks the calling thread until data is available or an error
/// occurs; callers wanting an upper bound set a receive timeout first.
/// Not internally synchronized beyond the sequence counter; share across
/// threads only with external locking.
pub struct NetlinkSocket {
    socket: Socket,
    /// Sequence number counter.
    seq: AtomicU32,
    /// Local port ID (assigned by kernel).
    pid: u32,
}

impl NetlinkSocket {
    /// Open and bind a netfilter socket.
    pub fn netfilter() -> Result<Self> {
        let mut socket = Socket::new(protocols::NETLINK_NETFILTER)?;

        // Bind to get a port ID
        let mut addr = SocketAddr::new(0, 0);
        socket.bind(&addr)?;
        socket.get_address(&mut addr)?;
        let pid = addr.port_number();

        Ok(Self {
            socket,
            seq: AtomicU32::new(1),
            pid,
        })
    }

    /// Get the next sequence number.
    pub fn next_seq(&self) -> u32 {
        self.seq.fetch_add(1, Ordering::Relaxed)
    }

    /// Get the local port ID.
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Bound how long a receive may block.
    pub fn set_recv_timeout(&self, timeout: Duration) -> Result<()> {
        let tv = libc::timeval {
            tv_sec: timeout.as_secs() as libc::time_t,
            tv_usec: timeout.subsec_micros() as libc::suseconds_t,
        };
        // SAFETY: the fd is owned by `self.socket` and stays open for the
        // duration of the call; tv is a valid timeval on the stack.
        let ret = unsafe {
            libc::setsockopt(
                self.socket.as_raw_fd(),
                libc::SOL_SOCKET,
                libc::SO_RCVTIMEO,
                &tv as *const libc::timeval as *const libc::c_void,
                std::mem::size_of::<libc::timeval>() as libc::socklen_t,
            )
        };
        if ret < 0 {
            return Err(std::io::Error::last_os_error().into());
        }
        Ok(())
    }

    /// Send a message.
    pub fn send_msg(&self, msg: &[u8]) -> Result<()> {
        self.socket.send(msg, 0)?;
        Ok(())
    }

    /// Receive a message, allocating a buffer.
    pub fn recv_msg(&self) -> Result<Vec<u8>> {
        // Allocate buffer with capacity - don't resize, let recv fill it
        let mut buf = BytesMut::with_capacity(32768);
        self.socket.recv(&mut buf, 0)?;
        Ok(buf.to_vec())
    }
}

impl Transport for NetlinkSocket {
    fn send(&mut self, buf: &[u8]) -> Result<()> {
        self.send_msg(buf)
    }

    fn recv(&mut self) -> Result<Vec<u8>> {
        self.recv_msg()
    }
}

impl AsRawFd for NetlinkSocket {
    fn as_raw_fd(&self) -> RawFd {
        self.socket.as_raw_fd()
    }
}
