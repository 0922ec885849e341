use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::transport::Transport;

/// Largest datagram we read; IPMI 1.5 LAN frames stay well below this.
const MAX_DATAGRAM_LEN: usize = 1024;

/// Blocking UDP transport to a management controller.
///
/// A request is resent each time the read timeout passes without a reply,
/// up to `attempts` sends in total.
#[derive(Debug)]
pub struct UdpTransport {
    socket: UdpSocket,
    attempts: u32,
}

impl UdpTransport {
    /// Bind an ephemeral local port and connect it to `target` (usually port 623).
    pub fn connect(target: SocketAddr, timeout: Duration, attempts: u32) -> Result<Self> {
        if timeout.is_zero() {
            return Err(Error::InvalidArgument("timeout must be non-zero"));
        }
        let local = match target {
            SocketAddr::V4(_) => SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)),
            SocketAddr::V6(_) => SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0)),
        };

        let socket = UdpSocket::bind(local)?;
        socket.connect(target)?;
        socket.set_read_timeout(Some(timeout))?;
        tracing::debug!(%target, local = %socket.local_addr()?, "udp transport connected");

        Ok(Self {
            socket,
            attempts: attempts.max(1),
        })
    }

    /// Local address of the underlying socket.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }
}

impl Transport for UdpTransport {
    fn send_recv(&self, request: &[u8]) -> Result<Vec<u8>> {
        crate::debug::dump_hex("udp request", request);
        let mut buf = vec![0u8; MAX_DATAGRAM_LEN];

        for attempt in 1..=self.attempts {
            self.socket.send(request)?;
            match self.socket.recv(&mut buf) {
                Ok(n) => {
                    buf.truncate(n);
                    return Ok(buf);
                }
                Err(e) if is_timeout(&e) => {
                    tracing::debug!(attempt, "no reply before read timeout");
                }
                Err(e) => return Err(Error::Io(e)),
            }
        }

        Err(Error::Timeout)
    }
}

/// Whether a socket error is a read timeout (reported differently per platform).
pub(crate) fn is_timeout(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
    )
}
