use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use crate::controller::SharedController;
use crate::error::Result;
use crate::server::{MAX_DATAGRAM_LEN, TICK_INTERVAL};
use crate::transport::blocking::is_timeout;

/// Blocking UDP server for a management controller.
#[derive(Debug)]
pub struct Server {
    socket: UdpSocket,
    controller: SharedController,
}

impl Server {
    /// Bind a UDP socket on `addr` serving `controller`.
    pub fn bind(addr: SocketAddr, controller: SharedController) -> Result<Self> {
        let socket = UdpSocket::bind(addr)?;
        socket.set_read_timeout(Some(TICK_INTERVAL))?;
        tracing::info!(addr = %socket.local_addr()?, "ipmi server listening");
        Ok(Self { socket, controller })
    }

    /// Address the socket is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Controller served by this socket.
    pub fn controller(&self) -> &SharedController {
        &self.controller
    }

    /// Serve until `shutdown` is set. The flag is checked at least once per second.
    pub fn run(&self, shutdown: &AtomicBool) -> Result<()> {
        let mut buf = vec![0u8; MAX_DATAGRAM_LEN];
        let mut last_tick = Instant::now();

        while !shutdown.load(Ordering::Relaxed) {
            match self.socket.recv_from(&mut buf) {
                Ok((n, peer)) => {
                    if let Some(reply) = crate::server::handle(&self.controller, &buf[..n])? {
                        if let Err(err) = self.socket.send_to(&reply, peer) {
                            tracing::warn!(%peer, error = %err, "udp send failed");
                        }
                    }
                }
                Err(err) if is_timeout(&err) => {}
                Err(err) => tracing::warn!(error = %err, "udp receive failed"),
            }

            let elapsed = last_tick.elapsed();
            if elapsed >= TICK_INTERVAL {
                crate::server::tick(&self.controller, elapsed)?;
                last_tick = Instant::now();
            }
        }

        tracing::info!("ipmi server shutting down");
        Ok(())
    }
}
