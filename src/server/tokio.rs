use std::future::Future;
use std::net::SocketAddr;
use std::time::Instant;

use tokio::net::UdpSocket;
use tokio::time::MissedTickBehavior;

use crate::controller::SharedController;
use crate::error::Result;
use crate::server::{MAX_DATAGRAM_LEN, TICK_INTERVAL};

/// Tokio UDP server for a management controller.
#[derive(Debug)]
pub struct Server {
    socket: UdpSocket,
    controller: SharedController,
}

impl Server {
    /// Bind a UDP socket on `addr` serving `controller`.
    pub async fn bind(addr: SocketAddr, controller: SharedController) -> Result<Self> {
        let socket = UdpSocket::bind(addr).await?;
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

    /// Serve until the task is cancelled.
    pub async fn run(&self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Serve until `shutdown` completes.
    ///
    /// Session timers advance once per second. Socket receive errors are
    /// logged and the loop continues; a poisoned controller ends it.
    pub async fn run_until(&self, shutdown: impl Future<Output = ()>) -> Result<()> {
        let mut buf = vec![0u8; MAX_DATAGRAM_LEN];
        let mut ticker = tokio::time::interval(TICK_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last_tick = Instant::now();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("ipmi server shutting down");
                    return Ok(());
                }
                _ = ticker.tick() => {
                    let now = Instant::now();
                    crate::server::tick(&self.controller, now - last_tick)?;
                    last_tick = now;
                }
                received = self.socket.recv_from(&mut buf) => {
                    let (n, peer) = match received {
                        Ok(received) => received,
                        Err(err) => {
                            tracing::warn!(error = %err, "udp receive failed");
                            continue;
                        }
                    };
                    tracing::trace!(%peer, len = n, "datagram received");

                    let Some(reply) = crate::server::handle(&self.controller, &buf[..n])? else {
                        continue;
                    };
                    if let Err(err) = self.socket.send_to(&reply, peer).await {
                        tracing::warn!(%peer, error = %err, "udp send failed");
                    }
                }
            }
        }
    }
}
