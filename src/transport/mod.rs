use crate::controller::SharedController;
use crate::error::{Error, Result};

/// A synchronous transport for exchanging RMCP/IPMI datagrams.
pub trait Transport {
    /// Send a request datagram and wait for the corresponding response datagram.
    fn send_recv(&self, request: &[u8]) -> Result<Vec<u8>>;
}

/// In-process transport that hands datagrams straight to a controller.
///
/// A request the controller drops (no reply) surfaces as [`Error::Timeout`],
/// matching what a UDP peer would observe.
#[derive(Debug, Clone)]
pub struct Loopback {
    controller: SharedController,
}

impl Loopback {
    /// Wrap a shared controller.
    pub fn new(controller: SharedController) -> Self {
        Self { controller }
    }
}

impl Transport for Loopback {
    fn send_recv(&self, request: &[u8]) -> Result<Vec<u8>> {
        let mut controller = self.controller.lock().map_err(|_| Error::Poisoned)?;
        controller.handle_datagram(request).ok_or(Error::Timeout)
    }
}

#[cfg(feature = "blocking")]
pub(crate) mod blocking;
