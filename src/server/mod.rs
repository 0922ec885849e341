//! UDP server loops feeding datagrams to a [`SharedController`].

use std::time::Duration;

use crate::controller::SharedController;
use crate::error::{Error, Result};

#[cfg(feature = "blocking")]
pub mod blocking;

#[cfg(feature = "async")]
pub mod tokio;

/// Well-known RMCP port.
pub const IPMI_PORT: u16 = 623;

/// How often session timers are advanced.
pub(crate) const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Largest datagram read from the socket.
pub(crate) const MAX_DATAGRAM_LEN: usize = 1024;

/// Run one datagram through the controller, holding the lock only for the call.
pub(crate) fn handle(controller: &SharedController, datagram: &[u8]) -> Result<Option<Vec<u8>>> {
    let mut controller = controller.lock().map_err(|_| Error::Poisoned)?;
    Ok(controller.handle_datagram(datagram))
}

pub(crate) fn tick(controller: &SharedController, elapsed: Duration) -> Result<()> {
    let mut controller = controller.lock().map_err(|_| Error::Poisoned)?;
    controller.tick(elapsed);
    Ok(())
}
