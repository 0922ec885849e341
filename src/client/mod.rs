pub(crate) mod blocking;
pub(crate) mod core;
pub(crate) mod handshake;

pub use blocking::{Client, ClientBuilder};
