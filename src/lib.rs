#![deny(unsafe_code)]
#![warn(missing_docs)]

//! An IPMI v1.5 LAN management-controller endpoint.
//!
//! The crate implements:
//! - RMCP framing with IPMI message checksums and ASF presence pong
//! - Session establishment (challenge, activation, privilege, close) with
//!   `NONE` and straight-password authentication
//! - SDR and SEL repositories with reservations, partial reads and clears
//! - A sensor table fed by external pollers
//!
//! [`Controller`] is the protocol engine: it turns one inbound datagram into
//! at most one reply. The [`server`] module wraps it in UDP loops, and
//! [`Client`] drives the remote-console side of a session over any
//! [`Transport`].

mod auth;
mod checksum;
mod config;
mod controller;
mod debug;
mod error;
mod observe;
mod protocol;
mod repository;
mod router;
mod session;
mod transport;
mod types;

mod client;
pub mod commands;
pub mod inventory;
pub mod server;

pub use crate::checksum::{checksum, checksum_byte, is_valid};
pub use crate::client::{Client, ClientBuilder};
pub use crate::config::{ControllerBuilder, ControllerConfig, MAX_SESSIONS, MAX_USERS, UserConfig};
pub use crate::controller::{Controller, SharedController};
pub use crate::error::{CompletionCode, Error, Result};
pub use crate::repository::sensor::SensorState;
pub use crate::session::{
    decode_session_id, encode_session_id, encode_temporary_session_id, temporary_session_user,
};
#[cfg(feature = "blocking")]
pub use crate::transport::blocking::UdpTransport;
pub use crate::transport::{Loopback, Transport};
pub use crate::types::{
    ActivatedSession, AuthType, AuthTypeSet, ChannelAuthCapabilities, DeviceIdentity,
    PrivilegeLevel, RawResponse, RecordChunk, RepositoryInfo, SensorReading, SessionChallenge,
};
