use core::fmt;
use std::io;

use thiserror::Error;

/// Result type used across this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error (socket, OS, etc.).
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// Operation timed out.
    #[error("timeout waiting for response")]
    Timeout,

    /// A datagram could not be parsed or failed validation.
    #[error("protocol error: {0}")]
    Protocol(&'static str),

    /// A datagram could not be parsed or failed validation.
    #[error("protocol error: {0}")]
    ProtocolOwned(String),

    /// Invalid caller-supplied argument.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// An IPMI command completed with a non-zero completion code.
    #[error("ipmi completion code: {completion_code}")]
    CompletionCode {
        /// Raw completion code returned by the peer.
        completion_code: CompletionCode,
    },

    /// The session handshake could not progress past a step after all retries.
    #[error("session handshake stalled at {step} after {attempts} attempts")]
    Stalled {
        /// Handshake step that kept failing.
        step: &'static str,
        /// Number of attempts made.
        attempts: u32,
    },

    /// The shared controller lock was poisoned by a panicking holder.
    #[error("controller state poisoned")]
    Poisoned,
}

impl Error {
    pub(crate) fn protocol_owned(msg: impl Into<String>) -> Self {
        Self::ProtocolOwned(msg.into())
    }
}

/// An IPMI completion code, carried as the first byte of every response.
///
/// Several command-specific codes share numeric values (e.g. `0x81` means
/// "invalid user" for Get Session Challenge but "no session slot" for
/// Activate Session), so this is a transparent byte rather than an enum.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct CompletionCode(pub u8);

impl CompletionCode {
    /// Command completed normally.
    pub const OK: Self = Self(0x00);

    /// Set Session Privilege: requested level below USER.
    pub const PRIVILEGE_BELOW_USER: Self = Self(0x80);
    /// Set Session Privilege: requested level above the negotiated maximum.
    pub const PRIVILEGE_ABOVE_LIMIT: Self = Self(0x81);
    /// Get Session Challenge: unknown user name.
    pub const INVALID_USER: Self = Self(0x81);
    /// Get Session Challenge: null user name not enabled.
    pub const NULL_USER_DISABLED: Self = Self(0x82);
    /// Activate Session: session table full.
    pub const NO_SESSION_SLOT: Self = Self(0x81);
    /// Activate Session: initial outbound sequence number is zero.
    pub const INVALID_SEQUENCE: Self = Self(0x84);
    /// Activate Session: temporary session id or challenge not recognised.
    pub const INVALID_SESSION_ID: Self = Self(0x85);
    /// Activate Session: requested maximum privilege exceeds the user or channel limit.
    pub const PRIVILEGE_MISMATCH: Self = Self(0x86);
    /// Close Session: target session id not found.
    pub const SESSION_NOT_FOUND: Self = Self(0x87);

    /// Invalid command.
    pub const INVALID_COMMAND: Self = Self(0xC1);
    /// Out of space.
    pub const OUT_OF_SPACE: Self = Self(0xC4);
    /// Reservation cancelled or invalid.
    pub const INVALID_RESERVATION: Self = Self(0xC5);
    /// Request data length invalid.
    pub const REQUEST_DATA_LENGTH_INVALID: Self = Self(0xC7);
    /// Parameter out of range.
    pub const PARAMETER_OUT_OF_RANGE: Self = Self(0xC9);
    /// Cannot return number of requested data bytes.
    pub const CANNOT_RETURN_REQUESTED_LENGTH: Self = Self(0xCA);
    /// Requested sensor, data, or record not present.
    pub const NOT_PRESENT: Self = Self(0xCB);
    /// Invalid data field in request.
    pub const INVALID_DATA_FIELD: Self = Self(0xCC);
    /// Insufficient privilege level.
    pub const INSUFFICIENT_PRIVILEGE: Self = Self(0xD4);
    /// Command not supported in present state.
    pub const NOT_SUPPORTED_IN_PRESENT_STATE: Self = Self(0xD5);
    /// Unspecified error.
    pub const UNSPECIFIED: Self = Self(0xFF);

    /// Raw byte value.
    pub fn as_u8(self) -> u8 {
        self.0
    }

    /// Whether the code signals success.
    pub fn is_ok(self) -> bool {
        self == Self::OK
    }
}

impl fmt::Debug for CompletionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CompletionCode({:#04x})", self.0)
    }
}

impl fmt::Display for CompletionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#04x}", self.0)
    }
}

impl From<CompletionCode> for Error {
    fn from(completion_code: CompletionCode) -> Self {
        Self::CompletionCode { completion_code }
    }
}
