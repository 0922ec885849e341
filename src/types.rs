use core::fmt;

/// Session privilege levels.
///
/// Ordering follows the numeric encoding, so `Operator > User` etc.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum PrivilegeLevel {
    /// Callback privilege.
    Callback = 0x01,
    /// User privilege.
    User = 0x02,
    /// Operator privilege.
    Operator = 0x03,
    /// Administrator privilege.
    Administrator = 0x04,
    /// OEM-defined privilege.
    Oem = 0x05,
    /// Access disabled for the user. Never granted to a session.
    NoAccess = 0x0F,
}

impl PrivilegeLevel {
    /// Raw encoding.
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Decode the low nibble of a privilege byte. `0` and reserved values yield `None`.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value & 0x0F {
            0x01 => Some(Self::Callback),
            0x02 => Some(Self::User),
            0x03 => Some(Self::Operator),
            0x04 => Some(Self::Administrator),
            0x05 => Some(Self::Oem),
            0x0F => Some(Self::NoAccess),
            _ => None,
        }
    }
}

/// IPMI session authentication types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum AuthType {
    /// No authentication.
    None = 0x00,
    /// MD2 digest.
    Md2 = 0x01,
    /// MD5 digest.
    Md5 = 0x02,
    /// Clear-text password as auth code.
    Straight = 0x04,
    /// OEM proprietary.
    Oem = 0x05,
    /// RMCP+ session format (IPMI v2.0).
    RmcpPlus = 0x06,
}

impl AuthType {
    /// Raw encoding.
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Decode the low nibble of an auth type byte.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value & 0x0F {
            0x00 => Some(Self::None),
            0x01 => Some(Self::Md2),
            0x02 => Some(Self::Md5),
            0x04 => Some(Self::Straight),
            0x05 => Some(Self::Oem),
            0x06 => Some(Self::RmcpPlus),
            _ => None,
        }
    }

    /// Bit representing this type in an [`AuthTypeSet`].
    pub fn bit(self) -> u8 {
        1 << self.as_u8()
    }
}

/// A set of authentication types, encoded the way Get Channel
/// Authentication Capabilities reports them (bit `n` = auth type `n`).
#[derive(Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct AuthTypeSet(u8);

impl AuthTypeSet {
    /// The empty set.
    pub const EMPTY: Self = Self(0);

    /// Build a set from a list of auth types.
    pub fn of(types: &[AuthType]) -> Self {
        Self(types.iter().fold(0, |acc, t| acc | t.bit()))
    }

    /// Whether `auth` is a member.
    pub fn contains(self, auth: AuthType) -> bool {
        self.0 & auth.bit() != 0
    }

    /// Union of two sets.
    pub fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Raw bitmask.
    pub fn bits(self) -> u8 {
        self.0
    }

    /// Set from a raw bitmask as carried on the wire.
    pub fn from_bits(bits: u8) -> Self {
        Self(bits & 0x3F)
    }
}

impl fmt::Debug for AuthTypeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AuthTypeSet({:#010b})", self.0)
    }
}

/// A raw IPMI response as seen by the client role.
#[derive(Clone, PartialEq, Eq)]
pub struct RawResponse {
    /// IPMI completion code.
    pub completion_code: u8,
    /// Payload bytes after the completion code.
    pub data: Vec<u8>,
}

impl fmt::Debug for RawResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawResponse")
            .field(
                "completion_code",
                &format_args!("{:#04x}", self.completion_code),
            )
            .field("data_len", &self.data.len())
            .finish()
    }
}

/// Identity reported by `Get Device ID`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    /// Device ID (BMC-defined).
    pub device_id: u8,
    /// Device revision (lower 4 bits are the revision).
    pub device_revision: u8,
    /// Firmware major revision.
    pub firmware_major: u8,
    /// Firmware minor revision.
    pub firmware_minor: u8,
    /// Additional device support bitmask.
    pub device_support: u8,
    /// Manufacturer ID (24-bit).
    pub manufacturer_id: u32,
    /// Product ID.
    pub product_id: u16,
}

impl Default for DeviceIdentity {
    fn default() -> Self {
        Self {
            device_id: 0x00,
            device_revision: 0x01,
            firmware_major: 0x01,
            firmware_minor: 0x01,
            // SDR repository device | sensor device
            device_support: 0x02 | 0x01,
            manufacturer_id: 0x01_0000,
            product_id: 0x0000,
        }
    }
}

/// Parsed `Get Channel Authentication Capabilities` response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelAuthCapabilities {
    /// Channel number.
    pub channel_number: u8,
    /// Indicates extended (IPMI v2.0 style) data is present in the response.
    pub v20_data_available: bool,
    /// Enabled IPMI v1.5 authentication types.
    pub enabled_auth_types: AuthTypeSet,
    /// Per-message authentication is disabled when true.
    pub per_message_auth_disabled: bool,
    /// User-level authentication is disabled when true.
    pub user_level_auth_disabled: bool,
    /// One or more non-null user names exist.
    pub non_null_usernames: bool,
    /// One or more null user names with non-null passwords exist.
    pub null_usernames: bool,
    /// Anonymous login (null user/null password) is enabled.
    pub anonymous_login_enabled: bool,
    /// Channel supports IPMI v1.5 sessions.
    pub supports_ipmi_v1_5: bool,
    /// Channel supports IPMI v2.0 (RMCP+) sessions.
    pub supports_ipmi_v2_0: bool,
}

/// Parsed `Get Session Challenge` response.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionChallenge {
    /// Temporary session id to present with Activate Session.
    pub temporary_session_id: u32,
    /// Challenge string to echo back.
    pub challenge: [u8; 16],
}

impl fmt::Debug for SessionChallenge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionChallenge")
            .field(
                "temporary_session_id",
                &format_args!("{:#010x}", self.temporary_session_id),
            )
            .finish_non_exhaustive()
    }
}

/// Parsed `Activate Session` response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivatedSession {
    /// Auth type used for the rest of the session.
    pub auth_type: AuthType,
    /// Established session id.
    pub session_id: u32,
    /// Sequence number the console must start its requests at.
    pub initial_inbound_seq: u32,
    /// Highest privilege the session may request.
    pub max_privilege: PrivilegeLevel,
}

/// Parsed `Get SDR Repository Info` / `Get SEL Info` response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepositoryInfo {
    /// Version byte (`0x51`).
    pub version: u8,
    /// Number of records held.
    pub record_count: u16,
    /// Free space in bytes (`0xFFFF` = unspecified).
    pub free_space: u16,
    /// Timestamp of the most recent addition.
    pub last_add_time: u32,
    /// Timestamp of the most recent erase or delete.
    pub last_erase_time: u32,
    /// Operation support flags.
    pub flags: u8,
}

impl RepositoryInfo {
    /// SEL overflow flag.
    pub fn overflow(&self) -> bool {
        self.flags & 0x80 != 0
    }
}

/// A window of a stored record together with the id of the record after it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordChunk {
    /// Next record id, `0xFFFF` when this was the last record.
    pub next_record_id: u16,
    /// Requested bytes of the record.
    pub data: Vec<u8>,
}

/// Parsed `Get Sensor Reading` response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorReading {
    /// Raw reading.
    pub value: u8,
    /// Event messages enabled.
    pub events_enabled: bool,
    /// Sensor scanning enabled.
    pub scanning_enabled: bool,
    /// Reading/state unavailable.
    pub reading_unavailable: bool,
    /// Threshold / discrete state bits.
    pub event_status: u16,
}
