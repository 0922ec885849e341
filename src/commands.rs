//! Typed IPMI commands for the client role, and the command codes shared
//! with the controller's router.

use crate::auth::{CREDENTIAL_LEN, pad_credential};
use crate::error::{CompletionCode, Error, Result};
use crate::types::{
    ActivatedSession, AuthType, AuthTypeSet, ChannelAuthCapabilities, DeviceIdentity,
    PrivilegeLevel, RawResponse, RecordChunk, RepositoryInfo, SensorReading, SessionChallenge,
};

/// Net function and command codes.
pub mod codes {
    /// Sensor/Event net function.
    pub const NETFN_SENSOR: u8 = 0x04;
    /// Application net function.
    pub const NETFN_APP: u8 = 0x06;
    /// Storage net function.
    pub const NETFN_STORAGE: u8 = 0x0A;

    /// Get Device ID.
    pub const GET_DEVICE_ID: u8 = 0x01;
    /// Get Channel Authentication Capabilities.
    pub const GET_CHANNEL_AUTH_CAPABILITIES: u8 = 0x38;
    /// Get Session Challenge.
    pub const GET_SESSION_CHALLENGE: u8 = 0x39;
    /// Activate Session.
    pub const ACTIVATE_SESSION: u8 = 0x3A;
    /// Set Session Privilege Level.
    pub const SET_SESSION_PRIVILEGE: u8 = 0x3B;
    /// Close Session.
    pub const CLOSE_SESSION: u8 = 0x3C;

    /// Get SDR Repository Info.
    pub const GET_SDR_REPOSITORY_INFO: u8 = 0x20;
    /// Reserve SDR Repository.
    pub const RESERVE_SDR_REPOSITORY: u8 = 0x22;
    /// Get SDR.
    pub const GET_SDR: u8 = 0x23;
    /// Add SDR.
    pub const ADD_SDR: u8 = 0x24;
    /// Clear SDR Repository.
    pub const CLEAR_SDR_REPOSITORY: u8 = 0x27;
    /// Get SEL Info.
    pub const GET_SEL_INFO: u8 = 0x40;
    /// Reserve SEL.
    pub const RESERVE_SEL: u8 = 0x42;
    /// Get SEL Entry.
    pub const GET_SEL_ENTRY: u8 = 0x43;
    /// Add SEL Entry.
    pub const ADD_SEL_ENTRY: u8 = 0x44;
    /// Delete SEL Entry.
    pub const DELETE_SEL_ENTRY: u8 = 0x46;
    /// Clear SEL.
    pub const CLEAR_SEL: u8 = 0x47;
    /// Get SEL Time.
    pub const GET_SEL_TIME: u8 = 0x48;
    /// Set SEL Time.
    pub const SET_SEL_TIME: u8 = 0x49;

    /// Get Sensor Reading.
    pub const GET_SENSOR_READING: u8 = 0x2D;
}

use codes::*;

/// A typed IPMI command (single request/response).
pub trait Command {
    /// Parsed output type.
    type Output;

    /// Network Function (NetFn) for the request.
    const NETFN: u8;

    /// Command number.
    const CMD: u8;

    /// Encode request payload bytes (excluding NetFn/Cmd framing).
    fn request_data(&self) -> Vec<u8>;

    /// Parse a raw response into the typed output.
    fn parse_response(&self, response: RawResponse) -> Result<Self::Output>;
}

fn ok_data(response: &RawResponse) -> Result<&[u8]> {
    if response.completion_code != 0x00 {
        return Err(Error::CompletionCode {
            completion_code: CompletionCode(response.completion_code),
        });
    }
    Ok(&response.data)
}

fn record_id(data: &[u8], what: &'static str) -> Result<u16> {
    if data.len() < 2 {
        return Err(Error::Protocol(what));
    }
    Ok(u16::from_le_bytes([data[0], data[1]]))
}

fn clear_request(reservation: u16, erase: bool) -> Vec<u8> {
    let [lo, hi] = reservation.to_le_bytes();
    vec![lo, hi, b'C', b'L', b'R', if erase { 0xAA } else { 0x00 }]
}

fn record_request(reservation: u16, record_id: u16, offset: u8, count: u8) -> Vec<u8> {
    let mut out = Vec::with_capacity(6);
    out.extend_from_slice(&reservation.to_le_bytes());
    out.extend_from_slice(&record_id.to_le_bytes());
    out.push(offset);
    out.push(count);
    out
}

/// `Get Device ID` (App NetFn, cmd 0x01).
#[derive(Debug, Clone, Copy)]
pub struct GetDeviceId;

impl Command for GetDeviceId {
    type Output = DeviceIdentity;
    const NETFN: u8 = NETFN_APP;
    const CMD: u8 = GET_DEVICE_ID;

    fn request_data(&self) -> Vec<u8> {
        Vec::new()
    }

    fn parse_response(&self, response: RawResponse) -> Result<Self::Output> {
        parse_device_id(ok_data(&response)?)
    }
}

/// `Get Channel Authentication Capabilities` (App NetFn, cmd 0x38).
#[derive(Debug, Clone, Copy)]
pub struct GetChannelAuthCapabilities {
    /// Channel number (low nibble), `0x0E` for the current channel.
    pub channel: u8,
    /// Privilege to query.
    pub privilege: PrivilegeLevel,
    /// Ask for the extended capability byte.
    pub request_v2_data: bool,
}

impl GetChannelAuthCapabilities {
    /// Query the channel the request arrives on.
    pub fn current_channel(privilege: PrivilegeLevel) -> Self {
        Self {
            channel: 0x0E,
            privilege,
            request_v2_data: false,
        }
    }
}

impl Command for GetChannelAuthCapabilities {
    type Output = ChannelAuthCapabilities;
    const NETFN: u8 = NETFN_APP;
    const CMD: u8 = GET_CHANNEL_AUTH_CAPABILITIES;

    fn request_data(&self) -> Vec<u8> {
        let channel = if self.request_v2_data {
            self.channel | 0x80
        } else {
            self.channel & 0x0F
        };
        vec![channel, self.privilege.as_u8() & 0x0F]
    }

    fn parse_response(&self, response: RawResponse) -> Result<Self::Output> {
        parse_channel_auth_capabilities(ok_data(&response)?)
    }
}

/// `Get Session Challenge` (App NetFn, cmd 0x39).
#[derive(Clone)]
pub struct GetSessionChallenge {
    /// Auth type the session will use.
    pub auth_type: AuthType,
    /// User name, zero-padded to 16 bytes on the wire.
    pub username: Vec<u8>,
}

impl core::fmt::Debug for GetSessionChallenge {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("GetSessionChallenge")
            .field("auth_type", &self.auth_type)
            .field("username", &String::from_utf8_lossy(&self.username))
            .finish()
    }
}

impl Command for GetSessionChallenge {
    type Output = SessionChallenge;
    const NETFN: u8 = NETFN_APP;
    const CMD: u8 = GET_SESSION_CHALLENGE;

    fn request_data(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(1 + CREDENTIAL_LEN);
        out.push(self.auth_type.as_u8());
        out.extend_from_slice(&pad_credential(&self.username));
        out
    }

    fn parse_response(&self, response: RawResponse) -> Result<Self::Output> {
        let data = ok_data(&response)?;
        if data.len() < 20 {
            return Err(Error::Protocol("Get Session Challenge response too short"));
        }
        let mut challenge = [0u8; 16];
        challenge.copy_from_slice(&data[4..20]);
        Ok(SessionChallenge {
            temporary_session_id: u32::from_le_bytes([data[0], data[1], data[2], data[3]]),
            challenge,
        })
    }
}

/// `Activate Session` (App NetFn, cmd 0x3A).
#[derive(Clone)]
pub struct ActivateSession {
    /// Auth type for the session.
    pub auth_type: AuthType,
    /// Highest privilege the session should be allowed.
    pub max_privilege: PrivilegeLevel,
    /// Challenge returned by Get Session Challenge.
    pub challenge: [u8; 16],
    /// Sequence number the BMC should start its replies at. Must be non-zero.
    pub initial_outbound_seq: u32,
}

impl core::fmt::Debug for ActivateSession {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ActivateSession")
            .field("auth_type", &self.auth_type)
            .field("max_privilege", &self.max_privilege)
            .field("initial_outbound_seq", &self.initial_outbound_seq)
            .finish_non_exhaustive()
    }
}

impl Command for ActivateSession {
    type Output = ActivatedSession;
    const NETFN: u8 = NETFN_APP;
    const CMD: u8 = ACTIVATE_SESSION;

    fn request_data(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(22);
        out.push(self.auth_type.as_u8());
        out.push(self.max_privilege.as_u8());
        out.extend_from_slice(&self.challenge);
        out.extend_from_slice(&self.initial_outbound_seq.to_le_bytes());
        out
    }

    fn parse_response(&self, response: RawResponse) -> Result<Self::Output> {
        let data = ok_data(&response)?;
        if data.len() < 10 {
            return Err(Error::Protocol("Activate Session response too short"));
        }
        Ok(ActivatedSession {
            auth_type: AuthType::from_u8(data[0])
                .ok_or(Error::Protocol("unknown session auth type"))?,
            session_id: u32::from_le_bytes([data[1], data[2], data[3], data[4]]),
            initial_inbound_seq: u32::from_le_bytes([data[5], data[6], data[7], data[8]]),
            max_privilege: PrivilegeLevel::from_u8(data[9])
                .ok_or(Error::Protocol("unknown privilege level"))?,
        })
    }
}

/// `Set Session Privilege Level` (App NetFn, cmd 0x3B).
#[derive(Debug, Clone, Copy)]
pub struct SetSessionPrivilegeLevel {
    /// Requested privilege.
    pub privilege: PrivilegeLevel,
}

impl Command for SetSessionPrivilegeLevel {
    type Output = PrivilegeLevel;
    const NETFN: u8 = NETFN_APP;
    const CMD: u8 = SET_SESSION_PRIVILEGE;

    fn request_data(&self) -> Vec<u8> {
        vec![self.privilege.as_u8()]
    }

    fn parse_response(&self, response: RawResponse) -> Result<Self::Output> {
        let data = ok_data(&response)?;
        data.first()
            .and_then(|&b| PrivilegeLevel::from_u8(b))
            .ok_or(Error::Protocol("Set Session Privilege response too short"))
    }
}

/// `Close Session` (App NetFn, cmd 0x3C).
#[derive(Debug, Clone, Copy)]
pub struct CloseSession {
    /// Session to close.
    pub session_id: u32,
}

impl Command for CloseSession {
    type Output = ();
    const NETFN: u8 = NETFN_APP;
    const CMD: u8 = CLOSE_SESSION;

    fn request_data(&self) -> Vec<u8> {
        self.session_id.to_le_bytes().to_vec()
    }

    fn parse_response(&self, response: RawResponse) -> Result<Self::Output> {
        let _ = ok_data(&response)?;
        Ok(())
    }
}

/// `Get SDR Repository Info` (Storage NetFn, cmd 0x20).
#[derive(Debug, Clone, Copy)]
pub struct GetSdrRepositoryInfo;

impl Command for GetSdrRepositoryInfo {
    type Output = RepositoryInfo;
    const NETFN: u8 = NETFN_STORAGE;
    const CMD: u8 = GET_SDR_REPOSITORY_INFO;

    fn request_data(&self) -> Vec<u8> {
        Vec::new()
    }

    fn parse_response(&self, response: RawResponse) -> Result<Self::Output> {
        parse_repository_info(ok_data(&response)?)
    }
}

/// `Reserve SDR Repository` (Storage NetFn, cmd 0x22).
#[derive(Debug, Clone, Copy)]
pub struct ReserveSdrRepository;

impl Command for ReserveSdrRepository {
    type Output = u16;
    const NETFN: u8 = NETFN_STORAGE;
    const CMD: u8 = RESERVE_SDR_REPOSITORY;

    fn request_data(&self) -> Vec<u8> {
        Vec::new()
    }

    fn parse_response(&self, response: RawResponse) -> Result<Self::Output> {
        record_id(ok_data(&response)?, "Reserve SDR response too short")
    }
}

/// `Get SDR` (Storage NetFn, cmd 0x23).
#[derive(Debug, Clone, Copy)]
pub struct GetSdr {
    /// Reservation token, `0` for none.
    pub reservation: u16,
    /// Record id; `0x0000` first, `0xFFFF` last.
    pub record_id: u16,
    /// Offset into the record.
    pub offset: u8,
    /// Bytes to read; `0xFF` reads to the end.
    pub count: u8,
}

impl Command for GetSdr {
    type Output = RecordChunk;
    const NETFN: u8 = NETFN_STORAGE;
    const CMD: u8 = GET_SDR;

    fn request_data(&self) -> Vec<u8> {
        record_request(self.reservation, self.record_id, self.offset, self.count)
    }

    fn parse_response(&self, response: RawResponse) -> Result<Self::Output> {
        parse_record_chunk(ok_data(&response)?)
    }
}

/// `Add SDR` (Storage NetFn, cmd 0x24).
#[derive(Debug, Clone)]
pub struct AddSdr {
    /// Full record bytes; the record id field is assigned by the repository.
    pub record: Vec<u8>,
}

impl Command for AddSdr {
    type Output = u16;
    const NETFN: u8 = NETFN_STORAGE;
    const CMD: u8 = ADD_SDR;

    fn request_data(&self) -> Vec<u8> {
        self.record.clone()
    }

    fn parse_response(&self, response: RawResponse) -> Result<Self::Output> {
        record_id(ok_data(&response)?, "Add SDR response too short")
    }
}

/// Live value update of an existing sensor, sent as an `Add SDR` request
/// whose version byte is zero.
#[derive(Debug, Clone, Copy)]
pub struct UpdateSensorValue {
    /// Sensor owner LUN.
    pub lun: u8,
    /// Sensor number.
    pub number: u8,
    /// New raw reading.
    pub value: u8,
}

impl Command for UpdateSensorValue {
    type Output = u16;
    const NETFN: u8 = NETFN_STORAGE;
    const CMD: u8 = ADD_SDR;

    fn request_data(&self) -> Vec<u8> {
        vec![0x00, 0x00, 0x00, self.lun & 0x03, self.number, self.value]
    }

    fn parse_response(&self, response: RawResponse) -> Result<Self::Output> {
        record_id(ok_data(&response)?, "Add SDR response too short")
    }
}

/// `Clear SDR Repository` (Storage NetFn, cmd 0x27).
#[derive(Debug, Clone, Copy)]
pub struct ClearSdrRepository {
    /// Reservation token, `0` for none.
    pub reservation: u16,
    /// `true` erases, `false` only queries the erase status.
    pub erase: bool,
}

impl Command for ClearSdrRepository {
    type Output = u8;
    const NETFN: u8 = NETFN_STORAGE;
    const CMD: u8 = CLEAR_SDR_REPOSITORY;

    fn request_data(&self) -> Vec<u8> {
        clear_request(self.reservation, self.erase)
    }

    fn parse_response(&self, response: RawResponse) -> Result<Self::Output> {
        let data = ok_data(&response)?;
        data.first()
            .copied()
            .ok_or(Error::Protocol("Clear SDR Repository response too short"))
    }
}

/// `Get SEL Info` (Storage NetFn, cmd 0x40).
#[derive(Debug, Clone, Copy)]
pub struct GetSelInfo;

impl Command for GetSelInfo {
    type Output = RepositoryInfo;
    const NETFN: u8 = NETFN_STORAGE;
    const CMD: u8 = GET_SEL_INFO;

    fn request_data(&self) -> Vec<u8> {
        Vec::new()
    }

    fn parse_response(&self, response: RawResponse) -> Result<Self::Output> {
        parse_repository_info(ok_data(&response)?)
    }
}

/// `Reserve SEL` (Storage NetFn, cmd 0x42).
#[derive(Debug, Clone, Copy)]
pub struct ReserveSel;

impl Command for ReserveSel {
    type Output = u16;
    const NETFN: u8 = NETFN_STORAGE;
    const CMD: u8 = RESERVE_SEL;

    fn request_data(&self) -> Vec<u8> {
        Vec::new()
    }

    fn parse_response(&self, response: RawResponse) -> Result<Self::Output> {
        record_id(ok_data(&response)?, "Reserve SEL response too short")
    }
}

/// `Get SEL Entry` (Storage NetFn, cmd 0x43).
#[derive(Debug, Clone, Copy)]
pub struct GetSelEntry {
    /// Reservation token, `0` for none.
    pub reservation: u16,
    /// Record id; `0x0000` first, `0xFFFF` last.
    pub record_id: u16,
    /// Offset into the record.
    pub offset: u8,
    /// Bytes to read; `0xFF` reads to the end.
    pub count: u8,
}

impl Command for GetSelEntry {
    type Output = RecordChunk;
    const NETFN: u8 = NETFN_STORAGE;
    const CMD: u8 = GET_SEL_ENTRY;

    fn request_data(&self) -> Vec<u8> {
        record_request(self.reservation, self.record_id, self.offset, self.count)
    }

    fn parse_response(&self, response: RawResponse) -> Result<Self::Output> {
        parse_record_chunk(ok_data(&response)?)
    }
}

/// `Add SEL Entry` (Storage NetFn, cmd 0x44).
#[derive(Debug, Clone, Copy)]
pub struct AddSelEntry {
    /// 16-byte SEL record; id (and timestamp, for standard records) are assigned on add.
    pub record: [u8; 16],
}

impl Command for AddSelEntry {
    type Output = u16;
    const NETFN: u8 = NETFN_STORAGE;
    const CMD: u8 = ADD_SEL_ENTRY;

    fn request_data(&self) -> Vec<u8> {
        self.record.to_vec()
    }

    fn parse_response(&self, response: RawResponse) -> Result<Self::Output> {
        record_id(ok_data(&response)?, "Add SEL Entry response too short")
    }
}

/// `Delete SEL Entry` (Storage NetFn, cmd 0x46).
#[derive(Debug, Clone, Copy)]
pub struct DeleteSelEntry {
    /// Reservation token, `0` for none.
    pub reservation: u16,
    /// Record id; `0x0000` first, `0xFFFF` last.
    pub record_id: u16,
}

impl Command for DeleteSelEntry {
    type Output = u16;
    const NETFN: u8 = NETFN_STORAGE;
    const CMD: u8 = DELETE_SEL_ENTRY;

    fn request_data(&self) -> Vec<u8> {
        let mut out = self.reservation.to_le_bytes().to_vec();
        out.extend_from_slice(&self.record_id.to_le_bytes());
        out
    }

    fn parse_response(&self, response: RawResponse) -> Result<Self::Output> {
        record_id(ok_data(&response)?, "Delete SEL Entry response too short")
    }
}

/// `Clear SEL` (Storage NetFn, cmd 0x47).
#[derive(Debug, Clone, Copy)]
pub struct ClearSel {
    /// Reservation token, `0` for none.
    pub reservation: u16,
    /// `true` erases, `false` only queries the erase status.
    pub erase: bool,
}

impl Command for ClearSel {
    type Output = u8;
    const NETFN: u8 = NETFN_STORAGE;
    const CMD: u8 = CLEAR_SEL;

    fn request_data(&self) -> Vec<u8> {
        clear_request(self.reservation, self.erase)
    }

    fn parse_response(&self, response: RawResponse) -> Result<Self::Output> {
        let data = ok_data(&response)?;
        data.first()
            .copied()
            .ok_or(Error::Protocol("Clear SEL response too short"))
    }
}

/// `Get SEL Time` (Storage NetFn, cmd 0x48).
#[derive(Debug, Clone, Copy)]
pub struct GetSelTime;

impl Command for GetSelTime {
    type Output = u32;
    const NETFN: u8 = NETFN_STORAGE;
    const CMD: u8 = GET_SEL_TIME;

    fn request_data(&self) -> Vec<u8> {
        Vec::new()
    }

    fn parse_response(&self, response: RawResponse) -> Result<Self::Output> {
        let data = ok_data(&response)?;
        if data.len() < 4 {
            return Err(Error::Protocol("Get SEL Time response too short"));
        }
        Ok(u32::from_le_bytes([data[0], data[1], data[2], data[3]]))
    }
}

/// `Set SEL Time` (Storage NetFn, cmd 0x49).
#[derive(Debug, Clone, Copy)]
pub struct SetSelTime {
    /// Seconds since the Unix epoch.
    pub time: u32,
}

impl Command for SetSelTime {
    type Output = ();
    const NETFN: u8 = NETFN_STORAGE;
    const CMD: u8 = SET_SEL_TIME;

    fn request_data(&self) -> Vec<u8> {
        self.time.to_le_bytes().to_vec()
    }

    fn parse_response(&self, response: RawResponse) -> Result<Self::Output> {
        let _ = ok_data(&response)?;
        Ok(())
    }
}

/// `Get Sensor Reading` (Sensor/Event NetFn, cmd 0x2D).
#[derive(Debug, Clone, Copy)]
pub struct GetSensorReading {
    /// Sensor number.
    pub number: u8,
}

impl Command for GetSensorReading {
    type Output = SensorReading;
    const NETFN: u8 = NETFN_SENSOR;
    const CMD: u8 = GET_SENSOR_READING;

    fn request_data(&self) -> Vec<u8> {
        vec![self.number]
    }

    fn parse_response(&self, response: RawResponse) -> Result<Self::Output> {
        let data = ok_data(&response)?;
        if data.len() < 2 {
            return Err(Error::Protocol("Get Sensor Reading response too short"));
        }
        let event_status = match data {
            [_, _, lo, hi, ..] => u16::from_le_bytes([*lo, *hi]),
            [_, _, lo] => u16::from(*lo),
            _ => 0,
        };
        Ok(SensorReading {
            value: data[0],
            events_enabled: data[1] & 0x80 != 0,
            scanning_enabled: data[1] & 0x40 != 0,
            reading_unavailable: data[1] & 0x20 != 0,
            event_status,
        })
    }
}

pub(crate) fn parse_device_id(data: &[u8]) -> Result<DeviceIdentity> {
    if data.len() < 11 {
        return Err(Error::Protocol("Get Device ID response too short"));
    }

    Ok(DeviceIdentity {
        device_id: data[0],
        device_revision: data[1] & 0x0F,
        firmware_major: data[2] & 0x7F,
        firmware_minor: data[3],
        device_support: data[5],
        manufacturer_id: u32::from(data[6]) | (u32::from(data[7]) << 8) | (u32::from(data[8]) << 16),
        product_id: u16::from(data[9]) | (u16::from(data[10]) << 8),
    })
}

pub(crate) fn parse_channel_auth_capabilities(data: &[u8]) -> Result<ChannelAuthCapabilities> {
    if data.len() < 8 {
        return Err(Error::Protocol(
            "Get Channel Authentication Capabilities response too short",
        ));
    }

    Ok(ChannelAuthCapabilities {
        channel_number: data[0] & 0x0F,
        v20_data_available: data[1] & 0x80 != 0,
        enabled_auth_types: AuthTypeSet::from_bits(data[1]),
        per_message_auth_disabled: data[2] & 0x10 != 0,
        user_level_auth_disabled: data[2] & 0x08 != 0,
        non_null_usernames: data[2] & 0x04 != 0,
        null_usernames: data[2] & 0x02 != 0,
        anonymous_login_enabled: data[2] & 0x01 != 0,
        supports_ipmi_v1_5: data[1] & 0x80 == 0 || data[3] & 0x01 != 0,
        supports_ipmi_v2_0: data[3] & 0x02 != 0,
    })
}

pub(crate) fn parse_repository_info(data: &[u8]) -> Result<RepositoryInfo> {
    if data.len() < 14 {
        return Err(Error::Protocol("repository info response too short"));
    }

    Ok(RepositoryInfo {
        version: data[0],
        record_count: u16::from_le_bytes([data[1], data[2]]),
        free_space: u16::from_le_bytes([data[3], data[4]]),
        last_add_time: u32::from_le_bytes([data[5], data[6], data[7], data[8]]),
        last_erase_time: u32::from_le_bytes([data[9], data[10], data[11], data[12]]),
        flags: data[13],
    })
}

pub(crate) fn parse_record_chunk(data: &[u8]) -> Result<RecordChunk> {
    let next_record_id = record_id(data, "record read response too short")?;
    Ok(RecordChunk {
        next_record_id,
        data: data[2..].to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_device_id_fields() {
        let data = [
            0x20, 0x01, 0x82, 0x43, 0x51, 0x03, 0xA2, 0x02, 0x00, 0x00, 0x01, 0, 0, 0, 0,
        ];
        let id = parse_device_id(&data).expect("parse");
        assert_eq!(id.device_id, 0x20);
        assert_eq!(id.firmware_major, 0x02);
        assert_eq!(id.firmware_minor, 0x43);
        assert_eq!(id.device_support, 0x03);
        assert_eq!(id.manufacturer_id, 0x0000_02A2);
        assert_eq!(id.product_id, 0x0100);
    }

    #[test]
    fn parse_channel_auth_capabilities_v15() {
        let data = [0x01, 0x11, 0x05, 0x00, 0, 0, 0, 0];
        let caps = parse_channel_auth_capabilities(&data).expect("parse");
        assert_eq!(caps.channel_number, 1);
        assert!(caps.enabled_auth_types.contains(AuthType::None));
        assert!(caps.enabled_auth_types.contains(AuthType::Straight));
        assert!(!caps.enabled_auth_types.contains(AuthType::Md5));
        assert!(caps.non_null_usernames);
        assert!(caps.anonymous_login_enabled);
        assert!(!caps.null_usernames);
        assert!(caps.supports_ipmi_v1_5);
        assert!(!caps.supports_ipmi_v2_0);
    }

    #[test]
    fn parse_repository_info_fields() {
        let data = [
            0x51, 0x03, 0x00, 0x10, 0x00, 0x04, 0x03, 0x02, 0x01, 0x00, 0x00, 0x00, 0x00, 0x8A,
        ];
        let info = parse_repository_info(&data).expect("parse");
        assert_eq!(info.record_count, 3);
        assert_eq!(info.free_space, 16);
        assert_eq!(info.last_add_time, 0x0102_0304);
        assert!(info.overflow());
    }

    #[test]
    fn activate_session_round_trips_request_layout() {
        let cmd = ActivateSession {
            auth_type: AuthType::Straight,
            max_privilege: PrivilegeLevel::Administrator,
            challenge: [0xAB; 16],
            initial_outbound_seq: 0x0102_0304,
        };
        let data = cmd.request_data();
        assert_eq!(data.len(), 22);
        assert_eq!(data[0], 0x04);
        assert_eq!(data[1], 0x04);
        assert_eq!(&data[18..22], &[0x04, 0x03, 0x02, 0x01]);
    }
}
