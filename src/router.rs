use crate::commands::codes::*;
use crate::types::PrivilegeLevel;

/// Every command the controller answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Handler {
    GetDeviceId,
    GetChannelAuthCapabilities,
    GetSessionChallenge,
    ActivateSession,
    SetSessionPrivilege,
    CloseSession,
    GetSdrRepositoryInfo,
    ReserveSdrRepository,
    GetSdr,
    AddSdr,
    ClearSdrRepository,
    GetSelInfo,
    ReserveSel,
    GetSelEntry,
    AddSelEntry,
    DeleteSelEntry,
    ClearSel,
    GetSelTime,
    SetSelTime,
    GetSensorReading,
}

impl Handler {
    /// Map a request's net function and command; unmapped pairs yield `None`.
    pub(crate) fn from_codes(netfn: u8, cmd: u8) -> Option<Self> {
        let handler = match (netfn, cmd) {
            (NETFN_APP, GET_DEVICE_ID) => Self::GetDeviceId,
            (NETFN_APP, GET_CHANNEL_AUTH_CAPABILITIES) => Self::GetChannelAuthCapabilities,
            (NETFN_APP, GET_SESSION_CHALLENGE) => Self::GetSessionChallenge,
            (NETFN_APP, ACTIVATE_SESSION) => Self::ActivateSession,
            (NETFN_APP, SET_SESSION_PRIVILEGE) => Self::SetSessionPrivilege,
            (NETFN_APP, CLOSE_SESSION) => Self::CloseSession,

            (NETFN_STORAGE, GET_SDR_REPOSITORY_INFO) => Self::GetSdrRepositoryInfo,
            (NETFN_STORAGE, RESERVE_SDR_REPOSITORY) => Self::ReserveSdrRepository,
            (NETFN_STORAGE, GET_SDR) => Self::GetSdr,
            (NETFN_STORAGE, ADD_SDR) => Self::AddSdr,
            (NETFN_STORAGE, CLEAR_SDR_REPOSITORY) => Self::ClearSdrRepository,
            (NETFN_STORAGE, GET_SEL_INFO) => Self::GetSelInfo,
            (NETFN_STORAGE, RESERVE_SEL) => Self::ReserveSel,
            (NETFN_STORAGE, GET_SEL_ENTRY) => Self::GetSelEntry,
            (NETFN_STORAGE, ADD_SEL_ENTRY) => Self::AddSelEntry,
            (NETFN_STORAGE, DELETE_SEL_ENTRY) => Self::DeleteSelEntry,
            (NETFN_STORAGE, CLEAR_SEL) => Self::ClearSel,
            (NETFN_STORAGE, GET_SEL_TIME) => Self::GetSelTime,
            (NETFN_STORAGE, SET_SEL_TIME) => Self::SetSelTime,

            (NETFN_SENSOR, GET_SENSOR_READING) => Self::GetSensorReading,
            _ => return None,
        };
        Some(handler)
    }

    /// Lowest session privilege allowed to run the command; `None` when any session may.
    pub(crate) fn min_privilege(self) -> Option<PrivilegeLevel> {
        match self {
            Self::GetChannelAuthCapabilities
            | Self::GetSessionChallenge
            | Self::ActivateSession
            | Self::SetSessionPrivilege => None,
            Self::CloseSession => Some(PrivilegeLevel::Callback),
            Self::GetDeviceId
            | Self::GetSdrRepositoryInfo
            | Self::ReserveSdrRepository
            | Self::GetSdr
            | Self::GetSelInfo
            | Self::ReserveSel
            | Self::GetSelEntry
            | Self::GetSelTime
            | Self::GetSensorReading => Some(PrivilegeLevel::User),
            Self::AddSdr
            | Self::ClearSdrRepository
            | Self::AddSelEntry
            | Self::DeleteSelEntry
            | Self::ClearSel
            | Self::SetSelTime => Some(PrivilegeLevel::Operator),
        }
    }

    /// Whether the command may be sent outside a session.
    pub(crate) fn allowed_sessionless(self) -> bool {
        matches!(
            self,
            Self::GetChannelAuthCapabilities | Self::GetSessionChallenge
        )
    }
}
