#[cfg(feature = "blocking")]
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::auth::{CREDENTIAL_LEN, SecretBytes};
use crate::client::core::ClientCore;
use crate::client::handshake::{self, Login, RetryPolicy};
use crate::commands::{
    Command, GetDeviceId, GetSdr, GetSdrRepositoryInfo, GetSelInfo, GetSensorReading,
    ReserveSdrRepository,
};
use crate::error::{CompletionCode, Error, Result};
use crate::transport::Transport;
#[cfg(feature = "blocking")]
use crate::transport::blocking::UdpTransport;
use crate::types::{
    AuthType, DeviceIdentity, PrivilegeLevel, RawResponse, RepositoryInfo, SensorReading,
};

/// Bytes requested per Get SDR call when walking the repository.
const SDR_CHUNK_LEN: u8 = 16;
/// SDR header: id (2), version, type, remaining length.
const SDR_HEADER_LEN: u8 = 5;

/// A remote-console session with an IPMI 1.5 LAN management controller.
///
/// `Client` is cheap to clone; clones share the session.
#[derive(Clone)]
pub struct Client {
    inner: Arc<Mutex<Inner>>,
    session_id: u32,
    auth_type: AuthType,
    privilege: PrivilegeLevel,
}

struct Inner {
    transport: Box<dyn Transport + Send>,
    core: ClientCore,
}

impl core::fmt::Debug for Client {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Client")
            .field("session_id", &format_args!("{:#010x}", self.session_id))
            .field("auth_type", &self.auth_type)
            .field("privilege", &self.privilege)
            .finish_non_exhaustive()
    }
}

/// Builder for [`Client`].
#[derive(Debug)]
pub struct ClientBuilder {
    username: Vec<u8>,
    password: SecretBytes,
    privilege_level: PrivilegeLevel,
    auth_type: AuthType,
    timeout: Duration,
    retries: u32,
    backoff: Duration,
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientBuilder {
    /// Create a builder for the null user with an empty password.
    pub fn new() -> Self {
        Self {
            username: Vec::new(),
            password: SecretBytes::new(b""),
            privilege_level: PrivilegeLevel::Administrator,
            auth_type: AuthType::None,
            timeout: Duration::from_secs(1),
            retries: 3,
            backoff: Duration::from_millis(100),
        }
    }

    /// Set the username (bytes). An empty name selects the null user.
    pub fn username_bytes(mut self, username: impl Into<Vec<u8>>) -> Self {
        self.username = username.into();
        self
    }

    /// Set the username (UTF-8 string). This is a convenience wrapper around [`Self::username_bytes`].
    pub fn username(mut self, username: impl AsRef<str>) -> Self {
        self.username = username.as_ref().as_bytes().to_vec();
        self
    }

    /// Set the password (bytes).
    pub fn password_bytes(mut self, password: impl AsRef<[u8]>) -> Self {
        self.password = SecretBytes::new(password.as_ref());
        self
    }

    /// Set the password (UTF-8 string). This is a convenience wrapper around [`Self::password_bytes`].
    pub fn password(mut self, password: impl AsRef<str>) -> Self {
        self.password = SecretBytes::new(password.as_ref().as_bytes());
        self
    }

    /// Set requested session privilege level.
    pub fn privilege_level(mut self, level: PrivilegeLevel) -> Self {
        self.privilege_level = level;
        self
    }

    /// Set the session authentication type (`None` or `Straight`).
    pub fn auth_type(mut self, auth_type: AuthType) -> Self {
        self.auth_type = auth_type;
        self
    }

    /// Set UDP read timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set number of attempts per request and per handshake step (including the first attempt).
    pub fn retries(mut self, attempts: u32) -> Self {
        self.retries = attempts;
        self
    }

    /// Set the initial back-off between handshake attempts; it doubles per retry.
    pub fn backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Connect over UDP and establish the session.
    #[cfg(feature = "blocking")]
    pub fn connect(self, target: SocketAddr) -> Result<Client> {
        let transport = UdpTransport::connect(target, self.timeout, self.retries)?;
        self.establish(transport)
    }

    /// Establish the session over an arbitrary transport.
    pub fn establish(self, transport: impl Transport + Send + 'static) -> Result<Client> {
        if self.username.len() > CREDENTIAL_LEN {
            return Err(Error::InvalidArgument("username longer than 16 bytes"));
        }
        if !matches!(self.auth_type, AuthType::None | AuthType::Straight) {
            return Err(Error::InvalidArgument(
                "only auth types none and straight are supported",
            ));
        }

        let transport: Box<dyn Transport + Send> = Box::new(transport);
        let mut core = ClientCore::sessionless(self.password);
        let login = Login {
            username: &self.username,
            auth_type: self.auth_type,
            privilege: self.privilege_level,
            retry: RetryPolicy {
                attempts: self.retries.max(1),
                backoff: self.backoff,
            },
        };
        let established = handshake::establish(&*transport, &mut core, &login)?;

        Ok(Client {
            inner: Arc::new(Mutex::new(Inner { transport, core })),
            session_id: established.session_id,
            auth_type: established.auth_type,
            privilege: established.privilege,
        })
    }
}

impl Client {
    /// Create a [`ClientBuilder`].
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Execute a typed command (single request/response).
    pub fn execute<C: Command>(&self, command: C) -> Result<C::Output> {
        let request_data = command.request_data();
        let response = self.send_raw(C::NETFN, C::CMD, &request_data)?;
        command.parse_response(response)
    }

    /// Send a raw IPMI request inside the session and return the raw response.
    ///
    /// Requests use LUN 0, `rsAddr=0x20` and `rqAddr=0x81`.
    pub fn send_raw(&self, netfn: u8, cmd: u8, data: &[u8]) -> Result<RawResponse> {
        let start = Instant::now();
        let result = {
            let mut inner = self.lock_inner()?;
            send_raw_locked(&mut inner, netfn, cmd, data)
        };
        match &result {
            Ok(resp) => tracing::debug!(
                netfn,
                cmd,
                completion_code = resp.completion_code,
                elapsed_us = start.elapsed().as_micros() as u64,
                "ipmi request completed"
            ),
            Err(err) => tracing::debug!(netfn, cmd, error = %err, "ipmi request failed"),
        }
        result
    }

    /// Session id assigned by the controller.
    pub fn session_id(&self) -> u32 {
        self.session_id
    }

    /// Negotiated authentication type.
    pub fn auth_type(&self) -> AuthType {
        self.auth_type
    }

    /// Privilege level the session runs at.
    pub fn privilege(&self) -> PrivilegeLevel {
        self.privilege
    }

    /// Convenience wrapper for `Get Device ID` (App NetFn, cmd 0x01).
    pub fn get_device_id(&self) -> Result<DeviceIdentity> {
        self.execute(GetDeviceId)
    }

    /// Convenience wrapper for `Get Sensor Reading` (Sensor NetFn, cmd 0x2D).
    pub fn get_sensor_reading(&self, number: u8) -> Result<SensorReading> {
        self.execute(GetSensorReading { number })
    }

    /// Convenience wrapper for `Get SDR Repository Info` (Storage NetFn, cmd 0x20).
    pub fn sdr_repository_info(&self) -> Result<RepositoryInfo> {
        self.execute(GetSdrRepositoryInfo)
    }

    /// Convenience wrapper for `Get SEL Info` (Storage NetFn, cmd 0x40).
    pub fn sel_info(&self) -> Result<RepositoryInfo> {
        self.execute(GetSelInfo)
    }

    /// Read every SDR record, in repository order.
    ///
    /// Records are fetched in small chunks under one reservation so that
    /// long records fit the controller's response size limit.
    pub fn read_sdr_repository(&self) -> Result<Vec<Vec<u8>>> {
        let reservation = self.execute(ReserveSdrRepository)?;
        let mut records = Vec::new();
        let mut record_id = 0x0000;

        loop {
            let header = match self.execute(GetSdr {
                reservation,
                record_id,
                offset: 0,
                count: SDR_HEADER_LEN,
            }) {
                Ok(header) => header,
                // empty repository
                Err(Error::CompletionCode { completion_code })
                    if completion_code == CompletionCode::NOT_PRESENT && records.is_empty() =>
                {
                    return Ok(records);
                }
                Err(err) => return Err(err),
            };
            if header.data.len() < usize::from(SDR_HEADER_LEN) {
                return Err(Error::Protocol("SDR header truncated"));
            }

            let total = usize::from(SDR_HEADER_LEN) + usize::from(header.data[4]);
            let mut record = header.data;
            while record.len() < total {
                let offset = u8::try_from(record.len())
                    .map_err(|_| Error::Protocol("SDR record too long"))?;
                let count = usize::from(SDR_CHUNK_LEN).min(total - record.len()) as u8;
                let chunk = self.execute(GetSdr {
                    reservation,
                    record_id,
                    offset,
                    count,
                })?;
                if chunk.data.is_empty() {
                    return Err(Error::Protocol("SDR read made no progress"));
                }
                record.extend_from_slice(&chunk.data);
            }
            records.push(record);

            if header.next_record_id == 0xFFFF {
                return Ok(records);
            }
            record_id = header.next_record_id;
        }
    }

    /// Close the session (App NetFn, cmd 0x3C).
    ///
    /// This is a best-effort operation. If the controller does not respond (timeout) or no
    /// longer knows the session (0x87), the client still transitions to a locally closed
    /// state and will reject further requests.
    pub fn close_session(&self) -> Result<()> {
        use crate::commands::CloseSession;

        let mut inner = self.lock_inner()?;
        if inner.core.is_closed() {
            return Ok(());
        }

        let command = CloseSession {
            session_id: inner.core.session_id(),
        };
        let result = send_raw_locked(
            &mut inner,
            CloseSession::NETFN,
            CloseSession::CMD,
            &command.request_data(),
        );
        inner.core.mark_closed();

        match result {
            Ok(resp)
                if resp.completion_code == CompletionCode::OK.as_u8()
                    || resp.completion_code == CompletionCode::SESSION_NOT_FOUND.as_u8() =>
            {
                tracing::info!(
                    sid = format_args!("{:#010x}", self.session_id),
                    "session closed"
                );
                Ok(())
            }
            Ok(resp) => Err(Error::CompletionCode {
                completion_code: CompletionCode(resp.completion_code),
            }),
            Err(Error::Timeout) => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn lock_inner(&self) -> Result<std::sync::MutexGuard<'_, Inner>> {
        self.inner.lock().map_err(|_| Error::Poisoned)
    }
}

fn send_raw_locked(inner: &mut Inner, netfn: u8, cmd: u8, data: &[u8]) -> Result<RawResponse> {
    let Inner { transport, core } = inner;
    handshake::exchange(&**transport, core, netfn, cmd, data)
}
