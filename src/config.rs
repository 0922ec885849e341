use core::fmt;
use std::time::Duration;

use zeroize::Zeroizing;

use crate::auth::{CREDENTIAL_LEN, SecretBytes, pad_credential};
use crate::error::{Error, Result};
use crate::types::{AuthType, AuthTypeSet, DeviceIdentity, PrivilegeLevel};

/// Users are indexed 1..=63 so the index fits the 6 user bits of a temporary session id.
pub const MAX_USERS: usize = 63;
/// Sessions are indexed 1..=63 so the handle fits the 6 handle bits of a session id.
pub const MAX_SESSIONS: usize = 63;
/// Largest SDR or SEL capacity: every record needs an id other than 0 and 0xFFFF.
const MAX_RECORDS: usize = 0xFFFE;

/// A user account as supplied by the caller.
#[derive(Clone)]
pub struct UserConfig {
    name: Vec<u8>,
    password: Zeroizing<Vec<u8>>,
    max_privilege: PrivilegeLevel,
    allowed_auths: AuthTypeSet,
}

impl UserConfig {
    /// Create a user with `name` (may be empty for the null user).
    pub fn new(name: impl AsRef<[u8]>, password: impl AsRef<[u8]>) -> Self {
        Self {
            name: name.as_ref().to_vec(),
            password: Zeroizing::new(password.as_ref().to_vec()),
            max_privilege: PrivilegeLevel::User,
            allowed_auths: AuthTypeSet::of(&[AuthType::None]),
        }
    }

    /// Highest privilege a session of this user may negotiate.
    pub fn max_privilege(mut self, level: PrivilegeLevel) -> Self {
        self.max_privilege = level;
        self
    }

    /// Authentication types this user may log in with.
    pub fn allowed_auths(mut self, auths: &[AuthType]) -> Self {
        self.allowed_auths = AuthTypeSet::of(auths);
        self
    }
}

impl fmt::Debug for UserConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserConfig")
            .field("name", &String::from_utf8_lossy(&self.name))
            .field("password", &"<secret>")
            .field("max_privilege", &self.max_privilege)
            .field("allowed_auths", &self.allowed_auths)
            .finish()
    }
}

/// A user account in the controller's table.
#[derive(Debug, Clone)]
pub(crate) struct User {
    pub idx: u8,
    pub name: [u8; CREDENTIAL_LEN],
    pub password: SecretBytes,
    pub max_priv: PrivilegeLevel,
    pub allowed_auths: AuthTypeSet,
}

impl User {
    pub(crate) fn is_null(&self) -> bool {
        self.name.iter().all(|&b| b == 0)
    }
}

/// Static configuration of the management controller.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub(crate) channel: u8,
    pub(crate) channel_priv_limit: PrivilegeLevel,
    pub(crate) max_sessions: usize,
    pub(crate) session_timeout: Duration,
    pub(crate) max_sdr_count: usize,
    pub(crate) max_sel_count: usize,
    pub(crate) max_response_data: usize,
    pub(crate) identity: DeviceIdentity,
    pub(crate) users: Vec<User>,
}

impl ControllerConfig {
    /// Create a [`ControllerBuilder`].
    pub fn builder() -> ControllerBuilder {
        ControllerBuilder::new()
    }

    pub(crate) fn user(&self, idx: u8) -> Option<&User> {
        self.users.iter().find(|u| u.idx == idx)
    }

    pub(crate) fn find_user(&self, name: &[u8; CREDENTIAL_LEN]) -> Option<&User> {
        self.users.iter().find(|u| &u.name == name)
    }
}

/// Builder for [`ControllerConfig`].
#[derive(Debug, Clone)]
pub struct ControllerBuilder {
    channel: u8,
    channel_priv_limit: PrivilegeLevel,
    max_sessions: usize,
    session_timeout: Duration,
    max_sdr_count: usize,
    max_sel_count: usize,
    max_response_data: usize,
    identity: DeviceIdentity,
    users: Option<Vec<UserConfig>>,
}

impl Default for ControllerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ControllerBuilder {
    /// Create a new builder with the stock LAN channel settings.
    pub fn new() -> Self {
        Self {
            channel: 1,
            channel_priv_limit: PrivilegeLevel::Administrator,
            max_sessions: 16,
            session_timeout: Duration::from_secs(30),
            max_sdr_count: 2000,
            max_sel_count: 1000,
            max_response_data: 64,
            identity: DeviceIdentity::default(),
            users: None,
        }
    }

    /// LAN channel number reported by Get Channel Authentication Capabilities.
    pub fn channel(mut self, channel: u8) -> Self {
        self.channel = channel & 0x0F;
        self
    }

    /// Highest privilege any session on this channel may reach.
    pub fn channel_privilege_limit(mut self, level: PrivilegeLevel) -> Self {
        self.channel_priv_limit = level;
        self
    }

    /// Session table capacity.
    pub fn max_sessions(mut self, sessions: usize) -> Self {
        self.max_sessions = sessions;
        self
    }

    /// Idle time after which a session is closed.
    pub fn session_timeout(mut self, timeout: Duration) -> Self {
        self.session_timeout = timeout;
        self
    }

    /// SDR repository capacity in records.
    pub fn max_sdr_count(mut self, count: usize) -> Self {
        self.max_sdr_count = count;
        self
    }

    /// SEL capacity in entries.
    pub fn max_sel_count(mut self, count: usize) -> Self {
        self.max_sel_count = count;
        self
    }

    /// Largest response payload (completion code included) the transport carries.
    pub fn max_response_data(mut self, bytes: usize) -> Self {
        self.max_response_data = bytes;
        self
    }

    /// Identity reported by Get Device ID.
    pub fn identity(mut self, identity: DeviceIdentity) -> Self {
        self.identity = identity;
        self
    }

    /// Add a user. The first call replaces the default user table.
    pub fn user(mut self, user: UserConfig) -> Self {
        self.users.get_or_insert_with(Vec::new).push(user);
        self
    }

    /// Validate and produce the configuration.
    pub fn build(self) -> Result<ControllerConfig> {
        if self.max_sessions == 0 || self.max_sessions > MAX_SESSIONS {
            return Err(Error::InvalidArgument("max_sessions must be within 1..=63"));
        }
        if self.max_response_data < 8 || self.max_response_data > 255 {
            return Err(Error::InvalidArgument(
                "max_response_data must be within 8..=255",
            ));
        }
        if self.session_timeout.is_zero() {
            return Err(Error::InvalidArgument("session_timeout must be non-zero"));
        }
        // Record ids are 16-bit with 0 and 0xFFFF reserved.
        if !(1..=MAX_RECORDS).contains(&self.max_sdr_count)
            || !(1..=MAX_RECORDS).contains(&self.max_sel_count)
        {
            return Err(Error::InvalidArgument(
                "repository capacities must be within 1..=65534",
            ));
        }

        let users = self.users.unwrap_or_else(default_users);
        if users.len() > MAX_USERS {
            return Err(Error::InvalidArgument("at most 63 users are supported"));
        }

        let mut table = Vec::with_capacity(users.len());
        for (i, user) in users.into_iter().enumerate() {
            if user.name.len() > CREDENTIAL_LEN || user.password.len() > CREDENTIAL_LEN {
                return Err(Error::InvalidArgument(
                    "user names and passwords are limited to 16 bytes",
                ));
            }
            if user.allowed_auths.contains(AuthType::RmcpPlus) {
                return Err(Error::InvalidArgument("RMCP+ logins are not supported"));
            }
            if [AuthType::Md2, AuthType::Md5, AuthType::Oem]
                .into_iter()
                .any(|auth| user.allowed_auths.contains(auth))
            {
                return Err(Error::InvalidArgument(
                    "only auth types none and straight are supported",
                ));
            }
            let name = pad_credential(&user.name);
            if table.iter().any(|u: &User| u.name == name) {
                return Err(Error::InvalidArgument("duplicate user name"));
            }
            table.push(User {
                idx: (i + 1) as u8,
                name,
                password: SecretBytes::new(&user.password),
                max_priv: user.max_privilege,
                allowed_auths: user.allowed_auths,
            });
        }

        Ok(ControllerConfig {
            channel: self.channel,
            channel_priv_limit: self.channel_priv_limit,
            max_sessions: self.max_sessions,
            session_timeout: self.session_timeout,
            max_sdr_count: self.max_sdr_count,
            max_sel_count: self.max_sel_count,
            max_response_data: self.max_response_data,
            identity: self.identity,
            users: table,
        })
    }
}

fn default_users() -> Vec<UserConfig> {
    vec![
        UserConfig::new("", "test")
            .max_privilege(PrivilegeLevel::User)
            .allowed_auths(&[AuthType::None, AuthType::Straight]),
        UserConfig::new("ipmiusr", "test")
            .max_privilege(PrivilegeLevel::Administrator)
            .allowed_auths(&[AuthType::None]),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_table_has_null_user_and_ipmiusr() {
        let config = ControllerConfig::builder().build().expect("config");
        assert_eq!(config.users.len(), 2);
        assert!(config.users[0].is_null());
        let admin = config
            .find_user(&pad_credential(b"ipmiusr"))
            .expect("ipmiusr");
        assert_eq!(admin.idx, 2);
        assert_eq!(admin.max_priv, PrivilegeLevel::Administrator);
    }

    #[test]
    fn builder_rejects_oversized_tables() {
        assert!(ControllerConfig::builder().max_sessions(64).build().is_err());
        assert!(ControllerConfig::builder().max_sessions(0).build().is_err());

        let mut builder = ControllerConfig::builder();
        for i in 0..64 {
            builder = builder.user(UserConfig::new(format!("u{i}"), "pw"));
        }
        assert!(builder.build().is_err());
    }

    #[test]
    fn repository_capacity_is_bounded_by_record_ids() {
        let capacity = |sdr: usize, sel: usize| {
            ControllerConfig::builder()
                .max_sdr_count(sdr)
                .max_sel_count(sel)
                .build()
        };
        assert!(capacity(0xFFFE, 0xFFFE).is_ok());
        assert!(matches!(capacity(0xFFFF, 10), Err(Error::InvalidArgument(_))));
        assert!(matches!(capacity(10, usize::MAX), Err(Error::InvalidArgument(_))));
        assert!(capacity(0, 10).is_err());
    }

    #[test]
    fn builder_rejects_duplicate_names() {
        let result = ControllerConfig::builder()
            .user(UserConfig::new("root", "a"))
            .user(UserConfig::new("root", "b"))
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn digest_auth_types_are_refused() {
        let result = ControllerConfig::builder()
            .user(UserConfig::new("root", "pw").allowed_auths(&[AuthType::Md5]))
            .build();
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
    }
}
