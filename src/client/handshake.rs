use std::time::Duration;

use rand::Rng;

use crate::client::core::ClientCore;
use crate::commands::{
    ActivateSession, Command, GetChannelAuthCapabilities, GetSessionChallenge,
    SetSessionPrivilegeLevel,
};
use crate::error::{Error, Result};
use crate::transport::Transport;
use crate::types::{AuthType, PrivilegeLevel, RawResponse};

/// Retry policy for each handshake step.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RetryPolicy {
    pub attempts: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    fn delay(&self, attempt: u32) -> Duration {
        self.backoff
            .saturating_mul(1u32 << attempt.saturating_sub(1).min(16))
    }
}

/// Parameters of the login exchange.
#[derive(Debug)]
pub(crate) struct Login<'a> {
    pub username: &'a [u8],
    pub auth_type: AuthType,
    pub privilege: PrivilegeLevel,
    pub retry: RetryPolicy,
}

/// Outcome of a completed handshake.
#[derive(Debug)]
pub(crate) struct Established {
    pub session_id: u32,
    pub auth_type: AuthType,
    pub privilege: PrivilegeLevel,
}

/// Run Get Channel Auth Capabilities, Get Session Challenge, Activate
/// Session and Set Session Privilege over `transport`, leaving `core` in
/// the established session.
pub(crate) fn establish(
    transport: &dyn Transport,
    core: &mut ClientCore,
    login: &Login<'_>,
) -> Result<Established> {
    let caps = step(
        transport,
        core,
        &login.retry,
        "get channel auth capabilities",
        GetChannelAuthCapabilities::current_channel(login.privilege),
    )?;
    if !caps.enabled_auth_types.contains(login.auth_type) {
        tracing::warn!(
            offered = caps.enabled_auth_types.bits(),
            requested = ?login.auth_type,
            "auth type not offered by channel"
        );
        return Err(Error::InvalidArgument("auth type not offered by the channel"));
    }

    let challenge = step(
        transport,
        core,
        &login.retry,
        "get session challenge",
        GetSessionChallenge {
            auth_type: login.auth_type,
            username: login.username.to_vec(),
        },
    )?;

    core.enter_temporary(challenge.temporary_session_id, login.auth_type);
    // The controller consumes the challenge on activation, so a resend after
    // a lost reply could only be refused.
    let single_shot = RetryPolicy {
        attempts: 1,
        ..login.retry
    };
    let activated = step(
        transport,
        core,
        &single_shot,
        "activate session",
        ActivateSession {
            auth_type: login.auth_type,
            max_privilege: login.privilege,
            challenge: challenge.challenge,
            initial_outbound_seq: rand::rng().random_range(1..=u32::MAX),
        },
    )?;
    core.enter_session(
        activated.session_id,
        activated.auth_type,
        activated.initial_inbound_seq,
    );
    tracing::info!(
        sid = format_args!("{:#010x}", activated.session_id),
        max_privilege = ?activated.max_privilege,
        "session activated"
    );

    let privilege = step(
        transport,
        core,
        &login.retry,
        "set session privilege",
        SetSessionPrivilegeLevel {
            privilege: login.privilege,
        },
    )?;

    Ok(Established {
        session_id: activated.session_id,
        auth_type: activated.auth_type,
        privilege,
    })
}

/// Send one command, retrying transient failures with exponential back-off.
fn step<C: Command>(
    transport: &dyn Transport,
    core: &mut ClientCore,
    retry: &RetryPolicy,
    name: &'static str,
    command: C,
) -> Result<C::Output> {
    let attempts = retry.attempts.max(1);
    let data = command.request_data();

    for attempt in 1..=attempts {
        match exchange(transport, core, C::NETFN, C::CMD, &data) {
            Ok(response) => return command.parse_response(response),
            Err(err @ (Error::Timeout | Error::Io(_) | Error::Protocol(_))) => {
                tracing::warn!(step = name, attempt, error = %err, "handshake step failed");
                if attempt < attempts {
                    std::thread::sleep(retry.delay(attempt));
                }
            }
            Err(err) => return Err(err),
        }
    }

    Err(Error::Stalled {
        step: name,
        attempts,
    })
}

pub(crate) fn exchange(
    transport: &dyn Transport,
    core: &mut ClientCore,
    netfn: u8,
    cmd: u8,
    data: &[u8],
) -> Result<RawResponse> {
    let (rq_seq, packet) = core.build_request(netfn, cmd, data)?;
    let response = transport.send_recv(&packet)?;
    core.decode_response(netfn, cmd, rq_seq, &response)
}
