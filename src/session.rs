use std::collections::VecDeque;
use std::time::Duration;

use rand::{Rng, RngCore};

use crate::auth::CREDENTIAL_LEN;
use crate::config::ControllerConfig;
use crate::controller::{Exchange, Origin};
use crate::error::CompletionCode;
use crate::types::{AuthType, AuthTypeSet, PrivilegeLevel};

/// Bits holding the table handle (or user index) above the low bit.
const SLOT_BITS: u32 = 6;
const SLOT_MASK: u32 = (1 << SLOT_BITS) - 1;
/// Bits left for the sequence part of a session id.
const SEQ_BITS: u32 = 32 - SLOT_BITS - 1;
const SEQ_MASK: u32 = (1 << SEQ_BITS) - 1;

/// Inbound sequence numbers within this distance of the expected value are accepted.
const SEQ_WINDOW: u32 = 8;

pub(crate) const CHALLENGE_LEN: usize = 16;

/// Encode an established session id from a sequence value and a table handle.
///
/// Established ids are `seq << 7 | handle << 1` with the low bit clear;
/// temporary ids put the user index where the handle goes and set the low bit.
pub fn encode_session_id(seq: u32, handle: u8) -> u32 {
    ((seq & SEQ_MASK) << (SLOT_BITS + 1)) | ((u32::from(handle) & SLOT_MASK) << 1)
}

/// Split an established session id into `(seq, handle)`. Temporary ids yield `None`.
pub fn decode_session_id(sid: u32) -> Option<(u32, u8)> {
    if sid & 1 == 1 {
        return None;
    }
    Some((sid >> (SLOT_BITS + 1), ((sid >> 1) & SLOT_MASK) as u8))
}

/// Encode a temporary session id handed out with a challenge.
pub fn encode_temporary_session_id(seq: u32, user_idx: u8) -> u32 {
    ((seq & SEQ_MASK) << (SLOT_BITS + 1)) | ((u32::from(user_idx) & SLOT_MASK) << 1) | 1
}

/// User index embedded in a temporary session id.
pub fn temporary_session_user(sid: u32) -> Option<u8> {
    if sid & 1 == 0 {
        return None;
    }
    Some(((sid >> 1) & SLOT_MASK) as u8)
}

/// Advance a 32-bit sequence counter, skipping zero on wraparound.
pub(crate) fn next_seq(seq: u32) -> u32 {
    match seq.wrapping_add(1) {
        0 => 1,
        n => n,
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Session {
    pub active: bool,
    pub handle: u8,
    pub sid: u32,
    /// Next sequence number expected from the remote console.
    pub recv_seq: u32,
    /// Sequence number stamped on the next reply.
    pub xmit_seq: u32,
    pub user_idx: u8,
    pub auth_type: AuthType,
    pub priv_level: PrivilegeLevel,
    pub max_priv: PrivilegeLevel,
    pub time_left: Duration,
}

impl Session {
    fn free(handle: u8) -> Self {
        Self {
            active: false,
            handle,
            sid: 0,
            recv_seq: 0,
            xmit_seq: 0,
            user_idx: 0,
            auth_type: AuthType::None,
            priv_level: PrivilegeLevel::User,
            max_priv: PrivilegeLevel::User,
            time_left: Duration::ZERO,
        }
    }
}

#[derive(Debug, Clone)]
struct PendingChallenge {
    sid: u32,
    challenge: [u8; CHALLENGE_LEN],
    time_left: Duration,
}

/// Parameters of a session being activated.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Activation {
    pub user_idx: u8,
    pub auth_type: AuthType,
    pub max_priv: PrivilegeLevel,
    pub xmit_seq: u32,
}

/// Fixed-capacity table of sessions, indexed by handle `1..=capacity`.
#[derive(Debug)]
pub(crate) struct SessionTable {
    slots: Vec<Session>,
    active: usize,
    sid_seq: u32,
    chall_seq: u32,
    challenges: VecDeque<PendingChallenge>,
    max_challenges: usize,
    timeout: Duration,
}

impl SessionTable {
    pub(crate) fn new(capacity: usize, timeout: Duration) -> Self {
        let slots = (1..=capacity).map(|h| Session::free(h as u8)).collect();
        Self {
            slots,
            active: 0,
            sid_seq: 0,
            chall_seq: 0,
            challenges: VecDeque::with_capacity(capacity * 2),
            max_challenges: capacity * 2,
            timeout,
        }
    }

    pub(crate) fn active_count(&self) -> usize {
        self.active
    }

    /// Resolve an established session id to its live session.
    pub(crate) fn lookup(&self, sid: u32) -> Option<&Session> {
        let (_, handle) = decode_session_id(sid)?;
        let session = self.slot(handle)?;
        (session.active && session.sid == sid).then_some(session)
    }

    pub(crate) fn by_handle(&self, handle: u8) -> Option<&Session> {
        self.slot(handle).filter(|s| s.active)
    }

    pub(crate) fn by_handle_mut(&mut self, handle: u8) -> Option<&mut Session> {
        let idx = usize::from(handle).checked_sub(1)?;
        self.slots.get_mut(idx).filter(|s| s.active)
    }

    fn slot(&self, handle: u8) -> Option<&Session> {
        let idx = usize::from(handle).checked_sub(1)?;
        self.slots.get(idx)
    }

    /// Hand out a temporary session id and a fresh random challenge for `user_idx`.
    pub(crate) fn issue_challenge(&mut self, user_idx: u8) -> (u32, [u8; CHALLENGE_LEN]) {
        let sid = encode_temporary_session_id(self.chall_seq, user_idx);
        self.chall_seq = self.chall_seq.wrapping_add(1) & SEQ_MASK;

        let mut challenge = [0u8; CHALLENGE_LEN];
        rand::rng().fill_bytes(&mut challenge);

        if self.challenges.len() >= self.max_challenges {
            self.challenges.pop_front();
        }
        self.challenges.push_back(PendingChallenge {
            sid,
            challenge,
            time_left: self.timeout,
        });
        (sid, challenge)
    }

    pub(crate) fn challenge_matches(&self, sid: u32, presented: &[u8]) -> bool {
        self.challenges
            .iter()
            .any(|p| p.sid == sid && crate::auth::ct_eq(&p.challenge, presented))
    }

    fn forget_challenge(&mut self, sid: u32) {
        self.challenges.retain(|p| p.sid != sid);
    }

    /// Allocate a free slot and activate a session in it.
    pub(crate) fn open(&mut self, activation: Activation) -> Option<&Session> {
        let idx = self.slots.iter().position(|s| !s.active)?;

        if self.sid_seq == 0 {
            self.sid_seq = 1;
        }
        let handle = self.slots[idx].handle;
        let sid = encode_session_id(self.sid_seq, handle);
        self.sid_seq = self.sid_seq.wrapping_add(1) & SEQ_MASK;

        let recv_seq = rand::rng().random_range(1..=u32::MAX);

        self.slots[idx] = Session {
            active: true,
            handle,
            sid,
            recv_seq,
            xmit_seq: activation.xmit_seq,
            user_idx: activation.user_idx,
            auth_type: activation.auth_type,
            priv_level: PrivilegeLevel::User,
            max_priv: activation.max_priv,
            time_left: self.timeout,
        };
        self.active += 1;
        Some(&self.slots[idx])
    }

    /// Deactivate the session in `handle`, returning whether it was active.
    pub(crate) fn close(&mut self, handle: u8) -> bool {
        match self.by_handle_mut(handle) {
            Some(session) => {
                session.active = false;
                self.active -= 1;
                true
            }
            None => false,
        }
    }

    /// Check an inbound session sequence number against the expected one.
    ///
    /// Values up to `SEQ_WINDOW` ahead advance the expectation; values up
    /// to `SEQ_WINDOW` behind are retransmissions and are let through.
    pub(crate) fn accept_inbound_seq(&mut self, handle: u8, seq: u32) -> bool {
        let Some(session) = self.by_handle_mut(handle) else {
            return false;
        };
        let ahead = seq.wrapping_sub(session.recv_seq);
        let behind = session.recv_seq.wrapping_sub(seq);
        if ahead <= SEQ_WINDOW {
            session.recv_seq = next_seq(seq);
            true
        } else {
            behind <= SEQ_WINDOW
        }
    }

    /// Reset the idle timer of a session after accepted traffic.
    pub(crate) fn touch(&mut self, handle: u8) {
        let timeout = self.timeout;
        if let Some(session) = self.by_handle_mut(handle) {
            session.time_left = timeout;
        }
    }

    /// Age sessions and pending challenges; returns the ids of sessions closed.
    pub(crate) fn tick(&mut self, elapsed: Duration) -> Vec<u32> {
        let mut expired = Vec::new();
        for session in self.slots.iter_mut().filter(|s| s.active) {
            session.time_left = session.time_left.saturating_sub(elapsed);
            if session.time_left.is_zero() {
                session.active = false;
                expired.push(session.sid);
            }
        }
        self.active -= expired.len();

        for pending in self.challenges.iter_mut() {
            pending.time_left = pending.time_left.saturating_sub(elapsed);
        }
        self.challenges.retain(|p| !p.time_left.is_zero());
        expired
    }
}

/// Get Channel Authentication Capabilities.
pub(crate) fn get_channel_auth_capabilities(
    config: &ControllerConfig,
    data: &[u8],
) -> Result<Vec<u8>, CompletionCode> {
    if data.len() < 2 {
        return Err(CompletionCode::REQUEST_DATA_LENGTH_INVALID);
    }

    let v2_requested = data[0] & 0x80 != 0;
    let mut channel = data[0] & 0x0F;
    if channel == 0x0E {
        // "this channel"
        channel = config.channel;
    }
    if channel != config.channel {
        tracing::debug!(channel, "auth capabilities requested for foreign channel");
        return Err(CompletionCode::INVALID_DATA_FIELD);
    }

    let privilege =
        PrivilegeLevel::from_u8(data[1]).ok_or(CompletionCode::INVALID_DATA_FIELD)?;
    if privilege > config.channel_priv_limit {
        return Err(CompletionCode::INVALID_DATA_FIELD);
    }

    let auths = config
        .users
        .iter()
        .filter(|u| u.max_priv != PrivilegeLevel::NoAccess && u.max_priv >= privilege)
        .fold(AuthTypeSet::EMPTY, |acc, u| acc.union(u.allowed_auths));

    let mut status = 0u8;
    if config.users.iter().any(|u| !u.is_null()) {
        status |= 0x04;
    }
    match config.users.iter().find(|u| u.is_null()) {
        Some(null) if null.password.expose().iter().any(|&b| b != 0) => status |= 0x02,
        Some(_) => status |= 0x01,
        None => {}
    }

    let (auth_byte, extended) = if v2_requested {
        // Extended data present; IPMI v1.5 sessions only.
        (auths.bits() | 0x80, 0x01)
    } else {
        (auths.bits(), 0x00)
    };

    Ok(vec![channel, auth_byte, status, extended, 0, 0, 0, 0])
}

/// Get Session Challenge.
pub(crate) fn get_session_challenge(
    config: &ControllerConfig,
    table: &mut SessionTable,
    exchange: &Exchange,
    data: &[u8],
) -> Result<Vec<u8>, CompletionCode> {
    if !matches!(exchange.origin, Origin::Sessionless) {
        return Err(CompletionCode::NOT_SUPPORTED_IN_PRESENT_STATE);
    }
    if data.len() < 1 + CREDENTIAL_LEN {
        return Err(CompletionCode::REQUEST_DATA_LENGTH_INVALID);
    }

    let auth = AuthType::from_u8(data[0]).ok_or(CompletionCode::INVALID_DATA_FIELD)?;
    let mut name = [0u8; CREDENTIAL_LEN];
    name.copy_from_slice(&data[1..1 + CREDENTIAL_LEN]);

    let Some(user) = config.find_user(&name) else {
        tracing::warn!(
            user = %String::from_utf8_lossy(&name).trim_end_matches('\0'),
            "session challenge for unknown user"
        );
        return Err(if name.iter().all(|&b| b == 0) {
            CompletionCode::NULL_USER_DISABLED
        } else {
            CompletionCode::INVALID_USER
        });
    };

    if !user.allowed_auths.contains(auth) {
        tracing::warn!(user = user.idx, ?auth, "session challenge with disallowed auth type");
        return Err(CompletionCode::INVALID_DATA_FIELD);
    }
    if table.active_count() >= config.max_sessions {
        tracing::warn!("session challenge refused: session table full");
        return Err(CompletionCode::OUT_OF_SPACE);
    }

    let (sid, challenge) = table.issue_challenge(user.idx);
    tracing::debug!(user = user.idx, sid = format_args!("{sid:#010x}"), "challenge issued");

    let mut out = Vec::with_capacity(4 + CHALLENGE_LEN);
    out.extend_from_slice(&sid.to_le_bytes());
    out.extend_from_slice(&challenge);
    Ok(out)
}

/// Activate Session.
pub(crate) fn activate_session(
    config: &ControllerConfig,
    table: &mut SessionTable,
    exchange: &mut Exchange,
    data: &[u8],
) -> Result<Vec<u8>, CompletionCode> {
    if data.len() < 22 {
        return Err(CompletionCode::REQUEST_DATA_LENGTH_INVALID);
    }
    let xmit_seq = u32::from_le_bytes([data[18], data[19], data[20], data[21]]);

    match exchange.origin {
        Origin::Temporary { sid, user_idx } => {
            // Errors go back on the temporary session with the console's sequence.
            exchange.reply.seq = xmit_seq;

            let auth = AuthType::from_u8(data[0]).ok_or(CompletionCode::INVALID_DATA_FIELD)?;
            let user = config
                .user(user_idx)
                .ok_or(CompletionCode::INVALID_SESSION_ID)?;
            if !table.challenge_matches(sid, &data[2..2 + CHALLENGE_LEN]) {
                tracing::warn!(sid = format_args!("{sid:#010x}"), "activate with unknown challenge");
                return Err(CompletionCode::INVALID_SESSION_ID);
            }
            if !user.allowed_auths.contains(auth) || !user.allowed_auths.contains(exchange.frame_auth)
            {
                tracing::warn!(user = user_idx, ?auth, "activate with disallowed auth type");
                return Err(CompletionCode::INVALID_DATA_FIELD);
            }
            if table.active_count() >= config.max_sessions {
                tracing::warn!("activate refused: too many open sessions");
                return Err(CompletionCode::OUT_OF_SPACE);
            }
            if xmit_seq == 0 {
                return Err(CompletionCode::INVALID_SEQUENCE);
            }

            let max_priv =
                PrivilegeLevel::from_u8(data[1]).ok_or(CompletionCode::INVALID_DATA_FIELD)?;
            if user.max_priv == PrivilegeLevel::NoAccess
                || max_priv > user.max_priv
                || max_priv > config.channel_priv_limit
            {
                tracing::warn!(
                    requested = ?max_priv,
                    allowed = ?user.max_priv,
                    "activate refused: privilege mismatch"
                );
                return Err(CompletionCode::PRIVILEGE_MISMATCH);
            }

            let session = table
                .open(Activation {
                    user_idx,
                    auth_type: auth,
                    max_priv,
                    xmit_seq: next_seq(xmit_seq),
                })
                .ok_or(CompletionCode::NO_SESSION_SLOT)?;
            let out = activation_response(session);
            tracing::info!(
                handle = session.handle,
                user = user_idx,
                max_priv = ?max_priv,
                "session activated"
            );
            table.forget_challenge(sid);
            Ok(out)
        }
        Origin::Session { handle } => {
            // Already active: only the outbound sequence is resynchronised.
            if xmit_seq == 0 {
                return Err(CompletionCode::INVALID_SEQUENCE);
            }
            exchange.reply.seq = xmit_seq;
            let session = table
                .by_handle(handle)
                .ok_or(CompletionCode::INVALID_SESSION_ID)?;
            Ok(activation_response(session))
        }
        Origin::Sessionless => Err(CompletionCode::INVALID_SESSION_ID),
    }
}

fn activation_response(session: &Session) -> Vec<u8> {
    let mut out = Vec::with_capacity(10);
    out.push(session.auth_type.as_u8());
    out.extend_from_slice(&session.sid.to_le_bytes());
    out.extend_from_slice(&session.recv_seq.to_le_bytes());
    out.push(session.max_priv.as_u8());
    out
}

/// Set Session Privilege Level.
pub(crate) fn set_session_privilege(
    table: &mut SessionTable,
    exchange: &Exchange,
    data: &[u8],
) -> Result<Vec<u8>, CompletionCode> {
    if data.is_empty() {
        return Err(CompletionCode::REQUEST_DATA_LENGTH_INVALID);
    }
    let Origin::Session { handle } = exchange.origin else {
        return Err(CompletionCode::INSUFFICIENT_PRIVILEGE);
    };
    let session = table
        .by_handle_mut(handle)
        .ok_or(CompletionCode::INVALID_SESSION_ID)?;

    let requested = match data[0] & 0x0F {
        0 => session.priv_level,
        raw => PrivilegeLevel::from_u8(raw).ok_or(CompletionCode::INVALID_DATA_FIELD)?,
    };
    if requested < PrivilegeLevel::User {
        return Err(CompletionCode::PRIVILEGE_BELOW_USER);
    }
    if requested > session.max_priv {
        return Err(CompletionCode::PRIVILEGE_ABOVE_LIMIT);
    }

    session.priv_level = requested;
    tracing::debug!(handle, privilege = ?requested, "session privilege set");
    Ok(vec![requested.as_u8()])
}

/// Close Session.
pub(crate) fn close_session(
    table: &mut SessionTable,
    exchange: &Exchange,
    data: &[u8],
) -> Result<Vec<u8>, CompletionCode> {
    if data.len() < 4 {
        return Err(CompletionCode::REQUEST_DATA_LENGTH_INVALID);
    }
    let Origin::Session { handle } = exchange.origin else {
        return Err(CompletionCode::INSUFFICIENT_PRIVILEGE);
    };
    let caller = table
        .by_handle(handle)
        .ok_or(CompletionCode::INVALID_SESSION_ID)?;

    let target_sid = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);
    let target = if target_sid == caller.sid {
        handle
    } else {
        // Only administrators may close other sessions.
        if caller.priv_level != PrivilegeLevel::Administrator {
            tracing::warn!(handle, "close of foreign session refused");
            return Err(CompletionCode::INSUFFICIENT_PRIVILEGE);
        }
        table
            .lookup(target_sid)
            .ok_or(CompletionCode::SESSION_NOT_FOUND)?
            .handle
    };

    table.close(target);
    tracing::info!(handle = target, by = handle, "session closed on request");
    Ok(Vec::new())
}
