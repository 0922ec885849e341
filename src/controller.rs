use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::auth::{auth_code_for, verify_auth_code};
use crate::config::ControllerConfig;
use crate::error::{CompletionCode, Error, Result};
use crate::protocol::{
    AUTH_CODE_LEN, Datagram, IpmiFrame, SessionHeader, encode_asf_pong, encode_frame,
    parse_datagram,
};
use crate::repository::Clock;
use crate::repository::sdr::SdrRepository;
use crate::repository::sel::{SEL_RECORD_LEN, SelRepository};
use crate::repository::sensor::{SensorState, SensorTable};
use crate::router::Handler;
use crate::session::{self, SessionTable, next_seq, temporary_session_user};
use crate::types::{AuthType, DeviceIdentity};

/// A controller shared between a server loop and in-process users.
pub type SharedController = Arc<Mutex<Controller>>;

/// IPMI version reported by Get Device ID.
const IPMI_VERSION: u8 = 0x51;

/// Where a request came from, after authentication.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Origin {
    /// Session id 0, auth type none.
    Sessionless,
    /// Odd session id handed out with a challenge.
    Temporary { sid: u32, user_idx: u8 },
    /// Established session.
    Session { handle: u8 },
}

/// Session header fields stamped on the reply.
#[derive(Debug, Clone)]
pub(crate) struct ReplyEnvelope {
    pub auth_type: AuthType,
    pub seq: u32,
    pub sid: u32,
    pub auth_code: Option<[u8; AUTH_CODE_LEN]>,
}

/// One request/response exchange as seen by the handlers.
#[derive(Debug)]
pub(crate) struct Exchange {
    pub origin: Origin,
    pub frame_auth: AuthType,
    pub rs_lun: u8,
    pub reply: ReplyEnvelope,
}

/// The management controller: session table, repositories and sensors.
///
/// All state lives here; servers wrap it in a [`SharedController`] and feed
/// it one datagram at a time.
#[derive(Debug)]
pub struct Controller {
    config: ControllerConfig,
    sessions: SessionTable,
    sdr: SdrRepository,
    sel: SelRepository,
    sensors: SensorTable,
    clock: Clock,
}

impl Controller {
    /// Create a controller with empty repositories.
    pub fn new(config: ControllerConfig) -> Self {
        Self {
            sessions: SessionTable::new(config.max_sessions, config.session_timeout),
            sdr: SdrRepository::new(config.max_sdr_count),
            sel: SelRepository::new(config.max_sel_count),
            sensors: SensorTable::default(),
            clock: Clock::default(),
            config,
        }
    }

    /// Wrap the controller for sharing with a server.
    pub fn into_shared(self) -> SharedController {
        Arc::new(Mutex::new(self))
    }

    /// Configuration this controller was built with.
    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Number of established sessions.
    pub fn active_sessions(&self) -> usize {
        self.sessions.active_count()
    }

    /// Number of records in the SDR repository.
    pub fn sdr_count(&self) -> usize {
        self.sdr.len()
    }

    /// Number of entries in the SEL.
    pub fn sel_count(&self) -> usize {
        self.sel.len()
    }

    /// Add a raw SDR record, returning its assigned id.
    pub fn add_sdr(&mut self, record: &[u8]) -> Result<u16> {
        let now = self.clock.now();
        let reply = self.sdr.add(record, now, &mut self.sensors)?;
        Ok(u16::from_le_bytes([reply[0], reply[1]]))
    }

    /// Add a raw 16-byte SEL record, returning its assigned id.
    pub fn add_sel_entry(&mut self, record: &[u8; SEL_RECORD_LEN]) -> Result<u16> {
        let now = self.clock.now();
        let reply = self.sel.add(record, now)?;
        Ok(u16::from_le_bytes([reply[0], reply[1]]))
    }

    /// Set the live reading of a sensor, registering it if needed.
    pub fn update_sensor(&mut self, lun: u8, number: u8, value: u8) {
        self.sensors.set_value(lun, number, value);
    }

    /// Enable or disable a sensor's reading and event generation.
    pub fn set_sensor_enabled(&mut self, lun: u8, number: u8, enabled: bool) -> Result<()> {
        let sensor = self
            .sensors
            .get_mut(lun, number)
            .ok_or(Error::InvalidArgument("unknown sensor"))?;
        sensor.enabled = enabled;
        sensor.scanning_enabled = enabled;
        Ok(())
    }

    /// Current state of a sensor.
    pub fn sensor(&self, lun: u8, number: u8) -> Option<SensorState> {
        self.sensors.get(lun, number).copied()
    }

    /// Advance session timers by `elapsed`, closing sessions that ran out.
    pub fn tick(&mut self, elapsed: Duration) {
        for sid in self.sessions.tick(elapsed) {
            tracing::info!(sid = format_args!("{sid:#010x}"), "session timed out");
        }
        crate::observe::record_active_sessions(self.sessions.active_count());
    }

    /// Process one inbound datagram and return the reply, if any.
    ///
    /// Malformed or unauthenticated traffic yields `None`: nothing is sent back.
    pub fn handle_datagram(&mut self, bytes: &[u8]) -> Option<Vec<u8>> {
        crate::debug::dump_hex("request datagram", bytes);

        let datagram = match parse_datagram(bytes) {
            Ok(datagram) => datagram,
            Err(err) => {
                crate::observe::record_malformed(&err);
                return None;
            }
        };

        let reply = match datagram {
            Datagram::Ping(ping) => {
                tracing::debug!(tag = ping.tag, "ASF presence ping");
                Some(encode_asf_pong(&ping))
            }
            Datagram::Ipmi(frame) => self.handle_ipmi(&frame),
        };
        if let Some(reply) = &reply {
            crate::debug::dump_hex("reply datagram", reply);
        }
        reply
    }

    fn handle_ipmi(&mut self, frame: &IpmiFrame) -> Option<Vec<u8>> {
        let start = Instant::now();

        let Some(frame_auth) = AuthType::from_u8(frame.session.auth_type) else {
            crate::observe::record_dropped("unknown auth type");
            return None;
        };
        let origin = match self.authenticate(&frame.session, frame_auth) {
            Ok(origin) => origin,
            Err(reason) => {
                crate::observe::record_dropped(reason);
                return None;
            }
        };

        let handler = Handler::from_codes(frame.message.netfn, frame.message.cmd);
        if matches!(origin, Origin::Temporary { .. }) && handler != Some(Handler::ActivateSession)
        {
            crate::observe::record_dropped("temporary session used for other than activation");
            return None;
        }

        let mut exchange = Exchange {
            origin,
            frame_auth,
            rs_lun: frame.message.rs_lun,
            reply: self.envelope_for(origin, frame_auth),
        };

        let result = match handler {
            Some(handler) => match self.authorize(handler, &exchange) {
                Ok(()) => self.dispatch(handler, &mut exchange, &frame.body),
                Err(code) => Err(code),
            },
            None => {
                tracing::debug!(
                    netfn = frame.message.netfn,
                    cmd = frame.message.cmd,
                    "unsupported command"
                );
                Err(CompletionCode::INVALID_COMMAND)
            }
        };

        let body = match result {
            Ok(data) => {
                let mut body = Vec::with_capacity(1 + data.len());
                body.push(CompletionCode::OK.as_u8());
                body.extend_from_slice(&data);
                body
            }
            Err(code) => vec![code.as_u8()],
        };

        if let Origin::Session { handle } = origin {
            if let Some(session) = self.sessions.by_handle_mut(handle) {
                if session.sid == exchange.reply.sid {
                    session.xmit_seq = next_seq(exchange.reply.seq);
                }
            }
        }

        let envelope = &exchange.reply;
        let header = SessionHeader {
            auth_type: envelope.auth_type.as_u8(),
            seq: envelope.seq,
            sid: envelope.sid,
            auth_code: envelope.auth_code,
        };
        let reply = match encode_frame(&header, &frame.message.response_to(), &body) {
            Ok(reply) => reply,
            Err(err) => {
                tracing::error!(error = %err, "failed to encode reply");
                return None;
            }
        };

        crate::observe::record_handled(
            frame.message.netfn,
            frame.message.cmd,
            start.elapsed(),
            body[0],
        );
        crate::observe::record_active_sessions(self.sessions.active_count());
        Some(reply)
    }

    /// Resolve the session a frame claims and check its credentials.
    fn authenticate(
        &mut self,
        header: &SessionHeader,
        frame_auth: AuthType,
    ) -> std::result::Result<Origin, &'static str> {
        match header.sid {
            0 => {
                if frame_auth != AuthType::None {
                    return Err("sessionless request with authentication");
                }
                Ok(Origin::Sessionless)
            }
            sid if sid & 1 == 1 => {
                let user_idx = temporary_session_user(sid).ok_or("bad temporary session id")?;
                let user = self
                    .config
                    .user(user_idx)
                    .ok_or("temporary session for unknown user")?;
                if !verify_auth_code(frame_auth, &user.password, header.auth_code.as_ref()) {
                    return Err("activation auth code mismatch");
                }
                Ok(Origin::Temporary { sid, user_idx })
            }
            sid => {
                let session = self.sessions.lookup(sid).ok_or("unknown session")?;
                if session.auth_type != frame_auth {
                    return Err("session auth type mismatch");
                }
                let user = self
                    .config
                    .user(session.user_idx)
                    .ok_or("session user vanished")?;
                if !verify_auth_code(frame_auth, &user.password, header.auth_code.as_ref()) {
                    return Err("session auth code mismatch");
                }
                let handle = session.handle;
                if !self.sessions.accept_inbound_seq(handle, header.seq) {
                    return Err("session sequence outside window");
                }
                self.sessions.touch(handle);
                Ok(Origin::Session { handle })
            }
        }
    }

    fn envelope_for(&self, origin: Origin, frame_auth: AuthType) -> ReplyEnvelope {
        match origin {
            Origin::Sessionless => ReplyEnvelope {
                auth_type: AuthType::None,
                seq: 0,
                sid: 0,
                auth_code: None,
            },
            Origin::Temporary { sid, user_idx } => ReplyEnvelope {
                auth_type: frame_auth,
                seq: 0,
                sid,
                auth_code: self
                    .config
                    .user(user_idx)
                    .and_then(|u| auth_code_for(frame_auth, &u.password)),
            },
            Origin::Session { handle } => match self.sessions.by_handle(handle) {
                Some(session) => ReplyEnvelope {
                    auth_type: session.auth_type,
                    seq: session.xmit_seq,
                    sid: session.sid,
                    auth_code: self
                        .config
                        .user(session.user_idx)
                        .and_then(|u| auth_code_for(session.auth_type, &u.password)),
                },
                None => ReplyEnvelope {
                    auth_type: frame_auth,
                    seq: 0,
                    sid: 0,
                    auth_code: None,
                },
            },
        }
    }

    fn authorize(
        &self,
        handler: Handler,
        exchange: &Exchange,
    ) -> std::result::Result<(), CompletionCode> {
        match exchange.origin {
            Origin::Sessionless if handler.allowed_sessionless() => Ok(()),
            Origin::Sessionless => Err(CompletionCode::INSUFFICIENT_PRIVILEGE),
            Origin::Temporary { .. } => Ok(()),
            Origin::Session { handle } => {
                let session = self
                    .sessions
                    .by_handle(handle)
                    .ok_or(CompletionCode::INVALID_SESSION_ID)?;
                match handler.min_privilege() {
                    Some(min) if session.priv_level < min => {
                        tracing::debug!(
                            handle,
                            ?handler,
                            privilege = ?session.priv_level,
                            "insufficient privilege"
                        );
                        Err(CompletionCode::INSUFFICIENT_PRIVILEGE)
                    }
                    _ => Ok(()),
                }
            }
        }
    }

    fn dispatch(
        &mut self,
        handler: Handler,
        exchange: &mut Exchange,
        data: &[u8],
    ) -> std::result::Result<Vec<u8>, CompletionCode> {
        let now = self.clock.now();
        let max_response = self.config.max_response_data;

        match handler {
            Handler::GetDeviceId => Ok(device_id_response(&self.config.identity)),
            Handler::GetChannelAuthCapabilities => {
                session::get_channel_auth_capabilities(&self.config, data)
            }
            Handler::GetSessionChallenge => {
                session::get_session_challenge(&self.config, &mut self.sessions, exchange, data)
            }
            Handler::ActivateSession => {
                session::activate_session(&self.config, &mut self.sessions, exchange, data)
            }
            Handler::SetSessionPrivilege => {
                session::set_session_privilege(&mut self.sessions, exchange, data)
            }
            Handler::CloseSession => session::close_session(&mut self.sessions, exchange, data),

            Handler::GetSdrRepositoryInfo => Ok(self.sdr.info()),
            Handler::ReserveSdrRepository => Ok(self.sdr.reserve()),
            Handler::GetSdr => self.sdr.get(data, max_response),
            Handler::AddSdr => self.sdr.add(data, now, &mut self.sensors),
            Handler::ClearSdrRepository => self.sdr.clear(data, now),

            Handler::GetSelInfo => Ok(self.sel.info()),
            Handler::ReserveSel => Ok(self.sel.reserve()),
            Handler::GetSelEntry => self.sel.get(data, max_response),
            Handler::AddSelEntry => self.sel.add(data, now),
            Handler::DeleteSelEntry => self.sel.delete(data, now),
            Handler::ClearSel => self.sel.clear(data, now),
            Handler::GetSelTime => Ok(now.to_le_bytes().to_vec()),
            Handler::SetSelTime => {
                if data.len() < 4 {
                    return Err(CompletionCode::REQUEST_DATA_LENGTH_INVALID);
                }
                let time = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);
                self.clock.set(time);
                tracing::info!(time, "SEL time set");
                Ok(Vec::new())
            }

            Handler::GetSensorReading => self.sensors.reading(exchange.rs_lun, data),
        }
    }
}

fn device_id_response(identity: &DeviceIdentity) -> Vec<u8> {
    let mfg = identity.manufacturer_id.to_le_bytes();
    let product = identity.product_id.to_le_bytes();
    vec![
        identity.device_id,
        identity.device_revision & 0x0F,
        identity.firmware_major & 0x7F,
        identity.firmware_minor,
        IPMI_VERSION,
        identity.device_support,
        mfg[0],
        mfg[1],
        mfg[2],
        product[0],
        product[1],
        // auxiliary firmware revision
        0,
        0,
        0,
        0,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::codes::*;
    use crate::protocol::{BMC_SLAVE_ADDR, MessageHeader, REMOTE_SWID, encode_asf_ping};

    fn controller() -> Controller {
        Controller::new(ControllerConfig::builder().build().expect("config"))
    }

    fn request(sid: u32, seq: u32, netfn: u8, cmd: u8, body: &[u8]) -> Vec<u8> {
        let session = SessionHeader {
            auth_type: AuthType::None.as_u8(),
            seq,
            sid,
            auth_code: None,
        };
        let message = MessageHeader {
            rs_addr: BMC_SLAVE_ADDR,
            netfn,
            rs_lun: 0,
            rq_addr: REMOTE_SWID,
            rq_seq: 1,
            rq_lun: 0,
            cmd,
        };
        encode_frame(&session, &message, body).expect("encode")
    }

    fn reply_frame(bytes: &[u8]) -> IpmiFrame {
        match parse_datagram(bytes).expect("reply parses") {
            Datagram::Ipmi(frame) => frame,
            Datagram::Ping(_) => panic!("expected IPMI reply"),
        }
    }

    #[test]
    fn ping_gets_pong() {
        let mut bmc = controller();
        let pong = bmc.handle_datagram(&encode_asf_ping(7)).expect("pong");
        assert_eq!(pong[8], 0x40);
        assert_eq!(pong[9], 7);
    }

    #[test]
    fn garbage_is_dropped() {
        let mut bmc = controller();
        assert!(bmc.handle_datagram(&[0x06, 0x00]).is_none());
        assert!(bmc.handle_datagram(&[0x06, 0x00, 0xFF, 0x09, 0x00]).is_none());

        let mut corrupt = request(0, 0, NETFN_APP, GET_CHANNEL_AUTH_CAPABILITIES, &[0x0E, 0x04]);
        let last = corrupt.len() - 1;
        corrupt[last] = corrupt[last].wrapping_add(1);
        assert!(bmc.handle_datagram(&corrupt).is_none());
    }

    #[test]
    fn sessionless_reply_mirrors_request_header() {
        let mut bmc = controller();
        let reply = bmc
            .handle_datagram(&request(
                0,
                0,
                NETFN_APP,
                GET_CHANNEL_AUTH_CAPABILITIES,
                &[0x0E, 0x02],
            ))
            .expect("reply");
        let frame = reply_frame(&reply);
        assert_eq!(frame.message.netfn, NETFN_APP | 1);
        assert_eq!(frame.message.rs_addr, REMOTE_SWID);
        assert_eq!(frame.message.rq_addr, BMC_SLAVE_ADDR);
        assert_eq!(frame.message.rq_seq, 1);
        assert_eq!(frame.session.sid, 0);
        assert_eq!(frame.body[0], 0x00);
        assert_eq!(frame.body[1], 1);
        // None and Straight offered
        assert_eq!(frame.body[2], 0x11);
    }

    #[test]
    fn sessionless_storage_command_needs_a_session() {
        let mut bmc = controller();
        let reply = bmc
            .handle_datagram(&request(0, 0, NETFN_STORAGE, GET_SEL_INFO, &[]))
            .expect("reply");
        assert_eq!(reply_frame(&reply).body, vec![0xD4]);
    }

    #[test]
    fn unknown_command_gets_invalid_command() {
        let mut bmc = controller();
        let reply = bmc
            .handle_datagram(&request(0, 0, 0x2E, 0x01, &[]))
            .expect("reply");
        assert_eq!(reply_frame(&reply).body, vec![0xC1]);
    }

    #[test]
    fn unknown_session_is_dropped() {
        let mut bmc = controller();
        let sid = session::encode_session_id(5, 1);
        assert!(
            bmc.handle_datagram(&request(sid, 1, NETFN_STORAGE, GET_SEL_INFO, &[]))
                .is_none()
        );
    }

    #[test]
    fn device_id_reports_identity() {
        let data = device_id_response(&DeviceIdentity::default());
        assert_eq!(data.len(), 15);
        assert_eq!(data[4], IPMI_VERSION);
        assert_eq!(&data[6..9], &[0x00, 0x00, 0x01]);
    }

    #[test]
    fn sensor_updates_are_visible() {
        let mut bmc = controller();
        assert!(bmc.sensor(0, 4).is_none());
        bmc.update_sensor(0, 4, 0x33);
        assert_eq!(bmc.sensor(0, 4).map(|s| s.value), Some(0x33));
        bmc.set_sensor_enabled(0, 4, false).expect("known sensor");
        assert_eq!(bmc.sensor(0, 4).map(|s| s.enabled), Some(false));
        assert!(bmc.set_sensor_enabled(0, 5, false).is_err());
    }
}
