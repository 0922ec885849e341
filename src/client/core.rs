use crate::auth::{SecretBytes, auth_code_for};
use crate::error::{Error, Result};
use crate::protocol::{
    BMC_SLAVE_ADDR, Datagram, MessageHeader, REMOTE_SWID, SessionHeader, encode_frame,
    parse_datagram,
};
use crate::session::next_seq;
use crate::types::{AuthType, RawResponse};

/// Framing state of a console-side session.
///
/// Starts sessionless; the handshake moves it to the temporary session id
/// and then to the established one.
#[derive(Debug)]
pub(crate) struct ClientCore {
    sid: u32,
    auth_type: AuthType,
    password: SecretBytes,
    out_seq: u32,
    rq_seq: u8,
    closed: bool,
}

impl ClientCore {
    pub(crate) fn sessionless(password: SecretBytes) -> Self {
        Self {
            sid: 0,
            auth_type: AuthType::None,
            password,
            out_seq: 0,
            rq_seq: 0,
            closed: false,
        }
    }

    /// Address the activation request to the temporary session.
    pub(crate) fn enter_temporary(&mut self, sid: u32, auth_type: AuthType) {
        self.sid = sid;
        self.auth_type = auth_type;
        self.out_seq = 0;
    }

    /// Switch to the established session.
    pub(crate) fn enter_session(&mut self, sid: u32, auth_type: AuthType, first_seq: u32) {
        self.sid = sid;
        self.auth_type = auth_type;
        self.out_seq = first_seq;
    }

    pub(crate) fn session_id(&self) -> u32 {
        self.sid
    }

    pub(crate) fn mark_closed(&mut self) {
        self.closed = true;
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed
    }

    pub(crate) fn build_request(&mut self, netfn: u8, cmd: u8, data: &[u8]) -> Result<(u8, Vec<u8>)> {
        if self.closed {
            return Err(Error::Protocol("session is closed"));
        }

        let rq_seq = self.allocate_rq_seq();
        let session = SessionHeader {
            auth_type: self.auth_type.as_u8(),
            seq: self.out_seq,
            sid: self.sid,
            auth_code: auth_code_for(self.auth_type, &self.password),
        };
        let message = MessageHeader {
            rs_addr: BMC_SLAVE_ADDR,
            netfn,
            rs_lun: 0,
            rq_addr: REMOTE_SWID,
            rq_seq,
            rq_lun: 0,
            cmd,
        };
        let packet = encode_frame(&session, &message, data)?;
        if self.sid != 0 && self.sid & 1 == 0 {
            self.out_seq = next_seq(self.out_seq);
        }
        Ok((rq_seq, packet))
    }

    pub(crate) fn decode_response(
        &self,
        expected_netfn: u8,
        expected_cmd: u8,
        expected_rq_seq: u8,
        response_bytes: &[u8],
    ) -> Result<RawResponse> {
        crate::debug::dump_hex("ipmi response datagram", response_bytes);

        let frame = match parse_datagram(response_bytes)? {
            Datagram::Ipmi(frame) => frame,
            Datagram::Ping(_) => return Err(Error::Protocol("unexpected ASF message")),
        };

        if frame.message.netfn != (expected_netfn | 1) {
            return Err(Error::Protocol("unexpected response netfn"));
        }
        if frame.message.cmd != expected_cmd {
            return Err(Error::Protocol("unexpected response command"));
        }
        if frame.message.rq_seq != expected_rq_seq {
            return Err(Error::Protocol("unexpected response sequence"));
        }

        let (&completion_code, data) = frame
            .body
            .split_first()
            .ok_or(Error::Protocol("response missing completion code"))?;
        Ok(RawResponse {
            completion_code,
            data: data.to_vec(),
        })
    }

    fn allocate_rq_seq(&mut self) -> u8 {
        // rq_seq is 6-bit.
        let current = self.rq_seq;
        self.rq_seq = (self.rq_seq + 1) & 0x3F;
        current
    }
}
