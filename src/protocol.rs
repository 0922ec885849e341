use crate::checksum::{checksum, checksum_byte, is_valid};
use crate::error::{Error, Result};
use crate::types::AuthType;

/// RMCP header values.
pub(crate) const RMCP_VERSION: u8 = 0x06;
const RMCP_RESERVED: u8 = 0x00;
const RMCP_SEQ_NO_ACK: u8 = 0xFF;
pub(crate) const RMCP_CLASS_ASF: u8 = 0x06;
pub(crate) const RMCP_CLASS_IPMI: u8 = 0x07;

/// ASF presence ping/pong.
const ASF_IANA: u32 = 4542;
const ASF_TYPE_PING: u8 = 0x80;
const ASF_TYPE_PONG: u8 = 0x40;
const ASF_PONG_DATA_LEN: u8 = 0x10;
/// Supported entities: IPMI supported, ASF version 1.0.
const ASF_ENTITIES_IPMI: u8 = 0x81;

/// Length of the per-message auth code carried when auth type != none.
pub(crate) const AUTH_CODE_LEN: usize = 16;

/// Slave address of the BMC on the LAN channel.
pub(crate) const BMC_SLAVE_ADDR: u8 = 0x20;
/// Software ID used by remote consoles.
pub(crate) const REMOTE_SWID: u8 = 0x81;

/// Smallest datagram worth looking at.
const MIN_DATAGRAM_LEN: usize = 5;
/// RMCP header + auth type + session seq + session id + message length.
const MIN_SESSION_LEN: usize = 4 + 1 + 4 + 4 + 1;
/// Message header (6) + trailing checksum.
const MIN_MESSAGE_LEN: usize = 7;

/// IPMI v1.5 session header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SessionHeader {
    pub auth_type: u8,
    pub seq: u32,
    pub sid: u32,
    pub auth_code: Option<[u8; AUTH_CODE_LEN]>,
}

/// IPMI message header.
///
/// Field names follow the request direction. A response keeps the byte
/// positions and swaps the roles (see [`MessageHeader::response_to`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct MessageHeader {
    pub rs_addr: u8,
    pub netfn: u8,
    pub rs_lun: u8,
    pub rq_addr: u8,
    pub rq_seq: u8,
    pub rq_lun: u8,
    pub cmd: u8,
}

impl MessageHeader {
    /// Header of the response to this request: requester becomes
    /// responder, net function gains the response bit, LUNs swap.
    pub(crate) fn response_to(&self) -> Self {
        Self {
            rs_addr: self.rq_addr,
            netfn: self.netfn | 1,
            rs_lun: self.rq_lun,
            rq_addr: self.rs_addr,
            rq_seq: self.rq_seq,
            rq_lun: self.rs_lun,
            cmd: self.cmd,
        }
    }
}

/// A parsed IPMI-over-RMCP message (request or response).
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct IpmiFrame {
    pub rmcp_seq: u8,
    pub session: SessionHeader,
    pub message: MessageHeader,
    pub body: Vec<u8>,
}

/// An ASF presence ping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct AsfPing {
    pub rmcp_seq: u8,
    pub tag: u8,
}

/// Any datagram the endpoint understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Datagram {
    Ping(AsfPing),
    Ipmi(IpmiFrame),
}

pub(crate) fn parse_datagram(bytes: &[u8]) -> Result<Datagram> {
    if bytes.len() < MIN_DATAGRAM_LEN {
        return Err(Error::protocol_owned(format!(
            "datagram too short ({} bytes)",
            bytes.len()
        )));
    }
    if bytes[0] != RMCP_VERSION {
        return Err(Error::Protocol("unexpected RMCP version"));
    }

    match bytes[3] {
        RMCP_CLASS_ASF => parse_asf_ping(bytes).map(Datagram::Ping),
        RMCP_CLASS_IPMI => parse_ipmi_frame(bytes).map(Datagram::Ipmi),
        other => Err(Error::protocol_owned(format!(
            "unsupported RMCP class {other:#04x}"
        ))),
    }
}

fn parse_asf_ping(bytes: &[u8]) -> Result<AsfPing> {
    if bytes.len() < 4 + 8 {
        return Err(Error::Protocol("ASF message too short"));
    }
    let iana = u32::from_be_bytes(
        bytes[4..8]
            .try_into()
            .map_err(|_| Error::Protocol("invalid ASF IANA"))?,
    );
    if iana != ASF_IANA {
        return Err(Error::Protocol("unexpected ASF enterprise number"));
    }
    if bytes[8] != ASF_TYPE_PING {
        return Err(Error::Protocol("ASF message is not a presence ping"));
    }
    Ok(AsfPing {
        rmcp_seq: bytes[2],
        tag: bytes[9],
    })
}

fn parse_ipmi_frame(bytes: &[u8]) -> Result<IpmiFrame> {
    if bytes[2] != RMCP_SEQ_NO_ACK {
        return Err(Error::Protocol("RMCP sequence must be 0xff for IPMI"));
    }
    if bytes.len() < MIN_SESSION_LEN {
        return Err(Error::Protocol("session header truncated"));
    }

    let auth_type = bytes[4];
    if auth_type == AuthType::RmcpPlus.as_u8() {
        return Err(Error::Protocol("RMCP+ session format is not supported"));
    }

    let seq = u32::from_le_bytes(
        bytes[5..9]
            .try_into()
            .map_err(|_| Error::Protocol("invalid session seq"))?,
    );
    let sid = u32::from_le_bytes(
        bytes[9..13]
            .try_into()
            .map_err(|_| Error::Protocol("invalid session id"))?,
    );

    let mut cursor = 13;
    let auth_code = if auth_type != AuthType::None.as_u8() {
        let end = cursor + AUTH_CODE_LEN;
        if bytes.len() < end + 1 {
            return Err(Error::Protocol("auth code truncated"));
        }
        let code: [u8; AUTH_CODE_LEN] = bytes[cursor..end]
            .try_into()
            .map_err(|_| Error::Protocol("invalid auth code"))?;
        cursor = end;
        Some(code)
    } else {
        None
    };

    let msg_len = bytes[cursor] as usize;
    cursor += 1;
    if msg_len < MIN_MESSAGE_LEN {
        return Err(Error::Protocol("IPMI message too short"));
    }
    let msg = bytes
        .get(cursor..cursor + msg_len)
        .ok_or(Error::Protocol("IPMI message truncated"))?;

    if !is_valid(&msg[0..3]) {
        return Err(Error::Protocol("invalid IPMI checksum1"));
    }
    if !is_valid(&msg[3..]) {
        return Err(Error::Protocol("invalid IPMI checksum2"));
    }

    let message = MessageHeader {
        rs_addr: msg[0],
        netfn: msg[1] >> 2,
        rs_lun: msg[1] & 0x03,
        rq_addr: msg[3],
        rq_seq: msg[4] >> 2,
        rq_lun: msg[4] & 0x03,
        cmd: msg[5],
    };

    Ok(IpmiFrame {
        rmcp_seq: bytes[2],
        session: SessionHeader {
            auth_type,
            seq,
            sid,
            auth_code,
        },
        message,
        body: msg[6..msg_len - 1].to_vec(),
    })
}

/// Encode an IPMI-over-RMCP datagram.
///
/// Checksum 1 closes `rsAddr, netFn/LUN`; checksum 2 closes everything
/// from `rqAddr` through the end of `body`.
pub(crate) fn encode_frame(
    session: &SessionHeader,
    message: &MessageHeader,
    body: &[u8],
) -> Result<Vec<u8>> {
    let msg_len: u8 = (MIN_MESSAGE_LEN + body.len())
        .try_into()
        .map_err(|_| Error::Protocol("IPMI message too large"))?;

    let mut packet = Vec::with_capacity(MIN_SESSION_LEN + AUTH_CODE_LEN + msg_len as usize);

    // RMCP header.
    packet.push(RMCP_VERSION);
    packet.push(RMCP_RESERVED);
    packet.push(RMCP_SEQ_NO_ACK);
    packet.push(RMCP_CLASS_IPMI);

    // Session header.
    packet.push(session.auth_type);
    packet.extend_from_slice(&session.seq.to_le_bytes());
    packet.extend_from_slice(&session.sid.to_le_bytes());
    if session.auth_type != AuthType::None.as_u8() {
        packet.extend_from_slice(&session.auth_code.unwrap_or([0u8; AUTH_CODE_LEN]));
    }
    packet.push(msg_len);

    // Message header.
    let start = packet.len();
    packet.push(message.rs_addr);
    packet.push((message.netfn << 2) | (message.rs_lun & 0x03));
    let csum1 = checksum(&packet[start..start + 2], 0);
    packet.push(csum1 as u8);

    packet.push(message.rq_addr);
    packet.push((message.rq_seq << 2) | (message.rq_lun & 0x03));
    packet.push(message.cmd);
    packet.extend_from_slice(body);
    let csum2 = checksum_byte(&packet[start + 3..]);
    packet.push(csum2);

    Ok(packet)
}

/// Encode the ASF presence pong answering `ping`.
pub(crate) fn encode_asf_pong(ping: &AsfPing) -> Vec<u8> {
    let mut packet = Vec::with_capacity(4 + 8 + ASF_PONG_DATA_LEN as usize);
    packet.extend_from_slice(&[RMCP_VERSION, RMCP_RESERVED, ping.rmcp_seq, RMCP_CLASS_ASF]);
    packet.extend_from_slice(&ASF_IANA.to_be_bytes());
    packet.push(ASF_TYPE_PONG);
    packet.push(ping.tag);
    packet.push(0x00);
    packet.push(ASF_PONG_DATA_LEN);

    packet.extend_from_slice(&ASF_IANA.to_be_bytes());
    // OEM-defined data.
    packet.extend_from_slice(&[0x00; 4]);
    packet.push(ASF_ENTITIES_IPMI);
    // Supported interactions: none.
    packet.push(0x00);
    packet.extend_from_slice(&[0x00; 6]);
    packet
}

#[cfg(test)]
pub(crate) fn encode_asf_ping(tag: u8) -> Vec<u8> {
    let mut packet = vec![RMCP_VERSION, RMCP_RESERVED, RMCP_SEQ_NO_ACK, RMCP_CLASS_ASF];
    packet.extend_from_slice(&ASF_IANA.to_be_bytes());
    packet.extend_from_slice(&[ASF_TYPE_PING, tag, 0x00, 0x00]);
    packet
}
