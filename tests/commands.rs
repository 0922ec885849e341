use ipmi_bmc::commands::{
    ActivateSession, AddSelEntry, ClearSel, Command, GetChannelAuthCapabilities, GetDeviceId,
    GetSdr, GetSelInfo, GetSensorReading, GetSessionChallenge, SetSessionPrivilegeLevel,
    UpdateSensorValue,
};
use ipmi_bmc::{AuthType, Error, PrivilegeLevel, RawResponse};

#[test]
fn get_device_id_parses_response() {
    let response = RawResponse {
        completion_code: 0x00,
        data: vec![
            0x20, 0x01, 0x02, 0x43, 0x51, 0x00, 0xA2, 0x02, 0x00, 0x00, 0x01, 0x00, 0x06, 0x2B,
            0x2B,
        ],
    };

    let parsed = GetDeviceId.parse_response(response).expect("parse");
    assert_eq!(parsed.device_id, 0x20);
    assert_eq!(parsed.device_revision, 0x01);
    assert_eq!(parsed.firmware_major, 0x02);
    assert_eq!(parsed.firmware_minor, 0x43);
    assert_eq!(parsed.manufacturer_id, 0x0000_02A2);
    assert_eq!(parsed.product_id, 0x0100);
}

#[test]
fn completion_code_is_reported() {
    let response = RawResponse {
        completion_code: 0xC1,
        data: vec![0xAA, 0xBB],
    };

    let err = GetSelInfo
        .parse_response(response)
        .expect_err("expected error");
    assert!(matches!(
        err,
        Error::CompletionCode { completion_code } if completion_code.as_u8() == 0xC1
    ));
}

#[test]
fn get_channel_auth_capabilities_encodes_request_data() {
    let cmd = GetChannelAuthCapabilities::current_channel(PrivilegeLevel::Administrator);
    assert_eq!(cmd.request_data(), vec![0x0E, 0x04]);

    let cmd = GetChannelAuthCapabilities {
        channel: 0x02,
        privilege: PrivilegeLevel::User,
        request_v2_data: true,
    };
    assert_eq!(cmd.request_data(), vec![0x82, 0x02]);
}

#[test]
fn get_channel_auth_capabilities_parses_response() {
    let response = RawResponse {
        completion_code: 0x00,
        data: vec![0x01, 0x91, 0x06, 0x01, 0, 0, 0, 0],
    };
    let caps = GetChannelAuthCapabilities::current_channel(PrivilegeLevel::User)
        .parse_response(response)
        .expect("parse");
    assert_eq!(caps.channel_number, 1);
    assert!(caps.v20_data_available);
    assert!(caps.enabled_auth_types.contains(AuthType::None));
    assert!(caps.enabled_auth_types.contains(AuthType::Straight));
    assert!(!caps.enabled_auth_types.contains(AuthType::Md5));
    assert!(caps.non_null_usernames);
    assert!(caps.null_usernames);
    assert!(!caps.anonymous_login_enabled);
    assert!(caps.supports_ipmi_v1_5);
}

#[test]
fn session_challenge_pads_username() {
    let cmd = GetSessionChallenge {
        auth_type: AuthType::Straight,
        username: b"ipmiusr".to_vec(),
    };
    let data = cmd.request_data();
    assert_eq!(data.len(), 17);
    assert_eq!(data[0], 0x04);
    assert_eq!(&data[1..8], b"ipmiusr");
    assert!(data[8..].iter().all(|&b| b == 0));

    let mut reply = vec![0x03, 0x02, 0x00, 0x00];
    reply.extend(1..=16u8);
    let challenge = cmd
        .parse_response(RawResponse {
            completion_code: 0x00,
            data: reply,
        })
        .expect("parse");
    assert_eq!(challenge.temporary_session_id, 0x0000_0203);
    assert_eq!(challenge.challenge[15], 16);
}

#[test]
fn activate_session_round_trips_fields() {
    let cmd = ActivateSession {
        auth_type: AuthType::None,
        max_privilege: PrivilegeLevel::Operator,
        challenge: [0x5A; 16],
        initial_outbound_seq: 0x0102_0304,
    };
    let data = cmd.request_data();
    assert_eq!(data.len(), 22);
    assert_eq!(&data[0..2], &[0x00, 0x03]);
    assert_eq!(&data[18..22], &[0x04, 0x03, 0x02, 0x01]);

    let activated = cmd
        .parse_response(RawResponse {
            completion_code: 0x00,
            data: vec![0x00, 0x82, 0x00, 0x00, 0x00, 0x10, 0x00, 0x00, 0x00, 0x03],
        })
        .expect("parse");
    assert_eq!(activated.session_id, 0x82);
    assert_eq!(activated.initial_inbound_seq, 0x10);
    assert_eq!(activated.max_privilege, PrivilegeLevel::Operator);

    let short = cmd.parse_response(RawResponse {
        completion_code: 0x00,
        data: vec![0x00, 0x82],
    });
    assert!(matches!(short, Err(Error::Protocol(_))));
}

#[test]
fn set_privilege_reports_new_level() {
    let cmd = SetSessionPrivilegeLevel {
        privilege: PrivilegeLevel::Administrator,
    };
    assert_eq!(cmd.request_data(), vec![0x04]);
    let level = cmd
        .parse_response(RawResponse {
            completion_code: 0x00,
            data: vec![0x04],
        })
        .expect("parse");
    assert_eq!(level, PrivilegeLevel::Administrator);
}

#[test]
fn storage_requests_encode_little_endian() {
    let get = GetSdr {
        reservation: 0x1234,
        record_id: 0xFFFF,
        offset: 5,
        count: 0xFF,
    };
    assert_eq!(get.request_data(), vec![0x34, 0x12, 0xFF, 0xFF, 5, 0xFF]);

    let clear = ClearSel {
        reservation: 0x0001,
        erase: true,
    };
    assert_eq!(clear.request_data(), vec![0x01, 0x00, b'C', b'L', b'R', 0xAA]);

    let update = UpdateSensorValue {
        lun: 5,
        number: 7,
        value: 0x33,
    };
    assert_eq!(update.request_data(), vec![0, 0, 0, 0x01, 7, 0x33]);

    let add = AddSelEntry { record: [0xEE; 16] };
    assert_eq!(add.request_data().len(), 16);
}

#[test]
fn sensor_reading_parses_flags() {
    let reading = GetSensorReading { number: 1 }
        .parse_response(RawResponse {
            completion_code: 0x00,
            data: vec![0x60, 0xE0, 0x01, 0x80],
        })
        .expect("parse");
    assert_eq!(reading.value, 0x60);
    assert!(reading.events_enabled);
    assert!(reading.scanning_enabled);
    assert!(reading.reading_unavailable);
    assert_eq!(reading.event_status, 0x8001);
}
