use std::time::Duration;

use ipmi_bmc::commands::{AddSdr, GetSdrRepositoryInfo};
use ipmi_bmc::{
    AuthType, Client, ClientBuilder, CompletionCode, Controller, ControllerConfig, Error, Loopback,
    PrivilegeLevel, SharedController, decode_session_id,
};

fn shared(config: ControllerConfig) -> SharedController {
    Controller::new(config).into_shared()
}

fn default_controller() -> SharedController {
    shared(ControllerConfig::builder().build().expect("config"))
}

fn admin() -> ClientBuilder {
    Client::builder()
        .username("ipmiusr")
        .password("test")
        .privilege_level(PrivilegeLevel::Administrator)
        .retries(2)
        .backoff(Duration::ZERO)
}

fn null_user() -> ClientBuilder {
    Client::builder()
        .password("test")
        .auth_type(AuthType::Straight)
        .privilege_level(PrivilegeLevel::User)
        .retries(2)
        .backoff(Duration::ZERO)
}

fn active_sessions(controller: &SharedController) -> usize {
    controller.lock().expect("lock").active_sessions()
}

fn completion_code(err: &Error) -> Option<u8> {
    match err {
        Error::CompletionCode { completion_code } => Some(completion_code.as_u8()),
        _ => None,
    }
}

#[test]
fn admin_login_runs_commands_and_closes() {
    let controller = default_controller();
    let client = admin()
        .establish(Loopback::new(controller.clone()))
        .expect("login");

    assert_eq!(client.privilege(), PrivilegeLevel::Administrator);
    assert_eq!(client.auth_type(), AuthType::None);
    let (_, handle) = decode_session_id(client.session_id()).expect("active session id");
    assert_eq!(handle, 1);
    assert_eq!(active_sessions(&controller), 1);

    let identity = client.get_device_id().expect("device id");
    assert_eq!(identity.manufacturer_id, 0x01_00_00);

    client.close_session().expect("close");
    assert_eq!(active_sessions(&controller), 0);
}

#[test]
fn straight_password_session_for_null_user() {
    let controller = default_controller();
    let client = null_user()
        .establish(Loopback::new(controller.clone()))
        .expect("login");
    assert_eq!(client.auth_type(), AuthType::Straight);
    assert_eq!(client.privilege(), PrivilegeLevel::User);

    // Reads are fine at USER.
    client.execute(GetSdrRepositoryInfo).expect("repository info");

    // Adding records needs OPERATOR.
    let err = client
        .execute(AddSdr {
            record: vec![0, 0, 0x51, 0x01, 3, 0x20, 0, 9],
        })
        .expect_err("insufficient privilege");
    assert_eq!(completion_code(&err), Some(0xD4));
}

#[test]
fn wrong_password_stalls_activation() {
    let controller = default_controller();
    let err = null_user()
        .password("nope")
        .establish(Loopback::new(controller.clone()))
        .expect_err("bad password");
    assert!(matches!(
        err,
        Error::Stalled {
            step: "activate session",
            attempts: 2
        }
    ));
    assert_eq!(active_sessions(&controller), 0);
}

#[test]
fn privilege_above_user_limit_is_refused() {
    let controller = default_controller();
    let err = null_user()
        .auth_type(AuthType::None)
        .privilege_level(PrivilegeLevel::Operator)
        .establish(Loopback::new(controller))
        .expect_err("null user is limited to USER");
    assert_eq!(completion_code(&err), Some(0x86));
}

#[test]
fn unknown_user_is_refused_at_challenge() {
    let err = admin()
        .username("nobody")
        .establish(Loopback::new(default_controller()))
        .expect_err("unknown user");
    assert_eq!(
        completion_code(&err),
        Some(CompletionCode::INVALID_USER.as_u8())
    );
}

#[test]
fn straight_auth_not_offered_to_admin_logins() {
    let err = admin()
        .auth_type(AuthType::Straight)
        .establish(Loopback::new(default_controller()))
        .expect_err("straight is only enabled for the null user");
    assert!(matches!(err, Error::InvalidArgument(_)));
}

#[test]
fn session_capacity_is_enforced_and_freed_by_close() {
    let controller = shared(
        ControllerConfig::builder()
            .max_sessions(2)
            .build()
            .expect("config"),
    );

    let first = admin()
        .establish(Loopback::new(controller.clone()))
        .expect("first");
    let _second = admin()
        .establish(Loopback::new(controller.clone()))
        .expect("second");
    assert_eq!(active_sessions(&controller), 2);

    let err = admin()
        .establish(Loopback::new(controller.clone()))
        .expect_err("table full");
    assert_eq!(completion_code(&err), Some(0xC4));

    first.close_session().expect("close");
    let third = admin()
        .establish(Loopback::new(controller.clone()))
        .expect("slot freed");
    assert_ne!(third.session_id(), first.session_id());
    assert_eq!(active_sessions(&controller), 2);
}

#[test]
fn idle_session_expires() {
    let controller = shared(
        ControllerConfig::builder()
            .session_timeout(Duration::from_secs(5))
            .build()
            .expect("config"),
    );
    let client = admin()
        .establish(Loopback::new(controller.clone()))
        .expect("login");

    controller
        .lock()
        .expect("lock")
        .tick(Duration::from_secs(4));
    client.get_device_id().expect("still alive, timer reset");

    controller
        .lock()
        .expect("lock")
        .tick(Duration::from_secs(5));
    assert_eq!(active_sessions(&controller), 0);
    assert!(matches!(client.get_device_id(), Err(Error::Timeout)));
}

#[test]
fn clones_share_one_session() {
    let controller = default_controller();
    let client = admin()
        .establish(Loopback::new(controller.clone()))
        .expect("login");
    let clone = client.clone();

    for _ in 0..20 {
        client.get_device_id().expect("original");
        clone.get_device_id().expect("clone");
    }
    clone.close_session().expect("close");
    assert!(client.get_device_id().is_err());
}
