#![cfg(all(feature = "blocking", feature = "async"))]

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use ipmi_bmc::server::{blocking, tokio as async_server};
use ipmi_bmc::{Client, Controller, ControllerConfig, PrivilegeLevel, SharedController, inventory};

fn seeded() -> SharedController {
    let mut controller = Controller::new(ControllerConfig::builder().build().expect("config"));
    inventory::seed_simulated(&mut controller).expect("seed");
    controller.into_shared()
}

fn localhost() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 0))
}

fn login_and_walk(target: SocketAddr) -> usize {
    let client = Client::builder()
        .username("ipmiusr")
        .password("test")
        .privilege_level(PrivilegeLevel::Operator)
        .timeout(Duration::from_millis(500))
        .retries(3)
        .connect(target)
        .expect("login over udp");
    let records = client.read_sdr_repository().expect("walk").len();
    assert_eq!(client.get_sensor_reading(2).expect("reading").value, 0);
    client.close_session().expect("close");
    records
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn tokio_server_answers_a_udp_client() {
    let controller = seeded();
    let server = async_server::Server::bind(localhost(), controller.clone())
        .await
        .expect("bind");
    let target = server.local_addr().expect("addr");

    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let serving = tokio::spawn(async move {
        server
            .run_until(async {
                let _ = stop_rx.await;
            })
            .await
    });

    let records = tokio::task::spawn_blocking(move || login_and_walk(target))
        .await
        .expect("client task");
    assert_eq!(records, 4);
    assert_eq!(controller.lock().expect("lock").active_sessions(), 0);

    let _ = stop_tx.send(());
    serving.await.expect("join").expect("server result");
}

#[test]
fn blocking_server_answers_a_udp_client() {
    let controller = seeded();
    let server = blocking::Server::bind(localhost(), controller.clone()).expect("bind");
    let target = server.local_addr().expect("addr");

    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = shutdown.clone();
    let serving = std::thread::spawn(move || server.run(&flag));

    assert_eq!(login_and_walk(target), 4);

    shutdown.store(true, Ordering::Relaxed);
    serving.join().expect("join").expect("server result");
    assert_eq!(controller.lock().expect("lock").active_sessions(), 0);
}
