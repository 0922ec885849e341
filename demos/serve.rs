use std::net::SocketAddr;

use ipmi_bmc::server::{IPMI_PORT, tokio::Server};
use ipmi_bmc::{Controller, ControllerConfig, inventory};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Example:
    //   RUST_LOG=ipmi_bmc=debug cargo run --example serve -- 0.0.0.0:6230
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let addr: SocketAddr = match std::env::args().nth(1) {
        Some(addr) => addr.parse()?,
        None => SocketAddr::from(([0, 0, 0, 0], IPMI_PORT)),
    };

    let mut controller = Controller::new(ControllerConfig::builder().build()?);
    inventory::seed_simulated(&mut controller)?;

    let server = Server::bind(addr, controller.into_shared()).await?;
    println!("serving IPMI on {}", server.local_addr()?);

    server
        .run_until(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;
    Ok(())
}
