use std::time::Duration;

use ipmi_bmc::{Client, PrivilegeLevel};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Example:
    //   cargo run --example sdr_dump -- 127.0.0.1:6230 ipmiusr test
    let mut args = std::env::args().skip(1);
    let target = args.next().ok_or("missing <host:port>")?.parse()?;
    let username = args.next().unwrap_or_default();
    let password = args.next().unwrap_or_default();

    let client = Client::builder()
        .username(username)
        .password(password)
        .privilege_level(PrivilegeLevel::User)
        .timeout(Duration::from_secs(2))
        .retries(3)
        .connect(target)?;

    let info = client.sdr_repository_info()?;
    println!("SDR records: {} (free {} bytes)", info.record_count, info.free_space);

    for record in client.read_sdr_repository()? {
        let id = u16::from_le_bytes([record[0], record[1]]);
        if record.len() > 48 && record[3] == 0x01 {
            let name = String::from_utf8_lossy(&record[48..]);
            let reading = client.get_sensor_reading(record[7])?;
            println!("{id:#06x} sensor {:>3} {name:<16} value {:#04x}", record[7], reading.value);
        } else {
            println!("{id:#06x} type {:#04x} ({} bytes)", record[3], record.len());
        }
    }

    client.close_session()?;
    Ok(())
}
