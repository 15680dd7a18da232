//! Initialize a validator and print credits as they arrive
//!
//! ```text
//! ESSP_PORT=/dev/ttyUSB0 RUST_LOG=essp=debug cargo run --example poll_validator
//! ```

use std::time::Duration;

use anyhow::Context;
use essp::{Device, DeviceConfig, EventKind};
use essp_transport::SerialTransport;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let path = std::env::var("ESSP_PORT").unwrap_or_else(|_| "/dev/ttyUSB0".to_string());

    let mut port = SerialTransport::new(&path);
    port.open().with_context(|| format!("opening {}", path))?;

    let config = DeviceConfig::default().with_poll_period(Duration::from_millis(200));
    let mut device = Device::new(port, config);

    let report = device.initialize().await.context("initializing validator")?;
    println!("Serial {}: {}", report.serial_number, report.setup);

    let mut credits = device.on_event(EventKind::CreditNote);
    let mut rejects = device.on_event(EventKind::NoteRejected);
    device.start_polling();

    println!("Waiting for notes, Ctrl-C to stop");
    loop {
        tokio::select! {
            Some(event) = credits.recv() => println!("Credit on channel {:?}", event.channel()),
            Some(_) = rejects.recv() => {
                match device.execute("LAST_REJECT_CODE", essp::CommandArgs::None).await {
                    Ok(result) => println!("Rejected: {:?}", result.info),
                    Err(e) => println!("Rejected (reason unavailable: {})", e),
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    device.close().await?;
    Ok(())
}
