//! # essp
//!
//! Host-side engine for the eSSP serial protocol spoken by banknote
//! validators and coin hoppers.
//!
//! ## Features
//!
//! - Byte-stuffed, CRC-checked framing over any byte stream
//! - Key exchange and AES-128 session encryption with replay protection
//! - Async/await API using Tokio
//! - Typed POLL event decoding and subscription
//!
//! ## Quick Start
//!
//! ```no_run
//! use essp::{CommandArgs, Device, DeviceConfig};
//! use essp_transport::SerialTransport;
//!
//! #[tokio::main]
//! async fn main() -> essp::Result<()> {
//!     let mut port = SerialTransport::new("/dev/ttyUSB0");
//!     port.open()?;
//!
//!     let device = Device::new(port, DeviceConfig::default());
//!     device.initialize().await?;
//!
//!     let result = device.execute("LAST_REJECT_CODE", CommandArgs::None).await?;
//!     println!("{:?}", result.info);
//!
//!     Ok(())
//! }
//! ```

pub mod args;
pub mod config;
pub mod decoder;
pub mod device;
pub mod dispatcher;
pub mod error;
pub mod events;

#[cfg(test)]
pub(crate) mod sim;

// Re-exports
pub use args::{ChannelMask, CommandArgs};
pub use config::DeviceConfig;
pub use decoder::{CommandResult, DecodeContext, ResponseDecoder, ResponseInfo, Status};
pub use device::{Device, InitReport};
pub use dispatcher::{DispatchState, Dispatcher};
pub use error::{Error, InitStep, Result};
pub use events::EventStream;

// Re-export types
pub use essp_core::{Command, CryptoSession};
pub use essp_types::{EventDetail, EventKind, PollEvent, PollReport, RejectReason, SetupInfo};
