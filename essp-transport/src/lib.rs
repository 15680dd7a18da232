//! Transport layer for eSSP
//!
//! The protocol engine only needs to write a frame and to collect whatever
//! bytes the line has delivered so far. Discovery and permission handling
//! belong to the host application.

pub mod error;
pub mod memory;
pub mod serial;

pub use error::{Error, Result};
pub use memory::MemoryTransport;
pub use serial::SerialTransport;

use async_trait::async_trait;

/// Half-duplex byte stream to one peripheral
#[async_trait]
pub trait Transport: Send {
    /// Send raw bytes
    async fn write(&mut self, data: &[u8]) -> Result<()>;

    /// Return the bytes received so far without blocking (possibly none)
    fn read_available(&mut self) -> Result<Vec<u8>>;

    /// Discard any received bytes that have not been read
    fn clear_input(&mut self) -> Result<()> {
        self.read_available().map(drop)
    }

    /// Human readable endpoint, used in logs
    fn description(&self) -> String;
}
