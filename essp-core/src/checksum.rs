//! eSSP CRC16
//!
//! 1. Start the register at 0xFFFF
//! 2. XOR each input byte into the high byte of the register
//! 3. Shift left 8 times, XOR-ing polynomial 0x8005 whenever the top bit was set
//! 4. Transmit the result low byte first

use tracing::trace;

use crate::constants::{CRC_POLY, CRC_SEED};

/// Calculate the CRC16 of `data`
///
/// # Examples
///
/// ```
/// use essp_core::checksum;
///
/// // SEQ=0x80, LEN=1, SYNC
/// assert_eq!(checksum::calculate(&[0x80, 0x01, 0x11]), 0x8265);
/// ```
pub fn calculate(data: &[u8]) -> u16 {
    let mut crc = CRC_SEED;

    for &byte in data {
        crc ^= (byte as u16) << 8;
        for _ in 0..8 {
            crc = if crc & 0x8000 != 0 {
                (crc << 1) ^ CRC_POLY
            } else {
                crc << 1
            };
        }
    }

    trace!(
        len = data.len(),
        crc = format!("0x{:04X}", crc),
        "Calculated CRC16"
    );

    crc
}

/// CRC16 serialized as it appears on the wire (little-endian)
pub fn to_bytes(data: &[u8]) -> [u8; 2] {
    calculate(data).to_le_bytes()
}

/// Verify `data` against a CRC read from the wire
pub fn verify(data: &[u8], received: [u8; 2]) -> bool {
    calculate(data) == u16::from_le_bytes(received)
}
