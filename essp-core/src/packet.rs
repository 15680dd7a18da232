//! eSSP frame structure and encoding/decoding

use bytes::{BufMut, Bytes, BytesMut};
use std::fmt;

use crate::{
    checksum,
    constants::{DEVICE_ID_MASK, MAX_PAYLOAD_SIZE, SEQUENCE_BIT, STX},
    error::{Error, Result},
};

/// eSSP frame
///
/// # Frame Structure
///
/// ```text
/// ┌─────────┬─────────┬─────────┬─────────────┬─────────────┐
/// │   STX   │ SEQ/ID  │   LEN   │   Payload   │    CRC16    │
/// │  0x7F   │ 1 byte  │ 1 byte  │  LEN bytes  │ 2 bytes LE  │
/// └─────────┴─────────┴─────────┴─────────────┴─────────────┘
/// ```
///
/// The CRC covers `SEQ/ID..Payload`. On the wire every STX after the first
/// is doubled.
///
/// # Examples
///
/// ```
/// use essp_core::Frame;
///
/// let frame = Frame::new(true, 0, vec![0x11]);
/// let wire = frame.encode().unwrap();
/// assert_eq!(&wire[..], &[0x7F, 0x80, 0x01, 0x11, 0x65, 0x82]);
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct Frame {
    /// Sequence bit (bit 7) and device address (bits 0-6)
    pub seq_id: u8,

    /// Command or response data
    pub payload: Bytes,
}

impl Frame {
    /// STX + SEQ + LEN + CRC
    pub const OVERHEAD: usize = 5;

    /// Create a frame from a sequence bit and device address
    pub fn new(sequence: bool, device_id: u8, payload: impl Into<Bytes>) -> Self {
        Self::with_seq_id(seq_id(sequence, device_id), payload)
    }

    /// Create a frame from a raw SEQ/ID byte
    pub fn with_seq_id(seq_id: u8, payload: impl Into<Bytes>) -> Self {
        Self {
            seq_id,
            payload: payload.into(),
        }
    }

    pub fn sequence_bit(&self) -> bool {
        self.seq_id & SEQUENCE_BIT != 0
    }

    pub fn device_id(&self) -> u8 {
        self.seq_id & DEVICE_ID_MASK
    }

    /// Encode to stuffed wire bytes
    pub fn encode(&self) -> Result<BytesMut> {
        build(self.seq_id, &self.payload)
    }

    /// Decode a de-stuffed frame, verifying its CRC
    pub fn decode(raw: &[u8]) -> Result<Self> {
        let payload = verify_and_extract(raw)?;
        Ok(Self {
            seq_id: raw[1],
            payload,
        })
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("seq_id", &format!("0x{:02X}", self.seq_id))
            .field("payload", &hex::encode(&self.payload))
            .finish()
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Frame(seq={}, id={}, len={})",
            self.sequence_bit() as u8,
            self.device_id(),
            self.payload.len()
        )
    }
}

/// Compose a SEQ/ID byte
pub fn seq_id(sequence: bool, device_id: u8) -> u8 {
    let bit = if sequence { SEQUENCE_BIT } else { 0 };
    bit | (device_id & DEVICE_ID_MASK)
}

/// Double every STX byte
pub fn stuff(data: &[u8]) -> BytesMut {
    let mut out = BytesMut::with_capacity(data.len() + 4);
    for &byte in data {
        out.put_u8(byte);
        if byte == STX {
            out.put_u8(STX);
        }
    }
    out
}

/// Collapse doubled STX bytes
pub fn unstuff(data: &[u8]) -> BytesMut {
    let mut out = BytesMut::with_capacity(data.len());
    let mut iter = data.iter().copied().peekable();
    while let Some(byte) = iter.next() {
        out.put_u8(byte);
        if byte == STX && iter.peek() == Some(&STX) {
            iter.next();
        }
    }
    out
}

/// Build a complete wire frame: STX, then the stuffed `SEQ|LEN|PAYLOAD|CRC`
pub fn build(seq_id: u8, payload: &[u8]) -> Result<BytesMut> {
    if payload.len() > MAX_PAYLOAD_SIZE {
        return Err(Error::PayloadTooLarge {
            size: payload.len(),
            max: MAX_PAYLOAD_SIZE,
        });
    }

    let mut body = BytesMut::with_capacity(payload.len() + 4);
    body.put_u8(seq_id);
    body.put_u8(payload.len() as u8);
    body.put_slice(payload);
    let crc = checksum::to_bytes(&body);
    body.put_slice(&crc);

    let stuffed = stuff(&body);
    let mut frame = BytesMut::with_capacity(stuffed.len() + 1);
    frame.put_u8(STX);
    frame.put_slice(&stuffed);

    Ok(frame)
}

/// Verify a de-stuffed frame and return its payload
///
/// # Errors
///
/// - [`Error::InvalidStart`] if the first byte is not STX
/// - [`Error::FrameTooShort`] if fewer bytes than the length byte announces
/// - [`Error::CrcMismatch`] if the trailing CRC does not match
pub fn verify_and_extract(frame: &[u8]) -> Result<Bytes> {
    match frame.first() {
        Some(&STX) => {}
        Some(&other) => return Err(Error::InvalidStart(other)),
        None => {
            return Err(Error::FrameTooShort {
                expected: Frame::OVERHEAD,
                actual: 0,
            });
        }
    }

    if frame.len() < Frame::OVERHEAD {
        return Err(Error::FrameTooShort {
            expected: Frame::OVERHEAD,
            actual: frame.len(),
        });
    }

    let len = frame[2] as usize;
    let expected = len + Frame::OVERHEAD;
    if frame.len() < expected {
        return Err(Error::FrameTooShort {
            expected,
            actual: frame.len(),
        });
    }

    let body = &frame[1..3 + len];
    let received = u16::from_le_bytes([frame[3 + len], frame[4 + len]]);
    let calculated = checksum::calculate(body);
    if calculated != received {
        return Err(Error::CrcMismatch {
            expected: calculated,
            received,
        });
    }

    Ok(Bytes::copy_from_slice(&frame[3..3 + len]))
}
