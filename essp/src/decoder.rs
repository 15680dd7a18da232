//! Response decoding
//!
//! A response payload is a status byte followed by command-specific data.
//! Non-OK statuses are reported in the result, not raised.

use std::fmt;

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use bytes::Bytes;
use tracing::{debug, trace};

use essp_core::{Command, Error as CoreError, Result as CoreResult, constants::STATUS_OK};
use essp_types::{
    EventDetail, EventKind, EventLayout, FraudValue, PollEvent, PollReport, RejectReason,
    SetupInfo, StatusCode, UnitType,
};

use crate::error::{Error, Result};

/// Size of one value/country fraud record
const FRAUD_RECORD_SIZE: usize = 7;

/// Protocol version from which fraud attempts carry value records
const FRAUD_VALUES_MIN_PROTOCOL: u8 = 6;

/// Response status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    Fail { code: u8, name: &'static str },
}

impl Status {
    pub fn from_code(code: u8) -> Self {
        if code == STATUS_OK {
            Self::Ok
        } else {
            Self::Fail {
                code,
                name: StatusCode::describe(code),
            }
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }

    pub fn code(&self) -> u8 {
        match self {
            Self::Ok => STATUS_OK,
            Self::Fail { code, .. } => *code,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "OK"),
            Self::Fail { code, name } => write!(f, "{}(0x{:02X})", name, code),
        }
    }
}

/// Command-specific response data
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseInfo {
    /// Nothing beyond the status byte
    Empty,
    SerialNumber(u32),
    /// Peripheral's intermediate key
    KeyExchange(u64),
    Setup(SetupInfo),
    Poll(PollReport),
    LastReject(RejectReason),
    /// Undecoded bytes after the status
    Raw(Bytes),
}

/// Outcome of one command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    pub command: Command,
    pub status: Status,
    pub info: ResponseInfo,
}

impl CommandResult {
    pub fn is_ok(&self) -> bool {
        self.status.is_ok()
    }

    /// Turn a non-OK status into [`Error::CommandFailed`]
    pub fn into_result(self) -> Result<Self> {
        match self.status {
            Status::Ok => Ok(self),
            Status::Fail { code, name } => Err(Error::CommandFailed {
                command: self.command.name(),
                status: code,
                name,
            }),
        }
    }

    /// Poll events, empty for other responses
    pub fn events(&self) -> &[PollEvent] {
        match &self.info {
            ResponseInfo::Poll(report) => &report.events,
            _ => &[],
        }
    }
}

/// Peripheral facts that change how payloads are laid out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeContext {
    pub protocol_version: u8,
    pub unit_type: Option<UnitType>,
}

impl DecodeContext {
    pub fn new(protocol_version: u8) -> Self {
        Self {
            protocol_version,
            unit_type: None,
        }
    }

    /// Check if FRAUD_ATTEMPT carries value/country records
    pub fn fraud_values_supported(&self) -> bool {
        self.protocol_version >= FRAUD_VALUES_MIN_PROTOCOL
            && self.unit_type.is_some_and(UnitType::is_payout_capable)
    }
}

impl Default for DecodeContext {
    fn default() -> Self {
        Self::new(essp_core::constants::DEFAULT_PROTOCOL_VERSION)
    }
}

/// Stateful response decoder
///
/// SETUP_REQUEST responses update the context used for later POLL decoding.
#[derive(Debug, Clone, Default)]
pub struct ResponseDecoder {
    context: DecodeContext,
}

impl ResponseDecoder {
    pub fn new(protocol_version: u8) -> Self {
        Self {
            context: DecodeContext::new(protocol_version),
        }
    }

    pub fn context(&self) -> DecodeContext {
        self.context
    }

    pub fn set_protocol_version(&mut self, version: u8) {
        self.context.protocol_version = version;
    }

    pub fn set_unit_type(&mut self, unit_type: Option<UnitType>) {
        self.context.unit_type = unit_type;
    }

    /// Decode a plaintext response payload for `command`
    pub fn decode(&mut self, command: Command, payload: &[u8]) -> CoreResult<CommandResult> {
        let (&status_code, data) = payload
            .split_first()
            .ok_or_else(|| CoreError::MalformedResponse(format!("{}: empty payload", command)))?;

        let status = Status::from_code(status_code);
        if !status.is_ok() {
            debug!(command = command.name(), %status, "Command returned failure status");
            return Ok(CommandResult {
                command,
                status,
                info: ResponseInfo::Empty,
            });
        }

        let info = match command {
            Command::GetSerialNumber => {
                ensure_len(command, data, 4)?;
                ResponseInfo::SerialNumber(BigEndian::read_u32(data))
            }
            Command::RequestKeyExchange => {
                ensure_len(command, data, 8)?;
                ResponseInfo::KeyExchange(LittleEndian::read_u64(data))
            }
            Command::SetupRequest => {
                let setup = decode_setup(data)?;
                self.context.protocol_version = setup.protocol_version;
                self.context.unit_type = setup.unit_type;
                ResponseInfo::Setup(setup)
            }
            Command::Poll => ResponseInfo::Poll(PollReport::new(self.decode_poll(data)?)),
            Command::LastRejectCode => {
                ensure_len(command, data, 1)?;
                ResponseInfo::LastReject(RejectReason::from_code(data[0]))
            }
            _ if data.is_empty() => ResponseInfo::Empty,
            _ => ResponseInfo::Raw(Bytes::copy_from_slice(data)),
        };

        Ok(CommandResult {
            command,
            status,
            info,
        })
    }

    /// Walk a POLL event stream (bytes after the status)
    pub fn decode_poll(&self, data: &[u8]) -> CoreResult<Vec<PollEvent>> {
        let mut events = Vec::new();
        let mut cursor = 0;

        while cursor < data.len() {
            let code = data[cursor];
            cursor += 1;

            let kind = EventKind::try_from(code).ok();
            let detail = match EventLayout::of(kind) {
                EventLayout::Bare => EventDetail::None,
                EventLayout::Channel => EventDetail::Channel(take_byte(data, &mut cursor, code)?),
                EventLayout::FraudRecords if self.context.fraud_values_supported() => {
                    let count = take_byte(data, &mut cursor, code)? as usize;
                    let needed = count * FRAUD_RECORD_SIZE;
                    let records = data.get(cursor..cursor + needed).ok_or_else(|| {
                        truncated(code, needed, data.len().saturating_sub(cursor))
                    })?;
                    cursor += needed;

                    let values = records
                        .chunks_exact(FRAUD_RECORD_SIZE)
                        .map(|record| FraudValue {
                            value: LittleEndian::read_u32(&record[..4]),
                            country_code: String::from_utf8_lossy(&record[4..]).into_owned(),
                        })
                        .collect();
                    EventDetail::FraudValues(values)
                }
                EventLayout::FraudRecords => {
                    EventDetail::Channel(take_byte(data, &mut cursor, code)?)
                }
            };

            let event = PollEvent::new(code, detail);
            trace!("Poll event: {}", event);
            events.push(event);
        }

        Ok(events)
    }
}

fn decode_setup(data: &[u8]) -> CoreResult<SetupInfo> {
    ensure_len(Command::SetupRequest, data, 9)?;
    Ok(SetupInfo::new(
        data[0],
        String::from_utf8_lossy(&data[1..5]).into_owned(),
        String::from_utf8_lossy(&data[5..8]).into_owned(),
        data[8],
    ))
}

fn ensure_len(command: Command, data: &[u8], needed: usize) -> CoreResult<()> {
    if data.len() < needed {
        return Err(CoreError::MalformedResponse(format!(
            "{}: expected {} data bytes, got {}",
            command,
            needed,
            data.len()
        )));
    }
    Ok(())
}

fn take_byte(data: &[u8], cursor: &mut usize, code: u8) -> CoreResult<u8> {
    let byte = *data
        .get(*cursor)
        .ok_or_else(|| truncated(code, 1, 0))?;
    *cursor += 1;
    Ok(byte)
}

fn truncated(code: u8, needed: usize, available: usize) -> CoreError {
    CoreError::MalformedResponse(format!(
        "event {} truncated: needs {} bytes, {} left",
        StatusCode::describe(code),
        needed,
        available
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_decode_ok_empty() {
        let mut decoder = ResponseDecoder::default();
        let result = decoder.decode(Command::Sync, &[0xF0]).unwrap();
        assert!(result.is_ok());
        assert_eq!(result.info, ResponseInfo::Empty);
    }

    #[test]
    fn test_decode_failure_status() {
        let mut decoder = ResponseDecoder::default();
        let result = decoder.decode(Command::Enable, &[0xF5]).unwrap();
        assert_eq!(
            result.status,
            Status::Fail {
                code: 0xF5,
                name: "COMMAND_CANNOT_BE_PROCESSED"
            }
        );
        assert!(matches!(
            result.into_result(),
            Err(Error::CommandFailed { command: "ENABLE", status: 0xF5, .. })
        ));

        let unknown = decoder.decode(Command::Enable, &[0x01]).unwrap();
        assert_eq!(unknown.status, Status::Fail { code: 0x01, name: "UNDEFINED" });
    }

    #[test]
    fn test_decode_empty_payload() {
        let mut decoder = ResponseDecoder::default();
        assert!(matches!(
            decoder.decode(Command::Sync, &[]),
            Err(CoreError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_decode_serial_number() {
        let mut decoder = ResponseDecoder::default();
        let result = decoder
            .decode(Command::GetSerialNumber, &[0xF0, 0x00, 0x01, 0xE2, 0x40])
            .unwrap();
        assert_eq!(result.info, ResponseInfo::SerialNumber(123_456));

        assert!(decoder.decode(Command::GetSerialNumber, &[0xF0, 0x01]).is_err());
    }

    #[test]
    fn test_decode_key_exchange() {
        let mut decoder = ResponseDecoder::default();
        let mut payload = vec![0xF0];
        payload.extend_from_slice(&0x1122_3344_5566_7788u64.to_le_bytes());

        let result = decoder.decode(Command::RequestKeyExchange, &payload).unwrap();
        assert_eq!(result.info, ResponseInfo::KeyExchange(0x1122_3344_5566_7788));
    }

    #[test]
    fn test_decode_setup_updates_context() {
        let mut decoder = ResponseDecoder::new(4);
        let payload = [0xF0, 6, b'0', b'1', b'2', b'3', b'E', b'U', b'R', 7];

        let result = decoder.decode(Command::SetupRequest, &payload).unwrap();
        let ResponseInfo::Setup(setup) = result.info else {
            panic!("expected setup info");
        };
        assert_eq!(setup.unit_type, Some(UnitType::SmartPayout));
        assert_eq!(setup.firmware_version, "0123");
        assert_eq!(setup.country_code, "EUR");
        assert_eq!(setup.protocol_version, 7);

        assert_eq!(decoder.context().protocol_version, 7);
        assert!(decoder.context().fraud_values_supported());
    }

    #[test]
    fn test_decode_last_reject() {
        let mut decoder = ResponseDecoder::default();
        let result = decoder.decode(Command::LastRejectCode, &[0xF0, 0x00]).unwrap();
        let ResponseInfo::LastReject(reason) = result.info else {
            panic!("expected reject reason");
        };
        assert_eq!(reason.code, 0);
        assert!(reason.is_accepted());
    }

    #[test]
    fn test_decode_raw() {
        let mut decoder = ResponseDecoder::default();
        let result = decoder.decode(Command::GetFirmwareVersion, &[0xF0, b'1', b'2']).unwrap();
        assert_eq!(result.info, ResponseInfo::Raw(Bytes::from_static(b"12")));
    }

    #[test]
    fn test_decode_poll_events() {
        let mut decoder = ResponseDecoder::default();
        // READ_NOTE(0), CREDIT_NOTE(2), DISABLED, unknown 0x10
        let payload = [0xF0, 0xEF, 0x00, 0xEE, 0x02, 0xE8, 0x10];

        let result = decoder.decode(Command::Poll, &payload).unwrap();
        let events = result.events();
        assert_eq!(events.len(), 4);
        assert_eq!(events[0].kind, Some(EventKind::ReadNote));
        assert_eq!(events[0].channel(), Some(0));
        assert_eq!(events[1].kind, Some(EventKind::CreditNote));
        assert_eq!(events[1].channel(), Some(2));
        assert_eq!(events[2].kind, Some(EventKind::Disabled));
        assert_eq!(events[2].detail, EventDetail::None);
        assert_eq!(events[3].kind, None);
        assert_eq!(events[3].code, 0x10);
    }

    #[test]
    fn test_decode_poll_fraud_values() {
        let mut decoder = ResponseDecoder::new(6);
        decoder.set_unit_type(Some(UnitType::SmartHopper));

        let mut data = vec![0xE6, 2];
        data.extend_from_slice(&100u32.to_le_bytes());
        data.extend_from_slice(b"EUR");
        data.extend_from_slice(&250u32.to_le_bytes());
        data.extend_from_slice(b"GBP");
        data.push(0xE8);

        let events = decoder.decode_poll(&data).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(
            events[0].detail,
            EventDetail::FraudValues(vec![
                FraudValue {
                    value: 100,
                    country_code: "EUR".into()
                },
                FraudValue {
                    value: 250,
                    country_code: "GBP".into()
                },
            ])
        );
        assert_eq!(events[1].kind, Some(EventKind::Disabled));
    }

    #[test]
    fn test_decode_poll_fraud_channel_on_validator() {
        let mut decoder = ResponseDecoder::new(6);
        decoder.set_unit_type(Some(UnitType::BanknoteValidator));

        let events = decoder.decode_poll(&[0xE6, 0x03, 0xE8]).unwrap();
        assert_eq!(events[0].detail, EventDetail::Channel(3));
        assert_eq!(events[1].kind, Some(EventKind::Disabled));

        let mut old = ResponseDecoder::new(5);
        old.set_unit_type(Some(UnitType::SmartHopper));
        let events = old.decode_poll(&[0xE6, 0x03]).unwrap();
        assert_eq!(events[0].detail, EventDetail::Channel(3));
    }

    #[test]
    fn test_decode_poll_truncated() {
        let decoder = ResponseDecoder::default();
        assert!(matches!(
            decoder.decode_poll(&[0xEE]),
            Err(CoreError::MalformedResponse(_))
        ));

        let mut hopper = ResponseDecoder::new(6);
        hopper.set_unit_type(Some(UnitType::SmartHopper));
        assert!(matches!(
            hopper.decode_poll(&[0xE6, 1, 0x64, 0x00]),
            Err(CoreError::MalformedResponse(_))
        ));
    }
}
