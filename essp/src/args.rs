//! Command argument encoding
//!
//! Each command has its own argument layout. Multi-byte values are sent
//! little-endian.

use bitflags::bitflags;
use bytes::{BufMut, Bytes, BytesMut};

use essp_core::Command;

use crate::error::{Error, Result};

bitflags! {
    /// Channel inhibit mask (bit set = channel accepts notes)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ChannelMask: u16 {
        const CHANNEL_1 = 1 << 0;
        const CHANNEL_2 = 1 << 1;
        const CHANNEL_3 = 1 << 2;
        const CHANNEL_4 = 1 << 3;
        const CHANNEL_5 = 1 << 4;
        const CHANNEL_6 = 1 << 5;
        const CHANNEL_7 = 1 << 6;
        const CHANNEL_8 = 1 << 7;
        const CHANNEL_9 = 1 << 8;
        const CHANNEL_10 = 1 << 9;
        const CHANNEL_11 = 1 << 10;
        const CHANNEL_12 = 1 << 11;
        const CHANNEL_13 = 1 << 12;
        const CHANNEL_14 = 1 << 13;
        const CHANNEL_15 = 1 << 14;
        const CHANNEL_16 = 1 << 15;
    }
}

impl ChannelMask {
    /// Mask from per-channel flags, channel 1 first
    pub fn from_channels(channels: &[bool]) -> Self {
        channels
            .iter()
            .take(16)
            .enumerate()
            .filter(|(_, enabled)| **enabled)
            .fold(Self::empty(), |mask, (i, _)| {
                mask | Self::from_bits_retain(1 << i)
            })
    }

    /// Channels `1..=count` enabled
    pub fn first(count: u8) -> Self {
        match count {
            0 => Self::empty(),
            16.. => Self::all(),
            n => Self::from_bits_retain((1u16 << n) - 1),
        }
    }

    /// Check a single 1-based channel
    pub fn is_enabled(self, channel: u8) -> bool {
        (1..=16).contains(&channel) && self.bits() & (1 << (channel - 1)) != 0
    }
}

/// Arguments for one command
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CommandArgs {
    /// No arguments
    #[default]
    None,

    /// Protocol version byte (HOST_PROTOCOL_VERSION)
    Version(u8),

    /// 64-bit key value (SET_GENERATOR, SET_MODULUS, REQUEST_KEY_EXCHANGE)
    Key(u64),

    /// Channel inhibit mask (SET_CHANNEL_INHIBITS)
    Channels(ChannelMask),

    /// Pre-encoded arguments, sent as-is
    Raw(Bytes),
}

impl CommandArgs {
    /// Encode for `command`, rejecting a shape the command does not take
    pub fn encode(&self, command: Command) -> Result<BytesMut> {
        let mut buf = BytesMut::with_capacity(8);

        match (command, self) {
            (_, Self::Raw(bytes)) => buf.put_slice(bytes),
            (Command::HostProtocolVersion, Self::Version(version)) => buf.put_u8(*version),
            (
                Command::SetGenerator | Command::SetModulus | Command::RequestKeyExchange,
                Self::Key(value),
            ) => buf.put_u64_le(*value),
            (Command::SetChannelInhibits, Self::Channels(mask)) => buf.put_u16_le(mask.bits()),
            (
                Command::HostProtocolVersion
                | Command::SetGenerator
                | Command::SetModulus
                | Command::RequestKeyExchange
                | Command::SetChannelInhibits,
                Self::None,
            ) => {
                return Err(Error::InvalidArguments {
                    command: command.name(),
                    reason: "missing argument".into(),
                });
            }
            (_, Self::None) => {}
            (_, other) => {
                return Err(Error::InvalidArguments {
                    command: command.name(),
                    reason: format!("unexpected {:?}", other),
                });
            }
        }

        Ok(buf)
    }
}
