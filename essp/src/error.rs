//! High-level error types

use std::fmt;

pub type Result<T> = std::result::Result<T, Error>;

/// Step of the initialization sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitStep {
    Sync,
    HostProtocolVersion,
    KeyExchange,
    GetSerialNumber,
    ResetCounters,
    Enable,
    SetupRequest,
    SetChannelInhibits,
}

impl fmt::Display for InitStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Sync => "SYNC",
            Self::HostProtocolVersion => "HOST_PROTOCOL_VERSION",
            Self::KeyExchange => "KEY_EXCHANGE",
            Self::GetSerialNumber => "GET_SERIAL_NUMBER",
            Self::ResetCounters => "RESET_COUNTERS",
            Self::Enable => "ENABLE",
            Self::SetupRequest => "SETUP_REQUEST",
            Self::SetChannelInhibits => "SET_CHANNEL_INHIBITS",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Core protocol error: {0}")]
    Core(#[from] essp_core::Error),

    #[error("Transport error: {0}")]
    Transport(#[from] essp_transport::Error),

    #[error("Timeout waiting for {command} response after {millis}ms")]
    Timeout {
        command: &'static str,
        millis: u128,
    },

    #[error("Another command is in flight")]
    Busy,

    #[error("Invalid arguments for {command}: {reason}")]
    InvalidArguments {
        command: &'static str,
        reason: String,
    },

    #[error("{command} failed with status {name} (0x{status:02X})")]
    CommandFailed {
        command: &'static str,
        status: u8,
        name: &'static str,
    },

    #[error("Initialization failed at {step}: {source}")]
    Init {
        step: InitStep,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Check if error is recoverable (reissuing the command might succeed)
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::Busy | Self::CommandFailed { .. } => true,
            Self::Core(e) => e.is_framing(),
            Self::Init { source, .. } => source.is_recoverable(),
            _ => false,
        }
    }

    /// Check if the key exchange must run again before encrypted commands
    pub fn requires_handshake(&self) -> bool {
        match self {
            Self::Core(e) => e.requires_handshake(),
            Self::Init { source, .. } => source.requires_handshake(),
            _ => false,
        }
    }

    /// Initialization step that failed, if any
    pub fn init_step(&self) -> Option<InitStep> {
        match self {
            Self::Init { step, .. } => Some(*step),
            _ => None,
        }
    }
}
