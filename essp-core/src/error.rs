//! Error types for essp-core

/// Result type alias for essp-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core protocol errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Frame does not begin with STX
    #[error("Invalid frame start: expected 0x7F, got 0x{0:02X}")]
    InvalidStart(u8),

    /// Frame is shorter than its header claims
    #[error("Frame too short: expected at least {expected} bytes, got {actual} bytes")]
    FrameTooShort {
        expected: usize,
        actual: usize,
    },

    /// CRC16 verification failed (outer frame or encrypted block)
    #[error("CRC mismatch: expected 0x{expected:04X}, received 0x{received:04X}")]
    CrcMismatch {
        expected: u16,
        received: u16,
    },

    /// Payload does not fit the single length byte
    #[error("Payload too large: {size} bytes (max: {max} bytes)")]
    PayloadTooLarge {
        size: usize,
        max: usize,
    },

    /// Command name not in the catalog
    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    /// Command needs an encryption session that has not been negotiated
    #[error("Command {0} requires encryption - run the key exchange first")]
    EncryptionRequired(String),

    /// No encryption session (never negotiated or invalidated)
    #[error("No encryption session established")]
    NoSession,

    /// Encrypted response carried an unexpected counter
    #[error("Replay counter mismatch: expected {expected}, got {actual}")]
    ReplayCounterMismatch {
        expected: u32,
        actual: u32,
    },

    /// Payload does not match the expected layout
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

impl Error {
    /// Check if the encryption session must be renegotiated
    pub fn requires_handshake(&self) -> bool {
        matches!(
            self,
            Self::ReplayCounterMismatch { .. }
                | Self::EncryptionRequired(_)
                | Self::NoSession
        )
    }

    /// Check if the error came from a corrupted or unexpected frame
    pub fn is_framing(&self) -> bool {
        matches!(
            self,
            Self::InvalidStart(_) | Self::FrameTooShort { .. } | Self::CrcMismatch { .. }
        )
    }
}
