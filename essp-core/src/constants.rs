//! Protocol constants

/// Frame start marker
pub const STX: u8 = 0x7F;

/// Encrypted payload marker
pub const STEX: u8 = 0x7E;

/// CRC16 seed
pub const CRC_SEED: u16 = 0xFFFF;

/// CRC16 polynomial
pub const CRC_POLY: u16 = 0x8005;

/// Sequence bit inside the SEQ/ID byte
pub const SEQUENCE_BIT: u8 = 0x80;

/// Device address mask inside the SEQ/ID byte
pub const DEVICE_ID_MASK: u8 = 0x7F;

/// Highest usable address; 0x7F with the sequence bit clear would read as STX
pub const MAX_DEVICE_ID: u8 = 0x7D;

/// Default device address (validators answer on 0)
pub const DEFAULT_DEVICE_ID: u8 = 0x00;

/// Largest payload the length byte can describe
pub const MAX_PAYLOAD_SIZE: usize = 255;

/// Serial line speed
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Default command timeout (milliseconds)
pub const DEFAULT_TIMEOUT_MS: u64 = 3000;

/// Interval between reads while waiting for a response (milliseconds)
pub const READ_POLL_INTERVAL_MS: u64 = 10;

/// Interval between background POLL commands (milliseconds)
pub const POLL_PERIOD_MS: u64 = 200;

/// Protocol version requested during initialization
pub const DEFAULT_PROTOCOL_VERSION: u8 = 6;

/// Status byte of a successful response
pub const STATUS_OK: u8 = 0xF0;

/// Encryption constants
pub mod crypto {
    /// AES block size
    pub const BLOCK_SIZE: usize = 16;

    /// Fixed half of the session key (`0123456701234567`)
    pub const FIXED_KEY: [u8; 8] = [0x01, 0x23, 0x45, 0x67, 0x01, 0x23, 0x45, 0x67];

    /// Bit size of the generator and modulus primes
    pub const PRIME_BITS: u32 = 32;

    /// Exclusive upper bound of the host secret exponent
    pub const HOST_SECRET_BOUND: u64 = 1 << 31;

    /// Length byte + counter
    pub const BLOCK_HEADER_SIZE: usize = 5;
}
