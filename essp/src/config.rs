//! Device configuration

use std::time::Duration;

use essp_core::constants::{
    self, DEFAULT_DEVICE_ID, DEFAULT_PROTOCOL_VERSION, DEFAULT_TIMEOUT_MS, MAX_DEVICE_ID,
    POLL_PERIOD_MS, READ_POLL_INTERVAL_MS,
};

use crate::args::ChannelMask;

/// Settings shared by the dispatcher and the device handle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceConfig {
    /// Peripheral address (0..=0x7D)
    pub device_id: u8,

    /// Default response timeout
    pub timeout: Duration,

    /// How often the transport is polled while waiting for a response
    pub read_interval: Duration,

    /// Background POLL period
    pub poll_period: Duration,

    /// Protocol version requested during initialization
    pub protocol_version: u8,

    /// Run the key exchange during initialization
    pub encryption: bool,

    /// Wrap every command once a session exists
    pub encrypt_all: bool,

    /// Fixed half of the session key
    pub fixed_key: [u8; 8],

    /// Channels enabled during initialization
    pub channels: ChannelMask,

    /// Capacity of the event broadcast channel
    pub event_capacity: usize,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            device_id: DEFAULT_DEVICE_ID,
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            read_interval: Duration::from_millis(READ_POLL_INTERVAL_MS),
            poll_period: Duration::from_millis(POLL_PERIOD_MS),
            protocol_version: DEFAULT_PROTOCOL_VERSION,
            encryption: true,
            encrypt_all: false,
            fixed_key: constants::crypto::FIXED_KEY,
            channels: ChannelMask::first(7),
            event_capacity: 64,
        }
    }
}

impl DeviceConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set peripheral address, clamped to [`MAX_DEVICE_ID`]
    pub fn with_device_id(mut self, device_id: u8) -> Self {
        self.device_id = device_id.min(MAX_DEVICE_ID);
        self
    }

    /// Set default response timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_read_interval(mut self, interval: Duration) -> Self {
        self.read_interval = interval;
        self
    }

    /// Set background POLL period
    pub fn with_poll_period(mut self, period: Duration) -> Self {
        self.poll_period = period;
        self
    }

    pub fn with_protocol_version(mut self, version: u8) -> Self {
        self.protocol_version = version;
        self
    }

    /// Enable or skip the key exchange during initialization
    pub fn with_encryption(mut self, enabled: bool) -> Self {
        self.encryption = enabled;
        self
    }

    /// Wrap every command, not only the ones that require it
    pub fn with_encrypt_all(mut self, enabled: bool) -> Self {
        self.encrypt_all = enabled;
        self
    }

    pub fn with_fixed_key(mut self, fixed_key: [u8; 8]) -> Self {
        self.fixed_key = fixed_key;
        self
    }

    /// Set channels enabled during initialization
    pub fn with_channels(mut self, channels: ChannelMask) -> Self {
        self.channels = channels;
        self
    }

    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity.max(1);
        self
    }
}
