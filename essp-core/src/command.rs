//! eSSP command catalog

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Static description of a command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommandSpec {
    pub name: &'static str,
    pub opcode: u8,
    pub requires_encryption: bool,
}

macro_rules! commands {
    ($($variant:ident = $code:literal, $name:literal, $encrypted:literal;)+) => {
        /// Protocol commands (host to peripheral)
        #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
        #[repr(u8)]
        pub enum Command {
            $($variant = $code,)+
        }

        impl Command {
            /// Every command in the catalog
            pub const ALL: &'static [Command] = &[$(Self::$variant,)+];

            /// Get command name
            pub fn name(self) -> &'static str {
                match self {
                    $(Self::$variant => $name,)+
                }
            }

            /// Check if the peripheral only accepts this command encrypted
            pub fn requires_encryption(self) -> bool {
                match self {
                    $(Self::$variant => $encrypted,)+
                }
            }
        }

        impl TryFrom<u8> for Command {
            type Error = Error;

            fn try_from(value: u8) -> Result<Self> {
                match value {
                    $($code => Ok(Self::$variant),)+
                    _ => Err(Error::UnknownCommand(format!("0x{:02X}", value))),
                }
            }
        }
    };
}

commands! {
    Reset = 1, "RESET", false;
    SetChannelInhibits = 2, "SET_CHANNEL_INHIBITS", false;
    DisplayOn = 3, "DISPLAY_ON", false;
    DisplayOff = 4, "DISPLAY_OFF", false;
    SetupRequest = 5, "SETUP_REQUEST", false;
    HostProtocolVersion = 6, "HOST_PROTOCOL_VERSION", false;
    Poll = 7, "POLL", false;
    RejectBanknote = 8, "REJECT_BANKNOTE", false;
    Disable = 9, "DISABLE", false;
    Enable = 10, "ENABLE", false;
    GetSerialNumber = 12, "GET_SERIAL_NUMBER", false;
    UnitData = 13, "UNIT_DATA", false;
    ChannelValueRequest = 14, "CHANNEL_VALUE_REQUEST", false;
    ChannelSecurityData = 15, "CHANNEL_SECURITY_DATA", false;
    ChannelReTeachData = 16, "CHANNEL_RE_TEACH_DATA", false;
    Sync = 17, "SYNC", false;
    LastRejectCode = 23, "LAST_REJECT_CODE", false;
    Hold = 24, "HOLD", false;
    GetFirmwareVersion = 32, "GET_FIRMWARE_VERSION", false;
    GetDatasetVersion = 33, "GET_DATASET_VERSION", false;
    GetAllLevels = 34, "GET_ALL_LEVELS", false;
    GetBarCodeReaderConfiguration = 35, "GET_BAR_CODE_READER_CONFIGURATION", false;
    SetBarCodeConfiguration = 36, "SET_BAR_CODE_CONFIGURATION", false;
    GetBarCodeInhibitStatus = 37, "GET_BAR_CODE_INHIBIT_STATUS", false;
    SetBarCodeInhibitStatus = 38, "SET_BAR_CODE_INHIBIT_STATUS", false;
    GetBarCodeData = 39, "GET_BAR_CODE_DATA", false;
    SetRefillMode = 48, "SET_REFILL_MODE", false;
    PayoutAmount = 51, "PAYOUT_AMOUNT", true;
    SetDenominationLevel = 52, "SET_DENOMINATION_LEVEL", false;
    GetDenominationLevel = 53, "GET_DENOMINATION_LEVEL", false;
    CommunicationPassThrough = 55, "COMMUNICATION_PASS_THROUGH", false;
    HaltPayout = 56, "HALT_PAYOUT", true;
    SetDenominationRoute = 59, "SET_DENOMINATION_ROUTE", true;
    GetDenominationRoute = 60, "GET_DENOMINATION_ROUTE", true;
    FloatAmount = 61, "FLOAT_AMOUNT", true;
    GetMinimumPayout = 62, "GET_MINIMUM_PAYOUT", false;
    EmptyAll = 63, "EMPTY_ALL", true;
    SetCoinMechInhibits = 64, "SET_COIN_MECH_INHIBITS", false;
    GetNotePositions = 65, "GET_NOTE_POSITIONS", false;
    PayoutNote = 66, "PAYOUT_NOTE", false;
    StackNote = 67, "STACK_NOTE", false;
    FloatByDenomination = 68, "FLOAT_BY_DENOMINATION", true;
    SetValueReportingType = 69, "SET_VALUE_REPORTING_TYPE", false;
    PayoutByDenomination = 70, "PAYOUT_BY_DENOMINATION", true;
    SetCoinMechGlobalInhibit = 73, "SET_COIN_MECH_GLOBAL_INHIBIT", false;
    SetGenerator = 74, "SET_GENERATOR", false;
    SetModulus = 75, "SET_MODULUS", false;
    RequestKeyExchange = 76, "REQUEST_KEY_EXCHANGE", false;
    SetBaudRate = 77, "SET_BAUD_RATE", false;
    GetBuildRevision = 79, "GET_BUILD_REVISION", false;
    SetHopperOptions = 80, "SET_HOPPER_OPTIONS", false;
    GetHopperOptions = 81, "GET_HOPPER_OPTIONS", false;
    SmartEmpty = 82, "SMART_EMPTY", true;
    CashboxPayoutOperationData = 83, "CASHBOX_PAYOUT_OPERATION_DATA", false;
    ConfigureBezel = 84, "CONFIGURE_BEZEL", false;
    PollWithAck = 86, "POLL_WITH_ACK", true;
    EventAck = 87, "EVENT_ACK", true;
    GetCounters = 88, "GET_COUNTERS", false;
    ResetCounters = 89, "RESET_COUNTERS", false;
    CoinMechOptions = 90, "COIN_MECH_OPTIONS", false;
    DisablePayoutDevice = 91, "DISABLE_PAYOUT_DEVICE", false;
    EnablePayoutDevice = 92, "ENABLE_PAYOUT_DEVICE", false;
    SetFixedEncryptionKey = 96, "SET_FIXED_ENCRYPTION_KEY", true;
    ResetFixedEncryptionKey = 97, "RESET_FIXED_ENCRYPTION_KEY", false;
}

impl Command {
    /// Opcode byte sent as the first payload byte
    pub fn opcode(self) -> u8 {
        self as u8
    }

    /// Catalog entry for this command
    pub fn spec(self) -> CommandSpec {
        CommandSpec {
            name: self.name(),
            opcode: self.opcode(),
            requires_encryption: self.requires_encryption(),
        }
    }

    /// Check if this command is part of the key exchange
    pub fn is_key_exchange(self) -> bool {
        matches!(
            self,
            Self::SetGenerator | Self::SetModulus | Self::RequestKeyExchange
        )
    }
}

/// Look up a command by name, ignoring case
///
/// # Examples
///
/// ```
/// use essp_core::command::{lookup, Command};
///
/// assert_eq!(lookup("poll").unwrap(), Command::Poll);
/// assert!(lookup("FLY").is_err());
/// ```
pub fn lookup(name: &str) -> Result<Command> {
    Command::ALL
        .iter()
        .copied()
        .find(|command| command.name().eq_ignore_ascii_case(name))
        .ok_or_else(|| Error::UnknownCommand(name.to_string()))
}

impl From<Command> for u8 {
    fn from(cmd: Command) -> u8 {
        cmd as u8
    }
}

impl FromStr for Command {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        lookup(s)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name(), *self as u8)
    }
}
