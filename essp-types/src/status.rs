//! Status and event codes
//!
//! The first byte of every response is a status code. POLL responses reuse the
//! same code space for the events that follow the status byte, so a single
//! table serves both.

use std::fmt;

use crate::error::{Error, Result};

macro_rules! status_codes {
    ($($variant:ident = $code:literal => $name:literal,)+) => {
        /// Response status and poll event codes
        #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
        #[repr(u8)]
        pub enum StatusCode {
            $($variant = $code,)+
        }

        impl StatusCode {
            /// Get the protocol name of this code
            pub fn name(self) -> &'static str {
                match self {
                    $(Self::$variant => $name,)+
                }
            }
        }

        impl TryFrom<u8> for StatusCode {
            type Error = Error;

            fn try_from(value: u8) -> Result<Self> {
                match value {
                    $($code => Ok(Self::$variant),)+
                    _ => Err(Error::UnknownStatus(value)),
                }
            }
        }
    };
}

status_codes! {
    JamRecovery = 176 => "JAM_RECOVERY",
    ErrorDuringPayout = 177 => "ERROR_DURING_PAYOUT",
    SmartEmptying = 179 => "SMART_EMPTYING",
    SmartEmptied = 180 => "SMART_EMPTIED",
    ChannelDisable = 181 => "CHANNEL_DISABLE",
    Initialising = 182 => "INITIALISING",
    CoinMechError = 183 => "COIN_MECH_ERROR",
    Emptying = 194 => "EMPTYING",
    Emptied = 195 => "EMPTIED",
    CoinMechJammed = 196 => "COIN_MECH_JAMMED",
    CoinMechReturnPressed = 197 => "COIN_MECH_RETURN_PRESSED",
    PayoutOutOfService = 198 => "PAYOUT_OUT_OF_SERVICE",
    NoteFloatRemoved = 199 => "NOTE_FLOAT_REMOVED",
    NoteFloatAttached = 200 => "NOTE_FLOAT_ATTACHED",
    NoteTransferedToStacker = 201 => "NOTE_TRANSFERED_TO_STACKER",
    NotePaidIntoStackerAtPowerUp = 202 => "NOTE_PAID_INTO_STACKER_AT_POWER-UP",
    NotePaidIntoStoreAtPowerUp = 203 => "NOTE_PAID_INTO_STORE_AT_POWER-UP",
    NoteStacking = 204 => "NOTE_STACKING",
    NoteDispensedAtPowerUp = 205 => "NOTE_DISPENSED_AT_POWER-UP",
    NoteHeldInBezel = 206 => "NOTE_HELD_IN_BEZEL",
    DeviceFull = 207 => "DEVICE_FULL",
    BarCodeTicketAcknowledge = 209 => "BAR_CODE_TICKET_ACKNOWLEDGE",
    Dispensed = 210 => "DISPENSED",
    Jammed = 213 => "JAMMED",
    Halted = 214 => "HALTED",
    Floating = 215 => "FLOATING",
    Floated = 216 => "FLOATED",
    TimeOut = 217 => "TIME_OUT",
    Dispensing = 218 => "DISPENSING",
    NoteStoredInPayout = 219 => "NOTE_STORED_IN_PAYOUT",
    IncompletePayout = 220 => "INCOMPLETE_PAYOUT",
    IncompleteFloat = 221 => "INCOMPLETE_FLOAT",
    CashboxPaid = 222 => "CASHBOX_PAID",
    CoinCredit = 223 => "COIN_CREDIT",
    NotePathOpen = 224 => "NOTE_PATH_OPEN",
    NoteClearedFromFront = 225 => "NOTE_CLEARED_FROM_FRONT",
    NoteClearedToCashbox = 226 => "NOTE_CLEARED_TO_CASHBOX",
    CashboxRemoved = 227 => "CASHBOX_REMOVED",
    CashboxReplaced = 228 => "CASHBOX_REPLACED",
    BarCodeTicketValidated = 229 => "BAR_CODE_TICKET_VALIDATED",
    FraudAttempt = 230 => "FRAUD_ATTEMPT",
    StackerFull = 231 => "STACKER_FULL",
    Disabled = 232 => "DISABLED",
    UnsafeNoteJam = 233 => "UNSAFE_NOTE_JAM",
    SafeNoteJam = 234 => "SAFE_NOTE_JAM",
    NoteStacked = 235 => "NOTE_STACKED",
    NoteRejected = 236 => "NOTE_REJECTED",
    NoteRejecting = 237 => "NOTE_REJECTING",
    CreditNote = 238 => "CREDIT_NOTE",
    ReadNote = 239 => "READ_NOTE",
    Ok = 240 => "OK",
    SlaveReset = 241 => "SLAVE_RESET",
    CommandNotKnown = 242 => "COMMAND_NOT_KNOWN",
    WrongNoParameters = 243 => "WRONG_NO_PARAMETERS",
    ParameterOutOfRange = 244 => "PARAMETER_OUT_OF_RANGE",
    CommandCannotBeProcessed = 245 => "COMMAND_CANNOT_BE_PROCESSED",
    SoftwareError = 246 => "SOFTWARE_ERROR",
    Fail = 248 => "FAIL",
    KeyNotSet = 250 => "KEY_NOT_SET",
}

impl StatusCode {
    /// Raw wire value
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Check if this is the success status (0xF0)
    pub fn is_ok(self) -> bool {
        self == Self::Ok
    }

    /// Name for an arbitrary wire byte, `"UNDEFINED"` when not in the table
    pub fn describe(code: u8) -> &'static str {
        Self::try_from(code).map(Self::name).unwrap_or("UNDEFINED")
    }
}

impl From<StatusCode> for u8 {
    fn from(code: StatusCode) -> u8 {
        code as u8
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(0x{:02X})", self.name(), *self as u8)
    }
}
