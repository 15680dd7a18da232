//! Peripheral unit types reported by SETUP_REQUEST

use std::fmt;

use crate::error::{Error, Result};

/// Unit type byte of the setup response
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum UnitType {
    BanknoteValidator = 0,
    SmartHopper = 3,
    SmartPayout = 6,
    NoteFloat = 7,
    AddonPrinter = 8,
    StandAlonePrinter = 11,
    Tebs = 13,
    TebsWithSmartPayout = 14,
    TebsWithSmartTicket = 15,
}

impl UnitType {
    /// Human readable name
    pub fn name(self) -> &'static str {
        match self {
            Self::BanknoteValidator => "Banknote validator",
            Self::SmartHopper => "Smart Hopper",
            Self::SmartPayout => "SMART Payout fitted",
            Self::NoteFloat => "Note Float fitted",
            Self::AddonPrinter => "Addon Printer",
            Self::StandAlonePrinter => "Stand Alone Printer",
            Self::Tebs => "TEBS",
            Self::TebsWithSmartPayout => "TEBS with SMART Payout",
            Self::TebsWithSmartTicket => "TEBS with SMART Ticket",
        }
    }

    /// Units that can pay out and therefore report fraud attempts as value lists
    pub fn is_payout_capable(self) -> bool {
        matches!(self, Self::SmartHopper | Self::SmartPayout)
    }
}

impl TryFrom<u8> for UnitType {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Self::BanknoteValidator),
            3 => Ok(Self::SmartHopper),
            6 => Ok(Self::SmartPayout),
            7 => Ok(Self::NoteFloat),
            8 => Ok(Self::AddonPrinter),
            11 => Ok(Self::StandAlonePrinter),
            13 => Ok(Self::Tebs),
            14 => Ok(Self::TebsWithSmartPayout),
            15 => Ok(Self::TebsWithSmartTicket),
            _ => Err(Error::UnknownUnitType(value)),
        }
    }
}

impl fmt::Display for UnitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
