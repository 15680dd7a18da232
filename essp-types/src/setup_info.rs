//! Setup/capabilities information

use std::fmt;

use crate::unit_type::UnitType;

/// Decoded SETUP_REQUEST response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupInfo {
    /// Raw unit type byte
    pub unit_type_code: u8,

    /// Unit type (`None` if the byte is not in the table)
    pub unit_type: Option<UnitType>,

    /// Firmware version (4 ASCII characters)
    pub firmware_version: String,

    /// Dataset country code (3 ASCII characters)
    pub country_code: String,

    /// Protocol version the unit is running
    pub protocol_version: u8,
}

impl SetupInfo {
    pub fn new(
        unit_type_code: u8,
        firmware_version: String,
        country_code: String,
        protocol_version: u8,
    ) -> Self {
        Self {
            unit_type_code,
            unit_type: UnitType::try_from(unit_type_code).ok(),
            firmware_version,
            country_code,
            protocol_version,
        }
    }
}

impl fmt::Display for SetupInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let unit = self.unit_type.map(UnitType::name).unwrap_or("Unknown unit");
        write!(
            f,
            "{}[FW: {}, Country: {}, Protocol: {}]",
            unit, self.firmware_version, self.country_code, self.protocol_version
        )
    }
}
