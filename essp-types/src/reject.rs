//! Reject reasons returned by LAST_REJECT_CODE

use std::fmt;

const REJECT_REASONS: &[(&str, &str)] = &[
    ("NOTE_ACCEPTED", "The banknote has been accepted. No reject has occurred."),
    ("LENGTH_FAIL", "A validation fail: The banknote has been read but its length registers over the max length parameter."),
    ("AVERAGE_FAIL", "Internal validation failure - banknote not recognised."),
    ("COASTLINE_FAIL", "Internal validation failure - banknote not recognised."),
    ("GRAPH_FAIL", "Internal validation failure - banknote not recognised."),
    ("BURIED_FAIL", "Internal validation failure - banknote not recognised."),
    ("CHANNEL_INHIBIT", "This banknote has been inhibited for acceptance in the dataset configuration."),
    ("SECOND_NOTE_DETECTED", "A second banknote was inserted into the validator while the first one was still being transported through the banknote path."),
    ("REJECT_BY_HOST", "The host system issues a Reject command when this banknote was held in escrow."),
    ("CROSS_CHANNEL_DETECTED", "This banknote was identified as existing in two or more separate channel definitions in the dataset."),
    ("REAR_SENSOR_ERROR", "An inconsistency in a position sensor detection was seen."),
    ("NOTE_TOO_LONG", "The banknote failed dataset length checks."),
    ("DISABLED_BY_HOST", "The banknote was validated on a channel that has been inhibited for acceptance by the host system."),
    ("SLOW_MECH", "The internal mechanism was detected as moving too slowly for correct validation."),
    ("STRIM_ATTEMPT", "The internal mechanism was detected as moving too slowly for correct validation."),
    ("FRAUD_CHANNEL", "Obsolete response."),
    ("NO_NOTES_DETECTED", "A banknote detection was initiated but no banknotes were seen at the validation section."),
    ("PEAK_DETECT_FAIL", "Internal validation fail. Banknote not recognised."),
    ("TWISTED_NOTE_REJECT", "Internal validation fail. Banknote not recognised."),
    ("ESCROW_TIME-OUT", "A banknote held in escrow was rejected due to the host not communicating within the timeout period."),
    ("BAR_CODE_SCAN_FAIL", "Internal validation fail. Banknote not recognised."),
    ("NO_CAM_ACTIVATE", "A banknote did not reach the internal note path for validation during transport."),
    ("SLOT_FAIL_1", "Internal validation fail. Banknote not recognised."),
    ("SLOT_FAIL_2", "Internal validation fail. Banknote not recognised."),
    ("LENS_OVERSAMPLE", "The banknote was transported faster than the system could sample the note."),
    ("WIDTH_DETECTION_FAIL", "The banknote failed a measurement test."),
    ("SHORT_NOTE_DETECT", "The banknote measured length fell outside of the validation parameter for minimum length."),
    ("PAYOUT_NOTE", "The reject code command was issued after a note was paid out using a note payout device."),
    ("DOUBLE_NOTE_DETECTED", "More than one banknote was detected as overlaid during note entry."),
    ("UNABLE_TO_STACK", "The banknote was unable to reach its correct stacking position during transport."),
];

/// Decoded reject reason
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RejectReason {
    pub code: u8,
    pub name: &'static str,
    pub description: &'static str,
}

impl RejectReason {
    /// Look up a reject code; codes outside the table map to `UNKNOWN`
    pub fn from_code(code: u8) -> Self {
        let (name, description) = REJECT_REASONS
            .get(code as usize)
            .copied()
            .unwrap_or(("UNKNOWN", ""));

        Self {
            code,
            name,
            description,
        }
    }

    /// Check if the last note was accepted
    pub fn is_accepted(&self) -> bool {
        self.code == 0
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, self.code)
    }
}
