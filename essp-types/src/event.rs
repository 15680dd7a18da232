//! Poll events

use std::fmt;

use chrono::{DateTime, Utc};

use crate::status::StatusCode;

/// Poll events share the status code space
pub type EventKind = StatusCode;

/// Bytes that follow an event code in a POLL response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventLayout {
    /// Event code only
    Bare,

    /// One channel byte
    Channel,

    /// Count byte followed by 7-byte value/country records when the unit and
    /// protocol version support it, else one channel byte
    FraudRecords,
}

impl EventLayout {
    /// Per-kind layout lookup used to advance the decode cursor
    pub fn of(kind: Option<EventKind>) -> Self {
        match kind {
            Some(
                EventKind::ReadNote
                | EventKind::CreditNote
                | EventKind::NoteClearedFromFront
                | EventKind::NoteClearedToCashbox,
            ) => Self::Channel,
            Some(EventKind::FraudAttempt) => Self::FraudRecords,
            _ => Self::Bare,
        }
    }
}

/// Value/country pair of a fraud attempt on payout-capable units
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FraudValue {
    pub value: u32,
    pub country_code: String,
}

/// Data carried by an event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventDetail {
    None,
    Channel(u8),
    FraudValues(Vec<FraudValue>),
}

/// A single decoded poll event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollEvent {
    /// Raw event code
    pub code: u8,

    /// Known event kind (`None` for codes outside the table)
    pub kind: Option<EventKind>,

    pub detail: EventDetail,
}

impl PollEvent {
    pub fn new(code: u8, detail: EventDetail) -> Self {
        Self {
            code,
            kind: EventKind::try_from(code).ok(),
            detail,
        }
    }

    /// Protocol name, `"UNKNOWN"` for codes outside the table
    pub fn name(&self) -> &'static str {
        self.kind.map(EventKind::name).unwrap_or("UNKNOWN")
    }

    /// Channel number, if the event carries one
    pub fn channel(&self) -> Option<u8> {
        match self.detail {
            EventDetail::Channel(channel) => Some(channel),
            _ => None,
        }
    }
}

impl fmt::Display for PollEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.detail {
            EventDetail::None => write!(f, "{}", self.name()),
            EventDetail::Channel(channel) => write!(f, "{}(channel={})", self.name(), channel),
            EventDetail::FraudValues(values) => {
                write!(f, "{}(values={})", self.name(), values.len())
            }
        }
    }
}

/// Events decoded from one POLL response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollReport {
    pub received_at: DateTime<Utc>,
    pub events: Vec<PollEvent>,
}

impl PollReport {
    pub fn new(events: Vec<PollEvent>) -> Self {
        Self {
            received_at: Utc::now(),
            events,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
