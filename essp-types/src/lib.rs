//! Type definitions for essp
//!
//! Lookup tables and decoded payload structures shared by the protocol core
//! and the high-level device API.

pub mod error;
pub mod event;
pub mod reject;
pub mod setup_info;
pub mod status;
pub mod unit_type;

pub use error::{Error, Result};
pub use event::{EventDetail, EventKind, EventLayout, FraudValue, PollEvent, PollReport};
pub use reject::RejectReason;
pub use setup_info::SetupInfo;
pub use status::StatusCode;
pub use unit_type::UnitType;
