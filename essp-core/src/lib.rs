//! # essp-core
//!
//! Core protocol implementation for eSSP peripherals.
//!
//! This crate provides the low-level protocol primitives:
//! - Frame structure, byte-stuffing and streaming extraction
//! - CRC16 calculation
//! - Key exchange and AES session encryption
//! - Command catalog
//! - Protocol constants

pub mod checksum;
pub mod command;
pub mod constants;
pub mod crypto;
pub mod error;
pub mod framer;
pub mod packet;
pub mod session;

pub use command::{Command, CommandSpec};
pub use crypto::KeyMaterial;
pub use error::{Error, Result};
pub use framer::Framer;
pub use packet::Frame;
pub use session::{CryptoSession, SessionState};
