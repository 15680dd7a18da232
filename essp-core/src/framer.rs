//! Streaming frame extraction
//!
//! Serial reads arrive in arbitrary chunks. [`Framer`] accumulates them,
//! removes byte-stuffing and yields complete de-stuffed frames
//! (`STX SEQ LEN PAYLOAD CRC`) ready for [`crate::packet::verify_and_extract`].

use bytes::{Buf, BufMut, BytesMut};
use tracing::trace;

use crate::{constants::STX, packet::Frame};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Waiting for STX
    Idle,

    /// Collecting frame bytes
    InFrame,

    /// Saw STX inside a frame, deciding between stuffing and a new start
    CheckStuff,
}

/// Incremental frame extractor
#[derive(Debug)]
pub struct Framer {
    state: State,
    collected: BytesMut,
    expected: Option<usize>,
    pending: BytesMut,
}

impl Framer {
    pub fn new() -> Self {
        Self {
            state: State::Idle,
            collected: BytesMut::with_capacity(64),
            expected: None,
            pending: BytesMut::new(),
        }
    }

    /// Queue raw bytes read from the line
    pub fn push(&mut self, data: &[u8]) {
        self.pending.extend_from_slice(data);
    }

    /// Extract the next complete frame from queued bytes
    ///
    /// Bytes after the returned frame stay queued for the next call.
    pub fn next_frame(&mut self) -> Option<BytesMut> {
        let pending = std::mem::take(&mut self.pending);
        let (frame, consumed) = self.unstuff_next_frame(&pending);
        self.pending = pending;
        self.pending.advance(consumed);
        frame
    }

    /// Run the state machine over `input` until a frame completes
    ///
    /// Returns the frame (if any) and how many bytes of `input` were consumed.
    /// Partial frames are kept in the framer across calls.
    pub fn unstuff_next_frame(&mut self, input: &[u8]) -> (Option<BytesMut>, usize) {
        for (index, &byte) in input.iter().enumerate() {
            if let Some(frame) = self.step(byte) {
                return (Some(frame), index + 1);
            }
        }
        (None, input.len())
    }

    /// Drop any partial frame and queued input
    pub fn reset(&mut self) {
        self.reset_frame();
        self.pending.clear();
    }

    /// Check if a frame is partially collected or input is queued
    pub fn has_partial(&self) -> bool {
        self.state != State::Idle || !self.pending.is_empty()
    }

    fn reset_frame(&mut self) {
        self.state = State::Idle;
        self.collected.clear();
        self.expected = None;
    }

    fn start_frame(&mut self) {
        self.collected.clear();
        self.collected.put_u8(STX);
        self.expected = None;
        self.state = State::InFrame;
    }

    fn step(&mut self, byte: u8) -> Option<BytesMut> {
        match self.state {
            State::Idle => {
                if byte == STX {
                    self.start_frame();
                }
                return None;
            }
            State::InFrame if byte == STX && self.collected.len() == 1 => {
                trace!("Double STX at frame start, discarding");
                self.reset_frame();
                return None;
            }
            State::InFrame if byte == STX => {
                self.state = State::CheckStuff;
                return None;
            }
            State::InFrame => self.collected.put_u8(byte),
            State::CheckStuff => {
                if byte == STX {
                    self.collected.put_u8(STX);
                } else {
                    trace!(
                        dropped = self.collected.len(),
                        "Unstuffed STX inside frame, restarting"
                    );
                    self.start_frame();
                    self.collected.put_u8(byte);
                }
                self.state = State::InFrame;
            }
        }

        if self.collected.len() == 3 {
            self.expected = Some(self.collected[2] as usize + Frame::OVERHEAD);
        }

        match self.expected {
            Some(expected) if self.collected.len() >= expected => {
                let frame = self.collected.split();
                self.reset_frame();
                trace!(len = frame.len(), frame = %hex::encode(&frame), "Frame complete");
                Some(frame)
            }
            _ => None,
        }
    }
}

impl Default for Framer {
    fn default() -> Self {
        Self::new()
    }
}
