//! Simulated peripheral for tests
//!
//! Answers frames written to a [`MemoryTransport`] the way a validator
//! would, including the key exchange and encrypted replies.

use std::sync::Arc;

use byteorder::{ByteOrder, LittleEndian};
use parking_lot::Mutex;
use essp_core::{
    Command, Frame, Framer,
    constants::{STATUS_OK, STEX},
    crypto::{self, default_session_key, mod_pow},
    packet,
};
use essp_transport::MemoryTransport;

pub(crate) struct SimulatedValidator {
    framer: Framer,
    secret: u64,
    generator: u64,
    modulus: u64,
    key: Option<[u8; 16]>,

    pub serial: u32,
    pub setup: Vec<u8>,
    pub poll_events: Vec<u8>,
    pub last_reject: u8,

    /// Answer this command with the given status instead
    pub fail: Option<(Command, u8)>,
    /// Offset added to the received counter in encrypted replies
    pub counter_offset: u32,
    pub corrupt_crc: bool,
    pub silent: bool,

    /// Commands seen, in order
    pub received: Vec<Command>,
    /// Whether each received command was encrypted
    pub encrypted: Vec<bool>,
    /// Sequence bit of each received frame
    pub sequence_bits: Vec<bool>,
}

pub(crate) type SharedValidator = Arc<Mutex<SimulatedValidator>>;

impl SimulatedValidator {
    pub fn new() -> Self {
        Self {
            framer: Framer::new(),
            secret: 0x1234_5678,
            generator: 0,
            modulus: 0,
            key: None,
            serial: 0x0012_D687,
            setup: vec![0x00, b'0', b'4', b'1', b'0', b'E', b'U', b'R', 0x06],
            poll_events: Vec::new(),
            last_reject: 0,
            fail: None,
            counter_offset: 1,
            corrupt_crc: false,
            silent: false,
            received: Vec::new(),
            encrypted: Vec::new(),
            sequence_bits: Vec::new(),
        }
    }

    /// Wire the simulator behind a memory transport
    pub fn attach(self) -> (MemoryTransport, SharedValidator) {
        let shared = Arc::new(Mutex::new(self));
        let peer = Arc::clone(&shared);
        let transport =
            MemoryTransport::new().with_responder(move |data| peer.lock().handle(data));
        (transport, shared)
    }

    pub fn handle(&mut self, wire: &[u8]) -> Option<Vec<u8>> {
        self.framer.push(wire);
        let raw = self.framer.next_frame()?;
        let frame = Frame::decode(&raw).ok()?;
        self.sequence_bits.push(frame.sequence_bit());

        let (counter, inner) = if frame.payload.first() == Some(&STEX) {
            let key = self.key?;
            let (counter, data) = crypto::open(&key, &frame.payload).ok()?;
            (Some(counter), data.to_vec())
        } else {
            (None, frame.payload.to_vec())
        };

        let command = Command::try_from(*inner.first()?).ok()?;
        self.received.push(command);
        self.encrypted.push(counter.is_some());

        if self.silent {
            return None;
        }

        let reply = self.respond(command, &inner[1..]);
        let payload = match (counter, self.key) {
            (Some(counter), Some(key)) => crypto::seal(
                &key,
                counter.wrapping_add(self.counter_offset),
                &reply,
                &mut rand::thread_rng(),
            )
            .ok()?
            .to_vec(),
            _ => reply,
        };

        let out = packet::build(frame.seq_id, &payload).ok()?;
        if self.corrupt_crc {
            let mut body = packet::unstuff(&out[1..]);
            let last = body.len() - 1;
            body[last] ^= 0x01;
            let mut corrupted = vec![out[0]];
            corrupted.extend_from_slice(&packet::stuff(&body));
            return Some(corrupted);
        }
        Some(out.to_vec())
    }

    fn respond(&mut self, command: Command, args: &[u8]) -> Vec<u8> {
        if let Some((failing, status)) = self.fail {
            if failing == command {
                return vec![status];
            }
        }

        let mut reply = vec![STATUS_OK];
        match command {
            Command::SetGenerator if args.len() >= 8 => {
                self.generator = LittleEndian::read_u64(args);
            }
            Command::SetModulus if args.len() >= 8 => {
                self.modulus = LittleEndian::read_u64(args);
            }
            Command::RequestKeyExchange if args.len() >= 8 => {
                let host_public = LittleEndian::read_u64(args);
                let peer_public = mod_pow(self.generator, self.secret, self.modulus);
                let shared = mod_pow(host_public, self.secret, self.modulus);
                self.key = Some(default_session_key(shared));
                reply.extend_from_slice(&peer_public.to_le_bytes());
            }
            Command::GetSerialNumber => reply.extend_from_slice(&self.serial.to_be_bytes()),
            Command::SetupRequest => reply.extend_from_slice(&self.setup),
            Command::Poll => reply.extend_from_slice(&self.poll_events),
            Command::LastRejectCode => reply.push(self.last_reject),
            _ => {}
        }
        reply
    }
}
