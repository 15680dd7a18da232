//! Command/response dispatch
//!
//! The line is half-duplex: one command is written, then the transport is
//! polled until a full response frame arrives or the timeout expires.

use std::time::Duration;

use tokio::time::{Instant, sleep};
use tracing::{debug, trace, warn};

use essp_core::{
    Command, CryptoSession, Error as CoreError, Framer,
    command,
    constants::{MAX_DEVICE_ID, STEX},
    packet,
};
use essp_transport::Transport;

use crate::{
    args::CommandArgs,
    config::DeviceConfig,
    decoder::{CommandResult, ResponseDecoder, ResponseInfo},
    error::{Error, Result},
};

/// Where the last exchange ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    /// Nothing sent yet
    Idle,

    /// Command written, waiting for the response
    Sent,

    /// Response frame received
    Completed,

    /// No response within the timeout
    TimedOut,
}

/// Single-line command dispatcher
///
/// Owns the transport, the frame extractor, the sequence bit and the
/// encryption session. `&mut self` on every exchange keeps one command in
/// flight.
pub struct Dispatcher<T: Transport> {
    transport: T,
    framer: Framer,
    crypto: CryptoSession,
    decoder: ResponseDecoder,
    sequence: bool,
    state: DispatchState,
    device_id: u8,
    encrypt_all: bool,
    read_interval: Duration,
}

impl<T: Transport> Dispatcher<T> {
    pub fn new(transport: T, config: &DeviceConfig) -> Self {
        Self {
            transport,
            framer: Framer::new(),
            crypto: CryptoSession::with_fixed_key(config.fixed_key),
            decoder: ResponseDecoder::new(config.protocol_version),
            sequence: true,
            state: DispatchState::Idle,
            device_id: config.device_id.min(MAX_DEVICE_ID),
            encrypt_all: config.encrypt_all,
            read_interval: config.read_interval,
        }
    }

    /// Sequence bit the next command will carry
    pub fn sequence_flag(&self) -> bool {
        self.sequence
    }

    pub fn state(&self) -> DispatchState {
        self.state
    }

    pub fn crypto(&self) -> &CryptoSession {
        &self.crypto
    }

    pub fn crypto_mut(&mut self) -> &mut CryptoSession {
        &mut self.crypto
    }

    pub fn decoder(&self) -> &ResponseDecoder {
        &self.decoder
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Give back the transport
    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Execute a command by catalog name
    pub async fn execute(
        &mut self,
        name: &str,
        args: CommandArgs,
        timeout: Duration,
    ) -> Result<CommandResult> {
        let command = command::lookup(name)?;
        self.execute_command(command, args, timeout).await
    }

    /// Execute one command and wait for its response
    pub async fn execute_command(
        &mut self,
        command: Command,
        args: CommandArgs,
        timeout: Duration,
    ) -> Result<CommandResult> {
        let mut inner = Vec::with_capacity(16);
        inner.push(command.opcode());
        inner.extend_from_slice(&args.encode(command)?);

        let encrypt = if command.requires_encryption() {
            if !self.crypto.is_established() {
                return Err(CoreError::EncryptionRequired(command.name().to_string()).into());
            }
            true
        } else {
            self.encrypt_all && self.crypto.is_established() && !command.is_key_exchange()
        };

        let payload = if encrypt {
            self.crypto.encrypt(&inner)?.to_vec()
        } else {
            inner
        };

        let seq_id = packet::seq_id(self.sequence, self.device_id);
        let frame = packet::build(seq_id, &payload)?;

        // Leftovers of an earlier exchange must not answer this command
        if self.framer.has_partial() {
            debug!("Discarding partial input before {}", command);
        }
        self.framer.reset();
        self.transport.clear_input()?;

        debug!(
            command = command.name(),
            seq = self.sequence as u8,
            encrypted = encrypt,
            "Sending command"
        );
        trace!("TX {}", hex::encode(&frame));

        self.state = DispatchState::Sent;
        self.sequence = !self.sequence;
        if let Err(e) = self.transport.write(&frame).await {
            self.state = DispatchState::Idle;
            return Err(e.into());
        }

        let raw = match self.wait_for_frame(seq_id, timeout).await? {
            Some(raw) => raw,
            None => {
                warn!(command = command.name(), "No response within {:?}", timeout);
                self.state = DispatchState::TimedOut;
                self.framer.reset();
                return Err(Error::Timeout {
                    command: command.name(),
                    millis: timeout.as_millis(),
                });
            }
        };
        self.state = DispatchState::Completed;
        trace!("RX {}", hex::encode(&raw));

        let payload = packet::verify_and_extract(&raw)?;
        let plain = if payload.first() == Some(&STEX) && self.crypto.is_established() {
            self.crypto.decrypt(&payload)?
        } else {
            payload
        };

        let result = self.decoder.decode(command, &plain)?;
        if command == Command::HostProtocolVersion && result.is_ok() {
            if let CommandArgs::Version(version) = args {
                self.decoder.set_protocol_version(version);
            }
        }

        debug!(command = command.name(), status = %result.status, "Command complete");
        Ok(result)
    }

    /// Negotiate a new session key
    ///
    /// SET_GENERATOR, SET_MODULUS, then REQUEST_KEY_EXCHANGE. Any existing
    /// session is dropped first.
    pub async fn handshake(&mut self, timeout: Duration) -> Result<()> {
        let keys = self.crypto.generate_keys();

        self.execute_command(Command::SetGenerator, CommandArgs::Key(keys.generator), timeout)
            .await?
            .into_result()?;
        self.execute_command(Command::SetModulus, CommandArgs::Key(keys.modulus), timeout)
            .await?
            .into_result()?;
        let reply = self
            .execute_command(
                Command::RequestKeyExchange,
                CommandArgs::Key(keys.host_public),
                timeout,
            )
            .await?
            .into_result()?;

        let ResponseInfo::KeyExchange(peer_public) = reply.info else {
            return Err(CoreError::MalformedResponse("key exchange reply without key".into()).into());
        };
        self.crypto.complete_handshake(peer_public)?;

        debug!("Key exchange complete");
        Ok(())
    }

    /// Wait for a frame echoing `seq_id`; frames with another SEQ/ID are orphans
    async fn wait_for_frame(
        &mut self,
        seq_id: u8,
        timeout: Duration,
    ) -> Result<Option<bytes::BytesMut>> {
        let deadline = Instant::now() + timeout;

        loop {
            let chunk = self.transport.read_available()?;
            if !chunk.is_empty() {
                self.framer.push(&chunk);
                while let Some(raw) = self.framer.next_frame() {
                    if raw.get(1) == Some(&seq_id) {
                        return Ok(Some(raw));
                    }
                    trace!(
                        expected = seq_id,
                        frame = %hex::encode(&raw),
                        "Dropping frame with stale SEQ/ID"
                    );
                }
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            // Keep draining while bytes are arriving
            if chunk.is_empty() {
                sleep(self.read_interval.min(deadline - now)).await;
            } else {
                tokio::task::yield_now().await;
            }
        }
    }
}
