//! Encryption session state
//!
//! A session tracks:
//! - Key material of the exchange in progress
//! - The negotiated AES key
//! - The replay counter

use bytes::{Bytes, BytesMut};
use rand::Rng;
use tracing::{debug, warn};

use crate::{
    constants::crypto::FIXED_KEY,
    crypto::{self, KeyMaterial},
    error::{Error, Result},
};

/// Session state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No key exchange started
    Idle,

    /// Keys generated, waiting for the peer's intermediate key
    Negotiating,

    /// Shared key in place
    Established,
}

#[derive(Debug, Clone)]
struct Established {
    key: [u8; 16],
    replay_counter: u32,
}

/// Host side of the encryption layer
///
/// Owns the replay counter. Every [`CryptoSession::encrypt`] embeds the current
/// counter and advances it; the peripheral answers with the advanced value,
/// which [`CryptoSession::decrypt`] checks.
#[derive(Debug, Clone)]
pub struct CryptoSession {
    fixed_key: [u8; 8],
    keys: Option<KeyMaterial>,
    established: Option<Established>,
}

impl CryptoSession {
    /// Create a session using the default fixed key half
    pub fn new() -> Self {
        Self::with_fixed_key(FIXED_KEY)
    }

    /// Create a session with a custom fixed key half
    pub fn with_fixed_key(fixed_key: [u8; 8]) -> Self {
        Self {
            fixed_key,
            keys: None,
            established: None,
        }
    }

    /// Create an already established session
    ///
    /// Useful when the key is known, e.g. when simulating the peripheral.
    pub fn from_shared_key(key: [u8; 16], replay_counter: u32) -> Self {
        let mut fixed_key = [0u8; 8];
        fixed_key.copy_from_slice(&key[..8]);
        Self {
            fixed_key,
            keys: None,
            established: Some(Established {
                key,
                replay_counter,
            }),
        }
    }

    /// Current state
    pub fn state(&self) -> SessionState {
        match (&self.established, &self.keys) {
            (Some(_), _) => SessionState::Established,
            (None, Some(_)) => SessionState::Negotiating,
            (None, None) => SessionState::Idle,
        }
    }

    pub fn is_established(&self) -> bool {
        self.established.is_some()
    }

    /// Replay counter, if a session exists
    pub fn replay_counter(&self) -> Option<u32> {
        self.established.as_ref().map(|e| e.replay_counter)
    }

    /// Negotiated AES key, if a session exists
    pub fn shared_key(&self) -> Option<[u8; 16]> {
        self.established.as_ref().map(|e| e.key)
    }

    /// Key material of the exchange in progress
    pub fn key_material(&self) -> Option<&KeyMaterial> {
        self.keys.as_ref()
    }

    /// Start a new exchange, dropping any existing session
    pub fn generate_keys(&mut self) -> KeyMaterial {
        self.generate_keys_with(&mut rand::thread_rng())
    }

    /// Start a new exchange with a caller-provided RNG
    pub fn generate_keys_with<R: Rng + ?Sized>(&mut self, rng: &mut R) -> KeyMaterial {
        let keys = KeyMaterial::generate(rng);
        debug!(
            generator = keys.generator,
            modulus = keys.modulus,
            "Generated key exchange material"
        );
        self.established = None;
        self.keys = Some(keys);
        keys
    }

    /// Finish the exchange with the peer's intermediate key
    pub fn complete_handshake(&mut self, peer_public: u64) -> Result<[u8; 16]> {
        let keys = self.keys.take().ok_or(Error::NoSession)?;
        let shared = keys.shared_secret(peer_public);
        let key = crypto::session_key(&self.fixed_key, shared);

        self.established = Some(Established {
            key,
            replay_counter: 0,
        });

        debug!("Encryption session established");
        Ok(key)
    }

    /// Wrap an inner payload, advancing the replay counter
    pub fn encrypt(&mut self, inner: &[u8]) -> Result<BytesMut> {
        self.encrypt_with(inner, &mut rand::thread_rng())
    }

    /// Wrap an inner payload using a caller-provided RNG for padding
    pub fn encrypt_with<R: Rng + ?Sized>(&mut self, inner: &[u8], rng: &mut R) -> Result<BytesMut> {
        let session = self.established.as_mut().ok_or(Error::NoSession)?;
        let sealed = crypto::seal(&session.key, session.replay_counter, inner, rng)?;
        session.replay_counter = session.replay_counter.wrapping_add(1);
        Ok(sealed)
    }

    /// Unwrap an encrypted response
    ///
    /// The embedded counter must equal the current counter, i.e. the value
    /// sent with the request plus one. A mismatch invalidates the session.
    pub fn decrypt(&mut self, payload: &[u8]) -> Result<Bytes> {
        let session = self.established.as_ref().ok_or(Error::NoSession)?;
        let (counter, data) = crypto::open(&session.key, payload)?;

        let expected = session.replay_counter;
        if counter != expected {
            warn!(expected, actual = counter, "Replay counter mismatch, dropping session");
            self.invalidate();
            return Err(Error::ReplayCounterMismatch {
                expected,
                actual: counter,
            });
        }

        Ok(data)
    }

    /// Drop the session; encrypted commands fail until the next handshake
    pub fn invalidate(&mut self) {
        self.keys = None;
        self.established = None;
    }
}

impl Default for CryptoSession {
    fn default() -> Self {
        Self::new()
    }
}
