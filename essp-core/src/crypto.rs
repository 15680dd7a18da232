//! Key agreement arithmetic and encrypted block sealing
//!
//! The key exchange is a Diffie-Hellman variant over small primes: the host
//! sends a generator, a modulus and `generator^secret mod modulus`, the
//! peripheral answers with its own intermediate key, and both sides derive
//! the same 64-bit value. That value becomes the variable half of an AES-128
//! key; the fixed half is shared out of band.
//!
//! Encrypted payloads are a single AES-ECB block chain:
//!
//! ```text
//! STEX | AES( LEN | COUNTER (u32 LE) | DATA | PADDING | CRC16 (LE) )
//! ```

use aes::Aes128;
use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};
use byteorder::{ByteOrder, LittleEndian};
use bytes::{BufMut, Bytes, BytesMut};
use rand::Rng;

use crate::{
    checksum,
    constants::{
        MAX_PAYLOAD_SIZE, STEX,
        crypto::{BLOCK_HEADER_SIZE, BLOCK_SIZE, FIXED_KEY, HOST_SECRET_BOUND, PRIME_BITS},
    },
    error::{Error, Result},
};

/// Largest inner payload that still fits one frame once sealed
pub const MAX_SEALED_DATA: usize =
    (MAX_PAYLOAD_SIZE - 1) / BLOCK_SIZE * BLOCK_SIZE - BLOCK_HEADER_SIZE - 2;

const WITNESSES: [u64; 12] = [2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37];

/// `a * b mod m` without overflow
pub fn mul_mod(a: u64, b: u64, modulus: u64) -> u64 {
    ((a as u128 * b as u128) % modulus as u128) as u64
}

/// `base^exp mod modulus` by square-and-multiply
///
/// # Examples
///
/// ```
/// use essp_core::crypto::mod_pow;
///
/// assert_eq!(mod_pow(4, 13, 497), 445);
/// ```
pub fn mod_pow(base: u64, mut exp: u64, modulus: u64) -> u64 {
    if modulus == 1 {
        return 0;
    }

    let mut result = 1;
    let mut base = base % modulus;
    while exp > 0 {
        if exp & 1 == 1 {
            result = mul_mod(result, base, modulus);
        }
        base = mul_mod(base, base, modulus);
        exp >>= 1;
    }
    result
}

/// Deterministic Miller-Rabin for the whole u64 range
pub fn is_prime(n: u64) -> bool {
    if n < 2 {
        return false;
    }
    for &p in &WITNESSES {
        if n % p == 0 {
            return n == p;
        }
    }

    let mut d = n - 1;
    let mut s = 0;
    while d % 2 == 0 {
        d /= 2;
        s += 1;
    }

    'witness: for &a in &WITNESSES {
        let mut x = mod_pow(a, d, n);
        if x == 1 || x == n - 1 {
            continue;
        }
        for _ in 1..s {
            x = mul_mod(x, x, n);
            if x == n - 1 {
                continue 'witness;
            }
        }
        return false;
    }
    true
}

/// Random prime with exactly `bits` significant bits
pub fn random_prime<R: Rng + ?Sized>(bits: u32, rng: &mut R) -> u64 {
    debug_assert!((2..=63).contains(&bits));
    let low = 1u64 << (bits - 1);
    let high = 1u64 << bits;
    loop {
        let candidate = rng.gen_range(low..high) | 1;
        if is_prime(candidate) {
            return candidate;
        }
    }
}

/// Host side of one key exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyMaterial {
    pub generator: u64,
    pub modulus: u64,
    pub host_secret: u64,
    pub host_public: u64,
}

impl KeyMaterial {
    /// Draw fresh primes and a host secret
    ///
    /// The larger prime becomes the generator.
    pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let mut generator = random_prime(PRIME_BITS, rng);
        let mut modulus = random_prime(PRIME_BITS, rng);
        while modulus == generator {
            modulus = random_prime(PRIME_BITS, rng);
        }
        if generator < modulus {
            std::mem::swap(&mut generator, &mut modulus);
        }

        let host_secret = rng.gen_range(1..HOST_SECRET_BOUND);
        Self::from_parts(generator, modulus, host_secret)
    }

    /// Build from known values
    pub fn from_parts(generator: u64, modulus: u64, host_secret: u64) -> Self {
        Self {
            generator,
            modulus,
            host_secret,
            host_public: mod_pow(generator, host_secret, modulus),
        }
    }

    /// Shared secret from the peer's intermediate key
    pub fn shared_secret(&self, peer_public: u64) -> u64 {
        mod_pow(peer_public, self.host_secret, self.modulus)
    }
}

/// AES-128 session key: fixed half followed by the shared secret (LE)
pub fn session_key(fixed: &[u8; 8], shared_secret: u64) -> [u8; 16] {
    let mut key = [0u8; 16];
    key[..8].copy_from_slice(fixed);
    LittleEndian::write_u64(&mut key[8..], shared_secret);
    key
}

/// Session key with the default fixed half
pub fn default_session_key(shared_secret: u64) -> [u8; 16] {
    session_key(&FIXED_KEY, shared_secret)
}

/// Padding that makes `LEN + COUNTER + data + padding + CRC` block aligned
pub fn padding_len(data_len: usize) -> usize {
    (BLOCK_SIZE - (data_len + BLOCK_HEADER_SIZE + 2) % BLOCK_SIZE) % BLOCK_SIZE
}

/// Seal `data` into an encrypted payload (`STEX` + ciphertext)
pub fn seal<R: Rng + ?Sized>(
    key: &[u8; 16],
    counter: u32,
    data: &[u8],
    rng: &mut R,
) -> Result<BytesMut> {
    if data.len() > MAX_SEALED_DATA {
        return Err(Error::PayloadTooLarge {
            size: data.len(),
            max: MAX_SEALED_DATA,
        });
    }

    let padding = padding_len(data.len());
    let mut block = BytesMut::with_capacity(BLOCK_HEADER_SIZE + data.len() + padding + 2);
    block.put_u8(data.len() as u8);
    block.put_u32_le(counter);
    block.put_slice(data);
    for _ in 0..padding {
        block.put_u8(rng.r#gen());
    }
    let crc = checksum::to_bytes(&block);
    block.put_slice(&crc);

    let cipher = Aes128::new(GenericArray::from_slice(key));
    for chunk in block.chunks_exact_mut(BLOCK_SIZE) {
        cipher.encrypt_block(GenericArray::from_mut_slice(chunk));
    }

    let mut payload = BytesMut::with_capacity(block.len() + 1);
    payload.put_u8(STEX);
    payload.put_slice(&block);
    Ok(payload)
}

/// Open an encrypted payload, returning the embedded counter and data
///
/// Counter validation is left to the caller.
pub fn open(key: &[u8; 16], payload: &[u8]) -> Result<(u32, Bytes)> {
    match payload.first() {
        Some(&STEX) => {}
        Some(&other) => {
            return Err(Error::MalformedResponse(format!(
                "expected encrypted marker 0x7E, got 0x{:02X}",
                other
            )));
        }
        None => return Err(Error::MalformedResponse("empty encrypted payload".into())),
    }

    let ciphertext = &payload[1..];
    if ciphertext.is_empty() || ciphertext.len() % BLOCK_SIZE != 0 {
        return Err(Error::MalformedResponse(format!(
            "encrypted block length {} is not a multiple of {}",
            ciphertext.len(),
            BLOCK_SIZE
        )));
    }

    let mut block = ciphertext.to_vec();
    let cipher = Aes128::new(GenericArray::from_slice(key));
    for chunk in block.chunks_exact_mut(BLOCK_SIZE) {
        cipher.decrypt_block(GenericArray::from_mut_slice(chunk));
    }

    let crc_at = block.len() - 2;
    let received = LittleEndian::read_u16(&block[crc_at..]);
    let calculated = checksum::calculate(&block[..crc_at]);
    if calculated != received {
        return Err(Error::CrcMismatch {
            expected: calculated,
            received,
        });
    }

    let len = block[0] as usize;
    if BLOCK_HEADER_SIZE + len > crc_at {
        return Err(Error::MalformedResponse(format!(
            "encrypted length {} exceeds block of {} bytes",
            len,
            block.len()
        )));
    }

    let counter = LittleEndian::read_u32(&block[1..BLOCK_HEADER_SIZE]);
    let data = Bytes::copy_from_slice(&block[BLOCK_HEADER_SIZE..BLOCK_HEADER_SIZE + len]);
    Ok((counter, data))
}
