//! BTHome v2 AES-128-CCM encryption.
//!
//! Nonce layout (13 bytes):
//!
//! ```text
//! ┌────────────────────────┬──────────┬─────────────┬──────────────────┐
//! │ BLE address (6B, MSB   │ UUID (2B)│ dev info(1B)│ replay ctr (4B LE)│
//! │ first)                 │ d2 fc    │             │                  │
//! └────────────────────────┴──────────┴─────────────┴──────────────────┘
//! ```
//!
//! UUID and device info are fixed by [`Cipher::new`], the address by
//! [`Cipher::init`]; each [`Cipher::encrypt`] overwrites only the counter
//! slot. CCM runs with
//! a 4-byte tag and no associated data.
//!
//! The block cipher sits behind [`CcmEngine`] so a hardware AES peripheral
//! can replace [`SoftwareCcm`] (RustCrypto `aes` + `ccm`).

use core::fmt;

use aes::Aes128;
use ccm::Ccm;
use ccm::aead::consts::{U4, U13};
use ccm::aead::generic_array::GenericArray;
use ccm::aead::{AeadInPlace, KeyInit};
use heapless::Vec;
use log::{debug, error, warn};
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::payload::MAX_CONTENT_LEN;
use super::{MIC_LEN, SERVICE_UUID};
use crate::error::{CryptoError, Error, Result};

pub const KEY_LEN: usize = 16;
pub const KEY_HEX_LEN: usize = 2 * KEY_LEN;
pub const NONCE_LEN: usize = 13;
pub const ADDRESS_LEN: usize = 6;

const COUNTER_OFFSET: usize = 9;

type Aes128Ccm = Ccm<Aes128, U4, U13>;

// ───────────────────────────────────────────────────────────────
// Key
// ───────────────────────────────────────────────────────────────

/// 128-bit bind key, wiped from memory on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct EncryptionKey([u8; KEY_LEN]);

impl EncryptionKey {
    /// Decode the 32-character hex configuration value.
    ///
    /// A malformed key is a configuration error; there is no fallback key.
    pub fn from_hex(hex_key: &str) -> Result<Self> {
        if hex_key.len() != KEY_HEX_LEN {
            return Err(Error::Config("encryption key must be 32 hex characters"));
        }
        let mut key = [0u8; KEY_LEN];
        if hex::decode_to_slice(hex_key, &mut key).is_err() {
            key.zeroize();
            return Err(Error::Config("encryption key is not valid hex"));
        }
        debug!("BTHome encryption key loaded");
        Ok(Self(key))
    }

    pub fn from_bytes(key: [u8; KEY_LEN]) -> Self {
        Self(key)
    }

    pub(crate) fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EncryptionKey(<redacted>)")
    }
}

// ───────────────────────────────────────────────────────────────
// Engine port
// ───────────────────────────────────────────────────────────────

/// AES-128-CCM primitive (13-byte nonce, 4-byte tag, no AAD).
pub trait CcmEngine {
    /// `false` when the backing peripheral is absent or not initialised.
    fn is_ready(&self) -> bool {
        true
    }

    /// Encrypt `buf` in place and return the MIC.
    fn seal(
        &mut self,
        key: &[u8; KEY_LEN],
        nonce: &[u8; NONCE_LEN],
        buf: &mut [u8],
    ) -> core::result::Result<[u8; MIC_LEN], CryptoError>;

    /// Verify `mic` and decrypt `buf` in place.
    fn open(
        &mut self,
        key: &[u8; KEY_LEN],
        nonce: &[u8; NONCE_LEN],
        buf: &mut [u8],
        mic: &[u8; MIC_LEN],
    ) -> core::result::Result<(), CryptoError>;
}

/// Pure-Rust engine, identical on ESP-IDF and host targets.
#[derive(Debug, Default, Clone, Copy)]
pub struct SoftwareCcm;

impl CcmEngine for SoftwareCcm {
    fn seal(
        &mut self,
        key: &[u8; KEY_LEN],
        nonce: &[u8; NONCE_LEN],
        buf: &mut [u8],
    ) -> core::result::Result<[u8; MIC_LEN], CryptoError> {
        let cipher = Aes128Ccm::new_from_slice(key).map_err(|_| CryptoError::SessionFailed)?;
        let tag = cipher
            .encrypt_in_place_detached(GenericArray::from_slice(nonce), &[], buf)
            .map_err(|_| CryptoError::EncryptFailed)?;
        let mut mic = [0u8; MIC_LEN];
        mic.copy_from_slice(&tag);
        Ok(mic)
    }

    fn open(
        &mut self,
        key: &[u8; KEY_LEN],
        nonce: &[u8; NONCE_LEN],
        buf: &mut [u8],
        mic: &[u8; MIC_LEN],
    ) -> core::result::Result<(), CryptoError> {
        let cipher = Aes128Ccm::new_from_slice(key).map_err(|_| CryptoError::SessionFailed)?;
        cipher
            .decrypt_in_place_detached(
                GenericArray::from_slice(nonce),
                &[],
                buf,
                GenericArray::from_slice(mic),
            )
            .map_err(|_| CryptoError::AuthenticationFailed)
    }
}

// ───────────────────────────────────────────────────────────────
// Cipher
// ───────────────────────────────────────────────────────────────

/// Output of one encryption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sealed {
    pub ciphertext: Vec<u8, MAX_CONTENT_LEN>,
    pub mic: [u8; MIC_LEN],
}

/// Key + nonce template for one device identity.
pub struct Cipher<E: CcmEngine = SoftwareCcm> {
    key: EncryptionKey,
    nonce: [u8; NONCE_LEN],
    initialised: bool,
    engine: E,
}

impl<E: CcmEngine> Cipher<E> {
    /// Prepare the nonce template. The address prefix is filled by
    /// [`init`](Self::init) once the Bluetooth identity is known.
    pub fn new(key: EncryptionKey, device_info: u8, engine: E) -> Self {
        let mut nonce = [0u8; NONCE_LEN];
        nonce[6..8].copy_from_slice(&SERVICE_UUID.to_le_bytes());
        nonce[8] = device_info;
        Self {
            key,
            nonce,
            initialised: false,
            engine,
        }
    }

    /// Install the device address.
    ///
    /// `address` is in controller order (least significant byte first);
    /// the nonce carries it reversed.
    pub fn init(&mut self, address: &[u8; ADDRESS_LEN]) {
        if !self.engine.is_ready() {
            warn!("Crypto engine not ready; BTHome encryption will fail until it is");
        }
        for (slot, byte) in self.nonce[..ADDRESS_LEN].iter_mut().zip(address.iter().rev()) {
            *slot = *byte;
        }
        self.initialised = true;
    }

    pub fn is_initialised(&self) -> bool {
        self.initialised
    }

    /// Current nonce (counter slot holds the last counter used).
    pub fn nonce(&self) -> &[u8; NONCE_LEN] {
        &self.nonce
    }

    /// Encrypt one object region under `replay_counter`.
    pub fn encrypt(&mut self, plaintext: &[u8], replay_counter: u32) -> Result<Sealed> {
        self.ensure_ready()?;
        let mut ciphertext = Vec::<u8, MAX_CONTENT_LEN>::from_slice(plaintext)
            .map_err(|()| Error::InvalidArgument("plaintext exceeds payload budget"))?;

        self.set_counter(replay_counter);
        let mic = self
            .engine
            .seal(self.key.as_bytes(), &self.nonce, &mut ciphertext)
            .inspect_err(|e| error!("BTHome encrypt failed: {}", e))?;
        Ok(Sealed { ciphertext, mic })
    }

    /// Verify and decrypt a frame produced under this identity.
    pub fn decrypt(
        &mut self,
        ciphertext: &[u8],
        replay_counter: u32,
        mic: &[u8; MIC_LEN],
    ) -> Result<Vec<u8, MAX_CONTENT_LEN>> {
        self.ensure_ready()?;
        let mut plaintext = Vec::<u8, MAX_CONTENT_LEN>::from_slice(ciphertext)
            .map_err(|()| Error::InvalidArgument("ciphertext exceeds payload budget"))?;

        self.set_counter(replay_counter);
        self.engine
            .open(self.key.as_bytes(), &self.nonce, &mut plaintext, mic)?;
        Ok(plaintext)
    }

    fn ensure_ready(&self) -> Result<()> {
        if !self.initialised {
            return Err(Error::NotReady);
        }
        if !self.engine.is_ready() {
            error!("Crypto engine not ready");
            return Err(Error::DeviceUnavailable);
        }
        Ok(())
    }

    fn set_counter(&mut self, counter: u32) {
        self.nonce[COUNTER_OFFSET..].copy_from_slice(&counter.to_le_bytes());
    }
}
