//! Unified error types for the beacon firmware.
//!
//! A single `Error` enum that every subsystem converts into, keeping the
//! dispatcher's failure handling uniform. All variants are `Copy` so they
//! can be logged, emitted as events, and returned to producers without
//! allocation.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible operation in the firmware funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Caller supplied a value outside the configured domain
    /// (button index for a non-`None` code, unrecognised button code).
    InvalidArgument(&'static str),
    /// The Bluetooth stack, or the cipher, has not been initialised yet.
    NotReady,
    /// A hardware collaborator (crypto engine, identity address) is absent.
    DeviceUnavailable,
    /// The AES-CCM session failed.
    Crypto(CryptoError),
    /// The advertising transport rejected a request.
    Radio(RadioError),
    /// A received frame could not be parsed.
    Decode(DecodeError),
    /// Configuration is invalid. Raised at construction time only.
    Config(&'static str),
    /// The drop-oldest retry could not insert into the event queue.
    QueueInvariant,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArgument(msg) => write!(f, "invalid argument: {msg}"),
            Self::NotReady => write!(f, "not ready"),
            Self::DeviceUnavailable => write!(f, "device unavailable"),
            Self::Crypto(e) => write!(f, "crypto: {e}"),
            Self::Radio(e) => write!(f, "radio: {e}"),
            Self::Decode(e) => write!(f, "decode: {e}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::QueueInvariant => write!(f, "event queue rejected insert after drop-oldest"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Crypto errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CryptoError {
    /// The engine refused to open a CCM session (bad key/nonce/tag length).
    SessionFailed,
    /// The CCM operation itself failed (buffer too large, engine fault).
    EncryptFailed,
    /// The message integrity check did not verify.
    AuthenticationFailed,
}

impl fmt::Display for CryptoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SessionFailed => write!(f, "cipher session failed"),
            Self::EncryptFailed => write!(f, "encrypt failed"),
            Self::AuthenticationFailed => write!(f, "MIC verification failed"),
        }
    }
}

impl std::error::Error for CryptoError {}

impl From<CryptoError> for Error {
    fn from(e: CryptoError) -> Self {
        Self::Crypto(e)
    }
}

// ---------------------------------------------------------------------------
// Radio errors
// ---------------------------------------------------------------------------

/// Errors surfaced by an [`AdvertiserPort`](crate::app::ports::AdvertiserPort).
/// The `i32` payloads carry the host stack's native error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioError {
    /// Bluetooth is not enabled yet.
    NotReady,
    CreateFailed(i32),
    SetDataFailed(i32),
    StartFailed(i32),
}

impl fmt::Display for RadioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotReady => write!(f, "bluetooth not ready"),
            Self::CreateFailed(rc) => write!(f, "advertiser create failed ({rc})"),
            Self::SetDataFailed(rc) => write!(f, "set advertising data failed ({rc})"),
            Self::StartFailed(rc) => write!(f, "advertising start failed ({rc})"),
        }
    }
}

impl std::error::Error for RadioError {}

impl From<RadioError> for Error {
    fn from(e: RadioError) -> Self {
        match e {
            RadioError::NotReady => Self::NotReady,
            other => Self::Radio(other),
        }
    }
}

// ---------------------------------------------------------------------------
// Decode errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// Frame shorter than its header or an object's value.
    Truncated,
    /// Service UUID is not 0xFCD2.
    WrongUuid,
    /// Device-info version bits are not 2.
    UnsupportedVersion,
    /// Object id this decoder does not know.
    UnknownObject(u8),
    /// A known object carried a value outside its domain.
    InvalidValue(u8),
    /// More objects than the decoder has room for.
    TooManyObjects,
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Truncated => write!(f, "frame truncated"),
            Self::WrongUuid => write!(f, "not a BTHome service UUID"),
            Self::UnsupportedVersion => write!(f, "unsupported BTHome version"),
            Self::UnknownObject(id) => write!(f, "unknown object id 0x{id:02X}"),
            Self::InvalidValue(id) => write!(f, "invalid value for object 0x{id:02X}"),
            Self::TooManyObjects => write!(f, "too many objects"),
        }
    }
}

impl std::error::Error for DecodeError {}

impl From<DecodeError> for Error {
    fn from(e: DecodeError) -> Self {
        Self::Decode(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
