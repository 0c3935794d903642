//! Port traits: the hexagonal boundary between the beacon core and the
//! Bluetooth stack.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ AdvertisingDispatcher (domain)
//! ```
//!
//! Driven adapters (radio, identity, RNG, event sinks) implement these
//! traits. The dispatcher consumes them via generics at call sites, so the
//! domain core never touches the host stack directly.

use crate::error::RadioError;

// ───────────────────────────────────────────────────────────────
// Advertiser port (driven adapter: domain → radio)
// ───────────────────────────────────────────────────────────────

/// Bounded advertising burst: whichever limit is reached first ends it.
/// Zero disables a limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdvertiseParams {
    /// Duration in units of 10 ms.
    pub timeout_10ms: u16,
    /// Maximum number of advertising events.
    pub max_events: u8,
}

/// Non-connectable, non-scannable advertiser.
///
/// The adapter owns the underlying advertising set. Completion of a burst
/// is reported out of band through
/// [`BeaconHandle::notify_sent`](super::service::BeaconHandle::notify_sent).
pub trait AdvertiserPort {
    /// Whether the Bluetooth stack has finished enabling.
    fn is_ready(&self) -> bool;

    /// Create the advertising set. Called once, before the first send.
    fn create_advertiser(&mut self) -> Result<(), RadioError>;

    /// Replace the advertising data (complete AD records).
    fn set_data(&mut self, data: &[u8]) -> Result<(), RadioError>;

    /// Start one bounded burst.
    fn start(&mut self, params: AdvertiseParams) -> Result<(), RadioError>;
}

// ───────────────────────────────────────────────────────────────
// Identity port
// ───────────────────────────────────────────────────────────────

/// Source of the device's Bluetooth identity address.
pub trait IdentityPort {
    /// Identity address in controller order (least significant byte
    /// first), or `None` while it is not yet resolved.
    fn device_address(&self) -> Option<[u8; 6]>;
}

// ───────────────────────────────────────────────────────────────
// Random port
// ───────────────────────────────────────────────────────────────

/// Randomness for the replay-counter seed. Never used for key material.
pub trait RandomPort {
    /// Cryptographically secure value, or `None` if the source failed.
    fn secure_u32(&mut self) -> Option<u32>;

    /// Non-cryptographic fallback.
    fn fallback_u32(&mut self) -> u32;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port. Adapters decide where they go.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}
