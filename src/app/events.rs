//! Outbound application events.
//!
//! The [`AdvertisingDispatcher`](super::dispatcher::AdvertisingDispatcher)
//! emits these through the [`EventSink`](super::ports::EventSink) port.
//! Adapters on the other side decide what to do with them.

use core::fmt;

use crate::error::Error;

/// Structured events emitted by the beacon core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEvent {
    /// The advertiser exists (and, when encrypting, the cipher is keyed).
    Armed { encrypted: bool },

    /// A burst was handed to the radio.
    AdvertisementStarted {
        packet_id: u8,
        /// `Some` only for encrypted frames.
        replay_counter: Option<u32>,
        /// Advertising data length in bytes.
        len: usize,
    },

    /// The radio reported the burst finished.
    AdvertisementCompleted,

    /// Events discarded without being advertised.
    EventDropped { count: u32, reason: DropReason },

    /// A send cycle was abandoned; its event was consumed.
    CycleAborted { reason: Error },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Displaced by a newer event while the queue was full.
    QueueFull,
    /// The Bluetooth stack was not ready to create the advertiser.
    RadioNotReady,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::QueueFull => write!(f, "queue full"),
            Self::RadioNotReady => write!(f, "radio not ready"),
        }
    }
}
