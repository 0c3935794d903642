//! Producer → dispatcher hand-off.
//!
//! Button and battery producers run in whatever context the board wires
//! them to (GPIO callbacks, a sensor polling thread, the shell). The
//! dispatcher runs alone in one task. Everything that crosses that
//! boundary lives here:
//!
//! ```text
//! ┌──────────────┐  push   ┌──────────────┐
//! │ button input │────────▶│  EventQueue  │──┐
//! └──────────────┘         │ (16, oldest  │  │
//! ┌──────────────┐  store  │  dropped)    │  │  drain   ┌──────────────┐
//! │ battery poll │───┐     └──────────────┘  ├─────────▶│  Dispatcher  │
//! └──────────────┘   │     ┌──────────────┐  │          │ (single task)│
//!                    └────▶│BatteryMailbox│──┘          └──────────────┘
//! ┌──────────────┐ ring    ┌──────────────┐  wake              ▲
//! │ radio "sent" │────────▶│   Doorbell   │────────────────────┘
//! └──────────────┘         └──────────────┘
//! ```
//!
//! A successful [`EventQueue::push`] happens-before the [`EventQueue::pop`]
//! that returns it: both go through the channel's critical section.

use core::sync::atomic::{AtomicBool, AtomicU8, AtomicU16, AtomicU32, Ordering};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Channel, TrySendError};
use embassy_sync::signal::Signal;

use crate::bthome::ButtonCode;
use crate::error::{Error, Result};

/// Maximum number of pending button events.
pub const EVENT_QUEUE_CAP: usize = 16;

// ───────────────────────────────────────────────────────────────
// Button events
// ───────────────────────────────────────────────────────────────

/// One logical button transition, or a battery-only refresh when `code`
/// is [`ButtonCode::None`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ButtonEvent {
    pub index: u8,
    pub code: ButtonCode,
}

impl ButtonEvent {
    pub const fn new(index: u8, code: ButtonCode) -> Self {
        Self { index, code }
    }

    /// Event pushed by the battery path: re-advertise, no button changed.
    pub const fn battery_refresh() -> Self {
        Self {
            index: 0,
            code: ButtonCode::None,
        }
    }
}

/// Result of a push that had to make room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pushed {
    Queued,
    /// The queue was full; this event was discarded to make room.
    DisplacedOldest(ButtonEvent),
}

// ───────────────────────────────────────────────────────────────
// Event queue (MPSC, bounded, drop-oldest)
// ───────────────────────────────────────────────────────────────

/// Bounded FIFO shared by every producer and the single dispatcher.
pub struct EventQueue {
    channel: Channel<CriticalSectionRawMutex, ButtonEvent, EVENT_QUEUE_CAP>,
    dropped: AtomicU32,
}

impl EventQueue {
    pub const fn new() -> Self {
        Self {
            channel: Channel::new(),
            dropped: AtomicU32::new(0),
        }
    }

    /// Enqueue without blocking. On overflow the oldest event is dropped
    /// and the insert retried once.
    ///
    /// The drop and the retry share one critical section, so a concurrent
    /// producer cannot steal the freed slot.
    pub fn push(&self, event: ButtonEvent) -> Result<Pushed> {
        critical_section::with(|_| match self.channel.try_send(event) {
            Ok(()) => Ok(Pushed::Queued),
            Err(TrySendError::Full(event)) => {
                let oldest = self.channel.try_receive().ok();
                self.channel
                    .try_send(event)
                    .map_err(|_| Error::QueueInvariant)?;
                self.dropped.fetch_add(1, Ordering::Relaxed);
                Ok(oldest.map_or(Pushed::Queued, Pushed::DisplacedOldest))
            }
        })
    }

    /// Dequeue the oldest event, if any. Never blocks.
    pub fn pop(&self) -> Option<ButtonEvent> {
        self.channel.try_receive().ok()
    }

    /// Empty the queue and return the newest event together with how many
    /// events were taken in total.
    pub fn drain_latest(&self) -> Option<(ButtonEvent, usize)> {
        let mut latest = self.pop()?;
        let mut taken = 1;
        while let Some(event) = self.pop() {
            latest = event;
            taken += 1;
        }
        Some((latest, taken))
    }

    pub fn len(&self) -> usize {
        self.channel.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channel.is_empty()
    }

    /// Overflow drops since the last call.
    pub fn take_dropped(&self) -> u32 {
        self.dropped.swap(0, Ordering::Relaxed)
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

// ───────────────────────────────────────────────────────────────
// Battery mailbox
// ───────────────────────────────────────────────────────────────

/// Latest battery readings, as the dispatcher should render them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BatterySample {
    pub level_pct: u8,
    pub voltage_mv: u16,
}

/// Last-writer-wins battery staging area. Producers store, the dispatcher
/// copies into the payload between transmissions.
pub struct BatteryMailbox {
    level_pct: AtomicU8,
    voltage_mv: AtomicU16,
}

impl BatteryMailbox {
    pub const fn new() -> Self {
        Self {
            level_pct: AtomicU8::new(0),
            voltage_mv: AtomicU16::new(0),
        }
    }

    pub fn store_level(&self, pct: u8) {
        self.level_pct.store(pct, Ordering::Relaxed);
    }

    pub fn store_voltage(&self, mv: u16) {
        self.voltage_mv.store(mv, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> BatterySample {
        BatterySample {
            level_pct: self.level_pct.load(Ordering::Relaxed),
            voltage_mv: self.voltage_mv.load(Ordering::Relaxed),
        }
    }
}

impl Default for BatteryMailbox {
    fn default() -> Self {
        Self::new()
    }
}

// ───────────────────────────────────────────────────────────────
// Doorbell
// ───────────────────────────────────────────────────────────────

/// Wakes the dispatcher task. Rings coalesce; the "sent" flag records a
/// transport completion separately so it is never mistaken for a push.
pub struct Doorbell {
    signal: Signal<CriticalSectionRawMutex, ()>,
    sent: AtomicBool,
}

impl Doorbell {
    pub const fn new() -> Self {
        Self {
            signal: Signal::new(),
            sent: AtomicBool::new(false),
        }
    }

    pub fn ring(&self) {
        self.signal.signal(());
    }

    /// Record a transmission completion and wake the dispatcher.
    pub fn ring_sent(&self) {
        self.sent.store(true, Ordering::Release);
        self.signal.signal(());
    }

    /// Consume a pending completion, if one was recorded.
    pub fn take_sent(&self) -> bool {
        self.sent.swap(false, Ordering::Acquire)
    }

    /// Consume a pending ring without waiting.
    pub fn try_take(&self) -> bool {
        self.signal.try_take().is_some()
    }

    pub async fn wait(&self) {
        self.signal.wait().await;
    }
}

impl Default for Doorbell {
    fn default() -> Self {
        Self::new()
    }
}

// ───────────────────────────────────────────────────────────────
// Inbox
// ───────────────────────────────────────────────────────────────

/// Everything producers may touch, bundled for sharing behind an `Arc`.
pub struct Inbox {
    pub queue: EventQueue,
    pub battery: BatteryMailbox,
    pub doorbell: Doorbell,
    button_count: u8,
}

impl Inbox {
    pub const fn new(button_count: u8) -> Self {
        Self {
            queue: EventQueue::new(),
            battery: BatteryMailbox::new(),
            doorbell: Doorbell::new(),
            button_count,
        }
    }

    pub const fn button_count(&self) -> u8 {
        self.button_count
    }

    /// Validate against the configured button count, enqueue, and wake
    /// the dispatcher. `None` is accepted for any index.
    pub fn submit(&self, event: ButtonEvent) -> Result<Pushed> {
        if !event.code.is_none() && event.index >= self.button_count {
            return Err(Error::InvalidArgument("button index out of range"));
        }
        let pushed = self.queue.push(event)?;
        self.doorbell.ring();
        Ok(pushed)
    }
}
