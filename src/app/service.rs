//! Beacon service: the owned advertising context.
//!
//! [`BeaconService`] owns the dispatcher and the radio adapters and runs in
//! exactly one task. [`BeaconHandle`]s are cheap clones handed to every
//! producer and to the radio's completion callback; they only ever touch
//! the shared [`Inbox`].
//!
//! ```text
//!  buttons ──┐                          ┌───────────────────────┐
//!  battery ──┼─▶ BeaconHandle ─▶ Inbox ─▶│ BeaconService         │──▶ AdvertiserPort
//!  on_sent ──┘                          │ AdvertisingDispatcher │──▶ EventSink
//!                                       └───────────────────────┘
//! ```
//!
//! One radio exists, so one service is built at startup and lives for the
//! rest of the program.

use std::sync::Arc;

use log::{debug, warn};

use crate::bthome::ButtonCode;
use crate::bthome::cipher::{CcmEngine, SoftwareCcm};
use crate::config::BeaconConfig;
use crate::error::Result;
use crate::events::{ButtonEvent, Inbox, Pushed};

use super::dispatcher::AdvertisingDispatcher;
use super::ports::{AdvertiserPort, EventSink, IdentityPort, RandomPort};

// ───────────────────────────────────────────────────────────────
// BeaconService
// ───────────────────────────────────────────────────────────────

pub struct BeaconService<R, G, E = SoftwareCcm>
where
    R: AdvertiserPort + IdentityPort,
    G: RandomPort,
    E: CcmEngine,
{
    dispatcher: AdvertisingDispatcher<E>,
    inbox: Arc<Inbox>,
    radio: R,
    rng: G,
}

impl<R, G, E> BeaconService<R, G, E>
where
    R: AdvertiserPort + IdentityPort,
    G: RandomPort,
    E: CcmEngine,
{
    /// Validate `config` and build the service plus its first producer
    /// handle.
    pub fn new(config: &BeaconConfig, radio: R, rng: G, engine: E) -> Result<(Self, BeaconHandle)> {
        let dispatcher = AdvertisingDispatcher::new(config, engine)?;
        let inbox = Arc::new(Inbox::new(config.button_count));
        let handle = BeaconHandle {
            inbox: Arc::clone(&inbox),
        };
        Ok((
            Self {
                dispatcher,
                inbox,
                radio,
                rng,
            },
            handle,
        ))
    }

    pub fn handle(&self) -> BeaconHandle {
        BeaconHandle {
            inbox: Arc::clone(&self.inbox),
        }
    }

    pub fn dispatcher(&self) -> &AdvertisingDispatcher<E> {
        &self.dispatcher
    }

    pub fn radio(&self) -> &R {
        &self.radio
    }

    pub fn radio_mut(&mut self) -> &mut R {
        &mut self.radio
    }

    /// Handle whatever is pending without blocking. Returns `true` if a
    /// burst was started.
    pub fn poll(&mut self, sink: &mut impl EventSink) -> bool {
        self.inbox.doorbell.try_take();
        if self.inbox.doorbell.take_sent() {
            self.dispatcher
                .on_transmission_complete(&self.inbox, &mut self.radio, &mut self.rng, sink)
        } else {
            self.dispatcher
                .on_button_queued(&self.inbox, &mut self.radio, &mut self.rng, sink)
        }
    }

    /// Serve the inbox forever. Drive it from a dedicated executor thread.
    pub async fn run(&mut self, sink: &mut impl EventSink) {
        loop {
            self.inbox.doorbell.wait().await;
            self.poll(sink);
        }
    }
}

// ───────────────────────────────────────────────────────────────
// BeaconHandle
// ───────────────────────────────────────────────────────────────

/// Producer side of the beacon. `Send + Sync`; clone freely.
#[derive(Clone)]
pub struct BeaconHandle {
    inbox: Arc<Inbox>,
}

impl BeaconHandle {
    /// Queue a button transition for advertisement.
    ///
    /// Fails with [`InvalidArgument`](crate::Error::InvalidArgument) if
    /// `index` is outside the configured buttons and `code` is not `None`.
    /// A full queue is not an error: the oldest pending event is dropped
    /// instead.
    pub fn queue_button_event(&self, index: u8, code: ButtonCode) -> Result<()> {
        self.submit(ButtonEvent::new(index, code))
    }

    fn submit(&self, event: ButtonEvent) -> Result<()> {
        match self.inbox.submit(event)? {
            Pushed::Queued => {}
            Pushed::DisplacedOldest(old) => {
                warn!("Event queue full; dropped button {} = {}", old.index, old.code);
            }
        }
        Ok(())
    }

    /// As [`queue_button_event`](Self::queue_button_event), for a raw
    /// BTHome event value.
    pub fn queue_raw_button_event(&self, index: u8, raw_code: u8) -> Result<()> {
        let code = ButtonCode::try_from(raw_code)?;
        self.queue_button_event(index, code)
    }

    /// Stage a new state of charge. Readings above 100 % are clamped.
    /// Takes effect on the next advertisement.
    pub fn update_battery_level(&self, pct: u8) {
        if pct > 100 {
            debug!("Battery level {} % clamped to 100 %", pct);
        }
        self.inbox.battery.store_level(pct.min(100));
    }

    /// Stage a new battery voltage. Takes effect on the next advertisement.
    pub fn update_battery_voltage(&self, mv: u16) {
        self.inbox.battery.store_voltage(mv);
    }

    /// Stage a battery reading and advertise it.
    ///
    /// `voltage_mv` is `None` when the sensor read failed; the last known
    /// voltage is advertised in that case.
    pub fn update_battery(&self, pct: u8, voltage_mv: Option<u16>) -> Result<()> {
        self.update_battery_level(pct);
        match voltage_mv {
            Some(mv) => self.update_battery_voltage(mv),
            None => debug!("No voltage sample; advertising last known value"),
        }
        self.submit(ButtonEvent::battery_refresh())
    }

    /// Transport completion callback: the current burst has ended.
    pub fn notify_sent(&self) {
        self.inbox.doorbell.ring_sent();
    }

    /// Events waiting for the dispatcher.
    pub fn pending(&self) -> usize {
        self.inbox.queue.len()
    }
}
