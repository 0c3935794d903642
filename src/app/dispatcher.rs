//! Advertising dispatcher: the single consumer of the event queue.
//!
//! ```text
//!             create ok                 start ok
//!  Unarmed ─────────────▶ ArmedIdle ───────────────▶ Sending
//!     │ not ready            ▲  │ cipher / radio         │
//!     ▼ (event dropped)      │  ▼ failure (event lost)   │
//!  Unarmed                ArmedIdle ◀────────────────────┘
//!                                    transmission complete
//! ```
//!
//! Payload state is only touched outside `Sending`, so a burst in flight
//! always carries a fully rendered record. Events queued while sending
//! are coalesced: the next cycle renders the newest one.

use heapless::String;
use log::{debug, error, info, warn};

use crate::bthome::cipher::{Cipher, CcmEngine, SoftwareCcm};
use crate::bthome::payload::{EncryptedPayload, Payload, advertising_data};
use crate::config::{BeaconConfig, MAX_NAME_LEN};
use crate::error::{Error, Result};
use crate::events::{BatterySample, ButtonEvent, Inbox};

use super::events::{AppEvent, DropReason};
use super::ports::{AdvertiseParams, AdvertiserPort, EventSink, IdentityPort, RandomPort};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatcherState {
    /// No advertising set exists yet.
    Unarmed,
    /// Advertising set exists, nothing in flight.
    ArmedIdle,
    /// A burst is in flight.
    Sending,
}

/// Cipher, sealed frame and replay counter, present only when encrypting.
struct Encryption<E: CcmEngine> {
    cipher: Cipher<E>,
    frame: EncryptedPayload,
    replay_counter: u32,
}

pub struct AdvertisingDispatcher<E: CcmEngine = SoftwareCcm> {
    state: DispatcherState,
    payload: Payload,
    encryption: Option<Encryption<E>>,
    name: String<MAX_NAME_LEN>,
    params: AdvertiseParams,
}

impl<E: CcmEngine> AdvertisingDispatcher<E> {
    /// Build the dispatcher for `config`. Every configuration error
    /// surfaces here, before anything is advertised.
    pub fn new(config: &BeaconConfig, engine: E) -> Result<Self> {
        config.validate()?;
        let layout = config.layout()?;
        let encryption = config.key()?.map(|key| Encryption {
            cipher: Cipher::new(key, layout.device_info(), engine),
            frame: EncryptedPayload::new(&layout),
            replay_counter: 0,
        });

        Ok(Self {
            state: DispatcherState::Unarmed,
            payload: Payload::new(layout),
            encryption,
            name: config.device_name.clone(),
            params: config.advertise_params(),
        })
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn state(&self) -> DispatcherState {
        self.state
    }

    /// Plaintext record as last rendered.
    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// Last sealed frame, when encrypting.
    pub fn encrypted_frame(&self) -> Option<&EncryptedPayload> {
        self.encryption.as_ref().map(|enc| &enc.frame)
    }

    /// Replay counter used for the last encryption, when encrypting.
    pub fn replay_counter(&self) -> Option<u32> {
        self.encryption.as_ref().map(|enc| enc.replay_counter)
    }

    // ── Triggers ──────────────────────────────────────────────

    /// A producer pushed an event. Returns `true` if a burst started.
    pub fn on_button_queued<R>(
        &mut self,
        inbox: &Inbox,
        radio: &mut R,
        rng: &mut impl RandomPort,
        sink: &mut impl EventSink,
    ) -> bool
    where
        R: AdvertiserPort + IdentityPort,
    {
        if self.state == DispatcherState::Sending {
            debug!("Burst in flight; {} event(s) wait for completion", inbox.queue.len());
            return false;
        }
        self.drain_and_send(inbox, radio, rng, sink).unwrap_or(false)
    }

    /// The radio finished a burst. Returns `true` if a follow-up burst
    /// started for events queued meanwhile.
    pub fn on_transmission_complete<R>(
        &mut self,
        inbox: &Inbox,
        radio: &mut R,
        rng: &mut impl RandomPort,
        sink: &mut impl EventSink,
    ) -> bool
    where
        R: AdvertiserPort + IdentityPort,
    {
        if self.state == DispatcherState::Sending {
            self.state = DispatcherState::ArmedIdle;
            sink.emit(&AppEvent::AdvertisementCompleted);
        } else {
            warn!("Completion reported in {:?}; ignoring", self.state);
        }
        self.drain_and_send(inbox, radio, rng, sink).unwrap_or(false)
    }

    /// Drain the queue and advertise the newest event.
    ///
    /// `Ok(false)` when there was nothing to do or a burst is already in
    /// flight. Every error has already been reported through `sink` and
    /// the log; the events taken for the cycle are gone either way.
    pub fn drain_and_send<R>(
        &mut self,
        inbox: &Inbox,
        radio: &mut R,
        rng: &mut impl RandomPort,
        sink: &mut impl EventSink,
    ) -> Result<bool>
    where
        R: AdvertiserPort + IdentityPort,
    {
        if self.state == DispatcherState::Sending {
            return Ok(false);
        }

        let displaced = inbox.queue.take_dropped();
        if displaced > 0 {
            sink.emit(&AppEvent::EventDropped {
                count: displaced,
                reason: DropReason::QueueFull,
            });
        }

        let Some((event, taken)) = inbox.queue.drain_latest() else {
            return Ok(false);
        };
        if taken > 1 {
            debug!("Coalesced {} queued events into one advertisement", taken);
        }

        if let Err(e) = self.arm(radio, rng, sink) {
            if e == Error::NotReady {
                warn!("Bluetooth not ready; dropping {} event(s)", taken);
                sink.emit(&AppEvent::EventDropped {
                    count: taken as u32,
                    reason: DropReason::RadioNotReady,
                });
            } else {
                error!("Failed to arm advertiser: {}", e);
                sink.emit(&AppEvent::CycleAborted { reason: e });
            }
            return Err(e);
        }

        match self.send(event, inbox.battery.snapshot(), radio) {
            Ok(started) => {
                sink.emit(&started);
                Ok(true)
            }
            Err(e) => {
                error!("Advertising cycle aborted: {}", e);
                sink.emit(&AppEvent::CycleAborted { reason: e });
                Err(e)
            }
        }
    }

    // ── Internal ──────────────────────────────────────────────

    /// Create the advertising set on first use and key the cipher once the
    /// identity address is known.
    fn arm<R>(
        &mut self,
        radio: &mut R,
        rng: &mut impl RandomPort,
        sink: &mut impl EventSink,
    ) -> Result<()>
    where
        R: AdvertiserPort + IdentityPort,
    {
        if self.state == DispatcherState::Unarmed {
            if !radio.is_ready() {
                return Err(Error::NotReady);
            }
            radio.create_advertiser()?;
            self.state = DispatcherState::ArmedIdle;

            if let Some(enc) = self.encryption.as_mut() {
                enc.replay_counter = seed_replay_counter(rng);
            }
            info!("BTHome advertiser created");
            sink.emit(&AppEvent::Armed {
                encrypted: self.encryption.is_some(),
            });
        }

        if let Some(enc) = self.encryption.as_mut() {
            if !enc.cipher.is_initialised() {
                let address = radio.device_address().ok_or(Error::DeviceUnavailable)?;
                enc.cipher.init(&address);
                debug!("BTHome cipher keyed to identity address");
            }
        }
        Ok(())
    }

    /// Render `event`, seal it if encrypting, and start a burst.
    fn send<R>(&mut self, event: ButtonEvent, battery: BatterySample, radio: &mut R) -> Result<AppEvent>
    where
        R: AdvertiserPort,
    {
        self.payload.apply_battery_level(battery.level_pct);
        self.payload.apply_battery_voltage(battery.voltage_mv);
        self.payload.clear_buttons();
        self.payload.apply_button(event.index, event.code)?;
        self.payload.bump_packet_id();

        let (service_data, replay_counter) = match self.encryption.as_mut() {
            Some(enc) => {
                enc.replay_counter = enc.replay_counter.wrapping_add(1);
                let sealed = enc.cipher.encrypt(&self.payload.content(), enc.replay_counter)?;
                enc.frame
                    .seal(&sealed.ciphertext, enc.replay_counter, sealed.mic)?;
                (enc.frame.encode(), Some(enc.replay_counter))
            }
            None => (self.payload.encode(), None),
        };

        let adv = advertising_data(&service_data, &self.name)?;
        radio.set_data(&adv)?;
        radio.start(self.params)?;
        self.state = DispatcherState::Sending;

        debug!(
            "Advertising packet {} ({} bytes, button {} = {})",
            self.payload.packet_id(),
            adv.len(),
            event.index,
            event.code
        );
        Ok(AppEvent::AdvertisementStarted {
            packet_id: self.payload.packet_id(),
            replay_counter,
            len: adv.len(),
        })
    }
}

/// Secure seed for the replay counter, falling back to a weak source.
fn seed_replay_counter(rng: &mut impl RandomPort) -> u32 {
    match rng.secure_u32() {
        Some(seed) => seed,
        None => {
            warn!("Secure RNG unavailable; seeding replay counter from fallback");
            rng.fallback_u32()
        }
    }
}
