//! Mock adapters for integration tests.
//!
//! The radio itself is the library's `SimAdvertiser`; these cover the
//! remaining ports and a few frame helpers.

use std::sync::mpsc;

use bthome_beacon::adapters::radio::SimAdvertiser;
use bthome_beacon::app::events::AppEvent;
use bthome_beacon::app::ports::{EventSink, RandomPort};
use bthome_beacon::app::service::{BeaconHandle, BeaconService};
use bthome_beacon::bthome::cipher::SoftwareCcm;
use bthome_beacon::config::BeaconConfig;

/// Bind key from the published BTHome encryption example.
pub const KEY: &str = "231d39c1d7cc1ab1aee224cd096db932";

// ── RecordingSink ─────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, pred: impl Fn(&AppEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(*event);
    }
}

// ── ChannelSink ───────────────────────────────────────────────

/// Forwards events out of the dispatcher thread.
pub struct ChannelSink(pub mpsc::Sender<AppEvent>);

impl EventSink for ChannelSink {
    fn emit(&mut self, event: &AppEvent) {
        let _ = self.0.send(*event);
    }
}

// ── FixedRng ──────────────────────────────────────────────────

pub struct FixedRng {
    pub secure: Option<u32>,
    pub fallback: u32,
}

impl FixedRng {
    pub fn secure(seed: u32) -> Self {
        Self {
            secure: Some(seed),
            fallback: 0,
        }
    }
}

impl RandomPort for FixedRng {
    fn secure_u32(&mut self) -> Option<u32> {
        self.secure
    }

    fn fallback_u32(&mut self) -> u32 {
        self.fallback
    }
}

// ── Builders ──────────────────────────────────────────────────

pub type SimService = BeaconService<SimAdvertiser, FixedRng, SoftwareCcm>;

pub fn plain_config(buttons: u8) -> BeaconConfig {
    BeaconConfig {
        button_count: buttons,
        ..BeaconConfig::default()
    }
}

pub fn encrypted_config(buttons: u8) -> BeaconConfig {
    BeaconConfig {
        button_count: buttons,
        encryption_key: Some(KEY.try_into().unwrap()),
        ..BeaconConfig::default()
    }
}

pub fn make_service(config: &BeaconConfig, radio: SimAdvertiser) -> (SimService, BeaconHandle) {
    BeaconService::new(config, radio, FixedRng::secure(41), SoftwareCcm).unwrap()
}

// ── Frame helpers ─────────────────────────────────────────────

/// Service data (from the UUID on) inside one advertising data block.
pub fn service_data(adv: &[u8]) -> &[u8] {
    assert_eq!(&adv[..3], &[0x02, 0x01, 0x06], "flags record first");
    assert_eq!(adv[4], 0x16, "service data record second");
    let len = adv[3] as usize;
    &adv[5..4 + len]
}
