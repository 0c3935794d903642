//! BTHome beacon firmware: main entry point.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  EspAdvertiser        SystemRandom     LogEventSink            │
//! │  (Advertiser+Identity) (RandomPort)    (EventSink)             │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │   BeaconService ─ AdvertisingDispatcher (one task)     │    │
//! │  │   Payload · Cipher · EventQueue                        │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  input task (GestureDetector) ──▶ BeaconHandle                 │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use std::time::{Duration, Instant};

use anyhow::Result;
use log::{info, warn};

use esp_idf_svc::hal::gpio::{Gpio9, Input, PinDriver, Pull};
use esp_idf_svc::hal::peripherals::Peripherals;
use esp_idf_svc::nvs::EspDefaultNvsPartition;

use bthome_beacon::adapters::identity;
use bthome_beacon::adapters::log_sink::LogEventSink;
use bthome_beacon::adapters::radio::{self, EspAdvertiser};
use bthome_beacon::adapters::rng::SystemRandom;
use bthome_beacon::app::service::{BeaconHandle, BeaconService};
use bthome_beacon::bthome::ButtonCode;
use bthome_beacon::bthome::cipher::SoftwareCcm;
use bthome_beacon::config::BeaconConfig;
use bthome_beacon::drivers::button::GestureDetector;
use bthome_beacon::drivers::task_pin::{self, TaskSpec};
use bthome_beacon::task;

const BUTTON_POLL: Duration = Duration::from_millis(10);

// ── Input task ────────────────────────────────────────────────

/// Sample the BOOT button (active low) and report gestures as button 0.
fn run_input(pin: PinDriver<'static, Gpio9, Input>, handle: BeaconHandle) {
    let start = Instant::now();
    let mut detector = GestureDetector::new();
    loop {
        std::thread::sleep(BUTTON_POLL);
        let now_ms = start.elapsed().as_millis() as u32;
        if let Some(code) = detector.update(pin.is_low(), now_ms) {
            info!("Button 0: {}", code);
            if let Err(e) = handle.queue_button_event(0, code) {
                warn!("Button event rejected: {}", e);
            }
        }
    }
}

// ── Main ──────────────────────────────────────────────────────

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  BTHome beacon v{}                   ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 2. Build-time configuration ───────────────────────────
    let mut config = BeaconConfig::from_build_env()?;
    if config.device_name.is_empty() {
        if let Some(mac) = identity::read_bt_mac() {
            let named = BeaconConfig {
                device_name: identity::default_name(&mac),
                ..config.clone()
            };
            // Only advertise a name when the payload leaves room for it.
            if named.validate().is_ok() {
                config = named;
            }
        }
    }
    info!(
        "Config: name='{}' buttons={} battery={} voltage={:?} encrypted={}",
        config.device_name,
        config.button_count,
        config.battery_level,
        config.battery_voltage,
        config.encrypted()
    );

    // ── 3. Bluetooth + beacon service ─────────────────────────
    let peripherals = Peripherals::take()?;
    let nvs = EspDefaultNvsPartition::take()?;
    let _bt = radio::start_bluetooth(peripherals.modem, Some(nvs))?;
    let (service, handle) =
        BeaconService::new(&config, EspAdvertiser::new(), SystemRandom::new(), SoftwareCcm)?;
    if !radio::install_completion_hook(handle.clone()) {
        warn!("Completion hook already installed");
    }
    let _dispatcher = task::spawn(service, LogEventSink::new())?;

    // ── 4. Producers ──────────────────────────────────────────
    if config.button_count > 0 {
        let mut pin = PinDriver::input(peripherals.pins.gpio9)?;
        pin.set_pull(Pull::Up)?;
        let input_handle = handle.clone();
        task_pin::spawn_task(TaskSpec::BUTTON_INPUT, move || run_input(pin, input_handle))?;
    }

    // Announce once so listeners discover the device before any press.
    handle.queue_button_event(0, ButtonCode::None)?;

    info!("System ready.");
    loop {
        std::thread::sleep(Duration::from_secs(60));
    }
}
