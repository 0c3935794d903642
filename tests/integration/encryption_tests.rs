//! Integration tests for encrypted advertising: what a listener holding
//! the bind key recovers from the frames on air.

use bthome_beacon::adapters::radio::SimAdvertiser;
use bthome_beacon::app::dispatcher::DispatcherState;
use bthome_beacon::app::events::AppEvent;
use bthome_beacon::app::service::BeaconService;
use bthome_beacon::bthome::cipher::{Cipher, EncryptionKey, SoftwareCcm};
use bthome_beacon::bthome::payload::{DecodedFrame, DecodedObjects, decode, decode_objects};
use bthome_beacon::bthome::replay::ReplayGuard;
use bthome_beacon::bthome::{ButtonCode, VoltageResolution};
use bthome_beacon::error::Error;

use crate::mocks::{FixedRng, KEY, RecordingSink, encrypted_config, make_service, service_data};

/// Address from the published BTHome example, controller order.
const EXAMPLE_ADDRESS: [u8; 6] = [0xA5, 0x80, 0x8F, 0xE6, 0x48, 0x54];

struct Listener {
    cipher: Cipher,
    guard: ReplayGuard,
}

impl Listener {
    fn new(address: [u8; 6]) -> Self {
        let mut cipher = Cipher::new(EncryptionKey::from_hex(KEY).unwrap(), 0x45, SoftwareCcm);
        cipher.init(&address);
        Self {
            cipher,
            guard: ReplayGuard::new(),
        }
    }

    /// Decrypt one advertising data block. `None` if it is a replay.
    fn receive(&mut self, adv: &[u8]) -> Option<(u32, DecodedObjects)> {
        let DecodedFrame::Encrypted {
            device_info,
            ciphertext,
            counter,
            mic,
        } = decode(service_data(adv)).unwrap()
        else {
            panic!("expected encrypted frame");
        };
        assert_eq!(device_info, 0x45);
        let plain = self.cipher.decrypt(&ciphertext, counter, &mic).unwrap();
        if !self.guard.accept(counter) {
            return None;
        }
        Some((counter, decode_objects(&plain).unwrap()))
    }
}

fn radio_at(address: [u8; 6]) -> SimAdvertiser {
    SimAdvertiser::with_address(Some(address))
}

#[test]
fn encrypted_frame_matches_known_answer() {
    let mut config = encrypted_config(2);
    config.battery_voltage = Some(VoltageResolution::Thousandth);
    let (mut service, handle) = BeaconService::new(
        &config,
        radio_at(EXAMPLE_ADDRESS),
        FixedRng::secure(6),
        SoftwareCcm,
    )
    .unwrap();
    let mut sink = RecordingSink::new();

    handle.update_battery_level(100);
    handle.update_battery_voltage(3_300);
    handle.queue_button_event(0, ButtonCode::Press).unwrap();
    assert!(service.poll(&mut sink));

    let sd = service_data(service.radio().last_data().unwrap());
    assert_eq!(
        sd,
        &[
            0xD2, 0xFC, 0x45, // uuid + device info
            0xDE, 0xDE, 0x0A, 0x1D, 0xE4, 0x6D, 0xCA, 0xA2, 0x03, 0xC4, 0xB5, // ciphertext
            0x07, 0x00, 0x00, 0x00, // replay counter
            0x63, 0x5C, 0xA2, 0xD9, // mic
        ]
    );
    assert_eq!(service.dispatcher().replay_counter(), Some(7));
}

#[test]
fn listener_recovers_each_event_and_rejects_replays() {
    let (mut service, handle) = make_service(&encrypted_config(2), radio_at(EXAMPLE_ADDRESS));
    let mut sink = RecordingSink::new();
    let mut listener = Listener::new(EXAMPLE_ADDRESS);

    handle.update_battery_level(64);
    handle.queue_button_event(1, ButtonCode::DoublePress).unwrap();
    assert!(service.poll(&mut sink));
    let first = service.radio().last_data().unwrap().to_vec();

    handle.queue_button_event(0, ButtonCode::HoldPress).unwrap();
    handle.notify_sent();
    assert!(service.poll(&mut sink));
    let second = service.radio().last_data().unwrap().to_vec();

    // Seeded at 41, pre-incremented per frame.
    let (ctr, objects) = listener.receive(&first).unwrap();
    assert_eq!(ctr, 42);
    assert_eq!(objects.packet_id, Some(1));
    assert_eq!(objects.battery_level, Some(64));
    assert_eq!(
        objects.buttons.as_slice(),
        &[ButtonCode::None, ButtonCode::DoublePress]
    );

    let (ctr, objects) = listener.receive(&second).unwrap();
    assert_eq!(ctr, 43);
    assert_eq!(
        objects.buttons.as_slice(),
        &[ButtonCode::HoldPress, ButtonCode::None]
    );

    assert!(listener.receive(&first).is_none(), "replayed frame");

    assert!(sink.events.contains(&AppEvent::AdvertisementStarted {
        packet_id: 2,
        replay_counter: Some(43),
        len: second.len(),
    }));
}

#[test]
fn wrong_address_fails_authentication() {
    let (mut service, handle) = make_service(&encrypted_config(1), radio_at(EXAMPLE_ADDRESS));
    let mut sink = RecordingSink::new();

    handle.queue_button_event(0, ButtonCode::Press).unwrap();
    assert!(service.poll(&mut sink));

    let DecodedFrame::Encrypted {
        ciphertext,
        counter,
        mic,
        ..
    } = decode(service_data(service.radio().last_data().unwrap())).unwrap()
    else {
        panic!("expected encrypted frame");
    };
    let mut other = Cipher::new(EncryptionKey::from_hex(KEY).unwrap(), 0x45, SoftwareCcm);
    other.init(&[1, 2, 3, 4, 5, 6]);
    assert!(matches!(
        other.decrypt(&ciphertext, counter, &mic),
        Err(Error::Crypto(_))
    ));
}

#[test]
fn unresolved_address_aborts_until_available() {
    let radio = SimAdvertiser::with_address(None);
    let (mut service, handle) = make_service(&encrypted_config(1), radio);
    let mut sink = RecordingSink::new();

    handle.queue_button_event(0, ButtonCode::Press).unwrap();
    assert!(!service.poll(&mut sink));
    assert_eq!(service.dispatcher().state(), DispatcherState::ArmedIdle);
    assert!(service.radio().data_history().is_empty());
    assert_eq!(
        sink.events,
        [
            AppEvent::Armed { encrypted: true },
            AppEvent::CycleAborted {
                reason: Error::DeviceUnavailable,
            },
        ]
    );

    service.radio_mut().address = Some(EXAMPLE_ADDRESS);
    handle.queue_button_event(0, ButtonCode::LongPress).unwrap();
    assert!(service.poll(&mut sink));

    let mut listener = Listener::new(EXAMPLE_ADDRESS);
    let (_, objects) = listener.receive(service.radio().last_data().unwrap()).unwrap();
    assert_eq!(objects.buttons.as_slice(), &[ButtonCode::LongPress]);
}

#[test]
fn weak_rng_falls_back_for_counter_seed() {
    let rng = FixedRng {
        secure: None,
        fallback: 500,
    };
    let (mut service, handle) =
        BeaconService::new(&encrypted_config(1), radio_at(EXAMPLE_ADDRESS), rng, SoftwareCcm)
            .unwrap();
    let mut sink = RecordingSink::new();

    handle.queue_button_event(0, ButtonCode::Press).unwrap();
    assert!(service.poll(&mut sink));
    assert_eq!(service.dispatcher().replay_counter(), Some(501));
}

#[test]
fn plaintext_service_has_no_replay_counter() {
    let (service, _handle) = make_service(&crate::mocks::plain_config(1), SimAdvertiser::new());
    assert_eq!(service.dispatcher().replay_counter(), None);
    assert!(service.dispatcher().encrypted_frame().is_none());
}
