//! Integration tests for the BeaconHandle → inbox → dispatcher → radio
//! pipeline, on plaintext frames.

use bthome_beacon::adapters::radio::SimAdvertiser;
use bthome_beacon::app::dispatcher::DispatcherState;
use bthome_beacon::app::events::{AppEvent, DropReason};
use bthome_beacon::app::ports::AdvertiseParams;
use bthome_beacon::bthome::ButtonCode;
use bthome_beacon::bthome::payload::{DecodedFrame, decode};
use bthome_beacon::error::{Error, RadioError};
use bthome_beacon::events::EVENT_QUEUE_CAP;

use crate::mocks::{RecordingSink, make_service, plain_config, service_data};

fn decode_plain(adv: &[u8]) -> bthome_beacon::bthome::payload::DecodedObjects {
    match decode(service_data(adv)).unwrap() {
        DecodedFrame::Plain { device_info, objects } => {
            assert_eq!(device_info, 0x44);
            objects
        }
        other => panic!("expected plaintext frame, got {other:?}"),
    }
}

// ── Single flight ─────────────────────────────────────────────

#[test]
fn one_burst_in_flight_and_newest_event_follows() {
    let (mut service, handle) = make_service(&plain_config(4), SimAdvertiser::new());
    let mut sink = RecordingSink::new();

    handle.queue_button_event(1, ButtonCode::Press).unwrap();
    assert!(service.poll(&mut sink));
    assert_eq!(service.dispatcher().state(), DispatcherState::Sending);

    handle.queue_button_event(2, ButtonCode::DoublePress).unwrap();
    handle.queue_button_event(3, ButtonCode::LongPress).unwrap();
    assert!(!service.poll(&mut sink), "no second burst while sending");
    assert_eq!(service.radio().starts().len(), 1);
    assert_eq!(handle.pending(), 2);

    handle.notify_sent();
    assert!(service.poll(&mut sink));
    assert_eq!(handle.pending(), 0);
    assert_eq!(service.radio().starts().len(), 2);

    let objects = decode_plain(service.radio().last_data().unwrap());
    assert_eq!(objects.packet_id, Some(2));
    assert_eq!(
        objects.buttons.as_slice(),
        &[
            ButtonCode::None,
            ButtonCode::None,
            ButtonCode::None,
            ButtonCode::LongPress
        ]
    );

    assert_eq!(
        sink.events,
        [
            AppEvent::Armed { encrypted: false },
            AppEvent::AdvertisementStarted {
                packet_id: 1,
                replay_counter: None,
                len: service.radio().data_history()[0].len(),
            },
            AppEvent::AdvertisementCompleted,
            AppEvent::AdvertisementStarted {
                packet_id: 2,
                replay_counter: None,
                len: service.radio().data_history()[1].len(),
            },
        ]
    );
}

#[test]
fn completion_with_empty_queue_returns_to_idle() {
    let (mut service, handle) = make_service(&plain_config(1), SimAdvertiser::new());
    let mut sink = RecordingSink::new();

    handle.queue_button_event(0, ButtonCode::Press).unwrap();
    assert!(service.poll(&mut sink));
    handle.notify_sent();
    assert!(!service.poll(&mut sink));
    assert_eq!(service.dispatcher().state(), DispatcherState::ArmedIdle);
    assert_eq!(service.radio().starts().len(), 1);
}

#[test]
fn burst_uses_configured_limits() {
    let mut config = plain_config(1);
    config.adv_timeout_10ms = 50;
    config.adv_max_events = 3;
    let (mut service, handle) = make_service(&config, SimAdvertiser::new());
    let mut sink = RecordingSink::new();

    handle.queue_button_event(0, ButtonCode::HoldPress).unwrap();
    assert!(service.poll(&mut sink));
    assert_eq!(
        service.radio().starts(),
        &[AdvertiseParams {
            timeout_10ms: 50,
            max_events: 3,
        }]
    );
}

#[test]
fn only_the_reported_button_is_set() {
    let (mut service, handle) = make_service(&plain_config(2), SimAdvertiser::new());
    let mut sink = RecordingSink::new();

    handle.queue_button_event(0, ButtonCode::Press).unwrap();
    service.poll(&mut sink);
    handle.notify_sent();
    service.poll(&mut sink);

    handle.queue_button_event(1, ButtonCode::TriplePress).unwrap();
    assert!(service.poll(&mut sink));
    let objects = decode_plain(service.radio().last_data().unwrap());
    assert_eq!(
        objects.buttons.as_slice(),
        &[ButtonCode::None, ButtonCode::TriplePress]
    );
}

// ── Queue overflow ────────────────────────────────────────────

#[test]
fn overflow_while_sending_is_reported() {
    let (mut service, handle) = make_service(&plain_config(1), SimAdvertiser::new());
    let mut sink = RecordingSink::new();

    handle.queue_button_event(0, ButtonCode::Press).unwrap();
    assert!(service.poll(&mut sink));

    for _ in 0..EVENT_QUEUE_CAP + 4 {
        handle.queue_button_event(0, ButtonCode::DoublePress).unwrap();
    }
    assert_eq!(handle.pending(), EVENT_QUEUE_CAP);

    handle.notify_sent();
    assert!(service.poll(&mut sink));
    assert!(sink.events.contains(&AppEvent::EventDropped {
        count: 4,
        reason: DropReason::QueueFull,
    }));
    assert_eq!(handle.pending(), 0);
}

// ── Argument validation ───────────────────────────────────────

#[test]
fn out_of_range_button_is_rejected_at_the_handle() {
    let (mut service, handle) = make_service(&plain_config(4), SimAdvertiser::new());
    let mut sink = RecordingSink::new();

    assert!(matches!(
        handle.queue_button_event(5, ButtonCode::Press),
        Err(Error::InvalidArgument(_))
    ));
    assert_eq!(handle.pending(), 0);
    assert!(!service.poll(&mut sink));
    assert!(sink.events.is_empty());
}

#[test]
fn none_event_without_buttons_advertises_battery() {
    let (mut service, handle) = make_service(&plain_config(0), SimAdvertiser::new());
    let mut sink = RecordingSink::new();

    handle.update_battery(87, None).unwrap();
    assert!(service.poll(&mut sink));

    let objects = decode_plain(service.radio().last_data().unwrap());
    assert_eq!(objects.battery_level, Some(87));
    assert!(objects.buttons.is_empty());
}

#[test]
fn out_of_range_battery_reading_is_clamped_and_advertised() {
    let (mut service, handle) = make_service(&plain_config(0), SimAdvertiser::new());
    let mut sink = RecordingSink::new();

    handle.update_battery(150, None).unwrap();
    assert_eq!(handle.pending(), 1);
    assert!(service.poll(&mut sink));

    let objects = decode_plain(service.radio().last_data().unwrap());
    assert_eq!(objects.battery_level, Some(100));
}

#[test]
fn battery_update_lands_in_next_frame_only() {
    let mut config = plain_config(1);
    config.battery_voltage = Some(bthome_beacon::bthome::VoltageResolution::Thousandth);
    let (mut service, handle) = make_service(&config, SimAdvertiser::new());
    let mut sink = RecordingSink::new();

    handle.update_battery(90, Some(3_100)).unwrap();
    assert!(service.poll(&mut sink));
    let first = service.radio().last_data().unwrap().to_vec();

    // Staged while the burst is in flight: the frame on air is untouched.
    handle.update_battery_level(40);
    handle.update_battery_voltage(2_900);
    assert_eq!(service.radio().last_data().unwrap(), first.as_slice());
    assert_eq!(service.dispatcher().payload().battery_level(), Some(90));

    handle.queue_button_event(0, ButtonCode::Press).unwrap();
    handle.notify_sent();
    assert!(service.poll(&mut sink));
    let objects = decode_plain(service.radio().last_data().unwrap());
    assert_eq!(objects.battery_level, Some(40));
    assert_eq!(objects.battery_voltage_mv, Some(2_900));
}

// ── Radio failures ────────────────────────────────────────────

#[test]
fn not_ready_radio_drops_events_then_recovers() {
    let radio = SimAdvertiser::not_ready();
    let (mut service, handle) = make_service(&plain_config(1), radio);
    let mut sink = RecordingSink::new();

    handle.queue_button_event(0, ButtonCode::Press).unwrap();
    handle.queue_button_event(0, ButtonCode::DoublePress).unwrap();
    assert!(!service.poll(&mut sink));
    assert_eq!(service.dispatcher().state(), DispatcherState::Unarmed);
    assert_eq!(handle.pending(), 0);
    assert_eq!(
        sink.events,
        [AppEvent::EventDropped {
            count: 2,
            reason: DropReason::RadioNotReady,
        }]
    );

    service.radio_mut().ready = true;
    handle.queue_button_event(0, ButtonCode::Press).unwrap();
    assert!(service.poll(&mut sink));
    assert!(service.radio().is_created());
    assert_eq!(sink.count(|e| matches!(e, AppEvent::Armed { .. })), 1);
}

#[test]
fn set_data_failure_aborts_cycle_and_next_event_retries() {
    let mut radio = SimAdvertiser::new();
    radio.fail_set_data = Some(-5);
    let (mut service, handle) = make_service(&plain_config(1), radio);
    let mut sink = RecordingSink::new();

    handle.queue_button_event(0, ButtonCode::Press).unwrap();
    assert!(!service.poll(&mut sink));
    assert_eq!(service.dispatcher().state(), DispatcherState::ArmedIdle);
    assert_eq!(handle.pending(), 0);
    assert!(sink.events.contains(&AppEvent::CycleAborted {
        reason: Error::Radio(RadioError::SetDataFailed(-5)),
    }));

    service.radio_mut().fail_set_data = None;
    handle.queue_button_event(0, ButtonCode::LongPress).unwrap();
    assert!(service.poll(&mut sink));
    assert_eq!(service.dispatcher().state(), DispatcherState::Sending);
}

#[test]
fn start_failure_leaves_dispatcher_idle() {
    let mut radio = SimAdvertiser::new();
    radio.fail_start = Some(-2);
    let (mut service, handle) = make_service(&plain_config(1), radio);
    let mut sink = RecordingSink::new();

    handle.queue_button_event(0, ButtonCode::Press).unwrap();
    assert!(!service.poll(&mut sink));
    assert_eq!(service.dispatcher().state(), DispatcherState::ArmedIdle);
    assert!(service.radio().starts().is_empty());
}

#[test]
fn spurious_completion_is_ignored() {
    let (mut service, handle) = make_service(&plain_config(1), SimAdvertiser::new());
    let mut sink = RecordingSink::new();

    handle.notify_sent();
    assert!(!service.poll(&mut sink));
    assert_eq!(service.dispatcher().state(), DispatcherState::Unarmed);
    assert!(sink.events.is_empty());
}

// ── Configuration ─────────────────────────────────────────────

#[test]
fn advertised_name_follows_service_data() {
    let mut config = plain_config(1);
    config.device_name = "Door".try_into().unwrap();
    let (mut service, handle) = make_service(&config, SimAdvertiser::new());
    let mut sink = RecordingSink::new();

    handle.queue_button_event(0, ButtonCode::Press).unwrap();
    assert!(service.poll(&mut sink));

    let adv = service.radio().last_data().unwrap();
    assert!(adv.len() <= 31);
    assert!(adv.ends_with(&[5, 0x09, b'D', b'o', b'o', b'r']));
}

#[test]
fn invalid_config_is_rejected_at_construction() {
    let mut config = plain_config(9);
    assert!(matches!(
        bthome_beacon::BeaconService::new(
            &config,
            SimAdvertiser::new(),
            crate::mocks::FixedRng::secure(0),
            bthome_beacon::bthome::cipher::SoftwareCcm,
        ),
        Err(Error::Config(_))
    ));

    config.button_count = 1;
    config.encryption_key = Some("not-hex".try_into().unwrap());
    assert!(matches!(
        bthome_beacon::BeaconService::new(
            &config,
            SimAdvertiser::new(),
            crate::mocks::FixedRng::secure(0),
            bthome_beacon::bthome::cipher::SoftwareCcm,
        ),
        Err(Error::Config(_))
    ));
}
