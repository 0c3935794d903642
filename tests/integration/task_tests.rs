//! The dispatcher running on its own executor thread, driven only through
//! handles, as in firmware.

use std::sync::mpsc;
use std::time::Duration;

use bthome_beacon::adapters::radio::SimAdvertiser;
use bthome_beacon::app::events::AppEvent;
use bthome_beacon::bthome::ButtonCode;
use bthome_beacon::task;

use crate::mocks::{ChannelSink, make_service, plain_config};

const WAIT: Duration = Duration::from_secs(5);

fn next_started(rx: &mpsc::Receiver<AppEvent>) -> (u8, Option<u32>) {
    loop {
        match rx.recv_timeout(WAIT).expect("dispatcher went quiet") {
            AppEvent::AdvertisementStarted {
                packet_id,
                replay_counter,
                ..
            } => return (packet_id, replay_counter),
            _ => continue,
        }
    }
}

#[test]
fn spawned_dispatcher_serves_handles() {
    let (service, handle) = make_service(&plain_config(2), SimAdvertiser::new());
    let (tx, rx) = mpsc::channel();
    let _task = task::spawn(service, ChannelSink(tx)).unwrap();

    handle.queue_button_event(1, ButtonCode::Press).unwrap();
    assert_eq!(rx.recv_timeout(WAIT).unwrap(), AppEvent::Armed { encrypted: false });
    assert_eq!(next_started(&rx), (1, None));

    handle.queue_button_event(0, ButtonCode::LongPress).unwrap();
    handle.notify_sent();
    assert_eq!(rx.recv_timeout(WAIT).unwrap(), AppEvent::AdvertisementCompleted);
    assert_eq!(next_started(&rx), (2, None));
}

#[test]
fn producers_on_many_threads_are_all_served() {
    let (service, handle) = make_service(&plain_config(4), SimAdvertiser::new());
    let (tx, rx) = mpsc::channel();
    let _task = task::spawn(service, ChannelSink(tx)).unwrap();

    let producers: Vec<_> = (0..4u8)
        .map(|i| {
            let h = handle.clone();
            std::thread::spawn(move || {
                for _ in 0..10 {
                    h.queue_button_event(i, ButtonCode::Press).unwrap();
                }
            })
        })
        .collect();
    for p in producers {
        p.join().unwrap();
    }

    // Whatever was coalesced, completing bursts eventually empties the queue.
    next_started(&rx);
    for _ in 0..64 {
        if handle.pending() == 0 {
            break;
        }
        handle.notify_sent();
        std::thread::sleep(Duration::from_millis(5));
    }
    assert_eq!(handle.pending(), 0);
}
