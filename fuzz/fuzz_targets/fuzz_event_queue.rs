//! Fuzz target: `EventQueue` push / pop / drain sequences
//!
//! Each input byte is one operation. The queue must stay bounded, keep
//! FIFO order among survivors, and account for every displaced event.
//!
//! cargo fuzz run fuzz_event_queue

#![no_main]

use std::collections::VecDeque;

use bthome_beacon::bthome::ButtonCode;
use bthome_beacon::events::{ButtonEvent, EVENT_QUEUE_CAP, EventQueue};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let queue = EventQueue::new();
    let mut model: VecDeque<u8> = VecDeque::new();
    let mut dropped = 0usize;

    for &op in data {
        match op % 4 {
            0 | 1 => {
                queue.push(ButtonEvent::new(op, ButtonCode::Press)).unwrap();
                if model.len() == EVENT_QUEUE_CAP {
                    model.pop_front();
                    dropped += 1;
                }
                model.push_back(op);
            }
            2 => {
                assert_eq!(queue.pop().map(|e| e.index), model.pop_front());
            }
            _ => {
                let drained = queue.drain_latest();
                let expected = model.back().copied().map(|i| (i, model.len()));
                assert_eq!(drained.map(|(e, n)| (e.index, n)), expected);
                model.clear();
            }
        }
        assert!(queue.len() <= EVENT_QUEUE_CAP);
        assert_eq!(queue.len(), model.len());
    }
    assert_eq!(queue.take_dropped() as usize, dropped);
});
