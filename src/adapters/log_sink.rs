//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured beacon events to the
//! ESP-IDF logger (UART / USB-CDC in production).

use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] to the serial console.
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Armed { encrypted } => {
                info!("ARMED | encrypted={}", encrypted);
            }
            AppEvent::AdvertisementStarted {
                packet_id,
                replay_counter: Some(ctr),
                len,
            } => {
                info!("ADV   | packet={} counter={} len={}", packet_id, ctr, len);
            }
            AppEvent::AdvertisementStarted {
                packet_id,
                replay_counter: None,
                len,
            } => {
                info!("ADV   | packet={} len={}", packet_id, len);
            }
            AppEvent::AdvertisementCompleted => {
                info!("ADV   | burst complete");
            }
            AppEvent::EventDropped { count, reason } => {
                warn!("DROP  | {} event(s), {}", count, reason);
            }
            AppEvent::CycleAborted { reason } => {
                warn!("ABORT | {}", reason);
            }
        }
    }
}
