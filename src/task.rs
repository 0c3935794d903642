//! Dispatcher task.
//!
//! ```text
//!  ┌─────────────────── bthome thread ───────────────────┐
//!  │  futures_lite::future::block_on                      │
//!  │    edge_executor::LocalExecutor                      │
//!  │      BeaconService::run ◀── Doorbell (Signal)        │
//!  └──────────────────────────────────────────────────────┘
//! ```
//!
//! The service and its sink move into the thread; producers keep
//! [`BeaconHandle`](crate::app::service::BeaconHandle)s.

use std::io;
use std::thread::JoinHandle;

use log::info;

use crate::app::ports::{AdvertiserPort, EventSink, IdentityPort, RandomPort};
use crate::app::service::BeaconService;
use crate::bthome::cipher::CcmEngine;
use crate::drivers::task_pin::{self, TaskSpec};

fn run_dispatcher<R, G, E, S>(mut service: BeaconService<R, G, E>, mut sink: S)
where
    R: AdvertiserPort + IdentityPort,
    G: RandomPort,
    E: CcmEngine,
    S: EventSink,
{
    let executor: edge_executor::LocalExecutor<'_, 1> = edge_executor::LocalExecutor::new();
    info!("BTHome dispatcher task started");
    futures_lite::future::block_on(executor.run(service.run(&mut sink)));
}

/// Move `service` into its own task and serve the inbox forever.
pub fn spawn<R, G, E, S>(service: BeaconService<R, G, E>, sink: S) -> io::Result<JoinHandle<()>>
where
    R: AdvertiserPort + IdentityPort + Send + 'static,
    G: RandomPort + Send + 'static,
    E: CcmEngine + Send + 'static,
    S: EventSink + Send + 'static,
{
    task_pin::spawn_task(TaskSpec::DISPATCHER, move || {
        run_dispatcher(service, sink)
    })
}
