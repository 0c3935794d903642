//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter        | Implements         | Connects to                   |
//! |----------------|--------------------|-------------------------------|
//! | `radio`        | AdvertiserPort     | Bluedroid extended advertising|
//! |                | IdentityPort       | Controller public address     |
//! | `identity`     |                    | eFuse BT MAC                  |
//! | `rng`          | RandomPort         | getrandom / hash fallback     |
//! | `log_sink`     | EventSink          | Serial log output             |

pub mod identity;
pub mod log_sink;
pub mod radio;
pub mod rng;
