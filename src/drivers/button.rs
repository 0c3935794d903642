//! Debounced button gesture classifier.
//!
//! ## Hardware
//!
//! Active-low momentary switch with pull-up. The input task samples the
//! level every few milliseconds and feeds it to [`GestureDetector::update`],
//! which runs the debounce + gesture state machine and yields BTHome
//! button codes.
//!
//! ## Gesture detection
//!
//! | Gesture               | Condition                                   | Code                |
//! |-----------------------|---------------------------------------------|---------------------|
//! | Press                 | Release < 800ms, no further press in 300ms  | `Press`             |
//! | Double / triple press | 2 / 3 short presses, gaps ≤ 300ms           | `DoublePress` / `TriplePress` |
//! | Long press            | Release after ≥ 800ms                       | `LongPress`         |
//! | Long double / triple  | 1 / 2 short presses, then a long one        | `LongDoublePress` / `LongTriplePress` |
//! | Hold                  | Still down after 3s                         | `HoldPress`         |

use crate::bthome::ButtonCode;

const DEBOUNCE_MS: u32 = 30;
const LONG_PRESS_MS: u32 = 800;
const HOLD_MS: u32 = 3_000;
const MULTI_PRESS_WINDOW_MS: u32 = 300;
const MAX_CLICKS: u8 = 3;

/// Internal state machine for gesture detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GestureState {
    Idle,
    Pressed { since_ms: u32, clicks: u8 },
    WaitNextPress { released_ms: u32, clicks: u8 },
    /// Hold already reported; ignore everything until release.
    WaitRelease,
}

pub struct GestureDetector {
    state: GestureState,
    /// Debounced level (true = pressed).
    stable: bool,
    /// Raw level seen since `changed_ms`.
    raw: bool,
    changed_ms: u32,
}

impl Default for GestureDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl GestureDetector {
    pub fn new() -> Self {
        Self {
            state: GestureState::Idle,
            stable: false,
            raw: false,
            changed_ms: 0,
        }
    }

    /// Feed one sample. `pressed` is the logical level (already inverted
    /// for active-low wiring); `now_ms` is monotonic time.
    pub fn update(&mut self, pressed: bool, now_ms: u32) -> Option<ButtonCode> {
        if pressed != self.raw {
            self.raw = pressed;
            self.changed_ms = now_ms;
        }
        if self.raw != self.stable && now_ms.wrapping_sub(self.changed_ms) >= DEBOUNCE_MS {
            self.stable = self.raw;
            return self.on_edge(self.stable, now_ms);
        }
        self.on_level(now_ms)
    }

    fn on_edge(&mut self, pressed: bool, now_ms: u32) -> Option<ButtonCode> {
        match (self.state, pressed) {
            (GestureState::Idle, true) => {
                self.state = GestureState::Pressed {
                    since_ms: now_ms,
                    clicks: 0,
                };
                None
            }
            (GestureState::WaitNextPress { clicks, .. }, true) => {
                self.state = GestureState::Pressed {
                    since_ms: now_ms,
                    clicks,
                };
                None
            }
            (GestureState::Pressed { since_ms, clicks }, false) => {
                if now_ms.wrapping_sub(since_ms) >= LONG_PRESS_MS {
                    self.state = GestureState::Idle;
                    return Some(match clicks {
                        0 => ButtonCode::LongPress,
                        1 => ButtonCode::LongDoublePress,
                        _ => ButtonCode::LongTriplePress,
                    });
                }
                let clicks = clicks + 1;
                if clicks >= MAX_CLICKS {
                    self.state = GestureState::Idle;
                    return Some(ButtonCode::TriplePress);
                }
                self.state = GestureState::WaitNextPress {
                    released_ms: now_ms,
                    clicks,
                };
                None
            }
            (GestureState::WaitRelease, false) => {
                self.state = GestureState::Idle;
                None
            }
            _ => None,
        }
    }

    fn on_level(&mut self, now_ms: u32) -> Option<ButtonCode> {
        match self.state {
            GestureState::Pressed { since_ms, clicks: 0 }
                if now_ms.wrapping_sub(since_ms) >= HOLD_MS =>
            {
                self.state = GestureState::WaitRelease;
                Some(ButtonCode::HoldPress)
            }
            GestureState::WaitNextPress { released_ms, clicks }
                if now_ms.wrapping_sub(released_ms) > MULTI_PRESS_WINDOW_MS =>
            {
                self.state = GestureState::Idle;
                Some(if clicks >= 2 {
                    ButtonCode::DoublePress
                } else {
                    ButtonCode::Press
                })
            }
            _ => None,
        }
    }
}
