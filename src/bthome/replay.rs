//! Receiver-side replay filter for encrypted frames.

/// Counters below this value are always accepted so a sender that rebooted
/// (and restarted its counter) is not locked out.
pub const RESTART_WINDOW: u32 = 100;

/// Tracks the last accepted replay counter for one sender.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReplayGuard {
    last: Option<u32>,
}

impl ReplayGuard {
    pub const fn new() -> Self {
        Self { last: None }
    }

    pub const fn last_accepted(&self) -> Option<u32> {
        self.last
    }

    /// Accept `counter` if it is inside the restart window or strictly
    /// newer than the last accepted one.
    pub fn accept(&mut self, counter: u32) -> bool {
        let fresh = match self.last {
            None => true,
            Some(_) if counter < RESTART_WINDOW => true,
            Some(last) => counter > last,
        };
        if fresh {
            self.last = Some(counter);
        }
        fresh
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_repeat_and_older() {
        let mut guard = ReplayGuard::new();
        assert!(guard.accept(5_000));
        assert!(!guard.accept(5_000));
        assert!(!guard.accept(4_999));
        assert!(guard.accept(5_001));
        assert_eq!(guard.last_accepted(), Some(5_001));
    }

    #[test]
    fn low_counters_always_pass() {
        let mut guard = ReplayGuard::new();
        assert!(guard.accept(1_000_000));
        assert!(guard.accept(3));
        assert!(guard.accept(3));
        assert!(guard.accept(RESTART_WINDOW - 1));
        // After a restart the window resets the baseline.
        assert!(guard.accept(RESTART_WINDOW));
        assert!(!guard.accept(RESTART_WINDOW));
    }

    #[test]
    fn first_frame_is_accepted() {
        let mut guard = ReplayGuard::default();
        assert!(guard.accept(u32::MAX));
        assert!(!guard.accept(u32::MAX));
    }
}
