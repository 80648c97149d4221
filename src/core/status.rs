use std::sync::atomic::{AtomicU8, Ordering};

use serde::Serialize;

pub const TS_EXIT: u8 = 1 << 0;
pub const TS_START: u8 = 1 << 1;
pub const TS_REQUEST_IDR: u8 = 1 << 2;
pub const TS_KEYFRAME_DROPPED: u8 = 1 << 3;
// set on the first stop so a stopped instance can be told apart from a fresh one
const TS_STOPPED: u8 = 1 << 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    Created,
    Running,
    Stopped,
    Destroyed,
}

/// Per-instance status flag set.
///
/// Bits that wake a blocked waiter (start, exit) must be flipped while the
/// corresponding mutex is held, followed by a notify. The worker polls
/// exit/start without locking.
#[derive(Debug, Default)]
pub struct Status {
    bits: AtomicU8,
}

impl Status {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, flag: u8) -> bool {
        self.bits.load(Ordering::Acquire) & flag != 0
    }

    pub fn set(&self, flag: u8) {
        self.bits.fetch_or(flag, Ordering::AcqRel);
    }

    pub fn clear(&self, flag: u8) {
        self.bits.fetch_and(!flag, Ordering::AcqRel);
    }

    /// Clears `flag` and reports whether it was set.
    pub fn take(&self, flag: u8) -> bool {
        self.bits.fetch_and(!flag, Ordering::AcqRel) & flag != 0
    }

    pub fn is_started(&self) -> bool {
        self.contains(TS_START)
    }

    pub fn is_exiting(&self) -> bool {
        self.contains(TS_EXIT)
    }

    pub fn set_started(&self, started: bool) {
        if started {
            self.set(TS_START);
        } else {
            self.bits.fetch_or(TS_STOPPED, Ordering::AcqRel);
            self.clear(TS_START);
        }
    }

    pub fn state(&self) -> LifecycleState {
        let bits = self.bits.load(Ordering::Acquire);
        if bits & TS_EXIT != 0 {
            LifecycleState::Destroyed
        } else if bits & TS_START != 0 {
            LifecycleState::Running
        } else if bits & TS_STOPPED != 0 {
            LifecycleState::Stopped
        } else {
            LifecycleState::Created
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_transitions() {
        let status = Status::new();
        assert_eq!(status.state(), LifecycleState::Created);

        status.set_started(true);
        assert_eq!(status.state(), LifecycleState::Running);

        status.set_started(false);
        assert_eq!(status.state(), LifecycleState::Stopped);

        status.set_started(true);
        assert_eq!(status.state(), LifecycleState::Running);

        status.set(TS_EXIT);
        assert_eq!(status.state(), LifecycleState::Destroyed);
    }

    #[test]
    fn take_clears_flag() {
        let status = Status::new();
        status.set(TS_REQUEST_IDR);
        assert!(status.take(TS_REQUEST_IDR));
        assert!(!status.take(TS_REQUEST_IDR));
        assert!(!status.contains(TS_REQUEST_IDR));
    }
}
