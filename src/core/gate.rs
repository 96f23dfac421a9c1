//! The `changing_splits` gate
//!
//! External navigation asks the compare loop to park before it moves the
//! cursor: `Idle -> Requested -> Acknowledged -> Idle`. The requester waits a
//! bounded time for the acknowledgement and proceeds regardless.

use parking_lot::{Condvar, Mutex};
use std::time::Duration;

/// How long navigation waits for the compare loop to park
pub const NAVIGATION_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GateState {
    #[default]
    Idle,
    Requested,
    Acknowledged,
}

#[derive(Debug, Default)]
pub struct SplitsGate {
    state: Mutex<GateState>,
    changed: Condvar,
}

impl SplitsGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> GateState {
        *self.state.lock()
    }

    /// Whether a change is pending (requested or acknowledged)
    pub fn is_set(&self) -> bool {
        self.state() != GateState::Idle
    }

    /// Raise the gate and wait up to `timeout` for the compare loop to park.
    /// Returns whether it acknowledged in time.
    pub fn request(&self, timeout: Duration) -> bool {
        let mut state = self.state.lock();
        *state = GateState::Requested;
        self.changed.notify_all();
        self.changed
            .wait_while_for(&mut state, |s| *s == GateState::Requested, timeout);
        *state == GateState::Acknowledged
    }

    /// Lower the gate and wake a parked compare loop
    pub fn release(&self) {
        let mut state = self.state.lock();
        *state = GateState::Idle;
        self.changed.notify_all();
    }

    /// Called by the compare loop: acknowledge a pending request and block
    /// until the gate is lowered, polling `should_stop` every `poll`.
    ///
    /// Returns `false` if it gave up because of shutdown.
    pub fn park(&self, poll: Duration, should_stop: impl Fn() -> bool) -> bool {
        let mut state = self.state.lock();
        if *state == GateState::Requested {
            *state = GateState::Acknowledged;
            self.changed.notify_all();
        }
        while *state != GateState::Idle {
            if should_stop() {
                return false;
            }
            self.changed.wait_for(&mut state, poll);
        }
        true
    }
}
