//! The state guarded by a grabber's single mutex.

use crate::frame_slot::FrameSlot;
use crate::state::{ConnectionState, ReconnectState};
use crate::stats::Statistics;

/// `FrameSlot`, `Statistics`, `ReconnectState`, and `ConnectionState` all live
/// behind one lock: the worker only ever holds it briefly to install a
/// frame, bump a counter, or flip the connection state on first byte; the
/// consumer holds it briefly on each `tick()`.
pub struct GuardedState {
    pub frame_slot: FrameSlot,
    pub stats: Statistics,
    pub reconnect: ReconnectState,
    pub connection_state: ConnectionState,
}

impl GuardedState {
    pub fn new() -> Self {
        GuardedState {
            frame_slot: FrameSlot::new(),
            stats: Statistics::new(),
            reconnect: ReconnectState::new(),
            connection_state: ConnectionState::Idle,
        }
    }
}

impl Default for GuardedState {
    fn default() -> Self {
        Self::new()
    }
}
