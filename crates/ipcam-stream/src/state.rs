//! Connection lifecycle and reconnect bookkeeping shared between the
//! consumer thread and the reconnect policy.

/// Lifecycle of one grabber. Transitions are driven by the consumer's
/// periodic `tick()` and by worker exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Connecting,
    Streaming,
    Stalled,
    WaitingToRetry,
    FailedPermanently,
}

/// Reconnect bookkeeping guarded by the same mutex as `FrameSlot`/`Statistics`.
#[derive(Debug, Clone)]
pub struct ReconnectState {
    pub reconnect_count: u64,
    pub next_retry_at_ms: u64,
    pub failed_permanently: bool,
    pub needs_reconnect: bool,
}

impl ReconnectState {
    pub fn new() -> Self {
        ReconnectState {
            reconnect_count: 0,
            next_retry_at_ms: 0,
            failed_permanently: false,
            needs_reconnect: false,
        }
    }

    /// Milliseconds until the next retry is due, clamped to zero rather than
    /// underflowing when `now_ms >= next_retry_at_ms`.
    pub fn time_till_next_retry(&self, now_ms: u64) -> u64 {
        if self.next_retry_at_ms == 0 {
            0
        } else {
            self.next_retry_at_ms.saturating_sub(now_ms)
        }
    }

    /// Clears reconnect counters and the permanent-failure flag, but does
    /// not itself touch `needs_reconnect` (disconnect/connect own that).
    pub fn reset(&mut self) {
        self.reconnect_count = 0;
        self.next_retry_at_ms = 0;
        self.failed_permanently = false;
    }
}

impl Default for ReconnectState {
    fn default() -> Self {
        Self::new()
    }
}
