//! Connection-state and retry policy. Owns the current `WorkerHandle` and is
//! the only thing allowed to spawn or reap one, so the rule that a
//! replacement is never spawned before the previous worker has joined is
//! enforced in one place.

use ipcam_stream::{
    CameraConfig, Clock, ConnectionState, GrabberWorker, GuardedState, HttpClient, JpegDecoder,
    RetriesExhausted, WorkerHandle,
};
use std::sync::{Arc, Mutex};

pub struct ReconnectController {
    state: Arc<Mutex<GuardedState>>,
    transport: Arc<dyn HttpClient>,
    decoder: Arc<dyn JpegDecoder>,
    clock: Arc<dyn Clock>,
    worker: Option<WorkerHandle>,
}

/// What `tick()` decided to do after inspecting shared state; spawning and
/// stopping happen after the lock is released.
enum Action {
    None,
    RequestStop,
    Respawn,
    FailPermanently,
}

impl ReconnectController {
    pub fn new(
        state: Arc<Mutex<GuardedState>>,
        transport: Arc<dyn HttpClient>,
        decoder: Arc<dyn JpegDecoder>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        ReconnectController {
            state,
            transport,
            decoder,
            clock,
            worker: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.worker.is_some()
    }

    /// Idle -> Connecting: spawn the worker. Bumps `reconnect_count` the same
    /// way an automatic retry does, so the first attempt and every retry are
    /// counted on one axis (see the accounting note on `respawn`).
    pub fn connect(&mut self, config: &CameraConfig) -> Result<(), RetriesExhausted> {
        {
            let guard = self.state.lock().unwrap();
            if guard.connection_state != ConnectionState::Idle {
                // Reconnecting from a non-Idle state is a caller error the
                // facade already rejects before reaching here; treat it as a
                // no-op so this method stays idempotent under misuse.
                return Ok(());
            }
        }
        self.spawn_worker(config);
        Ok(())
    }

    /// Any state -> Idle: signal shutdown, force-close the connection if
    /// open, and join synchronously. Always wins over whatever retry the
    /// worker's exit path queued, since the caller explicitly asked to stop.
    pub fn disconnect(&mut self) {
        if let Some(handle) = self.worker.take() {
            handle.request_stop();
            let _ = handle.join();
        }
        let mut guard = self.state.lock().unwrap();
        guard.connection_state = ConnectionState::Idle;
        guard.reconnect.needs_reconnect = false;
    }

    /// Same as `disconnect()`; kept as a separate name for callers that
    /// already know a worker is running and want to block for it to exit.
    pub fn wait_for_disconnect(&mut self) {
        self.disconnect();
    }

    /// FailedPermanently -> Idle, clearing the retry counters and the
    /// failure flag. Does not itself disconnect; by the time a grabber
    /// reaches `FailedPermanently` its worker has already exited on its own.
    pub fn reset(&mut self) {
        let mut guard = self.state.lock().unwrap();
        guard.reconnect.reset();
        guard.connection_state = ConnectionState::Idle;
    }

    /// Advance the state machine by one step. `bitrate_bps` is the figure the
    /// facade just recomputed from `Statistics` this tick; detects stalls,
    /// reaps a worker that exited on its own, and fires the next retry or
    /// permanent failure once its budget is spent.
    pub fn tick(&mut self, config: &CameraConfig, bitrate_bps: f64) {
        let now = self.clock.now_ms();

        if self.reap_if_finished() {
            let mut guard = self.state.lock().unwrap();
            if matches!(
                guard.connection_state,
                ConnectionState::Connecting | ConnectionState::Streaming | ConnectionState::Stalled
            ) {
                guard.reconnect.needs_reconnect = true;
                guard.reconnect.next_retry_at_ms = now + config.auto_retry_delay_ms;
                guard.connection_state = ConnectionState::WaitingToRetry;
            }
        }

        let action = {
            let mut guard = self.state.lock().unwrap();
            match guard.connection_state {
                ConnectionState::Streaming => {
                    if bitrate_bps >= config.min_bitrate_bps {
                        guard.stats.last_valid_bitrate_ms = guard.stats.elapsed_ms;
                        Action::None
                    } else if guard.stats.elapsed_ms.saturating_sub(guard.stats.last_valid_bitrate_ms)
                        > config.reconnect_timeout_ms
                    {
                        guard.connection_state = ConnectionState::Stalled;
                        guard.reconnect.needs_reconnect = true;
                        Action::RequestStop
                    } else {
                        Action::None
                    }
                }
                ConnectionState::WaitingToRetry => {
                    if guard.reconnect.needs_reconnect && now >= guard.reconnect.next_retry_at_ms {
                        if Self::retry_budget_remains(&guard.reconnect, config) {
                            Action::Respawn
                        } else {
                            guard.reconnect.failed_permanently = true;
                            guard.connection_state = ConnectionState::FailedPermanently;
                            Action::FailPermanently
                        }
                    } else {
                        Action::None
                    }
                }
                _ => Action::None,
            }
        };

        match action {
            Action::RequestStop => {
                if let Some(handle) = &self.worker {
                    handle.request_stop();
                }
            }
            Action::Respawn => self.respawn(config),
            Action::FailPermanently | Action::None => {}
        }
    }

    /// `reconnect_count` counts every worker spawned so far, including the
    /// first. A `<=` comparison against `max_reconnects` allows one initial
    /// attempt plus up to `max_reconnects` retries, `max_reconnects + 1`
    /// total spawns, before giving up permanently.
    fn retry_budget_remains(reconnect: &ipcam_stream::ReconnectState, config: &CameraConfig) -> bool {
        config.max_reconnects < 0 || (reconnect.reconnect_count as i64) <= config.max_reconnects
    }

    fn spawn_worker(&mut self, config: &CameraConfig) {
        let now = self.clock.now_ms();
        {
            let mut guard = self.state.lock().unwrap();
            guard.reconnect.reconnect_count += 1;
            guard.reconnect.needs_reconnect = false;
            guard.stats.reset(now);
            guard.connection_state = ConnectionState::Connecting;
        }
        let handle = GrabberWorker::spawn(
            config.clone(),
            self.state.clone(),
            self.transport.clone(),
            self.decoder.clone(),
            self.clock.clone(),
        );
        self.worker = Some(handle);
    }

    fn respawn(&mut self, config: &CameraConfig) {
        // The worker that got us into WaitingToRetry already finished and
        // was reaped by `reap_if_finished`; there is nothing left to join.
        self.spawn_worker(config);
    }

    fn reap_if_finished(&mut self) -> bool {
        let finished = self.worker.as_ref().map_or(false, |w| w.is_finished());
        if finished {
            if let Some(handle) = self.worker.take() {
                let _ = handle.join();
            }
        }
        finished
    }
}
