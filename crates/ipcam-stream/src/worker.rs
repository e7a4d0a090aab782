//! Drives one streaming HTTP session to completion or termination. Owns the
//! HTTP session exclusively; shares `FrameSlot`, `Statistics`,
//! `ReconnectState`, and `ConnectionState` with the consumer under one
//! mutex.

use crate::clock::Clock;
use crate::config::CameraConfig;
use crate::decoder::JpegDecoder;
use crate::error::{TransportError, TransportResult};
use crate::parser::{normalize_boundary_marker, MjpegParser, ParserEvent};
use crate::shared::GuardedState;
use crate::state::ConnectionState;
use crate::transport::{ByteStream, ConnectionCloser, HttpClient, HttpRequest};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

/// How a worker run ended, for the reconnect policy to act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerExit {
    EndOfStream,
    Stopped,
}

/// Handle to a running worker thread. Held by `ReconnectController`.
pub struct WorkerHandle {
    join: JoinHandle<TransportResult<WorkerExit>>,
    shutdown: Arc<AtomicBool>,
    closer: Arc<Mutex<Option<Box<dyn ConnectionCloser>>>>,
}

impl WorkerHandle {
    /// Flip the shutdown signal and, if the connection is already open,
    /// force it closed out-of-band so a blocked read unblocks promptly.
    pub fn request_stop(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Ok(guard) = self.closer.lock() {
            if let Some(closer) = guard.as_ref() {
                closer.close();
            }
        }
    }

    /// Block until the worker thread has exited. A new worker must never be
    /// spawned until this has returned for the previous one.
    pub fn join(self) -> TransportResult<WorkerExit> {
        match self.join.join() {
            Ok(result) => result,
            Err(_) => Err(TransportError::Closed),
        }
    }

    /// True once the thread has returned, without blocking. Used by the
    /// reconnect policy to notice an unrequested exit (stall-induced stop,
    /// end of stream, or transport error) between ticks.
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }
}

pub struct GrabberWorker;

impl GrabberWorker {
    /// Spawn the worker thread. `state` is the grabber's single mutex;
    /// `config` is the immutable snapshot captured at connect time.
    pub fn spawn(
        config: CameraConfig,
        state: Arc<Mutex<GuardedState>>,
        transport: Arc<dyn HttpClient>,
        decoder: Arc<dyn JpegDecoder>,
        clock: Arc<dyn Clock>,
    ) -> WorkerHandle {
        let shutdown = Arc::new(AtomicBool::new(false));
        let closer_slot: Arc<Mutex<Option<Box<dyn ConnectionCloser>>>> =
            Arc::new(Mutex::new(None));

        let thread_shutdown = shutdown.clone();
        let thread_closer_slot = closer_slot.clone();

        let join = std::thread::spawn(move || {
            run(
                &config,
                &state,
                &thread_shutdown,
                &thread_closer_slot,
                transport.as_ref(),
                decoder.as_ref(),
                clock.as_ref(),
            )
        });

        WorkerHandle {
            join,
            shutdown,
            closer: closer_slot,
        }
    }
}

fn run(
    config: &CameraConfig,
    state: &Arc<Mutex<GuardedState>>,
    shutdown: &AtomicBool,
    closer_slot: &Mutex<Option<Box<dyn ConnectionCloser>>>,
    transport: &dyn HttpClient,
    decoder: &dyn JpegDecoder,
    clock: &dyn Clock,
) -> TransportResult<WorkerExit> {
    let request = HttpRequest::from_config(config);

    if let Some(proxy) = &config.proxy {
        log::info!("connecting via proxy {}:{}", proxy.host, proxy.port);
    }

    let open_result = transport.open(&request);
    let (headers, mut stream, closer) = match open_result {
        Ok(v) => v,
        Err(e) => {
            schedule_retry(state, config, clock, &e);
            return Err(e);
        }
    };

    *closer_slot.lock().unwrap() = Some(closer);

    let boundary = headers
        .content_type
        .as_deref()
        .and_then(extract_boundary_param)
        .unwrap_or_else(|| config.default_boundary_marker.clone());
    let boundary = normalize_boundary_marker(&boundary);

    let mut parser = MjpegParser::new(boundary, config.max_frame_bytes);
    let mut first_byte_seen = false;

    let exit = loop {
        if shutdown.load(Ordering::Relaxed) {
            break Ok(WorkerExit::Stopped);
        }

        match stream.read_byte() {
            Ok(Some(byte)) => {
                let now = clock.now_ms();
                {
                    let mut guard = state.lock().unwrap();
                    guard.stats.record_bytes(1);
                    if !first_byte_seen {
                        guard.stats.on_first_byte(now);
                        guard.connection_state = ConnectionState::Streaming;
                    }
                }
                first_byte_seen = true;

                if let Some(event) = parser.feed_byte(byte) {
                    handle_event(event, state, decoder);
                }
            }
            Ok(None) => break Ok(WorkerExit::EndOfStream),
            Err(e) => break Err(TransportError::Read(e.to_string())),
        }
    };

    match &exit {
        Ok(WorkerExit::EndOfStream) => {
            schedule_retry(state, config, clock, &TransportError::Closed);
        }
        Ok(WorkerExit::Stopped) => {
            // Cooperative shutdown, requested by the facade or the reconnect
            // policy. The caller decides whether that means "stay down" or
            // "retry"; the worker itself has no opinion.
        }
        Err(e) => schedule_retry(state, config, clock, e),
    }

    exit
}

fn handle_event(event: ParserEvent, state: &Arc<Mutex<GuardedState>>, decoder: &dyn JpegDecoder) {
    match event {
        ParserEvent::FrameComplete(bytes) => match decoder.decode(&bytes) {
            Ok(pixels) => {
                let mut guard = state.lock().unwrap();
                guard.frame_slot.install_back(pixels);
                guard.stats.record_frame();
            }
            Err(e) => {
                log::error!("jpeg decode failed: {e}");
            }
        },
        ParserEvent::Overflow => {
            log::error!("frame buffer overflow, resynchronizing at next boundary");
        }
        ParserEvent::Header { key, value } => {
            log::trace!("header {key}={value}");
        }
        ParserEvent::BoundaryHit => {
            log::trace!("boundary marker observed");
        }
    }
}

/// Records the requested reconnect under lock.
fn schedule_retry(
    state: &Arc<Mutex<GuardedState>>,
    config: &CameraConfig,
    clock: &dyn Clock,
    err: &TransportError,
) {
    log::error!("worker exiting: {err}");
    let mut guard = state.lock().unwrap();
    guard.reconnect.needs_reconnect = true;
    guard.reconnect.next_retry_at_ms = clock.now_ms() + config.auto_retry_delay_ms;
}

/// Extract the `boundary` parameter from a `Content-Type` header value,
/// matching the parameter name case-insensitively and tolerating optional
/// quoting/whitespace around the value.
fn extract_boundary_param(content_type: &str) -> Option<String> {
    content_type.split(';').skip(1).find_map(|param| {
        let (key, value) = param.split_once('=')?;
        if key.trim().eq_ignore_ascii_case("boundary") {
            Some(value.trim().trim_matches('"').to_string())
        } else {
            None
        }
    })
}
