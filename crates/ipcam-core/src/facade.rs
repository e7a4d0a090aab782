//! The public per-camera object: configuration, lifecycle, and frame/stat
//! access for one MJPEG stream.

use crate::error::{GrabberError, GrabberResult};
use crate::events::{EventBus, ResizeEvent};
use crate::reconnect::ReconnectController;
use ipcam_stream::{
    CameraConfig, Clock, ConnectionState, GuardedState, HttpClient, JpegDecoder, PixelBuffer,
    UriParts,
};
use std::sync::{Arc, Mutex};

/// Composes a `ReconnectController` with the facade-owned pieces kept off
/// the shared mutex: the pending/active config, the current front-buffer
/// copy, and the resize event bus.
pub struct IpVideoGrabber {
    config: CameraConfig,
    pending_config: Option<CameraConfig>,
    state: Arc<Mutex<GuardedState>>,
    clock: Arc<dyn Clock>,
    reconnect: ReconnectController,
    events: EventBus,
    current_frame: PixelBuffer,
    frame_is_new: bool,
    last_framerate: f64,
    last_bitrate_bps: f64,
}

impl IpVideoGrabber {
    pub fn new(
        config: CameraConfig,
        transport: Arc<dyn HttpClient>,
        decoder: Arc<dyn JpegDecoder>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let state = Arc::new(Mutex::new(GuardedState::new()));
        let reconnect =
            ReconnectController::new(state.clone(), transport, decoder, clock.clone());

        IpVideoGrabber {
            config,
            pending_config: None,
            state,
            clock,
            reconnect,
            events: EventBus::new(),
            current_frame: PixelBuffer::placeholder(),
            frame_is_new: false,
            last_framerate: 0.0,
            last_bitrate_bps: 0.0,
        }
    }

    /// Takes effect on the next `connect()`. If a session is currently
    /// active, the new settings are accepted for later use and a warning is
    /// logged.
    pub fn configure(&mut self, config: CameraConfig) {
        if self.connection_state() != ConnectionState::Idle {
            tracing::warn!(
                camera = %self.camera_name(),
                "configure() called on an active session; new settings apply on next connect"
            );
        }
        self.pending_config = Some(config);
    }

    /// Register an observer for `videoResized` events, delivered
    /// synchronously from `tick()` with the facade's mutex already released.
    pub fn on_resize(&mut self, observer: impl Fn(ResizeEvent) + Send + 'static) {
        self.events.subscribe(Box::new(observer));
    }

    /// Idle -> Connecting. Fails with `NotIdle` from any other state, and
    /// with `RetriesExhausted` specifically from `FailedPermanently`.
    pub fn connect(&mut self) -> GrabberResult<()> {
        match self.connection_state() {
            ConnectionState::Idle => {}
            ConnectionState::FailedPermanently => {
                return Err(GrabberError::RetriesExhausted(
                    ipcam_stream::RetriesExhausted,
                ))
            }
            _ => return Err(GrabberError::NotIdle),
        }

        if let Some(pending) = self.pending_config.take() {
            self.config = pending;
        }
        self.config.uri_parts()?;

        let _ = self.reconnect.connect(&self.config);
        Ok(())
    }

    pub fn disconnect(&mut self) {
        self.reconnect.disconnect();
    }

    pub fn wait_for_disconnect(&mut self) {
        self.reconnect.wait_for_disconnect();
    }

    /// Clears reconnect counters and the permanent-failure flag. Does not
    /// itself disconnect.
    pub fn reset(&mut self) {
        self.reconnect.reset();
    }

    /// Promotes the back slot if ready, emits a resize event on dimension
    /// change, recomputes derived stats, and evaluates the reconnect state
    /// machine. Safe to call at any rate; correctness never depends on tick
    /// frequency.
    pub fn tick(&mut self) {
        let now = self.clock.now_ms();

        let (framerate, bitrate_bps) = {
            let mut guard = self.state.lock().unwrap();
            guard.stats.recompute(now)
        };
        self.last_framerate = framerate;
        self.last_bitrate_bps = bitrate_bps;

        self.reconnect.tick(&self.config, bitrate_bps);

        let promoted = {
            let mut guard = self.state.lock().unwrap();
            let promoted = guard.frame_slot.try_promote();
            if promoted.is_some() {
                self.current_frame = guard.frame_slot.front().clone();
            }
            promoted
        };

        self.frame_is_new = promoted.is_some();
        if let Some((old, new)) = promoted {
            if old != new {
                self.events.enqueue(ResizeEvent {
                    width: new.width,
                    height: new.height,
                });
            }
        }
        self.events.dispatch_pending();
    }

    /// The most recently promoted frame, or a 1x1 placeholder before the
    /// first successful decode.
    pub fn frame(&self) -> &PixelBuffer {
        &self.current_frame
    }

    /// True exactly for the tick that promoted a new frame.
    pub fn is_frame_new(&self) -> bool {
        self.frame_is_new
    }

    pub fn framerate(&self) -> f64 {
        self.last_framerate
    }

    pub fn bitrate_bps(&self) -> f64 {
        self.last_bitrate_bps
    }

    pub fn frames_in(&self) -> u64 {
        self.state.lock().unwrap().stats.frames_in
    }

    pub fn bytes_in(&self) -> u64 {
        self.state.lock().unwrap().stats.bytes_in
    }

    pub fn reconnect_count(&self) -> u64 {
        self.state.lock().unwrap().reconnect.reconnect_count
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.state.lock().unwrap().connection_state
    }

    pub fn is_connected(&self) -> bool {
        matches!(
            self.connection_state(),
            ConnectionState::Connecting | ConnectionState::Streaming | ConnectionState::Stalled
        )
    }

    pub fn has_connection_failed(&self) -> bool {
        self.connection_state() == ConnectionState::FailedPermanently
    }

    pub fn uri_parts(&self) -> GrabberResult<UriParts> {
        Ok(self.config.uri_parts()?)
    }

    /// Falls back to the configured URL string when no explicit name was
    /// set.
    pub fn camera_name(&self) -> String {
        if self.config.name.is_empty() {
            self.config.url.clone()
        } else {
            self.config.name.clone()
        }
    }
}

impl Drop for IpVideoGrabber {
    /// A grabber dropped without an explicit `disconnect()` never leaks a
    /// running worker thread.
    fn drop(&mut self) {
        self.reconnect.disconnect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ipcam_stream::{
        ByteStream, ConnectionCloser, DecodeResult, HttpRequest, PixelFormat, ResponseHeaders,
        TransportError, TransportResult,
    };
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
    use std::time::Duration;

    /// Settable/advanceable millisecond counter.
    struct FakeClock(AtomicU64);

    impl FakeClock {
        fn new() -> Arc<Self> {
            Arc::new(FakeClock(AtomicU64::new(0)))
        }
        fn advance(&self, ms: u64) {
            self.0.fetch_add(ms, Ordering::SeqCst);
        }
    }

    impl Clock for FakeClock {
        fn now_ms(&self) -> u64 {
            self.0.load(Ordering::SeqCst)
        }
    }

    /// Yields a pre-built byte sequence; once exhausted it blocks (spin-waits)
    /// until force-closed, simulating a server that stops sending but never
    /// closes the connection.
    struct ScriptedByteStream {
        bytes: std::vec::IntoIter<u8>,
        closed: Arc<AtomicBool>,
    }

    impl ByteStream for ScriptedByteStream {
        fn read_byte(&mut self) -> std::io::Result<Option<u8>> {
            loop {
                if let Some(b) = self.bytes.next() {
                    return Ok(Some(b));
                }
                if self.closed.load(Ordering::Relaxed) {
                    return Ok(None);
                }
                std::thread::sleep(Duration::from_millis(2));
            }
        }
    }

    struct ScriptedCloser(Arc<AtomicBool>);

    impl ConnectionCloser for ScriptedCloser {
        fn close(&self) {
            self.0.store(true, Ordering::Relaxed);
        }
    }

    /// Always yields the same scripted body and boundary, or always fails,
    /// depending on how it's constructed.
    struct ScriptedTransport {
        body: Vec<u8>,
        content_type: String,
        fail: bool,
    }

    impl HttpClient for ScriptedTransport {
        fn open(
            &self,
            _request: &HttpRequest,
        ) -> TransportResult<(ResponseHeaders, Box<dyn ByteStream>, Box<dyn ConnectionCloser>)>
        {
            if self.fail {
                return Err(TransportError::Connect("refused".to_string()));
            }
            let closed = Arc::new(AtomicBool::new(false));
            let headers = ResponseHeaders {
                status: 200,
                content_type: Some(self.content_type.clone()),
            };
            let stream = ScriptedByteStream {
                bytes: self.body.clone().into_iter(),
                closed: closed.clone(),
            };
            Ok((headers, Box::new(stream), Box::new(ScriptedCloser(closed))))
        }
    }

    /// Returns a canned `PixelBuffer` of a fixed size on every call.
    struct FixedSizeDecoder {
        width: u32,
        height: u32,
        calls: AtomicUsize,
    }

    impl FixedSizeDecoder {
        fn new(width: u32, height: u32) -> Self {
            FixedSizeDecoder {
                width,
                height,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl JpegDecoder for FixedSizeDecoder {
        fn decode(&self, _bytes: &[u8]) -> DecodeResult<PixelBuffer> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(PixelBuffer {
                width: self.width,
                height: self.height,
                pixel_format: PixelFormat::Rgb24,
                bytes: vec![0u8; (self.width * self.height * 3) as usize],
            })
        }
    }

    /// Returns a different size on each successive call, holding the last
    /// size once the script runs out.
    struct SequentialDecoder {
        sizes: Mutex<VecDeque<(u32, u32)>>,
        last: Mutex<(u32, u32)>,
    }

    impl SequentialDecoder {
        fn new(sizes: Vec<(u32, u32)>) -> Self {
            SequentialDecoder {
                sizes: Mutex::new(sizes.into()),
                last: Mutex::new((0, 0)),
            }
        }
    }

    impl JpegDecoder for SequentialDecoder {
        fn decode(&self, _bytes: &[u8]) -> DecodeResult<PixelBuffer> {
            let mut sizes = self.sizes.lock().unwrap();
            let (width, height) = sizes.pop_front().unwrap_or(*self.last.lock().unwrap());
            *self.last.lock().unwrap() = (width, height);
            Ok(PixelBuffer {
                width,
                height,
                pixel_format: PixelFormat::Rgb24,
                bytes: vec![0u8; (width * height * 3) as usize],
            })
        }
    }

    fn valid_jpeg(total_len: usize) -> Vec<u8> {
        let mut bytes = vec![0u8; total_len];
        bytes[0] = 0xFF;
        bytes[1] = 0xD8;
        bytes[total_len - 2] = 0xFF;
        bytes[total_len - 1] = 0xD9;
        bytes
    }

    fn part_header() -> &'static str {
        "--myboundary\r\nContent-Type: image/jpeg\r\n\r\n"
    }

    fn poll_until(mut condition: impl FnMut() -> bool) {
        for _ in 0..500 {
            if condition() {
                return;
            }
            std::thread::sleep(Duration::from_millis(2));
        }
        panic!("condition not met within timeout");
    }

    #[test]
    fn camera_name_falls_back_to_url_when_unset() {
        let grabber = IpVideoGrabber::new(
            CameraConfig::new("http://10.0.0.9/video.cgi"),
            Arc::new(ScriptedTransport {
                body: Vec::new(),
                content_type: String::new(),
                fail: true,
            }),
            Arc::new(FixedSizeDecoder::new(1, 1)),
            FakeClock::new(),
        );
        assert_eq!(grabber.camera_name(), "http://10.0.0.9/video.cgi");
    }

    #[test]
    fn connect_rejects_re_entry_before_idle() {
        let mut grabber = IpVideoGrabber::new(
            CameraConfig::new("http://10.0.0.9/video.cgi"),
            Arc::new(ScriptedTransport {
                body: Vec::new(),
                content_type: String::new(),
                fail: true,
            }),
            Arc::new(FixedSizeDecoder::new(1, 1)),
            FakeClock::new(),
        );
        grabber.connect().unwrap();
        assert!(matches!(grabber.connect(), Err(GrabberError::NotIdle)));
    }

    #[test]
    fn scenario_single_frame_happy_path() {
        let jpeg = valid_jpeg(200);
        let mut body = part_header().as_bytes().to_vec();
        body.extend_from_slice(&jpeg);
        body.extend_from_slice(b"\r\n--myboundary--");

        let transport = ScriptedTransport {
            body,
            content_type: "multipart/x-mixed-replace; boundary=myboundary".to_string(),
            fail: false,
        };
        let mut grabber = IpVideoGrabber::new(
            CameraConfig::new("http://camera/video.cgi"),
            Arc::new(transport),
            Arc::new(FixedSizeDecoder::new(320, 240)),
            FakeClock::new(),
        );

        grabber.connect().unwrap();
        poll_until(|| grabber.frames_in() == 1);

        grabber.tick();
        assert!(grabber.is_frame_new());
        assert_eq!(grabber.frame().width, 320);
        assert_eq!(grabber.frames_in(), 1);
    }

    #[test]
    fn scenario_three_frames_resize_once() {
        let mut body = Vec::new();
        for _ in 0..2 {
            body.extend_from_slice(part_header().as_bytes());
            body.extend_from_slice(&valid_jpeg(200));
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(part_header().as_bytes());
        body.extend_from_slice(&valid_jpeg(200));
        body.extend_from_slice(b"\r\n--myboundary--");

        let transport = ScriptedTransport {
            body,
            content_type: "multipart/x-mixed-replace; boundary=myboundary".to_string(),
            fail: false,
        };
        let decoder = SequentialDecoder::new(vec![(320, 240), (320, 240), (640, 480)]);
        let mut grabber = IpVideoGrabber::new(
            CameraConfig::new("http://camera/video.cgi"),
            Arc::new(transport),
            Arc::new(decoder),
            FakeClock::new(),
        );

        grabber.connect().unwrap();

        let resize_count = Arc::new(AtomicUsize::new(0));
        {
            let counter = resize_count.clone();
            grabber.on_resize(move |_event| {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }

        for expected in 1..=3u64 {
            poll_until(|| grabber.frames_in() >= expected);
            grabber.tick();
        }

        assert_eq!(grabber.frames_in(), 3);
        assert_eq!(resize_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn scenario_runt_frame_suppressed() {
        let mut body = part_header().as_bytes().to_vec();
        body.extend_from_slice(&[0xFF, 0xD8, 0xFF, 0xD9]); // 4-byte runt
        body.extend_from_slice(b"\r\n--myboundary--");

        let transport = ScriptedTransport {
            body,
            content_type: "multipart/x-mixed-replace; boundary=myboundary".to_string(),
            fail: false,
        };
        let decoder = Arc::new(FixedSizeDecoder::new(320, 240));
        let mut grabber = IpVideoGrabber::new(
            CameraConfig::new("http://camera/video.cgi"),
            Arc::new(transport),
            decoder.clone(),
            FakeClock::new(),
        );

        grabber.connect().unwrap();
        poll_until(|| grabber.connection_state() != ConnectionState::Connecting);
        std::thread::sleep(Duration::from_millis(20));

        grabber.tick();
        assert_eq!(grabber.frames_in(), 0);
        assert_eq!(decoder.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn scenario_non_standard_boundary_without_dashes() {
        let mut body = part_header().as_bytes().to_vec();
        body.extend_from_slice(&valid_jpeg(200));
        body.extend_from_slice(b"\r\n--myboundary--");

        let transport = ScriptedTransport {
            body,
            content_type: "multipart/x-mixed-replace;boundary=myboundary".to_string(), // no leading --
            fail: false,
        };
        let mut grabber = IpVideoGrabber::new(
            CameraConfig::new("http://camera/video.cgi"),
            Arc::new(transport),
            Arc::new(FixedSizeDecoder::new(320, 240)),
            FakeClock::new(),
        );

        grabber.connect().unwrap();
        poll_until(|| grabber.frames_in() == 1);
        grabber.tick();
        assert_eq!(grabber.frames_in(), 1);
    }

    #[test]
    fn scenario_stall_triggers_reconnect() {
        let jpeg = valid_jpeg(200);
        let mut body = part_header().as_bytes().to_vec();
        body.extend_from_slice(&jpeg);

        let transport = ScriptedTransport {
            body,
            content_type: "multipart/x-mixed-replace; boundary=myboundary".to_string(),
            fail: false,
        };
        let clock = FakeClock::new();
        let mut config = CameraConfig::new("http://camera/video.cgi");
        config.min_bitrate_bps = 1000.0;
        config.reconnect_timeout_ms = 500;
        config.auto_retry_delay_ms = 100;
        config.max_reconnects = 3;

        let mut grabber = IpVideoGrabber::new(
            config,
            Arc::new(transport),
            Arc::new(FixedSizeDecoder::new(320, 240)),
            clock.clone(),
        );

        grabber.connect().unwrap();
        poll_until(|| grabber.frames_in() == 1);

        grabber.tick(); // elapsed ~0, no stall judgment possible yet
        clock.advance(600);
        grabber.tick(); // healthy burst bitrate, last_valid_bitrate_ms updated
        assert_eq!(grabber.connection_state(), ConnectionState::Streaming);

        clock.advance(2000);
        grabber.tick(); // cumulative bitrate now below the floor, stall window exceeded
        assert_eq!(grabber.connection_state(), ConnectionState::Stalled);

        poll_until(|| {
            clock.advance(10);
            grabber.tick();
            grabber.connection_state() == ConnectionState::WaitingToRetry
        });

        clock.advance(200);
        grabber.tick();
        assert_eq!(grabber.connection_state(), ConnectionState::Connecting);
        assert_eq!(grabber.reconnect_count(), 2);
    }

    #[test]
    fn scenario_retry_exhaustion_then_reset() {
        let transport = ScriptedTransport {
            body: Vec::new(),
            content_type: String::new(),
            fail: true,
        };
        let clock = FakeClock::new();
        let mut config = CameraConfig::new("http://camera/video.cgi");
        config.auto_retry_delay_ms = 50;
        config.max_reconnects = 2;

        let mut grabber = IpVideoGrabber::new(
            config,
            Arc::new(transport),
            Arc::new(FixedSizeDecoder::new(1, 1)),
            clock.clone(),
        );

        grabber.connect().unwrap();

        for _ in 0..4 {
            poll_until(|| {
                clock.advance(60);
                grabber.tick();
                grabber.connection_state() == ConnectionState::WaitingToRetry
                    || grabber.connection_state() == ConnectionState::FailedPermanently
            });
            if grabber.has_connection_failed() {
                break;
            }
        }

        assert!(grabber.has_connection_failed());
        assert_eq!(grabber.reconnect_count(), 3); // initial attempt + 2 retries
        assert!(matches!(
            grabber.connect(),
            Err(GrabberError::RetriesExhausted(_))
        ));

        grabber.reset();
        assert_eq!(grabber.connection_state(), ConnectionState::Idle);
        assert_eq!(grabber.reconnect_count(), 0);
        assert!(!grabber.has_connection_failed());
    }
}
