//! MJPEG-over-HTTP connection internals: the byte-level parser, the
//! producer/consumer frame handoff, and the worker-thread run loop that
//! drives one camera's HTTP session.
//!
//! This crate has no opinion on reconnect policy or the public facade; see
//! `ipcam-core` for those.

pub mod clock;
pub mod config;
pub mod decoder;
pub mod error;
pub mod frame_slot;
pub mod parser;
pub mod shared;
pub mod state;
pub mod stats;
pub mod transport;
pub mod worker;

pub use clock::{Clock, SystemClock};
pub use config::{AuthMode, CameraConfig, PixelBuffer, PixelFormat, ProxyConfig, UriParts};
pub use decoder::{JpegDecoder, TurboJpegDecoder};
pub use error::{
    ConfigResult, ConfigurationError, DecodeError, DecodeResult, RetriesExhausted,
    TransportError, TransportResult,
};
pub use frame_slot::{Dimensions, FrameSlot};
pub use parser::{normalize_boundary_marker, MjpegParser, ParserEvent, MIN_JPEG_SIZE};
pub use shared::GuardedState;
pub use state::{ConnectionState, ReconnectState};
pub use stats::Statistics;
pub use transport::{ByteStream, ConnectionCloser, HttpClient, HttpRequest, ResponseHeaders, UreqTransport};
pub use worker::{GrabberWorker, WorkerExit, WorkerHandle};

/// Installs `env_logger` reading `RUST_LOG`. Intended for standalone use of
/// this crate without `ipcam-core`'s `tracing` based init; a no-op if a
/// logger is already set.
pub fn init_logging() {
    let _ = env_logger::try_init();
}
