//! Error types for the connection worker and its capability adapters.

use thiserror::Error;

/// Failures that terminate a [`crate::worker::GrabberWorker`] run and hand
/// control back to the reconnect policy.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("connect failed: {0}")]
    Connect(String),

    #[error("unexpected HTTP status: {0}")]
    BadStatus(u16),

    #[error("read failed: {0}")]
    Read(String),

    #[error("timed out after {0} ms")]
    Timeout(u64),

    #[error("connection closed")]
    Closed,
}

/// A well-framed JPEG payload that the decoder adapter could not decode.
/// Per-frame and non-fatal; the worker logs and continues.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("jpeg decode failed: {0}")]
    Failed(String),
}

/// Raised at `connect()` time for a malformed [`crate::config::CameraConfig`].
/// Non-fatal to the process: the grabber simply remains `Idle`.
#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("malformed URL: {0}")]
    InvalidUrl(String),

    #[error("proxy enabled but proxy host is empty")]
    EmptyProxyHost,
}

/// Returned by `connect()` when the grabber is already `FailedPermanently`.
/// Not itself an error condition the worker raises.
#[derive(Error, Debug)]
#[error("reconnect attempts exhausted; call reset() to try again")]
pub struct RetriesExhausted;

pub type TransportResult<T> = Result<T, TransportError>;
pub type DecodeResult<T> = Result<T, DecodeError>;
pub type ConfigResult<T> = Result<T, ConfigurationError>;
