//! Facade-level error type, rolling up the lower-level errors from
//! `ipcam-stream`.

use ipcam_stream::{ConfigurationError, RetriesExhausted};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GrabberError {
    #[error("invalid configuration: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    RetriesExhausted(#[from] RetriesExhausted),

    #[error("grabber is not Idle")]
    NotIdle,

    #[error("failed to load settings: {0}")]
    Settings(#[from] SettingsError),
}

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("io error reading settings file: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed settings JSON: {0}")]
    Json(#[from] serde_json::Error),
}

pub type GrabberResult<T> = Result<T, GrabberError>;
pub type SettingsResult<T> = Result<T, SettingsError>;
