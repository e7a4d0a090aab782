//! Immutable per-connection configuration and the pixel payload type.

use crate::error::{ConfigResult, ConfigurationError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// How the worker authenticates the HTTP GET request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AuthMode {
    None,
    Basic,
    Cookie,
}

impl Default for AuthMode {
    fn default() -> Self {
        AuthMode::None
    }
}

/// Optional outbound HTTP proxy.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProxyConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

/// Immutable settings snapshot captured at connect time. Live setters on the
/// facade mutate a pending copy of this struct; the worker only ever sees the
/// snapshot that was current when it was spawned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraConfig {
    pub url: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default, rename = "auth-type")]
    pub auth_mode: AuthMode,
    #[serde(default)]
    pub cookies: HashMap<String, String>,
    #[serde(default)]
    pub proxy: Option<ProxyConfig>,
    #[serde(default = "default_boundary_marker")]
    pub default_boundary_marker: String,
    #[serde(default = "default_session_timeout_ms")]
    pub session_timeout_ms: u64,
    #[serde(default = "default_reconnect_timeout_ms")]
    pub reconnect_timeout_ms: u64,
    #[serde(default = "default_auto_retry_delay_ms")]
    pub auto_retry_delay_ms: u64,
    #[serde(default = "default_min_bitrate_bps")]
    pub min_bitrate_bps: f64,
    /// -1 means unbounded.
    #[serde(default = "default_max_reconnects")]
    pub max_reconnects: i64,
    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,
    #[serde(default)]
    pub name: String,
}

fn default_boundary_marker() -> String {
    "--myboundary".to_string()
}
fn default_session_timeout_ms() -> u64 {
    2_000
}
fn default_reconnect_timeout_ms() -> u64 {
    5_000
}
fn default_auto_retry_delay_ms() -> u64 {
    1_000
}
fn default_min_bitrate_bps() -> f64 {
    8.0
}
fn default_max_reconnects() -> i64 {
    20
}
fn default_max_frame_bytes() -> usize {
    512 * 1024
}

impl CameraConfig {
    /// A bare-minimum config pointing at `url`, all other fields defaulted.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            username: String::new(),
            password: String::new(),
            auth_mode: AuthMode::None,
            cookies: HashMap::new(),
            proxy: None,
            default_boundary_marker: default_boundary_marker(),
            session_timeout_ms: default_session_timeout_ms(),
            reconnect_timeout_ms: default_reconnect_timeout_ms(),
            auto_retry_delay_ms: default_auto_retry_delay_ms(),
            min_bitrate_bps: default_min_bitrate_bps(),
            max_reconnects: default_max_reconnects(),
            max_frame_bytes: default_max_frame_bytes(),
            name: String::new(),
        }
    }

    pub fn uses_proxy(&self) -> bool {
        self.proxy.as_ref().is_some_and(|p| !p.host.is_empty())
    }

    /// Parse and validate `url`, extracting host/port/path+query. Called at
    /// `connect()` time; a malformed URL keeps the grabber `Idle`.
    pub fn uri_parts(&self) -> ConfigResult<UriParts> {
        let parsed =
            url::Url::parse(&self.url).map_err(|e| ConfigurationError::InvalidUrl(e.to_string()))?;

        let host = parsed
            .host_str()
            .ok_or_else(|| ConfigurationError::InvalidUrl("missing host".to_string()))?
            .to_string();

        let port = parsed
            .port_or_known_default()
            .ok_or_else(|| ConfigurationError::InvalidUrl("no known port for scheme".to_string()))?;

        let mut path = parsed.path().to_string();
        if let Some(query) = parsed.query() {
            path.push('?');
            path.push_str(query);
        }

        Ok(UriParts {
            scheme: parsed.scheme().to_string(),
            host,
            port,
            path,
        })
    }
}

/// Host/port/path+query extracted from `CameraConfig::url`, exposed to
/// callers via `IpVideoGrabber` getters.
#[derive(Debug, Clone)]
pub struct UriParts {
    pub scheme: String,
    pub host: String,
    pub port: u16,
    pub path: String,
}

/// Decoded RGB24 image. Immutable once produced.
#[derive(Debug, Clone)]
pub struct PixelBuffer {
    pub width: u32,
    pub height: u32,
    pub pixel_format: PixelFormat,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    Rgb24,
}

impl PixelBuffer {
    /// The 1x1 zero-initialized placeholder returned by `frame()` before the
    /// first successful decode.
    pub fn placeholder() -> Self {
        PixelBuffer {
            width: 1,
            height: 1,
            pixel_format: PixelFormat::Rgb24,
            bytes: vec![0, 0, 0],
        }
    }
}
