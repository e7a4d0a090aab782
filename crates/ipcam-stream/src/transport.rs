//! The `HttpClient` capability boundary and a `ureq`-backed implementation.

use crate::config::{CameraConfig, ProxyConfig};
use crate::error::{TransportError, TransportResult};
use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// One outbound GET, fully specified up front. Built from a `CameraConfig`
/// snapshot by the worker at session start.
pub struct HttpRequest {
    pub url: String,
    pub basic_auth: Option<(String, String)>,
    pub cookie_header: Option<String>,
    pub proxy: Option<ProxyConfig>,
    pub timeout_ms: u64,
}

impl HttpRequest {
    pub fn from_config(config: &CameraConfig) -> Self {
        use crate::config::AuthMode;

        let basic_auth = matches!(config.auth_mode, AuthMode::Basic)
            .then(|| (config.username.clone(), config.password.clone()));

        let cookie_header = if config.cookies.is_empty() {
            None
        } else {
            Some(
                config
                    .cookies
                    .iter()
                    .map(|(k, v)| format!("{k}={v}"))
                    .collect::<Vec<_>>()
                    .join("; "),
            )
        };

        HttpRequest {
            url: config.url.clone(),
            basic_auth,
            cookie_header,
            proxy: config.proxy.clone(),
            timeout_ms: config.session_timeout_ms,
        }
    }
}

/// Headers the worker cares about from the response.
#[derive(Debug, Clone)]
pub struct ResponseHeaders {
    pub status: u16,
    pub content_type: Option<String>,
}

/// Yields response body bytes one at a time. Errors surface as `io::Error`;
/// `Ok(None)` means a clean end of stream.
pub trait ByteStream: Send {
    fn read_byte(&mut self) -> std::io::Result<Option<u8>>;
}

/// A handle that can force a [`ByteStream`] to stop yielding bytes from a
/// thread other than the one reading it. Used when a server refuses to close
/// its end of the connection and the worker would otherwise block forever on
/// the next read.
pub trait ConnectionCloser: Send + Sync {
    fn close(&self);
}

pub trait HttpClient: Send + Sync {
    #[allow(clippy::type_complexity)]
    fn open(
        &self,
        request: &HttpRequest,
    ) -> TransportResult<(ResponseHeaders, Box<dyn ByteStream>, Box<dyn ConnectionCloser>)>;
}

/// Real transport backed by the blocking `ureq` client.
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new() -> Self {
        UreqTransport {
            agent: ureq::Agent::new_with_defaults(),
        }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClient for UreqTransport {
    fn open(
        &self,
        request: &HttpRequest,
    ) -> TransportResult<(ResponseHeaders, Box<dyn ByteStream>, Box<dyn ConnectionCloser>)> {
        if let Some(proxy) = &request.proxy {
            if proxy.host.is_empty() {
                log::error!("proxy enabled but proxy host is empty; continuing direct");
            }
        }

        let mut req = self
            .agent
            .get(&request.url)
            .config()
            .timeout_connect(Some(std::time::Duration::from_millis(request.timeout_ms)))
            .timeout_recv_response(Some(std::time::Duration::from_millis(
                request.timeout_ms,
            )))
            .build();

        if let Some((user, pass)) = &request.basic_auth {
            let encoded = base64::Engine::encode(
                &base64::engine::general_purpose::STANDARD,
                format!("{user}:{pass}"),
            );
            req = req.header("Authorization", &format!("Basic {encoded}"));
        }
        if let Some(cookie) = &request.cookie_header {
            req = req.header("Cookie", cookie);
        }

        let response = req
            .call()
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        let status = response.status().as_u16();
        if status != 200 {
            return Err(TransportError::BadStatus(status));
        }

        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let headers = ResponseHeaders {
            status,
            content_type,
        };

        let closed = Arc::new(AtomicBool::new(false));
        let reader = response.into_body().into_reader();
        let stream = UreqByteStream {
            reader,
            closed: closed.clone(),
            buf: [0u8; 1],
        };
        let closer = UreqCloser { closed };

        Ok((headers, Box::new(stream), Box::new(closer)))
    }
}

struct UreqByteStream {
    reader: Box<dyn Read + Send + Sync + 'static>,
    closed: Arc<AtomicBool>,
    buf: [u8; 1],
}

impl ByteStream for UreqByteStream {
    fn read_byte(&mut self) -> std::io::Result<Option<u8>> {
        if self.closed.load(Ordering::Relaxed) {
            return Ok(None);
        }
        match self.reader.read(&mut self.buf) {
            Ok(0) => Ok(None),
            Ok(_) => Ok(Some(self.buf[0])),
            Err(e) => Err(e),
        }
    }
}

/// `ureq`'s response reader doesn't expose the underlying socket, so an
/// out-of-band close is modeled as a flag the reader checks before every
/// read rather than a true TCP-level shutdown. Combined with the shutdown
/// atomic the worker already checks between bytes, this still unblocks a
/// stuck read loop promptly.
struct UreqCloser {
    closed: Arc<AtomicBool>,
}

impl ConnectionCloser for UreqCloser {
    fn close(&self) {
        self.closed.store(true, Ordering::Relaxed);
    }
}
