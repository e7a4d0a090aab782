//! Byte-driven `multipart/x-mixed-replace` parser.
//!
//! One state machine, one scratch buffer, no allocation on the steady-state
//! path once the scratch buffer has grown to its working size.

/// Minimum number of bytes (inclusive of SOI/EOI) for a JPEG payload to be
/// treated as valid. Some cameras emit consecutive EOIs with no real frame in
/// between; this floor filters those out.
pub const MIN_JPEG_SIZE: usize = 134;

const JFF: u8 = 0xFF;
const SOI: u8 = 0xD8;
const EOI: u8 = 0xD9;
const CR: u8 = b'\r';
const LF: u8 = b'\n';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Header,
    Jpeg,
}

/// Events emitted while feeding bytes through [`MjpegParser`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParserEvent {
    /// A `key: value` header line was closed by CRLF.
    Header { key: String, value: String },
    /// A line exactly matched the configured boundary marker.
    BoundaryHit,
    /// A complete JPEG payload (`FF D8 ..= FF D9`) at least [`MIN_JPEG_SIZE`]
    /// bytes long.
    FrameComplete(Vec<u8>),
    /// The scratch buffer exceeded `max_frame_bytes` before an EOI was seen.
    /// The parser has already reset itself to `Header`.
    Overflow,
}

/// Pure byte-driven state machine. Holds no I/O handles and performs no
/// locking; the worker owns it exclusively.
pub struct MjpegParser {
    boundary_marker: String,
    max_frame_bytes: usize,
    mode: Mode,
    scratch: Vec<u8>,
}

impl MjpegParser {
    /// `boundary_marker` must already be normalized (leading `--`); see
    /// [`normalize_boundary_marker`].
    pub fn new(boundary_marker: String, max_frame_bytes: usize) -> Self {
        MjpegParser {
            boundary_marker,
            max_frame_bytes,
            mode: Mode::Header,
            scratch: Vec::with_capacity(4096),
        }
    }

    /// Feed a single byte, returning at most one event.
    pub fn feed_byte(&mut self, byte: u8) -> Option<ParserEvent> {
        self.scratch.push(byte);

        let event = if self.scratch.len() >= 2 {
            let len = self.scratch.len();
            let prev = self.scratch[len - 2];
            let cur = self.scratch[len - 1];

            if self.mode == Mode::Header && prev == CR && cur == LF {
                self.close_header_line()
            } else if prev == JFF && cur == SOI && self.mode == Mode::Header {
                self.mode = Mode::Jpeg;
                None
            } else if prev == JFF && cur == EOI && self.mode == Mode::Jpeg {
                self.close_jpeg_payload()
            } else {
                None
            }
        } else {
            None
        };

        if event.is_some() {
            return event;
        }

        if self.scratch.len() > self.max_frame_bytes {
            self.scratch.clear();
            self.mode = Mode::Header;
            return Some(ParserEvent::Overflow);
        }

        None
    }

    /// Feed a slice, returning every event produced in order. Parsing the
    /// same bytes as one slice or as any sequence of smaller chunks yields
    /// identical event sequences.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<ParserEvent> {
        let mut events = Vec::new();
        for &b in bytes {
            if let Some(ev) = self.feed_byte(b) {
                events.push(ev);
            }
        }
        events
    }

    /// CRLF closed a header line. The line content is everything before the
    /// `\r` (the `\n` is the last byte of `scratch`).
    fn close_header_line(&mut self) -> Option<ParserEvent> {
        let line_end = self.scratch.len() - 1; // index of '\n'
        let content = &self.scratch[..line_end.saturating_sub(1)];
        let line = String::from_utf8_lossy(content).trim().to_string();

        let event = if line.is_empty() {
            None
        } else if let Some((key, value)) = split_header(&line) {
            Some(ParserEvent::Header { key, value })
        } else if line == self.boundary_marker {
            Some(ParserEvent::BoundaryHit)
        } else {
            None
        };

        self.scratch.clear();
        event
    }

    /// `FF D9` closed a JPEG payload that began at the first `FF D8` seen
    /// while in `Header`.
    fn close_jpeg_payload(&mut self) -> Option<ParserEvent> {
        let payload_len = self.scratch.len();
        let event = if payload_len >= MIN_JPEG_SIZE {
            Some(ParserEvent::FrameComplete(std::mem::take(&mut self.scratch)))
        } else {
            None
        };
        self.scratch.clear();
        self.mode = Mode::Header;
        event
    }
}

/// Split a header line on the first `:`, trimming both sides. Returns `None`
/// if there is no `:` (e.g. the line is a boundary marker or stray text).
fn split_header(line: &str) -> Option<(String, String)> {
    let idx = line.find(':')?;
    let key = line[..idx].trim().to_string();
    let value = line[idx + 1..].trim().to_string();
    if key.is_empty() {
        None
    } else {
        Some((key, value))
    }
}

/// Prepend `--` if the server-supplied (or default) marker doesn't already
/// start with it.
pub fn normalize_boundary_marker(marker: &str) -> String {
    if marker.starts_with("--") {
        marker.to_string()
    } else {
        format!("--{marker}")
    }
}
