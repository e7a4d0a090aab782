//! Cumulative throughput counters and the derived bitrate/framerate used by
//! the stall detector.

/// Counters are always updated under the grabber mutex; the derived fields
/// are recomputed by the consumer on each `tick()`, not incrementally.
#[derive(Debug, Clone)]
pub struct Statistics {
    pub connect_time_ms: u64,
    pub elapsed_ms: u64,
    pub bytes_in: u64,
    pub frames_in: u64,
    pub last_valid_bitrate_ms: u64,
}

impl Statistics {
    pub fn new() -> Self {
        Statistics {
            connect_time_ms: 0,
            elapsed_ms: 0,
            bytes_in: 0,
            frames_in: 0,
            last_valid_bitrate_ms: 0,
        }
    }

    /// Reset on each successful reconnect.
    pub fn reset(&mut self, now_ms: u64) {
        self.connect_time_ms = now_ms;
        self.elapsed_ms = 0;
        self.bytes_in = 0;
        self.frames_in = 0;
        self.last_valid_bitrate_ms = 0;
    }

    pub fn on_first_byte(&mut self, now_ms: u64) {
        self.connect_time_ms = now_ms;
    }

    pub fn record_bytes(&mut self, n: u64) {
        self.bytes_in += n;
    }

    pub fn record_frame(&mut self) {
        self.frames_in += 1;
    }

    /// Recompute `elapsed_ms` and the derived rates for `now_ms`.
    pub fn recompute(&mut self, now_ms: u64) -> (f64, f64) {
        self.elapsed_ms = if self.connect_time_ms == 0 {
            0
        } else {
            now_ms.saturating_sub(self.connect_time_ms)
        };

        if self.elapsed_ms == 0 {
            return (0.0, 0.0);
        }

        let elapsed_s = self.elapsed_ms as f64 / 1000.0;
        let framerate = self.frames_in as f64 / elapsed_s;
        let bitrate_bps = (self.bytes_in as f64 * 8.0) / elapsed_s;
        (framerate, bitrate_bps)
    }
}

impl Default for Statistics {
    fn default() -> Self {
        Self::new()
    }
}
