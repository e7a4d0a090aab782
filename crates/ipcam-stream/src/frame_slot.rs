//! Lock-protected double buffer for pixel handoff between the worker thread
//! and the consumer thread.

use crate::config::PixelBuffer;

/// Dimensions observed before and after a promotion, used by the caller to
/// decide whether to fire a resize event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Two-element rotating buffer plus a "back buffer ready" flag. Every method
/// here is called with the grabber's single mutex already held; `FrameSlot`
/// itself does no locking.
pub struct FrameSlot {
    buffers: [PixelBuffer; 2],
    front_index: usize,
    back_ready: bool,
}

impl FrameSlot {
    pub fn new() -> Self {
        FrameSlot {
            buffers: [PixelBuffer::placeholder(), PixelBuffer::placeholder()],
            front_index: 0,
            back_ready: false,
        }
    }

    fn back_index(&self) -> usize {
        self.front_index ^ 1
    }

    /// Replace the back-slot pixels and mark it ready. Called by the worker.
    pub fn install_back(&mut self, pixels: PixelBuffer) {
        let back = self.back_index();
        self.buffers[back] = pixels;
        self.back_ready = true;
    }

    /// If a complete frame is waiting, swap front/back and clear the flag.
    /// Returns the pre/post dimensions so the caller can decide whether a
    /// resize notification is warranted. Called by the consumer tick.
    pub fn try_promote(&mut self) -> Option<(Dimensions, Dimensions)> {
        if !self.back_ready {
            return None;
        }
        let old = self.dims(self.front_index);
        self.front_index ^= 1;
        self.back_ready = false;
        let new = self.dims(self.front_index);
        Some((old, new))
    }

    /// Read-only access to the current front buffer.
    pub fn front(&self) -> &PixelBuffer {
        &self.buffers[self.front_index]
    }

    fn dims(&self, index: usize) -> Dimensions {
        Dimensions {
            width: self.buffers[index].width,
            height: self.buffers[index].height,
        }
    }
}

impl Default for FrameSlot {
    fn default() -> Self {
        Self::new()
    }
}
