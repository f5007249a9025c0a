//! Frame data structures for animated containers

/// Represents a single decoded animation frame
///
/// A frame may be smaller than the canvas; `left`/`top` place its top-left
/// corner on the canvas.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Width of the frame in pixels
    pub width: u32,
    /// Height of the frame in pixels
    pub height: u32,
    /// Horizontal placement on the canvas
    pub left: u32,
    /// Vertical placement on the canvas
    pub top: u32,
    /// Display duration in hundredths of a second
    pub delay: u16,
    /// Straight RGBA pixel data, row-major, `width * height * 4` bytes
    pub pixels: Vec<u8>,
}

impl Frame {
    /// Creates a new frame
    pub fn new(width: u32, height: u32, left: u32, top: u32, delay: u16, pixels: Vec<u8>) -> Self {
        Self {
            width,
            height,
            left,
            top,
            delay,
            pixels,
        }
    }

    /// Returns the number of pixel bytes this frame should carry
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }

    /// Returns the right and bottom edges of the frame on the canvas
    pub fn extent(&self) -> (u64, u64) {
        (
            self.left as u64 + self.width as u64,
            self.top as u64 + self.height as u64,
        )
    }

    /// Returns the nominal display duration in milliseconds
    pub fn delay_ms(&self) -> u64 {
        self.delay as u64 * 10
    }
}
