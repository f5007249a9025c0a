//! Timeline data structures: the immutable, ordered representation of an animation

use crate::{Error, Frame, LoopControl, Result};
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_TIMELINE_ID: AtomicU64 = AtomicU64::new(1);

/// How often an animation asks to be repeated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LoopCount {
    /// Loop forever
    Infinite,
    /// Repeat a fixed number of times
    Finite(u16),
}

/// A fully decoded animation
///
/// Built once per load and never mutated afterwards. Frames are stored in
/// display order and every frame fits inside the canvas.
#[derive(Debug, Clone)]
pub struct Timeline {
    id: u64,
    canvas_width: u32,
    canvas_height: u32,
    frames: Vec<Frame>,
    is_animated: bool,
    loop_count: u16,
}

impl Timeline {
    /// Creates a timeline, validating frame count, pixel buffers and placement
    pub fn new(
        canvas_width: u32,
        canvas_height: u32,
        frames: Vec<Frame>,
        loop_control: LoopControl,
    ) -> Result<Self> {
        if frames.is_empty() {
            return Err(Error::NoFrames);
        }

        for (index, frame) in frames.iter().enumerate() {
            let expected = frame.expected_len();
            if frame.pixels.len() != expected {
                return Err(Error::PixelBufferSize {
                    frame: index,
                    expected,
                    actual: frame.pixels.len(),
                });
            }

            let (right, bottom) = frame.extent();
            if right > canvas_width as u64 || bottom > canvas_height as u64 {
                return Err(Error::FrameOutOfBounds {
                    frame: index,
                    left: frame.left,
                    top: frame.top,
                    width: frame.width,
                    height: frame.height,
                    canvas_width,
                    canvas_height,
                });
            }
        }

        Ok(Self {
            id: NEXT_TIMELINE_ID.fetch_add(1, Ordering::Relaxed),
            canvas_width,
            canvas_height,
            frames,
            is_animated: loop_control.is_animated,
            loop_count: loop_control.loop_count,
        })
    }

    /// Identity assigned at construction; clones share it
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Canvas width in pixels
    pub fn canvas_width(&self) -> u32 {
        self.canvas_width
    }

    /// Canvas height in pixels
    pub fn canvas_height(&self) -> u32 {
        self.canvas_height
    }

    /// Returns the frames in display order
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    /// Gets a frame by index
    pub fn frame(&self, index: usize) -> Option<&Frame> {
        self.frames.get(index)
    }

    /// Returns the number of frames, always at least one
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Whether the container carries a loop control block asking for animation
    ///
    /// This is independent of the frame count.
    pub fn is_animated(&self) -> bool {
        self.is_animated
    }

    /// Raw repeat count; 0 means forever when the timeline is animated
    pub fn loop_count(&self) -> u16 {
        self.loop_count
    }

    /// Returns the repeat count as a [`LoopCount`]
    pub fn loop_count_kind(&self) -> LoopCount {
        if self.is_animated && self.loop_count == 0 {
            LoopCount::Infinite
        } else {
            LoopCount::Finite(self.loop_count)
        }
    }

    /// Sum of the nominal frame delays of one loop, in milliseconds
    pub fn total_duration_ms(&self) -> u64 {
        self.frames.iter().map(Frame::delay_ms).sum()
    }

    /// Returns a pixel-free description of the timeline
    pub fn summary(&self) -> TimelineSummary {
        TimelineSummary {
            canvas_width: self.canvas_width,
            canvas_height: self.canvas_height,
            frame_count: self.frames.len(),
            is_animated: self.is_animated,
            loop_count: self.loop_count_kind(),
            total_duration_ms: self.total_duration_ms(),
            frames: self
                .frames
                .iter()
                .map(|frame| FrameSummary {
                    left: frame.left,
                    top: frame.top,
                    width: frame.width,
                    height: frame.height,
                    delay: frame.delay,
                })
                .collect(),
        }
    }
}

/// Pixel-free description of a [`Timeline`]
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TimelineSummary {
    pub canvas_width: u32,
    pub canvas_height: u32,
    pub frame_count: usize,
    pub is_animated: bool,
    pub loop_count: LoopCount,
    pub total_duration_ms: u64,
    pub frames: Vec<FrameSummary>,
}

#[cfg(feature = "serde")]
impl TimelineSummary {
    /// Serializes the summary as pretty-printed JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Placement and timing of one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FrameSummary {
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
    /// Hundredths of a second
    pub delay: u16,
}
