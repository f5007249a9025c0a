//! Frame compositor: turns raw timeline frames into full canvas bitmaps

use crate::Result;
use gifsource_core::{Error, Frame, Timeline};
use image::{ImageBuffer, Rgba, RgbaImage};
use tracing::{debug, info};

/// Canvas color before any frame is drawn
const CLEAR: Rgba<u8> = Rgba([0, 0, 0, 0]);

/// Frame compositor
///
/// In prerendered mode every frame is composed once into a canvas-sized
/// bitmap on first use and later lookups are O(1). In progressive mode no
/// cache is kept and each call redraws frames `0..=index` into a scratch
/// canvas. Both modes accumulate frames without applying disposal methods.
///
/// The cache is keyed by [`Timeline::id`], so composing a different timeline
/// rebuilds it even without an explicit [`FrameCompositor::invalidate`].
pub struct FrameCompositor {
    prerender: bool,
    cache: Option<(u64, Vec<RgbaImage>)>,
    scratch: RgbaImage,
}

impl FrameCompositor {
    /// Creates a new frame compositor
    pub fn new(prerender: bool) -> Self {
        Self {
            prerender,
            cache: None,
            scratch: RgbaImage::new(0, 0),
        }
    }

    /// Whether prerendered mode is selected
    pub fn prerender(&self) -> bool {
        self.prerender
    }

    /// Switches between prerendered and progressive mode
    pub fn set_prerender(&mut self, prerender: bool) {
        if !prerender {
            self.cache = None;
        }
        self.prerender = prerender;
    }

    /// Drops the composited cache and frees its memory
    pub fn invalidate(&mut self) {
        self.cache = None;
    }

    /// Whether a composited cache is currently held
    pub fn is_cached(&self) -> bool {
        self.cache.is_some()
    }

    /// Returns the canvas as it looks once frame `index` has been drawn
    pub fn compose(&mut self, timeline: &Timeline, index: usize) -> Result<&RgbaImage> {
        if index >= timeline.frame_count() {
            return Err(Error::FrameIndex(index).into());
        }

        if self.prerender {
            let stale = match &self.cache {
                Some((id, _)) => *id != timeline.id(),
                None => true,
            };
            if stale {
                self.cache = Some((timeline.id(), prerender_frames(timeline)?));
            }
            let (_, cache) = self.cache.as_ref().ok_or(Error::FrameIndex(index))?;
            return cache.get(index).ok_or_else(|| Error::FrameIndex(index).into());
        }

        let (width, height) = (timeline.canvas_width(), timeline.canvas_height());
        if self.scratch.dimensions() != (width, height) {
            self.scratch = ImageBuffer::from_pixel(width, height, CLEAR);
        } else {
            self.scratch.pixels_mut().for_each(|p| *p = CLEAR);
        }
        for (position, frame) in timeline.frames()[..=index].iter().enumerate() {
            overlay_frame(&mut self.scratch, position, frame)?;
        }
        Ok(&self.scratch)
    }
}

/// Composes every frame in order, snapshotting the running canvas after each
fn prerender_frames(timeline: &Timeline) -> Result<Vec<RgbaImage>> {
    let mut canvas = ImageBuffer::from_pixel(timeline.canvas_width(), timeline.canvas_height(), CLEAR);
    let mut composed = Vec::with_capacity(timeline.frame_count());
    for (index, frame) in timeline.frames().iter().enumerate() {
        overlay_frame(&mut canvas, index, frame)?;
        composed.push(canvas.clone());
    }

    info!(
        frames = composed.len(),
        bytes = composed.iter().map(|c| c.as_raw().len()).sum::<usize>(),
        "prerendered composited frames"
    );
    Ok(composed)
}

/// Draws a frame onto the canvas at its offset
///
/// Fully transparent pixels leave the canvas untouched; every other pixel
/// replaces what is underneath.
fn overlay_frame(base: &mut RgbaImage, index: usize, frame: &Frame) -> Result<()> {
    let overlay: ImageBuffer<Rgba<u8>, &[u8]> =
        ImageBuffer::from_raw(frame.width, frame.height, &frame.pixels[..]).ok_or(
            Error::PixelBufferSize {
                frame: index,
                expected: frame.expected_len(),
                actual: frame.pixels.len(),
            },
        )?;

    let (base_width, base_height) = base.dimensions();
    let mut clipped = 0usize;
    for (src_x, src_y, pixel) in overlay.enumerate_pixels() {
        if pixel[3] == 0 {
            continue;
        }
        let dest_x = frame.left as u64 + src_x as u64;
        let dest_y = frame.top as u64 + src_y as u64;
        if dest_x < base_width as u64 && dest_y < base_height as u64 {
            base.put_pixel(dest_x as u32, dest_y as u32, *pixel);
        } else {
            clipped += 1;
        }
    }
    if clipped > 0 {
        debug!(clipped, "frame pixels fell outside the canvas");
    }
    Ok(())
}
