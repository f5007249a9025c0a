//! Capabilities the playback engine consumes: a frame codec and a renderer

use crate::{MetadataReader, Result};

/// Pixels of one decoded frame, at the frame's own size
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedFrame {
    pub width: u32,
    pub height: u32,
    /// Straight RGBA, row-major
    pub pixels: Vec<u8>,
}

/// Source of frame pixels and metadata for one container
pub trait Codec {
    /// Metadata block type exposed per container and per frame
    type Metadata: MetadataReader;

    /// Returns the number of frames in the container
    fn frame_count(&mut self) -> Result<usize>;

    /// Decodes the pixels of the frame at `index`
    fn decode_frame(&mut self, index: usize) -> Result<DecodedFrame>;

    /// Returns the container-level metadata block
    fn container_metadata(&mut self) -> Result<Self::Metadata>;

    /// Returns the metadata block of the frame at `index`
    fn frame_metadata(&mut self, index: usize) -> Result<Self::Metadata>;
}

/// Sink for composited canvas pixels
///
/// Implementations report a transient inability to draw (lost surface,
/// device reset in progress) as [`Error::Presentation`](crate::Error::Presentation).
pub trait Renderer {
    fn present(&mut self, width: u32, height: u32, pixels: &[u8]) -> Result<()>;
}

impl<R: Renderer + ?Sized> Renderer for Box<R> {
    fn present(&mut self, width: u32, height: u32, pixels: &[u8]) -> Result<()> {
        (**self).present(width, height, pixels)
    }
}
