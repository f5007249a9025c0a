//! GifSource Core Library
//!
//! This library provides the data model and contracts for playing animated
//! GIF-style containers: the immutable frame [`Timeline`], the metadata rules
//! that recover loop intent, frame delays and placement offsets, the GIF block
//! reader that exposes those metadata blocks, and the [`Codec`] and
//! [`Renderer`] capabilities the playback engine talks to.

pub mod codec;
pub mod config;
pub mod container;
pub mod frame;
pub mod metadata;
pub mod timeline;

pub use codec::{Codec, DecodedFrame, Renderer};
pub use config::PlaybackConfig;
pub use container::{FrameDescriptor, GifContainer, ScreenDescriptor};
pub use frame::Frame;
pub use metadata::{LoopControl, MetadataBlock, MetadataKey, MetadataReader, MetadataValue};
pub use timeline::{FrameSummary, LoopCount, Timeline, TimelineSummary};

/// Result type for gifsource-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for gifsource-core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid signature, expected 'GIF87a' or 'GIF89a'")]
    InvalidSignature,

    #[error("Container has no frames")]
    NoFrames,

    #[error("Malformed block: {0}")]
    MalformedBlock(String),

    #[error(
        "Frame {frame} ({width}x{height} at {left},{top}) exceeds the {canvas_width}x{canvas_height} canvas"
    )]
    FrameOutOfBounds {
        frame: usize,
        left: u32,
        top: u32,
        width: u32,
        height: u32,
        canvas_width: u32,
        canvas_height: u32,
    },

    #[error("Frame {frame} has {actual} pixel bytes, expected {expected}")]
    PixelBufferSize {
        frame: usize,
        expected: usize,
        actual: usize,
    },

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Frame index out of range: {0}")]
    FrameIndex(usize),

    #[error("Metadata '{key}' missing for frame {frame}")]
    MetadataMissing { key: MetadataKey, frame: usize },

    #[error("Metadata '{key}' has unexpected type, expected {expected}")]
    MetadataType {
        key: MetadataKey,
        expected: &'static str,
    },

    #[error("Presentation error: {0}")]
    Presentation(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Operation cancelled")]
    Cancelled,
}

/// Broad classification of an [`Error`], used by hosts to decide whether a
/// failure aborts a load, is retried on the next tick, or is a caller bug.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The container is structurally unusable (no frames, bad signature,
    /// frame placement outside the canvas).
    Format,
    /// Pixels, sizes or required metadata could not be produced.
    Decode,
    /// The renderer could not draw right now.
    Presentation,
    /// The caller passed an invalid value.
    InvalidArgument,
    /// A background load was abandoned.
    Cancelled,
}

impl Error {
    /// Classifies this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidSignature
            | Error::NoFrames
            | Error::FrameOutOfBounds { .. }
            | Error::PixelBufferSize { .. } => ErrorKind::Format,
            Error::Io(_)
            | Error::MalformedBlock(_)
            | Error::Decode(_)
            | Error::FrameIndex(_)
            | Error::MetadataMissing { .. }
            | Error::MetadataType { .. } => ErrorKind::Decode,
            Error::Presentation(_) => ErrorKind::Presentation,
            Error::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Error::Cancelled => ErrorKind::Cancelled,
        }
    }
}
