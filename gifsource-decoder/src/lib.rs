//! GifSource Decoder Library
//!
//! This library turns GIF bytes into a playable animation: it decodes frames
//! into a [`Timeline`](gifsource_core::Timeline), composites them onto the
//! canvas and sequences them over time for a host-provided
//! [`Renderer`](gifsource_core::Renderer).

pub mod frame_compositor;
pub mod gif_codec;
pub mod image_source;
pub mod scheduler;
pub mod timeline_builder;

pub use frame_compositor::FrameCompositor;
pub use gif_codec::GifCodec;
pub use image_source::GifImageSource;
pub use scheduler::{AnimationScheduler, AnimationState, TickOutcome};
pub use timeline_builder::TimelineBuilder;

use gifsource_core::ErrorKind;

/// Result type for gifsource-decoder operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for gifsource-decoder operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("GifSource core error: {0}")]
    Core(#[from] gifsource_core::Error),

    #[error("No timeline loaded")]
    NotLoaded,

    #[error("Background loader exited without a result")]
    LoaderDisconnected,
}

impl Error {
    /// Classifies this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Core(e) => e.kind(),
            Error::LoaderDisconnected => ErrorKind::Decode,
            Error::NotLoaded => ErrorKind::InvalidArgument,
        }
    }
}
