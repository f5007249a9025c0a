//! Builds an immutable [`Timeline`] from a [`Codec`]

use crate::Result;
use gifsource_core::metadata::{parse_frame_delay, parse_frame_offset};
use gifsource_core::{Codec, Error, Frame, LoopControl, Timeline};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Timeline builder
///
/// Nothing is published until every frame has decoded, so a failed or
/// cancelled build never produces a partial timeline.
#[derive(Debug, Default, Clone)]
pub struct TimelineBuilder {
    cancel: Option<Arc<AtomicBool>>,
}

impl TimelineBuilder {
    /// Creates a new timeline builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Aborts the build with [`Error::Cancelled`] once `flag` is set
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    fn check_cancelled(&self) -> Result<()> {
        match &self.cancel {
            Some(flag) if flag.load(Ordering::Acquire) => Err(Error::Cancelled.into()),
            _ => Ok(()),
        }
    }

    /// Decodes every frame of `codec` and assembles the timeline
    pub fn build<C: Codec>(&self, codec: &mut C) -> Result<Timeline> {
        let frame_count = codec.frame_count()?;
        if frame_count == 0 {
            return Err(Error::NoFrames.into());
        }

        let loop_control = LoopControl::parse(&codec.container_metadata()?)?;
        debug!(
            frame_count,
            is_animated = loop_control.is_animated,
            loop_count = loop_control.loop_count,
            "building timeline"
        );

        let mut canvas = (0, 0);
        let mut frames = Vec::with_capacity(frame_count);
        for index in 0..frame_count {
            self.check_cancelled()?;

            let metadata = codec.frame_metadata(index)?;
            let delay = parse_frame_delay(&metadata)?;
            let (left, top) = parse_frame_offset(&metadata, index)?;

            let decoded = codec.decode_frame(index)?;
            if index == 0 {
                // The canvas follows the first frame, not the logical screen
                canvas = (decoded.width, decoded.height);
            }
            debug!(
                index,
                width = decoded.width,
                height = decoded.height,
                left,
                top,
                delay,
                "decoded frame"
            );

            frames.push(Frame::new(
                decoded.width,
                decoded.height,
                left,
                top,
                delay,
                decoded.pixels,
            ));
        }
        self.check_cancelled()?;

        Ok(Timeline::new(canvas.0, canvas.1, frames, loop_control)?)
    }
}
