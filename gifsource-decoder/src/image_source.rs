//! Host-facing animated image source
//!
//! [`GifImageSource`] ties loading, compositing and scheduling together for a
//! presentation layer. Loads run on a background thread; the host drives
//! playback by calling [`GifImageSource::tick`] from its own timer and waiting
//! the returned delay.
//!
//! A new timeline becomes visible only when the host collects the finished
//! load with [`GifImageSource::poll_load`] or [`GifImageSource::wait_for_load`].
//! Until then, ticks keep playing the previous timeline.

use crate::{
    AnimationScheduler, AnimationState, Error, FrameCompositor, GifCodec, Result, TickOutcome,
    TimelineBuilder,
};
use crossbeam_channel::{bounded, Receiver, TryRecvError};
use gifsource_core::{PlaybackConfig, Renderer, Timeline};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;
use tracing::{debug, info, warn};

/// A load running on a background thread; dropping it cancels the build
struct PendingLoad {
    cancel: Arc<AtomicBool>,
    result: Receiver<Result<Timeline>>,
}

impl Drop for PendingLoad {
    fn drop(&mut self) {
        self.cancel.store(true, Ordering::Release);
    }
}

/// Animated image source driving a [`Renderer`]
pub struct GifImageSource<R: Renderer> {
    renderer: R,
    width: u32,
    height: u32,
    timeline: Option<Timeline>,
    compositor: FrameCompositor,
    scheduler: AnimationScheduler,
    pending: Option<PendingLoad>,
}

impl<R: Renderer> GifImageSource<R> {
    /// Creates an empty source with a preliminary canvas size
    ///
    /// The size is replaced by the first frame's size once a load completes.
    pub fn new(width: i32, height: i32, renderer: R) -> Result<Self> {
        Self::with_config(width, height, renderer, PlaybackConfig::default())
    }

    /// Creates an empty source with explicit playback configuration
    pub fn with_config(width: i32, height: i32, renderer: R, config: PlaybackConfig) -> Result<Self> {
        let width = u32::try_from(width).map_err(|_| {
            gifsource_core::Error::InvalidArgument(format!("negative width {}", width))
        })?;
        let height = u32::try_from(height).map_err(|_| {
            gifsource_core::Error::InvalidArgument(format!("negative height {}", height))
        })?;

        Ok(Self {
            renderer,
            width,
            height,
            timeline: None,
            compositor: FrameCompositor::new(config.prerender),
            scheduler: AnimationScheduler::new(&config),
            pending: None,
        })
    }

    /// Canvas width in pixels
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Canvas height in pixels
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Currently visible timeline, if any
    pub fn timeline(&self) -> Option<&Timeline> {
        self.timeline.as_ref()
    }

    /// Presentation surface frames are drawn to
    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    /// Mutable access to the presentation surface
    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    /// Whether frames are pre-composed into a cache on first render
    pub fn prerender_enabled(&self) -> bool {
        self.compositor.prerender()
    }

    /// Selects prerendered or progressive compositing
    pub fn set_prerender(&mut self, prerender: bool) {
        self.compositor.set_prerender(prerender);
    }

    /// Starts decoding `data` on a background thread
    ///
    /// Any load already in flight is cancelled.
    pub fn load_source(&mut self, data: impl Into<Arc<[u8]>>) -> Result<()> {
        let data = data.into();
        self.cancel_load();

        let cancel = Arc::new(AtomicBool::new(false));
        let (tx, rx) = bounded(1);
        let flag = Arc::clone(&cancel);
        thread::Builder::new()
            .name("gifsource-loader".into())
            .spawn(move || {
                // The receiver may be gone if the load was abandoned
                let _ = tx.send(build_timeline(data, flag));
            })
            .map_err(gifsource_core::Error::from)?;

        self.pending = Some(PendingLoad {
            cancel,
            result: rx,
        });
        Ok(())
    }

    /// Decodes `data` on the calling thread and makes it visible
    pub fn load_blocking(&mut self, data: impl Into<Arc<[u8]>>) -> Result<()> {
        self.cancel_load();
        let result = build_timeline(data.into(), Arc::new(AtomicBool::new(false)));
        self.finish_load(result)
    }

    /// Whether a background load is in flight
    pub fn is_loading(&self) -> bool {
        self.pending.is_some()
    }

    /// Abandons the background load, if any; the visible timeline is kept
    pub fn cancel_load(&mut self) {
        if self.pending.take().is_some() {
            debug!("cancelled pending load");
        }
    }

    /// Collects a finished background load without blocking
    ///
    /// Returns `None` while the load is still running or when nothing is
    /// pending.
    pub fn poll_load(&mut self) -> Option<Result<()>> {
        let received = match self.pending.as_ref()?.result.try_recv() {
            Ok(result) => result,
            Err(TryRecvError::Empty) => return None,
            Err(TryRecvError::Disconnected) => Err(Error::LoaderDisconnected),
        };
        self.pending = None;
        Some(self.finish_load(received))
    }

    /// Blocks until the background load finishes and collects it
    ///
    /// Returns immediately when nothing is pending.
    pub fn wait_for_load(&mut self) -> Result<()> {
        let pending = match self.pending.take() {
            Some(pending) => pending,
            None => return Ok(()),
        };
        let received = pending
            .result
            .recv()
            .unwrap_or(Err(Error::LoaderDisconnected));
        self.finish_load(received)
    }

    fn finish_load(&mut self, result: Result<Timeline>) -> Result<()> {
        match result {
            Ok(timeline) => {
                self.set_timeline(timeline);
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "load failed, keeping previous timeline");
                Err(e)
            }
        }
    }

    /// Replaces the visible timeline and rewinds playback
    pub fn set_timeline(&mut self, timeline: Timeline) {
        info!(
            width = timeline.canvas_width(),
            height = timeline.canvas_height(),
            frames = timeline.frame_count(),
            animated = timeline.is_animated(),
            "timeline loaded"
        );
        self.width = timeline.canvas_width();
        self.height = timeline.canvas_height();
        self.timeline = Some(timeline);
        self.compositor.invalidate();
        self.scheduler.restart();
    }

    /// Starts the animation if the timeline loops or has not played once yet
    pub fn start(&mut self) -> bool {
        match &self.timeline {
            Some(timeline) => self.scheduler.start(timeline),
            None => false,
        }
    }

    /// Stops the animation
    pub fn stop(&mut self) {
        self.scheduler.stop();
    }

    /// Resets the animation to the first frame
    pub fn restart(&mut self) {
        self.scheduler.restart();
    }

    /// Whether ticks currently advance the animation
    pub fn is_running(&self) -> bool {
        self.scheduler.is_running()
    }

    /// Playback cursor and loop bookkeeping
    pub fn state(&self) -> &AnimationState {
        self.scheduler.state()
    }

    /// Index of the frame the next render presents
    pub fn current_frame_index(&self) -> usize {
        self.scheduler.state().current_frame_index
    }

    /// Whether the cursor has wrapped at least once since the last restart
    pub fn completed_first_loop(&self) -> bool {
        self.scheduler.state().completed_first_loop
    }

    /// Renders the current frame and advances to the next one
    ///
    /// Returns true if an animation loop was just completed.
    pub fn render_frame(&mut self) -> Result<bool> {
        let timeline = self.timeline.as_ref().ok_or(Error::NotLoaded)?;
        self.scheduler
            .render_frame(timeline, &mut self.compositor, &mut self.renderer)
    }

    /// Runs one timer tick; `None` when stopped or nothing is loaded
    pub fn tick(&mut self) -> Option<TickOutcome> {
        let timeline = self.timeline.as_ref()?;
        self.scheduler
            .tick(timeline, &mut self.compositor, &mut self.renderer)
    }

    /// Releases the timeline, composited frames and any pending load
    pub fn clear_resources(&mut self) {
        self.scheduler.stop();
        self.scheduler.restart();
        self.cancel_load();
        self.timeline = None;
        self.compositor.invalidate();
        self.width = 0;
        self.height = 0;
    }
}

fn build_timeline(data: Arc<[u8]>, cancel: Arc<AtomicBool>) -> Result<Timeline> {
    let started = Instant::now();
    debug!(bytes = data.len(), "loading animated image");

    let mut codec = GifCodec::new(data)?;
    let timeline = TimelineBuilder::new()
        .with_cancel_flag(cancel)
        .build(&mut codec)?;

    debug!(elapsed_ms = started.elapsed().as_millis() as u64, "animated image decoded");
    Ok(timeline)
}
