//! Tick-driven animation state machine

use crate::{FrameCompositor, Result};
use gifsource_core::{PlaybackConfig, Renderer, Timeline};
use std::time::Duration;
use tracing::{debug, warn};

/// Delays below this many hundredths of a second are treated as degenerate
pub const MIN_FRAME_DELAY: u16 = 3;

/// Delay used in place of a degenerate one, in hundredths of a second
pub const FALLBACK_FRAME_DELAY: u16 = 10;

/// Playback cursor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AnimationState {
    /// Frame to present on the next render
    pub current_frame_index: usize,
    /// Set once the index wraps from the last frame back to the first
    pub completed_first_loop: bool,
    /// Number of wraps since the last restart
    pub loops_completed: u32,
}

/// Result of one scheduler tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickOutcome {
    /// The index wrapped back to the first frame on this tick
    pub loop_completed: bool,
    /// The renderer accepted the frame; false when the draw was skipped
    pub presented: bool,
    /// Wait before the next tick
    pub next_delay: Duration,
}

/// Animation scheduler
///
/// Holds the playback cursor and running flag. It owns no timer: the host
/// calls [`tick`](Self::tick) and waits [`TickOutcome::next_delay`] before
/// calling it again.
#[derive(Debug, Clone)]
pub struct AnimationScheduler {
    state: AnimationState,
    running: bool,
    interval_ms_per_centisecond: u32,
}

impl AnimationScheduler {
    /// Creates a stopped scheduler positioned on the first frame
    pub fn new(config: &PlaybackConfig) -> Self {
        Self {
            state: AnimationState::default(),
            running: false,
            interval_ms_per_centisecond: config.interval_ms_per_centisecond,
        }
    }

    /// Playback cursor and loop bookkeeping
    pub fn state(&self) -> &AnimationState {
        &self.state
    }

    /// Whether ticks currently advance the animation
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Starts ticking
    ///
    /// Looping animations always start; anything else only starts until it
    /// has played through once. Returns whether the scheduler is running.
    pub fn start(&mut self, timeline: &Timeline) -> bool {
        if self.running {
            return true;
        }
        if timeline.is_animated() || !self.state.completed_first_loop {
            debug!("animation started");
            self.running = true;
        }
        self.running
    }

    /// Stops ticking; later ticks do nothing until restarted
    pub fn stop(&mut self) {
        if self.running {
            debug!("animation stopped");
        }
        self.running = false;
    }

    /// Rewinds to the first frame without changing the running flag
    pub fn restart(&mut self) {
        self.state = AnimationState::default();
    }

    /// Wall-clock wait for a frame delay in hundredths of a second
    pub fn interval_for(&self, delay: u16) -> Duration {
        let delay = if delay < MIN_FRAME_DELAY {
            FALLBACK_FRAME_DELAY
        } else {
            delay
        };
        Duration::from_millis(delay as u64 * self.interval_ms_per_centisecond as u64)
    }

    /// Presents the current frame and advances, whether running or not
    ///
    /// Returns whether a loop was just completed. A presentation error is
    /// returned after the cursor has advanced.
    pub fn render_frame<R: Renderer + ?Sized>(
        &mut self,
        timeline: &Timeline,
        compositor: &mut FrameCompositor,
        renderer: &mut R,
    ) -> Result<bool> {
        self.clamp_index(timeline);
        let presented = present(timeline, self.state.current_frame_index, compositor, renderer);
        let (loop_completed, _) = self.advance(timeline);
        presented.map(|_| loop_completed)
    }

    /// Runs one tick; `None` when stopped
    ///
    /// Presentation failures are logged and skipped so playback never stalls
    /// on a draw. A non-looping timeline stops after its first full loop.
    pub fn tick<R: Renderer + ?Sized>(
        &mut self,
        timeline: &Timeline,
        compositor: &mut FrameCompositor,
        renderer: &mut R,
    ) -> Option<TickOutcome> {
        if !self.running {
            return None;
        }
        self.clamp_index(timeline);

        let index = self.state.current_frame_index;
        let presented = match present(timeline, index, compositor, renderer) {
            Ok(()) => true,
            Err(e) => {
                warn!(frame = index, error = %e, "skipping frame, presentation failed");
                false
            }
        };

        let (loop_completed, next_delay) = self.advance(timeline);
        if loop_completed && !timeline.is_animated() {
            debug!("non-looping animation played once, stopping");
            self.running = false;
        }

        Some(TickOutcome {
            loop_completed,
            presented,
            next_delay,
        })
    }

    fn clamp_index(&mut self, timeline: &Timeline) {
        if self.state.current_frame_index >= timeline.frame_count() {
            self.state.current_frame_index = 0;
        }
    }

    /// Moves to the next frame; returns (wrapped, delay of the frame just shown)
    fn advance(&mut self, timeline: &Timeline) -> (bool, Duration) {
        let index = self.state.current_frame_index;
        let delay = timeline.frame(index).map_or(FALLBACK_FRAME_DELAY, |f| f.delay);
        let next_delay = self.interval_for(delay);

        self.state.current_frame_index = (index + 1) % timeline.frame_count();
        let wrapped = self.state.current_frame_index == 0;
        if wrapped {
            self.state.completed_first_loop = true;
            self.state.loops_completed = self.state.loops_completed.saturating_add(1);
        }
        (wrapped, next_delay)
    }
}

fn present<R: Renderer + ?Sized>(
    timeline: &Timeline,
    index: usize,
    compositor: &mut FrameCompositor,
    renderer: &mut R,
) -> Result<()> {
    let canvas = compositor.compose(timeline, index)?;
    renderer.present(canvas.width(), canvas.height(), canvas.as_raw())?;
    Ok(())
}
