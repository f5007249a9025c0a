//! Playback configuration

/// Playback configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PlaybackConfig {
    /// Pre-compose every frame into a full canvas bitmap on first render
    /// instead of accumulating frames on each tick
    pub prerender: bool,
    /// Wall-clock milliseconds per hundredth of a second of frame delay.
    /// Nominally 10; 8 plays slightly faster than authored.
    pub interval_ms_per_centisecond: u32,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            prerender: false,
            interval_ms_per_centisecond: 8,
        }
    }
}
