use std::time::Instant;

use serde::{Deserialize, Serialize};

/// Per-frame render statistics.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct RenderStats {
    /// Smoothed frames per second.
    pub fps: f64,
    /// Time spent inside the last `render` call, milliseconds.
    pub frame_time_ms: f64,
    /// Elements drawn last frame (after dedup and visibility).
    pub elements_rendered: usize,
    /// `total members − rendered`; never negative when dedup is correct.
    pub elements_culled: usize,
    /// Draw operations issued last frame.
    pub draw_calls: usize,
    /// Layer batches re-triangulated and re-uploaded last frame
    /// (GPU backend only; stays 0 across pure pan/zoom).
    pub batches_rebuilt: usize,
}

/// Frame clock: measures per-frame wall time and keeps a smoothed fps
/// estimate. Delta time is clamped so a debugger pause or long stall does
/// not produce a nonsense fps.
#[derive(Debug, Clone)]
pub struct FrameClock {
    last_frame: Option<Instant>,
    smoothed_fps: f64,
}

impl FrameClock {
    const DT_MIN: f64 = 1e-4;
    const DT_MAX: f64 = 0.25;
    const SMOOTHING: f64 = 0.9;

    pub fn new() -> Self {
        Self {
            last_frame: None,
            smoothed_fps: 0.0,
        }
    }

    /// Call once per frame; returns the smoothed fps estimate.
    pub fn tick(&mut self) -> f64 {
        let now = Instant::now();
        if let Some(last) = self.last_frame {
            let dt = now
                .saturating_duration_since(last)
                .as_secs_f64()
                .clamp(Self::DT_MIN, Self::DT_MAX);
            let instant_fps = 1.0 / dt;
            self.smoothed_fps = if self.smoothed_fps == 0.0 {
                instant_fps
            } else {
                self.smoothed_fps * Self::SMOOTHING + instant_fps * (1.0 - Self::SMOOTHING)
            };
        }
        self.last_frame = Some(now);
        self.smoothed_fps
    }

    pub fn reset(&mut self) {
        self.last_frame = None;
        self.smoothed_fps = 0.0;
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}
