// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]
use std::time::{Duration, Instant};

pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .try_init();
}

/// Per-frame delta time plus a once-a-second frame counter.
#[derive(Debug)]
pub struct FrameClock {
    last_tick: Instant,
    window_start: Instant,
    frames: u32,
}

impl FrameClock {
    pub fn new(now: Instant) -> Self {
        Self {
            last_tick: now,
            window_start: now,
            frames: 0,
        }
    }

    /// Seconds since the previous tick. Never negative.
    pub fn tick(&mut self, now: Instant) -> f32 {
        let dt = now.saturating_duration_since(self.last_tick);
        self.last_tick = now;
        dt.as_secs_f32()
    }

    /// Counts a presented frame. Returns the frame count once a full second
    /// has elapsed and starts a new counting window.
    pub fn frame_done(&mut self, now: Instant) -> Option<u32> {
        self.frames = self.frames.saturating_add(1);
        if now.saturating_duration_since(self.window_start) >= Duration::from_secs(1) {
            let fps = self.frames;
            self.frames = 0;
            self.window_start = now;
            tracing::debug!("frame window closed: {fps} frames");
            Some(fps)
        } else {
            None
        }
    }

    /// Drops the partial count, e.g. while the window is minimised.
    pub fn reset(&mut self, now: Instant) {
        self.frames = 0;
        self.window_start = now;
        self.last_tick = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_reports_elapsed_seconds() {
        let t0 = Instant::now();
        let mut clock = FrameClock::new(t0);
        let dt = clock.tick(t0 + Duration::from_millis(250));
        assert!((dt - 0.25).abs() < 1e-4);
        let dt = clock.tick(t0 + Duration::from_millis(300));
        assert!((dt - 0.05).abs() < 1e-4);
    }

    #[test]
    fn tick_never_goes_negative() {
        let t0 = Instant::now() + Duration::from_secs(1);
        let mut clock = FrameClock::new(t0);
        assert_eq!(clock.tick(t0 - Duration::from_millis(10)), 0.0);
    }

    #[test]
    fn fps_reported_once_per_second() {
        let t0 = Instant::now();
        let mut clock = FrameClock::new(t0);
        for i in 1..60 {
            assert_eq!(clock.frame_done(t0 + Duration::from_millis(i * 10)), None);
        }
        assert_eq!(clock.frame_done(t0 + Duration::from_millis(1000)), Some(60));
        assert_eq!(clock.frame_done(t0 + Duration::from_millis(1010)), None);
    }

    #[test]
    fn reset_discards_partial_window() {
        let t0 = Instant::now();
        let mut clock = FrameClock::new(t0);
        clock.frame_done(t0 + Duration::from_millis(100));
        clock.reset(t0 + Duration::from_millis(500));
        assert_eq!(clock.frame_done(t0 + Duration::from_millis(1200)), None);
        assert_eq!(clock.frame_done(t0 + Duration::from_millis(1500)), Some(2));
    }
}
