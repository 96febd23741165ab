//! Fixed-rate frame loop driving the visualizer's lifecycle hooks.

use log::info;
use std::collections::VecDeque;
use std::thread;
use std::time::{Duration, Instant};

use crate::error::Result;
use crate::params::LoopConfig;

/// Frames averaged for the FPS readout
const FPS_WINDOW: usize = 60;

/// Per-frame lifecycle driven by [`FrameLoop`]
pub trait FrameHooks {
    /// Once, before the first tick
    fn on_init(&mut self) -> Result<()>;

    /// Once per frame with the wall-clock time since the previous tick (seconds)
    fn on_tick(&mut self, delta_s: f32) -> Result<()>;

    /// Once, after the last tick or after any failure
    fn on_shutdown(&mut self);
}

/// Rolling frame-rate counter, logged once per second
pub struct FpsTracker {
    frame_times: VecDeque<Duration>,
    last_frame: Instant,
    last_print: Instant,
}

impl FpsTracker {
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            frame_times: VecDeque::with_capacity(FPS_WINDOW + 1),
            last_frame: now,
            last_print: now,
        }
    }

    pub fn record_frame(&mut self) {
        let now = Instant::now();
        self.frame_times.push_back(now - self.last_frame);
        self.last_frame = now;
        if self.frame_times.len() > FPS_WINDOW {
            self.frame_times.pop_front();
        }

        if now - self.last_print > Duration::from_secs(1) {
            info!("FPS: {:.1}", self.current_fps());
            self.last_print = now;
        }
    }

    pub fn current_fps(&self) -> f32 {
        if self.frame_times.is_empty() {
            return 0.0;
        }

        let total: Duration = self.frame_times.iter().sum();
        let avg_frame_time = total.as_secs_f32() / self.frame_times.len() as f32;

        if avg_frame_time > 0.0 {
            1.0 / avg_frame_time
        } else {
            0.0
        }
    }
}

impl Default for FpsTracker {
    fn default() -> Self {
        Self::new()
    }
}

pub struct FrameLoop {
    config: LoopConfig,
    interval: Duration,
    deadline: Option<Duration>,
}

impl FrameLoop {
    pub fn new(config: LoopConfig) -> Result<Self> {
        let interval = config.tick_interval()?;
        let deadline = config.time_limit()?;
        Ok(Self {
            config,
            interval,
            deadline,
        })
    }

    /// Run `hooks` until a frame or time limit is reached, returning the number of ticks.
    ///
    /// `on_shutdown` runs exactly once whenever `on_init` was attempted.
    pub fn run<H: FrameHooks>(&self, hooks: &mut H) -> Result<u64> {
        let result = self.drive(hooks);
        hooks.on_shutdown();
        result
    }

    fn drive<H: FrameHooks>(&self, hooks: &mut H) -> Result<u64> {
        hooks.on_init()?;

        let interval = self.interval;
        let deadline = self.deadline;
        let start = Instant::now();
        let mut last_tick = start;
        let mut fps = FpsTracker::new();
        let mut frames = 0u64;

        loop {
            if self.config.max_frames.is_some_and(|max| frames >= max) {
                break;
            }
            if deadline.is_some_and(|limit| start.elapsed() >= limit) {
                break;
            }

            let now = Instant::now();
            let delta_s = (now - last_tick).as_secs_f32();
            last_tick = now;

            hooks.on_tick(delta_s)?;
            frames += 1;
            fps.record_frame();

            let spent = now.elapsed();
            if spent < interval {
                thread::sleep(interval - spent);
            }
        }

        info!(
            "Frame loop finished: {} frames in {:.2}s",
            frames,
            start.elapsed().as_secs_f32()
        );
        Ok(frames)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VisualizerError;

    #[derive(Default)]
    struct CountingHooks {
        inits: u32,
        ticks: u32,
        shutdowns: u32,
        deltas: Vec<f32>,
        fail_init: bool,
        fail_on_tick: Option<u32>,
    }

    impl FrameHooks for CountingHooks {
        fn on_init(&mut self) -> Result<()> {
            self.inits += 1;
            if self.fail_init {
                return Err(VisualizerError::Config("init failed".to_string()));
            }
            Ok(())
        }

        fn on_tick(&mut self, delta_s: f32) -> Result<()> {
            self.ticks += 1;
            self.deltas.push(delta_s);
            if self.fail_on_tick == Some(self.ticks) {
                return Err(VisualizerError::Readback("lost device".to_string()));
            }
            Ok(())
        }

        fn on_shutdown(&mut self) {
            self.shutdowns += 1;
        }
    }

    fn fast_loop(max_frames: Option<u64>, duration_secs: Option<f32>) -> FrameLoop {
        FrameLoop::new(LoopConfig {
            tick_rate_hz: 1000.0,
            max_frames,
            duration_secs,
        })
        .unwrap()
    }

    #[test]
    fn test_runs_until_frame_limit() {
        let mut hooks = CountingHooks::default();

        let frames = fast_loop(Some(5), None).run(&mut hooks).unwrap();

        assert_eq!(frames, 5);
        assert_eq!(hooks.inits, 1);
        assert_eq!(hooks.ticks, 5);
        assert_eq!(hooks.shutdowns, 1);
        assert!(hooks.deltas.iter().all(|&d| d >= 0.0));
        // Later ticks include the sleep between frames
        assert!(hooks.deltas[1..].iter().all(|&d| d > 0.0));
    }

    #[test]
    fn test_zero_duration_never_ticks() {
        let mut hooks = CountingHooks::default();

        let frames = fast_loop(None, Some(0.0)).run(&mut hooks).unwrap();

        assert_eq!(frames, 0);
        assert_eq!(hooks.inits, 1);
        assert_eq!(hooks.shutdowns, 1);
    }

    #[test]
    fn test_tick_failure_still_shuts_down() {
        let mut hooks = CountingHooks {
            fail_on_tick: Some(3),
            ..Default::default()
        };

        let result = fast_loop(Some(10), None).run(&mut hooks);

        assert!(matches!(result, Err(VisualizerError::Readback(_))));
        assert_eq!(hooks.ticks, 3);
        assert_eq!(hooks.shutdowns, 1);
    }

    #[test]
    fn test_init_failure_still_shuts_down() {
        let mut hooks = CountingHooks {
            fail_init: true,
            ..Default::default()
        };

        assert!(fast_loop(Some(10), None).run(&mut hooks).is_err());
        assert_eq!(hooks.ticks, 0);
        assert_eq!(hooks.shutdowns, 1);
    }

    #[test]
    fn test_invalid_tick_rate_rejected() {
        let config = LoopConfig {
            tick_rate_hz: 0.0,
            ..Default::default()
        };
        assert!(FrameLoop::new(config).is_err());
    }

    #[test]
    fn test_unrepresentable_limits_rejected() {
        let config = LoopConfig {
            duration_secs: Some(1e30),
            ..Default::default()
        };
        assert!(matches!(
            FrameLoop::new(config),
            Err(VisualizerError::Config(_))
        ));

        let config = LoopConfig {
            tick_rate_hz: 1e-30,
            ..Default::default()
        };
        assert!(FrameLoop::new(config).is_err());
    }

    #[test]
    fn test_fps_tracker_empty() {
        assert_eq!(FpsTracker::new().current_fps(), 0.0);
    }
}
