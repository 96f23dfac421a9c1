//! Fixed-interval pacing with drift correction and slow self-tuning
//!
//! Both worker loops call [`Pacer::wait`] once per iteration. Deadlines are
//! scheduled from the previous deadline rather than from "now", so small
//! overruns do not accumulate. Once per second the observed rate is compared
//! with the effective target and `adjust_factor` is nudged by
//! [`ADJUST_STEP`] per frame of error.

use std::thread;
use std::time::{Duration, Instant};

/// Starting value of the self-tuning factor
pub const INITIAL_ADJUST_FACTOR: f64 = 1.2;
/// Factor change per frame-per-second of error, applied once per second
pub const ADJUST_STEP: f64 = 0.002;
pub const MIN_ADJUST_FACTOR: f64 = 0.5;
pub const MAX_ADJUST_FACTOR: f64 = 4.0;

const ADJUST_WINDOW: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct Pacer {
    target_fps: f64,
    /// Rate reported by the capture device; `None` when unknown
    device_max_fps: Option<f64>,
    adjust_factor: f64,
    next_tick: Option<Instant>,
    window_start: Instant,
    window_frames: u32,
    observed_fps: f64,
}

impl Pacer {
    pub fn new(target_fps: f64, device_max_fps: Option<f64>) -> Self {
        Self {
            target_fps,
            device_max_fps: device_max_fps.filter(|fps| *fps > 0.0),
            adjust_factor: INITIAL_ADJUST_FACTOR,
            next_tick: None,
            window_start: Instant::now(),
            window_frames: 0,
            observed_fps: 0.0,
        }
    }

    pub fn set_target_fps(&mut self, target_fps: f64) {
        self.target_fps = target_fps;
    }

    pub fn set_device_max_fps(&mut self, device_max_fps: Option<f64>) {
        self.device_max_fps = device_max_fps.filter(|fps| *fps > 0.0);
    }

    pub fn target_fps(&self) -> f64 {
        self.target_fps
    }

    /// `min(target, device max)`
    pub fn effective_fps(&self) -> f64 {
        let fps = match self.device_max_fps {
            Some(max) => self.target_fps.min(max),
            None => self.target_fps,
        };
        fps.max(f64::EPSILON)
    }

    /// Whether the capture loop has to sleep itself. When the requested rate
    /// reaches the device rate the blocking device read paces the loop.
    pub fn should_sleep(&self) -> bool {
        match self.device_max_fps {
            Some(max) => self.target_fps < max,
            None => true,
        }
    }

    pub fn adjust_factor(&self) -> f64 {
        self.adjust_factor
    }

    /// Frames per second measured over the last full window
    pub fn observed_fps(&self) -> f64 {
        self.observed_fps
    }

    /// `1 / (effective_fps * adjust_factor)`
    pub fn interval(&self) -> Duration {
        Duration::from_secs_f64(self.interval_secs())
    }

    pub fn interval_secs(&self) -> f64 {
        1.0 / (self.effective_fps() * self.adjust_factor)
    }

    /// Sleep until the next tick and count the frame
    pub fn wait(&mut self) {
        let interval = self.interval();
        let now = Instant::now();
        let deadline = self.next_tick.unwrap_or(now);
        if deadline > now {
            thread::sleep(deadline - now);
        }

        let after = Instant::now();
        let mut next = deadline + interval;
        if next <= after {
            // More than a whole interval behind: restart the schedule
            next = after + interval;
        }
        self.next_tick = Some(next);
        self.record_frame(after);
    }

    /// Count a frame without sleeping (device-paced loops)
    pub fn tick(&mut self) {
        self.record_frame(Instant::now());
    }

    /// Forget the schedule and the current measurement window.
    ///
    /// Used after the loop was parked (split step, gate) so the pause neither
    /// triggers a burst of catch-up ticks nor skews the measured rate.
    pub fn reset(&mut self) {
        self.next_tick = None;
        self.window_start = Instant::now();
        self.window_frames = 0;
    }

    fn record_frame(&mut self, now: Instant) {
        self.window_frames += 1;
        let elapsed = now.duration_since(self.window_start);
        if elapsed >= ADJUST_WINDOW {
            let observed = self.window_frames as f64 / elapsed.as_secs_f64();
            self.adjust(observed);
            self.window_start = now;
            self.window_frames = 0;
        }
    }

    /// Nudge the factor towards the effective target rate
    pub fn adjust(&mut self, observed_fps: f64) {
        self.observed_fps = observed_fps;
        let error = self.effective_fps() - observed_fps;
        self.adjust_factor =
            (self.adjust_factor + error * ADJUST_STEP).clamp(MIN_ADJUST_FACTOR, MAX_ADJUST_FACTOR);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_uses_min_of_target_and_device() {
        let pacer = Pacer::new(60.0, Some(30.0));
        assert_eq!(pacer.effective_fps(), 30.0);
        let expected = 1.0 / (30.0 * INITIAL_ADJUST_FACTOR);
        assert!((pacer.interval_secs() - expected).abs() < 1e-12);

        let pacer = Pacer::new(20.0, Some(60.0));
        assert_eq!(pacer.effective_fps(), 20.0);
    }

    #[test]
    fn test_unknown_device_rate() {
        let pacer = Pacer::new(60.0, Some(0.0));
        assert_eq!(pacer.effective_fps(), 60.0);
        assert!(pacer.should_sleep());
    }

    #[test]
    fn test_should_sleep_only_below_device_rate() {
        assert!(Pacer::new(30.0, Some(60.0)).should_sleep());
        assert!(!Pacer::new(60.0, Some(60.0)).should_sleep());
        assert!(!Pacer::new(120.0, Some(60.0)).should_sleep());
    }

    #[test]
    fn test_adjust_moves_toward_target() {
        let mut pacer = Pacer::new(60.0, None);
        pacer.adjust(50.0);
        assert!((pacer.adjust_factor() - (INITIAL_ADJUST_FACTOR + 10.0 * ADJUST_STEP)).abs() < 1e-12);

        let mut pacer = Pacer::new(60.0, None);
        pacer.adjust(70.0);
        assert!(pacer.adjust_factor() < INITIAL_ADJUST_FACTOR);
        assert_eq!(pacer.observed_fps(), 70.0);
    }

    #[test]
    fn test_adjust_is_clamped() {
        let mut pacer = Pacer::new(60.0, None);
        for _ in 0..1000 {
            pacer.adjust(0.0);
        }
        assert_eq!(pacer.adjust_factor(), MAX_ADJUST_FACTOR);
        for _ in 0..1000 {
            pacer.adjust(10_000.0);
        }
        assert_eq!(pacer.adjust_factor(), MIN_ADJUST_FACTOR);
    }

    #[test]
    fn test_wait_spaces_ticks_by_interval() {
        let mut pacer = Pacer::new(100.0, None);
        let interval = pacer.interval();
        let start = Instant::now();
        for _ in 0..6 {
            pacer.wait();
        }
        // First wait returns immediately, the next five are one interval apart
        assert!(start.elapsed() >= interval * 5);
    }

    #[test]
    fn test_reset_clears_schedule() {
        let mut pacer = Pacer::new(1.0, None);
        pacer.wait();
        pacer.reset();
        let start = Instant::now();
        pacer.wait();
        assert!(start.elapsed() < Duration::from_millis(500));
    }
}
