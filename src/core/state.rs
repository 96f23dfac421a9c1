//! Shared splitter state
//!
//! Written by the worker threads, read by consumers at any time. Every field
//! is an independent atomic, so readers may see values from slightly
//! different instants. That is fine for UI polling.

use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use super::events::SplitIntent;

/// `f64` stored as its bit pattern in an `AtomicU64`
#[derive(Debug, Default)]
pub struct AtomicF64(AtomicU64);

impl AtomicF64 {
    pub fn new(value: f64) -> Self {
        Self(AtomicU64::new(value.to_bits()))
    }

    pub fn load(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Acquire))
    }

    pub fn store(&self, value: f64) {
        self.0.store(value.to_bits(), Ordering::Release);
    }

    /// Store `value` if it is greater than the current one
    pub fn fetch_max(&self, value: f64) {
        let _ = self
            .0
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |bits| {
                (value > f64::from_bits(bits)).then(|| value.to_bits())
            });
    }
}

#[derive(Debug, Default)]
pub struct SplitterState {
    video_active: AtomicBool,
    compare_running: AtomicBool,
    suspended: AtomicBool,
    delaying: AtomicBool,
    delay_remaining: AtomicF64,
    suspend_remaining: AtomicF64,
    current_similarity: AtomicF64,
    highest_similarity: AtomicF64,
    /// Seconds between compare iterations
    interval: AtomicF64,
    /// 0 when the device does not report a rate
    device_max_fps: AtomicF64,
    split_intent: AtomicBool,
    dummy_intent: AtomicBool,
    pause_intent: AtomicBool,
}

impl SplitterState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn video_active(&self) -> bool {
        self.video_active.load(Ordering::SeqCst)
    }

    pub(crate) fn set_video_active(&self, active: bool) {
        self.video_active.store(active, Ordering::SeqCst);
    }

    pub fn compare_running(&self) -> bool {
        self.compare_running.load(Ordering::SeqCst)
    }

    pub(crate) fn set_compare_running(&self, running: bool) {
        self.compare_running.store(running, Ordering::SeqCst);
    }

    pub fn suspended(&self) -> bool {
        self.suspended.load(Ordering::SeqCst)
    }

    pub(crate) fn set_suspended(&self, suspended: bool) {
        self.suspended.store(suspended, Ordering::SeqCst);
    }

    pub fn delaying(&self) -> bool {
        self.delaying.load(Ordering::SeqCst)
    }

    pub(crate) fn set_delaying(&self, delaying: bool) {
        self.delaying.store(delaying, Ordering::SeqCst);
    }

    pub fn delay_remaining(&self) -> f64 {
        self.delay_remaining.load()
    }

    pub(crate) fn set_delay_remaining(&self, seconds: f64) {
        self.delay_remaining.store(seconds);
    }

    pub fn suspend_remaining(&self) -> f64 {
        self.suspend_remaining.load()
    }

    pub(crate) fn set_suspend_remaining(&self, seconds: f64) {
        self.suspend_remaining.store(seconds);
    }

    pub fn current_similarity(&self) -> f64 {
        self.current_similarity.load()
    }

    pub fn highest_similarity(&self) -> f64 {
        self.highest_similarity.load()
    }

    /// Publish a new score and raise the running maximum
    pub(crate) fn record_similarity(&self, similarity: f64) {
        self.current_similarity.store(similarity);
        self.highest_similarity.fetch_max(similarity);
    }

    pub(crate) fn reset_similarities(&self) {
        self.current_similarity.store(0.0);
        self.highest_similarity.store(0.0);
    }

    pub fn interval(&self) -> f64 {
        self.interval.load()
    }

    pub(crate) fn set_interval(&self, seconds: f64) {
        self.interval.store(seconds);
    }

    pub fn device_max_fps(&self) -> Option<f64> {
        let fps = self.device_max_fps.load();
        (fps > 0.0).then_some(fps)
    }

    pub(crate) fn set_device_max_fps(&self, fps: Option<f64>) {
        self.device_max_fps.store(fps.unwrap_or(0.0));
    }

    fn intent_flag(&self, intent: SplitIntent) -> &AtomicBool {
        match intent {
            SplitIntent::Split => &self.split_intent,
            SplitIntent::Dummy => &self.dummy_intent,
            SplitIntent::Pause => &self.pause_intent,
        }
    }

    pub(crate) fn raise_intent(&self, intent: SplitIntent) {
        self.intent_flag(intent).store(true, Ordering::SeqCst);
    }

    /// Consume a one-shot intent signal. Returns whether it was raised.
    pub fn take_intent(&self, intent: SplitIntent) -> bool {
        self.intent_flag(intent).swap(false, Ordering::SeqCst)
    }
}

/// Point-in-time copy of everything a consumer may poll
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SplitterSnapshot {
    pub video_active: bool,
    pub splits_active: bool,
    pub compare_running: bool,
    pub suspended: bool,
    pub delaying: bool,
    pub delay_remaining: f64,
    pub suspend_remaining: f64,
    pub current_similarity: f64,
    pub highest_similarity: f64,
    pub threshold: Option<f64>,
    pub current_index: Option<usize>,
    pub current_loop: Option<u32>,
    pub current_image: Option<String>,
    pub split_count: usize,
    pub capture_index: u32,
    pub interval: f64,
}

impl SplitterSnapshot {
    /// JSON for hosts that poll over an FFI or IPC boundary
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_atomic_f64() {
        let value = AtomicF64::new(0.25);
        assert_eq!(value.load(), 0.25);
        value.store(-1.5);
        assert_eq!(value.load(), -1.5);

        value.store(0.5);
        value.fetch_max(0.4);
        assert_eq!(value.load(), 0.5);
        value.fetch_max(0.75);
        assert_eq!(value.load(), 0.75);
    }

    #[test]
    fn test_similarity_tracking() {
        let state = SplitterState::new();
        state.record_similarity(0.6);
        state.record_similarity(0.9);
        state.record_similarity(0.3);
        assert_eq!(state.current_similarity(), 0.3);
        assert_eq!(state.highest_similarity(), 0.9);

        state.reset_similarities();
        assert_eq!(state.current_similarity(), 0.0);
        assert_eq!(state.highest_similarity(), 0.0);
    }

    #[test]
    fn test_intents_are_one_shot() {
        let state = SplitterState::new();
        assert!(!state.take_intent(SplitIntent::Split));

        state.raise_intent(SplitIntent::Split);
        state.raise_intent(SplitIntent::Pause);
        assert!(state.take_intent(SplitIntent::Split));
        assert!(!state.take_intent(SplitIntent::Split));
        assert!(!state.take_intent(SplitIntent::Dummy));
        assert!(state.take_intent(SplitIntent::Pause));
    }

    #[test]
    fn test_device_fps_unknown_is_none() {
        let state = SplitterState::new();
        assert_eq!(state.device_max_fps(), None);
        state.set_device_max_fps(Some(30.0));
        assert_eq!(state.device_max_fps(), Some(30.0));
    }

    #[test]
    fn test_snapshot_json() {
        let snapshot = SplitterSnapshot {
            video_active: true,
            current_index: Some(2),
            current_image: Some("boss".to_string()),
            ..Default::default()
        };
        let json: serde_json::Value = serde_json::from_str(&snapshot.to_json()).unwrap();
        assert_eq!(json["video_active"], true);
        assert_eq!(json["current_index"], 2);
        assert_eq!(json["current_image"], "boss");
        assert!(json["threshold"].is_null());
    }
}
