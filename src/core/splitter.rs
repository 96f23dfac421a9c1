//! The splitter
//!
//! Owns the capture and compare threads and everything they share. Hosts
//! drive it through navigation calls and hotkey actions, and observe it
//! through the getters, [`Splitter::snapshot`] and split callbacks.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::{Mutex, RwLock, RwLockReadGuard};

use super::events::{EventHandler, SplitEvent, SplitIntent};
use super::gate::{SplitsGate, NAVIGATION_TIMEOUT};
use super::state::{SplitterSnapshot, SplitterState};
use crate::capture::worker::CaptureWorker;
use crate::capture::{CaptureOpener, FrameSlots};
use crate::compare::worker::CompareWorker;
use crate::config::Settings;
use crate::error::{Result, SplitterError};
use crate::frame::Frame;
use crate::keys::{HotkeyAction, KeySink};
use crate::splits::SplitDir;

/// How many indices past the current one `set_next_capture_index` probes
const CAPTURE_PROBE_RANGE: u32 = 3;

/// A running worker thread and its stop flag
struct Worker {
    done: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl Worker {
    fn spawn(name: &str, done: Arc<AtomicBool>, body: impl FnOnce() + Send + 'static) -> Result<Self> {
        let handle = thread::Builder::new().name(name.to_string()).spawn(body)?;
        Ok(Self { done, handle })
    }

    fn signal(&self) {
        self.done.store(true, Ordering::SeqCst);
    }

    fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    fn join(self) {
        let name = self.handle.thread().name().unwrap_or("worker").to_string();
        if self.handle.join().is_err() {
            log::error!("{} thread panicked", name);
        }
    }

    fn stop(self) {
        self.signal();
        self.join();
    }
}

/// Image-driven autosplitter
pub struct Splitter {
    settings: Arc<RwLock<Settings>>,
    split_dir: Arc<RwLock<SplitDir>>,
    state: Arc<SplitterState>,
    slots: Arc<FrameSlots>,
    gate: Arc<SplitsGate>,
    opener: Arc<dyn CaptureOpener>,
    key_sink: Arc<dyn KeySink>,
    events: Arc<Mutex<EventHandler>>,
    /// Serializes navigation requests
    navigation: Mutex<()>,
    capture: Option<Worker>,
    compare: Option<Worker>,
}

impl Splitter {
    pub fn new(
        settings: Settings,
        opener: Arc<dyn CaptureOpener>,
        key_sink: Arc<dyn KeySink>,
    ) -> Result<Self> {
        settings.validate()?;
        let split_dir = SplitDir::new(
            settings.split_defaults(),
            settings.comparison_geometry(),
            settings.display_geometry(),
        );

        Ok(Self {
            settings: Arc::new(RwLock::new(settings)),
            split_dir: Arc::new(RwLock::new(split_dir)),
            state: Arc::new(SplitterState::new()),
            slots: Arc::new(FrameSlots::new()),
            gate: Arc::new(SplitsGate::new()),
            opener,
            key_sink,
            events: Arc::new(Mutex::new(EventHandler::new())),
            navigation: Mutex::new(()),
            capture: None,
            compare: None,
        })
    }

    /// Register a callback for split events. Runs on the compare thread.
    pub fn on_split<F>(&self, callback: F)
    where
        F: Fn(SplitEvent) + Send + Sync + 'static,
    {
        self.events.lock().on_split(Box::new(callback));
    }

    // ---- lifecycle ----

    /// Open the configured capture device and start the workers.
    ///
    /// Any running workers are stopped first. Compare only starts when a
    /// split list is loaded.
    pub fn start(&mut self) -> Result<()> {
        self.stop();

        let index = self.settings.read().last_capture_source_index;
        let mut source = match self.opener.open(index) {
            Ok(source) => source,
            Err(e) => {
                log::warn!("Could not open capture source {}: {}", index, e);
                self.state.set_video_active(false);
                return Err(e);
            }
        };
        source.set_buffer_size(1);
        let max_fps = source.max_fps().filter(|fps| *fps > 0.0);
        self.state.set_device_max_fps(max_fps);
        self.state.set_video_active(true);
        self.state.set_suspended(false);

        let done = Arc::new(AtomicBool::new(false));
        let worker = CaptureWorker {
            source,
            slots: self.slots.clone(),
            state: self.state.clone(),
            settings: self.settings.clone(),
            done: done.clone(),
        };
        match Worker::spawn("frame-capture", done, move || worker.run()) {
            Ok(capture) => self.capture = Some(capture),
            Err(e) => {
                self.state.set_video_active(false);
                return Err(e);
            }
        }
        log::info!("Capture source {} opened (device fps: {:?})", index, max_fps);

        if !self.split_dir.read().is_empty() {
            self.start_compare()?;
        }
        Ok(())
    }

    /// Stop both workers and wait for them to exit
    pub fn stop(&mut self) {
        let capture = self.capture.take();
        let compare = self.compare.take();
        if capture.is_none() && compare.is_none() {
            return;
        }

        for worker in capture.iter().chain(compare.iter()) {
            worker.signal();
        }
        if let Some(worker) = capture {
            worker.join();
        }
        if let Some(worker) = compare {
            worker.join();
        }

        self.state.set_video_active(false);
        self.state.set_compare_running(false);
        self.state.set_delaying(false);
        self.state.set_suspended(false);
        self.slots.clear();
        log::info!("Splitter stopped");
    }

    fn start_compare(&mut self) -> Result<()> {
        if let Some(worker) = self.compare.take() {
            worker.stop();
        }
        self.state.set_suspended(false);

        let done = Arc::new(AtomicBool::new(false));
        let worker = CompareWorker {
            settings: self.settings.clone(),
            split_dir: self.split_dir.clone(),
            slots: self.slots.clone(),
            state: self.state.clone(),
            gate: self.gate.clone(),
            key_sink: self.key_sink.clone(),
            events: self.events.clone(),
            done: done.clone(),
        };
        // Visible as running before the thread gets scheduled
        self.state.set_compare_running(true);
        match Worker::spawn("frame-compare", done, move || worker.run()) {
            Ok(compare) => {
                self.compare = Some(compare);
                Ok(())
            }
            Err(e) => {
                self.state.set_compare_running(false);
                Err(e)
            }
        }
    }

    fn compare_alive(&self) -> bool {
        self.compare.as_ref().map(|w| !w.is_finished()).unwrap_or(false)
    }

    /// Start compare if video is up, a list is loaded and compare is not
    /// already running
    fn ensure_compare(&mut self) -> Result<()> {
        if self.state.video_active() && !self.split_dir.read().is_empty() && !self.compare_alive() {
            self.start_compare()?;
        }
        Ok(())
    }

    /// Pause or resume comparison without touching capture
    pub fn toggle_suspended(&mut self) {
        if self.state.suspended() {
            self.state.set_suspended(false);
            if let Err(e) = self.ensure_compare() {
                log::error!("Could not resume comparison: {}", e);
            }
            log::info!("Comparison resumed");
        } else {
            if let Some(worker) = self.compare.take() {
                worker.stop();
            }
            self.state.set_suspended(true);
            log::info!("Comparison suspended");
        }
    }

    /// Probe the next few capture indices and switch to the first one that
    /// opens, falling back to 0. Restarts capture if it was running.
    ///
    /// Returns whether another index was found.
    pub fn set_next_capture_index(&mut self) -> bool {
        let current = self.settings.read().last_capture_source_index;
        let found = (1..=CAPTURE_PROBE_RANGE)
            .map(|offset| current.saturating_add(offset))
            .find(|&candidate| match self.opener.open(candidate) {
                Ok(mut source) => {
                    source.release();
                    true
                }
                Err(e) => {
                    log::debug!("Capture index {} unavailable: {}", candidate, e);
                    false
                }
            });

        let next = found.unwrap_or(0);
        self.settings.write().last_capture_source_index = next;
        log::info!("Capture index {} -> {}", current, next);

        if next != current && self.capture.is_some() {
            if let Err(e) = self.start() {
                log::warn!("Restart on capture index {} failed: {}", next, e);
            }
        }
        found.is_some()
    }

    pub fn capture_index(&self) -> u32 {
        self.settings.read().last_capture_source_index
    }

    // ---- split list ----

    /// Load a split directory. Starts comparison if video is already up.
    pub fn load_splits(&mut self, path: impl AsRef<Path>) -> Result<usize> {
        let count = self.with_parked_compare(|dir| dir.load(path))?;
        self.ensure_compare()?;
        Ok(count)
    }

    /// Rescan the split directory and return to the first image
    pub fn reset_splits(&mut self) -> Result<()> {
        self.with_parked_compare(|dir| dir.reset());
        self.ensure_compare()
    }

    /// Move to the next image or loop. Returns the new index.
    pub fn request_next(&self) -> Result<usize> {
        self.with_parked_compare(|dir| dir.next())
    }

    /// Move to the previous image or loop. Returns the new index.
    pub fn request_previous(&self) -> Result<usize> {
        self.with_parked_compare(|dir| dir.previous())
    }

    /// Run `f` on the split list once the compare loop is out of the way.
    ///
    /// While a delay or suspend is in progress, or compare is not running,
    /// the change applies immediately. Otherwise compare is asked to park
    /// first; if it does not acknowledge in time the change goes ahead.
    fn with_parked_compare<T>(&self, f: impl FnOnce(&mut SplitDir) -> T) -> T {
        let _navigation = self.navigation.lock();

        let immediate =
            self.state.delaying() || self.state.suspended() || !self.state.compare_running();
        if immediate {
            let result = f(&mut *self.split_dir.write());
            self.state.reset_similarities();
            return result;
        }

        if !self.gate.request(NAVIGATION_TIMEOUT) {
            log::warn!("{}", SplitterError::NavigationTimeout);
        }
        let result = f(&mut *self.split_dir.write());
        self.state.reset_similarities();
        self.gate.release();
        result
    }

    /// Read access to the split list
    pub fn split_dir(&self) -> RwLockReadGuard<'_, SplitDir> {
        self.split_dir.read()
    }

    pub fn current_index(&self) -> Option<usize> {
        self.split_dir.read().current_index()
    }

    pub fn current_loop(&self) -> Option<u32> {
        self.split_dir.read().current_loop()
    }

    pub fn current_threshold(&self) -> Option<f64> {
        self.split_dir.read().current_image().map(|image| image.threshold())
    }

    pub fn splits_active(&self) -> bool {
        !self.split_dir.read().is_empty()
    }

    // ---- settings ----

    pub fn settings(&self) -> Settings {
        self.settings.read().clone()
    }

    /// Change settings in place.
    ///
    /// The edited copy is validated before it replaces the current one.
    /// Geometry changes resize the split list and changed defaults are
    /// pushed into every image that did not set its own value.
    pub fn update_settings(&self, f: impl FnOnce(&mut Settings)) -> Result<()> {
        let mut updated = self.settings.read().clone();
        f(&mut updated);
        updated.validate()?;

        let comparison = updated.comparison_geometry();
        let display = updated.display_geometry();
        let defaults = updated.split_defaults();
        *self.settings.write() = updated;

        let mut dir = self.split_dir.write();
        if dir.comparison_geometry() != comparison || dir.display_geometry() != display {
            dir.set_geometries(comparison, display)?;
        }

        let previous = *dir.defaults();
        if previous != defaults {
            dir.set_defaults(defaults);
            if !dir.is_empty() {
                if previous.threshold != defaults.threshold {
                    dir.apply_default_threshold()?;
                }
                if previous.delay != defaults.delay {
                    dir.apply_default_delay()?;
                }
                if previous.suspend != defaults.suspend {
                    dir.apply_default_suspend()?;
                }
                if previous.loops != defaults.loops {
                    dir.apply_default_loops()?;
                }
            }
        }
        Ok(())
    }

    // ---- hotkeys ----

    /// Apply a hotkey action received from the host
    pub fn handle_action(&mut self, action: HotkeyAction) -> Result<()> {
        match action {
            HotkeyAction::Reset => self.reset_splits(),
            HotkeyAction::Undo | HotkeyAction::Previous => self.request_previous().map(|_| ()),
            HotkeyAction::Skip | HotkeyAction::Next => self.request_next().map(|_| ()),
            HotkeyAction::ToggleHotkeys => {
                let mut settings = self.settings.write();
                settings.global_hotkeys_enabled = !settings.global_hotkeys_enabled;
                log::info!("Global hotkeys enabled: {}", settings.global_hotkeys_enabled);
                Ok(())
            }
            HotkeyAction::Split | HotkeyAction::Pause | HotkeyAction::Screenshot => {
                log::debug!("Hotkey action {} is handled by the host", action);
                Ok(())
            }
        }
    }

    /// Map a key code to its bound action and apply it. Returns the action.
    pub fn handle_key(&mut self, code: &str) -> Result<Option<HotkeyAction>> {
        let action = self.settings.read().keys.action_for(code);
        if let Some(action) = action {
            self.handle_action(action)?;
        }
        Ok(action)
    }

    // ---- observable state ----

    pub fn state(&self) -> &SplitterState {
        &self.state
    }

    pub fn video_active(&self) -> bool {
        self.state.video_active()
    }

    pub fn compare_running(&self) -> bool {
        self.state.compare_running()
    }

    pub fn suspended(&self) -> bool {
        self.state.suspended()
    }

    pub fn delaying(&self) -> bool {
        self.state.delaying()
    }

    pub fn current_similarity(&self) -> f64 {
        self.state.current_similarity()
    }

    pub fn highest_similarity(&self) -> f64 {
        self.state.highest_similarity()
    }

    /// Consume a one-shot split, dummy or pause signal
    pub fn take_split_intent(&self, intent: SplitIntent) -> bool {
        self.state.take_intent(intent)
    }

    /// Latest frame at display geometry
    pub fn latest_display_frame(&self) -> Option<Arc<Frame>> {
        self.slots.display()
    }

    /// Latest frame at comparison geometry
    pub fn latest_comparison_frame(&self) -> Option<Arc<Frame>> {
        self.slots.comparison()
    }

    pub fn snapshot(&self) -> SplitterSnapshot {
        let (current_index, current_loop, current_image, threshold, split_count) = {
            let dir = self.split_dir.read();
            let image = dir.current_image();
            (
                dir.current_index(),
                dir.current_loop(),
                image.map(|i| i.name().to_string()),
                image.map(|i| i.threshold()),
                dir.len(),
            )
        };

        SplitterSnapshot {
            video_active: self.state.video_active(),
            splits_active: split_count > 0,
            compare_running: self.state.compare_running(),
            suspended: self.state.suspended(),
            delaying: self.state.delaying(),
            delay_remaining: self.state.delay_remaining(),
            suspend_remaining: self.state.suspend_remaining(),
            current_similarity: self.state.current_similarity(),
            highest_similarity: self.state.highest_similarity(),
            threshold,
            current_index,
            current_loop,
            current_image,
            split_count,
            capture_index: self.capture_index(),
            interval: self.state.interval(),
        }
    }
}

impl Drop for Splitter {
    fn drop(&mut self) {
        self.stop();
    }
}
