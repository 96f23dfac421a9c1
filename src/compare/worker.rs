//! The compare loop and the split step

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};

use super::detector::MatchDetector;
use super::similarity::similarity;
use crate::capture::FrameSlots;
use crate::config::Settings;
use crate::core::{EventHandler, Pacer, SplitEvent, SplitIntent, SplitsGate, SplitterState};
use crate::keys::{HotkeyAction, KeySink};
use crate::splits::{SplitDir, SplitImage};

enum StepOutcome {
    /// Split emitted and cool-down finished
    Completed,
    /// The list changed during the delay; nothing emitted
    Aborted,
    Shutdown,
}

/// Detector bound to the list generation it was built for
struct Tracked {
    generation: u64,
    detector: MatchDetector,
}

pub(crate) struct CompareWorker {
    pub settings: Arc<RwLock<Settings>>,
    pub split_dir: Arc<RwLock<SplitDir>>,
    pub slots: Arc<FrameSlots>,
    pub state: Arc<SplitterState>,
    pub gate: Arc<SplitsGate>,
    pub key_sink: Arc<dyn KeySink>,
    pub events: Arc<Mutex<EventHandler>>,
    pub done: Arc<AtomicBool>,
}

impl CompareWorker {
    fn should_stop(&self) -> bool {
        self.done.load(Ordering::SeqCst) || !self.state.video_active()
    }

    /// Score every new comparison frame against the current split image and
    /// run the split step on a match. Ends on stop, loss of video or an
    /// empty list.
    pub fn run(self) {
        self.state.set_compare_running(true);
        let mut pacer = Pacer::new(
            self.settings.read().target_fps as f64,
            self.state.device_max_fps(),
        );
        let mut tracked: Option<Tracked> = None;
        log::info!("Frame compare started");

        while !self.should_stop() {
            pacer.set_target_fps(self.settings.read().target_fps as f64);
            pacer.wait();
            self.state.set_interval(pacer.interval_secs());

            if self.gate.is_set() {
                if !self.gate.park(pacer.interval(), || self.should_stop()) {
                    break;
                }
                tracked = None;
                self.state.reset_similarities();
                pacer.reset();
                continue;
            }

            let Some(frame) = self.slots.comparison() else {
                continue;
            };

            let (generation, image) = {
                let dir = self.split_dir.read();
                match dir.current_image() {
                    Some(image) => (dir.generation(), image.clone()),
                    None => break,
                }
            };

            if tracked.as_ref().map(|t| t.generation) != Some(generation) {
                tracked = Some(Tracked {
                    generation,
                    detector: MatchDetector::for_image(&image),
                });
                self.state.reset_similarities();
            }
            if let Some(t) = tracked.as_mut() {
                // Defaults may have moved the threshold under a live detector
                if t.detector.threshold() != image.threshold() {
                    log::debug!(
                        "Threshold for '{}' changed to {:.3}",
                        image.name(),
                        image.threshold()
                    );
                    t.detector.set_threshold(image.threshold());
                }
            }

            let metric = self.settings.read().similarity_metric;
            let score = match similarity(metric, &image, &frame) {
                Ok(score) => score,
                Err(e) => {
                    log::debug!("Skipping frame for '{}': {}", image.name(), e);
                    continue;
                }
            };
            self.state.record_similarity(score);

            let matched = tracked
                .as_mut()
                .map(|t| t.detector.observe(score))
                .unwrap_or(false);
            if !matched {
                continue;
            }

            log::info!(
                "Split image '{}' matched at {:.3} (threshold {:.3})",
                image.name(),
                score,
                image.threshold()
            );
            match self.split_step(&image, generation, pacer.interval(), score) {
                StepOutcome::Shutdown => break,
                StepOutcome::Aborted => tracked = None,
                StepOutcome::Completed => tracked = self.rearm_if_same(&image),
            }
            pacer.reset();
        }

        self.state.set_compare_running(false);
        log::info!("Frame compare stopped");
    }

    /// After an advance that lands on the same image (loops, single-image
    /// lists) the next match needs a fresh crossing.
    fn rearm_if_same(&self, matched: &Arc<SplitImage>) -> Option<Tracked> {
        let dir = self.split_dir.read();
        let current = dir.current_image()?;
        if current.path() != matched.path() || current.name() != matched.name() {
            return None;
        }
        let detector = MatchDetector::for_image(current);
        Some(Tracked {
            generation: dir.generation(),
            detector: if current.flags().below {
                detector
            } else {
                detector.require_rearm()
            },
        })
    }

    fn split_step(
        &self,
        image: &SplitImage,
        generation: u64,
        interval: Duration,
        score: f64,
    ) -> StepOutcome {
        let delay = image.delay();
        if delay > 0.0 {
            self.state.set_delaying(true);
            let finished = self.wait_phase(delay, interval, |remaining| {
                self.state.set_delay_remaining(remaining)
            });
            self.state.set_delaying(false);
            self.state.set_delay_remaining(0.0);
            if !finished {
                return StepOutcome::Shutdown;
            }
            if self.split_dir.read().generation() != generation {
                log::info!("Split for '{}' dropped: split list changed during delay", image.name());
                return StepOutcome::Aborted;
            }
        }

        let intent = SplitIntent::from_flags(image.flags());
        let key = {
            let settings = self.settings.read();
            match intent {
                SplitIntent::Dummy => None,
                SplitIntent::Pause => settings.key_to_press(HotkeyAction::Pause).map(str::to_string),
                SplitIntent::Split => settings.key_to_press(HotkeyAction::Split).map(str::to_string),
            }
        };
        self.state.raise_intent(intent);
        if let Some(code) = key {
            self.key_sink.press(&code);
        }

        let (index, loop_index) = {
            let mut dir = self.split_dir.write();
            let cursor = dir.cursor().unwrap_or((0, 0));
            if let Err(e) = dir.next() {
                log::warn!("Could not advance split list: {}", e);
            }
            cursor
        };
        self.state.reset_similarities();
        self.events
            .lock()
            .emit(SplitEvent::new(intent, image.name(), index, loop_index, score));
        log::info!("{} emitted for '{}' (index {}, loop {})", intent, image.name(), index, loop_index);

        let suspend = image.suspend();
        if suspend > 0.0 {
            self.state.set_suspended(true);
            let finished = self.wait_phase(suspend, interval, |remaining| {
                self.state.set_suspend_remaining(remaining)
            });
            self.state.set_suspended(false);
            self.state.set_suspend_remaining(0.0);
            if !finished {
                return StepOutcome::Shutdown;
            }
        }

        StepOutcome::Completed
    }

    /// Sleep for `seconds` in slices of at most `interval`, publishing the
    /// time left. Returns `false` if interrupted by shutdown.
    fn wait_phase(&self, seconds: f64, interval: Duration, publish: impl Fn(f64)) -> bool {
        let start = Instant::now();
        let total = Duration::from_secs_f64(seconds);
        loop {
            let elapsed = start.elapsed();
            if elapsed >= total {
                publish(0.0);
                return true;
            }
            if self.should_stop() {
                return false;
            }
            let remaining = total - elapsed;
            publish(remaining.as_secs_f64());
            thread::sleep(remaining.min(interval));
        }
    }
}
