//! The capture loop

use super::{CaptureSource, FrameSlots};
use crate::config::Settings;
use crate::core::{Pacer, SplitterState};
use crate::error::SplitterError;
use crate::frame::Interpolation;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub(crate) struct CaptureWorker {
    pub source: Box<dyn CaptureSource>,
    pub slots: Arc<FrameSlots>,
    pub state: Arc<SplitterState>,
    pub settings: Arc<RwLock<Settings>>,
    pub done: Arc<AtomicBool>,
}

impl CaptureWorker {
    /// Read frames until stopped or the device goes away, publishing each one
    /// at comparison and display geometry.
    ///
    /// On exit the device is released, both slots are cleared and
    /// `video_active` drops, which also ends the compare loop.
    pub fn run(mut self) {
        let mut pacer = Pacer::new(
            self.settings.read().target_fps as f64,
            self.state.device_max_fps(),
        );
        let mut lost = false;
        log::info!("Frame capture started");

        while !self.done.load(Ordering::SeqCst) {
            let (target_fps, comparison, display, minimal_view) = {
                let settings = self.settings.read();
                (
                    settings.target_fps as f64,
                    settings.comparison_geometry(),
                    settings.display_geometry(),
                    settings.minimal_view,
                )
            };

            pacer.set_target_fps(target_fps);
            if pacer.should_sleep() {
                pacer.wait();
                if self.done.load(Ordering::SeqCst) {
                    break;
                }
            } else {
                pacer.tick();
            }

            let Some(frame) = self.source.read_frame() else {
                lost = true;
                break;
            };

            if minimal_view {
                self.slots.clear_display();
            } else {
                self.slots
                    .publish_display(frame.resized(display, Interpolation::Nearest));
            }
            self.slots
                .publish_comparison(frame.resized(comparison, Interpolation::Bilinear));
        }

        self.source.release();
        self.slots.clear();
        self.state.set_video_active(false);

        if lost {
            log::warn!("{}", SplitterError::CaptureLost);
        } else {
            log::info!("Frame capture stopped");
        }
    }
}
