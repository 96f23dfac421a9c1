//! Video capture sources and the frame slots shared with the compare loop
//!
//! Platform capture devices live outside this crate; they plug in through
//! [`CaptureOpener`] and [`CaptureSource`]. Two implementations ship here:
//! - `sequence` - replays a directory of still images as a video device
//! - `mock` - scripted frames for tests and demos

mod mock;
mod sequence;
pub(crate) mod worker;

pub use mock::{FrameFeed, MockCapture, MockOpener};
pub use sequence::{FrameSequenceCapture, FrameSequenceOpener};

use crate::error::Result;
use crate::frame::Frame;
use arc_swap::ArcSwapOption;
use std::sync::Arc;

/// An opened capture device
pub trait CaptureSource: Send {
    /// Block until the next frame is available.
    ///
    /// `None` means the device stopped delivering frames; the capture loop
    /// treats it as loss of video.
    fn read_frame(&mut self) -> Option<Frame>;

    /// Rate the device reports, if any
    fn max_fps(&self) -> Option<f64>;

    /// Ask the device to queue at most `frames` frames
    fn set_buffer_size(&mut self, _frames: usize) {}

    /// Release the device. Called once when the capture loop exits.
    fn release(&mut self) {}
}

/// Opens capture devices by index
pub trait CaptureOpener: Send + Sync {
    fn open(&self, index: u32) -> Result<Box<dyn CaptureSource>>;
}

/// Latest frames published by the capture loop.
///
/// Each slot holds one frame; writers replace it, readers take an `Arc` to
/// whatever is current. A reader never sees a partially written frame.
#[derive(Debug, Default)]
pub struct FrameSlots {
    comparison: ArcSwapOption<Frame>,
    display: ArcSwapOption<Frame>,
}

impl FrameSlots {
    pub fn new() -> Self {
        Self::default()
    }

    /// Frame at comparison geometry
    pub fn comparison(&self) -> Option<Arc<Frame>> {
        self.comparison.load_full()
    }

    /// Frame at display geometry; empty in minimal view
    pub fn display(&self) -> Option<Arc<Frame>> {
        self.display.load_full()
    }

    pub fn publish_comparison(&self, frame: Frame) {
        self.comparison.store(Some(Arc::new(frame)));
    }

    pub fn publish_display(&self, frame: Frame) {
        self.display.store(Some(Arc::new(frame)));
    }

    pub fn clear_display(&self) {
        self.display.store(None);
    }

    pub fn clear(&self) {
        self.comparison.store(None);
        self.display.store(None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slots_replace_and_clear() {
        let slots = FrameSlots::new();
        assert!(slots.comparison().is_none());

        slots.publish_comparison(Frame::solid(2, 2, [1, 2, 3, 255]));
        let held = slots.comparison().unwrap();
        slots.publish_comparison(Frame::solid(2, 2, [9, 9, 9, 255]));

        // An earlier reader keeps its frame
        assert_eq!(held.image().get_pixel(0, 0).0, [1, 2, 3, 255]);
        assert_eq!(slots.comparison().unwrap().image().get_pixel(0, 0).0, [9, 9, 9, 255]);

        slots.publish_display(Frame::solid(4, 4, [0, 0, 0, 255]));
        slots.clear_display();
        assert!(slots.display().is_none());
        assert!(slots.comparison().is_some());

        slots.clear();
        assert!(slots.comparison().is_none());
    }
}
