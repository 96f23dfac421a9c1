//! Scripted capture devices
//!
//! A [`FrameFeed`] is the test's handle on what a device "sees". Every
//! [`MockCapture`] opened from it shares the same state, so a test can swap
//! frames or cut the signal while the splitter is running.

use super::{CaptureOpener, CaptureSource};
use crate::error::{Result, SplitterError};
use crate::frame::Frame;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
struct FeedState {
    current: Option<Frame>,
    /// Played once each, ahead of `current`
    queue: VecDeque<Frame>,
    lost: bool,
    reads: u64,
    releases: u32,
}

#[derive(Debug, Clone, Default)]
pub struct FrameFeed {
    inner: Arc<Mutex<FeedState>>,
}

impl FrameFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_frame(frame: Frame) -> Self {
        let feed = Self::new();
        feed.set_frame(frame);
        feed
    }

    /// Frame returned on every read until replaced
    pub fn set_frame(&self, frame: Frame) {
        self.inner.lock().current = Some(frame);
    }

    /// Frames returned once each before falling back to the current frame
    pub fn push_frames(&self, frames: impl IntoIterator<Item = Frame>) {
        self.inner.lock().queue.extend(frames);
    }

    /// Make every subsequent read fail
    pub fn lose_signal(&self) {
        self.inner.lock().lost = true;
    }

    pub fn restore_signal(&self) {
        self.inner.lock().lost = false;
    }

    pub fn reads(&self) -> u64 {
        self.inner.lock().reads
    }

    /// How many devices opened from this feed were released
    pub fn releases(&self) -> u32 {
        self.inner.lock().releases
    }

    fn next_frame(&self) -> Option<Frame> {
        let mut state = self.inner.lock();
        if state.lost {
            return None;
        }
        state.reads += 1;
        match state.queue.pop_front() {
            Some(frame) => Some(frame),
            None => state.current.clone(),
        }
    }
}

pub struct MockCapture {
    feed: FrameFeed,
    fps: f64,
    buffer_size: usize,
    last_read: Option<Instant>,
}

impl MockCapture {
    pub fn new(feed: FrameFeed, fps: f64) -> Self {
        Self {
            feed,
            fps,
            buffer_size: 0,
            last_read: None,
        }
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }
}

impl CaptureSource for MockCapture {
    fn read_frame(&mut self) -> Option<Frame> {
        if self.fps > 0.0 {
            let period = Duration::from_secs_f64(1.0 / self.fps);
            if let Some(last) = self.last_read {
                let elapsed = last.elapsed();
                if elapsed < period {
                    thread::sleep(period - elapsed);
                }
            }
            self.last_read = Some(Instant::now());
        }
        self.feed.next_frame()
    }

    fn max_fps(&self) -> Option<f64> {
        (self.fps > 0.0).then_some(self.fps)
    }

    fn set_buffer_size(&mut self, frames: usize) {
        self.buffer_size = frames;
    }

    fn release(&mut self) {
        self.feed.inner.lock().releases += 1;
    }
}

/// Opens [`MockCapture`]s for the indices that have a feed
#[derive(Debug, Default)]
pub struct MockOpener {
    feeds: Mutex<HashMap<u32, FrameFeed>>,
    fps: f64,
    opened: Mutex<Vec<u32>>,
}

impl MockOpener {
    pub fn new(fps: f64) -> Self {
        Self {
            fps,
            ..Default::default()
        }
    }

    pub fn with_source(self, index: u32, feed: FrameFeed) -> Self {
        self.add_source(index, feed);
        self
    }

    pub fn add_source(&self, index: u32, feed: FrameFeed) {
        self.feeds.lock().insert(index, feed);
    }

    pub fn remove_source(&self, index: u32) {
        self.feeds.lock().remove(&index);
    }

    /// Every index successfully opened so far, in order
    pub fn opened(&self) -> Vec<u32> {
        self.opened.lock().clone()
    }
}

impl CaptureOpener for MockOpener {
    fn open(&self, index: u32) -> Result<Box<dyn CaptureSource>> {
        let feed = self
            .feeds
            .lock()
            .get(&index)
            .cloned()
            .ok_or(SplitterError::CaptureOpenFailed { index })?;
        self.opened.lock().push(index);
        Ok(Box::new(MockCapture::new(feed, self.fps)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_plays_before_current() {
        let feed = FrameFeed::with_frame(Frame::solid(1, 1, [0, 0, 0, 255]));
        feed.push_frames([Frame::solid(1, 1, [5, 5, 5, 255])]);

        let mut capture = MockCapture::new(feed.clone(), 0.0);
        assert_eq!(capture.read_frame().unwrap().image().get_pixel(0, 0).0, [5, 5, 5, 255]);
        assert_eq!(capture.read_frame().unwrap().image().get_pixel(0, 0).0, [0, 0, 0, 255]);
        assert_eq!(feed.reads(), 2);
    }

    #[test]
    fn test_lost_signal() {
        let feed = FrameFeed::with_frame(Frame::solid(1, 1, [0, 0, 0, 255]));
        let mut capture = MockCapture::new(feed.clone(), 0.0);
        feed.lose_signal();
        assert!(capture.read_frame().is_none());
        feed.restore_signal();
        assert!(capture.read_frame().is_some());

        capture.release();
        assert_eq!(feed.releases(), 1);
    }

    #[test]
    fn test_opener() {
        let opener = MockOpener::new(30.0).with_source(2, FrameFeed::new());
        assert!(matches!(
            opener.open(0),
            Err(SplitterError::CaptureOpenFailed { index: 0 })
        ));

        let mut capture = opener.open(2).unwrap();
        assert_eq!(capture.max_fps(), Some(30.0));
        // No frame configured yet
        assert!(capture.read_frame().is_none());
        assert_eq!(opener.opened(), vec![2]);
    }
}
