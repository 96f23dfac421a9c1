//! Replay a directory of still images as a capture device

use super::{CaptureOpener, CaptureSource};
use crate::error::{Result, SplitterError};
use crate::frame::Frame;
use crate::splits::is_split_image;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

/// Plays back image files in name order at a fixed rate
pub struct FrameSequenceCapture {
    frames: Vec<PathBuf>,
    position: usize,
    looping: bool,
    fps: f64,
    last_read: Option<Instant>,
}

impl FrameSequenceCapture {
    pub fn from_directory(path: impl AsRef<Path>, looping: bool, fps: f64) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_dir() {
            return Err(SplitterError::CaptureDirNotFound(path.to_path_buf()));
        }

        let mut frames: Vec<PathBuf> = std::fs::read_dir(path)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && is_split_image(p))
            .collect();
        frames.sort();

        if frames.is_empty() {
            return Err(SplitterError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no frames in {}", path.display()),
            )));
        }

        log::debug!("Frame sequence {} has {} frames", path.display(), frames.len());
        Ok(Self {
            frames,
            position: 0,
            looping,
            fps: if fps > 0.0 { fps } else { 30.0 },
            last_read: None,
        })
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Sleep so reads behave like a device delivering `fps` frames a second
    fn pace(&mut self) {
        let period = Duration::from_secs_f64(1.0 / self.fps);
        if let Some(last) = self.last_read {
            let elapsed = last.elapsed();
            if elapsed < period {
                thread::sleep(period - elapsed);
            }
        }
        self.last_read = Some(Instant::now());
    }
}

impl CaptureSource for FrameSequenceCapture {
    fn read_frame(&mut self) -> Option<Frame> {
        self.pace();

        // Every file gets one chance per call; undecodable ones are skipped
        for _ in 0..self.frames.len() {
            if self.position >= self.frames.len() {
                if !self.looping {
                    return None;
                }
                self.position = 0;
            }

            let path = &self.frames[self.position];
            self.position += 1;
            match image::open(path) {
                Ok(decoded) => return Some(Frame::from_dynamic(decoded)),
                Err(e) => log::warn!("Skipping frame {}: {}", path.display(), e),
            }
        }
        None
    }

    fn max_fps(&self) -> Option<f64> {
        Some(self.fps)
    }
}

/// Each index maps to one frame directory
#[derive(Debug, Clone)]
pub struct FrameSequenceOpener {
    sources: Vec<PathBuf>,
    fps: f64,
    looping: bool,
}

impl FrameSequenceOpener {
    pub fn new(sources: Vec<PathBuf>, fps: f64, looping: bool) -> Self {
        Self { sources, fps, looping }
    }
}

impl CaptureOpener for FrameSequenceOpener {
    fn open(&self, index: u32) -> Result<Box<dyn CaptureSource>> {
        let path = self
            .sources
            .get(index as usize)
            .ok_or(SplitterError::CaptureOpenFailed { index })?;

        match FrameSequenceCapture::from_directory(path, self.looping, self.fps) {
            Ok(capture) => Ok(Box::new(capture)),
            Err(e) => {
                log::debug!("Frame sequence {} unavailable: {}", path.display(), e);
                Err(SplitterError::CaptureOpenFailed { index })
            }
        }
    }
}
