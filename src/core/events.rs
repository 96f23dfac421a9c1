//! Events emitted by the splitter

use crate::splits::SplitFlags;
use std::fmt;
use std::time::Instant;

/// What a completed match asks the host timer to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitIntent {
    Split,
    /// Advance the list without touching the timer
    Dummy,
    Pause,
}

impl SplitIntent {
    pub fn from_flags(flags: SplitFlags) -> Self {
        if flags.dummy {
            SplitIntent::Dummy
        } else if flags.pause {
            SplitIntent::Pause
        } else {
            SplitIntent::Split
        }
    }
}

impl fmt::Display for SplitIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SplitIntent::Split => write!(f, "split"),
            SplitIntent::Dummy => write!(f, "dummy"),
            SplitIntent::Pause => write!(f, "pause"),
        }
    }
}

/// Event emitted when a split image matched and the list advanced
#[derive(Debug, Clone)]
pub struct SplitEvent {
    pub intent: SplitIntent,
    /// File stem of the split image that matched
    pub image_name: String,
    /// Cursor position at the time of the match
    pub index: usize,
    pub loop_index: u32,
    /// Similarity that completed the match
    pub similarity: f64,
    pub timestamp: Instant,
}

impl SplitEvent {
    pub fn new(
        intent: SplitIntent,
        image_name: impl Into<String>,
        index: usize,
        loop_index: u32,
        similarity: f64,
    ) -> Self {
        Self {
            intent,
            image_name: image_name.into(),
            index,
            loop_index,
            similarity,
            timestamp: Instant::now(),
        }
    }
}

/// Callback type for split events
pub type SplitCallback = Box<dyn Fn(SplitEvent) + Send + Sync>;

/// Event handler that can have multiple listeners
#[derive(Default)]
pub struct EventHandler {
    callbacks: Vec<SplitCallback>,
}

impl EventHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_split(&mut self, callback: SplitCallback) {
        self.callbacks.push(callback);
    }

    /// Emit a split event to all listeners
    pub fn emit(&self, event: SplitEvent) {
        for callback in &self.callbacks {
            callback(event.clone());
        }
    }

    pub fn has_listeners(&self) -> bool {
        !self.callbacks.is_empty()
    }
}
