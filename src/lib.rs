//! Image Autosplitter
//!
//! An image-driven autosplitter engine for speedrun timers. It watches a video
//! capture source, compares each frame against an ordered list of split
//! images, and when the current image matches it emits a split (or pause)
//! key press through a host-supplied sink, then advances to the next image.
//!
//! The engine runs two worker threads:
//! - Capture reads frames from a [`capture::CaptureSource`] and publishes
//!   them at comparison and display geometry
//! - Compare scores the latest frame against the current split image and
//!   runs the delay / key press / advance / cool-down sequence on a match
//!
//! Hosts own a [`Splitter`] and drive it with navigation calls and hotkey
//! actions. Everything else is observable through getters, snapshots and
//! split callbacks.
//!
//! ```no_run
//! use std::sync::Arc;
//! use image_autosplitter::capture::FrameSequenceOpener;
//! use image_autosplitter::{NullKeySink, Settings, Splitter};
//!
//! let opener = FrameSequenceOpener::new(vec!["recording/".into()], 60.0, false);
//! let mut splitter = Splitter::new(Settings::default(), Arc::new(opener), Arc::new(NullKeySink))?;
//! splitter.on_split(|event| println!("{} at {}", event.image_name, event.index));
//! splitter.load_splits("splits/")?;
//! splitter.start()?;
//! # Ok::<(), image_autosplitter::SplitterError>(())
//! ```

pub mod capture;
pub mod compare;
pub mod config;
pub mod core;
pub mod error;
pub mod frame;
pub mod keys;
pub mod splits;

// Re-export commonly used types
pub use crate::config::{format_similarity, AspectRatio, Geometry, Settings, SimilarityMetric};
pub use crate::core::{SplitEvent, SplitIntent, Splitter, SplitterSnapshot, SplitterState};
pub use error::{Result, SplitterError};
pub use frame::Frame;
pub use keys::{HotkeyAction, KeyBindings, KeySink, NullKeySink, RecordingKeySink};
pub use splits::{SplitDefaults, SplitDir, SplitImage, SplitMetadata};
