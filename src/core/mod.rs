//! Core splitter types
//!
//! - `Splitter` - owns the capture and compare threads
//! - `SplitterState` / `SplitterSnapshot` - observable state
//! - `SplitEvent` - emitted when a split image matches
//! - `Pacer` and `SplitsGate` - timing and navigation handshake used by the workers

mod events;
mod gate;
mod pacing;
mod splitter;
mod state;

pub use events::{EventHandler, SplitCallback, SplitEvent, SplitIntent};
pub use gate::{GateState, SplitsGate, NAVIGATION_TIMEOUT};
pub use pacing::{Pacer, ADJUST_STEP, INITIAL_ADJUST_FACTOR};
pub use splitter::Splitter;
pub use state::{AtomicF64, SplitterSnapshot, SplitterState};
