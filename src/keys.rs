//! Key dispatch and hotkey bindings
//!
//! The engine never talks to a keyboard API directly. It hands key codes to a
//! [`KeySink`] supplied by the host application, and resolves codes reported
//! by the host's hotkey listener into [`HotkeyAction`]s.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Receiver for key presses emitted by the engine
pub trait KeySink: Send + Sync {
    /// Press the key identified by `code`. Never called with an empty code.
    fn press(&self, code: &str);
}

impl<F> KeySink for F
where
    F: Fn(&str) + Send + Sync,
{
    fn press(&self, code: &str) {
        self(code)
    }
}

/// Sink that drops every key press
#[derive(Debug, Default, Clone, Copy)]
pub struct NullKeySink;

impl KeySink for NullKeySink {
    fn press(&self, code: &str) {
        log::trace!("Dropping key press {:?}", code);
    }
}

/// Sink that records key presses in order
#[derive(Debug, Default)]
pub struct RecordingKeySink {
    pressed: Mutex<Vec<String>>,
}

impl RecordingKeySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All codes pressed so far
    pub fn pressed(&self) -> Vec<String> {
        self.pressed.lock().clone()
    }

    /// Number of presses recorded
    pub fn count(&self) -> usize {
        self.pressed.lock().len()
    }

    pub fn clear(&self) {
        self.pressed.lock().clear();
    }
}

impl KeySink for RecordingKeySink {
    fn press(&self, code: &str) {
        self.pressed.lock().push(code.to_string());
    }
}

/// Actions a hotkey can be bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HotkeyAction {
    /// Split key, emitted by the engine on a match
    Split,
    /// Pause key, emitted for images with the `p` flag
    Pause,
    /// Reset the split list to the first image
    Reset,
    /// Undo the last split
    Undo,
    /// Skip the current split
    Skip,
    /// Move to the previous split image
    Previous,
    /// Move to the next split image
    Next,
    /// Save a screenshot of the capture
    Screenshot,
    /// Toggle whether the key sink is invoked
    ToggleHotkeys,
}

impl HotkeyAction {
    pub const ALL: [HotkeyAction; 9] = [
        HotkeyAction::Split,
        HotkeyAction::Pause,
        HotkeyAction::Reset,
        HotkeyAction::Undo,
        HotkeyAction::Skip,
        HotkeyAction::Previous,
        HotkeyAction::Next,
        HotkeyAction::Screenshot,
        HotkeyAction::ToggleHotkeys,
    ];
}

impl std::str::FromStr for HotkeyAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "split" => Ok(HotkeyAction::Split),
            "pause" => Ok(HotkeyAction::Pause),
            "reset" => Ok(HotkeyAction::Reset),
            "undo" => Ok(HotkeyAction::Undo),
            "skip" => Ok(HotkeyAction::Skip),
            "previous" => Ok(HotkeyAction::Previous),
            "next" => Ok(HotkeyAction::Next),
            "screenshot" => Ok(HotkeyAction::Screenshot),
            "toggle_hotkeys" => Ok(HotkeyAction::ToggleHotkeys),
            _ => Err(format!("Unknown hotkey action: {}", s)),
        }
    }
}

impl std::fmt::Display for HotkeyAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HotkeyAction::Split => write!(f, "split"),
            HotkeyAction::Pause => write!(f, "pause"),
            HotkeyAction::Reset => write!(f, "reset"),
            HotkeyAction::Undo => write!(f, "undo"),
            HotkeyAction::Skip => write!(f, "skip"),
            HotkeyAction::Previous => write!(f, "previous"),
            HotkeyAction::Next => write!(f, "next"),
            HotkeyAction::Screenshot => write!(f, "screenshot"),
            HotkeyAction::ToggleHotkeys => write!(f, "toggle_hotkeys"),
        }
    }
}

/// Key codes bound to each action. Empty string means unbound.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyBindings {
    pub split_key_code: String,
    pub pause_key_code: String,
    pub reset_key_code: String,
    pub undo_key_code: String,
    pub skip_key_code: String,
    pub previous_key_code: String,
    pub next_key_code: String,
    pub screenshot_key_code: String,
    pub toggle_hotkeys_key_code: String,
}

impl KeyBindings {
    /// Key code bound to an action
    pub fn code(&self, action: HotkeyAction) -> &str {
        match action {
            HotkeyAction::Split => &self.split_key_code,
            HotkeyAction::Pause => &self.pause_key_code,
            HotkeyAction::Reset => &self.reset_key_code,
            HotkeyAction::Undo => &self.undo_key_code,
            HotkeyAction::Skip => &self.skip_key_code,
            HotkeyAction::Previous => &self.previous_key_code,
            HotkeyAction::Next => &self.next_key_code,
            HotkeyAction::Screenshot => &self.screenshot_key_code,
            HotkeyAction::ToggleHotkeys => &self.toggle_hotkeys_key_code,
        }
    }

    /// Mutable key code slot for an action
    pub fn code_mut(&mut self, action: HotkeyAction) -> &mut String {
        match action {
            HotkeyAction::Split => &mut self.split_key_code,
            HotkeyAction::Pause => &mut self.pause_key_code,
            HotkeyAction::Reset => &mut self.reset_key_code,
            HotkeyAction::Undo => &mut self.undo_key_code,
            HotkeyAction::Skip => &mut self.skip_key_code,
            HotkeyAction::Previous => &mut self.previous_key_code,
            HotkeyAction::Next => &mut self.next_key_code,
            HotkeyAction::Screenshot => &mut self.screenshot_key_code,
            HotkeyAction::ToggleHotkeys => &mut self.toggle_hotkeys_key_code,
        }
    }

    /// Resolve a pressed key code to the first action bound to it
    pub fn action_for(&self, code: &str) -> Option<HotkeyAction> {
        if code.is_empty() {
            return None;
        }
        HotkeyAction::ALL
            .into_iter()
            .find(|action| self.code(*action) == code)
    }

    /// Settings key for an action's code (e.g. `split_key_code`)
    pub fn setting_key(action: HotkeyAction) -> &'static str {
        match action {
            HotkeyAction::Split => "split_key_code",
            HotkeyAction::Pause => "pause_key_code",
            HotkeyAction::Reset => "reset_key_code",
            HotkeyAction::Undo => "undo_key_code",
            HotkeyAction::Skip => "skip_key_code",
            HotkeyAction::Previous => "previous_key_code",
            HotkeyAction::Next => "next_key_code",
            HotkeyAction::Screenshot => "screenshot_key_code",
            HotkeyAction::ToggleHotkeys => "toggle_hotkeys_key_code",
        }
    }
}
