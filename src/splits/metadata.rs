//! Split image metadata parsed from file names
//!
//! A split image file name carries its own configuration:
//!
//! | token     | meaning                                   |
//! |-----------|-------------------------------------------|
//! | `_{bdp}`  | behaviour flags (below / dummy / pause)   |
//! | `_#N#`    | delay in seconds before the key press     |
//! | `_[N]`    | suspend in seconds after the key press    |
//! | `_(N)`    | threshold as a percentage                 |
//! | `_@N@`    | additional loops of the same image        |
//!
//! e.g. `boss_(90)_#0.5#_[10]_{b}.png`. A token counts only when an
//! underscore precedes it. Missing or malformed tokens fall back
//! to the global default and are flagged as such.

use serde::{Deserialize, Serialize};

use crate::{Result, SplitterError};

/// Upper bound for delay and suspend seconds and for loop counts
pub const MAX_TIME_SECONDS: f64 = 99999.0;
pub const MAX_LOOPS: u32 = 99999;

/// Global fallbacks for values a file name does not specify
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SplitDefaults {
    pub threshold: f64,
    pub delay: f64,
    pub suspend: f64,
    pub loops: u32,
}

impl Default for SplitDefaults {
    fn default() -> Self {
        Self {
            threshold: 0.90,
            delay: 0.0,
            suspend: 1.0,
            loops: 0,
        }
    }
}

/// Behaviour flags from the `{...}` token
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitFlags {
    /// Match on the falling edge instead of the rising edge
    pub below: bool,
    /// Advance without pressing any key
    pub dummy: bool,
    /// Press the pause key instead of the split key
    pub pause: bool,
}

impl SplitFlags {
    /// Parse flag characters. Dummy wins over pause.
    pub fn parse(flags: &str) -> Self {
        let mut parsed = Self {
            below: flags.contains('b'),
            dummy: flags.contains('d'),
            pause: flags.contains('p'),
        };
        if parsed.dummy && parsed.pause {
            parsed.pause = false;
        }
        parsed
    }
}

/// Values parsed from a split image file name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitMetadata {
    pub threshold: f64,
    pub delay: f64,
    pub suspend: f64,
    pub loops: u32,
    pub flags: SplitFlags,
    pub threshold_is_default: bool,
    pub delay_is_default: bool,
    pub suspend_is_default: bool,
    pub loops_is_default: bool,
}

impl SplitMetadata {
    /// Metadata where every value comes from `defaults`
    pub fn from_defaults(defaults: &SplitDefaults) -> Self {
        Self {
            threshold: defaults.threshold,
            delay: defaults.delay,
            suspend: defaults.suspend,
            loops: defaults.loops,
            flags: SplitFlags::default(),
            threshold_is_default: true,
            delay_is_default: true,
            suspend_is_default: true,
            loops_is_default: true,
        }
    }

    /// Parse metadata from a file stem (the name without its extension)
    pub fn parse(stem: &str, defaults: &SplitDefaults) -> Self {
        let mut meta = Self::from_defaults(defaults);

        if let Some(flags) = token_between(stem, "_{", '}') {
            meta.flags = SplitFlags::parse(flags);
        }

        if let Some(value) = parse_token("delay", token_between(stem, "_#", '#'), parse_seconds) {
            meta.delay = value;
            meta.delay_is_default = false;
        }

        if let Some(value) = parse_token("suspend", token_between(stem, "_[", ']'), parse_seconds) {
            meta.suspend = value;
            meta.suspend_is_default = false;
        }

        if let Some(value) =
            parse_token("threshold", token_between(stem, "_(", ')'), parse_threshold)
        {
            meta.threshold = value;
            meta.threshold_is_default = false;
        }

        if let Some(value) = parse_token("loops", token_between(stem, "_@", '@'), parse_loops) {
            meta.loops = value;
            meta.loops_is_default = false;
        }

        meta
    }

    /// Overwrite the threshold if it was inherited
    pub fn apply_default_threshold(&mut self, defaults: &SplitDefaults) {
        if self.threshold_is_default {
            self.threshold = defaults.threshold;
        }
    }

    pub fn apply_default_delay(&mut self, defaults: &SplitDefaults) {
        if self.delay_is_default {
            self.delay = defaults.delay;
        }
    }

    pub fn apply_default_suspend(&mut self, defaults: &SplitDefaults) {
        if self.suspend_is_default {
            self.suspend = defaults.suspend;
        }
    }

    pub fn apply_default_loops(&mut self, defaults: &SplitDefaults) {
        if self.loops_is_default {
            self.loops = defaults.loops;
        }
    }
}

/// Text between the first `open` (underscore included) and the following `close`
fn token_between<'a>(stem: &'a str, open: &str, close: char) -> Option<&'a str> {
    let start = stem.find(open)? + open.len();
    let len = stem[start..].find(close)?;
    Some(&stem[start..start + len])
}

/// Run a token parser, logging and discarding malformed values
fn parse_token<T>(
    token: &'static str,
    raw: Option<&str>,
    parse: fn(&'static str, &str) -> Result<T>,
) -> Option<T> {
    let raw = raw?;
    match parse(token, raw) {
        Ok(value) => Some(value),
        Err(e) => {
            log::debug!("Falling back to default: {}", e);
            None
        }
    }
}

fn invalid(token: &'static str, raw: &str) -> SplitterError {
    SplitterError::InvalidMetadata {
        token,
        value: raw.to_string(),
    }
}

fn parse_seconds(token: &'static str, raw: &str) -> Result<f64> {
    let value: f64 = raw.trim().parse().map_err(|_| invalid(token, raw))?;
    if !value.is_finite() || value < 0.0 {
        return Err(invalid(token, raw));
    }
    Ok(value.min(MAX_TIME_SECONDS))
}

fn parse_threshold(token: &'static str, raw: &str) -> Result<f64> {
    let percent: f64 = raw.trim().parse().map_err(|_| invalid(token, raw))?;
    if !percent.is_finite() || percent <= 0.0 {
        return Err(invalid(token, raw));
    }
    Ok((percent / 100.0).min(1.0))
}

fn parse_loops(token: &'static str, raw: &str) -> Result<u32> {
    let loops: u64 = raw.trim().parse().map_err(|_| invalid(token, raw))?;
    Ok(loops.min(MAX_LOOPS as u64) as u32)
}
