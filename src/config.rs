//! Splitter settings
//!
//! Settings can be loaded from TOML or from the flat key/value form used by
//! host applications (`target_fps = "60"`, `global_hotkeys_enabled = "True"`).

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::keys::{HotkeyAction, KeyBindings};
use crate::splits::{SplitDefaults, MAX_LOOPS, MAX_TIME_SECONDS};
use crate::{Result, SplitterError};

/// Pixel dimensions of a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Geometry {
    pub width: u32,
    pub height: u32,
}

impl Geometry {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Fails with `InvalidGeometry` if either dimension is zero
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(SplitterError::InvalidGeometry {
                width: self.width,
                height: self.height,
            });
        }
        Ok(())
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// Named display layouts, each fixing a UI and a comparison geometry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AspectRatio {
    #[default]
    #[serde(rename = "4:3 (480x360)")]
    Standard480x360,
    #[serde(rename = "4:3 (320x240)")]
    Standard320x240,
    #[serde(rename = "16:9 (512x288)")]
    Wide512x288,
    #[serde(rename = "16:9 (432x243)")]
    Wide432x243,
}

impl AspectRatio {
    pub const ALL: [AspectRatio; 4] = [
        AspectRatio::Standard480x360,
        AspectRatio::Standard320x240,
        AspectRatio::Wide512x288,
        AspectRatio::Wide432x243,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            AspectRatio::Standard480x360 => "4:3 (480x360)",
            AspectRatio::Standard320x240 => "4:3 (320x240)",
            AspectRatio::Wide512x288 => "16:9 (512x288)",
            AspectRatio::Wide432x243 => "16:9 (432x243)",
        }
    }

    /// Geometry of frames shown to the user
    pub fn display_geometry(&self) -> Geometry {
        match self {
            AspectRatio::Standard480x360 => Geometry::new(480, 360),
            AspectRatio::Standard320x240 => Geometry::new(320, 240),
            AspectRatio::Wide512x288 => Geometry::new(512, 288),
            AspectRatio::Wide432x243 => Geometry::new(432, 243),
        }
    }

    /// Geometry at which frames and split images are compared
    pub fn comparison_geometry(&self) -> Geometry {
        match self {
            AspectRatio::Standard480x360 | AspectRatio::Standard320x240 => Geometry::new(320, 240),
            AspectRatio::Wide512x288 | AspectRatio::Wide432x243 => Geometry::new(432, 243),
        }
    }
}

impl std::str::FromStr for AspectRatio {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        AspectRatio::ALL
            .into_iter()
            .find(|ratio| ratio.name() == s.trim())
            .ok_or_else(|| format!("Unknown aspect ratio: {}", s))
    }
}

impl std::fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Metric used to score a frame against a split image
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimilarityMetric {
    /// Masked normalized cross-correlation
    #[default]
    Correlation,
    /// One minus the masked L2 distance over its maximum
    L2,
}

impl std::str::FromStr for SimilarityMetric {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "correlation" => Ok(SimilarityMetric::Correlation),
            "l2" => Ok(SimilarityMetric::L2),
            _ => Err(format!("Unknown similarity metric: {}", s)),
        }
    }
}

impl std::fmt::Display for SimilarityMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SimilarityMetric::Correlation => write!(f, "correlation"),
            SimilarityMetric::L2 => write!(f, "l2"),
        }
    }
}

/// All options the engine consumes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Pacing rate for both worker loops
    pub target_fps: u32,
    pub comparison_width: u32,
    pub comparison_height: u32,
    pub frame_width: u32,
    pub frame_height: u32,
    pub aspect_ratio: AspectRatio,
    pub default_threshold: f64,
    /// Seconds
    pub default_delay: f64,
    /// Seconds
    pub default_suspend: f64,
    pub default_loops: u32,
    #[serde(flatten)]
    pub keys: KeyBindings,
    /// Whether the key sink is invoked at all
    pub global_hotkeys_enabled: bool,
    pub last_capture_source_index: u32,
    /// Display precision for similarity percentages (0..=2)
    pub match_percent_decimals: u8,
    /// Skip producing display frames
    pub minimal_view: bool,
    pub similarity_metric: SimilarityMetric,
}

impl Default for Settings {
    fn default() -> Self {
        let ratio = AspectRatio::default();
        let comparison = ratio.comparison_geometry();
        let display = ratio.display_geometry();
        let defaults = SplitDefaults::default();
        Self {
            target_fps: 60,
            comparison_width: comparison.width,
            comparison_height: comparison.height,
            frame_width: display.width,
            frame_height: display.height,
            aspect_ratio: ratio,
            default_threshold: defaults.threshold,
            default_delay: defaults.delay,
            default_suspend: defaults.suspend,
            default_loops: defaults.loops,
            keys: KeyBindings::default(),
            global_hotkeys_enabled: true,
            last_capture_source_index: 0,
            match_percent_decimals: 0,
            minimal_view: false,
            similarity_metric: SimilarityMetric::default(),
        }
    }
}

/// Keys accepted by [`Settings::set`], in the order [`Settings::to_pairs`] emits them
const SETTING_KEYS: &[&str] = &[
    "target_fps",
    "comparison_width",
    "comparison_height",
    "frame_width",
    "frame_height",
    "aspect_ratio",
    "default_threshold",
    "default_delay",
    "default_suspend",
    "default_loops",
    "split_key_code",
    "pause_key_code",
    "reset_key_code",
    "undo_key_code",
    "skip_key_code",
    "previous_key_code",
    "next_key_code",
    "screenshot_key_code",
    "toggle_hotkeys_key_code",
    "global_hotkeys_enabled",
    "last_capture_source_index",
    "match_percent_decimals",
    "minimal_view",
    "similarity_metric",
];

impl Settings {
    /// Parse TOML; missing keys keep their defaults
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let settings: Settings = toml::from_str(text)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load a TOML settings file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string(self)?)
    }

    /// Build settings from key/value string pairs on top of the defaults
    pub fn from_pairs<'a, I>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut settings = Settings::default();
        for (key, value) in pairs {
            settings.set(key, value)?;
        }
        settings.validate()?;
        Ok(settings)
    }

    /// All settings as key/value strings
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        SETTING_KEYS
            .iter()
            .filter_map(|key| self.get(key).map(|value| (key.to_string(), value)))
            .collect()
    }

    /// Set one option from its string form.
    ///
    /// Setting `aspect_ratio` also rewrites the comparison and display
    /// geometries.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let value = value.trim();
        match key {
            "target_fps" => self.target_fps = parse_number(key, value)?,
            "comparison_width" => self.comparison_width = parse_number(key, value)?,
            "comparison_height" => self.comparison_height = parse_number(key, value)?,
            "frame_width" => self.frame_width = parse_number(key, value)?,
            "frame_height" => self.frame_height = parse_number(key, value)?,
            "aspect_ratio" => {
                let ratio = value
                    .parse()
                    .map_err(|_| SplitterError::invalid_setting(key, value))?;
                self.set_aspect_ratio(ratio);
            }
            "default_threshold" => self.default_threshold = parse_number(key, value)?,
            "default_delay" => self.default_delay = parse_number(key, value)?,
            "default_suspend" => self.default_suspend = parse_number(key, value)?,
            "default_loops" => self.default_loops = parse_number(key, value)?,
            "global_hotkeys_enabled" => self.global_hotkeys_enabled = parse_bool(key, value)?,
            "last_capture_source_index" => {
                self.last_capture_source_index = parse_number(key, value)?
            }
            "match_percent_decimals" => {
                let decimals: u8 = parse_number(key, value)?;
                if decimals > 2 {
                    return Err(SplitterError::invalid_setting(key, value));
                }
                self.match_percent_decimals = decimals;
            }
            "minimal_view" => self.minimal_view = parse_bool(key, value)?,
            "similarity_metric" => {
                self.similarity_metric = value
                    .parse()
                    .map_err(|_| SplitterError::invalid_setting(key, value))?
            }
            _ => match key_action(key) {
                Some(action) => *self.keys.code_mut(action) = value.to_string(),
                None => return Err(SplitterError::UnknownSetting(key.to_string())),
            },
        }
        Ok(())
    }

    /// Current value of one option in its string form
    pub fn get(&self, key: &str) -> Option<String> {
        let value = match key {
            "target_fps" => self.target_fps.to_string(),
            "comparison_width" => self.comparison_width.to_string(),
            "comparison_height" => self.comparison_height.to_string(),
            "frame_width" => self.frame_width.to_string(),
            "frame_height" => self.frame_height.to_string(),
            "aspect_ratio" => self.aspect_ratio.to_string(),
            "default_threshold" => self.default_threshold.to_string(),
            "default_delay" => self.default_delay.to_string(),
            "default_suspend" => self.default_suspend.to_string(),
            "default_loops" => self.default_loops.to_string(),
            "global_hotkeys_enabled" => format_bool(self.global_hotkeys_enabled),
            "last_capture_source_index" => self.last_capture_source_index.to_string(),
            "match_percent_decimals" => self.match_percent_decimals.to_string(),
            "minimal_view" => format_bool(self.minimal_view),
            "similarity_metric" => self.similarity_metric.to_string(),
            _ => self.keys.code(key_action(key)?).to_string(),
        };
        Some(value)
    }

    /// Switch layout; both geometries follow the ratio
    pub fn set_aspect_ratio(&mut self, ratio: AspectRatio) {
        let comparison = ratio.comparison_geometry();
        let display = ratio.display_geometry();
        self.aspect_ratio = ratio;
        self.comparison_width = comparison.width;
        self.comparison_height = comparison.height;
        self.frame_width = display.width;
        self.frame_height = display.height;
    }

    pub fn comparison_geometry(&self) -> Geometry {
        Geometry::new(self.comparison_width, self.comparison_height)
    }

    pub fn display_geometry(&self) -> Geometry {
        Geometry::new(self.frame_width, self.frame_height)
    }

    /// Fallback values for split image metadata
    pub fn split_defaults(&self) -> SplitDefaults {
        SplitDefaults {
            threshold: self.default_threshold,
            delay: self.default_delay,
            suspend: self.default_suspend,
            loops: self.default_loops,
        }
    }

    /// Key code to press for an action, or `None` when the sink must not be
    /// called (hotkeys disabled or the action is unbound)
    pub fn key_to_press(&self, action: HotkeyAction) -> Option<&str> {
        let code = self.keys.code(action);
        (self.global_hotkeys_enabled && !code.is_empty()).then_some(code)
    }

    /// Check ranges the engine relies on
    pub fn validate(&self) -> Result<()> {
        self.comparison_geometry().validate()?;
        self.display_geometry().validate()?;
        if self.target_fps == 0 {
            return Err(SplitterError::invalid_setting("target_fps", "0"));
        }
        if !(self.default_threshold > 0.0 && self.default_threshold <= 1.0) {
            return Err(SplitterError::invalid_setting(
                "default_threshold",
                self.default_threshold.to_string(),
            ));
        }
        if !(0.0..=MAX_TIME_SECONDS).contains(&self.default_delay) {
            return Err(SplitterError::invalid_setting(
                "default_delay",
                self.default_delay.to_string(),
            ));
        }
        if !(0.0..=MAX_TIME_SECONDS).contains(&self.default_suspend) {
            return Err(SplitterError::invalid_setting(
                "default_suspend",
                self.default_suspend.to_string(),
            ));
        }
        if self.default_loops > MAX_LOOPS {
            return Err(SplitterError::invalid_setting(
                "default_loops",
                self.default_loops.to_string(),
            ));
        }
        if self.match_percent_decimals > 2 {
            return Err(SplitterError::invalid_setting(
                "match_percent_decimals",
                self.match_percent_decimals.to_string(),
            ));
        }
        Ok(())
    }
}

fn key_action(key: &str) -> Option<HotkeyAction> {
    HotkeyAction::ALL
        .into_iter()
        .find(|action| KeyBindings::setting_key(*action) == key)
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| SplitterError::invalid_setting(key, value))
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value {
        "True" | "true" => Ok(true),
        "False" | "false" => Ok(false),
        _ => Err(SplitterError::invalid_setting(key, value)),
    }
}

fn format_bool(value: bool) -> String {
    if value { "True" } else { "False" }.to_string()
}

/// Render a similarity in `[0, 1]` as a percentage with 0..=2 decimals
pub fn format_similarity(value: f64, decimals: u8) -> String {
    let decimals = decimals.min(2) as usize;
    format!("{:.*}%", decimals, value.clamp(0.0, 1.0) * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.target_fps, 60);
        assert_eq!(settings.comparison_geometry(), Geometry::new(320, 240));
        assert_eq!(settings.display_geometry(), Geometry::new(480, 360));
        assert_eq!(settings.default_threshold, 0.90);
        assert_eq!(settings.default_suspend, 1.0);
        assert_eq!(settings.default_loops, 0);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_aspect_ratio_sets_both_geometries() {
        let mut settings = Settings::default();
        settings.set("aspect_ratio", "16:9 (512x288)").unwrap();
        assert_eq!(settings.display_geometry(), Geometry::new(512, 288));
        assert_eq!(settings.comparison_geometry(), Geometry::new(432, 243));
        assert!(settings.set("aspect_ratio", "21:9").is_err());
    }

    #[test]
    fn test_bool_values_use_python_literals() {
        let mut settings = Settings::default();
        settings.set("global_hotkeys_enabled", "False").unwrap();
        assert!(!settings.global_hotkeys_enabled);
        assert_eq!(settings.get("global_hotkeys_enabled").as_deref(), Some("False"));
        settings.set("global_hotkeys_enabled", "True").unwrap();
        assert_eq!(settings.get("global_hotkeys_enabled").as_deref(), Some("True"));
        assert!(settings.set("global_hotkeys_enabled", "yes").is_err());
    }

    #[test]
    fn test_key_codes() {
        let mut settings = Settings::default();
        settings.set("split_key_code", "num1").unwrap();
        assert_eq!(settings.keys.split_key_code, "num1");
        assert_eq!(settings.key_to_press(HotkeyAction::Split), Some("num1"));
        assert_eq!(settings.key_to_press(HotkeyAction::Pause), None);

        settings.global_hotkeys_enabled = false;
        assert_eq!(settings.key_to_press(HotkeyAction::Split), None);
    }

    #[test]
    fn test_unknown_and_invalid_keys() {
        let mut settings = Settings::default();
        assert!(matches!(
            settings.set("volume", "3"),
            Err(SplitterError::UnknownSetting(_))
        ));
        assert!(matches!(
            settings.set("target_fps", "fast"),
            Err(SplitterError::InvalidSetting { .. })
        ));
        assert!(settings.set("match_percent_decimals", "3").is_err());
    }

    #[test]
    fn test_pairs_round_trip() {
        let mut settings = Settings::default();
        settings.set("default_threshold", "0.8").unwrap();
        settings.set("next_key_code", "right").unwrap();
        settings.set("minimal_view", "True").unwrap();

        let pairs = settings.to_pairs();
        assert_eq!(pairs.len(), SETTING_KEYS.len());
        let restored =
            Settings::from_pairs(pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))).unwrap();
        assert_eq!(restored, settings);
    }

    #[test]
    fn test_toml_partial_file() {
        let settings = Settings::from_toml_str(
            r#"
            target_fps = 30
            split_key_code = "f1"
            aspect_ratio = "16:9 (432x243)"
            similarity_metric = "l2"
            "#,
        )
        .unwrap();
        assert_eq!(settings.target_fps, 30);
        assert_eq!(settings.keys.split_key_code, "f1");
        assert_eq!(settings.aspect_ratio, AspectRatio::Wide432x243);
        assert_eq!(settings.similarity_metric, SimilarityMetric::L2);
        assert_eq!(settings.default_threshold, 0.90);
    }

    #[test]
    fn test_toml_round_trip() {
        let mut settings = Settings::default();
        settings.keys.pause_key_code = "p".to_string();
        let text = settings.to_toml_string().unwrap();
        assert_eq!(Settings::from_toml_str(&text).unwrap(), settings);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut settings = Settings::default();
        settings.comparison_width = 0;
        assert!(matches!(
            settings.validate(),
            Err(SplitterError::InvalidGeometry { .. })
        ));

        let mut settings = Settings::default();
        settings.default_threshold = 0.0;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.target_fps = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_validate_bounds_inherited_defaults() {
        let mut settings = Settings::default();
        settings.default_delay = MAX_TIME_SECONDS;
        settings.default_suspend = MAX_TIME_SECONDS;
        settings.default_loops = MAX_LOOPS;
        settings.validate().unwrap();

        for (key, value) in [
            ("default_delay", "100000"),
            ("default_suspend", "1e9"),
            ("default_suspend", "-1"),
            ("default_delay", "NaN"),
            ("default_loops", "100000"),
        ] {
            let mut settings = Settings::default();
            settings.set(key, value).unwrap();
            assert!(
                matches!(settings.validate(), Err(SplitterError::InvalidSetting { key: k, .. }) if k == key),
                "{} = {} accepted",
                key,
                value
            );
        }
    }

    #[test]
    fn test_format_similarity() {
        assert_eq!(format_similarity(0.934, 0), "93%");
        assert_eq!(format_similarity(0.93456, 2), "93.46%");
        assert_eq!(format_similarity(1.5, 1), "100.0%");
    }
}
