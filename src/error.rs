//! Error types for the splitter engine

use std::path::PathBuf;

/// Result type used throughout the crate
pub type Result<T> = std::result::Result<T, SplitterError>;

/// Errors produced by the splitter engine
///
/// Most of these never reach the caller: the worker loops log and absorb
/// them, and only the observable flags change.
#[derive(Debug, thiserror::Error)]
pub enum SplitterError {
    /// Capture device could not be opened
    #[error("capture source {index} could not be opened")]
    CaptureOpenFailed { index: u32 },

    /// Capture device stopped delivering frames
    #[error("capture source stopped delivering frames")]
    CaptureLost,

    /// A frame-sequence capture directory does not exist
    #[error("frame sequence directory not found: {}", .0.display())]
    CaptureDirNotFound(PathBuf),

    /// A split image failed to decode
    #[error("failed to load split image {}: {source}", path.display())]
    ImageLoad {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// A geometry had a zero dimension
    #[error("invalid geometry {width}x{height}")]
    InvalidGeometry { width: u32, height: u32 },

    /// A filename token could not be parsed
    #[error("invalid metadata token {token}: {value:?}")]
    InvalidMetadata { token: &'static str, value: String },

    /// Operation requires a non-empty split list
    #[error("no split images loaded")]
    NoSplitList,

    /// The split image directory does not exist
    #[error("split image directory not found: {}", .0.display())]
    SplitDirNotFound(PathBuf),

    /// A resampling kernel rejected its buffers
    #[error("resize failed: {0}")]
    Resize(String),

    /// Similarity could not be computed for this frame
    #[error("similarity computation failed: {0}")]
    SimilarityCompute(String),

    /// Compare did not park within the navigation timeout
    #[error("compare loop did not acknowledge the split change in time")]
    NavigationTimeout,

    /// Unrecognised settings key
    #[error("unknown setting: {0}")]
    UnknownSetting(String),

    /// Settings value could not be parsed or is out of range
    #[error("invalid value for {key}: {value:?}")]
    InvalidSetting { key: String, value: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("settings parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("settings serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl SplitterError {
    /// Shorthand for an invalid settings value
    pub(crate) fn invalid_setting(key: &str, value: impl Into<String>) -> Self {
        Self::InvalidSetting {
            key: key.to_string(),
            value: value.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err = SplitterError::CaptureOpenFailed { index: 3 };
        assert_eq!(err.to_string(), "capture source 3 could not be opened");

        let err = SplitterError::InvalidGeometry { width: 0, height: 240 };
        assert!(err.to_string().contains("0x240"));

        let err = SplitterError::invalid_setting("target_fps", "fast");
        assert!(err.to_string().contains("target_fps"));
        assert!(err.to_string().contains("fast"));
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: SplitterError = io.into();
        assert!(matches!(err, SplitterError::Io(_)));
    }
}
