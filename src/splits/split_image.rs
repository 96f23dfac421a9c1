//! A single split image

use image::{GrayImage, Luma, RgbaImage};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::metadata::{SplitDefaults, SplitFlags, SplitMetadata};
use crate::config::Geometry;
use crate::frame::{self, Interpolation};
use crate::{Result, SplitterError};

/// Reference frame plus the settings parsed from its file name
#[derive(Debug, Clone)]
pub struct SplitImage {
    path: PathBuf,
    name: String,
    /// Decoded file at its original size, kept for rebuilds
    source: Arc<RgbaImage>,
    /// Comparison-sized pixels
    pixels: RgbaImage,
    /// Alpha plane at comparison size; weights B, G and R alike
    mask: GrayImage,
    /// Display-sized pixels for consumers
    display: RgbaImage,
    meta: SplitMetadata,
}

impl SplitImage {
    /// Load and decode a split image file
    pub fn load(
        path: impl AsRef<Path>,
        defaults: &SplitDefaults,
        comparison: Geometry,
        display: Geometry,
    ) -> Result<Self> {
        let path = path.as_ref();
        comparison.validate()?;
        display.validate()?;

        let decoded = image::open(path).map_err(|source| SplitterError::ImageLoad {
            path: path.to_path_buf(),
            source,
        })?;
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let meta = SplitMetadata::parse(&name, defaults);

        Ok(Self::from_parts(
            path.to_path_buf(),
            name,
            Arc::new(decoded.into_rgba8()),
            meta,
            comparison,
            display,
        ))
    }

    /// Build from already decoded pixels; `name` is parsed for metadata
    pub fn from_rgba(
        name: impl Into<String>,
        source: RgbaImage,
        defaults: &SplitDefaults,
        comparison: Geometry,
        display: Geometry,
    ) -> Result<Self> {
        comparison.validate()?;
        display.validate()?;
        let name = name.into();
        let meta = SplitMetadata::parse(&name, defaults);
        Ok(Self::from_parts(
            PathBuf::from(&name),
            name,
            Arc::new(source),
            meta,
            comparison,
            display,
        ))
    }

    fn from_parts(
        path: PathBuf,
        name: String,
        source: Arc<RgbaImage>,
        meta: SplitMetadata,
        comparison: Geometry,
        display: Geometry,
    ) -> Self {
        let pixels = frame::resize(&source, comparison, Interpolation::Area);
        let mask = alpha_mask(&pixels);
        let display = frame::resize(&source, display, Interpolation::Nearest);
        Self {
            path,
            name,
            source,
            pixels,
            mask,
            display,
            meta,
        }
    }

    /// Rebuild pixels, mask and display image for new geometries
    pub fn rebuild(&mut self, comparison: Geometry, display: Geometry) -> Result<()> {
        comparison.validate()?;
        display.validate()?;
        self.pixels = frame::resize(&self.source, comparison, Interpolation::Area);
        self.mask = alpha_mask(&self.pixels);
        self.display = frame::resize(&self.source, display, Interpolation::Nearest);
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name without extension
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    pub fn mask(&self) -> &GrayImage {
        &self.mask
    }

    pub fn display_image(&self) -> &RgbaImage {
        &self.display
    }

    pub fn geometry(&self) -> Geometry {
        Geometry::new(self.pixels.width(), self.pixels.height())
    }

    pub fn metadata(&self) -> &SplitMetadata {
        &self.meta
    }

    pub(crate) fn metadata_mut(&mut self) -> &mut SplitMetadata {
        &mut self.meta
    }

    pub fn threshold(&self) -> f64 {
        self.meta.threshold
    }

    /// Seconds between match and key press
    pub fn delay(&self) -> f64 {
        self.meta.delay
    }

    /// Seconds between key press and the next comparison
    pub fn suspend(&self) -> f64 {
        self.meta.suspend
    }

    pub fn loops(&self) -> u32 {
        self.meta.loops
    }

    pub fn flags(&self) -> SplitFlags {
        self.meta.flags
    }
}

fn alpha_mask(pixels: &RgbaImage) -> GrayImage {
    GrayImage::from_fn(pixels.width(), pixels.height(), |x, y| {
        Luma([pixels.get_pixel(x, y)[3]])
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage, Rgba};

    const COMPARISON: Geometry = Geometry::new(8, 6);
    const DISPLAY: Geometry = Geometry::new(12, 9);

    #[test]
    fn test_load_png_with_alpha() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("boss_(85)_{b}.png");
        let mut img = RgbaImage::from_pixel(16, 12, Rgba([10, 20, 30, 255]));
        img.put_pixel(0, 0, Rgba([0, 0, 0, 0]));
        img.save(&path).unwrap();

        let split = SplitImage::load(&path, &SplitDefaults::default(), COMPARISON, DISPLAY).unwrap();
        assert_eq!(split.name(), "boss_(85)_{b}");
        assert_eq!(split.geometry(), COMPARISON);
        assert_eq!(split.display_image().dimensions(), (12, 9));
        assert!((split.threshold() - 0.85).abs() < 1e-9);
        assert!(split.flags().below);
        // Transparent corner lowers the top-left mask value, the rest is opaque
        assert!(split.mask().get_pixel(0, 0)[0] < 255);
        assert_eq!(split.mask().get_pixel(7, 5)[0], 255);
    }

    #[test]
    fn test_load_rgb_promotes_alpha() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plain.png");
        RgbImage::from_pixel(8, 6, Rgb([1, 2, 3])).save(&path).unwrap();

        let split = SplitImage::load(&path, &SplitDefaults::default(), COMPARISON, DISPLAY).unwrap();
        assert_eq!(split.pixels().get_pixel(3, 3), &Rgba([1, 2, 3, 255]));
        assert!(split.mask().pixels().all(|p| p[0] == 255));
        assert!(split.metadata().threshold_is_default);
    }

    #[test]
    fn test_undecodable_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.png");
        std::fs::write(&path, b"not a png").unwrap();

        let err = SplitImage::load(&path, &SplitDefaults::default(), COMPARISON, DISPLAY)
            .unwrap_err();
        assert!(matches!(err, SplitterError::ImageLoad { .. }));
    }

    #[test]
    fn test_invalid_geometry() {
        let err = SplitImage::from_rgba(
            "x",
            RgbaImage::new(4, 4),
            &SplitDefaults::default(),
            Geometry::new(0, 4),
            DISPLAY,
        )
        .unwrap_err();
        assert!(matches!(err, SplitterError::InvalidGeometry { .. }));
    }

    #[test]
    fn test_rebuild_changes_geometry() {
        let mut split = SplitImage::from_rgba(
            "x",
            RgbaImage::from_pixel(32, 24, Rgba([5, 5, 5, 128])),
            &SplitDefaults::default(),
            COMPARISON,
            DISPLAY,
        )
        .unwrap();

        split.rebuild(Geometry::new(16, 9), Geometry::new(32, 18)).unwrap();
        assert_eq!(split.geometry(), Geometry::new(16, 9));
        assert_eq!(split.mask().dimensions(), (16, 9));
        assert_eq!(split.mask().get_pixel(4, 4)[0], 128);
        assert_eq!(split.display_image().dimensions(), (32, 18));
    }
}
