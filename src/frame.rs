//! Owned frame buffers and resize kernels
//!
//! Frames are held as 4-channel RGBA (`image::RgbaImage`). Capture sources
//! handing over BGRA bytes convert once on the way in with
//! [`Frame::from_bgra`]; consumers that need BGRA call [`Frame::to_bgra`].

use fast_image_resize as fir;
use fir::images::{Image, ImageRef};
use fir::{PixelType, ResizeAlg, ResizeOptions, Resizer};
use image::imageops::{self, FilterType};
use image::{DynamicImage, Rgba, RgbaImage};

use crate::config::Geometry;
use crate::error::{Result, SplitterError};

/// How to resample when changing frame size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interpolation {
    /// Pixel-area averaging; used for split images
    Area,
    /// Bilinear; used for comparison frames
    Bilinear,
    /// Nearest neighbour; used for display frames
    Nearest,
}

/// A single immutable 4-channel frame
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    image: RgbaImage,
}

impl Frame {
    pub fn new(image: RgbaImage) -> Self {
        Self { image }
    }

    /// Build from tightly packed RGBA bytes
    pub fn from_rgba(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        RgbaImage::from_raw(width, height, data).map(Self::new)
    }

    /// Build from tightly packed BGRA bytes
    pub fn from_bgra(width: u32, height: u32, mut data: Vec<u8>) -> Option<Self> {
        for px in data.chunks_exact_mut(4) {
            px.swap(0, 2);
        }
        Self::from_rgba(width, height, data)
    }

    /// Promote any decoded image to RGBA; images without alpha get alpha 255
    pub fn from_dynamic(image: DynamicImage) -> Self {
        Self::new(image.into_rgba8())
    }

    /// A frame filled with a single colour
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        Self::new(RgbaImage::from_pixel(width, height, Rgba(rgba)))
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn geometry(&self) -> Geometry {
        Geometry::new(self.width(), self.height())
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn into_image(self) -> RgbaImage {
        self.image
    }

    /// Raw RGBA bytes
    pub fn as_raw(&self) -> &[u8] {
        self.image.as_raw()
    }

    /// Copy of the pixels in BGRA order
    pub fn to_bgra(&self) -> Vec<u8> {
        let mut data = self.image.as_raw().clone();
        for px in data.chunks_exact_mut(4) {
            px.swap(0, 2);
        }
        data
    }

    /// Resize to `geometry` with the given interpolation
    pub fn resized(&self, geometry: Geometry, interpolation: Interpolation) -> Frame {
        Frame::new(resize(&self.image, geometry, interpolation))
    }
}

/// Resize an RGBA image. Same-size requests return a copy untouched.
pub fn resize(src: &RgbaImage, geometry: Geometry, interpolation: Interpolation) -> RgbaImage {
    let (width, height) = (geometry.width, geometry.height);
    if src.dimensions() == (width, height) {
        return src.clone();
    }
    match interpolation {
        Interpolation::Bilinear => imageops::resize(src, width, height, FilterType::Triangle),
        Interpolation::Nearest => imageops::resize(src, width, height, FilterType::Nearest),
        Interpolation::Area => {
            if width >= src.width() && height >= src.height() {
                // Area sampling degenerates to bilinear when enlarging
                imageops::resize(src, width, height, FilterType::Triangle)
            } else {
                resize_area(src, width, height)
            }
        }
    }
}

/// Box-filter downsampling. Each destination pixel averages the source
/// pixels it covers, with colour and alpha averaged independently.
fn resize_area(src: &RgbaImage, width: u32, height: u32) -> RgbaImage {
    match box_downsample(src, width, height) {
        Ok(image) => image,
        Err(e) => {
            log::warn!("Area resize failed, falling back to bilinear: {}", e);
            imageops::resize(src, width, height, FilterType::Triangle)
        }
    }
}

fn box_downsample(src: &RgbaImage, width: u32, height: u32) -> Result<RgbaImage> {
    let src_view = ImageRef::new(src.width(), src.height(), src.as_raw(), PixelType::U8x4)
        .map_err(|e| SplitterError::Resize(e.to_string()))?;
    let mut dst = Image::new(width, height, PixelType::U8x4);
    let options = ResizeOptions::new()
        .resize_alg(ResizeAlg::Convolution(fir::FilterType::Box))
        .use_alpha(false);
    Resizer::new()
        .resize(&src_view, &mut dst, &options)
        .map_err(|e| SplitterError::Resize(e.to_string()))?;
    RgbaImage::from_raw(width, height, dst.into_vec())
        .ok_or_else(|| SplitterError::Resize("output buffer has the wrong length".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bgra_round_trip_swaps_channels() {
        let frame = Frame::from_bgra(1, 1, vec![10, 20, 30, 40]).unwrap();
        assert_eq!(frame.as_raw(), &[30, 20, 10, 40]);
        assert_eq!(frame.to_bgra(), vec![10, 20, 30, 40]);
    }

    #[test]
    fn test_from_rgba_rejects_short_buffer() {
        assert!(Frame::from_rgba(2, 2, vec![0; 8]).is_none());
    }

    #[test]
    fn test_from_dynamic_promotes_alpha() {
        let rgb = image::RgbImage::from_pixel(2, 2, image::Rgb([1, 2, 3]));
        let frame = Frame::from_dynamic(DynamicImage::ImageRgb8(rgb));
        assert_eq!(frame.image().get_pixel(1, 1), &Rgba([1, 2, 3, 255]));
    }

    #[test]
    fn test_same_size_resize_is_identity() {
        let mut img = RgbaImage::new(4, 3);
        img.put_pixel(2, 1, Rgba([9, 8, 7, 6]));
        let frame = Frame::new(img.clone());
        for interpolation in [Interpolation::Area, Interpolation::Bilinear, Interpolation::Nearest] {
            assert_eq!(frame.resized(Geometry::new(4, 3), interpolation).image(), &img);
        }
    }

    #[test]
    fn test_area_downscale_averages_blocks() {
        // 4x2 image: left half 0, right half 200
        let mut img = RgbaImage::from_pixel(4, 2, Rgba([0, 0, 0, 255]));
        for y in 0..2 {
            for x in 2..4 {
                img.put_pixel(x, y, Rgba([200, 200, 200, 255]));
            }
        }
        let out = resize(&img, Geometry::new(2, 1), Interpolation::Area);
        assert_eq!(out.get_pixel(0, 0), &Rgba([0, 0, 0, 255]));
        assert_eq!(out.get_pixel(1, 0), &Rgba([200, 200, 200, 255]));

        let out = resize(&img, Geometry::new(1, 1), Interpolation::Area);
        assert_eq!(out.get_pixel(0, 0), &Rgba([100, 100, 100, 255]));
    }

    #[test]
    fn test_area_keeps_colour_of_translucent_pixels() {
        // Colour is not weighted by alpha, so the mask and pixels stay independent
        let mut img = RgbaImage::new(2, 2);
        for y in 0..2 {
            img.put_pixel(0, y, Rgba([100, 100, 100, 0]));
            img.put_pixel(1, y, Rgba([200, 200, 200, 200]));
        }
        let out = resize(&img, Geometry::new(1, 1), Interpolation::Area);
        assert_eq!(out.get_pixel(0, 0), &Rgba([150, 150, 150, 100]));
    }

    #[test]
    fn test_resize_output_geometry() {
        let frame = Frame::solid(64, 48, [1, 2, 3, 4]);
        let small = frame.resized(Geometry::new(16, 12), Interpolation::Bilinear);
        assert_eq!(small.geometry(), Geometry::new(16, 12));
        let big = frame.resized(Geometry::new(128, 96), Interpolation::Nearest);
        assert_eq!(big.geometry(), Geometry::new(128, 96));
        assert_eq!(big.image().get_pixel(100, 50), &Rgba([1, 2, 3, 4]));
    }
}
